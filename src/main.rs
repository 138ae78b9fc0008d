use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing_subscriber::EnvFilter;

use quarter_car::config::SimConfig;
use quarter_car::driver::Driver;
use quarter_car::net::{WelcomeInfo, start_websocket_server};
use quarter_car::state::{Command, SharedSimState};

#[derive(Parser)]
#[command(name = "quarter-car")]
#[command(about = "Quarter-car suspension simulator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Step in real time and stream snapshots over WebSocket
    Serve {
        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the bind address, e.g. 127.0.0.1:9001
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Step as fast as possible and print one JSON snapshot per line
    Run {
        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of ticks to simulate
        #[arg(short, long, default_value_t = 500)]
        ticks: u64,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<SimConfig> {
    match path {
        Some(p) => SimConfig::load(p).with_context(|| format!("loading {}", p.display())),
        None => Ok(SimConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { config, bind }) => {
            let mut cfg = load_config(config.as_ref())?;
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            serve(cfg).await
        }
        Some(Commands::Run { config, ticks }) => {
            let cfg = load_config(config.as_ref())?;
            run(&cfg, ticks)
        }
        None => serve(SimConfig::default()).await,
    }
}

async fn serve(cfg: SimConfig) -> anyhow::Result<()> {
    tracing::info!("starting quarter-car server");

    let mut driver = Driver::new(&cfg)?;
    let state = Arc::new(Mutex::new(SharedSimState::new()));
    let welcome = WelcomeInfo { params: cfg.model, timestep: cfg.timestep };

    let server = tokio::spawn(start_websocket_server(
        Arc::clone(&state),
        cfg.server.bind.clone(),
        welcome,
    ));

    // Fixed timestep: one simulator step per tick
    let mut ticker = interval(tick_period(cfg.timestep)?);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if server.is_finished() {
            return match server.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e).context("websocket server stopped"),
                Err(e) => Err(e).context("websocket server task panicked"),
            };
        }

        let commands = state.lock().await.drain_commands();
        for cmd in commands {
            match cmd {
                Command::Reset => driver.reset(),
            }
        }

        match driver.tick() {
            Ok(snapshot) => {
                state.lock().await.broadcast_snapshot(snapshot)?;
            }
            Err(e) => {
                tracing::warn!(tick = driver.current_tick(), "step skipped: {e}");
            }
        }
    }
}

/// Wall-clock period for one tick. Sub-nanosecond timesteps run at 1 ns.
fn tick_period(timestep: f64) -> anyhow::Result<Duration> {
    let period = Duration::try_from_secs_f64(timestep)
        .with_context(|| format!("timestep {timestep} s is not a usable tick period"))?;
    Ok(period.max(Duration::from_nanos(1)))
}

fn run(cfg: &SimConfig, ticks: u64) -> anyhow::Result<()> {
    let mut driver = Driver::new(cfg)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for _ in 0..ticks {
        match driver.tick() {
            Ok(snapshot) => {
                serde_json::to_writer(&mut out, &snapshot)?;
                writeln!(out)?;
            }
            Err(e) => {
                tracing::warn!(tick = driver.current_tick(), "step skipped: {e}");
            }
        }
    }

    tracing::info!(ticks, time = driver.simulator().time(), "run finished");
    Ok(())
}
