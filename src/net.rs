use std::sync::Arc;
use futures::{StreamExt, SinkExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tokio::sync::{Mutex, mpsc};

use crate::state::{ClientMessage, Command, ServerMessage, SharedSimState};
use crate::suspension::QuarterCarParams;

/// What every client is told on connect.
#[derive(Debug, Clone, Copy)]
pub struct WelcomeInfo {
    pub params: QuarterCarParams,
    pub timestep: f64,
}

pub async fn start_websocket_server(
    state: Arc<Mutex<SharedSimState>>,
    bind: String,
    welcome: WelcomeInfo,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(&bind).await?;

    tracing::info!("websocket listening on ws://{bind}");

    loop {
        let (raw, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("accept failed: {e}");
                continue;
            }
        };
        let state_clone = Arc::clone(&state);

        tokio::spawn(async move {
            if let Err(e) = handle_client(raw, state_clone, welcome).await {
                tracing::warn!(%peer, "client error: {e}");
            }
        });
    }
}

async fn handle_client(
    raw: TcpStream,
    state: Arc<Mutex<SharedSimState>>,
    welcome: WelcomeInfo,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let ws = accept_async(raw).await?;
    let (mut write, mut read) = ws.split();

    // -------------------------------
    // 1) Outgoing message channel
    // -------------------------------
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let client_id = state.lock().await.register_client(tx.clone());

    // -------------------------------
    // 2) Send loop
    // -------------------------------
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    tracing::info!(%client_id, "client connected");

    let hello = ServerMessage::Welcome {
        client_id,
        params: welcome.params,
        timestep: welcome.timestep,
    };
    if let Ok(json) = serde_json::to_string(&hello) {
        let _ = tx.send(json);
    }

    // -------------------------------
    // 3) Receive loop
    // -------------------------------
    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(_) => break,
        };

        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };

        let parsed = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(m) => m,
            Err(_) => {
                tracing::debug!(%client_id, "ignoring message: {text}");
                continue;
            }
        };

        match parsed {
            ClientMessage::Ping => {
                if let Ok(json) = serde_json::to_string(&ServerMessage::Pong) {
                    let _ = tx.send(json);
                }
            }
            ClientMessage::Reset => {
                state.lock().await.queue(Command::Reset);
            }
        }
    }

    tracing::info!(%client_id, "client disconnected");
    state.lock().await.remove_client(&client_id);
    Ok(())
}
