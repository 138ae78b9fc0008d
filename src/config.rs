//! JSON configuration for the driver and server.
//!
//! Every section is optional; missing fields fall back to the reference corner
//! (400 kg body, 50 kg wheel, 10 ms steps, 10 Hz sine road).

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SimError;
use crate::integrator::{Simulator, SolverConfig};
use crate::road::RoadConfig;
use crate::suspension::{CornerState, QuarterCar, QuarterCarParams};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] SimError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:9001".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub model: QuarterCarParams,
    pub initial_state: CornerState,
    pub timestep: f64, // s
    pub solver: SolverConfig,
    pub road: RoadConfig,
    pub server: ServerConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            model: QuarterCarParams::default(),
            initial_state: CornerState {
                body_position: 3.0,
                body_velocity: 0.0,
                wheel_position: 1.0,
                wheel_velocity: 0.0,
            },
            timestep: 0.01,
            solver: SolverConfig::default(),
            road: RoadConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parses and validates a config document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: SimConfig = serde_json::from_str(text)?;
        cfg.build_simulator()?;
        Ok(cfg)
    }

    pub fn build_simulator(&self) -> Result<Simulator<QuarterCar>, SimError> {
        let model = QuarterCar::new(self.model)?;
        Simulator::new(model, self.initial_state.into(), self.timestep)?.with_solver(self.solver)
    }
}
