//! integrator - explicit + implicit ODE solvers and the fixed-timestep stepper

pub mod dopri5;
pub mod radau5;
pub mod settings;
pub mod stepper;
pub mod switching;

pub use settings::{SolverConfig, SolverMethod, SolverStats};
pub use stepper::Simulator;
pub use switching::Regime;
