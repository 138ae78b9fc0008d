//! Vertical dynamics of one vehicle corner: a sprung body over an unsprung
//! wheel, stepped under a road-elevation input.
//!
//! The core is [`suspension`] (model + travel limits) and [`integrator`]
//! (adaptive ODE solver + fixed-timestep [`Simulator`]). [`road`], [`driver`],
//! [`state`] and [`net`] drive it from a generated road and stream snapshots.
//!
//! ```no_run
//! use quarter_car::{QuarterCar, QuarterCarParams, Simulator, StateVector};
//!
//! let car = QuarterCar::new(QuarterCarParams::default())?;
//! let mut sim = Simulator::new(car, StateVector::new(3.0, 0.0, 1.0, 0.0), 0.01)?;
//! let x = sim.advance(0.0)?;
//! println!("body at {:.4} m", x[0]);
//! # Ok::<(), quarter_car::SimError>(())
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod integrator;
pub mod net;
pub mod road;
pub mod state;
pub mod suspension;

pub use error::{IntegrationError, SimError};
pub use integrator::{Regime, Simulator, SolverConfig, SolverMethod};
pub use suspension::{CornerState, QuarterCar, QuarterCarParams, StateVector, SuspensionModel};
