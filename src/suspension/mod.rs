//! suspension - quarter-car model (pure types + derivative + bump-stop corrections)

pub mod params;
pub mod dynamics;
pub mod constraint;
pub mod quarter_car;

pub use params::QuarterCarParams;
pub use dynamics::{GRAVITY, static_equilibrium};
pub use constraint::Corrections;
pub use quarter_car::QuarterCar;

use nalgebra::Vector4;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// `[body position, body velocity, wheel position, wheel velocity]`
pub type StateVector = Vector4<f64>;

pub const BODY_POS: usize = 0;
pub const BODY_VEL: usize = 1;
pub const WHEEL_POS: usize = 2;
pub const WHEEL_VEL: usize = 3;

/// A mass-spring-damper topology that can be stepped by [`crate::integrator::Simulator`].
///
/// `derivative` feeds the ODE solver; `correct` is applied once to the end state
/// of every step. Both must be pure.
pub trait SuspensionModel {
    /// Time derivative of `x` with the road elevation held at `road`.
    fn derivative(&self, t: f64, x: &StateVector, road: f64) -> StateVector;

    /// Clamps `x` back inside the model's travel limits.
    fn correct(&self, x: StateVector, road: f64) -> StateVector;

    /// Rejects parameter sets the model cannot be stepped with.
    fn validate(&self) -> Result<(), SimError> {
        Ok(())
    }
}

/// Named view of a [`StateVector`], used on the wire and in config files.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CornerState {
    pub body_position: f64,  // m
    pub body_velocity: f64,  // m/s
    pub wheel_position: f64, // m
    pub wheel_velocity: f64, // m/s
}

impl From<StateVector> for CornerState {
    fn from(x: StateVector) -> Self {
        Self {
            body_position: x[BODY_POS],
            body_velocity: x[BODY_VEL],
            wheel_position: x[WHEEL_POS],
            wheel_velocity: x[WHEEL_VEL],
        }
    }
}

impl From<CornerState> for StateVector {
    fn from(s: CornerState) -> Self {
        Vector4::new(
            s.body_position,
            s.body_velocity,
            s.wheel_position,
            s.wheel_velocity,
        )
    }
}
