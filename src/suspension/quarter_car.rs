use crate::error::SimError;
use crate::suspension::constraint::{self, Corrections};
use crate::suspension::dynamics;
use crate::suspension::{BODY_POS, QuarterCarParams, StateVector, SuspensionModel, WHEEL_POS};

/// Single vehicle corner: body over wheel over road.
///
/// Holds a validated, immutable [`QuarterCarParams`]; the physics lives in the
/// free functions of [`dynamics`] and [`constraint`].
#[derive(Debug, Clone, PartialEq)]
pub struct QuarterCar {
    params: QuarterCarParams,
}

impl QuarterCar {
    pub fn new(params: QuarterCarParams) -> Result<Self, SimError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &QuarterCarParams {
        &self.params
    }

    pub fn suspension_stretch(&self, x: &StateVector) -> f64 {
        dynamics::suspension_stretch(&self.params, x)
    }

    pub fn tire_stretch(&self, x: &StateVector, road: f64) -> f64 {
        dynamics::tire_stretch(&self.params, x, road)
    }

    pub fn static_equilibrium(&self, road: f64) -> StateVector {
        dynamics::static_equilibrium(&self.params, road)
    }

    pub fn correct_traced(&self, x: StateVector, road: f64) -> (StateVector, Corrections) {
        constraint::correct_traced(&self.params, x, road)
    }

    /// Limits the state is currently resting against, without changing it.
    ///
    /// Positions are compared against the same limit positions the corrector
    /// assigns, so a freshly corrected state always reports the limit it hit.
    pub fn limits(&self, x: &StateVector, road: f64) -> Corrections {
        let p = &self.params;
        let top_out = p.suspension_stretch_max + x[WHEEL_POS] + p.suspension_length_unloaded;
        Corrections {
            tire_contact: x[WHEEL_POS] <= road + p.wheel_radius,
            top_out: x[BODY_POS] >= top_out,
            bottom_out: x[BODY_POS] <= x[WHEEL_POS],
        }
    }
}

impl SuspensionModel for QuarterCar {
    fn derivative(&self, t: f64, x: &StateVector, road: f64) -> StateVector {
        dynamics::derivative(&self.params, t, x, road)
    }

    fn correct(&self, x: StateVector, road: f64) -> StateVector {
        constraint::correct(&self.params, x, road)
    }

    fn validate(&self) -> Result<(), SimError> {
        self.params.validate()
    }
}
