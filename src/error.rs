//! Error types for model construction and time stepping.

use thiserror::Error;

/// Failure of the adaptive ODE solver over one interval.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    /// The derivative or the integrated state stopped being finite.
    #[error("non-finite state or derivative at t = {t}")]
    NonFinite {
        /// Time at which the non-finite value appeared.
        t: f64,
    },

    /// The solver used up its step budget before reaching the end of the interval.
    #[error("step budget of {steps} exhausted at t = {t}")]
    StepBudgetExhausted {
        /// Number of attempted steps.
        steps: usize,
        /// Time reached when the budget ran out.
        t: f64,
    },

    /// The explicit solver found the interval stiff and gave up early so an
    /// implicit method can take over.
    #[error("problem turned stiff at t = {t}")]
    StiffnessDetected {
        /// Time of the last accepted explicit step.
        t: f64,
    },

    /// The step size shrank below what floating point can resolve at `t`.
    #[error("step size {h:e} underflowed at t = {t}")]
    StepSizeUnderflow {
        /// Rejected step size.
        h: f64,
        /// Time at which the step was attempted.
        t: f64,
    },
}

/// Errors surfaced by the simulation core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// A model parameter, the timestep or a solver setting was out of range.
    #[error("invalid parameter `{name}`: {value} (must be finite and positive)")]
    InvalidParameter {
        /// Parameter name as it appears in the config.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// The solver could not advance the state; nothing was committed.
    #[error("integration failed: {0}")]
    Integration(#[from] IntegrationError),
}

impl SimError {
    /// Creates an invalid parameter error.
    #[must_use]
    pub const fn invalid(name: &'static str, value: f64) -> Self {
        Self::InvalidParameter { name, value }
    }
}

/// Checks that `value` is finite and strictly positive.
pub(crate) fn require_finite_positive(name: &'static str, value: f64) -> Result<f64, SimError> {
    if value.is_finite() {
        require_positive(name, value)
    } else {
        Err(SimError::invalid(name, value))
    }
}

/// Checks that `value` is strictly positive. NaN is rejected.
pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<f64, SimError> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(SimError::invalid(name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_positive() {
        assert_eq!(require_positive("mass", 2.0), Ok(2.0));
        assert_eq!(
            require_positive("mass", 0.0),
            Err(SimError::invalid("mass", 0.0))
        );
        assert!(require_positive("mass", -1.0).is_err());
        assert!(require_positive("mass", f64::NAN).is_err());
    }

    #[test]
    fn test_require_finite_positive() {
        assert_eq!(require_finite_positive("rtol", 1e-6), Ok(1e-6));
        assert!(require_finite_positive("rtol", f64::INFINITY).is_err());
        assert!(require_finite_positive("rtol", f64::NAN).is_err());
        assert!(require_finite_positive("rtol", -1e-6).is_err());
    }

    #[test]
    fn test_display() {
        let err = SimError::invalid("wheel_mass", 0.0);
        assert_eq!(
            err.to_string(),
            "invalid parameter `wheel_mass`: 0 (must be finite and positive)"
        );

        let err: SimError = IntegrationError::StepBudgetExhausted { steps: 500, t: 0.5 }.into();
        assert!(err.to_string().contains("step budget of 500"));
    }
}
