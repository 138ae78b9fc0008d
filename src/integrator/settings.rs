//! Solver settings shared by the explicit and implicit integrators.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, require_finite_positive};

/// Which integrator advances an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverMethod {
    /// Dormand-Prince until the interval turns stiff, then Radau IIA.
    #[default]
    Auto,
    /// Dormand-Prince 5(4) only.
    Explicit,
    /// Radau IIA only.
    Implicit,
}

/// Tolerances and step budget for one integration interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub method: SolverMethod,
    pub rtol: f64,
    pub atol: f64,
    /// Attempted steps allowed per interval, per integrator.
    pub max_steps: usize,
    /// First trial step; `None` picks one from the initial derivative.
    pub initial_step: Option<f64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            method: SolverMethod::Auto,
            rtol: 1.49012e-8,
            atol: 1.49012e-8,
            max_steps: 500,
            initial_step: None,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        require_finite_positive("rtol", self.rtol)?;
        require_finite_positive("atol", self.atol)?;
        if self.max_steps == 0 {
            return Err(SimError::invalid("max_steps", 0.0));
        }
        if let Some(h) = self.initial_step {
            require_finite_positive("initial_step", h)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolverStats {
    pub accepted: usize,
    pub rejected: usize,
    /// Right-hand side evaluations, Jacobian columns included.
    pub evaluations: usize,
    pub jacobians: usize,
    /// Largest stiffness estimate `|h| * |lambda|` seen on an accepted step.
    pub stiffness: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(SolverConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_bad_settings() {
        let cases = [
            ("rtol", SolverConfig { rtol: 0.0, ..Default::default() }),
            ("rtol", SolverConfig { rtol: f64::NAN, ..Default::default() }),
            ("atol", SolverConfig { atol: -1e-9, ..Default::default() }),
            ("atol", SolverConfig { atol: f64::INFINITY, ..Default::default() }),
            ("max_steps", SolverConfig { max_steps: 0, ..Default::default() }),
            ("initial_step", SolverConfig { initial_step: Some(0.0), ..Default::default() }),
            ("initial_step", SolverConfig { initial_step: Some(-1e-3), ..Default::default() }),
        ];

        for (expected, cfg) in cases {
            match cfg.validate() {
                Err(SimError::InvalidParameter { name, .. }) => assert_eq!(name, expected),
                other => panic!("{cfg:?}: expected InvalidParameter, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_method_from_json() {
        let cfg: SolverConfig = serde_json::from_str(r#"{ "method": "implicit" }"#).unwrap();
        assert_eq!(cfg.method, SolverMethod::Implicit);
        assert_eq!(cfg.max_steps, 500);
    }
}
