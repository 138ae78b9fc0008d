// ==============================================================================
// params.rs - QUARTER-CAR PHYSICAL PARAMETERS
// ------------------------------------------------------------------------------
// Eight positive constants describing one vehicle corner:
// - sprung (body) and unsprung (wheel) masses
// - suspension spring + damper, its unloaded length and top-out travel
// - tire spring and wheel radius (contact offset from wheel center to road)
//
// Params are validated once, when a QuarterCar is built, and are immutable
// afterwards. Defaults are the reference corner used throughout the tests.
// ==============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{SimError, require_finite_positive};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarterCarParams {
    pub body_mass: f64,                  // kg (sprung)
    pub wheel_mass: f64,                 // kg (unsprung)
    pub suspension_damping: f64,         // N*s/m
    pub suspension_stiffness: f64,       // N/m
    pub suspension_length_unloaded: f64, // m
    pub suspension_stretch_max: f64,     // m, top-out travel past unloaded length
    pub tire_stiffness: f64,             // N/m
    pub wheel_radius: f64,               // m
}

impl Default for QuarterCarParams {
    fn default() -> Self {
        Self {
            body_mass: 400.0,
            wheel_mass: 50.0,
            suspension_damping: 1300.0,
            suspension_stiffness: 25_000.0,
            suspension_length_unloaded: 2.0,
            suspension_stretch_max: 1.0,
            tire_stiffness: 250_000.0,
            wheel_radius: 1.0,
        }
    }
}

impl QuarterCarParams {
    /// Fails on the first parameter that is not finite and strictly positive.
    pub fn validate(&self) -> Result<(), SimError> {
        require_finite_positive("body_mass", self.body_mass)?;
        require_finite_positive("wheel_mass", self.wheel_mass)?;
        require_finite_positive("suspension_damping", self.suspension_damping)?;
        require_finite_positive("suspension_stiffness", self.suspension_stiffness)?;
        require_finite_positive("suspension_length_unloaded", self.suspension_length_unloaded)?;
        require_finite_positive("suspension_stretch_max", self.suspension_stretch_max)?;
        require_finite_positive("tire_stiffness", self.tire_stiffness)?;
        require_finite_positive("wheel_radius", self.wheel_radius)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(QuarterCarParams::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_each_non_positive_field() {
        let cases: [(&str, fn(&mut QuarterCarParams)); 8] = [
            ("body_mass", |p| p.body_mass = 0.0),
            ("wheel_mass", |p| p.wheel_mass = -50.0),
            ("suspension_damping", |p| p.suspension_damping = 0.0),
            ("suspension_stiffness", |p| p.suspension_stiffness = -1.0),
            ("suspension_length_unloaded", |p| p.suspension_length_unloaded = 0.0),
            ("suspension_stretch_max", |p| p.suspension_stretch_max = f64::NAN),
            ("tire_stiffness", |p| p.tire_stiffness = 0.0),
            ("wheel_radius", |p| p.wheel_radius = -0.3),
        ];

        for (field, break_it) in cases {
            let mut params = QuarterCarParams::default();
            break_it(&mut params);
            match params.validate() {
                Err(SimError::InvalidParameter { name, .. }) => assert_eq!(name, field),
                other => panic!("{field}: expected InvalidParameter, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let params: QuarterCarParams =
            serde_json::from_str(r#"{ "body_mass": 350.0, "wheel_radius": 0.3 }"#).unwrap();
        assert_eq!(params.body_mass, 350.0);
        assert_eq!(params.wheel_radius, 0.3);
        assert_eq!(params.tire_stiffness, 250_000.0);
    }
}
