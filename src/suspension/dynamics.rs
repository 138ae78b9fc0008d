// ==============================================================================
// dynamics.rs - QUARTER-CAR EQUATIONS OF MOTION
// ==============================================================================
// Two masses on one vertical axis:
//
//     body   (M)   --- spring ks + damper c, unloaded length DS ---
//     wheel  (m)   --- tire spring kw, rest offset DW (radius) ---
//     road   (u)
//
//     susp_stretch      = y_body - y_wheel - DS
//     susp_stretch_rate = v_body - v_wheel
//     tire_stretch      = y_wheel - u - DW
//
//     a_body  = (-c*rate - ks*susp_stretch) / M - g
//     a_wheel = ( c*rate + ks*susp_stretch - kw*tire_stretch) / m - g
//
// The tire is a bilateral linear spring here. Keeping the wheel on or above the
// road is the constraint pass's job, not the force model's.
// ==============================================================================

use crate::suspension::{BODY_POS, BODY_VEL, QuarterCarParams, StateVector, WHEEL_POS, WHEEL_VEL};

/// m/s^2
pub const GRAVITY: f64 = 9.8;

#[inline]
pub fn suspension_stretch(p: &QuarterCarParams, x: &StateVector) -> f64 {
    x[BODY_POS] - x[WHEEL_POS] - p.suspension_length_unloaded
}

#[inline]
pub fn tire_stretch(p: &QuarterCarParams, x: &StateVector, road: f64) -> f64 {
    x[WHEEL_POS] - road - p.wheel_radius
}

/// `[v_body, a_body, v_wheel, a_wheel]` for state `x` over road elevation `road`.
///
/// Non-finite inputs propagate to non-finite outputs.
pub fn derivative(p: &QuarterCarParams, _t: f64, x: &StateVector, road: f64) -> StateVector {
    let body_vel = x[BODY_VEL];
    let wheel_vel = x[WHEEL_VEL];

    let susp_stretch = suspension_stretch(p, x);
    let susp_stretch_rate = body_vel - wheel_vel;
    let tire_stretch = tire_stretch(p, x, road);

    let damper_force = p.suspension_damping * susp_stretch_rate;
    let spring_force = p.suspension_stiffness * susp_stretch;
    let tire_force = p.tire_stiffness * tire_stretch;

    let body_accel = (-damper_force - spring_force) / p.body_mass - GRAVITY;
    let wheel_accel = (damper_force + spring_force - tire_force) / p.wheel_mass - GRAVITY;

    StateVector::new(body_vel, body_accel, wheel_vel, wheel_accel)
}

/// Rest state of the force model with the road held at `road`.
///
/// The tire carries the whole corner weight and the suspension carries the body,
/// so the tire stretch here is always negative (the tire is compressed).
pub fn static_equilibrium(p: &QuarterCarParams, road: f64) -> StateVector {
    let total_weight = (p.body_mass + p.wheel_mass) * GRAVITY;
    let body_weight = p.body_mass * GRAVITY;

    let wheel = road + p.wheel_radius - total_weight / p.tire_stiffness;
    let body = wheel + p.suspension_length_unloaded - body_weight / p.suspension_stiffness;

    StateVector::new(body, 0.0, wheel, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_free_fall_at_natural_lengths() {
        // Both springs unloaded and at rest: only gravity acts.
        let p = QuarterCarParams::default();
        let x = StateVector::new(3.0, 0.0, 1.0, 0.0);

        let dx = derivative(&p, 0.0, &x, 0.0);

        assert_eq!(dx, StateVector::new(0.0, -GRAVITY, 0.0, -GRAVITY));
    }

    #[test]
    fn test_forces_by_hand() {
        let p = QuarterCarParams::default();
        // stretch = 0.1, rate = 0.5, tire stretch = -0.02
        let x = StateVector::new(3.08, 0.7, 0.98, 0.2);

        let dx = derivative(&p, 0.0, &x, 0.0);

        let damper = 1300.0 * 0.5;
        let spring = 25_000.0 * (3.08 - 0.98 - 2.0);
        let tire = 250_000.0 * (0.98 - 1.0);
        assert_eq!(dx[0], 0.7);
        assert_eq!(dx[2], 0.2);
        assert_relative_eq!(dx[1], (-damper - spring) / 400.0 - GRAVITY, epsilon = 1e-9);
        assert_relative_eq!(dx[3], (damper + spring - tire) / 50.0 - GRAVITY, epsilon = 1e-9);
    }

    #[test]
    fn test_time_invariant() {
        let p = QuarterCarParams::default();
        let x = StateVector::new(2.9, -0.1, 0.99, 0.3);
        assert_eq!(derivative(&p, 0.0, &x, 0.05), derivative(&p, 123.4, &x, 0.05));
    }

    #[test]
    fn test_road_shifts_tire_force_only() {
        let p = QuarterCarParams::default();
        let x = StateVector::new(3.0, 0.0, 1.0, 0.0);

        let flat = derivative(&p, 0.0, &x, 0.0);
        let raised = derivative(&p, 0.0, &x, 0.01);

        assert_eq!(flat[1], raised[1]);
        assert_relative_eq!(raised[3] - flat[3], 250_000.0 * 0.01 / 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_static_equilibrium_is_force_free() {
        let p = QuarterCarParams::default();
        for road in [-0.2, 0.0, 0.05, 1.5] {
            let eq = static_equilibrium(&p, road);
            let dx = derivative(&p, 0.0, &eq, road);
            assert_relative_eq!(dx.norm(), 0.0, epsilon = 1e-9);
            assert!(tire_stretch(&p, &eq, road) < 0.0);
        }
    }

    #[test]
    fn test_non_finite_propagates() {
        let p = QuarterCarParams::default();
        let x = StateVector::new(f64::NAN, 0.0, 1.0, 0.0);
        let dx = derivative(&p, 0.0, &x, 0.0);
        assert!(dx[1].is_nan());
        assert!(dx[3].is_nan());
    }
}
