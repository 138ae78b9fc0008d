// ==============================================================================
// constraint.rs - TRAVEL LIMITS (TIRE CONTACT + BUMP STOPS)
// ------------------------------------------------------------------------------
// Applied once per step to the integrated end state, in this fixed order:
//
//   1) tire contact: wheel below road + radius
//        -> wheel = road + radius, v_wheel = -v_wheel
//   2) top-out:      suspension stretch > stretch_max
//        -> body = stretch_max + wheel + DS, v_body = -v_body
//   3) bottom-out:   suspension stretch < -DS (body below wheel)
//        -> body = wheel, v_body = -v_body
//
// Each check sees the state left by the previous one, so a tire correction that
// lifts the wheel can trigger a bump stop in the same pass. Nothing is carried
// between steps.
//
// Checks compare positions against the exact limit position they would assign,
// so an already corrected state never re-triggers (no velocity flip-flop from
// rounding in the stretch subtraction).
// ==============================================================================

use serde::Serialize;

use crate::suspension::{BODY_POS, BODY_VEL, QuarterCarParams, StateVector, WHEEL_POS, WHEEL_VEL};

/// Which limits fired during one correction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Corrections {
    pub tire_contact: bool,
    pub top_out: bool,
    pub bottom_out: bool,
}

impl Corrections {
    pub fn any(&self) -> bool {
        self.tire_contact || self.top_out || self.bottom_out
    }
}

/// Clamps `x` to the travel limits. Total: NaN inputs fail every comparison and
/// pass through unchanged.
pub fn correct(p: &QuarterCarParams, x: StateVector, road: f64) -> StateVector {
    correct_traced(p, x, road).0
}

/// Same as [`correct`], also reporting which limits fired.
pub fn correct_traced(p: &QuarterCarParams, mut x: StateVector, road: f64) -> (StateVector, Corrections) {
    let mut fired = Corrections::default();

    let contact = road + p.wheel_radius;
    if x[WHEEL_POS] < contact {
        x[WHEEL_POS] = contact;
        x[WHEEL_VEL] = -x[WHEEL_VEL];
        fired.tire_contact = true;
    }

    let top_out = p.suspension_stretch_max + x[WHEEL_POS] + p.suspension_length_unloaded;
    if x[BODY_POS] > top_out {
        x[BODY_POS] = top_out;
        x[BODY_VEL] = -x[BODY_VEL];
        fired.top_out = true;
    }

    // stretch < -DS  <=>  body < wheel
    let bottom_out = x[WHEEL_POS];
    if x[BODY_POS] < bottom_out {
        x[BODY_POS] = bottom_out;
        x[BODY_VEL] = -x[BODY_VEL];
        fired.bottom_out = true;
    }

    if fired.any() {
        tracing::trace!(?fired, road, "travel limit correction");
    }

    (x, fired)
}
