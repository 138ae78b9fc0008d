// ==============================================================================
// dopri5.rs - ADAPTIVE DORMAND-PRINCE 5(4) ODE SOLVER
// ==============================================================================
// Explicit embedded Runge-Kutta pair with first-same-as-last (FSAL) reuse:
// 7 stages per step, 6 new derivative evaluations after the first step.
//
//   y_{n+1} = y_n + h * sum(b_i * k_i)                 (5th order, propagated)
//   err     = h * sum(e_i * k_i),  e = b - b*          (4th order embedded)
//
//   sc_i    = atol + rtol * max(|y_n,i|, |y_{n+1},i|)
//   E       = sqrt(mean((err_i / sc_i)^2))             accept if E <= 1
//   h_new   = h * clamp(0.9 * E^(-1/5), 0.2, 10)       (no growth after a reject)
//
// Only the state at `t1` is returned; intermediate steps are discarded.
// Every attempted step counts against `max_steps`.
//
// Stiffness test on accepted steps (k6 and k7 share the abscissa t + h):
//
//   h*lambda ~ |h| * ||k7 - k6|| / ||y_{n+1} - Y6||
//
// Above STIFF_LIMIT for STIFF_STEPS accepted steps (reset after NONSTIFF_STEPS
// below it) the call returns StiffnessDetected. Only under SolverMethod::Auto.
// ==============================================================================

use nalgebra::SVector;

use crate::error::IntegrationError;
use crate::integrator::settings::{SolverConfig, SolverMethod, SolverStats};

// Butcher tableau
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// 5th-order weights (also the 7th stage row)
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// b - b*
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

// Edge of the stability region on the negative real axis is about 3.3.
pub(super) const STIFF_LIMIT: f64 = 3.25;
const STIFF_STEPS: usize = 15;
const NONSTIFF_STEPS: usize = 6;

/// Integrates `dy/dt = f(t, y)` from `t0` to `t1` and returns `y(t1)`.
pub fn integrate<const N: usize, F>(
    f: F,
    t0: f64,
    t1: f64,
    y0: &SVector<f64, N>,
    cfg: &SolverConfig,
) -> Result<SVector<f64, N>, IntegrationError>
where
    F: FnMut(f64, &SVector<f64, N>) -> SVector<f64, N>,
{
    integrate_with_stats(f, t0, t1, y0, cfg).map(|(y, _)| y)
}

pub fn integrate_with_stats<const N: usize, F>(
    mut f: F,
    t0: f64,
    t1: f64,
    y0: &SVector<f64, N>,
    cfg: &SolverConfig,
) -> Result<(SVector<f64, N>, SolverStats), IntegrationError>
where
    F: FnMut(f64, &SVector<f64, N>) -> SVector<f64, N>,
{
    let mut stats = SolverStats::default();
    let span = t1 - t0;
    if span == 0.0 {
        return Ok((*y0, stats));
    }
    let dir = span.signum();

    let mut t = t0;
    let mut y = *y0;
    let mut k1 = f(t, &y);
    stats.evaluations += 1;
    if !all_finite(&y) || !all_finite(&k1) {
        return Err(IntegrationError::NonFinite { t });
    }

    let mut h = cfg
        .initial_step
        .map(f64::abs)
        .unwrap_or_else(|| initial_step(&y, &k1, cfg))
        .min(span.abs());
    let mut last_rejected = false;
    let detect_stiffness = cfg.method == SolverMethod::Auto;
    let mut stiff_steps = 0;
    let mut nonstiff_steps = 0;

    loop {
        let remaining = (t1 - t) * dir;
        if remaining <= 0.0 {
            return Ok((y, stats));
        }
        if stats.accepted + stats.rejected >= cfg.max_steps {
            return Err(IntegrationError::StepBudgetExhausted {
                steps: stats.accepted + stats.rejected,
                t,
            });
        }

        // Land exactly on t1 instead of leaving a sliver for the next step.
        if 1.01 * h >= remaining {
            h = remaining;
        }
        if h <= 16.0 * f64::EPSILON * t.abs().max(1.0) {
            return Err(IntegrationError::StepSizeUnderflow { h, t });
        }

        let hs = h * dir;
        let k2 = f(t + C2 * hs, &(y + k1 * (hs * A21)));
        let k3 = f(t + C3 * hs, &(y + (k1 * A31 + k2 * A32) * hs));
        let k4 = f(t + C4 * hs, &(y + (k1 * A41 + k2 * A42 + k3 * A43) * hs));
        let k5 = f(t + C5 * hs, &(y + (k1 * A51 + k2 * A52 + k3 * A53 + k4 * A54) * hs));
        let y6 = y + (k1 * A61 + k2 * A62 + k3 * A63 + k4 * A64 + k5 * A65) * hs;
        let k6 = f(t + hs, &y6);
        let y_new = y + (k1 * B1 + k3 * B3 + k4 * B4 + k5 * B5 + k6 * B6) * hs;
        let k7 = f(t + hs, &y_new);
        stats.evaluations += 6;

        let err_vec = (k1 * E1 + k3 * E3 + k4 * E4 + k5 * E5 + k6 * E6 + k7 * E7) * hs;
        let err = error_norm(&err_vec, &y, &y_new, cfg);

        // NaN error compares false and falls into the reject branch.
        if err <= 1.0 {
            stats.accepted += 1;
            let h_lambda = h * stiffness_ratio(&k7, &k6, &y_new, &y6);
            stats.stiffness = stats.stiffness.max(h_lambda);

            t = if h == remaining { t1 } else { t + hs };
            y = y_new;
            k1 = k7;

            if !all_finite(&y) || !all_finite(&k1) {
                return Err(IntegrationError::NonFinite { t });
            }

            if detect_stiffness && t != t1 {
                if h_lambda > STIFF_LIMIT {
                    nonstiff_steps = 0;
                    stiff_steps += 1;
                    if stiff_steps == STIFF_STEPS {
                        return Err(IntegrationError::StiffnessDetected { t });
                    }
                } else {
                    nonstiff_steps += 1;
                    if nonstiff_steps == NONSTIFF_STEPS {
                        stiff_steps = 0;
                    }
                }
            }

            let mut factor = step_factor(err);
            if last_rejected {
                factor = factor.min(1.0);
            }
            h *= factor;
            last_rejected = false;
        } else {
            stats.rejected += 1;
            let factor = if err.is_finite() {
                step_factor(err).min(1.0)
            } else {
                MIN_FACTOR
            };
            h *= factor;
            last_rejected = true;
        }
    }
}

fn step_factor(err: f64) -> f64 {
    if err == 0.0 {
        return MAX_FACTOR;
    }
    (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
}

/// Dominant eigenvalue magnitude seen between two stages at the same time.
fn stiffness_ratio<const N: usize>(
    k7: &SVector<f64, N>,
    k6: &SVector<f64, N>,
    y7: &SVector<f64, N>,
    y6: &SVector<f64, N>,
) -> f64 {
    let den = (y7 - y6).norm_squared();
    if den > 0.0 {
        ((k7 - k6).norm_squared() / den).sqrt()
    } else {
        0.0
    }
}

pub(super) fn error_norm<const N: usize>(
    err: &SVector<f64, N>,
    y: &SVector<f64, N>,
    y_new: &SVector<f64, N>,
    cfg: &SolverConfig,
) -> f64 {
    let sum: f64 = (0..N)
        .map(|i| {
            let sc = cfg.atol + cfg.rtol * y[i].abs().max(y_new[i].abs());
            (err[i] / sc).powi(2)
        })
        .sum();
    (sum / N as f64).sqrt()
}

/// Starting step from the ratio of state to derivative magnitudes.
pub(super) fn initial_step<const N: usize>(y: &SVector<f64, N>, dy: &SVector<f64, N>, cfg: &SolverConfig) -> f64 {
    let scaled_norm = |v: &SVector<f64, N>| {
        let sum: f64 = (0..N)
            .map(|i| {
                let sc = cfg.atol + cfg.rtol * y[i].abs();
                (v[i] / sc).powi(2)
            })
            .sum();
        (sum / N as f64).sqrt()
    };

    let d0 = scaled_norm(y);
    let d1 = scaled_norm(dy);
    if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    }
}

pub(super) fn all_finite<const N: usize>(v: &SVector<f64, N>) -> bool {
    v.iter().all(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Vector1, Vector2};

    #[test]
    fn test_exponential_decay() {
        let y0 = Vector1::new(1.0);
        let y = integrate(|_, y| -y * 2.0, 0.0, 1.5, &y0, &SolverConfig::default()).unwrap();
        assert_relative_eq!(y[0], (-3.0f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn test_harmonic_oscillator_tracks_closed_form() {
        // x'' = -w^2 x, x(0) = 1, v(0) = 0
        let w = 74.0;
        let y0 = Vector2::new(1.0, 0.0);
        let t1 = 0.3;

        let (y, stats) = integrate_with_stats(
            |_, y| Vector2::new(y[1], -w * w * y[0]),
            0.0,
            t1,
            &y0,
            &SolverConfig { max_steps: 10_000, ..Default::default() },
        )
        .unwrap();

        assert_relative_eq!(y[0], (w * t1).cos(), epsilon = 1e-4);
        assert_relative_eq!(y[1], -w * (w * t1).sin(), epsilon = 1e-2);
        assert!(stats.accepted > 1);
        assert_eq!(stats.evaluations, 1 + 6 * (stats.accepted + stats.rejected));
    }

    #[test]
    fn test_time_dependent_rhs() {
        // y' = cos(t), y(0) = 0  ->  y = sin(t)
        let y0 = Vector1::new(0.0);
        let y = integrate(|t, _| Vector1::new(t.cos()), 0.0, 2.0, &y0, &SolverConfig::default()).unwrap();
        assert_relative_eq!(y[0], 2.0f64.sin(), epsilon = 1e-6);
    }

    #[test]
    fn test_backwards_interval() {
        let y0 = Vector1::new((-1.0f64).exp());
        let y = integrate(|_, y| -y, 1.0, 0.0, &y0, &SolverConfig::default()).unwrap();
        assert_relative_eq!(y[0], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_interval_is_identity() {
        let y0 = Vector2::new(3.0, -1.0);
        let (y, stats) =
            integrate_with_stats(|_, y| *y, 0.25, 0.25, &y0, &SolverConfig::default()).unwrap();
        assert_eq!(y, y0);
        assert_eq!(stats, SolverStats::default());
    }

    #[test]
    fn test_step_budget_exhausted() {
        let cfg = SolverConfig { max_steps: 3, method: SolverMethod::Explicit, ..Default::default() };
        let y0 = Vector2::new(1.0, 0.0);
        let err = integrate(|_, y| Vector2::new(y[1], -1.0e6 * y[0]), 0.0, 1.0, &y0, &cfg).unwrap_err();
        assert_eq!(
            std::mem::discriminant(&err),
            std::mem::discriminant(&IntegrationError::StepBudgetExhausted { steps: 0, t: 0.0 })
        );
    }

    // y' = -lambda (y - sin t) + cos t, y(0) = 0  ->  y = sin t
    fn prothero_robinson(lambda: f64) -> impl FnMut(f64, &Vector1<f64>) -> Vector1<f64> {
        move |t, y| Vector1::new(-lambda * (y[0] - t.sin()) + t.cos())
    }

    #[test]
    fn test_stiff_interval_is_flagged() {
        let y0 = Vector1::new(0.0);
        let cfg = SolverConfig { max_steps: 100_000, ..Default::default() };

        let err = integrate(prothero_robinson(1.0e4), 0.0, 1.0, &y0, &cfg).unwrap_err();

        match err {
            IntegrationError::StiffnessDetected { t } => assert!(t > 0.0 && t < 1.0),
            other => panic!("expected StiffnessDetected, got {other:?}"),
        }
    }

    #[test]
    fn test_explicit_only_ignores_stiffness() {
        let y0 = Vector1::new(0.0);
        let cfg = SolverConfig { method: SolverMethod::Explicit, max_steps: 100_000, ..Default::default() };

        let (y, stats) = integrate_with_stats(prothero_robinson(1.0e3), 0.0, 1.0, &y0, &cfg).unwrap();

        assert_relative_eq!(y[0], 1.0f64.sin(), epsilon = 1e-6);
        assert!(stats.stiffness > 1.0);
    }

    #[test]
    fn test_non_finite_derivative() {
        let y0 = Vector1::new(1.0);
        let err = integrate(|_, _| Vector1::new(f64::NAN), 0.0, 1.0, &y0, &SolverConfig::default())
            .unwrap_err();
        assert_eq!(err, IntegrationError::NonFinite { t: 0.0 });
    }
}
