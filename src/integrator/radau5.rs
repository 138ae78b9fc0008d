// ==============================================================================
// radau5.rs - IMPLICIT RADAU IIA (ORDER 5) FOR STIFF INTERVALS
// ------------------------------------------------------------------------------
// Three-stage collocation method, L-stable and stiffly accurate:
//
//   Z_i     = h * sum_j a_ij f(t + c_j h, y + Z_j)     i = 1..3
//   y_{n+1} = y + Z_3
//
// The stage equations are solved by simplified Newton on the 3N x 3N system
//
//   (I - h A (x) J) dZ = -Z + h (A (x) I) F(Z)
//
// with J a forward-difference Jacobian taken at the start of each step and one
// LU factorisation per stage solve.
//
// Error control by step doubling, one step of h against two of h/2:
//
//   err     = (y_half - y_full) / (2^5 - 1)
//   h_new   = h * clamp(0.9 * E^(-1/6), 0.2, 10)
//
// with the same RMS norm and budget rules as dopri5. The two half steps are
// kept. A Newton failure rejects the step and halves h.
// ==============================================================================

use nalgebra::{DMatrix, DVector, SMatrix, SVector};

use crate::error::IntegrationError;
use crate::integrator::dopri5::{all_finite, error_norm, initial_step};
use crate::integrator::settings::{SolverConfig, SolverStats};

const SQRT_6: f64 = 2.449_489_742_783_178;

const C: [f64; 3] = [(4.0 - SQRT_6) / 10.0, (4.0 + SQRT_6) / 10.0, 1.0];

const A: [[f64; 3]; 3] = [
    [
        (88.0 - 7.0 * SQRT_6) / 360.0,
        (296.0 - 169.0 * SQRT_6) / 1800.0,
        (-2.0 + 3.0 * SQRT_6) / 225.0,
    ],
    [
        (296.0 + 169.0 * SQRT_6) / 1800.0,
        (88.0 + 7.0 * SQRT_6) / 360.0,
        (-2.0 - 3.0 * SQRT_6) / 225.0,
    ],
    [(16.0 - SQRT_6) / 36.0, (16.0 + SQRT_6) / 36.0, 1.0 / 9.0],
];

// 2^5 - 1
const RICHARDSON: f64 = 31.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
const MAX_NEWTON_ITER: usize = 7;

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
    let dy = f(t, &y);
    stats.evaluations += 1;
    if !all_finite(&y) || !all_finite(&dy) {
        return Err(IntegrationError::NonFinite { t });
    }

    let mut h = cfg
        .initial_step
        .map(f64::abs)
        .unwrap_or_else(|| initial_step(&y, &dy, cfg))
        .min(span.abs());
    let mut last_rejected = false;

    let mut newton = StageSolver {
        jac: jacobian(&mut f, t, &y, &dy, &mut stats),
        rtol: cfg.rtol,
        atol: cfg.atol,
        tol: (10.0 * f64::EPSILON / cfg.rtol).max(cfg.rtol.sqrt().min(0.03)),
    };
    let mut jac_stale = false;

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

        if 1.01 * h >= remaining {
            h = remaining;
        }
        if h <= 16.0 * f64::EPSILON * t.abs().max(1.0) {
            return Err(IntegrationError::StepSizeUnderflow { h, t });
        }

        if jac_stale {
            let dy = f(t, &y);
            stats.evaluations += 1;
            if !all_finite(&dy) {
                return Err(IntegrationError::NonFinite { t });
            }
            newton.jac = jacobian(&mut f, t, &y, &dy, &mut stats);
            jac_stale = false;
        }

        let hs = h * dir;
        let Some((y_new, err)) = newton.doubled_step(&mut f, t, &y, hs, cfg, &mut stats) else {
            stats.rejected += 1;
            h *= 0.5;
            last_rejected = true;
            continue;
        };

        // NaN error compares false and falls into the reject branch.
        if err <= 1.0 {
            stats.accepted += 1;
            stats.stiffness = stats.stiffness.max(h * inf_norm(&newton.jac));

            t = if h == remaining { t1 } else { t + hs };
            y = y_new;
            if !all_finite(&y) {
                return Err(IntegrationError::NonFinite { t });
            }
            jac_stale = true;

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

/// Simplified Newton for the collocation stages around one Jacobian.
struct StageSolver<const N: usize> {
    jac: SMatrix<f64, N, N>,
    rtol: f64,
    atol: f64,
    /// Convergence threshold on the scaled Newton update.
    tol: f64,
}

impl<const N: usize> StageSolver<N> {
    /// Two half steps plus the scaled error against one full step.
    fn doubled_step<F>(
        &self,
        f: &mut F,
        t: f64,
        y: &SVector<f64, N>,
        hs: f64,
        cfg: &SolverConfig,
        stats: &mut SolverStats,
    ) -> Option<(SVector<f64, N>, f64)>
    where
        F: FnMut(f64, &SVector<f64, N>) -> SVector<f64, N>,
    {
        let full = self.step(f, t, y, hs, stats)?;
        let half = 0.5 * hs;
        let mid = self.step(f, t, y, half, stats)?;
        let end = self.step(f, t + half, &mid, half, stats)?;

        let err = (end - full) / RICHARDSON;
        Some((end, error_norm(&err, y, &end, cfg)))
    }

    fn step<F>(
        &self,
        f: &mut F,
        t: f64,
        y: &SVector<f64, N>,
        h: f64,
        stats: &mut SolverStats,
    ) -> Option<SVector<f64, N>>
    where
        F: FnMut(f64, &SVector<f64, N>) -> SVector<f64, N>,
    {
        let n3 = 3 * N;
        let system = DMatrix::from_fn(n3, n3, |r, c| {
            let identity = if r == c { 1.0 } else { 0.0 };
            identity - h * A[r / N][c / N] * self.jac[(r % N, c % N)]
        });
        let lu = system.lu();

        let mut z = DVector::<f64>::zeros(n3);
        let mut prev_norm = f64::INFINITY;

        for _ in 0..MAX_NEWTON_ITER {
            let fz: [SVector<f64, N>; 3] = std::array::from_fn(|i| {
                let stage = SVector::<f64, N>::from_fn(|k, _| z[i * N + k]);
                f(t + C[i] * h, &(y + stage))
            });
            stats.evaluations += 3;

            let residual = DVector::from_fn(n3, |r, _| {
                let (i, k) = (r / N, r % N);
                -z[r] + h * (A[i][0] * fz[0][k] + A[i][1] * fz[1][k] + A[i][2] * fz[2][k])
            });
            let dz = lu.solve(&residual)?;
            z += &dz;

            let norm = self.scaled_norm(&dz, y);
            if !norm.is_finite() || norm >= prev_norm {
                return None;
            }
            if norm <= self.tol {
                return Some(y + SVector::<f64, N>::from_fn(|k, _| z[2 * N + k]));
            }
            prev_norm = norm;
        }

        None
    }

    /// RMS over all stages, each scaled by the tolerance of its component.
    fn scaled_norm(&self, dz: &DVector<f64>, y: &SVector<f64, N>) -> f64 {
        let sum: f64 = dz
            .iter()
            .enumerate()
            .map(|(r, d)| {
                let sc = self.atol + self.rtol * y[r % N].abs();
                (d / sc).powi(2)
            })
            .sum();
        (sum / dz.len() as f64).sqrt()
    }
}

/// Forward-difference Jacobian of `f` at `(t, y)`; `f0 = f(t, y)`.
fn jacobian<const N: usize, F>(
    f: &mut F,
    t: f64,
    y: &SVector<f64, N>,
    f0: &SVector<f64, N>,
    stats: &mut SolverStats,
) -> SMatrix<f64, N, N>
where
    F: FnMut(f64, &SVector<f64, N>) -> SVector<f64, N>,
{
    let mut jac = SMatrix::<f64, N, N>::zeros();
    for l in 0..N {
        let mut shifted = *y;
        shifted[l] += f64::EPSILON.sqrt() * y[l].abs().max(1.0);
        let delta = shifted[l] - y[l];
        jac.set_column(l, &((f(t, &shifted) - f0) / delta));
    }
    stats.evaluations += N;
    stats.jacobians += 1;
    jac
}

fn inf_norm<const N: usize>(jac: &SMatrix<f64, N, N>) -> f64 {
    (0..N)
        .map(|i| (0..N).map(|j| jac[(i, j)].abs()).sum::<f64>())
        .fold(0.0, f64::max)
}

fn step_factor(err: f64) -> f64 {
    if err == 0.0 {
        return MAX_FACTOR;
    }
    (SAFETY * err.powf(-1.0 / 6.0)).clamp(MIN_FACTOR, MAX_FACTOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Vector1, Vector2};

    #[test]
    fn test_tableau_rows_sum_to_nodes() {
        for i in 0..3 {
            assert_relative_eq!(A[i].iter().sum::<f64>(), C[i], epsilon = 1e-15);
        }
        // stiffly accurate: last row is the quadrature weights, summing to 1
        assert_relative_eq!(A[2].iter().sum::<f64>(), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_exponential_decay() {
        let y0 = Vector1::new(1.0);
        let y = integrate(|_, y| -y * 2.0, 0.0, 1.5, &y0, &SolverConfig::default()).unwrap();
        assert_relative_eq!(y[0], (-3.0f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn test_stiff_forced_decay_in_few_steps() {
        // y' = -lambda (y - sin t) + cos t, y(0) = 0  ->  y = sin t
        let lambda = 1.0e7;
        let y0 = Vector1::new(0.0);

        let (y, stats) = integrate_with_stats(
            |t, y| Vector1::new(-lambda * (y[0] - t.sin()) + t.cos()),
            0.0,
            1.0,
            &y0,
            &SolverConfig::default(),
        )
        .unwrap();

        assert_relative_eq!(y[0], 1.0f64.sin(), epsilon = 1e-6);
        assert!(stats.accepted + stats.rejected < 500);
        assert!(stats.stiffness > 1.0e3);
    }

    #[test]
    fn test_damped_oscillator_matches_closed_form() {
        // x'' + 2 x' + 101 x = 0, x(0) = 1, v(0) = -1  ->  x = e^-t cos(10 t)
        let y0 = Vector2::new(1.0, -1.0);
        let t1 = 0.7;

        let y = integrate(
            |_, y| Vector2::new(y[1], -2.0 * y[1] - 101.0 * y[0]),
            0.0,
            t1,
            &y0,
            &SolverConfig { max_steps: 5_000, ..Default::default() },
        )
        .unwrap();

        assert_relative_eq!(y[0], (-t1).exp() * (10.0 * t1).cos(), epsilon = 1e-6);
    }

    #[test]
    fn test_non_finite_derivative() {
        let y0 = Vector1::new(1.0);
        let err = integrate(|_, _| Vector1::new(f64::NAN), 0.0, 1.0, &y0, &SolverConfig::default())
            .unwrap_err();
        assert_eq!(err, IntegrationError::NonFinite { t: 0.0 });
    }
}
