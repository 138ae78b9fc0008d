// ==============================================================================
// switching.rs - EXPLICIT/IMPLICIT METHOD SELECTION PER INTERVAL
// ------------------------------------------------------------------------------
// Under SolverMethod::Auto an interval starts on whichever method the previous
// interval ended on:
//
//   Nonstiff: dopri5; on StiffnessDetected or StepBudgetExhausted the interval
//             is restarted from t0 on radau5 with a fresh budget.
//   Stiff:    radau5 directly.
//
// After a radau5 interval the regime drops back to Nonstiff when every accepted
// step had |h| * ||J||_inf inside the dopri5 stability limit.
// ==============================================================================

use nalgebra::SVector;

use crate::error::IntegrationError;
use crate::integrator::dopri5::{self, STIFF_LIMIT};
use crate::integrator::radau5;
use crate::integrator::settings::{SolverConfig, SolverMethod, SolverStats};

/// Which method the next interval starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Regime {
    #[default]
    Nonstiff,
    Stiff,
}

/// Outcome of one interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solved<const N: usize> {
    pub state: SVector<f64, N>,
    /// Regime to start the next interval on.
    pub regime: Regime,
    /// Stats of the method that produced `state`.
    pub stats: SolverStats,
}

/// Integrates `dy/dt = f(t, y)` over `[t0, t1]` with the method `cfg` selects.
pub fn integrate<const N: usize, F>(
    mut f: F,
    t0: f64,
    t1: f64,
    y0: &SVector<f64, N>,
    cfg: &SolverConfig,
    regime: Regime,
) -> Result<Solved<N>, IntegrationError>
where
    F: FnMut(f64, &SVector<f64, N>) -> SVector<f64, N>,
{
    match (cfg.method, regime) {
        (SolverMethod::Explicit, _) => {
            let (state, stats) = dopri5::integrate_with_stats(f, t0, t1, y0, cfg)?;
            Ok(Solved { state, regime: Regime::Nonstiff, stats })
        }
        (SolverMethod::Implicit, _) => {
            let (state, stats) = radau5::integrate_with_stats(f, t0, t1, y0, cfg)?;
            Ok(Solved { state, regime: Regime::Stiff, stats })
        }
        (SolverMethod::Auto, Regime::Nonstiff) => {
            match dopri5::integrate_with_stats(&mut f, t0, t1, y0, cfg) {
                Ok((state, stats)) => Ok(Solved { state, regime: Regime::Nonstiff, stats }),
                Err(
                    e @ (IntegrationError::StiffnessDetected { .. }
                    | IntegrationError::StepBudgetExhausted { .. }),
                ) => {
                    tracing::debug!(t0, t1, "explicit solver gave up ({e}), switching to implicit");
                    implicit_auto(f, t0, t1, y0, cfg)
                }
                Err(e) => Err(e),
            }
        }
        (SolverMethod::Auto, Regime::Stiff) => implicit_auto(f, t0, t1, y0, cfg),
    }
}

fn implicit_auto<const N: usize, F>(
    f: F,
    t0: f64,
    t1: f64,
    y0: &SVector<f64, N>,
    cfg: &SolverConfig,
) -> Result<Solved<N>, IntegrationError>
where
    F: FnMut(f64, &SVector<f64, N>) -> SVector<f64, N>,
{
    let (state, stats) = radau5::integrate_with_stats(f, t0, t1, y0, cfg)?;
    let regime = if stats.stiffness < STIFF_LIMIT {
        Regime::Nonstiff
    } else {
        Regime::Stiff
    };
    Ok(Solved { state, regime, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector1;

    fn stiff_forced(t: f64, y: &Vector1<f64>) -> Vector1<f64> {
        Vector1::new(-1.0e6 * (y[0] - t.sin()) + t.cos())
    }

    #[test]
    fn test_auto_falls_back_on_stiff_interval() {
        let y0 = Vector1::new(0.0);

        let solved = integrate(stiff_forced, 0.0, 1.0, &y0, &SolverConfig::default(), Regime::Nonstiff)
            .unwrap();

        assert_relative_eq!(solved.state[0], 1.0f64.sin(), epsilon = 1e-6);
        assert_eq!(solved.regime, Regime::Stiff);
        assert!(solved.stats.jacobians > 0);
    }

    #[test]
    fn test_explicit_only_does_not_fall_back() {
        let y0 = Vector1::new(0.0);
        let cfg = SolverConfig { method: SolverMethod::Explicit, ..Default::default() };

        let err = integrate(stiff_forced, 0.0, 1.0, &y0, &cfg, Regime::Stiff).unwrap_err();

        assert!(matches!(err, IntegrationError::StepBudgetExhausted { .. }));
    }

    #[test]
    fn test_nonstiff_interval_stays_explicit() {
        let y0 = Vector1::new(1.0);

        let solved =
            integrate(|_, y| -y, 0.0, 1.0, &y0, &SolverConfig::default(), Regime::Nonstiff).unwrap();

        assert_relative_eq!(solved.state[0], (-1.0f64).exp(), epsilon = 1e-6);
        assert_eq!(solved.regime, Regime::Nonstiff);
        assert_eq!(solved.stats.jacobians, 0);
    }

    #[test]
    fn test_stiff_regime_drops_back_when_easy() {
        let y0 = Vector1::new(1.0);

        let solved = integrate(|_, y| -y, 0.0, 1.0, &y0, &SolverConfig::default(), Regime::Stiff).unwrap();

        assert_relative_eq!(solved.state[0], (-1.0f64).exp(), epsilon = 1e-6);
        assert_eq!(solved.regime, Regime::Nonstiff);
    }

    #[test]
    fn test_non_finite_is_not_retried() {
        let y0 = Vector1::new(1.0);
        let err = integrate(
            |_, _| Vector1::new(f64::NAN),
            0.0,
            1.0,
            &y0,
            &SolverConfig::default(),
            Regime::Nonstiff,
        )
        .unwrap_err();
        assert_eq!(err, IntegrationError::NonFinite { t: 0.0 });
    }
}
