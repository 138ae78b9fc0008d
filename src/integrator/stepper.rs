use crate::error::{SimError, require_finite_positive};
use crate::integrator::settings::SolverConfig;
use crate::integrator::switching::{self, Regime};
use crate::suspension::{StateVector, SuspensionModel};

/// Fixed-timestep stepper owning the current state of a [`SuspensionModel`].
///
/// Each [`advance`](Simulator::advance) integrates the model over one timestep
/// with the road held constant, keeps the end state, and runs it through the
/// model's correction pass. Intervals start on the explicit solver and move to
/// the implicit one once the model turns out stiff; the current [`Regime`] is
/// carried between ticks. `advance` takes `&mut self`; callers driving ticks
/// from several threads must serialize access themselves.
#[derive(Debug, Clone)]
pub struct Simulator<M> {
    model: M,
    state: StateVector,
    timestep: f64, // s
    time: f64,     // s, elapsed simulation time
    solver: SolverConfig,
    regime: Regime,
}

impl<M: SuspensionModel> Simulator<M> {
    pub fn new(model: M, initial_state: StateVector, timestep: f64) -> Result<Self, SimError> {
        model.validate()?;
        require_finite_positive("timestep", timestep)?;

        tracing::debug!(timestep, state = ?initial_state.as_slice(), "simulator created");

        Ok(Self {
            model,
            state: initial_state,
            timestep,
            time: 0.0,
            solver: SolverConfig::default(),
            regime: Regime::default(),
        })
    }

    pub fn with_solver(mut self, solver: SolverConfig) -> Result<Self, SimError> {
        solver.validate()?;
        self.solver = solver;
        Ok(self)
    }

    /// Advances one timestep under road elevation `road` and returns the new state.
    ///
    /// On failure the current state, time and regime are left untouched.
    pub fn advance(&mut self, road: f64) -> Result<StateVector, SimError> {
        let t0 = self.time;
        let t1 = t0 + self.timestep;
        let model = &self.model;

        let solved = switching::integrate(
            |t, x| model.derivative(t, x, road),
            t0,
            t1,
            &self.state,
            &self.solver,
            self.regime,
        )?;

        if solved.regime != self.regime {
            tracing::debug!(t = t1, from = ?self.regime, to = ?solved.regime, "solver regime changed");
        }

        self.state = self.model.correct(solved.state, road);
        self.time = t1;
        self.regime = solved.regime;
        Ok(self.state)
    }

    /// Replaces the current state, rewinds the clock and starts over on the
    /// explicit solver.
    pub fn reset(&mut self, state: StateVector) {
        self.state = state;
        self.time = 0.0;
        self.regime = Regime::default();
    }

    pub fn state(&self) -> StateVector {
        self.state
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn solver(&self) -> &SolverConfig {
        &self.solver
    }

    pub fn regime(&self) -> Regime {
        self.regime
    }
}
