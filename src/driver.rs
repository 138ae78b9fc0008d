// ==============================================================================
// driver.rs - TICK DRIVER (ROAD -> SIMULATOR -> SNAPSHOT)
// ------------------------------------------------------------------------------
// One tick:
//   1) sample the road generator at simulation time tick * dt
//   2) push the sample into the road history; read the elevation under the wheel
//   3) Simulator::advance(elevation)
//   4) package state + stretches + resting limits + ground profile as a Snapshot
//
// The tick counter and road advance even when the step fails; the simulator
// keeps its last good state and the error goes back to the caller.
// ==============================================================================

use serde::Serialize;

use crate::config::SimConfig;
use crate::error::SimError;
use crate::integrator::Simulator;
use crate::road::{RoadExcitation, RoadGenerator, RoadHistory};
use crate::suspension::{CornerState, Corrections, QuarterCar, StateVector};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub time: f64,  // s
    pub road: f64,  // m, elevation under the wheel
    pub state: CornerState,
    pub tire_stretch: f64,
    pub suspension_stretch: f64,
    pub limits: Corrections,
    pub ground: Vec<[f64; 2]>,
}

pub struct Driver {
    sim: Simulator<QuarterCar>,
    road: RoadGenerator,
    history: RoadHistory,
    initial_state: StateVector,
    tick: u64,
    last_road: f64,
}

impl Driver {
    pub fn new(cfg: &SimConfig) -> Result<Self, SimError> {
        let sim = cfg.build_simulator()?;
        Ok(Self {
            initial_state: sim.state(),
            sim,
            road: RoadGenerator::new(cfg.road.excitation),
            history: RoadHistory::from_config(&cfg.road),
            tick: 0,
            last_road: 0.0,
        })
    }

    pub fn tick(&mut self) -> Result<Snapshot, SimError> {
        let t = self.tick as f64 * self.sim.timestep();
        let sample = self.road.sample(t);
        let road = self.history.push(sample);
        self.tick += 1;
        self.last_road = road;

        self.sim.advance(road)?;
        Ok(self.snapshot())
    }

    /// Snapshot of the current state without stepping.
    pub fn snapshot(&self) -> Snapshot {
        let x = self.sim.state();
        let car = self.sim.model();
        Snapshot {
            tick: self.tick,
            time: self.sim.time(),
            road: self.last_road,
            state: x.into(),
            tire_stretch: car.tire_stretch(&x, self.last_road),
            suspension_stretch: car.suspension_stretch(&x),
            limits: car.limits(&x, self.last_road),
            ground: self.history.profile(),
        }
    }

    /// Back to the configured initial state with a fresh road.
    pub fn reset(&mut self) {
        let excitation: RoadExcitation = *self.road.excitation();
        self.sim.reset(self.initial_state);
        self.road = RoadGenerator::new(excitation);
        self.history.clear();
        self.tick = 0;
        self.last_road = 0.0;
        tracing::info!("simulation reset");
    }

    pub fn simulator(&self) -> &Simulator<QuarterCar> {
        &self.sim
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }
}
