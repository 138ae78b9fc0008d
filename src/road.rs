// ==============================================================================
// road.rs - ROAD EXCITATION + ROAD HISTORY WINDOW
// ------------------------------------------------------------------------------
// Produces the per-tick road elevation fed to Simulator::advance().
//
// RoadGenerator::sample(t):
//   flat   -> constant elevation
//   sine   -> amplitude * sin(2*pi*frequency*(t + time_offset)) + offset
//   bumps  -> half-sine bumps of random height at random gaps (seeded, so a
//             given seed always yields the same road)
//
// RoadHistory keeps the last N samples as a scrolling ground profile. The wheel
// reads the sample in the middle of the window, so the road visible ahead of
// the wheel reaches it N - 1 - read_index ticks later.
//
// Time here is simulation time (tick * dt), never wall-clock time.
// ==============================================================================

use std::collections::VecDeque;
use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoadExcitation {
    Flat {
        elevation: f64, // m
    },
    Sine {
        amplitude: f64,   // m
        frequency: f64,   // Hz
        offset: f64,      // m, added after the sine
        time_offset: f64, // s
    },
    Bumps {
        height: f64,   // m, tallest bump
        length: f64,   // s, time the wheel spends on one bump
        mean_gap: f64, // s, average flat stretch between bumps
        seed: u64,
    },
}

impl Default for RoadExcitation {
    fn default() -> Self {
        RoadExcitation::Sine {
            amplitude: 0.1,
            frequency: 10.0,
            offset: 0.05,
            time_offset: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadConfig {
    pub excitation: RoadExcitation,
    pub history_len: usize,
    /// Window index read as the road under the wheel; `None` means the middle.
    pub read_index: Option<usize>,
    pub extent: f64, // m, ground profile spans [-extent, extent]
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            excitation: RoadExcitation::default(),
            history_len: 100,
            read_index: None,
            extent: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bump {
    start: f64,
    height: f64,
}

pub struct RoadGenerator {
    excitation: RoadExcitation,
    rng: StdRng,
    next_bump: f64,
    bump: Option<Bump>,
}

impl RoadGenerator {
    pub fn new(excitation: RoadExcitation) -> Self {
        let seed = match excitation {
            RoadExcitation::Bumps { seed, .. } => seed,
            _ => 0,
        };
        let mut generator = Self {
            excitation,
            rng: StdRng::seed_from_u64(seed),
            next_bump: 0.0,
            bump: None,
        };
        generator.next_bump = generator.draw_gap();
        generator
    }

    pub fn excitation(&self) -> &RoadExcitation {
        &self.excitation
    }

    /// Road elevation at simulation time `t`. For bumps, `t` must not decrease
    /// between calls.
    pub fn sample(&mut self, t: f64) -> f64 {
        match self.excitation {
            RoadExcitation::Flat { elevation } => elevation,
            RoadExcitation::Sine { amplitude, frequency, offset, time_offset } => {
                amplitude * (2.0 * PI * frequency * (t + time_offset)).sin() + offset
            }
            RoadExcitation::Bumps { height, length, .. } => self.sample_bumps(t, height, length),
        }
    }

    fn sample_bumps(&mut self, t: f64, height: f64, length: f64) -> f64 {
        if let Some(bump) = self.bump {
            if t >= bump.start + length {
                self.bump = None;
                self.next_bump = bump.start + length + self.draw_gap();
            }
        }

        if self.bump.is_none() && t >= self.next_bump {
            let h = height * self.rng.gen_range(0.5..=1.0);
            self.bump = Some(Bump { start: self.next_bump, height: h });
        }

        match self.bump {
            Some(bump) if length > 0.0 => {
                let phase = ((t - bump.start) / length).clamp(0.0, 1.0);
                bump.height * (PI * phase).sin()
            }
            _ => 0.0,
        }
    }

    fn draw_gap(&mut self) -> f64 {
        match self.excitation {
            RoadExcitation::Bumps { mean_gap, .. } if mean_gap > 0.0 => {
                mean_gap * self.rng.gen_range(0.5..1.5)
            }
            _ => 0.0,
        }
    }
}

/// Sliding window of recent road samples, newest last.
#[derive(Debug, Clone)]
pub struct RoadHistory {
    samples: VecDeque<f64>,
    read_index: usize,
    extent: f64,
}

impl RoadHistory {
    pub fn new(len: usize, read_index: Option<usize>, extent: f64) -> Self {
        let len = len.max(1);
        let read_index = read_index.unwrap_or(len / 2).min(len - 1);
        Self {
            samples: VecDeque::from(vec![0.0; len]),
            read_index,
            extent,
        }
    }

    pub fn from_config(cfg: &RoadConfig) -> Self {
        Self::new(cfg.history_len, cfg.read_index, cfg.extent)
    }

    /// Appends the newest sample and returns the elevation under the wheel.
    pub fn push(&mut self, sample: f64) -> f64 {
        self.samples.pop_front();
        self.samples.push_back(sample);
        self.current()
    }

    pub fn current(&self) -> f64 {
        self.samples[self.read_index]
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.iter_mut().for_each(|s| *s = 0.0);
    }

    /// Ground polyline `[x, y]`, oldest sample at `-extent`.
    pub fn profile(&self) -> Vec<[f64; 2]> {
        let n = self.samples.len();
        let dx = if n > 1 { 2.0 * self.extent / (n - 1) as f64 } else { 0.0 };
        self.samples
            .iter()
            .enumerate()
            .map(|(i, &y)| [-self.extent + dx * i as f64, y])
            .collect()
    }
}
