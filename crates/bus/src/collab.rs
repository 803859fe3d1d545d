//! External collaborators of the scheduler: where transfer durations come
//! from and how time passes.

use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use duplex_core::BusConfig;

/// Source of task transfer durations, in time units.
pub trait DurationSource: Send {
    fn next_duration(&mut self) -> u64;
}

/// Uniform durations over `[0, max]`, reproducible from a seed.
#[derive(Debug)]
pub struct RandomDurations {
    rng: StdRng,
    max: u64,
}

impl RandomDurations {
    pub fn new(seed: u64, max: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max,
        }
    }

    pub fn from_config(config: &BusConfig) -> Self {
        Self::new(config.seed, config.max_duration)
    }
}

impl DurationSource for RandomDurations {
    fn next_duration(&mut self) -> u64 {
        self.rng.gen_range(0..=self.max)
    }
}

/// Every task gets the same duration.
#[derive(Debug, Clone, Copy)]
pub struct FixedDurations(pub u64);

impl DurationSource for FixedDurations {
    fn next_duration(&mut self) -> u64 {
        self.0
    }
}

/// Blocks the calling thread for a number of time units.
pub trait Delay: Send + Sync {
    fn wait_units(&self, units: u64);
}

/// Real sleeping, one time unit = `unit`.
#[derive(Debug, Clone, Copy)]
pub struct SleepDelay {
    unit: Duration,
}

impl SleepDelay {
    pub fn new(unit: Duration) -> Self {
        Self { unit }
    }

    pub fn from_config(config: &BusConfig) -> Self {
        Self::new(config.time_unit())
    }

    fn span(&self, units: u64) -> Duration {
        self.unit.saturating_mul(u32::try_from(units).unwrap_or(u32::MAX))
    }
}

impl Delay for SleepDelay {
    fn wait_units(&self, units: u64) {
        if units > 0 {
            thread::sleep(self.span(units));
        }
    }
}

/// Returns immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Delay for NoDelay {
    fn wait_units(&self, _units: u64) {}
}
