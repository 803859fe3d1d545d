use std::collections::BTreeMap;

use serde::Serialize;

use duplex_core::{Direction, WaitClass};

/// Bus operational counters, updated inside the controller critical section.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BusMetrics {
    /// Tasks that boarded without queueing.
    pub admitted_immediately: u64,
    /// Tasks that boarded after waiting, by wait class name.
    pub admitted_after_wait: BTreeMap<String, u64>,
    /// Completed releases.
    pub released: u64,
    /// Highest occupancy observed.
    pub max_occupied: usize,
    /// Number of times the active direction flipped.
    pub direction_changes: u64,
    /// Releases that granted at least one slot.
    pub wake_bursts: u64,
    /// Total grants handed out by releases.
    pub tasks_woken: u64,
    #[serde(skip)]
    last_direction: Option<Direction>,
}

impl BusMetrics {
    pub fn record_admission(&mut self, class: WaitClass, immediate: bool, occupied: usize) {
        if immediate {
            self.admitted_immediately += 1;
        } else {
            *self
                .admitted_after_wait
                .entry(class.to_string())
                .or_default() += 1;
        }
        self.max_occupied = self.max_occupied.max(occupied);
        self.record_direction(class.direction);
    }

    pub fn record_release(&mut self) {
        self.released += 1;
    }

    pub fn record_wake_burst(&mut self, woken: usize) {
        if woken > 0 {
            self.wake_bursts += 1;
            self.tasks_woken += woken as u64;
        }
    }

    fn record_direction(&mut self, direction: Direction) {
        if self.last_direction.is_some_and(|d| d != direction) {
            self.direction_changes += 1;
        }
        self.last_direction = Some(direction);
    }

    /// Total tasks that have boarded the bus.
    pub fn admitted(&self) -> u64 {
        self.admitted_immediately + self.admitted_after_wait.values().sum::<u64>()
    }
}
