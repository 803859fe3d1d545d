//! Hook for watching the controller's decisions in the order they are made.

use parking_lot::Mutex;
use serde::Serialize;

use duplex_core::{Direction, TaskId, WaitClass};

/// A controller decision. Emitted while the controller lock is held, so the
/// sequence seen by an observer is the exact order of decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BusEvent {
    /// A task boarded the bus.
    Admitted {
        task: TaskId,
        class: WaitClass,
        /// `false` when the task boarded by consuming a grant after waiting.
        immediate: bool,
        occupied: usize,
        direction: Direction,
    },
    /// A task could not board and joined its wait class.
    Queued { task: TaskId, class: WaitClass },
    /// A release handed `count` slots to waiters of `class`.
    Granted {
        class: WaitClass,
        count: usize,
        /// Ungranted priority waiters of the same direction once the release has
        /// issued all of its grants.
        pending_priority: usize,
    },
    /// A task left the bus.
    Released {
        task: TaskId,
        occupied: usize,
        direction: Option<Direction>,
    },
}

pub trait BusObserver: Send + Sync {
    fn on_event(&self, event: &BusEvent);
}

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl BusObserver for NoopObserver {
    fn on_event(&self, _event: &BusEvent) {}
}

/// Observer that keeps the full event history in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<BusEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BusEvent> {
        self.events.lock().clone()
    }
}

impl BusObserver for RecordingObserver {
    fn on_event(&self, event: &BusEvent) {
        self.events.lock().push(event.clone());
    }
}
