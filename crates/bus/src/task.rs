//! Task lifecycle: acquire, hold the bus for the transfer, release.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use duplex_core::{TaskSpec, WaitClass};

use crate::collab::Delay;
use crate::controller::{Admission, BusController};

/// Per-task state machine. `Waiting` is skipped on immediate admission and a
/// task never goes back to `Waiting` once onboard.
///
/// Stages are a record of the run: `acquire` blocks the task's own thread, so
/// `Waiting` is entered once `acquire` reports how the task was admitted. Live
/// queue depth is visible through [`BusController::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum TaskStage {
    Created,
    Waiting { class: WaitClass },
    Onboard,
    Transferring,
    Done,
}

impl TaskStage {
    pub fn can_transition_to(self, next: TaskStage) -> bool {
        matches!(
            (self, next),
            (TaskStage::Created, TaskStage::Waiting { .. })
                | (TaskStage::Created, TaskStage::Onboard)
                | (TaskStage::Waiting { .. }, TaskStage::Onboard)
                | (TaskStage::Onboard, TaskStage::Transferring)
                | (TaskStage::Transferring, TaskStage::Done)
        )
    }
}

/// Summary of one finished task run.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub spec: TaskSpec,
    pub admission: Admission,
    /// Time spent inside `acquire`.
    pub wait_time: Duration,
    /// Stages the task went through, in order.
    pub stages: Vec<TaskStage>,
}

/// A single pass of a task over the bus.
#[derive(Debug)]
pub struct Task {
    spec: TaskSpec,
    stages: Vec<TaskStage>,
}

impl Task {
    pub fn new(spec: TaskSpec) -> Self {
        Self {
            spec,
            stages: vec![TaskStage::Created],
        }
    }

    pub fn stage(&self) -> TaskStage {
        *self.stages.last().unwrap_or(&TaskStage::Created)
    }

    fn advance(&mut self, next: TaskStage) {
        let current = self.stage();
        assert!(
            current.can_transition_to(next),
            "{}: illegal transition {current:?} -> {next:?}",
            self.spec.name()
        );
        self.stages.push(next);
    }

    /// Run the task to completion: `acquire`, hold the bus for `duration`
    /// time units, `release`. Consumes the task, so it can only run once.
    pub fn run(mut self, controller: &BusController, delay: &dyn Delay) -> TaskOutcome {
        let started = Instant::now();
        let admission = controller.acquire(&self.spec);
        let wait_time = started.elapsed();

        if let Admission::AfterWait { class } = admission {
            self.advance(TaskStage::Waiting { class });
        }
        self.advance(TaskStage::Onboard);

        self.advance(TaskStage::Transferring);
        debug!(task = %self.spec.name(), units = self.spec.duration, "transferring");
        delay.wait_units(self.spec.duration);

        controller.release(&self.spec);
        self.advance(TaskStage::Done);

        TaskOutcome {
            spec: self.spec,
            admission,
            wait_time,
            stages: self.stages,
        }
    }
}
