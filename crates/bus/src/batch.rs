//! Batch runner: spawn one thread per task and wait for the batch to drain.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use duplex_core::{BusConfig, Direction, DuplexError, Priority, Result, TaskId, TaskSpec};

use crate::collab::{Delay, DurationSource, RandomDurations, SleepDelay};
use crate::controller::BusController;
use crate::metrics::BusMetrics;
use crate::observer::{BusObserver, NoopObserver};
use crate::state::BusSnapshot;
use crate::task::{Task, TaskOutcome};

/// One-time bus setup: an empty bus with the configured capacity, shared by
/// every task spawned afterwards.
pub fn init(config: &BusConfig) -> Arc<BusController> {
    init_with_observer(config, Arc::new(NoopObserver))
}

/// Like [`init`], with every controller decision reported to `observer`.
pub fn init_with_observer(
    config: &BusConfig,
    observer: Arc<dyn BusObserver>,
) -> Arc<BusController> {
    info!(capacity = config.capacity, "bus initialized");
    Arc::new(BusController::with_observer(config.capacity, observer))
}

/// Number of tasks to spawn per class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub priority_send: usize,
    pub priority_receive: usize,
    pub normal_send: usize,
    pub normal_receive: usize,
}

impl BatchRequest {
    pub fn new(
        priority_send: usize,
        priority_receive: usize,
        normal_send: usize,
        normal_receive: usize,
    ) -> Self {
        Self {
            priority_send,
            priority_receive,
            normal_send,
            normal_receive,
        }
    }

    pub fn total(&self) -> usize {
        self.priority_send + self.priority_receive + self.normal_send + self.normal_receive
    }

    pub fn validate(&self, max_tasks: usize) -> Result<()> {
        let requested = self.total();
        if requested > max_tasks {
            return Err(DuplexError::BatchTooLarge {
                requested,
                max: max_tasks,
            });
        }
        Ok(())
    }

    /// Classes in spawn order: priority senders, priority receivers, senders, receivers.
    fn groups(&self) -> [(Priority, Direction, usize); 4] {
        [
            (Priority::Priority, Direction::Send, self.priority_send),
            (Priority::Priority, Direction::Receive, self.priority_receive),
            (Priority::Normal, Direction::Send, self.normal_send),
            (Priority::Normal, Direction::Receive, self.normal_receive),
        ]
    }
}

/// What a finished batch looked like.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub request: BatchRequest,
    pub tasks: Vec<TaskOutcome>,
    /// Sum of all task durations, in time units.
    pub total_duration: u64,
    pub metrics: BusMetrics,
    pub final_state: BusSnapshot,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn waited(&self) -> usize {
        self.tasks.iter().filter(|t| t.admission.waited()).count()
    }
}

/// Drives batches of tasks through a shared [`BusController`].
pub struct BatchRunner {
    controller: Arc<BusController>,
    durations: Box<dyn DurationSource>,
    delay: Arc<dyn Delay>,
    max_tasks: usize,
    next_id: TaskId,
}

impl BatchRunner {
    pub fn new(
        controller: Arc<BusController>,
        durations: Box<dyn DurationSource>,
        delay: Arc<dyn Delay>,
        max_tasks: usize,
    ) -> Self {
        Self {
            controller,
            durations,
            delay,
            max_tasks,
            next_id: 0,
        }
    }

    /// Runner with seeded random durations and real sleeping.
    pub fn from_config(controller: Arc<BusController>, config: &BusConfig) -> Self {
        Self::new(
            controller,
            Box::new(RandomDurations::from_config(config)),
            Arc::new(SleepDelay::from_config(config)),
            config.max_tasks,
        )
    }

    /// Spawn every requested task, wait `2 x sum(durations)` time units, then
    /// join the task threads.
    ///
    /// # Panics
    ///
    /// Panics if the request exceeds the configured task maximum; callers
    /// check with [`BatchRequest::validate`] first.
    pub fn run_batch(&mut self, request: BatchRequest) -> Result<BatchReport> {
        assert!(
            request.total() <= self.max_tasks,
            "batch of {} tasks exceeds the maximum of {}",
            request.total(),
            self.max_tasks
        );
        let started = Instant::now();
        info!(
            priority_send = request.priority_send,
            priority_receive = request.priority_receive,
            normal_send = request.normal_send,
            normal_receive = request.normal_receive,
            "starting batch"
        );

        // Durations are drawn and summed before any thread is spawned.
        let mut specs = Vec::with_capacity(request.total());
        let mut total_duration = 0u64;
        for (priority, direction, count) in request.groups() {
            for _ in 0..count {
                let spec = TaskSpec::new(
                    self.next_id,
                    direction,
                    priority,
                    self.durations.next_duration(),
                );
                self.next_id += 1;
                total_duration = total_duration
                    .checked_add(spec.duration)
                    .ok_or_else(|| {
                        DuplexError::DurationOverflow(format!(
                            "adding {} to {total_duration}",
                            spec.duration
                        ))
                    })?;
                specs.push(spec);
            }
        }
        // Conservative upper bound on completion, as in the lab harness.
        let wait_units = total_duration.checked_mul(2).ok_or_else(|| {
            DuplexError::DurationOverflow(format!("doubling {total_duration}"))
        })?;

        let mut handles = Vec::with_capacity(specs.len());
        for spec in specs {
            let name = spec.name();
            let controller = Arc::clone(&self.controller);
            let delay = Arc::clone(&self.delay);
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || Task::new(spec).run(&controller, delay.as_ref()))
                .map_err(|e| DuplexError::Spawn(format!("{name}: {e}")))?;
            handles.push((name, handle));
        }

        self.delay.wait_units(wait_units);

        let mut tasks = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            match handle.join() {
                Ok(outcome) => tasks.push(outcome),
                Err(_) => {
                    warn!(task = %name, "task thread panicked");
                    return Err(DuplexError::TaskPanicked(name));
                }
            }
        }

        let report = BatchReport {
            request,
            tasks,
            total_duration,
            metrics: self.controller.metrics(),
            final_state: self.controller.snapshot(),
            elapsed: started.elapsed(),
        };
        info!(
            tasks = report.tasks.len(),
            waited = report.waited(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "batch complete"
        );
        Ok(report)
    }
}
