//! The bus monitor: one lock over all shared state plus one condition
//! variable per wait class.
//!
//! A waiter never re-contends after waking. The releasing task reserves a slot
//! on its behalf (a grant) before signalling, and the waiter consumes that grant
//! when it re-acquires the lock. Grants are counted per class, so spurious or
//! stolen wakeups simply go back to sleep until a grant is available.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{debug, info};

use duplex_core::{Priority, TaskSpec, WaitClass};

use crate::metrics::BusMetrics;
use crate::observer::{BusEvent, BusObserver, NoopObserver};
use crate::state::{BusSnapshot, BusState};

/// How a task got onto the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Admission {
    Immediate,
    AfterWait { class: WaitClass },
}

impl Admission {
    pub fn waited(&self) -> bool {
        matches!(self, Admission::AfterWait { .. })
    }
}

struct Inner {
    bus: BusState,
    metrics: BusMetrics,
}

/// Arbitrates a capacity-limited, half-duplex bus between concurrent tasks.
pub struct BusController {
    inner: Mutex<Inner>,
    /// Rendezvous per wait class, indexed by [`WaitClass::index`].
    classes: [Condvar; 4],
    observer: Arc<dyn BusObserver>,
}

impl BusController {
    pub fn new(capacity: usize) -> Self {
        Self::with_observer(capacity, Arc::new(NoopObserver))
    }

    pub fn with_observer(capacity: usize, observer: Arc<dyn BusObserver>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                bus: BusState::new(capacity),
                metrics: BusMetrics::default(),
            }),
            classes: std::array::from_fn(|_| Condvar::new()),
            observer,
        }
    }

    /// Block until `task` holds a slot. Never fails.
    pub fn acquire(&self, task: &TaskSpec) -> Admission {
        let class = task.class();
        let mut inner = self.inner.lock();

        if !inner.bus.must_wait(task) {
            inner.bus.admit(task.direction);
            let occupied = inner.bus.occupied();
            inner.metrics.record_admission(class, true, occupied);
            self.emit(&BusEvent::Admitted {
                task: task.id,
                class,
                immediate: true,
                occupied,
                direction: task.direction,
            });
            info!(task = %task.name(), occupied, "acquired slot");
            return Admission::Immediate;
        }

        inner.bus.enqueue(class);
        self.emit(&BusEvent::Queued { task: task.id, class });
        debug!(task = %task.name(), %class, "waiting for a slot");

        // Condvar::wait releases the lock while blocked and re-acquires it on wake.
        while inner.bus.granted(class) == 0 {
            self.classes[class.index()].wait(&mut inner);
        }

        inner.bus.take_grant(class);
        let occupied = inner.bus.occupied();
        inner.metrics.record_admission(class, false, occupied);
        self.emit(&BusEvent::Admitted {
            task: task.id,
            class,
            immediate: false,
            occupied,
            direction: task.direction,
        });
        info!(task = %task.name(), occupied, "acquired slot after waiting");
        Admission::AfterWait { class }
    }

    /// Give up the slot held by `task` and hand free slots to waiters. Never blocks
    /// beyond the controller lock.
    pub fn release(&self, task: &TaskSpec) {
        let mut inner = self.inner.lock();

        inner.bus.leave(task.direction);
        inner.metrics.record_release();
        self.emit(&BusEvent::Released {
            task: task.id,
            occupied: inner.bus.occupied(),
            direction: inner.bus.direction(),
        });
        debug!(task = %task.name(), occupied = inner.bus.occupied(), "released slot");

        let plan = inner.bus.plan_wakeups();
        inner.metrics.record_wake_burst(plan.total());
        for &(class, count) in &plan.grants {
            let pending_priority =
                inner.bus.pending(WaitClass::new(Priority::Priority, class.direction));
            self.emit(&BusEvent::Granted {
                class,
                count,
                pending_priority,
            });
            debug!(%class, count, "granted slots");
            for _ in 0..count {
                self.classes[class.index()].notify_one();
            }
        }
    }

    pub fn snapshot(&self) -> BusSnapshot {
        self.inner.lock().bus.snapshot()
    }

    pub fn metrics(&self) -> BusMetrics {
        self.inner.lock().metrics.clone()
    }

    fn emit(&self, event: &BusEvent) {
        self.observer.on_event(event);
    }
}

impl std::fmt::Debug for BusController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusController")
            .field("state", &self.snapshot())
            .finish()
    }
}
