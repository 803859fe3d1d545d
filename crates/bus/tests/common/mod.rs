#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use duplex_bus::{Admission, BusController, BusEvent, BusSnapshot};
use duplex_core::{Direction, Priority, TaskSpec, WaitClass};

pub const TIMEOUT: Duration = Duration::from_secs(5);
pub const SETTLE: Duration = Duration::from_millis(50);

pub const PS: WaitClass = WaitClass::new(Priority::Priority, Direction::Send);
pub const PR: WaitClass = WaitClass::new(Priority::Priority, Direction::Receive);
pub const NS: WaitClass = WaitClass::new(Priority::Normal, Direction::Send);
pub const NR: WaitClass = WaitClass::new(Priority::Normal, Direction::Receive);

pub fn spec(id: u64, class: WaitClass) -> TaskSpec {
    TaskSpec::new(id, class.direction, class.priority, 0)
}

/// Poll the controller until `cond` holds, panicking after [`TIMEOUT`].
pub fn wait_for(controller: &BusController, cond: impl Fn(&BusSnapshot) -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    loop {
        let snap = controller.snapshot();
        if cond(&snap) {
            return;
        }
        assert!(Instant::now() < deadline, "timed out waiting, state: {snap:?}");
        thread::sleep(Duration::from_millis(1));
    }
}

/// Call `acquire` on a separate thread and return without releasing.
pub fn spawn_acquire(controller: &Arc<BusController>, task: TaskSpec) -> JoinHandle<Admission> {
    let controller = Arc::clone(controller);
    thread::spawn(move || controller.acquire(&task))
}

/// Replays a recorded event history and checks the bus invariants at every step:
/// capacity, single direction, normal tasks never admitted while a priority task
/// of their direction is queued, wake bursts bounded by free capacity, and every
/// grant consumed by exactly one boarding.
pub fn check_history(events: &[BusEvent], capacity: usize) {
    let mut onboard: HashMap<u64, Direction> = HashMap::new();
    let mut waiting: HashMap<WaitClass, usize> = HashMap::new();
    let mut burst_budget: Option<usize> = None;
    let mut grants = 0usize;
    let mut boarded_after_wait = 0usize;

    for (i, event) in events.iter().enumerate() {
        match event {
            BusEvent::Admitted {
                task,
                class,
                immediate,
                occupied,
                direction,
            } => {
                burst_budget = None;
                if *immediate && class.priority == Priority::Normal {
                    let queued_priority = waiting
                        .get(&WaitClass::new(Priority::Priority, class.direction))
                        .copied()
                        .unwrap_or(0);
                    assert_eq!(
                        queued_priority, 0,
                        "event {i}: normal task {task} admitted past queued priority tasks"
                    );
                }
                if !immediate {
                    boarded_after_wait += 1;
                    *waiting.get_mut(class).expect("boarded without queueing") -= 1;
                }
                assert!(
                    onboard.values().all(|d| d == direction),
                    "event {i}: task {task} boarded against the current direction"
                );
                onboard.insert(*task, *direction);
                assert_eq!(onboard.len(), *occupied, "event {i}: occupancy mismatch");
                assert!(*occupied <= capacity, "event {i}: capacity exceeded");
            }
            BusEvent::Queued { class, .. } => {
                burst_budget = None;
                *waiting.entry(*class).or_default() += 1;
            }
            BusEvent::Released {
                task, occupied, ..
            } => {
                onboard.remove(task).expect("released a task that was not onboard");
                assert_eq!(onboard.len(), *occupied, "event {i}: occupancy mismatch");
                burst_budget = Some(capacity - occupied);
            }
            BusEvent::Granted {
                class,
                count,
                pending_priority,
            } => {
                let budget = burst_budget
                    .as_mut()
                    .expect("grant outside of a release");
                assert!(*count <= *budget, "event {i}: wake burst exceeds free capacity");
                *budget -= count;
                if class.priority == Priority::Normal {
                    assert_eq!(
                        *pending_priority, 0,
                        "event {i}: normal {class} woken ahead of queued priority tasks"
                    );
                }
                grants += count;
            }
        }
    }

    assert_eq!(grants, boarded_after_wait, "every grant must lead to exactly one boarding");
    assert!(onboard.is_empty(), "tasks still onboard at end of history: {onboard:?}");
}
