//! Lock-protected bus bookkeeping: occupancy, direction, wait counters and
//! outstanding grants.
//!
//! Nothing in here blocks or signals; [`BusController`](crate::BusController)
//! owns the lock and the per-class condition variables and calls into this
//! module to make every admission and wake decision.

use serde::Serialize;

use duplex_core::{Direction, Priority, TaskSpec, WaitClass};

/// Shared state of the bus. Only ever touched while holding the controller lock.
#[derive(Debug)]
pub(crate) struct BusState {
    capacity: usize,
    occupied: usize,
    /// `None` while nobody is onboard and no slot is reserved.
    direction: Option<Direction>,
    /// Tasks queued per wait class, including those already granted a slot
    /// that have not yet re-acquired the lock.
    waiting: [usize; 4],
    /// Grants issued per wait class and not yet consumed.
    granted: [usize; 4],
    /// Sum of `granted`: slots promised to woken tasks.
    reserved: usize,
}

/// Copy of [`BusState`] taken under the lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusSnapshot {
    pub capacity: usize,
    pub occupied: usize,
    pub direction: Option<Direction>,
    pub waiting: [usize; 4],
    pub granted: [usize; 4],
    pub reserved: usize,
}

impl BusSnapshot {
    pub fn waiting(&self, class: WaitClass) -> usize {
        self.waiting[class.index()]
    }

    pub fn total_waiting(&self) -> usize {
        self.waiting.iter().sum()
    }

    pub fn is_idle(&self) -> bool {
        self.occupied == 0 && self.reserved == 0 && self.total_waiting() == 0
    }
}

/// Result of one wake pass: how many grants were issued to each class.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct WakePlan {
    pub grants: Vec<(WaitClass, usize)>,
}

impl WakePlan {
    pub fn total(&self) -> usize {
        self.grants.iter().map(|(_, n)| n).sum()
    }
}

impl BusState {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "bus capacity must be at least 1");
        Self {
            capacity,
            occupied: 0,
            direction: None,
            waiting: [0; 4],
            granted: [0; 4],
            reserved: 0,
        }
    }

    pub fn occupied(&self) -> usize {
        self.occupied
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn waiting(&self, class: WaitClass) -> usize {
        self.waiting[class.index()]
    }

    pub fn granted(&self, class: WaitClass) -> usize {
        self.granted[class.index()]
    }

    /// Queued tasks of `class` that have not been granted a slot yet.
    pub fn pending(&self, class: WaitClass) -> usize {
        self.waiting[class.index()] - self.granted[class.index()]
    }

    /// Slots neither occupied nor promised to a woken task.
    pub fn free_slots(&self) -> usize {
        self.capacity - self.occupied - self.reserved
    }

    /// Admission policy: whether `task` has to queue instead of boarding now.
    pub fn must_wait(&self, task: &TaskSpec) -> bool {
        if self.occupied + self.reserved >= self.capacity {
            return true;
        }
        if self.direction.is_some_and(|d| d != task.direction) {
            return true;
        }
        task.priority == Priority::Normal
            && self.waiting(WaitClass::new(Priority::Priority, task.direction)) > 0
    }

    /// Board a task that passed the admission policy.
    pub fn admit(&mut self, direction: Direction) {
        assert!(
            !matches!(self.direction, Some(d) if d != direction),
            "admitting {direction} against {:?} traffic",
            self.direction
        );
        self.occupied += 1;
        self.direction = Some(direction);
        self.check_invariants();
    }

    pub fn enqueue(&mut self, class: WaitClass) {
        self.waiting[class.index()] += 1;
    }

    /// Consume one grant of `class` and board the woken task.
    pub fn take_grant(&mut self, class: WaitClass) {
        let i = class.index();
        assert!(self.granted[i] > 0, "no grant outstanding for {class}");
        assert_eq!(
            self.direction,
            Some(class.direction),
            "grant for {class} outlived its direction"
        );
        self.waiting[i] -= 1;
        self.granted[i] -= 1;
        self.reserved -= 1;
        self.occupied += 1;
        self.check_invariants();
    }

    /// Leave the bus. The direction only resets once no slot is occupied or
    /// reserved, so a granted task never boards against the current flow.
    pub fn leave(&mut self, direction: Direction) {
        assert!(self.occupied > 0, "release without an onboard task");
        assert_eq!(
            self.direction,
            Some(direction),
            "released task does not match the bus direction"
        );
        self.occupied -= 1;
        if self.occupied + self.reserved == 0 {
            self.direction = None;
        }
        self.check_invariants();
    }

    /// Wake policy. Grants slots to queued tasks, priority before normal,
    /// one direction at a time, never exceeding the free capacity.
    pub fn plan_wakeups(&mut self) -> WakePlan {
        let mut plan = WakePlan::default();
        for direction in Direction::ALL {
            if self.direction == Some(direction.opposite()) {
                continue;
            }
            let mut woken = self.grant(WaitClass::new(Priority::Priority, direction), &mut plan);
            let opposing = WaitClass::new(Priority::Priority, direction.opposite());
            if self.waiting(opposing) == 0 {
                woken += self.grant(WaitClass::new(Priority::Normal, direction), &mut plan);
            }
            if woken > 0 {
                self.direction = Some(direction);
            }
        }
        self.check_invariants();
        plan
    }

    fn grant(&mut self, class: WaitClass, plan: &mut WakePlan) -> usize {
        let n = self.free_slots().min(self.pending(class));
        if n > 0 {
            self.granted[class.index()] += n;
            self.reserved += n;
            plan.grants.push((class, n));
        }
        n
    }

    pub fn snapshot(&self) -> BusSnapshot {
        BusSnapshot {
            capacity: self.capacity,
            occupied: self.occupied,
            direction: self.direction,
            waiting: self.waiting,
            granted: self.granted,
            reserved: self.reserved,
        }
    }

    /// Invariant violations are programming defects: abort instead of recovering.
    fn check_invariants(&self) {
        assert!(
            self.occupied + self.reserved <= self.capacity,
            "capacity exceeded: occupied={} reserved={} capacity={}",
            self.occupied,
            self.reserved,
            self.capacity
        );
        assert_eq!(
            self.reserved,
            self.granted.iter().sum::<usize>(),
            "reserved slots out of sync with grants"
        );
        for class in WaitClass::ALL {
            assert!(
                self.granted(class) <= self.waiting(class),
                "more grants than waiters in {class}"
            );
        }
        assert_eq!(
            self.direction.is_none(),
            self.occupied + self.reserved == 0,
            "direction {:?} inconsistent with occupied={} reserved={}",
            self.direction,
            self.occupied,
            self.reserved
        );
    }
}
