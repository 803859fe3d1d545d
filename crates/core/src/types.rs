use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction of a transfer over the half-duplex bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Send,
    Receive,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Send, Direction::Receive];

    pub fn opposite(self) -> Self {
        match self {
            Direction::Send => Direction::Receive,
            Direction::Receive => Direction::Send,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Send => f.write_str("send"),
            Direction::Receive => f.write_str("receive"),
        }
    }
}

/// Task priority class. Priority tasks are preferred over normal tasks
/// contending for the same direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Normal,
    Priority,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Normal => f.write_str("normal"),
            Priority::Priority => f.write_str("priority"),
        }
    }
}

/// One of the four (priority x direction) blocking groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaitClass {
    pub priority: Priority,
    pub direction: Direction,
}

impl WaitClass {
    pub const ALL: [WaitClass; 4] = [
        WaitClass::new(Priority::Priority, Direction::Send),
        WaitClass::new(Priority::Priority, Direction::Receive),
        WaitClass::new(Priority::Normal, Direction::Send),
        WaitClass::new(Priority::Normal, Direction::Receive),
    ];

    pub const fn new(priority: Priority, direction: Direction) -> Self {
        Self { priority, direction }
    }

    /// Dense index into per-class arrays, in the order of [`WaitClass::ALL`].
    pub const fn index(self) -> usize {
        let p = match self.priority {
            Priority::Priority => 0,
            Priority::Normal => 2,
        };
        let d = match self.direction {
            Direction::Send => 0,
            Direction::Receive => 1,
        };
        p + d
    }
}

impl fmt::Display for WaitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.priority, self.direction)
    }
}

/// Identifier assigned to a task when it is created.
pub type TaskId = u64;

/// An immutable unit of work: one pass over the bus in a fixed direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: TaskId,
    pub direction: Direction,
    pub priority: Priority,
    /// Hold time on the bus, in time units.
    pub duration: u64,
}

impl TaskSpec {
    pub fn new(id: TaskId, direction: Direction, priority: Priority, duration: u64) -> Self {
        Self {
            id,
            direction,
            priority,
            duration,
        }
    }

    pub fn class(&self) -> WaitClass {
        WaitClass::new(self.priority, self.direction)
    }

    /// Thread-style name used in logs, e.g. `sender-prio#4`.
    pub fn name(&self) -> String {
        format!("{}#{}", self.kind(), self.id)
    }

    fn kind(&self) -> &'static str {
        match (self.priority, self.direction) {
            (Priority::Priority, Direction::Send) => "sender-prio",
            (Priority::Priority, Direction::Receive) => "receiver-prio",
            (Priority::Normal, Direction::Send) => "sender",
            (Priority::Normal, Direction::Receive) => "receiver",
        }
    }
}
