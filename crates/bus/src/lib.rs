//! Half-duplex shared-bus arbitration.
//!
//! Many independent threads share a bus with a fixed number of slots. All
//! tasks on the bus move data in the same direction, and priority tasks go
//! before normal tasks of the same direction. [`BusController`] is the monitor
//! that enforces this; [`BatchRunner`] spawns batches of tasks against it.

pub mod batch;
pub mod collab;
pub mod controller;
pub mod metrics;
pub mod observer;
pub mod state;
pub mod task;

pub use batch::{BatchReport, BatchRequest, BatchRunner, init, init_with_observer};
pub use collab::{Delay, DurationSource, FixedDurations, NoDelay, RandomDurations, SleepDelay};
pub use controller::{Admission, BusController};
pub use metrics::BusMetrics;
pub use observer::{BusEvent, BusObserver, NoopObserver, RecordingObserver};
pub use state::BusSnapshot;
pub use task::{Task, TaskOutcome, TaskStage};
