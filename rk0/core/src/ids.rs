//! Object identifiers
//!
//! Every kernel object lives in a fixed arena and is addressed by its
//! slot index. Ids are only handed out by the kernel; an id from another
//! kernel instance is rejected as [`Fault::InvalidObject`](crate::Fault).

use core::fmt;

macro_rules! object_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u8);

        impl $name {
            /// Create an id from a raw slot index
            pub const fn new(raw: u8) -> Self {
                Self(raw)
            }

            /// Raw slot index
            pub const fn raw(self) -> u8 {
                self.0
            }

            /// Slot index as `usize`
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }

        #[cfg(feature = "defmt")]
        impl defmt::Format for $name {
            fn format(&self, fmt: defmt::Formatter) {
                defmt::write!(fmt, "{=str}#{=u8}", $label, self.0);
            }
        }
    };
}

object_id!(
    /// System id of a task (its slot in the task table)
    TaskId,
    "task"
);
object_id!(
    /// Counting semaphore handle
    SemaphoreId,
    "sema"
);
object_id!(
    /// Mutex handle
    MutexId,
    "mutex"
);
object_id!(
    /// Event handle
    EventId,
    "event"
);
object_id!(
    /// Callout timer handle
    TimerId,
    "timer"
);
object_id!(
    /// Generic waiting queue handle, used by message-passing services
    WaitQueueId,
    "waitq"
);

impl TaskId {
    /// System id of the idle task
    pub const IDLE: TaskId = TaskId(0);

    /// System id of the timer handler task
    pub const TIMER_HANDLER: TaskId = TaskId(1);
}

/// User-visible task id chosen by the application
pub type TaskUid = u8;

/// User ids that applications may not claim
pub mod uid {
    use super::TaskUid;

    /// Idle task
    pub const IDLE: TaskUid = 0;
    /// Timer handler task
    pub const TIMER_HANDLER: TaskUid = 1;
    /// Marks "no task"
    pub const INVALID: TaskUid = 255;

    /// Whether `uid` is reserved for the kernel
    pub const fn is_reserved(uid: TaskUid) -> bool {
        uid == IDLE || uid == TIMER_HANDLER || uid == INVALID
    }
}
