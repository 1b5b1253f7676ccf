#![no_std]
#![forbid(unsafe_code)]

//! # rk0 Core
//!
//! Core types shared by the rk0 kernel and its ports: object ids,
//! priorities and the ready bitmap, tick and timeout types, and the two
//! error families the kernel reports.
//!
//! Kernel calls fail in one of two ways. Ordinary outcomes such as a
//! timeout or a full table come back as [`KError`]. Programming errors
//! such as unlocking a mutex the caller does not own are [`Fault`]s and
//! are routed to [`kernel_fault`], which never returns.

#[cfg(feature = "std")]
extern crate std;

use core::fmt;

pub mod ids;
pub mod priorities;
pub mod time;

pub use ids::*;
pub use priorities::*;
pub use time::*;

/// rk0 version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type used throughout the kernel
pub type KResult<T> = Result<T, KError>;

/// Recoverable outcomes of kernel operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KError {
    /// The wait ended because its timeout expired
    Timeout,
    /// The resource is unavailable and the caller asked not to wait
    WouldBlock,
    /// Signal on a waiting queue that has no waiters
    EmptyWaitQueue,
    /// Every task slot is in use
    TaskTableFull,
    /// Every slot of an object arena is in use
    ObjectPoolFull,
    /// A timeout value that is meaningless for the call
    InvalidTimeout,
    /// The caller blocked and the port returned before it was resumed
    Pending,
}

impl fmt::Display for KError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KError::Timeout => write!(f, "Wait timed out"),
            KError::WouldBlock => write!(f, "Resource unavailable"),
            KError::EmptyWaitQueue => write!(f, "No task is waiting"),
            KError::TaskTableFull => write!(f, "Task table is full"),
            KError::ObjectPoolFull => write!(f, "Object pool is full"),
            KError::InvalidTimeout => write!(f, "Invalid timeout value"),
            KError::Pending => write!(f, "Caller has not been resumed yet"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for KError {}

#[cfg(feature = "defmt")]
impl defmt::Format for KError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            KError::Timeout => defmt::write!(fmt, "Timeout"),
            KError::WouldBlock => defmt::write!(fmt, "WouldBlock"),
            KError::EmptyWaitQueue => defmt::write!(fmt, "EmptyWaitQueue"),
            KError::TaskTableFull => defmt::write!(fmt, "TaskTableFull"),
            KError::ObjectPoolFull => defmt::write!(fmt, "ObjectPoolFull"),
            KError::InvalidTimeout => defmt::write!(fmt, "InvalidTimeout"),
            KError::Pending => defmt::write!(fmt, "Pending"),
        }
    }
}

/// Usage errors the kernel cannot recover from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Object id that was never handed out by the kernel
    InvalidObject,
    /// Task-only service called from interrupt context
    IsrContext,
    /// Mutex unlocked by a task that does not own it
    UnlockNotOwner,
    /// Mutex locked again by its owner
    RecursiveLock,
    /// User task id reserved for a system task
    ReservedTaskId,
    /// User task id already in use
    DuplicateTaskId,
    /// Priority past the configured floor
    InvalidPriority,
    /// Semaphore created with a negative count
    NegativeCount,
    /// Ready table bit set with no task behind it
    ReadyQueueCorrupt,
    /// Counter says a task waits but the waiting queue is empty
    WaitQueueCorrupt,
    /// The idle task tried to block
    IdleBlocked,
    /// Scheduling service used before the kernel was started
    NotStarted,
    /// Kernel state entered while it was already held
    NestedRegion,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::InvalidObject => write!(f, "invalid object id"),
            Fault::IsrContext => write!(f, "task-only service called from interrupt context"),
            Fault::UnlockNotOwner => write!(f, "mutex unlocked by non-owner"),
            Fault::RecursiveLock => write!(f, "recursive mutex lock"),
            Fault::ReservedTaskId => write!(f, "task id is reserved"),
            Fault::DuplicateTaskId => write!(f, "task id already in use"),
            Fault::InvalidPriority => write!(f, "priority past the configured floor"),
            Fault::NegativeCount => write!(f, "negative semaphore count"),
            Fault::ReadyQueueCorrupt => write!(f, "ready queue corrupted"),
            Fault::WaitQueueCorrupt => write!(f, "waiting queue corrupted"),
            Fault::IdleBlocked => write!(f, "idle task must not block"),
            Fault::NotStarted => write!(f, "kernel not started"),
            Fault::NestedRegion => write!(f, "kernel state entered twice"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Fault {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Fault::InvalidObject => defmt::write!(fmt, "InvalidObject"),
            Fault::IsrContext => defmt::write!(fmt, "IsrContext"),
            Fault::UnlockNotOwner => defmt::write!(fmt, "UnlockNotOwner"),
            Fault::RecursiveLock => defmt::write!(fmt, "RecursiveLock"),
            Fault::ReservedTaskId => defmt::write!(fmt, "ReservedTaskId"),
            Fault::DuplicateTaskId => defmt::write!(fmt, "DuplicateTaskId"),
            Fault::InvalidPriority => defmt::write!(fmt, "InvalidPriority"),
            Fault::NegativeCount => defmt::write!(fmt, "NegativeCount"),
            Fault::ReadyQueueCorrupt => defmt::write!(fmt, "ReadyQueueCorrupt"),
            Fault::WaitQueueCorrupt => defmt::write!(fmt, "WaitQueueCorrupt"),
            Fault::IdleBlocked => defmt::write!(fmt, "IdleBlocked"),
            Fault::NotStarted => defmt::write!(fmt, "NotStarted"),
            Fault::NestedRegion => defmt::write!(fmt, "NestedRegion"),
        }
    }
}

/// Report a usage fault and halt.
///
/// The fault is logged at error level before panicking; on target the
/// panic handler of the port stops the system.
#[cold]
#[track_caller]
pub fn kernel_fault(fault: Fault) -> ! {
    log::error!("kernel fault: {}", fault);
    panic!("kernel fault: {}", fault)
}
