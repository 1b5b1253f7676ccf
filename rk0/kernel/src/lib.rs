#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

//! # rk0 Kernel
//!
//! Dispatching core of a preemptive, priority-based real-time kernel for
//! single-core microcontrollers.
//!
//! Key features:
//! - Up to 32 priority levels, FIFO within a level, O(1) selection from
//!   a ready bitmap
//! - Instant preemption: readying a more urgent task switches at once
//!   instead of waiting for the next tick
//! - One delta-encoded timeout list for blocked tasks and callout timers
//! - Counting semaphores, priority-inheriting mutexes, events with flags
//!   and condition variables
//! - Optional time slicing and run-to-completion tasks
//!
//! All state lives in [`SchedulerState`] behind a single critical
//! region. The hardware-specific seams are the `critical_section`
//! implementation and the [`ContextSwitcher`] trait supplied by a port.

pub mod config;
pub mod critical;
pub mod kernel;
pub mod port;
pub mod queue;
pub mod ready;
pub mod sched;
pub mod sync;
pub mod task;
pub mod tcb;
pub mod timeout;
pub mod timer;
pub mod waitq;

pub use config::{KernelConfig, QueueOrder, ReloadPhase};
pub use critical::KernelCell;
pub use kernel::{Kernel, SystemTasks};
pub use port::{ContextSwitcher, SavedContext, TaskEntry};
pub use queue::QueueTag;
pub use sched::{Blocking, SchedulerState};
pub use sync::{FlagsOp, FlagsRequest, WaitFlags};
pub use tcb::{TaskSpec, TaskStatus, Tcb, WaitOutcome};
pub use timeout::TimeoutKind;
pub use timer::Callout;
pub use waitq::ObjectKind;

pub use rk0_core::*;
