//! Synchronisation primitives built on the scheduler state

pub mod event;
pub mod mutex;
pub mod semaphore;

pub use event::{FlagsOp, FlagsRequest, WaitFlags};
