//! Port interface
//!
//! The kernel never touches registers. A port supplies the mask through
//! a `critical_section::Impl` and everything else through
//! [`ContextSwitcher`]: laying out a new task's first frame, pending the
//! switch trap, and launching the first task.

use core::fmt;

use rk0_core::TaskId;

use crate::sched::SchedulerState;

/// Task body. Tasks never return.
pub type TaskEntry = fn() -> !;

/// Saved execution context of a task, opaque to the kernel.
///
/// On target this is the stack pointer after the register frame was
/// pushed; hosted ports may store any handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SavedContext(pub usize);

impl SavedContext {
    /// Context that has not been built yet
    pub const UNSET: SavedContext = SavedContext(0);

    /// Raw context word
    pub const fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for SavedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx@{:#x}", self.0)
    }
}

/// Context switch capability provided by a port
pub trait ContextSwitcher {
    /// Lay out the first frame of a task on `stack` and return its context
    fn build_initial_context(&mut self, entry: TaskEntry, stack: &'static mut [u32]) -> SavedContext;

    /// Request a switch.
    ///
    /// Target ports pend the lowest-priority switch trap, whose handler
    /// calls [`SchedulerState::switch_context`]. Hosted ports may perform
    /// the logical hand-off right away.
    fn switch(&mut self, state: &mut SchedulerState);

    /// Launch `first`, the task chosen by [`SchedulerState::start`]
    fn start(&mut self, state: &mut SchedulerState, first: TaskId);
}
