//! Simulated context switching

use rk0_kernel::{ContextSwitcher, SavedContext, SchedulerState, TaskEntry, TaskId};

/// Switcher that performs every switch immediately and records it
#[derive(Debug, Default)]
pub struct HostSwitcher {
    trace: Vec<TaskId>,
    requests: usize,
}

impl HostSwitcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks in dispatch order, starting with the first task launched
    pub fn trace(&self) -> &[TaskId] {
        &self.trace
    }

    /// Most recently dispatched task
    pub fn current(&self) -> Option<TaskId> {
        self.trace.last().copied()
    }

    /// Number of switch requests served
    pub fn requests(&self) -> usize {
        self.requests
    }
}

impl ContextSwitcher for HostSwitcher {
    fn build_initial_context(&mut self, entry: TaskEntry, stack: &'static mut [u32]) -> SavedContext {
        // Top of the stack stands in for the saved stack pointer.
        let top = stack.as_ptr_range().end as usize;
        log::trace!("context for {:p} at {:#x}", entry as *const (), top);
        SavedContext(top)
    }

    fn switch(&mut self, state: &mut SchedulerState) {
        self.requests += 1;
        let next = state.switch_context();
        if self.trace.last() != Some(&next) {
            self.trace.push(next);
        }
    }

    fn start(&mut self, _state: &mut SchedulerState, first: TaskId) {
        log::debug!("host port launching {}", first);
        self.trace.push(first);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk0_kernel::{KernelConfig, Priority, TaskSpec};

    fn body() -> ! {
        loop {}
    }

    #[test]
    fn test_context_points_past_stack() {
        let mut switcher = HostSwitcher::new();
        let stack = crate::leak_stack(16);
        let base = stack.as_ptr() as usize;
        let ctx = switcher.build_initial_context(body, stack);
        assert_eq!(ctx.raw(), base + 16 * core::mem::size_of::<u32>());
    }

    #[test]
    fn test_switch_records_dispatch() {
        let mut switcher = HostSwitcher::new();
        let mut state = SchedulerState::new(KernelConfig::default());
        let spec = TaskSpec::new(body, "a", 10, Priority::new_unchecked(2));
        let a = state.create_task(&spec, SavedContext::UNSET).unwrap();
        let first = state.start();
        switcher.start(&mut state, first);

        state.yield_running();
        switcher.switch(&mut state);
        assert_eq!(switcher.trace(), &[a]);
        assert_eq!(switcher.requests(), 1);
    }
}
