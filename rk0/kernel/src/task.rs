//! Services a task applies to itself or to another task directly:
//! pend/signal, delays, periodic activation and priority changes.

use rk0_core::{kernel_fault, Fault, KError, KResult, Priority, TaskId, Timeout};

use crate::sched::{Blocking, SchedulerState};
use crate::tcb::{TaskStatus, WaitOutcome};
use crate::timeout::TimeoutKind;

impl SchedulerState {
    /// Wait for a direct signal
    pub fn pend(&mut self, timeout: Timeout) -> KResult<Blocking> {
        self.assert_may_block();
        if timeout == Timeout::NoWait {
            return Err(KError::WouldBlock);
        }
        let running = self.running;
        self.pending.push_back(&mut self.tasks, running);
        self.block_running(TaskStatus::Pending, timeout.finite(), TimeoutKind::TaskHandle);
        Ok(Blocking::Blocked)
    }

    /// Signal `task` if it is pending; otherwise the signal is counted as lost.
    ///
    /// Callable from interrupt context.
    pub fn signal_task(&mut self, task: TaskId) {
        let sender = (self.started && self.isr_nesting == 0).then_some(self.running);
        if self.tasks[task].status != TaskStatus::Pending {
            let tcb = &mut self.tasks[task];
            tcb.lost_signals = tcb.lost_signals.wrapping_add(1);
            log::warn!("signal to {} lost ({} while {})", task, tcb.lost_signals, tcb.status);
            return;
        }
        self.pending.remove(&mut self.tasks, task);
        self.tasks[task].signalled_by = sender;
        self.wake(task, WaitOutcome::Signalled);
    }

    /// Sleep for `ticks` ticks
    pub fn sleep(&mut self, ticks: u32) -> KResult<Blocking> {
        self.assert_may_block();
        if ticks == 0 {
            return Err(KError::InvalidTimeout);
        }
        self.block_running(TaskStatus::Sleeping, Some(ticks), TimeoutKind::TaskHandle);
        Ok(Blocking::Blocked)
    }

    /// Sleep until the next multiple of `period` after the last wake.
    ///
    /// Activations stay aligned to the original schedule. When one or
    /// more activations were missed the task skips to the next one still
    /// in the future.
    pub fn sleep_until(&mut self, period: u32) -> KResult<Blocking> {
        self.assert_may_block();
        if period == 0 {
            return Err(KError::InvalidTimeout);
        }
        let now = self.ticks.ticks();
        let running = self.running;
        let tcb = &mut self.tasks[running];

        let elapsed = now.wrapping_sub(tcb.last_wake);
        let periods = elapsed / period + 1;
        let next = tcb.last_wake.wrapping_add(periods.wrapping_mul(period));
        let delay = next.wrapping_sub(now);
        tcb.last_wake = next;

        self.block_running(TaskStatus::Sleeping, Some(delay), TimeoutKind::TaskHandle);
        Ok(Blocking::Blocked)
    }

    /// Temporarily run the calling task at `prio`.
    ///
    /// An inherited boost still applies on top of the new priority.
    pub fn change_priority(&mut self, prio: Priority) {
        if self.isr_nesting > 0 {
            kernel_fault(Fault::IsrContext);
        }
        if self.config.lowest_priority.is_more_urgent_than(prio) {
            kernel_fault(Fault::InvalidPriority);
        }
        let running = self.running;
        self.tasks[running].changed_priority = Some(prio);
        self.refresh_priority(running);
    }

    /// Drop a temporary change, keeping any inherited boost
    pub fn restore_priority(&mut self) {
        if self.isr_nesting > 0 {
            kernel_fault(Fault::IsrContext);
        }
        let running = self.running;
        self.tasks[running].changed_priority = None;
        self.refresh_priority(running);
    }
}
