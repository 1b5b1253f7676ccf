//! Counting semaphore
//!
//! The counter goes negative while tasks wait: `-value` is the number of
//! blocked waiters. A waiter that times out gives its decrement back.

use rk0_core::{kernel_fault, Fault, KError, KResult, SemaphoreId, TaskId, Timeout};

use crate::queue::{QueueTag, TaskQueue};
use crate::sched::{object, object_mut, Blocking, SchedulerState};
use crate::tcb::{TaskStatus, WaitOutcome};
use crate::timeout::TimeoutKind;

#[derive(Debug, Clone)]
pub struct Semaphore {
    pub(crate) value: i32,
    pub(crate) waiting: TaskQueue,
    pub(crate) owner: Option<TaskId>,
}

impl SchedulerState {
    /// Create a semaphore holding `initial` units
    pub fn semaphore_create(&mut self, initial: i32) -> KResult<SemaphoreId> {
        if initial < 0 {
            kernel_fault(Fault::NegativeCount);
        }
        let id = SemaphoreId::new(self.semaphores.len() as u8);
        self.semaphores
            .push(Semaphore {
                value: initial,
                waiting: TaskQueue::new(QueueTag::Semaphore(id)),
                owner: None,
            })
            .map_err(|_| KError::ObjectPoolFull)?;
        log::debug!("{} created with {} units", id, initial);
        Ok(id)
    }

    /// Take a unit or block the running task.
    ///
    /// With [`Timeout::NoWait`] an empty semaphore reports
    /// [`KError::WouldBlock`] and the count is left alone.
    pub fn semaphore_wait(&mut self, id: SemaphoreId, timeout: Timeout) -> KResult<Blocking> {
        self.assert_may_block();
        let running = self.running;
        let order = self.config.semaphore_order;

        let sema = object_mut(&mut self.semaphores, id.index());
        if sema.value > 0 {
            sema.value -= 1;
            let previous = sema.owner.replace(running);
            if self.config.semaphore_boost {
                if let Some(previous) = previous.filter(|&p| p != running) {
                    self.refresh_priority(previous);
                }
            }
            return Ok(Blocking::Done(()));
        }
        if timeout == Timeout::NoWait {
            return Err(KError::WouldBlock);
        }

        sema.value -= 1;
        sema.waiting.insert(&mut self.tasks, running, order);
        let owner = sema.owner;
        self.block_running(TaskStatus::Blocked, timeout.finite(), TimeoutKind::Semaphore(id));
        if self.config.semaphore_boost {
            if let Some(owner) = owner {
                self.refresh_priority(owner);
            }
        }
        Ok(Blocking::Blocked)
    }

    /// Release a unit, waking the head waiter if one is blocked.
    ///
    /// Callable from interrupt context.
    pub fn semaphore_signal(&mut self, id: SemaphoreId) {
        let running = self.running;
        let sema = object_mut(&mut self.semaphores, id.index());
        sema.value += 1;
        if sema.value > 0 {
            return;
        }

        let Some(waiter) = sema.waiting.pop_front(&mut self.tasks) else {
            kernel_fault(Fault::WaitQueueCorrupt);
        };
        let previous = sema.owner.replace(waiter);
        self.tasks[waiter].signalled_by = Some(running);

        if self.config.semaphore_boost {
            if let Some(previous) = previous {
                self.refresh_priority(previous);
            }
            if self.started {
                self.refresh_priority(running);
            }
        }
        self.wake(waiter, WaitOutcome::Signalled);
        if self.config.semaphore_boost {
            self.refresh_priority(waiter);
        }
    }

    /// Current count, negative while tasks wait
    pub fn semaphore_value(&self, id: SemaphoreId) -> i32 {
        object(&self.semaphores, id.index()).value
    }

    /// Last task that took a unit
    pub fn semaphore_owner(&self, id: SemaphoreId) -> Option<TaskId> {
        object(&self.semaphores, id.index()).owner
    }

    /// Number of blocked waiters
    pub fn semaphore_waiting(&self, id: SemaphoreId) -> usize {
        object(&self.semaphores, id.index()).waiting.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KernelConfig, QueueOrder};
    use crate::port::SavedContext;
    use crate::tcb::TaskSpec;
    use rk0_core::Priority;

    fn body() -> ! {
        loop {}
    }

    fn spawn(state: &mut SchedulerState, uid: u8, prio: u8) -> TaskId {
        let spec = TaskSpec::new(body, "t", uid, Priority::new_unchecked(prio));
        state.create_task(&spec, SavedContext::UNSET).unwrap()
    }

    #[test]
    fn test_take_available_unit() {
        let mut state = SchedulerState::new(KernelConfig::default());
        let a = spawn(&mut state, 10, 1);
        state.start();
        let sema = state.semaphore_create(2).unwrap();
        assert_eq!(state.semaphore_wait(sema, Timeout::Forever), Ok(Blocking::Done(())));
        assert_eq!(state.semaphore_value(sema), 1);
        assert_eq!(state.semaphore_owner(sema), Some(a));
        assert!(!state.is_switch_pending());
    }

    #[test]
    fn test_no_wait_leaves_count() {
        let mut state = SchedulerState::new(KernelConfig::default());
        spawn(&mut state, 10, 1);
        state.start();
        let sema = state.semaphore_create(0).unwrap();
        assert_eq!(state.semaphore_wait(sema, Timeout::NoWait), Err(KError::WouldBlock));
        assert_eq!(state.semaphore_value(sema), 0);
    }

    #[test]
    fn test_priority_ordered_waiters() {
        let config = KernelConfig::default().with_semaphore_order(QueueOrder::Priority);
        let mut state = SchedulerState::new(config);
        let low = spawn(&mut state, 10, 4);
        let high = spawn(&mut state, 11, 2);
        let sema = state.semaphore_create(0).unwrap();

        assert_eq!(state.start(), high);
        state.semaphore_wait(sema, Timeout::Forever).unwrap();
        assert_eq!(state.switch_context(), low);
        state.semaphore_wait(sema, Timeout::Forever).unwrap();
        assert_eq!(state.switch_context(), TaskId::IDLE);

        assert_eq!(state.semaphore_value(sema), -2);
        state.semaphore_signal(sema);
        assert_eq!(state.task(high).status(), TaskStatus::Ready);
        assert_eq!(state.task(low).status(), TaskStatus::Blocked);
    }
}
