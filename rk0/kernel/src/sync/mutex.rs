//! Mutex with priority inheritance
//!
//! The owner runs at the most urgent priority among itself and every
//! task blocked on a mutex it holds. The boost is recomputed whenever a
//! waiter arrives, leaves on timeout, or ownership changes, and follows
//! chains of owners that are themselves blocked on another mutex.

use rk0_core::{kernel_fault, Fault, KError, KResult, MutexId, TaskId, Timeout};

use crate::queue::{QueueTag, TaskQueue};
use crate::sched::{object, object_mut, Blocking, SchedulerState};
use crate::tcb::{TaskStatus, WaitOutcome};
use crate::timeout::TimeoutKind;

#[derive(Debug, Clone)]
pub struct Mutex {
    pub(crate) locked: bool,
    pub(crate) owner: Option<TaskId>,
    pub(crate) waiting: TaskQueue,
}

impl SchedulerState {
    pub fn mutex_create(&mut self) -> KResult<MutexId> {
        let id = MutexId::new(self.mutexes.len() as u8);
        self.mutexes
            .push(Mutex {
                locked: false,
                owner: None,
                waiting: TaskQueue::new(QueueTag::Mutex(id)),
            })
            .map_err(|_| KError::ObjectPoolFull)?;
        log::debug!("{} created", id);
        Ok(id)
    }

    /// Lock the mutex or block until the owner hands it over.
    ///
    /// Recursive locking is a fault.
    pub fn mutex_lock(&mut self, id: MutexId, timeout: Timeout) -> KResult<Blocking> {
        self.assert_may_block();
        let running = self.running;
        let order = self.config.mutex_order;

        let mutex = object_mut(&mut self.mutexes, id.index());
        if !mutex.locked {
            mutex.locked = true;
            mutex.owner = Some(running);
            return Ok(Blocking::Done(()));
        }
        if mutex.owner == Some(running) {
            kernel_fault(Fault::RecursiveLock);
        }
        if timeout == Timeout::NoWait {
            return Err(KError::WouldBlock);
        }

        mutex.waiting.insert(&mut self.tasks, running, order);
        let owner = mutex.owner;
        self.block_running(TaskStatus::Blocked, timeout.finite(), TimeoutKind::Mutex(id));
        if let Some(owner) = owner {
            self.refresh_priority(owner);
        }
        Ok(Blocking::Blocked)
    }

    /// Release the mutex.
    ///
    /// With waiters, ownership passes straight to the head waiter; the
    /// lock is never observably free in between. Unlock by anyone but
    /// the owner is a fault and leaves the mutex untouched.
    pub fn mutex_unlock(&mut self, id: MutexId) {
        if self.isr_nesting > 0 {
            kernel_fault(Fault::IsrContext);
        }
        let running = self.running;

        let mutex = object_mut(&mut self.mutexes, id.index());
        if !mutex.locked || mutex.owner != Some(running) {
            kernel_fault(Fault::UnlockNotOwner);
        }

        match mutex.waiting.pop_front(&mut self.tasks) {
            None => {
                mutex.locked = false;
                mutex.owner = None;
                self.refresh_priority(running);
            }
            Some(next) => {
                mutex.owner = Some(next);
                self.refresh_priority(running);
                self.timeouts.disarm(next.index());
                self.tasks[next].outcome = Some(WaitOutcome::Signalled);
                self.hand_off(next);
                self.refresh_priority(next);
            }
        }
    }

    pub fn mutex_is_locked(&self, id: MutexId) -> bool {
        object(&self.mutexes, id.index()).locked
    }

    pub fn mutex_owner(&self, id: MutexId) -> Option<TaskId> {
        object(&self.mutexes, id.index()).owner
    }

    /// Number of tasks blocked on the mutex
    pub fn mutex_waiting(&self, id: MutexId) -> usize {
        object(&self.mutexes, id.index()).waiting.len()
    }
}
