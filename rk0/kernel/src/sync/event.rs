//! Events: sleep/wake rendez-vous, event flags and condition variables
//!
//! An event keeps no memory of wakes: `wake` and `signal` only affect
//! tasks already sleeping on it. The optional 32-bit flag field does
//! remember, and tasks can block until a combination of flags is set.

use bitflags::bitflags;
use rk0_core::{kernel_fault, EventId, Fault, KError, KResult, MutexId, Timeout};

use crate::queue::{prev_of, QueueTag, TaskQueue};
use crate::sched::{object, object_mut, Blocking, SchedulerState};
use crate::tcb::{TaskStatus, WaitOutcome};
use crate::timeout::TimeoutKind;

bitflags! {
    /// Matching options of a flags wait. Empty means "any bit, keep flags".
    pub struct WaitFlags: u8 {
        /// Every required bit must be set
        const ALL = 0b01;
        /// Clear the matched bits when the wait is satisfied
        const CLEAR = 0b10;
    }
}

/// How [`SchedulerState::event_flags_set`] combines the new mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagsOp {
    Or,
    And,
}

/// Requirement recorded in the TCB of a task blocked on flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagsRequest {
    pub required: u32,
    pub options: WaitFlags,
}

impl FlagsRequest {
    pub const NONE: FlagsRequest = FlagsRequest {
        required: 0,
        options: WaitFlags::empty(),
    };

    pub const fn new(required: u32, options: WaitFlags) -> Self {
        Self { required, options }
    }

    /// Bits delivered to the waiter if `flags` satisfies the request
    pub fn matched(&self, flags: u32) -> Option<u32> {
        let hit = flags & self.required;
        let satisfied = if self.options.contains(WaitFlags::ALL) {
            hit == self.required
        } else {
            hit != 0
        };
        satisfied.then_some(hit)
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    pub(crate) waiting: TaskQueue,
    pub(crate) flags: u32,
}

impl SchedulerState {
    pub fn event_create(&mut self) -> KResult<EventId> {
        let id = EventId::new(self.events.len() as u8);
        self.events
            .push(Event {
                waiting: TaskQueue::new(QueueTag::Event(id)),
                flags: 0,
            })
            .map_err(|_| KError::ObjectPoolFull)?;
        log::debug!("{} created", id);
        Ok(id)
    }

    /// Sleep on the event until woken or timed out.
    ///
    /// Sleeping without waiting makes no sense, so [`Timeout::NoWait`]
    /// is rejected with [`KError::InvalidTimeout`].
    pub fn event_sleep(&mut self, id: EventId, timeout: Timeout) -> KResult<Blocking> {
        self.assert_may_block();
        if timeout == Timeout::NoWait {
            return Err(KError::InvalidTimeout);
        }
        let running = self.running;
        object_mut(&mut self.events, id.index())
            .waiting
            .insert_by_priority(&mut self.tasks, running);
        self.tasks[running].flags_request = FlagsRequest::NONE;
        self.block_running(TaskStatus::Sleeping, timeout.finite(), TimeoutKind::Event(id));
        Ok(Blocking::Blocked)
    }

    /// Wake every sleeping task, returning how many were woken
    pub fn event_wake(&mut self, id: EventId) -> usize {
        let mut woken = 0;
        while let Some(task) = object_mut(&mut self.events, id.index())
            .waiting
            .pop_front(&mut self.tasks)
        {
            self.wake(task, WaitOutcome::Signalled);
            woken += 1;
        }
        woken
    }

    /// Wake the most urgent sleeping task
    pub fn event_signal(&mut self, id: EventId) -> KResult<()> {
        let task = object_mut(&mut self.events, id.index())
            .waiting
            .pop_front(&mut self.tasks)
            .ok_or(KError::EmptyWaitQueue)?;
        self.wake(task, WaitOutcome::Signalled);
        Ok(())
    }

    /// Number of tasks sleeping on the event
    pub fn event_waiting(&self, id: EventId) -> usize {
        object(&self.events, id.index()).waiting.len()
    }

    /// Take a combination of flags or block until it is set.
    ///
    /// On success returns the required bits that were set, clearing
    /// them when `options` has [`WaitFlags::CLEAR`]. A blocked caller
    /// finds them in [`Tcb::flags_received`](crate::Tcb::flags_received).
    pub fn event_flags_get(
        &mut self,
        id: EventId,
        required: u32,
        options: WaitFlags,
        timeout: Timeout,
    ) -> KResult<Blocking<u32>> {
        self.assert_may_block();
        let running = self.running;
        let request = FlagsRequest::new(required, options);

        let event = object_mut(&mut self.events, id.index());
        if let Some(hit) = request.matched(event.flags) {
            if options.contains(WaitFlags::CLEAR) {
                event.flags &= !hit;
            }
            self.tasks[running].flags_received = hit;
            return Ok(Blocking::Done(hit));
        }
        if timeout == Timeout::NoWait {
            return Err(KError::WouldBlock);
        }

        event.waiting.insert_by_priority(&mut self.tasks, running);
        let tcb = &mut self.tasks[running];
        tcb.flags_request = request;
        tcb.flags_received = 0;
        self.block_running(TaskStatus::Blocked, timeout.finite(), TimeoutKind::Event(id));
        Ok(Blocking::Blocked)
    }

    /// Combine `mask` into the flags and wake every satisfied waiter.
    ///
    /// Waiters are examined from tail to head so unlinking one never
    /// skips another; a clearing waiter removes its bits before the next
    /// one is tested. Returns how many tasks were woken.
    pub fn event_flags_set(&mut self, id: EventId, mask: u32, op: FlagsOp) -> usize {
        let event = object_mut(&mut self.events, id.index());
        match op {
            FlagsOp::Or => event.flags |= mask,
            FlagsOp::And => event.flags &= mask,
        }

        let mut woken = 0;
        let mut cursor = event.waiting.back();
        while let Some(task) = cursor {
            cursor = prev_of(&self.tasks, task);

            let event = object_mut(&mut self.events, id.index());
            let request = self.tasks[task].flags_request;
            if request == FlagsRequest::NONE {
                continue;
            }
            let Some(hit) = request.matched(event.flags) else {
                continue;
            };
            if request.options.contains(WaitFlags::CLEAR) {
                event.flags &= !hit;
            }
            event.waiting.remove(&mut self.tasks, task);

            let tcb = &mut self.tasks[task];
            tcb.flags_request = FlagsRequest::NONE;
            tcb.flags_received = hit;
            self.wake(task, WaitOutcome::Signalled);
            woken += 1;
        }
        woken
    }

    /// Clear the bits in `mask`
    pub fn event_flags_clear(&mut self, id: EventId, mask: u32) {
        object_mut(&mut self.events, id.index()).flags &= !mask;
    }

    /// Current flag field
    pub fn event_flags(&self, id: EventId) -> u32 {
        object(&self.events, id.index()).flags
    }

    /// Release `mutex` and sleep on `event` in one step.
    ///
    /// No wake can slip in between the unlock and the sleep. The caller
    /// must own `mutex` and re-lock it once the sleep ends.
    pub fn cond_wait(&mut self, event: EventId, mutex: MutexId, timeout: Timeout) -> KResult<Blocking> {
        self.assert_may_block();
        if timeout == Timeout::NoWait {
            return Err(KError::InvalidTimeout);
        }
        if self.mutex_owner(mutex) != Some(self.running) {
            kernel_fault(Fault::UnlockNotOwner);
        }
        self.mutex_unlock(mutex);

        // Handing the mutex over may have demoted the caller already.
        let running = self.running;
        if self.tasks[running].status == TaskStatus::Ready {
            self.ready.remove(&mut self.tasks, running);
        }
        object_mut(&mut self.events, event.index())
            .waiting
            .insert_by_priority(&mut self.tasks, running);
        self.tasks[running].flags_request = FlagsRequest::NONE;
        self.block_running(TaskStatus::Sleeping, timeout.finite(), TimeoutKind::Event(event));
        Ok(Blocking::Blocked)
    }
}
