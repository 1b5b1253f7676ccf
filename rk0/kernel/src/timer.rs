//! Application callout timers
//!
//! Timers share the timeout list with blocked tasks. An expiry only
//! queues the timer and wakes the timer handler task; callouts run in
//! that task, outside the critical region, so they may use any
//! non-blocking kernel service.

use rk0_core::{KError, KResult, TaskId, Timeout, TimerId};

use crate::config::{ReloadPhase, MAX_TASKS};
use crate::sched::{object, object_mut, Blocking, SchedulerState};
use crate::tcb::{TaskStatus, WaitOutcome};
use crate::timeout::TimeoutKind;

/// Callout invoked with the timer's argument
pub type Callout = fn(usize);

#[derive(Debug, Clone, Copy)]
pub struct Timer {
    pub(crate) phase: u32,
    pub(crate) duration: u32,
    pub(crate) callout: Callout,
    pub(crate) arg: usize,
    pub(crate) reload: bool,
    pub(crate) active: bool,
}

const fn slot(id: TimerId) -> usize {
    MAX_TASKS + id.index()
}

impl SchedulerState {
    /// Create and start a timer.
    ///
    /// The first expiry is `phase + duration` ticks away. A reloading
    /// timer then repeats every `duration` ticks, or every
    /// `phase + duration` with [`ReloadPhase::Original`].
    pub fn timer_create(
        &mut self,
        phase: u32,
        duration: u32,
        callout: Callout,
        arg: usize,
        reload: bool,
    ) -> KResult<TimerId> {
        if duration == 0 {
            return Err(KError::InvalidTimeout);
        }
        let id = TimerId::new(self.timers.len() as u8);
        self.timers
            .push(Timer {
                phase,
                duration,
                callout,
                arg,
                reload,
                active: true,
            })
            .map_err(|_| KError::ObjectPoolFull)?;
        self.timeouts
            .arm(slot(id), phase.saturating_add(duration), TimeoutKind::Timer(id))?;
        log::debug!("{} armed: phase {} duration {} reload {}", id, phase, duration, reload);
        Ok(id)
    }

    /// Stop a timer; a queued expiry that has not run yet is dropped
    pub fn timer_cancel(&mut self, id: TimerId) -> bool {
        let timer = object_mut(&mut self.timers, id.index());
        let was_active = timer.active;
        timer.active = false;
        self.timeouts.disarm(slot(id));
        self.purge_fired(id);
        was_active
    }

    /// Rearm a timer from its phase, dropping any expiry not yet run
    pub fn timer_restart(&mut self, id: TimerId) -> KResult<()> {
        let timer = object_mut(&mut self.timers, id.index());
        timer.active = true;
        let ticks = timer.phase.saturating_add(timer.duration);
        self.purge_fired(id);
        self.timeouts.arm(slot(id), ticks, TimeoutKind::Timer(id))
    }

    pub fn timer_is_active(&self, id: TimerId) -> bool {
        object(&self.timers, id.index()).active
    }

    /// Ticks until the timer next fires
    pub fn timer_remaining(&self, id: TimerId) -> Option<u32> {
        self.timeouts.remaining(slot(id))
    }

    /// Number of expiries waiting for the timer handler
    pub fn fired_timers(&self) -> usize {
        self.fired.len()
    }

    /// Take the next expired timer for the handler task.
    ///
    /// Reloading timers are rearmed here; one-shot timers go inactive.
    pub fn take_fired_timer(&mut self) -> Option<(Callout, usize)> {
        let reload_phase = self.config.reload_phase;
        while let Some(id) = self.fired.pop_front() {
            let timer = object_mut(&mut self.timers, id.index());
            if !timer.active {
                continue;
            }
            let fire = (timer.callout, timer.arg);
            if timer.reload {
                let period = match reload_phase {
                    ReloadPhase::Zero => timer.duration,
                    ReloadPhase::Original => timer.phase.saturating_add(timer.duration),
                };
                let armed = self.timeouts.arm(slot(id), period, TimeoutKind::Timer(id));
                debug_assert!(armed.is_ok());
            } else {
                timer.active = false;
            }
            return Some(fire);
        }
        None
    }

    /// Park the timer handler until the next expiry.
    ///
    /// Returns without blocking when expiries are already queued, so one
    /// that lands between draining the backlog and this call still runs.
    pub fn timer_handler_pend(&mut self) -> KResult<Blocking> {
        if !self.fired.is_empty() {
            return Ok(Blocking::Done(()));
        }
        self.pend(Timeout::Forever)
    }

    fn purge_fired(&mut self, id: TimerId) {
        for _ in 0..self.fired.len() {
            if let Some(queued) = self.fired.pop_front() {
                if queued != id {
                    let kept = self.fired.push_back(queued);
                    debug_assert!(kept.is_ok());
                }
            }
        }
    }

    pub(crate) fn timer_expired(&mut self, id: TimerId) {
        if self.fired.push_back(id).is_err() {
            log::warn!("{} expiry dropped, handler backlog full", id);
            return;
        }
        let handler = TaskId::TIMER_HANDLER;
        if self.tasks[handler].status == TaskStatus::Pending {
            self.pending.remove(&mut self.tasks, handler);
            self.wake(handler, WaitOutcome::Signalled);
        }
    }
}
