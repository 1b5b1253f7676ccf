//! Kernel facade
//!
//! [`Kernel`] binds the scheduler state to a port. Every public call
//! enters the critical region, runs the state operation and, on the way
//! out, asks the port to switch if the operation made that necessary.
//! Inside an interrupt handler the switch is deferred to the outermost
//! [`Kernel::isr_exit`].
//!
//! Blocking calls are split in two. The first half runs inside the
//! region and parks the caller; once the port resumes the caller, the
//! second half collects how the wait ended.

use rk0_core::{EventId, KError, KResult, MutexId, Priority, SemaphoreId, TaskId, TickCount, TimerId, Timeout};

use crate::config::KernelConfig;
use crate::critical::KernelCell;
use crate::port::{ContextSwitcher, TaskEntry};
use crate::sched::{Blocking, SchedulerState};
use crate::sync::event::{FlagsOp, WaitFlags};
use crate::tcb::{TaskSpec, WaitOutcome};
use crate::timer::Callout;

/// Entry points and stacks of the idle and timer handler tasks
pub struct SystemTasks {
    pub idle: TaskEntry,
    pub idle_stack: &'static mut [u32],
    pub timer: TaskEntry,
    pub timer_stack: &'static mut [u32],
}

struct Inner<S> {
    state: SchedulerState,
    switcher: S,
}

impl<S: ContextSwitcher> Inner<S> {
    /// Yield point: hand over to the port if a switch is pending
    fn yield_point(&mut self) {
        if self.state.is_switch_pending() && self.state.is_started() && !self.state.in_isr() {
            self.switcher.switch(&mut self.state);
        }
    }
}

/// The kernel: scheduler state guarded by the critical region, plus a port
pub struct Kernel<S: ContextSwitcher> {
    inner: KernelCell<Inner<S>>,
}

impl<S: ContextSwitcher> Kernel<S> {
    /// Create the kernel and its system tasks
    pub fn new(mut switcher: S, config: KernelConfig, system: SystemTasks) -> Self {
        let mut state = SchedulerState::new(config);
        let idle = switcher.build_initial_context(system.idle, system.idle_stack);
        state.set_context(TaskId::IDLE, idle);
        let timer = switcher.build_initial_context(system.timer, system.timer_stack);
        state.set_context(TaskId::TIMER_HANDLER, timer);

        Self {
            inner: KernelCell::new(Inner { state, switcher }),
        }
    }

    fn enter<R>(&self, f: impl FnOnce(&mut Inner<S>) -> R) -> R {
        self.inner.with(|inner| {
            let result = f(inner);
            inner.yield_point();
            result
        })
    }

    /// Run `f` on the scheduler state, then honour any switch it requested
    pub fn with_state<R>(&self, f: impl FnOnce(&mut SchedulerState) -> R) -> R {
        self.enter(|inner| f(&mut inner.state))
    }

    /// Read the scheduler state
    pub fn inspect<R>(&self, f: impl FnOnce(&SchedulerState) -> R) -> R {
        self.inner.with(|inner| f(&inner.state))
    }

    /// Read the port
    pub fn port<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        self.inner.with(|inner| f(&inner.switcher))
    }

    /// Collect how the caller's wait ended
    fn finish(&self, caller: TaskId) -> KResult<()> {
        match self.inspect_mut(|state| state.take_outcome(caller)) {
            Some(WaitOutcome::Signalled) => Ok(()),
            Some(WaitOutcome::TimedOut) => Err(KError::Timeout),
            None => Err(KError::Pending),
        }
    }

    fn inspect_mut<R>(&self, f: impl FnOnce(&mut SchedulerState) -> R) -> R {
        self.inner.with(|inner| f(&mut inner.state))
    }

    /// Run a blocking operation for the calling task
    fn block_on<T>(&self, op: impl FnOnce(&mut SchedulerState) -> KResult<Blocking<T>>) -> KResult<Option<T>> {
        let (caller, begun) = self.with_state(|state| (state.running(), op(state)));
        match begun? {
            Blocking::Done(value) => Ok(Some(value)),
            Blocking::Blocked => self.finish(caller).map(|()| None),
        }
    }

    /// Register a task; it is ready immediately
    pub fn create_task(&self, spec: TaskSpec, stack: &'static mut [u32]) -> KResult<TaskId> {
        self.enter(|inner| {
            let context = inner.switcher.build_initial_context(spec.entry, stack);
            inner.state.create_task(&spec, context)
        })
    }

    /// Pick the first task and let the port launch it
    pub fn start(&self) -> TaskId {
        self.inner.with(|inner| {
            let first = inner.state.start();
            inner.switcher.start(&mut inner.state, first);
            first
        })
    }

    pub fn running(&self) -> TaskId {
        self.inspect(SchedulerState::running)
    }

    pub fn tick_count(&self) -> TickCount {
        self.inspect(SchedulerState::tick_count)
    }

    /// System tick; returns whether a switch is due
    pub fn tick(&self) -> bool {
        self.with_state(SchedulerState::on_tick)
    }

    pub fn isr_enter(&self) {
        self.inspect_mut(SchedulerState::isr_enter);
    }

    /// Leave an interrupt handler, switching if this was the outermost one
    pub fn isr_exit(&self) -> bool {
        self.with_state(SchedulerState::isr_exit)
    }

    pub fn yield_now(&self) {
        self.with_state(SchedulerState::yield_running);
    }

    pub fn sleep(&self, ticks: u32) -> KResult<()> {
        self.block_on(|state| state.sleep(ticks)).map(|_| ())
    }

    pub fn sleep_until(&self, period: u32) -> KResult<()> {
        self.block_on(|state| state.sleep_until(period)).map(|_| ())
    }

    pub fn pend(&self, timeout: Timeout) -> KResult<()> {
        self.block_on(|state| state.pend(timeout)).map(|_| ())
    }

    pub fn signal(&self, task: TaskId) {
        self.with_state(|state| state.signal_task(task));
    }

    pub fn change_priority(&self, prio: Priority) {
        self.with_state(|state| state.change_priority(prio));
    }

    pub fn restore_priority(&self) {
        self.with_state(SchedulerState::restore_priority);
    }

    pub fn semaphore_create(&self, initial: i32) -> KResult<SemaphoreId> {
        self.inspect_mut(|state| state.semaphore_create(initial))
    }

    pub fn semaphore_wait(&self, id: SemaphoreId, timeout: Timeout) -> KResult<()> {
        self.block_on(|state| state.semaphore_wait(id, timeout)).map(|_| ())
    }

    pub fn semaphore_signal(&self, id: SemaphoreId) {
        self.with_state(|state| state.semaphore_signal(id));
    }

    pub fn semaphore_value(&self, id: SemaphoreId) -> i32 {
        self.inspect(|state| state.semaphore_value(id))
    }

    pub fn semaphore_owner(&self, id: SemaphoreId) -> Option<TaskId> {
        self.inspect(|state| state.semaphore_owner(id))
    }

    pub fn mutex_create(&self) -> KResult<MutexId> {
        self.inspect_mut(SchedulerState::mutex_create)
    }

    pub fn mutex_lock(&self, id: MutexId, timeout: Timeout) -> KResult<()> {
        self.block_on(|state| state.mutex_lock(id, timeout)).map(|_| ())
    }

    pub fn mutex_unlock(&self, id: MutexId) {
        self.with_state(|state| state.mutex_unlock(id));
    }

    pub fn mutex_owner(&self, id: MutexId) -> Option<TaskId> {
        self.inspect(|state| state.mutex_owner(id))
    }

    pub fn event_create(&self) -> KResult<EventId> {
        self.inspect_mut(SchedulerState::event_create)
    }

    pub fn event_sleep(&self, id: EventId, timeout: Timeout) -> KResult<()> {
        self.block_on(|state| state.event_sleep(id, timeout)).map(|_| ())
    }

    pub fn event_wake(&self, id: EventId) -> usize {
        self.with_state(|state| state.event_wake(id))
    }

    pub fn event_signal(&self, id: EventId) -> KResult<()> {
        self.with_state(|state| state.event_signal(id))
    }

    pub fn event_waiting(&self, id: EventId) -> usize {
        self.inspect(|state| state.event_waiting(id))
    }

    /// Wait for flags; returns the required bits that were set
    pub fn event_flags_get(&self, id: EventId, required: u32, options: WaitFlags, timeout: Timeout) -> KResult<u32> {
        let caller = self.running();
        match self.block_on(|state| state.event_flags_get(id, required, options, timeout))? {
            Some(hit) => Ok(hit),
            None => Ok(self.inspect(|state| state.task(caller).flags_received())),
        }
    }

    pub fn event_flags_set(&self, id: EventId, mask: u32, op: FlagsOp) -> usize {
        self.with_state(|state| state.event_flags_set(id, mask, op))
    }

    pub fn event_flags_clear(&self, id: EventId, mask: u32) {
        self.inspect_mut(|state| state.event_flags_clear(id, mask));
    }

    pub fn event_flags(&self, id: EventId) -> u32 {
        self.inspect(|state| state.event_flags(id))
    }

    /// Condition variable wait.
    ///
    /// Unlocks `mutex` and sleeps on `event` atomically, then locks
    /// `mutex` again before returning, even when the sleep timed out.
    pub fn cond_wait(&self, event: EventId, mutex: MutexId, timeout: Timeout) -> KResult<()> {
        let woke = self.block_on(|state| state.cond_wait(event, mutex, timeout)).map(|_| ());
        if woke == Err(KError::Pending) {
            return woke;
        }
        self.mutex_lock(mutex, Timeout::Forever)?;
        woke
    }

    /// Wake the most urgent task waiting on the condition
    pub fn cond_signal(&self, event: EventId) -> KResult<()> {
        self.event_signal(event)
    }

    /// Wake every task waiting on the condition
    pub fn cond_broadcast(&self, event: EventId) -> usize {
        self.event_wake(event)
    }

    pub fn timer_create(&self, phase: u32, duration: u32, callout: Callout, arg: usize, reload: bool) -> KResult<TimerId> {
        self.inspect_mut(|state| state.timer_create(phase, duration, callout, arg, reload))
    }

    pub fn timer_cancel(&self, id: TimerId) -> bool {
        self.inspect_mut(|state| state.timer_cancel(id))
    }

    pub fn timer_restart(&self, id: TimerId) -> KResult<()> {
        self.inspect_mut(|state| state.timer_restart(id))
    }

    /// Run every pending callout; called by the timer handler task.
    ///
    /// Callouts run outside the critical region.
    pub fn run_timer_handler(&self) -> usize {
        let mut ran = 0;
        while let Some((callout, arg)) = self.inspect_mut(SchedulerState::take_fired_timer) {
            callout(arg);
            ran += 1;
        }
        ran
    }

    /// Body of the timer handler task
    pub fn timer_task(&self) -> ! {
        loop {
            self.run_timer_handler();
            if let Err(err) = self.block_on(SchedulerState::timer_handler_pend) {
                log::trace!("timer handler resumed early: {}", err);
            }
        }
    }
}
