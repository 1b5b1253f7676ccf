//! Scheduler state and dispatch
//!
//! [`SchedulerState`] owns every kernel structure: the task table, the
//! ready table, the timeout list and the object arenas. It is only ever
//! reached through the critical region held by
//! [`Kernel`](crate::Kernel), or directly in tests.
//!
//! Nothing here switches stacks. Operations that make a more urgent
//! task ready, or that block the caller, set the pending-switch flag;
//! the public entry point checks it on the way out and calls the port.

use heapless::{Deque, Vec};
use rk0_core::{kernel_fault, uid, Fault, KError, KResult, Priority, TaskId, TickCount, TimerId};

use crate::config::{
    KernelConfig, QueueOrder, MAX_EVENTS, MAX_MUTEXES, MAX_SEMAPHORES, MAX_TASKS, MAX_TIMERS,
    MAX_WAIT_QUEUES, TIMEOUT_SLOTS,
};
use crate::port::SavedContext;
use crate::queue::{QueueTag, TaskQueue};
use crate::ready::ReadyTable;
use crate::sync::event::{Event, FlagsRequest};
use crate::sync::mutex::Mutex;
use crate::sync::semaphore::Semaphore;
use crate::tcb::{TaskSpec, TaskStatus, TaskTable, Tcb, WaitOutcome};
use crate::timeout::{DeltaList, TimeoutKind};
use crate::timer::Timer;
use crate::waitq::WaitQueue;

/// Result of a call that may block the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocking<T = ()> {
    /// Completed without blocking
    Done(T),
    /// The caller is now waiting; a switch is pending
    Blocked,
}

impl<T> Blocking<T> {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Blocking::Blocked)
    }
}

pub(crate) fn object<T>(items: &[T], index: usize) -> &T {
    items.get(index).unwrap_or_else(|| kernel_fault(Fault::InvalidObject))
}

pub(crate) fn object_mut<T>(items: &mut [T], index: usize) -> &mut T {
    items
        .get_mut(index)
        .unwrap_or_else(|| kernel_fault(Fault::InvalidObject))
}

/// All kernel state
#[derive(Debug)]
pub struct SchedulerState {
    pub(crate) config: KernelConfig,
    pub(crate) tasks: TaskTable,
    pub(crate) ready: ReadyTable,
    pub(crate) timeouts: DeltaList<TIMEOUT_SLOTS>,
    pub(crate) pending: TaskQueue,
    pub(crate) semaphores: Vec<Semaphore, MAX_SEMAPHORES>,
    pub(crate) mutexes: Vec<Mutex, MAX_MUTEXES>,
    pub(crate) events: Vec<Event, MAX_EVENTS>,
    pub(crate) wait_queues: Vec<WaitQueue, MAX_WAIT_QUEUES>,
    pub(crate) timers: Vec<Timer, MAX_TIMERS>,
    pub(crate) fired: Deque<TimerId, MAX_TIMERS>,
    pub(crate) running: TaskId,
    pub(crate) handoff: Option<TaskId>,
    pub(crate) switch_pending: bool,
    pub(crate) isr_nesting: u8,
    pub(crate) started: bool,
    pub(crate) ticks: TickCount,
}

impl SchedulerState {
    /// Fresh state holding only the idle and timer handler tasks.
    ///
    /// Idle sits in the ready table one level below the user floor; the
    /// timer handler runs to completion at the most urgent level and
    /// starts out pending until a timer fires.
    pub fn new(config: KernelConfig) -> Self {
        if !config.is_valid() {
            kernel_fault(Fault::InvalidPriority);
        }

        let mut state = Self {
            config,
            tasks: TaskTable::new(),
            ready: ReadyTable::new(),
            timeouts: DeltaList::new(),
            pending: TaskQueue::new(QueueTag::Pending),
            semaphores: Vec::new(),
            mutexes: Vec::new(),
            events: Vec::new(),
            wait_queues: Vec::new(),
            timers: Vec::new(),
            fired: Deque::new(),
            running: TaskId::IDLE,
            handoff: None,
            switch_pending: false,
            isr_nesting: 0,
            started: false,
            ticks: TickCount::new(),
        };

        let idle = Tcb::system(TaskId::IDLE, uid::IDLE, "idle", config.idle_priority(), false);
        let timer = Tcb::system(TaskId::TIMER_HANDLER, uid::TIMER_HANDLER, "timer", Priority::HIGHEST, true);
        if state.tasks.insert(idle).is_err() || state.tasks.insert(timer).is_err() {
            kernel_fault(Fault::InvalidObject);
        }

        state.tasks[TaskId::IDLE].status = TaskStatus::Ready;
        state.ready.push_back(&mut state.tasks, TaskId::IDLE);
        state.tasks[TaskId::TIMER_HANDLER].status = TaskStatus::Pending;
        state.pending.push_back(&mut state.tasks, TaskId::TIMER_HANDLER);
        state
    }

    /// Register a task and make it ready.
    ///
    /// Faults on a reserved or duplicate user id and on a priority past
    /// the configured floor; a full table is reported as
    /// [`KError::TaskTableFull`].
    pub fn create_task(&mut self, spec: &TaskSpec, context: SavedContext) -> KResult<TaskId> {
        if uid::is_reserved(spec.uid) {
            kernel_fault(Fault::ReservedTaskId);
        }
        if self.tasks.find_uid(spec.uid).is_some() {
            kernel_fault(Fault::DuplicateTaskId);
        }
        if self.config.lowest_priority.is_more_urgent_than(spec.priority) {
            kernel_fault(Fault::InvalidPriority);
        }
        if self.tasks.is_full() {
            return Err(KError::TaskTableFull);
        }

        let id = self.tasks.next_id();
        if self.tasks.insert(Tcb::new(id, spec, context)).is_err() {
            return Err(KError::TaskTableFull);
        }
        self.tasks[id].last_wake = self.ticks.ticks();
        log::debug!("task {} '{}' created at {}", id, spec.name, spec.priority);
        self.enqueue_ready(id);
        Ok(id)
    }

    /// Replace the saved context of a task
    pub fn set_context(&mut self, task: TaskId, context: SavedContext) {
        self.tasks[task].context = context;
    }

    /// Pick the first task and mark it running
    pub fn start(&mut self) -> TaskId {
        if self.started {
            return self.running;
        }
        let first = self.pick_next();
        let tcb = &mut self.tasks[first];
        tcb.status = TaskStatus::Running;
        tcb.slice_left = tcb.time_slice;
        self.running = first;
        self.started = true;
        self.switch_pending = false;
        log::debug!("kernel started with {}", first);
        first
    }

    /// Make `task` ready, preempting the running task if it is less urgent
    pub fn enqueue_ready(&mut self, task: TaskId) {
        self.tasks[task].status = TaskStatus::Ready;
        self.ready.push_back(&mut self.tasks, task);
        let prio = self.tasks[task].priority;
        self.preempt_if_outranked_by(prio);
    }

    /// Pop the head of ready level `prio`
    pub fn dequeue_ready(&mut self, prio: Priority) -> Option<TaskId> {
        self.ready.pop(&mut self.tasks, prio)
    }

    /// Dequeue the task that should run next.
    ///
    /// The idle task is always ready when it is not running, so an empty
    /// table here means the structures are corrupt.
    pub fn pick_next(&mut self) -> TaskId {
        if let Some(task) = self.handoff.take() {
            let prio = self.tasks[task].priority;
            match self.ready.most_urgent() {
                Some(best) if best.is_more_urgent_than(prio) => {
                    self.ready.push_front(&mut self.tasks, task);
                }
                _ => return task,
            }
        }

        let prio = self
            .ready
            .most_urgent()
            .unwrap_or_else(|| self.config.idle_priority());
        match self.ready.pop(&mut self.tasks, prio) {
            Some(task) => task,
            None => kernel_fault(Fault::ReadyQueueCorrupt),
        }
    }

    /// Hand the CPU to the most urgent ready task.
    ///
    /// Called by the port's switch handler. A task that is still marked
    /// running goes to the tail of its level.
    pub fn switch_context(&mut self) -> TaskId {
        if !self.started {
            kernel_fault(Fault::NotStarted);
        }
        let prev = self.running;
        if self.tasks[prev].status == TaskStatus::Running {
            self.tasks[prev].status = TaskStatus::Ready;
            self.ready.push_back(&mut self.tasks, prev);
        }

        let next = self.pick_next();
        if next != prev && self.tasks[prev].status == TaskStatus::Ready {
            let tcb = &mut self.tasks[prev];
            tcb.preemptions = tcb.preemptions.wrapping_add(1);
            tcb.preempted_by = Some(next);
        }

        let tcb = &mut self.tasks[next];
        tcb.status = TaskStatus::Running;
        if next != prev || tcb.slice_left == 0 {
            tcb.slice_left = tcb.time_slice;
        }
        self.running = next;
        self.switch_pending = false;
        log::trace!("switch {} -> {}", prev, next);
        next
    }

    /// Send the running task to the tail of its level
    pub fn yield_running(&mut self) {
        if !self.started {
            kernel_fault(Fault::NotStarted);
        }
        let running = self.running;
        if self.tasks[running].status != TaskStatus::Running {
            return;
        }
        self.tasks[running].status = TaskStatus::Ready;
        self.ready.push_back(&mut self.tasks, running);
        self.switch_pending = true;
    }

    /// Process one system tick.
    ///
    /// Ages the timeout list, wakes expired waiters and charges the
    /// running task's time slice. Returns whether a switch should happen
    /// when the interrupt returns; a run-to-completion task is never
    /// switched out by the tick.
    pub fn on_tick(&mut self) -> bool {
        self.ticks.advance();

        self.timeouts.age_one_tick();
        while let Some((slot, kind)) = self.timeouts.pop_expired() {
            self.expire(slot, kind);
        }

        if !self.started {
            return false;
        }

        let running = self.running;
        let slicing = self.config.time_slicing;
        let tcb = &mut self.tasks[running];
        if tcb.status == TaskStatus::Running && !tcb.run_to_completion && slicing && tcb.time_slice > 0 {
            tcb.slice_left = tcb.slice_left.saturating_sub(1);
            if tcb.slice_left == 0 {
                tcb.status = TaskStatus::Ready;
                self.ready.push_back(&mut self.tasks, running);
                self.switch_pending = true;
            }
        }

        let tcb = &self.tasks[running];
        let completing = tcb.status == TaskStatus::Running && tcb.run_to_completion;
        !completing && self.switch_pending
    }

    /// Note entry into an interrupt handler
    pub fn isr_enter(&mut self) {
        self.isr_nesting = self.isr_nesting.saturating_add(1);
    }

    /// Note exit from an interrupt handler.
    ///
    /// Returns whether the outermost handler should trigger a switch.
    pub fn isr_exit(&mut self) -> bool {
        self.isr_nesting = self.isr_nesting.saturating_sub(1);
        self.isr_nesting == 0 && self.switch_pending
    }

    pub fn in_isr(&self) -> bool {
        self.isr_nesting > 0
    }

    /// Collect how the last wait of `task` ended
    pub fn take_outcome(&mut self, task: TaskId) -> Option<WaitOutcome> {
        self.tasks[task].outcome.take()
    }

    /// Request a switch without touching any queue
    pub fn request_switch(&mut self) {
        self.switch_pending = true;
    }

    pub fn is_switch_pending(&self) -> bool {
        self.switch_pending
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn running(&self) -> TaskId {
        self.running
    }

    /// Task chosen by a mutex hand-off, waiting for the next dispatch
    pub fn handoff(&self) -> Option<TaskId> {
        self.handoff
    }

    pub fn task(&self, task: TaskId) -> &Tcb {
        &self.tasks[task]
    }

    pub fn tasks(&self) -> &TaskTable {
        &self.tasks
    }

    pub fn ready(&self) -> &ReadyTable {
        &self.ready
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn tick_count(&self) -> TickCount {
        self.ticks
    }

    /// Ticks until the timeout of `task` expires
    pub fn timeout_remaining(&self, task: TaskId) -> Option<u32> {
        self.timeouts.remaining(task.index())
    }

    /// Arm a timeout for `task` on behalf of a message-passing service
    pub fn timeout_arm(&mut self, task: TaskId, ticks: u32, kind: TimeoutKind) -> KResult<()> {
        self.tasks[task].outcome = None;
        self.timeouts.arm(task.index(), ticks, kind)
    }

    /// Cancel the timeout of `task`
    pub fn timeout_disarm(&mut self, task: TaskId) -> bool {
        self.timeouts.disarm(task.index())
    }

    // Shared helpers for the primitives.

    /// Fault unless a task, not an interrupt, may block here
    pub(crate) fn assert_may_block(&self) {
        if self.isr_nesting > 0 {
            kernel_fault(Fault::IsrContext);
        }
        if !self.started {
            kernel_fault(Fault::NotStarted);
        }
        if self.running == TaskId::IDLE {
            kernel_fault(Fault::IdleBlocked);
        }
    }

    /// Park the running task, which the caller already queued, in `status`
    pub(crate) fn block_running(&mut self, status: TaskStatus, ticks: Option<u32>, kind: TimeoutKind) {
        let running = self.running;
        let tcb = &mut self.tasks[running];
        tcb.status = status;
        tcb.outcome = None;
        if let Some(ticks) = ticks {
            let armed = self.timeouts.arm(running.index(), ticks, kind);
            debug_assert!(armed.is_ok());
        }
        self.switch_pending = true;
    }

    /// Ready a task the caller already unlinked from its waiting queue
    pub(crate) fn wake(&mut self, task: TaskId, outcome: WaitOutcome) {
        self.timeouts.disarm(task.index());
        self.tasks[task].outcome = Some(outcome);
        self.enqueue_ready(task);
    }

    /// Hand `task` straight to the dispatcher when nothing ready outranks it
    pub(crate) fn hand_off(&mut self, task: TaskId) {
        let prio = self.tasks[task].priority;
        let running = &self.tasks[self.running];
        let beats_running = running.status != TaskStatus::Running
            || (!running.run_to_completion && prio.is_more_urgent_than(running.priority));
        let beats_ready = self.ready.most_urgent().map_or(true, |best| prio.is_more_urgent_than(best));

        if !self.started || self.handoff.is_some() || !beats_running || !beats_ready {
            self.enqueue_ready(task);
            return;
        }

        self.tasks[task].status = TaskStatus::Ready;
        if self.tasks[self.running].status == TaskStatus::Running {
            self.demote_running();
        }
        self.handoff = Some(task);
        self.switch_pending = true;
    }

    fn preempt_if_outranked_by(&mut self, prio: Priority) {
        if !self.started {
            return;
        }
        let running = &self.tasks[self.running];
        if running.status == TaskStatus::Running
            && !running.run_to_completion
            && prio.is_more_urgent_than(running.priority)
        {
            self.demote_running();
        }
    }

    /// Send the running task to the tail of its level and pend a switch
    fn demote_running(&mut self) {
        let running = self.running;
        self.tasks[running].status = TaskStatus::Ready;
        self.ready.push_back(&mut self.tasks, running);
        self.switch_pending = true;
    }

    /// Effective priority of `task`: its assigned priority, raised to the
    /// most urgent waiter on any mutex it owns (and semaphore, with the
    /// owner boost)
    pub(crate) fn inherited_priority(&self, task: TaskId) -> Priority {
        let mut prio = self.tasks[task].assigned_priority();
        for mutex in self.mutexes.iter().filter(|m| m.owner == Some(task)) {
            if let Some(waiter) = mutex.waiting.most_urgent(&self.tasks) {
                prio = prio.most_urgent(waiter);
            }
        }
        if self.config.semaphore_boost {
            for sema in self.semaphores.iter().filter(|s| s.owner == Some(task)) {
                if let Some(waiter) = sema.waiting.most_urgent(&self.tasks) {
                    prio = prio.most_urgent(waiter);
                }
            }
        }
        prio
    }

    /// Recompute the effective priority of `task` and of every owner
    /// along the chain of objects it is blocked on
    pub(crate) fn refresh_priority(&mut self, task: TaskId) {
        let mut current = Some(task);
        let mut hops = 0;
        while let Some(task) = current {
            if hops == MAX_TASKS {
                break;
            }
            hops += 1;

            let target = self.inherited_priority(task);
            if target == self.tasks[task].priority {
                break;
            }
            self.set_priority(task, target);

            current = match self.tasks[task].queue {
                Some(QueueTag::Mutex(m)) => object(&self.mutexes, m.index()).owner,
                Some(QueueTag::Semaphore(s)) if self.config.semaphore_boost => {
                    object(&self.semaphores, s.index()).owner
                }
                _ => None,
            };
        }
    }

    /// Change the effective priority of `task`, keeping its queue ordered
    pub(crate) fn set_priority(&mut self, task: TaskId, prio: Priority) {
        let old = self.tasks[task].priority;
        if old == prio {
            return;
        }
        log::trace!("{} priority {} -> {}", task, old, prio);

        match self.tasks[task].queue {
            Some(QueueTag::Ready(_)) => {
                self.ready.remove(&mut self.tasks, task);
                self.tasks[task].priority = prio;
                self.ready.push_back(&mut self.tasks, task);
                self.preempt_if_outranked_by(prio);
            }
            Some(tag) => {
                self.tasks[task].priority = prio;
                self.reposition(tag, task);
            }
            None => {
                self.tasks[task].priority = prio;
                if self.handoff == Some(task) {
                    return;
                }
                if task == self.running {
                    if let Some(best) = self.ready.most_urgent() {
                        self.preempt_if_outranked_by(best);
                    }
                }
            }
        }
    }

    /// Re-sort `task` inside a priority-ordered waiting queue
    fn reposition(&mut self, tag: QueueTag, task: TaskId) {
        let tasks = &mut self.tasks;
        let (queue, order) = match tag {
            QueueTag::Semaphore(s) => (
                &mut object_mut(&mut self.semaphores, s.index()).waiting,
                self.config.semaphore_order,
            ),
            QueueTag::Mutex(m) => (
                &mut object_mut(&mut self.mutexes, m.index()).waiting,
                self.config.mutex_order,
            ),
            QueueTag::Event(e) => (
                &mut object_mut(&mut self.events, e.index()).waiting,
                QueueOrder::Priority,
            ),
            QueueTag::WaitQueue(q) => {
                let wq = object_mut(&mut self.wait_queues, q.index());
                (&mut wq.waiting, wq.order)
            }
            QueueTag::Ready(_) | QueueTag::Pending => return,
        };
        if order == QueueOrder::Priority && queue.remove(tasks, task) {
            queue.insert_by_priority(tasks, task);
        }
    }

    /// Dispatch an expired timeout node
    fn expire(&mut self, slot: usize, kind: TimeoutKind) {
        if let TimeoutKind::Timer(timer) = kind {
            self.timer_expired(timer);
            return;
        }

        let task = TaskId::new(slot as u8);
        log::trace!("{} timed out", task);
        match kind {
            TimeoutKind::TaskHandle => {
                if self.tasks[task].status == TaskStatus::Pending {
                    self.pending.remove(&mut self.tasks, task);
                }
            }
            TimeoutKind::Semaphore(s) => {
                let sema = object_mut(&mut self.semaphores, s.index());
                if sema.waiting.remove(&mut self.tasks, task) {
                    sema.value += 1;
                }
                if self.config.semaphore_boost {
                    if let Some(owner) = object(&self.semaphores, s.index()).owner {
                        self.refresh_priority(owner);
                    }
                }
            }
            TimeoutKind::Mutex(m) => {
                object_mut(&mut self.mutexes, m.index())
                    .waiting
                    .remove(&mut self.tasks, task);
                if let Some(owner) = object(&self.mutexes, m.index()).owner {
                    self.refresh_priority(owner);
                }
            }
            TimeoutKind::Event(e) => {
                object_mut(&mut self.events, e.index())
                    .waiting
                    .remove(&mut self.tasks, task);
                self.tasks[task].flags_request = FlagsRequest::NONE;
            }
            TimeoutKind::WaitQueue(q) => {
                object_mut(&mut self.wait_queues, q.index())
                    .waiting
                    .remove(&mut self.tasks, task);
            }
            TimeoutKind::Timer(_) => {}
        }
        self.tasks[task].outcome = Some(WaitOutcome::TimedOut);
        self.enqueue_ready(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> ! {
        loop {}
    }

    fn spawn(state: &mut SchedulerState, uid: u8, prio: u8) -> TaskId {
        let spec = TaskSpec::new(body, "t", uid, Priority::new_unchecked(prio));
        state.create_task(&spec, SavedContext::UNSET).unwrap()
    }

    #[test]
    fn test_system_tasks_present() {
        let state = SchedulerState::new(KernelConfig::default());
        let idle = state.task(TaskId::IDLE);
        assert_eq!(idle.status(), TaskStatus::Ready);
        assert_eq!(idle.priority(), KernelConfig::default().idle_priority());
        let timer = state.task(TaskId::TIMER_HANDLER);
        assert_eq!(timer.status(), TaskStatus::Pending);
        assert!(timer.is_run_to_completion());
    }

    #[test]
    fn test_start_runs_most_urgent() {
        let mut state = SchedulerState::new(KernelConfig::default());
        let _low = spawn(&mut state, 10, 4);
        let high = spawn(&mut state, 11, 1);
        assert_eq!(state.start(), high);
        assert_eq!(state.task(high).status(), TaskStatus::Running);
        assert!(!state.is_switch_pending());
    }

    #[test]
    fn test_pick_next_falls_back_to_idle() {
        let mut state = SchedulerState::new(KernelConfig::default());
        assert_eq!(state.start(), TaskId::IDLE);
    }

    #[test]
    fn test_instant_preemption_on_enqueue() {
        let mut state = SchedulerState::new(KernelConfig::default());
        let low = spawn(&mut state, 10, 3);
        state.start();

        let high = spawn(&mut state, 11, 1);
        assert!(state.is_switch_pending());
        assert_eq!(state.task(low).status(), TaskStatus::Ready);
        assert_eq!(state.switch_context(), high);
        assert_eq!(state.task(low).preempted_by(), Some(high));
        assert_eq!(state.ready().level(Priority::new_unchecked(3)).front(), Some(low));
    }

    #[test]
    fn test_isr_nesting_defers_switch() {
        let mut state = SchedulerState::new(KernelConfig::default());
        spawn(&mut state, 10, 3);
        state.start();
        state.isr_enter();
        state.isr_enter();
        spawn(&mut state, 11, 0);
        assert!(!state.isr_exit());
        assert!(state.isr_exit());
    }

    #[test]
    fn test_tick_counts_wraps() {
        let mut state = SchedulerState::new(KernelConfig::default());
        for _ in 0..3 {
            state.on_tick();
        }
        assert_eq!(state.tick_count().ticks(), 3);
    }
}
