//! Task control records and the task table

use core::fmt;
use core::ops::{Index, IndexMut};

use heapless::Vec;
use rk0_core::{kernel_fault, Fault, Priority, TaskId, TaskUid};

use crate::config::MAX_TASKS;
use crate::port::{SavedContext, TaskEntry};
use crate::queue::{Link, QueueTag};
use crate::sync::event::FlagsRequest;

/// Scheduling status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// In the ready table
    Ready,
    /// Owns the CPU
    Running,
    /// Waiting for a direct signal
    Pending,
    /// Sleeping on a delay or an event
    Sleeping,
    /// Blocked on a semaphore, mutex or event flags
    Blocked,
    /// Blocked sending to a message-passing service
    Sending,
    /// Blocked receiving from a message-passing service
    Receiving,
    /// Slot not in use
    Invalid,
}

impl TaskStatus {
    /// Whether the task waits outside the ready table
    pub const fn is_waiting(self) -> bool {
        matches!(
            self,
            TaskStatus::Pending
                | TaskStatus::Sleeping
                | TaskStatus::Blocked
                | TaskStatus::Sending
                | TaskStatus::Receiving
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Ready => "READY",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Pending => "PENDING",
            TaskStatus::Sleeping => "SLEEPING",
            TaskStatus::Blocked => "BLOCKED",
            TaskStatus::Sending => "SENDING",
            TaskStatus::Receiving => "RECEIVING",
            TaskStatus::Invalid => "INVALID",
        };
        f.write_str(name)
    }
}

/// Why a waiting task was made ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Woken by the object it waited on
    Signalled,
    /// Its timeout expired first
    TimedOut,
}

/// Parameters of a new task
#[derive(Debug, Clone, Copy)]
pub struct TaskSpec {
    /// Task body
    pub entry: TaskEntry,
    /// Name for diagnostics
    pub name: &'static str,
    /// Application-chosen id
    pub uid: TaskUid,
    /// Initial (base) priority
    pub priority: Priority,
    /// Ticks per time slice, 0 disables slicing for the task
    pub time_slice: u32,
    /// Exempt from preemption by other user tasks
    pub run_to_completion: bool,
}

impl TaskSpec {
    /// Task with no time slice that can be preempted
    pub const fn new(entry: TaskEntry, name: &'static str, uid: TaskUid, priority: Priority) -> Self {
        Self {
            entry,
            name,
            uid,
            priority,
            time_slice: 0,
            run_to_completion: false,
        }
    }

    /// Set the time slice budget
    pub const fn with_time_slice(mut self, ticks: u32) -> Self {
        self.time_slice = ticks;
        self
    }

    /// Mark the task run-to-completion
    pub const fn run_to_completion(mut self) -> Self {
        self.run_to_completion = true;
        self
    }
}

/// Task control record
#[derive(Debug, Clone)]
pub struct Tcb {
    pub(crate) id: TaskId,
    pub(crate) uid: TaskUid,
    pub(crate) name: &'static str,
    pub(crate) context: SavedContext,
    pub(crate) status: TaskStatus,
    pub(crate) priority: Priority,
    pub(crate) base_priority: Priority,
    pub(crate) changed_priority: Option<Priority>,
    pub(crate) time_slice: u32,
    pub(crate) slice_left: u32,
    pub(crate) run_to_completion: bool,
    pub(crate) link: Link,
    pub(crate) queue: Option<QueueTag>,
    pub(crate) outcome: Option<WaitOutcome>,
    pub(crate) flags_request: FlagsRequest,
    pub(crate) flags_received: u32,
    pub(crate) last_wake: u32,
    pub(crate) preemptions: u32,
    pub(crate) preempted_by: Option<TaskId>,
    pub(crate) lost_signals: u32,
    pub(crate) signalled_by: Option<TaskId>,
}

impl Tcb {
    pub(crate) fn new(id: TaskId, spec: &TaskSpec, context: SavedContext) -> Self {
        let mut tcb = Self::system(id, spec.uid, spec.name, spec.priority, spec.run_to_completion);
        tcb.context = context;
        tcb.time_slice = spec.time_slice;
        tcb.slice_left = spec.time_slice;
        tcb
    }

    pub(crate) fn system(id: TaskId, uid: TaskUid, name: &'static str, priority: Priority, run_to_completion: bool) -> Self {
        Self {
            id,
            uid,
            name,
            context: SavedContext::UNSET,
            status: TaskStatus::Invalid,
            priority,
            base_priority: priority,
            changed_priority: None,
            time_slice: 0,
            slice_left: 0,
            run_to_completion,
            link: Link::new(),
            queue: None,
            outcome: None,
            flags_request: FlagsRequest::NONE,
            flags_received: 0,
            last_wake: 0,
            preemptions: 0,
            preempted_by: None,
            lost_signals: 0,
            signalled_by: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn uid(&self) -> TaskUid {
        self.uid
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn context(&self) -> SavedContext {
        self.context
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Effective priority, including any inherited boost
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Priority assigned at creation
    pub fn base_priority(&self) -> Priority {
        self.base_priority
    }

    /// Priority the task asked to run at, before any inherited boost
    pub fn assigned_priority(&self) -> Priority {
        self.changed_priority.unwrap_or(self.base_priority)
    }

    /// Remaining ticks of the current time slice
    pub fn slice_left(&self) -> u32 {
        self.slice_left
    }

    pub fn is_run_to_completion(&self) -> bool {
        self.run_to_completion
    }

    /// Queue the task is linked into, if any
    pub fn queue(&self) -> Option<QueueTag> {
        self.queue
    }

    /// Outcome of the last wait, until it is collected
    pub fn outcome(&self) -> Option<WaitOutcome> {
        self.outcome
    }

    /// Flags delivered by the last successful flags wait
    pub fn flags_received(&self) -> u32 {
        self.flags_received
    }

    /// Times the task was switched out while still ready
    pub fn preemptions(&self) -> u32 {
        self.preemptions
    }

    pub fn preempted_by(&self) -> Option<TaskId> {
        self.preempted_by
    }

    /// Signals sent while the task was not pending
    pub fn lost_signals(&self) -> u32 {
        self.lost_signals
    }

    pub fn signalled_by(&self) -> Option<TaskId> {
        self.signalled_by
    }
}

/// Fixed-capacity task table indexed by [`TaskId`]
#[derive(Debug, Default)]
pub struct TaskTable {
    tcbs: Vec<Tcb, MAX_TASKS>,
}

impl TaskTable {
    pub const fn new() -> Self {
        Self { tcbs: Vec::new() }
    }

    /// Id the next inserted task will get
    pub fn next_id(&self) -> TaskId {
        TaskId::new(self.tcbs.len() as u8)
    }

    /// Store a record built with [`TaskTable::next_id`]
    pub(crate) fn insert(&mut self, tcb: Tcb) -> Result<TaskId, Tcb> {
        let id = tcb.id;
        debug_assert_eq!(id, self.next_id());
        self.tcbs.push(tcb)?;
        Ok(id)
    }

    pub fn is_full(&self) -> bool {
        self.tcbs.is_full()
    }

    pub fn len(&self) -> usize {
        self.tcbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tcbs.is_empty()
    }

    pub fn get(&self, id: TaskId) -> Option<&Tcb> {
        self.tcbs.get(id.index())
    }

    /// Look a task up by its user id
    pub fn find_uid(&self, uid: TaskUid) -> Option<TaskId> {
        self.tcbs.iter().find(|tcb| tcb.uid == uid).map(|tcb| tcb.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tcb> {
        self.tcbs.iter()
    }
}

impl Index<TaskId> for TaskTable {
    type Output = Tcb;

    fn index(&self, id: TaskId) -> &Tcb {
        match self.tcbs.get(id.index()) {
            Some(tcb) => tcb,
            None => kernel_fault(Fault::InvalidObject),
        }
    }
}

impl IndexMut<TaskId> for TaskTable {
    fn index_mut(&mut self, id: TaskId) -> &mut Tcb {
        match self.tcbs.get_mut(id.index()) {
            Some(tcb) => tcb,
            None => kernel_fault(Fault::InvalidObject),
        }
    }
}
