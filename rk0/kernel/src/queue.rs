//! Intrusive task queues
//!
//! Queues hold no storage of their own: each [`Tcb`](crate::tcb::Tcb)
//! carries one [`Link`] and a membership tag, so a task can be linked
//! into at most one queue at a time. All operations take the task table
//! the links live in.

use core::fmt;

use rk0_core::{EventId, MutexId, Priority, SemaphoreId, TaskId, WaitQueueId};

use crate::config::QueueOrder;
use crate::tcb::TaskTable;

/// Neighbour pointers of a queued task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Link {
    prev: Option<TaskId>,
    next: Option<TaskId>,
}

impl Link {
    pub const fn new() -> Self {
        Self { prev: None, next: None }
    }
}

/// Identifies the queue a task is linked into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueTag {
    /// Ready queue of one priority level
    Ready(Priority),
    /// Tasks pending on a direct signal
    Pending,
    Semaphore(SemaphoreId),
    Mutex(MutexId),
    Event(EventId),
    /// Waiting queue owned by a message-passing service
    WaitQueue(WaitQueueId),
}

impl fmt::Display for QueueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueTag::Ready(prio) => write!(f, "ready[{}]", prio.raw()),
            QueueTag::Pending => write!(f, "pending"),
            QueueTag::Semaphore(id) => write!(f, "{}", id),
            QueueTag::Mutex(id) => write!(f, "{}", id),
            QueueTag::Event(id) => write!(f, "{}", id),
            QueueTag::WaitQueue(id) => write!(f, "{}", id),
        }
    }
}

/// Doubly linked queue of tasks threaded through the task table
#[derive(Debug, Clone)]
pub struct TaskQueue {
    tag: QueueTag,
    head: Option<TaskId>,
    tail: Option<TaskId>,
    len: usize,
}

impl TaskQueue {
    pub const fn new(tag: QueueTag) -> Self {
        Self {
            tag,
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn tag(&self) -> QueueTag {
        self.tag
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn front(&self) -> Option<TaskId> {
        self.head
    }

    pub fn back(&self) -> Option<TaskId> {
        self.tail
    }

    /// Whether `id` is linked into this queue
    pub fn contains(&self, tasks: &TaskTable, id: TaskId) -> bool {
        tasks[id].queue == Some(self.tag)
    }

    /// Append at the tail
    pub fn push_back(&mut self, tasks: &mut TaskTable, id: TaskId) {
        let tail = self.tail;
        self.link_after(tasks, id, tail);
    }

    /// Insert at the head
    pub fn push_front(&mut self, tasks: &mut TaskTable, id: TaskId) {
        self.link_after(tasks, id, None);
    }

    /// Insert after every task at least as urgent as `id`
    pub fn insert_by_priority(&mut self, tasks: &mut TaskTable, id: TaskId) {
        let prio = tasks[id].priority;
        let mut after = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            if prio.is_more_urgent_than(tasks[current].priority) {
                break;
            }
            after = Some(current);
            cursor = tasks[current].link.next;
        }
        self.link_after(tasks, id, after);
    }

    /// Insert following `order`
    pub fn insert(&mut self, tasks: &mut TaskTable, id: TaskId, order: QueueOrder) {
        match order {
            QueueOrder::Fifo => self.push_back(tasks, id),
            QueueOrder::Priority => self.insert_by_priority(tasks, id),
        }
    }

    /// Detach and return the head
    pub fn pop_front(&mut self, tasks: &mut TaskTable) -> Option<TaskId> {
        let head = self.head?;
        self.unlink(tasks, head);
        Some(head)
    }

    /// Detach `id`, returning whether it was linked here
    pub fn remove(&mut self, tasks: &mut TaskTable, id: TaskId) -> bool {
        if !self.contains(tasks, id) {
            return false;
        }
        self.unlink(tasks, id);
        true
    }

    /// Most urgent priority among queued tasks
    pub fn most_urgent(&self, tasks: &TaskTable) -> Option<Priority> {
        self.iter(tasks).map(|id| tasks[id].priority).min()
    }

    /// Head-to-tail iterator over queued ids
    pub fn iter<'a>(&self, tasks: &'a TaskTable) -> Iter<'a> {
        Iter {
            tasks,
            next: self.head,
        }
    }

    fn link_after(&mut self, tasks: &mut TaskTable, id: TaskId, after: Option<TaskId>) {
        debug_assert!(tasks[id].queue.is_none(), "task already queued");

        let next = match after {
            Some(prev) => tasks[prev].link.next,
            None => self.head,
        };

        {
            let tcb = &mut tasks[id];
            tcb.link = Link { prev: after, next };
            tcb.queue = Some(self.tag);
        }

        match after {
            Some(prev) => tasks[prev].link.next = Some(id),
            None => self.head = Some(id),
        }
        match next {
            Some(next) => tasks[next].link.prev = Some(id),
            None => self.tail = Some(id),
        }
        self.len += 1;
    }

    fn unlink(&mut self, tasks: &mut TaskTable, id: TaskId) {
        let Link { prev, next } = tasks[id].link;

        match prev {
            Some(prev) => tasks[prev].link.next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => tasks[next].link.prev = prev,
            None => self.tail = prev,
        }

        let tcb = &mut tasks[id];
        tcb.link = Link::new();
        tcb.queue = None;
        self.len -= 1;
    }
}

/// Iterator over the ids of a [`TaskQueue`]
pub struct Iter<'a> {
    tasks: &'a TaskTable,
    next: Option<TaskId>,
}

impl Iterator for Iter<'_> {
    type Item = TaskId;

    fn next(&mut self) -> Option<TaskId> {
        let current = self.next?;
        self.next = self.tasks[current].link.next;
        Some(current)
    }
}

/// Predecessor of a queued task, used for tail-to-head scans
pub(crate) fn prev_of(tasks: &TaskTable, id: TaskId) -> Option<TaskId> {
    tasks[id].link.prev
}
