//! Waiting queues lent to message-passing services
//!
//! Mailboxes, queues, streams and pipes live outside the kernel. They
//! park and wake tasks through these queues so that timeouts and
//! priority ordering behave exactly as for the built-in primitives.

use core::fmt;

use rk0_core::{KError, KResult, TaskId, Timeout, WaitQueueId};

use crate::config::QueueOrder;
use crate::queue::{QueueTag, TaskQueue};
use crate::sched::{object, object_mut, Blocking, SchedulerState};
use crate::tcb::{TaskStatus, WaitOutcome};
use crate::timeout::TimeoutKind;

/// Service a waiting queue belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Mailbox,
    Queue,
    Stream,
    Pipe,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Mailbox => "mailbox",
            ObjectKind::Queue => "queue",
            ObjectKind::Stream => "stream",
            ObjectKind::Pipe => "pipe",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct WaitQueue {
    pub(crate) kind: ObjectKind,
    pub(crate) order: QueueOrder,
    pub(crate) waiting: TaskQueue,
}

impl SchedulerState {
    pub fn wait_queue_create(&mut self, kind: ObjectKind, order: QueueOrder) -> KResult<WaitQueueId> {
        let id = WaitQueueId::new(self.wait_queues.len() as u8);
        self.wait_queues
            .push(WaitQueue {
                kind,
                order,
                waiting: TaskQueue::new(QueueTag::WaitQueue(id)),
            })
            .map_err(|_| KError::ObjectPoolFull)?;
        log::debug!("{} created for a {}", id, kind);
        Ok(id)
    }

    /// Park the running task in `status` (usually SENDING or RECEIVING)
    pub fn wait_queue_block(&mut self, id: WaitQueueId, status: TaskStatus, timeout: Timeout) -> KResult<Blocking> {
        self.assert_may_block();
        debug_assert!(status.is_waiting());
        if timeout == Timeout::NoWait {
            return Err(KError::WouldBlock);
        }
        let running = self.running;
        let queue = object_mut(&mut self.wait_queues, id.index());
        let order = queue.order;
        queue.waiting.insert(&mut self.tasks, running, order);
        self.block_running(status, timeout.finite(), TimeoutKind::WaitQueue(id));
        Ok(Blocking::Blocked)
    }

    /// Wake the head waiter, if any
    pub fn wait_queue_wake_one(&mut self, id: WaitQueueId) -> Option<TaskId> {
        let task = object_mut(&mut self.wait_queues, id.index())
            .waiting
            .pop_front(&mut self.tasks)?;
        self.wake(task, WaitOutcome::Signalled);
        Some(task)
    }

    /// Wake every waiter, returning how many were woken
    pub fn wait_queue_wake_all(&mut self, id: WaitQueueId) -> usize {
        let mut woken = 0;
        while self.wait_queue_wake_one(id).is_some() {
            woken += 1;
        }
        woken
    }

    pub fn wait_queue_len(&self, id: WaitQueueId) -> usize {
        object(&self.wait_queues, id.index()).waiting.len()
    }

    pub fn wait_queue_kind(&self, id: WaitQueueId) -> ObjectKind {
        object(&self.wait_queues, id.index()).kind
    }
}
