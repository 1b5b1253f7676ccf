//! Ready queue table
//!
//! One FIFO queue per priority level plus a bitmap of non-empty levels.
//! Bit `p` of the mask is set exactly when queue `p` holds a task.

use rk0_core::{Priority, PriorityMask, TaskId, PRIORITY_LEVELS};

use crate::queue::{QueueTag, TaskQueue};
use crate::tcb::TaskTable;

#[derive(Debug, Clone)]
pub struct ReadyTable {
    queues: [TaskQueue; PRIORITY_LEVELS],
    mask: PriorityMask,
}

impl ReadyTable {
    pub fn new() -> Self {
        Self {
            queues: core::array::from_fn(|level| {
                TaskQueue::new(QueueTag::Ready(Priority::new_unchecked(level as u8)))
            }),
            mask: PriorityMask::new(),
        }
    }

    /// Append `id` at the tail of its priority level
    pub fn push_back(&mut self, tasks: &mut TaskTable, id: TaskId) {
        let prio = tasks[id].priority;
        self.queues[prio.index()].push_back(tasks, id);
        self.mask.set(prio);
    }

    /// Put `id` back at the head of its level
    pub fn push_front(&mut self, tasks: &mut TaskTable, id: TaskId) {
        let prio = tasks[id].priority;
        self.queues[prio.index()].push_front(tasks, id);
        self.mask.set(prio);
    }

    /// Pop the head of level `prio`
    pub fn pop(&mut self, tasks: &mut TaskTable, prio: Priority) -> Option<TaskId> {
        let queue = &mut self.queues[prio.index()];
        let id = queue.pop_front(tasks);
        if queue.is_empty() {
            self.mask.clear(prio);
        }
        id
    }

    /// Remove `id` from whichever level it is queued at
    pub fn remove(&mut self, tasks: &mut TaskTable, id: TaskId) -> bool {
        let Some(QueueTag::Ready(prio)) = tasks[id].queue else {
            return false;
        };
        let queue = &mut self.queues[prio.index()];
        let removed = queue.remove(tasks, id);
        if queue.is_empty() {
            self.mask.clear(prio);
        }
        removed
    }

    /// Most urgent non-empty level
    pub fn most_urgent(&self) -> Option<Priority> {
        self.mask.most_urgent()
    }

    pub fn mask(&self) -> PriorityMask {
        self.mask
    }

    pub fn level(&self, prio: Priority) -> &TaskQueue {
        &self.queues[prio.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }

    /// Total number of ready tasks
    pub fn len(&self) -> usize {
        self.queues.iter().map(TaskQueue::len).sum()
    }
}

impl Default for ReadyTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::SavedContext;
    use crate::tcb::{TaskSpec, Tcb};

    fn body() -> ! {
        loop {}
    }

    fn table(prios: &[u8]) -> TaskTable {
        let mut tasks = TaskTable::new();
        for (i, &p) in prios.iter().enumerate() {
            let spec = TaskSpec::new(body, "t", 10 + i as u8, Priority::new_unchecked(p));
            let id = tasks.next_id();
            assert!(tasks.insert(Tcb::new(id, &spec, SavedContext::UNSET)).is_ok());
        }
        tasks
    }

    #[test]
    fn test_bitmap_tracks_non_empty_levels() {
        let mut tasks = table(&[4, 2, 4]);
        let mut ready = ReadyTable::new();
        for i in 0..3 {
            ready.push_back(&mut tasks, TaskId::new(i));
        }
        assert_eq!(ready.mask().raw(), (1 << 4) | (1 << 2));
        assert_eq!(ready.most_urgent(), Some(Priority::new_unchecked(2)));

        assert_eq!(ready.pop(&mut tasks, Priority::new_unchecked(2)), Some(TaskId::new(1)));
        assert_eq!(ready.mask().raw(), 1 << 4);

        assert_eq!(ready.pop(&mut tasks, Priority::new_unchecked(4)), Some(TaskId::new(0)));
        assert!(ready.mask().is_set(Priority::new_unchecked(4)));
        assert!(ready.remove(&mut tasks, TaskId::new(2)));
        assert!(ready.is_empty());
    }

    #[test]
    fn test_pop_empty_level() {
        let mut tasks = table(&[]);
        let mut ready = ReadyTable::new();
        assert_eq!(ready.pop(&mut tasks, Priority::HIGHEST), None);
        assert!(ready.is_empty());
    }
}
