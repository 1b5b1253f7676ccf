//! Delta-encoded timeout list
//!
//! A single list holds every armed timeout, sorted by absolute
//! deadline. Each node stores the ticks between its deadline and the
//! previous node's, so a tick only ever touches the head. Nodes live in
//! a fixed slot table: one slot per task followed by one per callout
//! timer, so arming never allocates.

use rk0_core::{EventId, KError, KResult, MutexId, SemaphoreId, TimerId, WaitQueueId};

/// What an expiring node should wake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// A task sleeping or pending directly on its handle
    TaskHandle,
    Semaphore(SemaphoreId),
    Mutex(MutexId),
    Event(EventId),
    /// A task blocked in a message-passing service's queue
    WaitQueue(WaitQueueId),
    /// A callout timer
    Timer(TimerId),
}

#[derive(Debug, Clone, Copy)]
struct Node {
    delta: u32,
    prev: Option<u8>,
    next: Option<u8>,
    kind: Option<TimeoutKind>,
}

impl Node {
    const IDLE: Node = Node {
        delta: 0,
        prev: None,
        next: None,
        kind: None,
    };
}

/// Fixed-capacity delta list with `N` slots
#[derive(Debug, Clone)]
pub struct DeltaList<const N: usize> {
    nodes: [Node; N],
    head: Option<u8>,
    len: usize,
}

impl<const N: usize> DeltaList<N> {
    pub const fn new() -> Self {
        Self {
            nodes: [Node::IDLE; N],
            head: None,
            len: 0,
        }
    }

    /// Arm `slot` to expire after `ticks` ticks.
    ///
    /// An armed slot is re-armed. The node is placed after every node
    /// with the same deadline.
    pub fn arm(&mut self, slot: usize, ticks: u32, kind: TimeoutKind) -> KResult<()> {
        if ticks == 0 {
            return Err(KError::InvalidTimeout);
        }
        self.disarm(slot);

        let mut remaining = ticks;
        let mut prev = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            let delta = self.nodes[current as usize].delta;
            if delta > remaining {
                break;
            }
            remaining -= delta;
            prev = Some(current);
            cursor = self.nodes[current as usize].next;
        }

        let this = slot as u8;
        self.nodes[slot] = Node {
            delta: remaining,
            prev,
            next: cursor,
            kind: Some(kind),
        };
        match prev {
            Some(prev) => self.nodes[prev as usize].next = Some(this),
            None => self.head = Some(this),
        }
        if let Some(next) = cursor {
            let next = &mut self.nodes[next as usize];
            next.prev = Some(this);
            next.delta -= remaining;
        }
        self.len += 1;
        Ok(())
    }

    /// Remove `slot`, folding its delta into its successor
    pub fn disarm(&mut self, slot: usize) -> bool {
        let node = self.nodes[slot];
        if node.kind.is_none() {
            return false;
        }
        match node.prev {
            Some(prev) => self.nodes[prev as usize].next = node.next,
            None => self.head = node.next,
        }
        if let Some(next) = node.next {
            let next = &mut self.nodes[next as usize];
            next.prev = node.prev;
            next.delta += node.delta;
        }
        self.nodes[slot] = Node::IDLE;
        self.len -= 1;
        true
    }

    /// Advance time by one tick
    pub fn age_one_tick(&mut self) {
        if let Some(head) = self.head {
            let head = &mut self.nodes[head as usize];
            head.delta = head.delta.saturating_sub(1);
        }
    }

    /// Detach the head if its deadline has been reached
    pub fn pop_expired(&mut self) -> Option<(usize, TimeoutKind)> {
        let head = self.head? as usize;
        let node = self.nodes[head];
        if node.delta != 0 {
            return None;
        }
        let kind = node.kind?;
        self.disarm(head);
        Some((head, kind))
    }

    pub fn is_armed(&self, slot: usize) -> bool {
        self.nodes[slot].kind.is_some()
    }

    pub fn kind(&self, slot: usize) -> Option<TimeoutKind> {
        self.nodes[slot].kind
    }

    /// Ticks until `slot` expires
    pub fn remaining(&self, slot: usize) -> Option<u32> {
        self.nodes[slot].kind?;
        let mut total = 0u32;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            let node = &self.nodes[current as usize];
            total = total.saturating_add(node.delta);
            if current as usize == slot {
                return Some(total);
            }
            cursor = node.next;
        }
        None
    }

    /// Delta of the head node
    pub fn head_delta(&self) -> Option<u32> {
        self.head.map(|head| self.nodes[head as usize].delta)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// `(slot, delta)` pairs in deadline order
    pub fn iter(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let current = cursor? as usize;
            let node = &self.nodes[current];
            cursor = node.next;
            Some((current, node.delta))
        })
    }
}

impl<const N: usize> Default for DeltaList<N> {
    fn default() -> Self {
        Self::new()
    }
}
