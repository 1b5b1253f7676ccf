//! Kernel capacities and runtime configuration

use rk0_core::{Priority, PRIORITY_LEVELS};

/// Task slots, including the idle and timer handler tasks
pub const MAX_TASKS: usize = 16;

/// Counting semaphores
pub const MAX_SEMAPHORES: usize = 16;

/// Mutexes
pub const MAX_MUTEXES: usize = 16;

/// Events (sleep/wake, flags and condition variables)
pub const MAX_EVENTS: usize = 16;

/// Application callout timers
pub const MAX_TIMERS: usize = 8;

/// Generic waiting queues handed to message-passing services
pub const MAX_WAIT_QUEUES: usize = 16;

/// Timeout slots: one per task followed by one per callout timer
pub const TIMEOUT_SLOTS: usize = MAX_TASKS + MAX_TIMERS;

/// Default floor for user task priorities
pub const DEFAULT_LOWEST_PRIORITY: Priority = Priority::new_unchecked(5);

/// Ordering policy of a waiting queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOrder {
    /// Arrival order
    Fifo,
    /// Most urgent first, arrival order among equals
    Priority,
}

/// Where a reloading timer restarts after it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadPhase {
    /// Phase applies only to the first expiry, period is the duration
    Zero,
    /// Every period repeats phase plus duration
    Original,
}

/// Runtime kernel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Least urgent priority a user task may take; idle runs one below it
    pub lowest_priority: Priority,
    /// Round-robin among equal priorities using per-task budgets
    pub time_slicing: bool,
    /// Semaphore waiting queue order
    pub semaphore_order: QueueOrder,
    /// Mutex waiting queue order
    pub mutex_order: QueueOrder,
    /// Boost the last successful semaphore waiter while others block
    pub semaphore_boost: bool,
    /// Restart policy of reloading timers
    pub reload_phase: ReloadPhase,
}

impl KernelConfig {
    /// Default configuration
    pub const fn new() -> Self {
        Self {
            lowest_priority: DEFAULT_LOWEST_PRIORITY,
            time_slicing: false,
            semaphore_order: QueueOrder::Fifo,
            mutex_order: QueueOrder::Fifo,
            semaphore_boost: false,
            reload_phase: ReloadPhase::Zero,
        }
    }

    /// Set the floor for user task priorities
    pub const fn with_lowest_priority(mut self, lowest: Priority) -> Self {
        self.lowest_priority = lowest;
        self
    }

    /// Enable or disable time slicing
    pub const fn with_time_slicing(mut self, enabled: bool) -> Self {
        self.time_slicing = enabled;
        self
    }

    /// Set the semaphore waiting queue order
    pub const fn with_semaphore_order(mut self, order: QueueOrder) -> Self {
        self.semaphore_order = order;
        self
    }

    /// Set the mutex waiting queue order
    pub const fn with_mutex_order(mut self, order: QueueOrder) -> Self {
        self.mutex_order = order;
        self
    }

    /// Enable or disable the semaphore owner boost
    pub const fn with_semaphore_boost(mut self, enabled: bool) -> Self {
        self.semaphore_boost = enabled;
        self
    }

    /// Set the reload policy of periodic timers
    pub const fn with_reload_phase(mut self, phase: ReloadPhase) -> Self {
        self.reload_phase = phase;
        self
    }

    /// Priority of the idle task, one level below the user floor
    pub const fn idle_priority(&self) -> Priority {
        Priority::new_unchecked(self.lowest_priority.raw() + 1)
    }

    /// Whether the configured floor leaves room for the idle level
    pub const fn is_valid(&self) -> bool {
        (self.lowest_priority.raw() as usize) < PRIORITY_LEVELS - 1
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
