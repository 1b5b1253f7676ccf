//! Task priorities and the ready bitmap
//!
//! Priority 0 is the most urgent level. The kernel supports
//! [`PRIORITY_LEVELS`] levels; one bit per level in [`PriorityMask`]
//! records which ready queues are non-empty.

use core::fmt;

/// Number of priority levels (one bit each in a [`PriorityMask`])
pub const PRIORITY_LEVELS: usize = 32;

/// Type-safe task priority, numerically lower is more urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    /// Most urgent level
    pub const HIGHEST: Priority = Priority(0);

    /// Least urgent level the bitmap can represent
    pub const LOWEST: Priority = Priority(PRIORITY_LEVELS as u8 - 1);

    /// Create a priority, `None` when it does not fit the bitmap
    pub const fn new(priority: u8) -> Option<Self> {
        if (priority as usize) < PRIORITY_LEVELS {
            Some(Priority(priority))
        } else {
            None
        }
    }

    /// Create priority without validation (const fn)
    pub const fn new_unchecked(priority: u8) -> Self {
        Priority(priority)
    }

    /// Get the raw priority value
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Level as an index into per-priority tables
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether `self` is strictly more urgent than `other`
    pub const fn is_more_urgent_than(self, other: Priority) -> bool {
        self.0 < other.0
    }

    /// The more urgent of two priorities
    pub fn most_urgent(self, other: Priority) -> Priority {
        if other.is_more_urgent_than(self) {
            other
        } else {
            self
        }
    }

    /// Next less urgent level, `None` past [`Priority::LOWEST`]
    pub const fn less_urgent(self) -> Option<Priority> {
        Priority::new(self.0 + 1)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Priority({})", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Priority {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Priority({})", self.0);
    }
}

/// One bit per priority level, bit `p` set iff level `p` is non-empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriorityMask(u32);

impl PriorityMask {
    /// Empty priority mask
    pub const EMPTY: Self = Self(0);

    /// Create a new empty priority mask
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Set a priority in the mask
    pub fn set(&mut self, priority: Priority) {
        self.0 |= 1u32 << priority.0;
    }

    /// Clear a priority in the mask
    pub fn clear(&mut self, priority: Priority) {
        self.0 &= !(1u32 << priority.0);
    }

    /// Check if a priority is set in the mask
    pub const fn is_set(&self, priority: Priority) -> bool {
        (self.0 & (1u32 << priority.0)) != 0
    }

    /// Check if the mask is empty
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Most urgent level present (find-first-set from bit 0)
    pub const fn most_urgent(&self) -> Option<Priority> {
        if self.0 == 0 {
            None
        } else {
            Some(Priority(self.0.trailing_zeros() as u8))
        }
    }

    /// Raw mask bits
    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_bounds() {
        assert_eq!(Priority::new(0), Some(Priority::HIGHEST));
        assert_eq!(Priority::new(31), Some(Priority::LOWEST));
        assert_eq!(Priority::new(32), None);
        assert_eq!(Priority::LOWEST.less_urgent(), None);
    }

    #[test]
    fn test_urgency_order() {
        let hi = Priority::new_unchecked(1);
        let lo = Priority::new_unchecked(5);
        assert!(hi.is_more_urgent_than(lo));
        assert!(!lo.is_more_urgent_than(hi));
        assert!(!hi.is_more_urgent_than(hi));
        assert_eq!(lo.most_urgent(hi), hi);
    }

    #[test]
    fn test_mask_most_urgent() {
        let mut mask = PriorityMask::new();
        assert_eq!(mask.most_urgent(), None);

        mask.set(Priority::new_unchecked(7));
        mask.set(Priority::new_unchecked(3));
        mask.set(Priority::new_unchecked(31));
        assert_eq!(mask.most_urgent(), Some(Priority::new_unchecked(3)));

        mask.clear(Priority::new_unchecked(3));
        assert_eq!(mask.most_urgent(), Some(Priority::new_unchecked(7)));
        assert!(mask.is_set(Priority::LOWEST));
    }
}
