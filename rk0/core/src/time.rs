//! Tick and timeout types

use core::fmt;
use core::num::NonZeroU32;

/// Tick count value meaning "wait forever"
pub const WAIT_FOREVER: u32 = u32::MAX;

/// Tick count value meaning "do not wait"
pub const NO_WAIT: u32 = 0;

/// How long a blocking call may wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Fail immediately instead of blocking
    NoWait,
    /// Give up after this many ticks
    Ticks(NonZeroU32),
    /// Block until woken
    Forever,
}

impl Timeout {
    /// Build a timeout from a raw tick count.
    ///
    /// `0` is [`Timeout::NoWait`] and [`WAIT_FOREVER`] is
    /// [`Timeout::Forever`].
    pub const fn ticks(ticks: u32) -> Self {
        if ticks == WAIT_FOREVER {
            return Timeout::Forever;
        }
        match NonZeroU32::new(ticks) {
            Some(ticks) => Timeout::Ticks(ticks),
            None => Timeout::NoWait,
        }
    }

    /// Finite tick count, if the timeout needs a timeout node
    pub const fn finite(self) -> Option<u32> {
        match self {
            Timeout::Ticks(ticks) => Some(ticks.get()),
            _ => None,
        }
    }

    /// Raw tick count
    pub const fn raw(self) -> u32 {
        match self {
            Timeout::NoWait => NO_WAIT,
            Timeout::Ticks(ticks) => ticks.get(),
            Timeout::Forever => WAIT_FOREVER,
        }
    }
}

impl From<u32> for Timeout {
    fn from(ticks: u32) -> Self {
        Timeout::ticks(ticks)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::NoWait => write!(f, "no-wait"),
            Timeout::Ticks(ticks) => write!(f, "{}ticks", ticks),
            Timeout::Forever => write!(f, "forever"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Timeout {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Timeout::NoWait => defmt::write!(fmt, "no-wait"),
            Timeout::Ticks(ticks) => defmt::write!(fmt, "{}ticks", ticks.get()),
            Timeout::Forever => defmt::write!(fmt, "forever"),
        }
    }
}

/// System tick counter with a wrap count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickCount {
    ticks: u32,
    wraps: u32,
}

impl TickCount {
    /// Counter at tick zero
    pub const fn new() -> Self {
        Self { ticks: 0, wraps: 0 }
    }

    /// Counter at an arbitrary point, mainly for restoring saved state
    pub const fn from_parts(ticks: u32, wraps: u32) -> Self {
        Self { ticks, wraps }
    }

    /// Advance by one tick, counting a wrap when the counter overflows
    pub fn advance(&mut self) {
        let (ticks, wrapped) = self.ticks.overflowing_add(1);
        self.ticks = ticks;
        if wrapped {
            self.wraps = self.wraps.wrapping_add(1);
        }
    }

    /// Ticks since the last wrap
    pub const fn ticks(self) -> u32 {
        self.ticks
    }

    /// Number of times the tick counter wrapped
    pub const fn wraps(self) -> u32 {
        self.wraps
    }

    /// Full 64-bit tick count
    pub const fn total(self) -> u64 {
        ((self.wraps as u64) << 32) | self.ticks as u64
    }
}

impl fmt::Display for TickCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick {}", self.total())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TickCount {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "tick {}", self.total());
    }
}
