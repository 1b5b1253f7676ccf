//! Clock Tick Service for POSIX
//!
//! Provides periodic clock tick generation from a dedicated thread.
//! Implements drift-free timing using the monotonic clock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default tick rate in Hz
pub const DEFAULT_TICKS_PER_SEC: u32 = 100;

/// Nanoseconds per second
const NSEC_PER_SEC: u64 = 1_000_000_000;

/// Clock tick configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTick {
    rate_hz: u32,
}

impl ClockTick {
    /// Create a new clock tick configuration
    ///
    /// # Panics
    ///
    /// If `rate_hz` is zero or above 10 kHz.
    pub fn new(rate_hz: u32) -> Self {
        assert!(rate_hz > 0, "Tick rate must be greater than 0");
        assert!(rate_hz <= 10_000, "Tick rate too high (max 10kHz)");
        ClockTick { rate_hz }
    }

    pub fn rate_hz(&self) -> u32 {
        self.rate_hz
    }

    /// Get the tick period as a Duration
    pub fn period(&self) -> Duration {
        Duration::from_nanos(NSEC_PER_SEC / self.rate_hz as u64)
    }
}

impl Default for ClockTick {
    fn default() -> Self {
        Self::new(DEFAULT_TICKS_PER_SEC)
    }
}

/// Running tick thread; stopped when dropped
pub struct Ticker {
    running: Arc<AtomicBool>,
    delivered: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Spawn a thread invoking `on_tick` once per period.
    ///
    /// Sleeps until the next absolute tick time rather than for a
    /// relative duration, so late wake-ups do not accumulate.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rk0_posix::{ClockTick, Ticker};
    ///
    /// let ticker = Ticker::start(ClockTick::new(10), || println!("Tick!"));
    /// std::thread::sleep(std::time::Duration::from_millis(250));
    /// ticker.stop();
    /// ```
    pub fn start<F>(clock: ClockTick, on_tick: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let delivered = Arc::new(AtomicU64::new(0));
        let period = clock.period();

        let handle = {
            let running = Arc::clone(&running);
            let delivered = Arc::clone(&delivered);
            thread::spawn(move || {
                let mut next_tick = Instant::now();
                while running.load(Ordering::Relaxed) {
                    next_tick += period;
                    let now = Instant::now();
                    if next_tick > now {
                        thread::sleep(next_tick - now);
                    }
                    if !running.load(Ordering::Relaxed) {
                        break;
                    }
                    on_tick();
                    delivered.fetch_add(1, Ordering::Relaxed);
                }
            })
        };
        log::debug!("ticker started at {} Hz", clock.rate_hz());

        Self {
            running,
            delivered,
            handle: Some(handle),
        }
    }

    /// Ticks delivered so far
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Stop the thread and wait for it to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("ticker thread panicked");
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_period() {
        assert_eq!(ClockTick::new(100).period(), Duration::from_millis(10));
        assert_eq!(ClockTick::new(1000).period(), Duration::from_millis(1));
    }

    #[quickcheck]
    fn period_rounds_down_within_one_tick(rate: u16) -> bool {
        let rate = u32::from(rate) % 10_000 + 1;
        let total = ClockTick::new(rate).period().as_nanos() * u128::from(rate);
        total <= u128::from(NSEC_PER_SEC) && u128::from(NSEC_PER_SEC) - total < u128::from(rate)
    }

    #[test]
    #[should_panic(expected = "Tick rate must be greater than 0")]
    fn test_zero_rate_rejected() {
        ClockTick::new(0);
    }

    #[test]
    fn test_ticker_delivers_and_stops() {
        let count = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&count);
        let ticker = Ticker::start(ClockTick::new(1000), move || {
            seen.fetch_add(1, Ordering::Relaxed);
        });
        thread::sleep(Duration::from_millis(50));
        ticker.stop();

        let after_stop = count.load(Ordering::Relaxed);
        assert!(after_stop > 0);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::Relaxed), after_stop);
    }
}
