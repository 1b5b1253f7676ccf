//! Integration tests for tick and timeout types

use rk0_core::{TickCount, Timeout, NO_WAIT, WAIT_FOREVER};

#[test]
fn test_timeout_from_raw_ticks() {
    assert_eq!(Timeout::ticks(NO_WAIT), Timeout::NoWait);
    assert_eq!(Timeout::ticks(WAIT_FOREVER), Timeout::Forever);
    assert_eq!(Timeout::ticks(25).finite(), Some(25));
    assert_eq!(Timeout::from(7).raw(), 7);
    assert_eq!(Timeout::Forever.finite(), None);
    assert_eq!(Timeout::NoWait.finite(), None);
}

#[test]
fn test_tick_count_wraps() {
    let mut count = TickCount::from_parts(u32::MAX - 1, 0);
    count.advance();
    assert_eq!(count.ticks(), u32::MAX);
    assert_eq!(count.wraps(), 0);

    count.advance();
    assert_eq!(count.ticks(), 0);
    assert_eq!(count.wraps(), 1);
    assert_eq!(count.total(), 1u64 << 32);
}

#[test]
fn test_tick_count_starts_at_zero() {
    let mut count = TickCount::new();
    for _ in 0..10 {
        count.advance();
    }
    assert_eq!(count.ticks(), 10);
    assert_eq!(count.total(), 10);
}
