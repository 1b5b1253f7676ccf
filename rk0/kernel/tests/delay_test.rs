//! Sleeping, periodic activation and priority changes

mod common;

use common::*;
use rk0_kernel::{KError, TaskStatus, Timeout};

#[test]
fn test_sleep_for_ticks() {
    let mut state = state();
    let a = spawn(&mut state, 10, 1);
    state.start();

    assert_eq!(state.sleep(0), Err(KError::InvalidTimeout));
    state.sleep(3).unwrap();
    dispatch(&mut state);
    run_ticks(&mut state, 2);
    assert_eq!(state.task(a).status(), TaskStatus::Sleeping);
    run_ticks(&mut state, 1);
    assert_eq!(state.running(), a);
}

#[test]
fn test_sleep_until_does_not_drift() {
    let mut state = state();
    let a = spawn(&mut state, 10, 1);
    state.start();

    state.sleep_until(10).unwrap();
    dispatch(&mut state);
    run_ticks(&mut state, 10);
    assert_eq!(state.running(), a);

    // four ticks of work still wake on the next multiple of ten
    run_ticks(&mut state, 4);
    state.sleep_until(10).unwrap();
    assert_eq!(state.timeout_remaining(a), Some(6));
    dispatch(&mut state);
    run_ticks(&mut state, 6);
    assert_eq!(state.running(), a);
    assert_eq!(state.tick_count().ticks(), 20);
}

#[test]
fn test_sleep_until_skips_missed_activations() {
    let mut state = state();
    let a = spawn(&mut state, 10, 1);
    state.start();

    run_ticks(&mut state, 25);
    state.sleep_until(10).unwrap();
    assert_eq!(state.timeout_remaining(a), Some(5));
}

#[test]
fn test_change_and_restore_priority() {
    let mut state = state();
    let a = spawn(&mut state, 10, 2);
    let b = spawn(&mut state, 11, 3);
    state.start();

    state.change_priority(prio(1));
    assert_eq!(state.task(a).priority(), prio(1));
    assert_eq!(state.task(a).base_priority(), prio(2));
    assert!(!state.is_switch_pending());

    state.restore_priority();
    assert_eq!(state.task(a).priority(), prio(2));

    // dropping below a ready task gives up the CPU
    state.change_priority(prio(4));
    assert_eq!(dispatch(&mut state), b);
}

#[test]
fn test_changed_priority_survives_uncontended_lock() {
    let mut state = state();
    let a = spawn(&mut state, 10, 4);
    let mutex = state.mutex_create().unwrap();
    state.start();

    state.change_priority(prio(1));
    state.mutex_lock(mutex, Timeout::Forever).unwrap();
    state.mutex_unlock(mutex);
    assert_eq!(state.task(a).priority(), prio(1));

    state.restore_priority();
    assert_eq!(state.task(a).priority(), prio(4));
    assert_eq!(state.task(a).assigned_priority(), prio(4));
}

#[test]
#[should_panic(expected = "priority past the configured floor")]
fn test_change_past_floor_faults() {
    let mut state = state();
    spawn(&mut state, 10, 2);
    state.start();
    state.change_priority(prio(20));
}
