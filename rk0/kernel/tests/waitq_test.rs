//! Waiting queues used by message-passing services

mod common;

use common::*;
use rk0_kernel::{KError, ObjectKind, QueueOrder, TaskStatus, Timeout, WaitOutcome};

#[test]
fn test_receivers_woken_by_priority() {
    let mut state = state();
    let low = spawn(&mut state, 10, 3);
    let high = spawn(&mut state, 11, 1);
    spawn(&mut state, 12, 4);
    let mailbox = state.wait_queue_create(ObjectKind::Mailbox, QueueOrder::Priority).unwrap();
    assert_eq!(state.wait_queue_kind(mailbox), ObjectKind::Mailbox);
    state.start();

    state.wait_queue_block(mailbox, TaskStatus::Receiving, Timeout::Forever).unwrap();
    assert_eq!(dispatch(&mut state), low);
    state.wait_queue_block(mailbox, TaskStatus::Receiving, Timeout::Forever).unwrap();
    dispatch(&mut state);
    assert_eq!(state.task(low).status(), TaskStatus::Receiving);

    assert_eq!(state.wait_queue_wake_one(mailbox), Some(high));
    assert_eq!(state.wait_queue_wake_all(mailbox), 1);
    assert_eq!(state.wait_queue_wake_one(mailbox), None);
}

#[test]
fn test_sender_times_out() {
    let mut state = state();
    let sender = spawn(&mut state, 10, 2);
    let pipe = state.wait_queue_create(ObjectKind::Pipe, QueueOrder::Fifo).unwrap();
    state.start();

    assert_eq!(
        state.wait_queue_block(pipe, TaskStatus::Sending, Timeout::NoWait),
        Err(KError::WouldBlock)
    );
    state.wait_queue_block(pipe, TaskStatus::Sending, Timeout::ticks(2)).unwrap();
    dispatch(&mut state);
    run_ticks(&mut state, 2);
    assert_eq!(state.running(), sender);
    assert_eq!(state.take_outcome(sender), Some(WaitOutcome::TimedOut));
    assert_eq!(state.wait_queue_len(pipe), 0);
}
