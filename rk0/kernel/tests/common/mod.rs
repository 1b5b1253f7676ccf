//! Helpers shared by the kernel integration tests
#![allow(dead_code)]

use rk0_kernel::{KernelConfig, Priority, SavedContext, SchedulerState, TaskId, TaskSpec, TaskStatus};

pub fn body() -> ! {
    loop {
        std::hint::spin_loop();
    }
}

pub fn prio(level: u8) -> Priority {
    Priority::new(level).expect("priority in range")
}

/// Route kernel logging to the test harness; `RUST_LOG=trace` shows switches
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn state() -> SchedulerState {
    init_logging();
    SchedulerState::new(KernelConfig::default())
}

pub fn spawn(state: &mut SchedulerState, uid: u8, level: u8) -> TaskId {
    spawn_spec(state, TaskSpec::new(body, "task", uid, prio(level)))
}

pub fn spawn_spec(state: &mut SchedulerState, spec: TaskSpec) -> TaskId {
    state
        .create_task(&spec, SavedContext::UNSET)
        .expect("task table has room")
}

/// Complete a requested switch the way a port would
pub fn dispatch(state: &mut SchedulerState) -> TaskId {
    assert!(state.is_switch_pending(), "no switch was requested");
    state.switch_context()
}

/// Run `n` ticks, dispatching whenever the tick asks for it
pub fn run_ticks(state: &mut SchedulerState, n: u32) {
    for _ in 0..n {
        if state.on_tick() {
            state.switch_context();
        }
    }
}

/// Check the structural invariants of the ready table and task states
pub fn assert_consistent(state: &SchedulerState) {
    let ready = state.ready();
    for level in 0..rk0_kernel::PRIORITY_LEVELS as u8 {
        let p = Priority::new_unchecked(level);
        assert_eq!(
            ready.mask().is_set(p),
            !ready.level(p).is_empty(),
            "bitmap bit {} disagrees with its queue",
            level
        );
    }

    let running = state.running();
    for tcb in state.tasks().iter() {
        match tcb.status() {
            TaskStatus::Running => {
                assert_eq!(tcb.id(), running);
                assert_eq!(tcb.queue(), None);
            }
            TaskStatus::Ready if state.handoff() == Some(tcb.id()) => {
                assert_eq!(tcb.queue(), None, "{} handed off but still queued", tcb.id());
            }
            TaskStatus::Ready => {
                assert!(matches!(tcb.queue(), Some(rk0_kernel::QueueTag::Ready(p)) if p == tcb.priority()));
            }
            TaskStatus::Sleeping if tcb.queue().is_none() => {
                assert!(state.timeout_remaining(tcb.id()).is_some(), "{} sleeps without a timeout", tcb.id());
            }
            status => {
                assert!(status.is_waiting(), "{} in unexpected state {}", tcb.id(), status);
                assert!(
                    tcb.queue().is_some() || state.timeout_remaining(tcb.id()).is_some(),
                    "{} is waiting nowhere",
                    tcb.id()
                );
            }
        }
    }
}
