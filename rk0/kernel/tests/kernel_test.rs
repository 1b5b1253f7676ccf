//! The kernel facade driving a recording port

use std::sync::atomic::{AtomicUsize, Ordering};

use rk0_kernel::{
    ContextSwitcher, FlagsOp, KError, Kernel, KernelConfig, Priority, SavedContext, SchedulerState, SystemTasks,
    TaskEntry, TaskId, TaskSpec, TaskStatus, Timeout, WaitFlags,
};

fn body() -> ! {
    loop {
        std::hint::spin_loop();
    }
}

fn stack() -> &'static mut [u32] {
    Box::leak(vec![0u32; 32].into_boxed_slice())
}

/// Port that completes every switch on the spot
#[derive(Default)]
struct Recorder {
    dispatched: Vec<TaskId>,
    contexts: usize,
}

impl ContextSwitcher for Recorder {
    fn build_initial_context(&mut self, _entry: TaskEntry, stack: &'static mut [u32]) -> SavedContext {
        self.contexts += 1;
        SavedContext(stack.len())
    }

    fn switch(&mut self, state: &mut SchedulerState) {
        let next = state.switch_context();
        self.dispatched.push(next);
    }

    fn start(&mut self, _state: &mut SchedulerState, first: TaskId) {
        self.dispatched.push(first);
    }
}

fn kernel() -> Kernel<Recorder> {
    let system = SystemTasks {
        idle: body,
        idle_stack: stack(),
        timer: body,
        timer_stack: stack(),
    };
    Kernel::new(Recorder::default(), KernelConfig::default(), system)
}

fn task(kernel: &Kernel<Recorder>, uid: u8, level: u8) -> TaskId {
    let spec = TaskSpec::new(body, "task", uid, Priority::new_unchecked(level));
    kernel.create_task(spec, stack()).unwrap()
}

#[test]
fn test_system_contexts_built() {
    let kernel = kernel();
    assert_eq!(kernel.port(|port| port.contexts), 2);
    task(&kernel, 10, 2);
    assert_eq!(kernel.port(|port| port.contexts), 3);
    assert_eq!(kernel.inspect(|state| state.task(TaskId::IDLE).context()), SavedContext(32));
}

#[test]
fn test_blocking_call_switches_and_reports_pending() {
    let kernel = kernel();
    let a = task(&kernel, 10, 1);
    let b = task(&kernel, 11, 2);
    let sema = kernel.semaphore_create(0).unwrap();
    assert_eq!(kernel.start(), a);

    // the recorder switched away, so the caller has not been resumed
    assert_eq!(kernel.semaphore_wait(sema, Timeout::Forever), Err(KError::Pending));
    assert_eq!(kernel.running(), b);

    kernel.semaphore_signal(sema);
    assert_eq!(kernel.running(), a);
    assert_eq!(kernel.port(|port| port.dispatched.clone()), vec![a, b, a]);
    assert_eq!(kernel.semaphore_value(sema), 0);
}

#[test]
fn test_non_blocking_calls_complete() {
    let kernel = kernel();
    task(&kernel, 10, 1);
    let sema = kernel.semaphore_create(1).unwrap();
    let mutex = kernel.mutex_create().unwrap();
    kernel.start();

    assert_eq!(kernel.semaphore_wait(sema, Timeout::NoWait), Ok(()));
    assert_eq!(kernel.semaphore_wait(sema, Timeout::NoWait), Err(KError::WouldBlock));
    assert_eq!(kernel.mutex_lock(mutex, Timeout::Forever), Ok(()));
    assert_eq!(kernel.mutex_owner(mutex), Some(kernel.running()));
    kernel.mutex_unlock(mutex);
    assert_eq!(kernel.mutex_owner(mutex), None);
}

#[test]
fn test_flags_delivered_after_wake() {
    let kernel = kernel();
    let a = task(&kernel, 10, 1);
    task(&kernel, 11, 2);
    let event = kernel.event_create().unwrap();
    kernel.start();

    kernel.event_flags_set(event, 0b100, FlagsOp::Or);
    assert_eq!(kernel.event_flags_get(event, 0b110, WaitFlags::empty(), Timeout::NoWait), Ok(0b100));
    assert_eq!(
        kernel.event_flags_get(event, 0b011, WaitFlags::ALL, Timeout::Forever),
        Err(KError::Pending)
    );
    assert_eq!(kernel.event_flags_set(event, 0b011, FlagsOp::Or), 1);
    assert_eq!(kernel.running(), a);
    assert_eq!(kernel.inspect(|state| state.task(a).flags_received()), 0b011);

    kernel.event_flags_clear(event, 0b001);
    assert_eq!(kernel.event_flags(event), 0b110);
}

#[test]
fn test_tick_wakes_sleeper() {
    let kernel = kernel();
    let a = task(&kernel, 10, 1);
    kernel.start();

    assert_eq!(kernel.sleep(2), Err(KError::Pending));
    assert_eq!(kernel.running(), TaskId::IDLE);
    kernel.tick();
    assert_eq!(kernel.running(), TaskId::IDLE);
    kernel.tick();
    assert_eq!(kernel.running(), a);
    assert_eq!(kernel.tick_count().ticks(), 2);
}

#[test]
fn test_isr_switch_waits_for_exit() {
    let kernel = kernel();
    let a = task(&kernel, 10, 1);
    let b = task(&kernel, 11, 2);
    kernel.start();
    assert_eq!(kernel.pend(Timeout::Forever), Err(KError::Pending));
    assert_eq!(kernel.running(), b);

    kernel.isr_enter();
    kernel.signal(a);
    assert_eq!(kernel.running(), b);
    assert!(kernel.isr_exit());
    assert_eq!(kernel.running(), a);
}

#[test]
fn test_timer_handler_runs_callouts() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    fn count(arg: usize) {
        CALLS.fetch_add(arg, Ordering::SeqCst);
    }

    let kernel = kernel();
    task(&kernel, 10, 3);
    kernel.start();
    kernel.timer_create(0, 2, count, 5, true).unwrap();

    kernel.tick();
    kernel.tick();
    assert_eq!(kernel.running(), TaskId::TIMER_HANDLER);
    assert_eq!(kernel.run_timer_handler(), 1);
    assert_eq!(CALLS.load(Ordering::SeqCst), 5);

    // the handler parks itself once the backlog is drained
    assert_eq!(kernel.pend(Timeout::Forever), Err(KError::Pending));
    assert_eq!(
        kernel.inspect(|state| state.task(TaskId::TIMER_HANDLER).status()),
        TaskStatus::Pending
    );
}

#[test]
fn test_cond_wait_reports_pending() {
    let kernel = kernel();
    task(&kernel, 10, 1);
    let b = task(&kernel, 11, 2);
    let mutex = kernel.mutex_create().unwrap();
    let cond = kernel.event_create().unwrap();
    kernel.start();

    kernel.mutex_lock(mutex, Timeout::Forever).unwrap();
    assert_eq!(kernel.cond_wait(cond, mutex, Timeout::Forever), Err(KError::Pending));
    assert_eq!(kernel.running(), b);
    assert_eq!(kernel.event_waiting(cond), 1);
    assert_eq!(kernel.cond_broadcast(cond), 1);
    assert_eq!(kernel.cond_signal(cond), Err(KError::EmptyWaitQueue));
}
