//! # rk0 POSIX Port
//!
//! Runs the rk0 scheduler on a host operating system. There are no real
//! stacks to swap: [`HostSwitcher`] completes each switch as a logical
//! hand-off and keeps a trace of dispatched tasks, which makes the
//! kernel's decisions observable from tests. [`Ticker`] drives the
//! system tick from a dedicated thread.
//!
//! The interrupt mask is the `std` implementation of `critical-section`,
//! a process-wide mutex.

pub mod switcher;
pub mod time;

pub use switcher::HostSwitcher;
pub use time::{ClockTick, Ticker, DEFAULT_TICKS_PER_SEC};

use rk0_kernel::{Kernel, KernelConfig, SystemTasks, TaskEntry};

/// Kernel running on the host port
pub type HostKernel = Kernel<HostSwitcher>;

/// Install `env_logger` once; later calls are ignored
pub fn init_logging() {
    let _ = env_logger::builder().is_test(cfg!(test)).try_init();
}

/// Leak a zeroed stack of `words` words
pub fn leak_stack(words: usize) -> &'static mut [u32] {
    Box::leak(vec![0u32; words].into_boxed_slice())
}

fn parked() -> ! {
    loop {
        std::thread::park();
    }
}

/// Build a host kernel with parked system task bodies
pub fn host_kernel(config: KernelConfig) -> HostKernel {
    let system = SystemTasks {
        idle: parked as TaskEntry,
        idle_stack: leak_stack(64),
        timer: parked as TaskEntry,
        timer_stack: leak_stack(64),
    };
    Kernel::new(HostSwitcher::new(), config, system)
}
