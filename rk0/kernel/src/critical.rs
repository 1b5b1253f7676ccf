//! Critical region guard
//!
//! All kernel state sits in one [`KernelCell`]. Entering it masks
//! interrupts through the port's `critical_section::Impl` and hands out
//! an exclusive borrow; the previous mask is restored when the closure
//! returns, so regions always nest in LIFO order.

use core::cell::RefCell;

use critical_section::Mutex;
use rk0_core::{kernel_fault, Fault};

/// State reachable only from inside the critical region
pub struct KernelCell<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> KernelCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Run `f` with interrupts masked and exclusive access to the value.
    ///
    /// Re-entering from inside `f` is a fault.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|cs| {
            let mut value = match self.inner.borrow(cs).try_borrow_mut() {
                Ok(value) => value,
                Err(_) => kernel_fault(Fault::NestedRegion),
            };
            f(&mut value)
        })
    }
}
