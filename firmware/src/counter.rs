use core::cell::UnsafeCell;

use analogsensor::Clock;
use cortex_m::interrupt::{self, CriticalSection};

/// Counter that is only written from inside a critical section.
pub struct CSCounter<T>(pub UnsafeCell<T>);

// only mutated with interrupts disabled
unsafe impl<T> Sync for CSCounter<T> {}

impl CSCounter<u32> {
    pub fn increment(&self, _cs: &CriticalSection) {
        unsafe {
            let count = self.0.get();
            *count = (*count).wrapping_add(1);
        }
    }

    pub fn get(&self) -> u32 {
        interrupt::free(|_| unsafe { *self.0.get() })
    }
}

impl Clock for CSCounter<u32> {
    fn now_ms(&self) -> u32 {
        self.get()
    }
}
