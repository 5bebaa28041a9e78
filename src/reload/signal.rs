//! Change flag handed from the file watcher to the reload monitor.
//!
//! Only the watcher raises it and only the monitor clears it. The flag is
//! never touched without holding its lock; a condition variable lets the
//! monitor sleep until it is raised.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
pub struct ChangeSignal {
    changed: Mutex<bool>,
    cond: Condvar,
}

impl ChangeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark content as changed and wake a waiting monitor.
    pub fn raise(&self) {
        let mut changed = self.changed.lock();
        *changed = true;
        self.cond.notify_one();
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        std::mem::replace(&mut *self.changed.lock(), false)
    }

    pub fn is_raised(&self) -> bool {
        *self.changed.lock()
    }

    /// Block until raised or `timeout` elapses. Does not clear the flag.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut changed = self.changed.lock();
        while !*changed {
            if self.cond.wait_until(&mut changed, deadline).timed_out() {
                break;
            }
        }
        *changed
    }
}
