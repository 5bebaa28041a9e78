//! Shutdown state for serve mode.
//!
//! `Running` is cloned into every long-lived thread; each loop polls it and
//! returns once it is cleared. The Ctrl+C handler clears it and arms a
//! watchdog so a stalled shutdown still terminates the process.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::log;

/// Shared "keep going" flag.
#[derive(Debug, Clone)]
pub struct Running(Arc<AtomicBool>);

impl Default for Running {
    fn default() -> Self {
        Self::new()
    }
}

impl Running {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Check if the server should keep running
    ///
    /// Uses Relaxed ordering: worst case a loop runs one more iteration.
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Request shutdown. Returns `true` if this call cleared the flag.
    pub fn stop(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    /// Sleep up to `duration`, waking early on shutdown.
    ///
    /// Returns whether the server is still running.
    pub fn sleep(&self, duration: Duration) -> bool {
        const STEP: Duration = Duration::from_millis(50);
        let mut remaining = duration;
        while self.is_running() && !remaining.is_zero() {
            let step = remaining.min(STEP);
            thread::sleep(step);
            remaining -= step;
        }
        self.is_running()
    }
}

/// Setup the global Ctrl+C / SIGTERM handler. Call once at program start
///
/// - First signal: clear `running` and start a watchdog that exits with
///   status 1 if the process is still alive after `timeout`.
/// - Second signal: exit with status 1 immediately.
pub fn setup_shutdown_handler(running: Running, timeout: Duration) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        if running.stop() {
            log!("serve"; "shutting down...");
            arm_watchdog(timeout);
        } else {
            log!("serve"; "forced exit");
            std::process::exit(1);
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

fn arm_watchdog(timeout: Duration) {
    let spawned = thread::Builder::new()
        .name("shutdown-watchdog".into())
        .spawn(move || {
            thread::sleep(timeout);
            log!("error"; "shutdown did not finish within {}s, exiting", timeout.as_secs());
            std::process::exit(1);
        });

    if spawned.is_err() {
        std::process::exit(1);
    }
}
