//! Reload Module
//!
//! Turns file changes into browser reloads.
//!
//! ```text
//! FileWatcher --raise--> ChangeSignal --take--> ReloadMonitor --broadcast--> ClientRegistry
//! ```
//!
//! # Modules
//!
//! - `message` - Text messages exchanged with the browser (reload, ping, pong)
//! - `monitor` - Cooldown, settle delay and keep-alive broadcasts
//! - `signal` - Change flag between watcher and monitor

pub mod message;
pub mod monitor;
pub mod signal;

pub use message::ReloadMessage;
pub use monitor::ReloadMonitor;
pub use signal::ChangeSignal;
