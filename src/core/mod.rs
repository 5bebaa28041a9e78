//! Process-wide runtime state.

mod state;

pub use state::{Running, setup_shutdown_handler};
