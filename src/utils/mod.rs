//! Utility modules for the dev server.

pub mod mime;
