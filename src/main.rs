//! Blink - A static HTML dev server with live reload.

mod cli;
mod config;
mod core;
mod embed;
mod logger;
mod reload;
mod serve;
mod template;
mod utils;
mod watch;
mod ws;

use std::sync::Arc;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::Cli;
use config::Config;
use core::Running;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = Config::load(&cli)?;

    // Install before binding so Ctrl+C during bind retries is honored.
    let running = Running::new();
    core::setup_shutdown_handler(running.clone(), config.reload.shutdown_timeout())?;

    serve::run(Arc::new(config), running)
}
