//! Command-line interface definitions.

use clap::{ColorChoice, Parser};
use std::path::PathBuf;

/// Static HTML dev server with live reload
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Port number to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// File served for `/` (relative to the HTML directory)
    #[arg(short, long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub serve: Option<PathBuf>,

    /// HTML directory to serve and watch
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub dir: Option<PathBuf>,

    /// Disable template processing of HTML responses
    #[arg(short, long)]
    pub no_templates: bool,

    /// Print debug output
    #[arg(short, long)]
    pub verbose: bool,

    /// Control colored output (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: blink.toml)
    #[arg(short = 'C', long, default_value = "blink.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,
}
