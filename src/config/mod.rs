//! Server configuration from `blink.toml` and command-line overrides.
//!
//! # Sections
//!
//! | Section      | Purpose                                         |
//! |--------------|-------------------------------------------------|
//! | `[serve]`    | Listener, HTML directory, default document      |
//! | `[ws]`       | Client limit and socket timeouts                |
//! | `[watch]`    | Tracked extension, polling and debounce         |
//! | `[reload]`   | Cooldown, settle delay, keep-alive, shutdown    |
//! | `[template]` | Values for `{{ }}` / `{% %}` tags               |
//!
//! The config file is optional; every key has a default.

mod error;
pub mod section;

pub use error::ConfigError;
pub use section::{ReloadConfig, ServeConfig, TemplateConfig, WatchConfig, WsConfig};

use crate::{cli::Cli, debug, log};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing blink.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub ws: WsConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub reload: ReloadConfig,

    #[serde(default)]
    pub template: TemplateConfig,
}

impl Config {
    /// Load configuration, apply CLI overrides and validate.
    ///
    /// A missing config file is not an error: defaults are used.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = if cli.config.is_file() {
            Self::from_path(&cli.config)?
        } else {
            debug!("config"; "{} not found, using defaults", cli.config.display());
            Self::default()
        };

        config.apply_cli(cli);
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML string
    #[cfg(test)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {field}");
        }
    }

    /// Command-line flags take precedence over the file.
    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(port) = cli.port {
            self.serve.port = port;
        }
        if let Some(dir) = &cli.dir {
            self.serve.root = dir.clone();
        }
        if let Some(index) = &cli.serve {
            self.serve.index = index.to_string_lossy().into_owned();
        }
        if cli.no_templates {
            self.template.enable = false;
        }
    }

    /// Expand `~` in the HTML directory.
    fn normalize(&mut self) {
        if let Some(root) = self.serve.root.to_str() {
            self.serve.root = PathBuf::from(shellexpand::tilde(root).into_owned());
        }
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serve.port == 0 {
            return Err(ConfigError::Validation("[serve] port must be non-zero".into()));
        }
        if self.serve.workers == 0 {
            return Err(ConfigError::Validation("[serve] workers must be at least 1".into()));
        }
        if self.serve.index.trim().is_empty() {
            return Err(ConfigError::Validation("[serve] index must not be empty".into()));
        }
        if self.ws.max_clients == 0 {
            return Err(ConfigError::Validation("[ws] max_clients must be at least 1".into()));
        }
        if self.watch.extension().is_empty() {
            return Err(ConfigError::Validation("[watch] extension must not be empty".into()));
        }
        Ok(())
    }
}

/// Parse config and fail on unknown fields (to catch typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> Config {
    let (parsed, ignored) = Config::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("blink").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_unknown_fields_are_collected() {
        let (config, ignored) =
            Config::parse_with_ignored("[serve]\nport = 9000\nprot = 1\n[extra]\nx = 1").unwrap();
        assert_eq!(config.serve.port, 9000);
        assert_eq!(ignored.len(), 2);
        assert!(ignored.iter().any(|f| f == "serve.prot"));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Config::from_str("[serve\nport = 1"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("blink.toml");
        let config = Config::load(&cli(&["-C", missing.to_str().unwrap()])).unwrap();
        assert_eq!(config.serve.port, 8080);
        assert_eq!(config.ws.max_clients, 50);
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[serve]\nport = 3000\nroot = \"public\"\n[template]\nenable = true"
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let config =
            Config::load(&cli(&["-C", path, "-p", "9090", "-s", "home.html", "-n"])).unwrap();
        assert_eq!(config.serve.port, 9090);
        assert_eq!(config.serve.root, PathBuf::from("public"));
        assert_eq!(config.serve.index, "home.html");
        assert!(!config.template.enable);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.ws.max_clients = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = Config::default();
        config.watch.extension = ".".to_string();
        assert!(config.validate().is_err());

        let config = Config::from_str("[serve]\nport = 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tilde_expansion() {
        let mut config = Config::default();
        config.serve.root = PathBuf::from("~/site");
        config.normalize();
        assert!(!config.serve.root.starts_with("~"));
    }
}
