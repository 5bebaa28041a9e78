//! File watcher for the served directory.
//!
//! Tracks files with the configured extension, polls their mtimes, and
//! raises the shared `ChangeSignal` for each debounced change.
//!
//! ```text
//! Idle → Scanning → Watching(Polling | EventWait) ⟲ → Stopped
//! ```
//!
//! OS notifications, when available, only wake the loop early; mtime polling
//! decides what changed.

mod debounce;
mod files;
mod source;

#[cfg(test)]
mod tests;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use source::ChangeSource;

use crate::config::WatchConfig;
use crate::core::Running;
use crate::reload::ChangeSignal;
use crate::{debug, log};
use debounce::Debouncer;
use files::TrackedFiles;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("`{0}` is not a directory")]
    NotADirectory(PathBuf),

    #[error("cannot access `{0}`")]
    Io(PathBuf, #[source] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    Polling,
    EventWait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Scanning,
    Watching(WatchMode),
    Stopped,
}

pub struct FileWatcher {
    dir: PathBuf,
    config: WatchConfig,
    files: TrackedFiles,
    debouncer: Debouncer,
    source: Box<dyn ChangeSource>,
    signal: Arc<ChangeSignal>,
    state: WatcherState,
    last_rescan: Instant,
}

impl FileWatcher {
    /// Validate `dir`, scan it and pick a change source.
    pub fn new(
        dir: &Path,
        config: &WatchConfig,
        signal: Arc<ChangeSignal>,
    ) -> Result<Self, WatchError> {
        let source = source::select(dir, config);
        Self::with_source(dir, config, signal, source)
    }

    /// Like `new`, with an explicit change source.
    pub fn with_source(
        dir: &Path,
        config: &WatchConfig,
        signal: Arc<ChangeSignal>,
        source: Box<dyn ChangeSource>,
    ) -> Result<Self, WatchError> {
        let meta = dir
            .metadata()
            .map_err(|e| WatchError::Io(dir.to_path_buf(), e))?;
        if !meta.is_dir() {
            return Err(WatchError::NotADirectory(dir.to_path_buf()));
        }

        let mut watcher = Self {
            dir: dir.to_path_buf(),
            config: config.clone(),
            files: TrackedFiles::new(),
            debouncer: Debouncer::new(config.debounce()),
            source,
            signal,
            state: WatcherState::Idle,
            last_rescan: Instant::now(),
        };

        watcher.state = WatcherState::Scanning;
        watcher.rescan(Instant::now());
        // Record baseline mtimes so the initial scan is not a change.
        watcher.files.poll();

        let mode = watcher.source.mode();
        watcher.state = WatcherState::Watching(mode);
        log!(
            "watch";
            "watching {} ({} .{} files, {:?})",
            watcher.dir.display(),
            watcher.files.len(),
            watcher.config.extension(),
            mode
        );
        Ok(watcher)
    }

    #[cfg(test)]
    pub fn state(&self) -> WatcherState {
        self.state
    }

    #[cfg(test)]
    pub fn tracked(&self) -> usize {
        self.files.len()
    }

    /// Track newly created matching files.
    fn rescan(&mut self, now: Instant) {
        let found = files::scan(&self.dir, self.config.extension(), self.config.recursive);
        let added = found.into_iter().filter(|p| self.files.track(p.clone())).count();
        if added > 0 {
            debug!("watch"; "tracking {} new file(s)", added);
        }
        self.last_rescan = now;
    }

    /// One pass at time `now`: rescan if due, check mtimes, signal.
    ///
    /// Returns the paths that were signaled.
    pub fn poll_once(&mut self, now: Instant) -> Vec<PathBuf> {
        if now.saturating_duration_since(self.last_rescan) >= self.config.rescan_interval() {
            self.rescan(now);
        }

        let signaled: Vec<PathBuf> = self
            .files
            .poll()
            .into_iter()
            .filter(|path| self.debouncer.admit(path, now))
            .collect();

        for path in &signaled {
            let shown = path.strip_prefix(&self.dir).unwrap_or(path);
            log!("watch"; "changed: {}", shown.display());
        }
        if !signaled.is_empty() {
            self.signal.raise();
        }

        signaled
    }

    /// Wait on the change source, then poll.
    pub fn tick(&mut self) -> Vec<PathBuf> {
        let hints = self.source.wait(self.config.poll_interval());
        let extension = self.config.extension().to_string();
        for path in hints {
            if !self.files.contains(&path)
                && path.is_file()
                && files::matches_extension(&path, &extension)
            {
                debug!("watch"; "discovered {}", path.display());
                self.files.track(path);
            }
        }
        self.poll_once(Instant::now())
    }

    /// Loop until shutdown.
    pub fn run(&mut self, running: &Running) {
        while running.is_running() {
            self.tick();
        }
        self.state = WatcherState::Stopped;
        debug!("watch"; "watcher {:?}", self.state);
    }
}
