//! Change sources: OS notifications or plain polling.
//!
//! Both implement `ChangeSource`. The watcher always polls mtimes after
//! `wait` returns; an event source only shortens the wait and hints at
//! which paths moved.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::WatchMode;
use crate::config::WatchConfig;
use crate::{debug, log};

pub trait ChangeSource: Send {
    fn mode(&self) -> WatchMode;

    /// Block for at most `timeout`; return paths reported as touched.
    fn wait(&mut self, timeout: Duration) -> Vec<PathBuf>;
}

/// Sleep-only source.
pub struct PollSource;

impl ChangeSource for PollSource {
    fn mode(&self) -> WatchMode {
        WatchMode::Polling
    }

    fn wait(&mut self, timeout: Duration) -> Vec<PathBuf> {
        thread::sleep(timeout);
        Vec::new()
    }
}

/// OS notification source backed by `notify`.
pub struct EventSource {
    /// Watcher handle (must be kept alive)
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<notify::Event>>,
}

impl EventSource {
    pub fn new(dir: &Path, recursive: bool) -> notify::Result<Self> {
        let (tx, rx) = channel::unbounded();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(dir, mode)?;

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    fn collect(paths: &mut Vec<PathBuf>, res: notify::Result<notify::Event>) {
        match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);
                paths.extend(event.paths);
            }
            Err(e) => log!("watch"; "notify error: {}", e),
        }
    }
}

impl ChangeSource for EventSource {
    fn mode(&self) -> WatchMode {
        WatchMode::EventWait
    }

    fn wait(&mut self, timeout: Duration) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        match self.rx.recv_timeout(timeout) {
            Ok(res) => {
                Self::collect(&mut paths, res);
                for res in self.rx.try_iter() {
                    Self::collect(&mut paths, res);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => thread::sleep(timeout),
        }

        paths
    }
}

/// Pick the event source when available, polling otherwise.
pub fn select(dir: &Path, config: &WatchConfig) -> Box<dyn ChangeSource> {
    if config.force_polling {
        debug!("watch"; "polling forced by config");
        return Box::new(PollSource);
    }

    match EventSource::new(dir, config.recursive) {
        Ok(source) => Box::new(source),
        Err(e) => {
            log!("warning"; "file notifications unavailable ({}), falling back to polling", e);
            Box::new(PollSource)
        }
    }
}
