use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

/// Per-file debouncer.
///
/// A change is admitted when its file has not been signaled within the
/// window. Distinct files are independent. Time is passed in, never read.
pub(super) struct Debouncer {
    window: Duration,
    last_signal: FxHashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub(super) fn new(window: Duration) -> Self {
        Self {
            window,
            last_signal: FxHashMap::default(),
        }
    }

    /// Record a change to `path` at `now`; `true` if it should be signaled.
    pub(super) fn admit(&mut self, path: &Path, now: Instant) -> bool {
        if let Some(&last) = self.last_signal.get(path)
            && now.saturating_duration_since(last) < self.window
        {
            crate::debug!("watch"; "debounced: {}", path.display());
            return false;
        }

        self.last_signal.insert(path.to_path_buf(), now);
        true
    }
}

/// Check if path is a temp/backup file (editor artifacts).
pub(super) fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}
