use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use jwalk::WalkDir;
use rustc_hash::FxHashSet;

use super::debounce::is_temp_file;

struct TrackedFile {
    path: PathBuf,
    /// `None` until the first successful stat.
    mtime: Option<SystemTime>,
}

/// Files being watched, in discovery order, without duplicates.
///
/// Entries are never removed; a deleted file simply stops reporting.
pub(super) struct TrackedFiles {
    entries: Vec<TrackedFile>,
    known: FxHashSet<PathBuf>,
}

impl TrackedFiles {
    pub(super) fn new() -> Self {
        Self {
            entries: Vec::new(),
            known: FxHashSet::default(),
        }
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(super) fn contains(&self, path: &Path) -> bool {
        self.known.contains(path)
    }

    /// Start tracking `path`. Returns `false` if already tracked.
    pub(super) fn track(&mut self, path: PathBuf) -> bool {
        if !self.known.insert(path.clone()) {
            return false;
        }
        self.entries.push(TrackedFile { path, mtime: None });
        true
    }

    /// Check every file's mtime and return the ones that moved forward.
    ///
    /// The first observation of a file only records its mtime.
    pub(super) fn poll(&mut self) -> Vec<PathBuf> {
        let mut changed = Vec::new();

        for entry in &mut self.entries {
            let Some(current) = mtime(&entry.path) else {
                continue;
            };

            match entry.mtime {
                None => entry.mtime = Some(current),
                Some(stored) if current > stored => {
                    entry.mtime = Some(current);
                    changed.push(entry.path.clone());
                }
                Some(_) => {}
            }
        }

        changed
    }
}

/// Get the modification time of a file
fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Whether `path` is a file the watcher cares about.
pub(super) fn matches_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        && !is_temp_file(path)
}

/// Collect matching files under `dir`, sorted.
pub(super) fn scan(dir: &Path, extension: &str, recursive: bool) -> Vec<PathBuf> {
    let depth = if recursive { usize::MAX } else { 1 };

    WalkDir::new(dir)
        .max_depth(depth)
        .sort(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|p| matches_extension(p, extension))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_scan_filters_and_recurses() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "").unwrap();
        fs::write(dir.path().join("style.css"), "").unwrap();
        fs::write(dir.path().join(".index.html.swp"), "").unwrap();
        fs::create_dir(dir.path().join("blog")).unwrap();
        fs::write(dir.path().join("blog/post.HTML"), "").unwrap();

        let all = scan(dir.path(), "html", true);
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|p| p.ends_with("blog/post.HTML")));

        let flat = scan(dir.path(), "html", false);
        assert_eq!(flat, [dir.path().join("index.html")]);
    }

    #[test]
    fn test_track_rejects_duplicates() {
        let mut files = TrackedFiles::new();
        assert!(files.track(PathBuf::from("a.html")));
        assert!(!files.track(PathBuf::from("a.html")));
        assert_eq!(files.len(), 1);
        assert!(files.contains(Path::new("a.html")));
    }

    #[test]
    fn test_first_poll_is_not_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("index.html");
        fs::write(&page, "<p>hi</p>").unwrap();

        let mut files = TrackedFiles::new();
        files.track(page.clone());
        assert!(files.poll().is_empty());
        assert!(files.poll().is_empty());

        set_mtime(&page, SystemTime::now() + Duration::from_secs(5));
        assert_eq!(files.poll(), [page.clone()]);
        assert!(files.poll().is_empty());
    }

    #[test]
    fn test_older_mtime_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("index.html");
        fs::write(&page, "").unwrap();

        let mut files = TrackedFiles::new();
        files.track(page.clone());
        files.poll();

        set_mtime(&page, SystemTime::UNIX_EPOCH + Duration::from_secs(1));
        assert!(files.poll().is_empty());
    }

    #[test]
    fn test_deleted_file_stops_reporting() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("gone.html");
        fs::write(&page, "").unwrap();

        let mut files = TrackedFiles::new();
        files.track(page.clone());
        files.poll();
        fs::remove_file(&page).unwrap();

        assert!(files.poll().is_empty());
        assert_eq!(files.len(), 1);
    }
}
