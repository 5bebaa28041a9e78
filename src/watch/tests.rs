use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tempfile::TempDir;

use super::source::PollSource;
use super::*;

const DEBOUNCE: Duration = Duration::from_millis(1000);

fn make_site(pages: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for page in pages {
        let path = dir.path().join(page);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "<html><body></body></html>").unwrap();
    }
    dir
}

fn make_watcher(dir: &Path, config: WatchConfig) -> (FileWatcher, Arc<ChangeSignal>) {
    let signal = Arc::new(ChangeSignal::new());
    let watcher =
        FileWatcher::with_source(dir, &config, Arc::clone(&signal), Box::new(PollSource)).unwrap();
    (watcher, signal)
}

fn config() -> WatchConfig {
    WatchConfig {
        debounce_ms: DEBOUNCE.as_millis() as u64,
        force_polling: true,
        ..WatchConfig::default()
    }
}

/// Move `path`'s mtime `secs` seconds into the future.
fn touch(path: &Path, secs: u64) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(secs))
        .unwrap();
}

#[test]
fn test_rejects_non_directory() {
    let dir = make_site(&["index.html"]);
    let signal = Arc::new(ChangeSignal::new());

    let file = dir.path().join("index.html");
    assert!(matches!(
        FileWatcher::new(&file, &config(), Arc::clone(&signal)),
        Err(WatchError::NotADirectory(_))
    ));

    let missing = dir.path().join("missing");
    assert!(matches!(
        FileWatcher::new(&missing, &config(), signal),
        Err(WatchError::Io(..))
    ));
}

#[test]
fn test_initial_scan_is_not_a_change() {
    let dir = make_site(&["index.html", "about.html", "style.css"]);
    let (mut watcher, signal) = make_watcher(dir.path(), config());

    assert_eq!(watcher.tracked(), 2);
    assert_eq!(watcher.state(), WatcherState::Watching(WatchMode::Polling));
    assert!(watcher.poll_once(Instant::now()).is_empty());
    assert!(!signal.is_raised());
}

#[test]
fn test_modification_raises_signal() {
    let dir = make_site(&["index.html"]);
    let (mut watcher, signal) = make_watcher(dir.path(), config());
    let page = dir.path().join("index.html");

    touch(&page, 10);
    assert_eq!(watcher.poll_once(Instant::now()), [page]);
    assert!(signal.take());
}

#[test]
fn test_burst_debounced_to_one_signal() {
    let dir = make_site(&["index.html"]);
    let (mut watcher, signal) = make_watcher(dir.path(), config());
    let page = dir.path().join("index.html");
    let start = Instant::now();

    let mut signals = 0;
    for i in 0..10 {
        touch(&page, 10 + i);
        watcher.poll_once(start + Duration::from_millis(i * 50));
        if signal.take() {
            signals += 1;
        }
    }
    assert_eq!(signals, 1);

    touch(&page, 30);
    watcher.poll_once(start + DEBOUNCE + Duration::from_millis(1));
    assert!(signal.take());
}

#[test]
fn test_distinct_files_signal_within_window() {
    let dir = make_site(&["a.html", "b.html"]);
    let (mut watcher, _signal) = make_watcher(dir.path(), config());
    let now = Instant::now();

    touch(&dir.path().join("a.html"), 10);
    assert_eq!(watcher.poll_once(now).len(), 1);

    touch(&dir.path().join("b.html"), 10);
    assert_eq!(watcher.poll_once(now + Duration::from_millis(10)).len(), 1);
}

#[test]
fn test_rescan_discovers_new_files() {
    let dir = make_site(&["index.html"]);
    let (mut watcher, signal) = make_watcher(dir.path(), config());
    let start = Instant::now();

    fs::write(dir.path().join("new.html"), "").unwrap();
    watcher.poll_once(start);
    assert_eq!(watcher.tracked(), 1);

    let later = start + config().rescan_interval() + Duration::from_secs(1);
    assert!(watcher.poll_once(later).is_empty());
    assert_eq!(watcher.tracked(), 2);
    assert!(!signal.is_raised());

    touch(&dir.path().join("new.html"), 10);
    assert_eq!(watcher.poll_once(later).len(), 1);
}

#[test]
fn test_flat_watch_ignores_subdirectories() {
    let dir = make_site(&["index.html", "blog/post.html"]);
    let config = WatchConfig {
        recursive: false,
        ..config()
    };
    let (mut watcher, signal) = make_watcher(dir.path(), config);

    assert_eq!(watcher.tracked(), 1);
    touch(&dir.path().join("blog/post.html"), 10);
    assert!(watcher.poll_once(Instant::now()).is_empty());
    assert!(!signal.is_raised());
}

#[test]
fn test_run_stops_with_flag() {
    let dir = make_site(&["index.html"]);
    let config = WatchConfig {
        poll_interval_ms: 10,
        ..config()
    };
    let (mut watcher, _signal) = make_watcher(dir.path(), config);

    let running = Running::new();
    running.stop();
    watcher.run(&running);
    assert_eq!(watcher.state(), WatcherState::Stopped);
}
