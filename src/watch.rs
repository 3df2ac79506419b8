//! Recursive filesystem watcher with a quiet-period debounce.
//!
//! `notify` watches are primitive (non-recursive), so one watch is
//! attached per directory and the whole set is re-attached whenever a
//! new directory appears. The change callback is not invoked per
//! event: every event re-arms a one-second timer and only the timer
//! whose stamp is still current fires, so an ever-changing tree never
//! triggers the callback and a burst collapses into one invocation.

use crate::{debug, log};
use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak, mpsc};
use std::thread;
use std::time::{Duration, Instant};

/// Events must stop for this long before the callback fires.
const QUIET_PERIOD: Duration = Duration::from_secs(1);

/// Watches a directory tree and reports settled change bursts.
pub struct FsWatcher {
    inner: Arc<Inner>,
}

struct Inner {
    root: PathBuf,
    watcher: Mutex<RecommendedWatcher>,
    watched_dirs: Mutex<Vec<PathBuf>>,
    /// Stamp of the most recent event, nanoseconds since `epoch`.
    last_change: AtomicU64,
    /// A directory appeared; watches must be re-attached before the
    /// next callback.
    rebuild_watch_pending: AtomicBool,
    epoch: Instant,
    on_change: Box<dyn Fn() + Send + Sync>,
}

impl FsWatcher {
    /// Attach watches below `root` and start the event worker.
    ///
    /// `on_change` runs on a timer thread once per one-second quiet
    /// period; it must do its own locking.
    pub fn new(root: PathBuf, on_change: Box<dyn Fn() + Send + Sync>) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let watcher = notify::recommended_watcher(move |result| {
            let _ = tx.send(result);
        })
        .context("no filesystem notification support")?;

        let inner = Arc::new(Inner {
            root,
            watcher: Mutex::new(watcher),
            watched_dirs: Mutex::new(Vec::new()),
            last_change: AtomicU64::new(0),
            rebuild_watch_pending: AtomicBool::new(false),
            epoch: Instant::now(),
            on_change,
        });

        inner.update_recursive_watch()?;

        let weak = Arc::downgrade(&inner);
        thread::spawn(move || worker(weak, rx));

        Ok(Self { inner })
    }

    /// Root directory being observed.
    pub fn root(&self) -> &Path {
        &self.inner.root
    }
}

/// Drains notify events until the watcher is dropped.
fn worker(
    weak: Weak<Inner>,
    rx: mpsc::Receiver<notify::Result<notify::Event>>,
) {
    while let Ok(result) = rx.recv() {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        match result {
            Ok(event) => inner.handle_event(&event),
            Err(e) => log!("watch"; "notify error: {e}"),
        }
    }
}

impl Inner {
    fn handle_event(self: &Arc<Self>, event: &notify::Event) {
        debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

        // a created directory needs a watch of its own
        let rebuild = matches!(event.kind, EventKind::Create(_))
            && event.paths.iter().any(|path| path.is_dir());

        self.notify_delayed_change(rebuild);
    }

    /// Record the event and arm a delayed check. Only the check whose
    /// stamp still matches `last_change` acts, so it is fine to lose
    /// events as long as the tree is still dirty.
    fn notify_delayed_change(self: &Arc<Self>, rebuild: bool) {
        let stamp = self.stamp();
        self.last_change.store(stamp, Ordering::SeqCst);
        if rebuild {
            self.rebuild_watch_pending.store(true, Ordering::SeqCst);
        }

        let weak = Arc::downgrade(self);
        thread::spawn(move || {
            thread::sleep(QUIET_PERIOD);
            let Some(inner) = weak.upgrade() else {
                return;
            };

            if inner.last_change.load(Ordering::SeqCst) != stamp {
                return; // superseded by a newer event
            }

            if inner.rebuild_watch_pending.swap(false, Ordering::SeqCst) {
                if let Err(e) = inner.update_recursive_watch() {
                    log!("watch"; "unable to update recursive watch: {e:#}");
                }
            }

            (inner.on_change)();
        });
    }

    fn stamp(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Detach every known watch and re-attach one per non-hidden
    /// directory below the root.
    fn update_recursive_watch(&self) -> Result<()> {
        let mut watched = self.watched_dirs.lock();
        let mut watcher = self.watcher.lock();

        for dir in watched.iter() {
            let _ = watcher.unwatch(dir);
        }
        watched.clear();

        let mut dirs = Vec::new();
        collect_dirs(&self.root, &mut dirs)
            .with_context(|| format!("unable to search {}", self.root.display()))?;

        for dir in &dirs {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .with_context(|| format!("unable to attach watch {}", dir.display()))?;
        }

        *watched = dirs;
        Ok(())
    }
}

/// Collect `dir` and all directories below it, skipping dot-prefixed
/// names (their whole subtrees stay unwatched).
fn collect_dirs(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let hidden = dir
        .file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false);
    if hidden {
        return Ok(());
    }

    out.push(dir.to_owned());

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            collect_dirs(&entry.path(), out)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    fn counted_watcher(root: &Path) -> (FsWatcher, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let cb_count = Arc::clone(&count);
        let watcher = FsWatcher::new(
            root.to_owned(),
            Box::new(move || {
                cb_count.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
        (watcher, count)
    }

    #[test]
    fn test_event_burst_collapses_into_one_callback() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let (_watcher, count) = counted_watcher(dir.path());

        for i in 0..5 {
            fs::write(dir.path().join(format!("file{i}.txt")), "x").unwrap();
            fs::write(dir.path().join("sub/inner.txt"), format!("{i}")).unwrap();
            thread::sleep(Duration::from_millis(50));
        }

        // burst still inside the quiet period: nothing fired yet
        assert_eq!(count.load(Ordering::SeqCst), 0);

        thread::sleep(Duration::from_millis(2500));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_new_directories_are_rewatched() {
        let dir = TempDir::new().unwrap();
        let (_watcher, count) = counted_watcher(dir.path());

        fs::create_dir(dir.path().join("fresh")).unwrap();
        thread::sleep(Duration::from_millis(2500));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // the new directory must be covered by a watch by now
        fs::write(dir.path().join("fresh/inside.txt"), "x").unwrap();
        thread::sleep(Duration::from_millis(2500));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_collect_dirs_skips_hidden() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::create_dir_all(dir.path().join(".git/objects")).unwrap();

        let mut dirs = Vec::new();
        collect_dirs(dir.path(), &mut dirs).unwrap();

        assert!(dirs.contains(&dir.path().to_owned()));
        assert!(dirs.contains(&dir.path().join("a/b")));
        assert!(!dirs.iter().any(|d| d.ends_with(".git")));
        assert!(!dirs.iter().any(|d| d.ends_with("objects")));
    }
}
