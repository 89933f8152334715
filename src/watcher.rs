//! Folder watcher - announces photos that appear in the import directory
//!
//! A session is either Stopped or Running. Stopping closes the delivery
//! gate under its lock, so once `stop()` returns nothing more is delivered.

use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use thiserror::Error;

use crate::library::is_image_file;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Cannot watch {}: {source}", .dir.display())]
    Notify {
        dir: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Cannot start watcher thread: {0}")]
    Thread(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchState {
    Stopped,
    Running,
}

/// A newly created image file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewImage {
    pub path: PathBuf,
}

impl NewImage {
    pub fn name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

type Gate = Arc<Mutex<Option<Sender<NewImage>>>>;

struct Running {
    // dropping the watcher closes its event channel and ends the thread
    _watcher: RecommendedWatcher,
    gate: Gate,
    alive: Arc<AtomicBool>,
}

pub struct FolderWatcher {
    dir: PathBuf,
    sink: Sender<NewImage>,
    running: Option<Running>,
}

impl FolderWatcher {
    pub fn new(dir: impl Into<PathBuf>, sink: Sender<NewImage>) -> Self {
        Self {
            dir: dir.into(),
            sink,
            running: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state(&self) -> WatchState {
        match &self.running {
            Some(r) if r.alive.load(Ordering::SeqCst) => WatchState::Running,
            _ => WatchState::Stopped,
        }
    }

    /// No-op while running; restarts a session that degraded on its own.
    pub fn start(&mut self) -> Result<(), WatchError> {
        if self.state() == WatchState::Running {
            return Ok(());
        }
        self.stop();

        if !self.dir.is_dir() {
            return Err(WatchError::NotADirectory(self.dir.clone()));
        }

        let (tx, rx) = mpsc::channel::<notify::Result<notify::Event>>();
        let mut watcher = notify::recommended_watcher(tx).map_err(|source| WatchError::Notify {
            dir: self.dir.clone(),
            source,
        })?;
        watcher
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Notify {
                dir: self.dir.clone(),
                source,
            })?;

        let gate: Gate = Arc::new(Mutex::new(Some(self.sink.clone())));
        let alive = Arc::new(AtomicBool::new(true));

        let dir = self.dir.clone();
        let thread_gate = Arc::clone(&gate);
        let thread_alive = Arc::clone(&alive);
        thread::Builder::new()
            .name("photobooth-watch".into())
            .spawn(move || {
                for received in rx {
                    let event = match received {
                        Ok(event) => event,
                        Err(e) => {
                            log::debug!("watch on {} ended: {e}", dir.display());
                            break;
                        }
                    };
                    if is_arrival(&event.kind) {
                        let guard = thread_gate.lock().unwrap_or_else(PoisonError::into_inner);
                        let Some(sink) = guard.as_ref() else { break };
                        for path in event.paths.into_iter().filter(|p| is_image_file(p)) {
                            log::debug!("new image {}", path.display());
                            let _ = sink.send(NewImage { path });
                        }
                    }
                    if !dir.is_dir() {
                        log::debug!("watched directory {} is gone", dir.display());
                        break;
                    }
                }
                thread_alive.store(false, Ordering::SeqCst);
            })?;

        log::info!("Watching {}", self.dir.display());
        self.running = Some(Running {
            _watcher: watcher,
            gate,
            alive,
        });
        Ok(())
    }

    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        running.alive.store(false, Ordering::SeqCst);
        log::info!("Stopped watching {}", self.dir.display());
    }
}

impl Drop for FolderWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn is_arrival(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To))
    )
}

/// At most one watch session per directory.
#[derive(Default)]
pub struct WatchRegistry {
    sessions: HashMap<PathBuf, FolderWatcher>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(dir: &Path) -> PathBuf {
        dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf())
    }

    /// Replaces any session already watching `dir`.
    pub fn start(&mut self, dir: &Path, sink: Sender<NewImage>) -> Result<(), WatchError> {
        let key = Self::key(dir);
        if let Some(mut previous) = self.sessions.remove(&key) {
            previous.stop();
        }
        let mut watcher = FolderWatcher::new(key.clone(), sink);
        watcher.start()?;
        self.sessions.insert(key, watcher);
        Ok(())
    }

    pub fn stop(&mut self, dir: &Path) -> bool {
        match self.sessions.remove(&Self::key(dir)) {
            Some(mut watcher) => {
                watcher.stop();
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&mut self) {
        for (_, mut watcher) in self.sessions.drain() {
            watcher.stop();
        }
    }

    pub fn state(&self, dir: &Path) -> WatchState {
        self.sessions
            .get(&Self::key(dir))
            .map_or(WatchState::Stopped, FolderWatcher::state)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::mpsc::Receiver;
    use std::time::{Duration, Instant};

    fn next_named(rx: &Receiver<NewImage>, name: &str) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            match rx.recv_timeout(left) {
                Ok(img) if img.name() == Some(name) => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
        false
    }

    #[test]
    fn test_missing_dir_fails_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel();
        let mut w = FolderWatcher::new(dir.path().join("absent"), tx);
        assert!(matches!(w.start(), Err(WatchError::NotADirectory(_))));
        assert_eq!(w.state(), WatchState::Stopped);
    }

    #[test]
    fn test_delivers_images_only_until_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        let mut w = FolderWatcher::new(dir.path(), tx);
        w.start().unwrap();
        w.start().unwrap();
        assert_eq!(w.state(), WatchState::Running);

        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::write(dir.path().join("shot.JPG"), b"x").unwrap();
        assert!(next_named(&rx, "shot.JPG"));

        w.stop();
        w.stop();
        assert_eq!(w.state(), WatchState::Stopped);
        while rx.try_recv().is_ok() {}

        fs::write(dir.path().join("late.png"), b"x").unwrap();
        thread::sleep(Duration::from_millis(300));
        assert!(rx.try_iter().all(|img| img.name() != Some("late.png")));
    }

    #[test]
    fn test_registry_keeps_one_session_per_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = WatchRegistry::new();
        let (tx1, _rx1) = mpsc::channel();
        let (tx2, rx2) = mpsc::channel();
        registry.start(dir.path(), tx1).unwrap();
        registry.start(dir.path(), tx2).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.state(dir.path()), WatchState::Running);

        fs::write(dir.path().join("a.png"), b"x").unwrap();
        assert!(next_named(&rx2, "a.png"));

        assert!(registry.stop(dir.path()));
        assert!(!registry.stop(dir.path()));
        assert!(registry.is_empty());
    }
}
