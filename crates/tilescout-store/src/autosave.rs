use std::{
    sync::mpsc::{self, RecvTimeoutError},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::actor::StoreHandle;

/// Default autosave period.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

/// Background thread that periodically flushes a dirty store.
#[derive(Debug)]
pub struct Autosaver {
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

impl Autosaver {
    #[must_use]
    pub fn start(handle: StoreHandle, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel();
        let thread = thread::spawn(move || autosave_thread(&handle, interval, &stop_rx));
        Self { stop_tx, thread }
    }

    /// Stops the thread and waits for it; an in-progress save completes first.
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
        if self.thread.join().is_err() {
            tracing::warn!("autosave thread panicked");
        }
    }
}

fn autosave_thread(handle: &StoreHandle, interval: Duration, stop_rx: &mpsc::Receiver<()>) {
    loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => match handle.flush() {
                Ok(_) => {}
                Err(e) => tracing::warn!("autosave failed, will retry: {e}"),
            },
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WalkabilityStore;
    use tilescout_vision::TileSignature;

    #[test]
    fn test_autosave_writes_dirty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiles.json");
        let (handle, _join) = StoreHandle::spawn(WalkabilityStore::new(), Some(path.clone()));
        handle.record_walk_attempt(TileSignature(3), true).unwrap();

        let autosaver = Autosaver::start(handle.clone(), Duration::from_millis(10));
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !path.exists() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        autosaver.stop();

        assert!(path.exists());
        assert_eq!(WalkabilityStore::load(&path).len(), 1);
    }

    #[test]
    fn test_stop_is_prompt() {
        let (handle, _join) = StoreHandle::spawn(WalkabilityStore::new(), None);
        let autosaver = Autosaver::start(handle, Duration::from_secs(3600));
        let start = std::time::Instant::now();
        autosaver.stop();
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
