use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

#[derive(Debug, Default)]
struct Flags {
    stop: bool,
    paused: bool,
}

/// Shared stop/pause flags of a run, checked at tick boundaries and inside waits.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    inner: Arc<(Mutex<Flags>, Condvar)>,
}

impl RunControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn flags(&self) -> MutexGuard<'_, Flags> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut Flags)) {
        f(&mut self.flags());
        self.inner.1.notify_all();
    }

    pub fn request_stop(&self) {
        self.update(|flags| flags.stop = true);
    }

    pub fn pause(&self) {
        self.update(|flags| flags.paused = true);
    }

    pub fn resume(&self) {
        self.update(|flags| flags.paused = false);
    }

    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.flags().stop
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.flags().paused
    }

    /// Sleeps for `timeout`, returning early with `true` if a stop is requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut flags = self.flags();
        while !flags.stop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            flags = self
                .inner
                .1
                .wait_timeout(flags, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        flags.stop
    }

    /// Blocks while paused; returns `true` if a stop is requested.
    pub fn wait_while_paused(&self) -> bool {
        let mut flags = self.flags();
        while flags.paused && !flags.stop {
            flags = self
                .inner
                .1
                .wait(flags)
                .unwrap_or_else(PoisonError::into_inner);
        }
        flags.stop
    }
}
