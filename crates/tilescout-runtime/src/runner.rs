use std::{
    sync::mpsc,
    thread::{self, JoinHandle},
    time::Duration,
};

use tilescout_store::{Autosaver, StoreError, StoreHandle};
use tilescout_vision::StateClassifier;

use crate::{
    control::RunControl,
    controller::Controller,
    io::{FrameSource, InputSink},
};

/// Handle to a controller running on its own worker thread.
///
/// The store is autosaved while the run lasts and flushed once more when it
/// ends through [`Self::stop`] or [`Self::wait`].
#[derive(Debug)]
pub struct RunHandle {
    control: RunControl,
    store: StoreHandle,
    autosaver: Autosaver,
    worker: JoinHandle<u64>,
    done_rx: mpsc::Receiver<()>,
}

/// Starts `controller` on a worker thread, with autosave every `autosave_interval`.
pub fn spawn<S, I, C>(controller: Controller<S, I, C>, autosave_interval: Duration) -> RunHandle
where
    S: FrameSource + 'static,
    I: InputSink + 'static,
    C: StateClassifier + 'static,
{
    let control = RunControl::new();
    let store = controller.store().clone();
    let autosaver = Autosaver::start(store.clone(), autosave_interval);
    let (done_tx, done_rx) = mpsc::channel();
    let worker = thread::spawn({
        let control = control.clone();
        let mut controller = controller;
        move || {
            controller.run(&control);
            let _ = done_tx.send(());
            controller.ticks()
        }
    });
    RunHandle {
        control,
        store,
        autosaver,
        worker,
        done_rx,
    }
}

impl RunHandle {
    #[must_use]
    pub fn control(&self) -> &RunControl {
        &self.control
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Requests a stop, waits up to `timeout` for the loop, then flushes the store.
    ///
    /// If the loop does not finish in time its thread is left detached; the
    /// flush still runs. Returns the number of ticks run, if known.
    pub fn stop(self, timeout: Duration) -> Result<Option<u64>, StoreError> {
        self.control.request_stop();
        let finished = match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => true,
            Err(mpsc::RecvTimeoutError::Timeout) => false,
        };
        let ticks = if finished {
            join_worker(self.worker)
        } else {
            tracing::warn!(?timeout, "run loop did not stop in time, flushing anyway");
            None
        };
        shutdown_store(self.autosaver, &self.store)?;
        Ok(ticks)
    }

    /// Waits for the loop to end on its own, then flushes the store.
    pub fn wait(self) -> Result<Option<u64>, StoreError> {
        let ticks = join_worker(self.worker);
        shutdown_store(self.autosaver, &self.store)?;
        Ok(ticks)
    }
}

fn join_worker(worker: JoinHandle<u64>) -> Option<u64> {
    if let Ok(ticks) = worker.join() {
        Some(ticks)
    } else {
        tracing::error!("run loop panicked");
        None
    }
}

fn shutdown_store(autosaver: Autosaver, store: &StoreHandle) -> Result<(), StoreError> {
    autosaver.stop();
    if store.flush()? {
        tracing::info!("walkability store flushed on shutdown");
    }
    Ok(())
}
