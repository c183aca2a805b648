use std::{
    path::{Path, PathBuf},
    sync::{Arc, mpsc},
    thread::{self, JoinHandle},
};

use tilescout_vision::TileSignature;

use crate::{
    persistence::{self, PersistenceError},
    tile_record::{TileFlag, TileRecord, Walkability},
    walkability::{StoreStats, WalkabilitySnapshot, WalkabilityStore},
};

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum StoreError {
    #[display("walkability store has shut down")]
    #[from(ignore)]
    Disconnected,
    #[display("{_0}")]
    Persistence(PersistenceError),
}

type Reply<T> = mpsc::Sender<T>;

#[derive(Debug)]
enum StoreRequest {
    Observe(Vec<TileSignature>),
    RecordWalkAttempt {
        signature: TileSignature,
        success: bool,
        reply: Reply<Walkability>,
    },
    ForceFailures {
        signature: TileSignature,
        count: u32,
        reply: Reply<Walkability>,
    },
    GetOrCreate(TileSignature, Reply<TileRecord>),
    Get(TileSignature, Reply<Option<TileRecord>>),
    Query(Vec<TileSignature>, Reply<WalkabilitySnapshot>),
    SetFlag {
        signature: TileSignature,
        flag: TileFlag,
        value: bool,
    },
    Stats(Reply<StoreStats>),
    TakeSnapshotIfDirty(Reply<Option<Vec<TileRecord>>>),
    MarkDirty,
}

/// Cloneable handle to a [`WalkabilityStore`] owned by a dedicated thread.
///
/// Every operation is a message to the owner thread, so callers never hold a
/// lock. Persistence happens on the calling thread from a snapshot.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreRequest>,
    path: Option<Arc<PathBuf>>,
}

impl StoreHandle {
    /// Moves `store` onto an owner thread.
    ///
    /// `path` is where [`Self::flush`] saves; `None` disables saving.
    ///
    /// The owner thread exits once every handle is dropped and returns the
    /// store through the join handle.
    pub fn spawn(
        store: WalkabilityStore,
        path: Option<PathBuf>,
    ) -> (Self, JoinHandle<WalkabilityStore>) {
        let (tx, rx) = mpsc::channel();
        let join = thread::spawn(move || store_thread(store, &rx));
        let handle = Self {
            tx,
            path: path.map(Arc::new),
        };
        (handle, join)
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref().map(PathBuf::as_path)
    }

    fn send(&self, request: StoreRequest) -> Result<(), StoreError> {
        self.tx.send(request).map_err(|_| StoreError::Disconnected)
    }

    fn call<T>(&self, make: impl FnOnce(Reply<T>) -> StoreRequest) -> Result<T, StoreError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send(make(reply_tx))?;
        reply_rx.recv().map_err(|_| StoreError::Disconnected)
    }

    pub fn observe(&self, signatures: Vec<TileSignature>) -> Result<(), StoreError> {
        self.send(StoreRequest::Observe(signatures))
    }

    pub fn record_walk_attempt(
        &self,
        signature: TileSignature,
        success: bool,
    ) -> Result<Walkability, StoreError> {
        self.call(|reply| StoreRequest::RecordWalkAttempt {
            signature,
            success,
            reply,
        })
    }

    pub fn force_failures(
        &self,
        signature: TileSignature,
        count: u32,
    ) -> Result<Walkability, StoreError> {
        self.call(|reply| StoreRequest::ForceFailures {
            signature,
            count,
            reply,
        })
    }

    pub fn get_or_create(&self, signature: TileSignature) -> Result<TileRecord, StoreError> {
        self.call(|reply| StoreRequest::GetOrCreate(signature, reply))
    }

    pub fn get(&self, signature: TileSignature) -> Result<Option<TileRecord>, StoreError> {
        self.call(|reply| StoreRequest::Get(signature, reply))
    }

    /// Walkability of every signature in `signatures`, read atomically.
    pub fn query(&self, signatures: Vec<TileSignature>) -> Result<WalkabilitySnapshot, StoreError> {
        self.call(|reply| StoreRequest::Query(signatures, reply))
    }

    pub fn set_flag(
        &self,
        signature: TileSignature,
        flag: TileFlag,
        value: bool,
    ) -> Result<(), StoreError> {
        self.send(StoreRequest::SetFlag {
            signature,
            flag,
            value,
        })
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        self.call(StoreRequest::Stats)
    }

    /// Saves the store if it changed since the last save.
    ///
    /// Returns whether anything was written. A failed write re-marks the
    /// store dirty so the next flush retries.
    pub fn flush(&self) -> Result<bool, StoreError> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };
        let Some(records) = self.call(StoreRequest::TakeSnapshotIfDirty)? else {
            return Ok(false);
        };
        if let Err(e) = persistence::save_entries(&path, &records) {
            self.send(StoreRequest::MarkDirty)?;
            return Err(e.into());
        }
        tracing::debug!(path = %path.display(), tiles = records.len(), "walkability store saved");
        Ok(true)
    }
}

fn store_thread(mut store: WalkabilityStore, rx: &mpsc::Receiver<StoreRequest>) -> WalkabilityStore {
    // A dropped reply receiver only means the caller gave up waiting.
    for request in rx {
        match request {
            StoreRequest::Observe(signatures) => store.observe(signatures),
            StoreRequest::RecordWalkAttempt {
                signature,
                success,
                reply,
            } => {
                let _ = reply.send(store.record_walk_attempt(signature, success));
            }
            StoreRequest::ForceFailures {
                signature,
                count,
                reply,
            } => {
                let _ = reply.send(store.force_failures(signature, count));
            }
            StoreRequest::GetOrCreate(signature, reply) => {
                let _ = reply.send(store.get_or_create(signature).clone());
            }
            StoreRequest::Get(signature, reply) => {
                let _ = reply.send(store.get(signature).cloned());
            }
            StoreRequest::Query(signatures, reply) => {
                let snapshot = signatures
                    .into_iter()
                    .map(|signature| (signature, store.query(signature)))
                    .collect();
                let _ = reply.send(snapshot);
            }
            StoreRequest::SetFlag {
                signature,
                flag,
                value,
            } => store.set_flag(signature, flag, value),
            StoreRequest::Stats(reply) => {
                let _ = reply.send(store.stats());
            }
            StoreRequest::TakeSnapshotIfDirty(reply) => {
                let _ = reply.send(store.take_snapshot_if_dirty());
            }
            StoreRequest::MarkDirty => store.mark_dirty(),
        }
    }
    tracing::debug!(tiles = store.len(), "walkability store thread finished");
    store
}
