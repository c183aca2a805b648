use std::{collections::HashMap, path::Path};

use chrono::Utc;
use serde::Serialize;
use tilescout_vision::TileSignature;

use crate::{
    persistence::{self, PersistenceError},
    tile_record::{TileFlag, TileRecord, Walkability},
};

/// Read access to learned walkability.
pub trait WalkabilityView {
    fn walkability(&self, signature: TileSignature) -> Walkability;
}

/// Aggregate counts over all records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StoreStats {
    pub total_tiles: usize,
    pub walkable: usize,
    pub blocking: usize,
    /// Tiles with at least [`crate::HIGH_CONFIDENCE_ATTEMPTS`] attempts.
    pub high_confidence: usize,
}

/// Map from tile signature to learned walk statistics.
///
/// Records are created on first sight and never removed. The store itself
/// does no locking; concurrent callers go through [`crate::StoreHandle`].
#[derive(Debug, Clone, Default)]
pub struct WalkabilityStore {
    records: HashMap<TileSignature, TileRecord>,
    dirty: bool,
}

impl WalkabilityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a clean store from persisted records.
    ///
    /// A later duplicate of the same signature replaces an earlier one.
    #[must_use]
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = TileRecord>,
    {
        let records = records
            .into_iter()
            .map(|record| (record.signature(), record))
            .collect();
        Self {
            records,
            dirty: false,
        }
    }

    /// Loads the store from `path`.
    ///
    /// A missing or unreadable file yields an empty store.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let store = Self::from_records(persistence::load_entries_or_empty(path, "walkability"));
        tracing::info!(path = %path.display(), tiles = store.len(), "walkability store loaded");
        store
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        persistence::save_entries(path, &self.snapshot())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[must_use]
    pub fn get(&self, signature: TileSignature) -> Option<&TileRecord> {
        self.records.get(&signature)
    }

    pub fn get_or_create(&mut self, signature: TileSignature) -> &mut TileRecord {
        self.records.entry(signature).or_insert_with(|| {
            self.dirty = true;
            TileRecord::new(signature, Utc::now())
        })
    }

    /// Counts one sighting of each signature.
    pub fn observe<I>(&mut self, signatures: I)
    where
        I: IntoIterator<Item = TileSignature>,
    {
        let now = Utc::now();
        for signature in signatures {
            self.get_or_create(signature).observe(now);
        }
        self.dirty = true;
    }

    /// Records one walk attempt and returns the tile's resulting walkability.
    pub fn record_walk_attempt(&mut self, signature: TileSignature, success: bool) -> Walkability {
        let record = self.get_or_create(signature);
        record.record_attempt(success, Utc::now());
        let walkability = record.walkability();
        self.dirty = true;
        walkability
    }

    /// Records `count` failed attempts, overriding earlier positive evidence.
    pub fn force_failures(&mut self, signature: TileSignature, count: u32) -> Walkability {
        let mut walkability = self.query(signature);
        for _ in 0..count {
            walkability = self.record_walk_attempt(signature, false);
        }
        walkability
    }

    #[must_use]
    pub fn query(&self, signature: TileSignature) -> Walkability {
        self.records
            .get(&signature)
            .map_or(Walkability::Unknown, TileRecord::walkability)
    }

    /// Sets or clears a semantic flag, creating the record if needed.
    pub fn set_flag(&mut self, signature: TileSignature, flag: TileFlag, value: bool) {
        self.get_or_create(signature).set_flag(flag, value);
        self.dirty = true;
    }

    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.records
            .values()
            .fold(StoreStats::default(), |mut stats, record| {
                stats.total_tiles += 1;
                match record.walkability() {
                    Walkability::Walkable => stats.walkable += 1,
                    Walkability::Blocking => stats.blocking += 1,
                    Walkability::Unknown => {}
                }
                if record.is_high_confidence() {
                    stats.high_confidence += 1;
                }
                stats
            })
    }

    /// All records, ordered by signature.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TileRecord> {
        let mut records: Vec<_> = self.records.values().cloned().collect();
        records.sort_by_key(TileRecord::signature);
        records
    }

    /// Returns a snapshot and clears the dirty flag, or `None` if nothing changed.
    pub fn take_snapshot_if_dirty(&mut self) -> Option<Vec<TileRecord>> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(self.snapshot())
    }
}

impl WalkabilityView for WalkabilityStore {
    fn walkability(&self, signature: TileSignature) -> Walkability {
        self.query(signature)
    }
}

/// Walkability of a fixed set of signatures, captured at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkabilitySnapshot {
    entries: HashMap<TileSignature, Walkability>,
}

impl WalkabilitySnapshot {
    #[must_use]
    pub fn new(entries: HashMap<TileSignature, Walkability>) -> Self {
        Self { entries }
    }

    pub fn insert(&mut self, signature: TileSignature, walkability: Walkability) {
        self.entries.insert(signature, walkability);
    }
}

impl FromIterator<(TileSignature, Walkability)> for WalkabilitySnapshot {
    fn from_iter<T: IntoIterator<Item = (TileSignature, Walkability)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl WalkabilityView for WalkabilitySnapshot {
    fn walkability(&self, signature: TileSignature) -> Walkability {
        self.entries
            .get(&signature)
            .copied()
            .unwrap_or(Walkability::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIG: TileSignature = TileSignature(7);

    #[test]
    fn test_get_or_create_starts_empty() {
        let mut store = WalkabilityStore::new();
        let record = store.get_or_create(SIG);
        assert_eq!(record.total_attempts(), 0);
        assert!((record.confidence() - 0.5).abs() < f64::EPSILON);
        assert_eq!(store.len(), 1);
        assert!(store.is_dirty());
    }

    #[test]
    fn test_query_resolves_after_three_attempts() {
        let mut store = WalkabilityStore::new();
        assert_eq!(store.record_walk_attempt(SIG, true), Walkability::Unknown);
        assert_eq!(store.record_walk_attempt(SIG, false), Walkability::Unknown);
        assert_eq!(store.query(SIG), Walkability::Unknown);
        assert_eq!(store.record_walk_attempt(SIG, true), Walkability::Walkable);
        assert_eq!(store.query(SIG), Walkability::Walkable);
        assert_eq!(store.query(TileSignature(8)), Walkability::Unknown);
    }

    #[test]
    fn test_forced_failures_override_positive_history() {
        let mut store = WalkabilityStore::new();
        for _ in 0..4 {
            store.record_walk_attempt(SIG, true);
        }
        assert_eq!(store.query(SIG), Walkability::Walkable);
        assert_eq!(store.force_failures(SIG, 5), Walkability::Blocking);
        assert_eq!(store.get(SIG).unwrap().failure_count(), 5);
    }

    #[test]
    fn test_counts_never_decrease() {
        let mut store = WalkabilityStore::new();
        let mut last = (0, 0);
        for i in 0..20 {
            store.record_walk_attempt(SIG, i % 3 == 0);
            let record = store.get(SIG).unwrap();
            let now = (record.success_count(), record.failure_count());
            assert!(now.0 >= last.0 && now.1 >= last.1);
            last = now;
        }
    }

    #[test]
    fn test_stats() {
        let mut store = WalkabilityStore::new();
        for _ in 0..5 {
            store.record_walk_attempt(TileSignature(1), true);
        }
        for _ in 0..3 {
            store.record_walk_attempt(TileSignature(2), false);
        }
        store.observe([TileSignature(3)]);
        assert_eq!(
            store.stats(),
            StoreStats {
                total_tiles: 3,
                walkable: 1,
                blocking: 1,
                high_confidence: 1,
            }
        );
    }

    #[test]
    fn test_observe_counts_each_sighting() {
        let mut store = WalkabilityStore::new();
        store.observe([SIG, SIG, TileSignature(9)]);
        assert_eq!(store.get(SIG).unwrap().observation_count(), 2);
        assert_eq!(store.get(TileSignature(9)).unwrap().observation_count(), 1);
    }

    #[test]
    fn test_set_flag_does_not_change_query() {
        let mut store = WalkabilityStore::new();
        store.set_flag(SIG, TileFlag::Blocking, true);
        store.set_flag(SIG, TileFlag::Door, true);
        let record = store.get(SIG).unwrap();
        assert!(record.flags().blocking && record.flags().door);
        assert_eq!(store.query(SIG), Walkability::Unknown);
    }

    #[test]
    fn test_snapshot_if_dirty_clears_flag() {
        let mut store = WalkabilityStore::new();
        assert!(store.take_snapshot_if_dirty().is_none());
        store.record_walk_attempt(SIG, true);
        assert_eq!(store.take_snapshot_if_dirty().unwrap().len(), 1);
        assert!(!store.is_dirty());
        assert!(store.take_snapshot_if_dirty().is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiles.json");

        let empty = WalkabilityStore::new();
        empty.save(&path).unwrap();
        assert!(WalkabilityStore::load(&path).is_empty());

        let mut store = WalkabilityStore::new();
        for (i, sig) in [-5_i64, 0, 1 << 40].into_iter().enumerate() {
            for n in 0..=i {
                store.record_walk_attempt(TileSignature(sig), n % 2 == 0);
            }
        }
        store.set_flag(TileSignature(0), TileFlag::Grass, true);
        store.save(&path).unwrap();

        let loaded = WalkabilityStore::load(&path);
        assert!(!loaded.is_dirty());
        assert_eq!(loaded.snapshot(), store.snapshot());
    }

    #[test]
    fn test_missing_or_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(WalkabilityStore::load(&dir.path().join("absent.json")).is_empty());

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{ not json").unwrap();
        assert!(WalkabilityStore::load(&corrupt).is_empty());
    }

    #[test]
    fn test_snapshot_view_defaults_unknown() {
        let snapshot: WalkabilitySnapshot = [(SIG, Walkability::Walkable)].into_iter().collect();
        assert_eq!(snapshot.walkability(SIG), Walkability::Walkable);
        assert_eq!(snapshot.walkability(TileSignature(1)), Walkability::Unknown);
    }
}
