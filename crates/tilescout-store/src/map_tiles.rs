use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::persistence::{self, PersistenceError};

/// Tri-state walkability of a map coordinate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, derive_more::IsVariant,
)]
#[serde(rename_all = "snake_case")]
pub enum MapTileState {
    #[default]
    Unknown,
    Walkable,
    Blocked,
}

/// Persisted form of one known coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapTileEntry {
    pub map_id: String,
    pub x: i32,
    pub y: i32,
    pub state: MapTileState,
}

/// Walkability keyed by map id and integer coordinate.
///
/// Independent of [`crate::WalkabilityStore`]; only coordinates that are
/// walkable or blocked are stored.
#[derive(Debug, Clone, Default)]
pub struct MapTileStore {
    maps: HashMap<String, BTreeMap<(i32, i32), MapTileState>>,
}

impl MapTileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = MapTileEntry>,
    {
        let mut store = Self::new();
        for entry in entries {
            store.set(&entry.map_id, entry.x, entry.y, entry.state);
        }
        store
    }

    /// Loads the store from `path`; a missing or unreadable file yields an empty store.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        Self::from_entries(persistence::load_entries_or_empty(path, "map tile"))
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        persistence::save_entries(path, &self.entries())
    }

    #[must_use]
    pub fn get(&self, map_id: &str, x: i32, y: i32) -> MapTileState {
        self.maps
            .get(map_id)
            .and_then(|tiles| tiles.get(&(x, y)))
            .copied()
            .unwrap_or_default()
    }

    /// Sets a coordinate's state; setting [`MapTileState::Unknown`] forgets it.
    pub fn set(&mut self, map_id: &str, x: i32, y: i32, state: MapTileState) {
        if state.is_unknown() {
            if let Some(tiles) = self.maps.get_mut(map_id) {
                tiles.remove(&(x, y));
                if tiles.is_empty() {
                    self.maps.remove(map_id);
                }
            }
            return;
        }
        self.maps
            .entry(map_id.to_owned())
            .or_default()
            .insert((x, y), state);
    }

    pub fn mark_walkable(&mut self, map_id: &str, x: i32, y: i32) {
        self.set(map_id, x, y, MapTileState::Walkable);
    }

    pub fn mark_blocked(&mut self, map_id: &str, x: i32, y: i32) {
        self.set(map_id, x, y, MapTileState::Blocked);
    }

    /// Known coordinates of one map, ordered by `(x, y)`.
    pub fn tiles(&self, map_id: &str) -> impl Iterator<Item = ((i32, i32), MapTileState)> + '_ {
        self.maps
            .get(map_id)
            .into_iter()
            .flat_map(|tiles| tiles.iter().map(|(&pos, &state)| (pos, state)))
    }

    pub fn map_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.maps.keys().map(String::as_str)
    }

    /// All known coordinates, ordered by map id then coordinate.
    #[must_use]
    pub fn entries(&self) -> Vec<MapTileEntry> {
        let mut ids: Vec<_> = self.map_ids().collect();
        ids.sort_unstable();
        ids.into_iter()
            .flat_map(|map_id| {
                self.tiles(map_id).map(move |((x, y), state)| MapTileEntry {
                    map_id: map_id.to_owned(),
                    x,
                    y,
                    state,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_by_default() {
        let store = MapTileStore::new();
        assert_eq!(store.get("pallet_town", 3, 4), MapTileState::Unknown);
    }

    #[test]
    fn test_maps_are_independent() {
        let mut store = MapTileStore::new();
        store.mark_walkable("route_1", 0, 0);
        store.mark_blocked("route_2", 0, 0);
        assert_eq!(store.get("route_1", 0, 0), MapTileState::Walkable);
        assert_eq!(store.get("route_2", 0, 0), MapTileState::Blocked);
        assert_eq!(store.get("route_1", -1, 0), MapTileState::Unknown);
    }

    #[test]
    fn test_setting_unknown_forgets() {
        let mut store = MapTileStore::new();
        store.mark_blocked("house", 2, 2);
        store.set("house", 2, 2, MapTileState::Unknown);
        assert_eq!(store.get("house", 2, 2), MapTileState::Unknown);
        assert_eq!(store.map_ids().count(), 0);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maps.json");
        let mut store = MapTileStore::new();
        store.mark_walkable("b", 1, -2);
        store.mark_blocked("a", 5, 5);
        store.mark_walkable("a", 0, 9);
        store.save(&path).unwrap();

        let loaded = MapTileStore::load(&path);
        assert_eq!(loaded.entries(), store.entries());
        assert_eq!(loaded.entries()[0].map_id, "a");
        assert_eq!(loaded.get("b", 1, -2), MapTileState::Walkable);
    }
}
