//! Learned walkability of screen tiles.
//!
//! - [`WalkabilityStore`] - signature-keyed walk statistics and semantic flags
//! - [`MapTileStore`] - coordinate-keyed tri-state walkability, scoped by map id
//! - [`StoreHandle`] - single-owner actor wrapping a [`WalkabilityStore`]
//! - [`Autosaver`] - periodic flush-if-dirty timer
//!
//! The two stores are independent and never reconciled: a tile learned
//! through one is unknown to the other.

pub use self::{actor::*, autosave::*, map_tiles::*, persistence::*, tile_record::*, walkability::*};

mod actor;
mod autosave;
mod map_tiles;
mod persistence;
mod tile_record;
mod walkability;
