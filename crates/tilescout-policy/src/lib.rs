//! Exploration decision policy.
//!
//! [`ExplorationPolicy`] turns a classification, the current tile grid, the
//! frame signature and a read view of learned walkability into one
//! [`Action`] per cycle. Two modes are available:
//!
//! - [`PolicyMode::Explore`] - per-location memory with stuck, loop, backtrack and exit heuristics
//! - [`PolicyMode::Discovery`] - probes tiles whose walkability is still unknown
//!
//! All randomness comes from one seeded generator, so a [`PolicySeed`] makes
//! a run reproducible.

pub use self::{action::*, config::*, exits::*, memory::*, policy::*, seed::*};

mod action;
mod config;
mod exits;
mod memory;
mod policy;
mod seed;
