use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tilescout_vision::TileSignature;

/// Attempts needed before a tile is classified walkable or blocking.
pub const MIN_CLASSIFY_ATTEMPTS: u32 = 3;
/// Attempts at which a tile counts as high-confidence in [`crate::StoreStats`].
pub const HIGH_CONFIDENCE_ATTEMPTS: u32 = 5;

/// Learned walkability of a tile.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, derive_more::IsVariant,
)]
#[serde(rename_all = "snake_case")]
pub enum Walkability {
    #[default]
    Unknown,
    Walkable,
    Blocking,
}

/// Semantic flags of a tile.
///
/// `walkable` and `blocking` are inferred from walk attempts; the others are
/// only ever set out-of-band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TileFlags {
    pub walkable: bool,
    pub blocking: bool,
    pub interactable: bool,
    pub door: bool,
    pub warp: bool,
    pub water: bool,
    pub ledge: bool,
    pub grass: bool,
}

/// Flags that may be set out-of-band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum TileFlag {
    #[display("blocking")]
    Blocking,
    #[display("interactable")]
    Interactable,
    #[display("door")]
    Door,
    #[display("warp")]
    Warp,
    #[display("water")]
    Water,
    #[display("ledge")]
    Ledge,
    #[display("grass")]
    Grass,
}

impl TileFlag {
    pub const ALL: [Self; 7] = [
        Self::Blocking,
        Self::Interactable,
        Self::Door,
        Self::Warp,
        Self::Water,
        Self::Ledge,
        Self::Grass,
    ];
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("unknown tile flag: {_0}")]
pub struct ParseTileFlagError(#[error(not(source))] pub String);

impl FromStr for TileFlag {
    type Err = ParseTileFlagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|flag| flag.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseTileFlagError(s.to_owned()))
    }
}

impl TileFlags {
    #[must_use]
    pub const fn get(&self, flag: TileFlag) -> bool {
        match flag {
            TileFlag::Blocking => self.blocking,
            TileFlag::Interactable => self.interactable,
            TileFlag::Door => self.door,
            TileFlag::Warp => self.warp,
            TileFlag::Water => self.water,
            TileFlag::Ledge => self.ledge,
            TileFlag::Grass => self.grass,
        }
    }

    pub const fn set(&mut self, flag: TileFlag, value: bool) {
        let slot = match flag {
            TileFlag::Blocking => &mut self.blocking,
            TileFlag::Interactable => &mut self.interactable,
            TileFlag::Door => &mut self.door,
            TileFlag::Warp => &mut self.warp,
            TileFlag::Water => &mut self.water,
            TileFlag::Ledge => &mut self.ledge,
            TileFlag::Grass => &mut self.grass,
        };
        *slot = value;
    }
}

/// Walk statistics of one tile signature.
///
/// Confidence is derived from the counts on every read and is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRecord {
    signature: TileSignature,
    success_count: u32,
    failure_count: u32,
    #[serde(default)]
    flags: TileFlags,
    #[serde(default)]
    observation_count: u32,
    last_seen: DateTime<Utc>,
}

impl TileRecord {
    #[must_use]
    pub fn new(signature: TileSignature, now: DateTime<Utc>) -> Self {
        Self {
            signature,
            success_count: 0,
            failure_count: 0,
            flags: TileFlags::default(),
            observation_count: 0,
            last_seen: now,
        }
    }

    #[must_use]
    pub const fn signature(&self) -> TileSignature {
        self.signature
    }

    #[must_use]
    pub const fn success_count(&self) -> u32 {
        self.success_count
    }

    #[must_use]
    pub const fn failure_count(&self) -> u32 {
        self.failure_count
    }

    #[must_use]
    pub const fn total_attempts(&self) -> u32 {
        self.success_count + self.failure_count
    }

    #[must_use]
    pub const fn observation_count(&self) -> u32 {
        self.observation_count
    }

    #[must_use]
    pub const fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    #[must_use]
    pub const fn flags(&self) -> &TileFlags {
        &self.flags
    }

    /// `successes / attempts`, or exactly `0.5` before the first attempt.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        let attempts = self.total_attempts();
        if attempts == 0 {
            return 0.5;
        }
        f64::from(self.success_count) / f64::from(attempts)
    }

    #[must_use]
    pub fn walkability(&self) -> Walkability {
        if self.total_attempts() < MIN_CLASSIFY_ATTEMPTS {
            Walkability::Unknown
        } else if self.confidence() > 0.5 {
            Walkability::Walkable
        } else {
            Walkability::Blocking
        }
    }

    #[must_use]
    pub const fn is_high_confidence(&self) -> bool {
        self.total_attempts() >= HIGH_CONFIDENCE_ATTEMPTS
    }

    pub fn observe(&mut self, now: DateTime<Utc>) {
        self.observation_count = self.observation_count.saturating_add(1);
        self.last_seen = now;
    }

    pub fn record_attempt(&mut self, success: bool, now: DateTime<Utc>) {
        if success {
            self.success_count = self.success_count.saturating_add(1);
        } else {
            self.failure_count = self.failure_count.saturating_add(1);
        }
        self.last_seen = now;
        match self.walkability() {
            Walkability::Unknown => {}
            Walkability::Walkable => {
                self.flags.walkable = true;
                self.flags.blocking = false;
            }
            Walkability::Blocking => {
                self.flags.walkable = false;
                self.flags.blocking = true;
            }
        }
    }

    pub const fn set_flag(&mut self, flag: TileFlag, value: bool) {
        self.flags.set(flag, value);
    }
}
