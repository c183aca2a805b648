use serde::{Deserialize, Serialize};
use tilescout_vision::{TilePos, TileSignature};

/// Which decision procedure drives overworld movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// Stuck, loop, backtrack and exit heuristics over per-location memory.
    #[default]
    Explore,
    /// Probe tiles of unresolved walkability first.
    Discovery,
}

/// Tunables of [`crate::ExplorationPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub mode: PolicyMode,
    /// Fixed on-screen tile of the player character.
    pub player_tile: TilePos,
    /// Consecutive failed moves before stuck recovery starts.
    pub stuck_threshold: u32,
    /// Occurrences of one frame within the recent window that count as a loop.
    pub loop_repeat_threshold: usize,
    pub recent_frames_capacity: usize,
    pub move_history_capacity: usize,
    pub interact_probability: f64,
    pub cancel_probability: f64,
    /// Minimum dark ratio of an edge tile for it to count as an exit.
    pub exit_darkness_threshold: f32,
    /// Score added to an exit whose direction was already tried here.
    pub tried_direction_penalty: f32,
    /// Identical consecutive failures after which discovery gives up a direction.
    pub discovery_stuck_limit: u32,
    /// Negative observations forced onto a tile discovery gave up on.
    pub forced_block_observations: u32,
    /// Tile signatures known to belong to a text-box border.
    pub textbox_signatures: Vec<TileSignature>,
    /// Matching tiles needed before the text-box pattern fires.
    pub textbox_min_matches: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            mode: PolicyMode::Explore,
            player_tile: TilePos::new(4, 4),
            stuck_threshold: 2,
            loop_repeat_threshold: 3,
            recent_frames_capacity: 12,
            move_history_capacity: 32,
            interact_probability: 0.05,
            cancel_probability: 0.03,
            exit_darkness_threshold: 0.7,
            tried_direction_penalty: 4.0,
            discovery_stuck_limit: 3,
            forced_block_observations: 5,
            textbox_signatures: Vec::new(),
            textbox_min_matches: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: PolicyConfig =
            serde_json::from_str(r#"{"mode": "discovery", "stuck_threshold": 4}"#).unwrap();
        assert!(config.mode.is_discovery());
        assert_eq!(config.stuck_threshold, 4);
        assert_eq!(config.loop_repeat_threshold, 3);
        assert_eq!(config.player_tile, TilePos::new(4, 4));
    }
}
