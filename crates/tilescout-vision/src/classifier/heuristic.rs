use serde::{Deserialize, Serialize};

use crate::frame::{PixelFrame, Region};

use super::{BattlePhase, Classification, MenuKind, StateClassifier, StateType};

/// Fixed regions and thresholds of the heuristic classifier.
///
/// Coordinates assume the 160x144 logical screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Brightness below which a pixel counts as dark.
    pub dark_threshold: u8,
    /// Brightness at or above which a pixel counts as bright.
    pub bright_threshold: u8,
    /// Sampling stride for ratio checks.
    pub sample_stride: usize,
    /// Whole-frame dark ratio at or above which the screen is black.
    pub black_screen_ratio: f32,
    /// Minimum dark ratio of a box border region.
    pub border_dark_ratio: f32,
    /// Minimum bright ratio of a box interior region.
    pub interior_bright_ratio: f32,
    /// An arrow window must contain between `arrow_min_dark` and
    /// `arrow_max_dark` dark pixels (inclusive).
    pub arrow_min_dark: usize,
    pub arrow_max_dark: usize,

    pub text_box_border: Region,
    pub text_box_interior: Region,
    pub continue_arrow: Region,

    pub enemy_status_bar: Region,
    pub player_status_bar: Region,
    pub battle_action_arrows: Vec<Region>,
    pub battle_move_arrows: Vec<Region>,

    pub start_menu_border: Region,
    pub start_menu_interior: Region,
    pub start_menu_arrows: Vec<Region>,

    pub yes_no_border: Region,
    pub yes_no_interior: Region,
    pub yes_no_arrows: Vec<Region>,
}

fn arrow_column(x: usize, ys: &[usize]) -> Vec<Region> {
    ys.iter().map(|&y| Region::new(x, y, 8, 8)).collect()
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            dark_threshold: 64,
            bright_threshold: 160,
            sample_stride: 2,
            black_screen_ratio: 0.95,
            border_dark_ratio: 0.6,
            interior_bright_ratio: 0.7,
            arrow_min_dark: 4,
            arrow_max_dark: 24,

            text_box_border: Region::new(8, 98, 144, 3),
            text_box_interior: Region::new(8, 106, 144, 28),
            continue_arrow: Region::new(144, 128, 8, 8),

            enemy_status_bar: Region::new(8, 26, 72, 2),
            player_status_bar: Region::new(88, 82, 64, 2),
            battle_action_arrows: vec![
                Region::new(72, 112, 8, 8),
                Region::new(120, 112, 8, 8),
                Region::new(72, 128, 8, 8),
                Region::new(120, 128, 8, 8),
            ],
            battle_move_arrows: arrow_column(40, &[104, 112, 120, 128]),

            start_menu_border: Region::new(81, 4, 2, 100),
            start_menu_interior: Region::new(96, 8, 56, 96),
            start_menu_arrows: arrow_column(88, &[16, 32, 48, 64, 80, 96]),

            yes_no_border: Region::new(113, 66, 2, 26),
            yes_no_interior: Region::new(128, 68, 24, 22),
            yes_no_arrows: arrow_column(120, &[72, 80]),
        }
    }
}

/// Classifies frames by testing fixed regions against brightness thresholds.
#[derive(Debug, Clone, Default)]
pub struct HeuristicClassifier {
    config: HeuristicConfig,
}

impl HeuristicClassifier {
    #[must_use]
    pub fn new(config: HeuristicConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &HeuristicConfig {
        &self.config
    }

    /// Returns `true` if nearly every sampled pixel of the frame is dark.
    #[must_use]
    pub fn is_black_screen(&self, frame: &PixelFrame) -> bool {
        let c = &self.config;
        frame.dark_ratio(frame.bounds(), c.sample_stride, c.dark_threshold) >= c.black_screen_ratio
    }

    fn is_box(&self, frame: &PixelFrame, border: Region, interior: Region) -> bool {
        let c = &self.config;
        frame.dark_ratio(border, 1, c.dark_threshold) >= c.border_dark_ratio
            && frame.bright_ratio(interior, c.sample_stride, c.bright_threshold)
                >= c.interior_bright_ratio
    }

    fn is_bar(&self, frame: &PixelFrame, bar: Region) -> bool {
        let c = &self.config;
        frame.dark_ratio(bar, 1, c.dark_threshold) >= c.border_dark_ratio
    }

    /// An arrow is a small cluster of dark pixels; empty or solid windows are rejected.
    fn has_arrow(&self, frame: &PixelFrame, window: Region) -> bool {
        let c = &self.config;
        let dark = frame.count_dark(window, c.dark_threshold);
        (c.arrow_min_dark..=c.arrow_max_dark).contains(&dark)
    }

    fn find_arrow(&self, frame: &PixelFrame, windows: &[Region]) -> Option<usize> {
        windows.iter().position(|&w| self.has_arrow(frame, w))
    }

    fn classify_battle(&self, frame: &PixelFrame, text_box: bool) -> Option<Classification> {
        let c = &self.config;
        if !text_box || !self.is_bar(frame, c.enemy_status_bar) || !self.is_bar(frame, c.player_status_bar) {
            return None;
        }
        let has_continue = self.has_arrow(frame, c.continue_arrow);
        let move_arrow = self.find_arrow(frame, &c.battle_move_arrows);
        let action_arrow = self.find_arrow(frame, &c.battle_action_arrows);
        let (battle_phase, selection_index) = match (move_arrow, action_arrow) {
            (Some(i), _) => (BattlePhase::MoveSelect, Some(i)),
            (None, Some(i)) => (BattlePhase::ActionSelect, Some(i)),
            (None, None) if has_continue => (BattlePhase::Message, None),
            (None, None) => (BattlePhase::Animation, None),
        };
        Some(Classification {
            battle_phase,
            has_continue_indicator: has_continue,
            has_selection_indicator: selection_index.is_some(),
            selection_index,
            ..Classification::of_state(StateType::Battle)
        })
    }

    fn classify_menu(&self, frame: &PixelFrame, text_box: bool) -> Option<Classification> {
        let c = &self.config;
        let (menu_kind, arrows) = if self.is_box(frame, c.yes_no_border, c.yes_no_interior) {
            (MenuKind::YesNo, &c.yes_no_arrows)
        } else if self.is_box(frame, c.start_menu_border, c.start_menu_interior) {
            (MenuKind::Start, &c.start_menu_arrows)
        } else {
            return None;
        };
        let selection_index = self.find_arrow(frame, arrows);
        Some(Classification {
            menu_kind,
            has_selection_indicator: selection_index.is_some(),
            selection_index,
            has_continue_indicator: text_box && self.has_arrow(frame, c.continue_arrow),
            ..Classification::of_state(StateType::Menu)
        })
    }
}

impl StateClassifier for HeuristicClassifier {
    fn classify(&self, frame: &PixelFrame) -> Classification {
        let c = &self.config;
        if self.is_black_screen(frame) {
            return Classification::of_state(StateType::BlackScreen);
        }

        let text_box = self.is_box(frame, c.text_box_border, c.text_box_interior);
        if let Some(battle) = self.classify_battle(frame, text_box) {
            return battle;
        }
        if let Some(menu) = self.classify_menu(frame, text_box) {
            return menu;
        }
        if text_box {
            return Classification {
                has_continue_indicator: self.has_arrow(frame, c.continue_arrow),
                ..Classification::of_state(StateType::Dialogue)
            };
        }
        Classification::of_state(StateType::Overworld)
    }
}
