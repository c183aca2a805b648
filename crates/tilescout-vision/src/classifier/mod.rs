//! Game-state classification of captured frames.
//!
//! Two interchangeable strategies implement [`StateClassifier`]:
//!
//! - [`HeuristicClassifier`] - tests fixed pixel regions against brightness thresholds
//! - [`TemplateClassifier`] - slides tagged reference images over the frame
//!
//! Both apply the same precedence: black screen, battle, menu, dialogue, and
//! finally overworld. A frame nothing matches is classified as overworld;
//! classification never fails.

use serde::{Deserialize, Serialize};

use crate::frame::PixelFrame;

pub use self::{heuristic::*, template::*};

mod heuristic;
mod template;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, derive_more::IsVariant,
)]
#[serde(rename_all = "snake_case")]
pub enum StateType {
    #[default]
    Unknown,
    Overworld,
    Battle,
    Menu,
    Dialogue,
    BlackScreen,
    Title,
}

impl StateType {
    /// Precedence rank; lower wins when several states qualify.
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::BlackScreen => 0,
            Self::Title => 1,
            Self::Battle => 2,
            Self::Menu => 3,
            Self::Dialogue => 4,
            Self::Overworld => 5,
            Self::Unknown => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattlePhase {
    #[default]
    None,
    /// A message is shown in the battle text box.
    Message,
    /// The top-level battle action menu is open.
    ActionSelect,
    /// The move list is open.
    MoveSelect,
    /// Nothing interactive is on screen.
    Animation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuKind {
    #[default]
    None,
    /// Tall column on the right edge of the screen.
    Start,
    /// Small two-option box above the text box.
    YesNo,
    Generic,
}

/// Per-frame classification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Classification {
    pub state: StateType,
    pub battle_phase: BattlePhase,
    pub menu_kind: MenuKind,
    pub has_continue_indicator: bool,
    pub has_selection_indicator: bool,
    pub selection_index: Option<usize>,
    /// Set by the run loop when the last move changed the screen.
    pub is_walking: bool,
}

impl Classification {
    #[must_use]
    pub fn of_state(state: StateType) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    /// Returns `true` if a text box that can be dismissed is on screen.
    #[must_use]
    pub fn has_dismissible_text_box(&self) -> bool {
        self.state.is_dialogue() || (self.state.is_menu() && self.has_continue_indicator)
    }
}

/// Labels a frame's game state.
pub trait StateClassifier: std::fmt::Debug + Send {
    fn classify(&self, frame: &PixelFrame) -> Classification;
}

impl<T> StateClassifier for Box<T>
where
    T: StateClassifier + ?Sized,
{
    fn classify(&self, frame: &PixelFrame) -> Classification {
        (**self).classify(frame)
    }
}

/// Which classifier strategy a deployment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierStrategy {
    #[default]
    Heuristic,
    Template,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_order() {
        let mut states = [
            StateType::Overworld,
            StateType::Dialogue,
            StateType::Battle,
            StateType::BlackScreen,
            StateType::Menu,
        ];
        states.sort_by_key(|s| s.precedence());
        assert_eq!(
            states,
            [
                StateType::BlackScreen,
                StateType::Battle,
                StateType::Menu,
                StateType::Dialogue,
                StateType::Overworld,
            ]
        );
    }

    #[test]
    fn test_dismissible_text_box() {
        assert!(Classification::of_state(StateType::Dialogue).has_dismissible_text_box());
        assert!(!Classification::of_state(StateType::Overworld).has_dismissible_text_box());
        let menu = Classification {
            has_continue_indicator: true,
            ..Classification::of_state(StateType::Menu)
        };
        assert!(menu.has_dismissible_text_box());
    }
}
