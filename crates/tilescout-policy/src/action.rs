use serde::{Deserialize, Serialize};

/// One of the four axis-aligned movement directions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[display("up")]
    Up,
    #[display("down")]
    Down,
    #[display("left")]
    Left,
    #[display("right")]
    Right,
}

impl Direction {
    pub const LEN: usize = 4;
    pub const ALL: [Self; Self::LEN] = [Self::Up, Self::Down, Self::Left, Self::Right];

    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Tile offset `(dx, dy)` of one step; `y` grows downwards.
    #[must_use]
    pub const fn delta(self) -> (isize, isize) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Up => 0,
            Self::Down => 1,
            Self::Left => 2,
            Self::Right => 3,
        }
    }
}

/// Button-level action chosen for one cycle.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::IsVariant,
)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[display("move {_0}")]
    Move(Direction),
    /// Confirm button.
    #[display("interact")]
    Interact,
    #[display("cancel")]
    Cancel,
    /// Start/menu button.
    #[display("open menu")]
    OpenMenu,
    /// Dispatch nothing this cycle.
    #[display("wait")]
    Wait,
}

impl Action {
    #[must_use]
    pub const fn direction(self) -> Option<Direction> {
        match self {
            Self::Move(dir) => Some(dir),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_is_involution() {
        for dir in Direction::ALL {
            assert_ne!(dir.opposite(), dir);
            assert_eq!(dir.opposite().opposite(), dir);
            let (dx, dy) = dir.delta();
            assert_eq!(dir.opposite().delta(), (-dx, -dy));
        }
    }

    #[test]
    fn test_index_is_unique() {
        let mut seen = [false; Direction::LEN];
        for dir in Direction::ALL {
            assert!(!seen[dir.index()]);
            seen[dir.index()] = true;
        }
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::Move(Direction::Left).to_string(), "move left");
        assert_eq!(Action::OpenMenu.to_string(), "open menu");
        assert_eq!(Action::Move(Direction::Up).direction(), Some(Direction::Up));
        assert_eq!(Action::Wait.direction(), None);
    }
}
