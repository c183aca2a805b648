//! External collaborators: where frames come from and where button presses go.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tilescout_policy::{Action, Direction};
use tilescout_vision::{ImageLoadError, PixelFrame};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum CaptureError {
    #[display("capture source unavailable: {_0}")]
    Unavailable(#[error(not(source))] String),
    #[display("{_0}")]
    Image(ImageLoadError),
}

/// Supplies one frame per call.
pub trait FrameSource: Send {
    /// Captures the current frame.
    ///
    /// `Ok(None)` means no frame is available right now; the tick is skipped.
    fn capture(&mut self) -> Result<Option<PixelFrame>, CaptureError>;
}

/// Physical button of the emulated controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    #[display("up")]
    Up,
    #[display("down")]
    Down,
    #[display("left")]
    Left,
    #[display("right")]
    Right,
    #[display("confirm")]
    Confirm,
    #[display("cancel")]
    Cancel,
    #[display("menu")]
    Menu,
}

impl From<Direction> for Button {
    fn from(dir: Direction) -> Self {
        match dir {
            Direction::Up => Self::Up,
            Direction::Down => Self::Down,
            Direction::Left => Self::Left,
            Direction::Right => Self::Right,
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("failed to press {button}: {message}")]
pub struct InputError {
    pub button: Button,
    pub message: String,
}

/// How long a button is held and how long to wait after releasing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressTiming {
    pub hold_ms: u64,
    pub delay_ms: u64,
}

impl Default for PressTiming {
    fn default() -> Self {
        Self {
            hold_ms: 100,
            delay_ms: 50,
        }
    }
}

impl PressTiming {
    #[must_use]
    pub const fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Delivers button presses. Calls block until the press completes.
pub trait InputSink: Send {
    fn press(&mut self, button: Button, timing: PressTiming) -> Result<(), InputError>;

    fn press_direction(&mut self, dir: Direction, timing: PressTiming) -> Result<(), InputError> {
        self.press(dir.into(), timing)
    }

    fn press_confirm(&mut self, timing: PressTiming) -> Result<(), InputError> {
        self.press(Button::Confirm, timing)
    }

    fn press_cancel(&mut self, timing: PressTiming) -> Result<(), InputError> {
        self.press(Button::Cancel, timing)
    }

    fn press_menu(&mut self, timing: PressTiming) -> Result<(), InputError> {
        self.press(Button::Menu, timing)
    }
}

/// Performs `action` on `sink`; returns whether a button was pressed.
pub fn dispatch<I>(sink: &mut I, action: Action, timing: PressTiming) -> Result<bool, InputError>
where
    I: InputSink + ?Sized,
{
    match action {
        Action::Move(dir) => sink.press_direction(dir, timing)?,
        Action::Interact => sink.press_confirm(timing)?,
        Action::Cancel => sink.press_cancel(timing)?,
        Action::OpenMenu => sink.press_menu(timing)?,
        Action::Wait => return Ok(false),
    }
    Ok(true)
}
