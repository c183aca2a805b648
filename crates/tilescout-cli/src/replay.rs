//! File-backed collaborators for `tilescout run`.

use std::{
    path::{Path, PathBuf},
    sync::mpsc,
    thread::{self, JoinHandle},
};

use tilescout_runtime::{
    Button, CaptureError, FrameSource, InputError, InputSink, Notification, PressTiming,
};
use tilescout_vision::PixelFrame;

use crate::util;

/// Replays the PNG screenshots of a directory in file-name order.
#[derive(Debug)]
pub struct ReplayFrameSource {
    files: Vec<PathBuf>,
    next: usize,
    looping: bool,
}

impl ReplayFrameSource {
    pub fn open(dir: &Path, looping: bool) -> anyhow::Result<Self> {
        let files = util::list_png_files(dir)?;
        anyhow::ensure!(
            !files.is_empty(),
            "No PNG frames found in {}",
            dir.display()
        );
        Ok(Self {
            files,
            next: 0,
            looping,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.files.len()
    }
}

impl FrameSource for ReplayFrameSource {
    fn capture(&mut self) -> Result<Option<PixelFrame>, CaptureError> {
        if self.next == self.files.len() {
            if !self.looping {
                return Ok(None);
            }
            self.next = 0;
        }
        let path = &self.files[self.next];
        self.next += 1;
        let frame = PixelFrame::load_png(path).map_err(CaptureError::Image)?;
        Ok(Some(frame))
    }
}

/// Input sink that only logs the buttons it is asked to press.
#[derive(Debug, Default)]
pub struct LoggingInputSink {
    /// Block for the hold and release delay like a real controller would.
    realtime: bool,
    presses: u64,
}

impl LoggingInputSink {
    pub fn new(realtime: bool) -> Self {
        Self {
            realtime,
            presses: 0,
        }
    }
}

impl InputSink for LoggingInputSink {
    fn press(&mut self, button: Button, timing: PressTiming) -> Result<(), InputError> {
        self.presses += 1;
        tracing::info!(%button, presses = self.presses, hold_ms = timing.hold_ms, "press");
        if self.realtime {
            thread::sleep(timing.hold() + timing.delay());
        }
        Ok(())
    }
}

/// Logs every notification until all senders are gone; returns how many were seen.
pub fn spawn_notification_drain(rx: mpsc::Receiver<Notification>) -> JoinHandle<u64> {
    thread::spawn(move || {
        let mut received = 0;
        for notification in rx {
            received += 1;
            log_notification(&notification);
        }
        received
    })
}

fn log_notification(notification: &Notification) {
    match notification {
        Notification::ControllerStateChanged { from, to } => {
            tracing::info!(?from, ?to, "controller state changed");
        }
        Notification::StateChanged { from, to } => {
            tracing::info!(?from, ?to, "game state changed");
        }
        Notification::ActionPerformed {
            tick,
            action,
            reason,
        } => {
            tracing::debug!(tick, %action, %reason, "action performed");
        }
        Notification::TileLearned {
            signature,
            walkability,
        } => {
            tracing::info!(%signature, ?walkability, "tile learned");
        }
        Notification::ErrorOccurred { tick, message } => {
            tracing::error!(tick, error = %message, "tick failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;

    fn write_frames(dir: &Path, shades: &[u8]) {
        for (i, shade) in shades.iter().enumerate() {
            RgbImage::from_pixel(16, 16, Rgb([*shade, *shade, *shade]))
                .save(dir.join(format!("frame{i:03}.png")))
                .unwrap();
        }
    }

    fn shade(frame: &PixelFrame) -> u8 {
        frame.pixel(0, 0).r
    }

    #[test]
    fn test_replay_in_order_then_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), &[10, 20, 30]);
        let mut source = ReplayFrameSource::open(dir.path(), false).unwrap();
        assert_eq!(source.frame_count(), 3);

        let shades: Vec<_> = (0..3)
            .map(|_| shade(&source.capture().unwrap().unwrap()))
            .collect();
        assert_eq!(shades, [10, 20, 30]);
        assert!(source.capture().unwrap().is_none());
    }

    #[test]
    fn test_replay_loops() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), &[10, 20]);
        let mut source = ReplayFrameSource::open(dir.path(), true).unwrap();
        let shades: Vec<_> = (0..5)
            .map(|_| shade(&source.capture().unwrap().unwrap()))
            .collect();
        assert_eq!(shades, [10, 20, 10, 20, 10]);
    }

    #[test]
    fn test_empty_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ReplayFrameSource::open(dir.path(), false).is_err());
    }

    #[test]
    fn test_unreadable_frame_is_capture_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.png"), b"not a png").unwrap();
        let mut source = ReplayFrameSource::open(dir.path(), false).unwrap();
        assert!(matches!(source.capture(), Err(CaptureError::Image(_))));
    }

    #[test]
    fn test_drain_counts_until_disconnect() {
        let (tx, rx) = mpsc::channel();
        let drain = spawn_notification_drain(rx);
        for tick in 0..3 {
            tx.send(Notification::ErrorOccurred {
                tick,
                message: "boom".to_owned(),
            })
            .unwrap();
        }
        drop(tx);
        assert_eq!(drain.join().unwrap(), 3);
    }
}
