//! Run loop tying extraction, classification, the policy and the store together.
//!
//! A [`Controller`] performs one capture, classify, decide and act cycle per
//! [`Controller::tick`] and loops in [`Controller::run`]. [`spawn`] moves it
//! onto a worker thread with store autosave and returns a [`RunHandle`] for
//! pause, resume and graceful stop.
//!
//! Frames come from a [`FrameSource`] and presses go to an [`InputSink`];
//! both are supplied by the embedding application.

pub use self::{control::*, controller::*, io::*, notify::*, runner::*};

mod control;
mod controller;
mod io;
mod notify;
mod runner;
