use std::time::Duration;

use serde::{Deserialize, Serialize};
use tilescout_policy::{Decision, ExplorationPolicy, MoveOutcome, StoreUpdate};
use tilescout_store::{
    StoreError, StoreHandle, TileRecord, Walkability, WalkabilitySnapshot, WalkabilityView as _,
};
use tilescout_vision::{
    Classification, ExtractionConfig, FrameAnalysis, StateClassifier, StateType,
};

use crate::{
    control::RunControl,
    io::{self, FrameSource, InputError, InputSink, PressTiming},
    notify::{Notification, Notifier},
};

/// Lifecycle state of a [`Controller`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, derive_more::Display,
    derive_more::IsVariant,
)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    #[default]
    #[display("idle")]
    Idle,
    #[display("initializing")]
    Initializing,
    #[display("exploring")]
    Exploring,
    #[display("paused")]
    Paused,
    /// A tick failed; the loop resumes exploring after a short pause.
    #[display("error")]
    Error,
}

/// Timing of the run loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Wait after each tick, so the next capture shows the settled screen.
    pub action_delay_ms: u64,
    pub press: PressTiming,
    /// Pause after a failed tick.
    pub error_pause_ms: u64,
    /// Pause after an input delivery failure.
    pub input_failure_pause_ms: u64,
    pub autosave_interval_secs: u64,
    /// How long a stop request waits for the loop before giving up on it.
    pub shutdown_timeout_ms: u64,
    pub notification_capacity: usize,
    /// Stop after this many ticks; `None` runs until stopped.
    pub max_ticks: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            action_delay_ms: 250,
            press: PressTiming::default(),
            error_pause_ms: 1000,
            input_failure_pause_ms: 500,
            autosave_interval_secs: 30,
            shutdown_timeout_ms: 5000,
            notification_capacity: 256,
            max_ticks: None,
        }
    }
}

impl RunConfig {
    #[must_use]
    pub const fn action_delay(&self) -> Duration {
        Duration::from_millis(self.action_delay_ms)
    }

    #[must_use]
    pub const fn error_pause(&self) -> Duration {
        Duration::from_millis(self.error_pause_ms)
    }

    #[must_use]
    pub const fn input_failure_pause(&self) -> Duration {
        Duration::from_millis(self.input_failure_pause_ms)
    }

    #[must_use]
    pub const fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum TickError {
    #[display("{_0}")]
    Input(InputError),
    #[display("{_0}")]
    Store(StoreError),
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq, derive_more::IsVariant)]
pub enum TickReport {
    /// No frame was available.
    Skipped,
    Acted {
        classification: Classification,
        outcome: Option<MoveOutcome>,
        decision: Decision,
    },
}

/// Drives the capture, classify, decide and act cycle.
///
/// The controller is the only writer of the walkability store and of the
/// policy state.
pub struct Controller<S, I, C> {
    source: S,
    input: I,
    classifier: C,
    extraction: ExtractionConfig,
    policy: ExplorationPolicy,
    store: StoreHandle,
    notifier: Notifier,
    config: RunConfig,
    state: ControllerState,
    tick: u64,
    last_game_state: Option<StateType>,
    last_snapshot: WalkabilitySnapshot,
}

impl<S, I, C> Controller<S, I, C>
where
    S: FrameSource,
    I: InputSink,
    C: StateClassifier,
{
    pub fn new(
        source: S,
        input: I,
        classifier: C,
        policy: ExplorationPolicy,
        store: StoreHandle,
        config: RunConfig,
    ) -> Self {
        Self {
            source,
            input,
            classifier,
            extraction: ExtractionConfig::default(),
            policy,
            store,
            notifier: Notifier::disabled(),
            config,
            state: ControllerState::Idle,
            tick: 0,
            last_game_state: None,
            last_snapshot: WalkabilitySnapshot::default(),
        }
    }

    #[must_use]
    pub fn with_extraction(mut self, extraction: ExtractionConfig) -> Self {
        self.extraction = extraction;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    #[must_use]
    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    #[must_use]
    pub fn policy(&self) -> &ExplorationPolicy {
        &self.policy
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    fn set_state(&mut self, to: ControllerState) {
        if self.state == to {
            return;
        }
        let from = self.state;
        self.state = to;
        tracing::debug!(%from, %to, "controller state changed");
        self.notifier
            .publish(Notification::ControllerStateChanged { from, to });
    }

    /// Runs one cycle.
    ///
    /// A missing or failed capture skips the tick without error.
    pub fn tick(&mut self) -> Result<TickReport, TickError> {
        self.tick += 1;
        let tick = self.tick;

        let frame = match self.source.capture() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!(tick, "no frame available, skipping tick");
                return Ok(TickReport::Skipped);
            }
            Err(e) => {
                tracing::debug!(tick, "capture failed, skipping tick: {e}");
                return Ok(TickReport::Skipped);
            }
        };

        let analysis = FrameAnalysis::of(&frame, &self.extraction);
        let mut classification = self.classifier.classify(&frame);
        self.store.observe(analysis.grid.signatures().collect())?;

        let outcome = self.policy.confirm_outcome(analysis.signature);
        if let Some(outcome) = outcome {
            classification.is_walking = outcome.moved;
            if let Some(signature) = outcome.target {
                let walkability = self.store.record_walk_attempt(signature, outcome.moved)?;
                if walkability != self.last_snapshot.walkability(signature) {
                    tracing::info!(%signature, ?walkability, "tile learned");
                    self.notifier.publish(Notification::TileLearned {
                        signature,
                        walkability,
                    });
                }
            }
        }

        if self.last_game_state != Some(classification.state) {
            tracing::info!(tick, from = ?self.last_game_state, to = ?classification.state, "game state changed");
            self.notifier.publish(Notification::StateChanged {
                from: self.last_game_state,
                to: classification.state,
            });
            self.last_game_state = Some(classification.state);
        }

        let snapshot = self.store.query(analysis.grid.signatures().collect())?;
        let decision =
            self.policy
                .decide(&classification, &analysis.grid, analysis.signature, &snapshot);
        self.last_snapshot = snapshot;

        for update in &decision.store_updates {
            match *update {
                StoreUpdate::ForceFailures { signature, count } => {
                    let before = self
                        .store
                        .get(signature)?
                        .as_ref()
                        .map_or(Walkability::Unknown, TileRecord::walkability);
                    let walkability = self.store.force_failures(signature, count)?;
                    if walkability != before {
                        tracing::info!(%signature, ?walkability, "tile forced");
                        self.notifier.publish(Notification::TileLearned {
                            signature,
                            walkability,
                        });
                    }
                }
            }
        }

        let pressed = match io::dispatch(&mut self.input, decision.action, self.config.press) {
            Ok(pressed) => pressed,
            Err(e) => {
                // Nothing reached the game, so the next frame says nothing about the move.
                self.policy.abandon_pending();
                return Err(e.into());
            }
        };
        if pressed {
            tracing::debug!(tick, action = %decision.action, reason = %decision.reason, "action performed");
            self.notifier.publish(Notification::ActionPerformed {
                tick,
                action: decision.action,
                reason: decision.reason,
            });
        } else {
            tracing::debug!(tick, reason = %decision.reason, "waiting");
        }

        Ok(TickReport::Acted {
            classification,
            outcome,
            decision,
        })
    }

    /// Ticks until a stop is requested or `max_ticks` is reached.
    ///
    /// Per-tick errors are reported and followed by a pause; they never end
    /// the loop.
    pub fn run(&mut self, control: &RunControl) {
        self.set_state(ControllerState::Initializing);
        self.set_state(ControllerState::Exploring);
        let delay = self.config.action_delay();

        loop {
            if control.is_stop_requested() {
                break;
            }
            if control.is_paused() {
                self.set_state(ControllerState::Paused);
                if control.wait_while_paused() {
                    break;
                }
                self.set_state(ControllerState::Exploring);
            }
            if self.config.max_ticks.is_some_and(|max| self.tick >= max) {
                break;
            }

            if let Err(e) = self.tick() {
                tracing::error!(tick = self.tick, "tick failed: {e}");
                self.notifier.publish(Notification::ErrorOccurred {
                    tick: self.tick,
                    message: e.to_string(),
                });
                self.set_state(ControllerState::Error);
                let pause = match e {
                    TickError::Input(_) => self.config.input_failure_pause(),
                    TickError::Store(_) => self.config.error_pause(),
                };
                if control.wait(pause) {
                    break;
                }
                self.set_state(ControllerState::Exploring);
                continue;
            }

            if control.wait(delay) {
                break;
            }
        }

        self.set_state(ControllerState::Idle);
        tracing::info!(ticks = self.tick, "run loop finished");
    }
}
