use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
    mpsc::{self, TrySendError},
};

use tilescout_policy::{Action, DecisionReason};
use tilescout_store::Walkability;
use tilescout_vision::{StateType, TileSignature};

use crate::controller::ControllerState;

/// Event published by the run loop for presentation consumers.
#[derive(Debug, Clone, PartialEq, derive_more::IsVariant)]
pub enum Notification {
    ControllerStateChanged {
        from: ControllerState,
        to: ControllerState,
    },
    StateChanged {
        from: Option<StateType>,
        to: StateType,
    },
    /// A button press reached the input sink. Waits are not reported.
    ActionPerformed {
        tick: u64,
        action: Action,
        reason: DecisionReason,
    },
    TileLearned {
        signature: TileSignature,
        walkability: Walkability,
    },
    ErrorOccurred {
        tick: u64,
        message: String,
    },
}

/// Sending half of the notification channel.
///
/// Publishing never blocks: when the channel is full the event is dropped
/// and counted.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::SyncSender<Notification>>,
    dropped: Arc<AtomicU64>,
}

/// Creates a bounded notification channel holding at most `capacity` events.
#[must_use]
pub fn notification_channel(capacity: usize) -> (Notifier, mpsc::Receiver<Notification>) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    let notifier = Notifier {
        tx: Some(tx),
        dropped: Arc::default(),
    };
    (notifier, rx)
}

impl Notifier {
    /// A notifier that discards everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn publish(&self, notification: Notification) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(notification) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of events dropped because the channel was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(tick: u64) -> Notification {
        Notification::ErrorOccurred {
            tick,
            message: "boom".to_owned(),
        }
    }

    #[test]
    fn test_full_channel_drops_and_counts() {
        let (notifier, rx) = notification_channel(2);
        for tick in 0..5 {
            notifier.publish(error(tick));
        }
        assert_eq!(notifier.dropped(), 3);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), [error(0), error(1)]);
    }

    #[test]
    fn test_disconnected_and_disabled_are_silent() {
        let (notifier, rx) = notification_channel(1);
        drop(rx);
        notifier.publish(error(0));
        assert_eq!(notifier.dropped(), 0);

        let disabled = Notifier::disabled();
        disabled.publish(error(0));
        assert_eq!(disabled.dropped(), 0);
    }
}
