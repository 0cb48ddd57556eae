//! Fire-and-forget round notifications for visualizations.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use sim_core::{Issues, NegotiationState, Outcome, Score};
use tracing::warn;

/// What a visualization needs after each commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundNotice {
    pub round: u32,
    pub climate: Score,
    pub issues: Issues,
    pub outcome: Option<Outcome>,
}

impl RoundNotice {
    pub fn from_state(state: &NegotiationState) -> Self {
        Self {
            round: state.round(),
            climate: state.climate,
            issues: state.issues.clone(),
            outcome: state.outcome().cloned(),
        }
    }
}

/// Best-effort sink. Must never block and never fail the caller.
pub trait RoundNotifier: Send + Sync {
    fn notify(&self, notice: RoundNotice);
}

/// Pushes notices into a bounded crossbeam channel; drops them when the
/// channel is full or disconnected.
#[derive(Clone, Debug)]
pub struct ChannelNotifier {
    tx: Sender<RoundNotice>,
}

impl ChannelNotifier {
    pub fn bounded(capacity: usize) -> (Self, Receiver<RoundNotice>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }
}

impl RoundNotifier for ChannelNotifier {
    fn notify(&self, notice: RoundNotice) {
        match self.tx.try_send(notice) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => {
                warn!(round = n.round, "visualization channel full, notice dropped")
            }
            Err(TrySendError::Disconnected(n)) => {
                warn!(round = n.round, "visualization channel closed, notice dropped")
            }
        }
    }
}
