use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{
    CharacterRegistry, InfluenceActionKind, InvariantViolation, Issues, Participant, ParticipantId,
    RoleId, Scenario, Score,
};

/// One committed round: who said what, and the event that fired.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub statements: BTreeMap<ParticipantId, String>,
    /// Id of the event injected this round.
    pub event: Option<String>,
}

/// Terminal classification of a negotiation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    CriticalClimateFailure { climate: Score },
    Vetoed { role: RoleId },
    ComplianceFailure { share: u8, floor: u8 },
    FavorableVictory { label: String, deal: String },
    OpposingVictory { label: String, deal: String },
    Compromise { deal: String },
    Forfeited { round: u32 },
}

impl Outcome {
    /// Short title, e.g. "Developer Victory".
    pub fn title(&self) -> &str {
        match self {
            Outcome::CriticalClimateFailure { .. } => "Negotiation Failure",
            Outcome::Vetoed { .. } => "Council Rejection",
            Outcome::ComplianceFailure { .. } => "Planning Failure",
            Outcome::FavorableVictory { label, .. } | Outcome::OpposingVictory { label, .. } => {
                label.as_str()
            }
            Outcome::Compromise { .. } => "Compromise",
            Outcome::Forfeited { .. } => "Forfeit",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::CriticalClimateFailure { climate } => write!(
                f,
                "Negotiation Failure: the climate fell to {climate} and talks collapsed"
            ),
            Outcome::Vetoed { role } => write!(
                f,
                "Council Rejection: the {role} role opposes the plan and vetoes it"
            ),
            Outcome::ComplianceFailure { share, floor } => write!(
                f,
                "Planning Failure: affordable provision of {share}% is below the legal floor of {floor}%"
            ),
            Outcome::FavorableVictory { label, deal } | Outcome::OpposingVictory { label, deal } => {
                write!(f, "{label}: {deal}")
            }
            Outcome::Compromise { deal } => write!(f, "Compromise: {deal}"),
            Outcome::Forfeited { round } => write!(f, "Forfeit: the negotiation was abandoned in round {round}"),
        }
    }
}

/// The human's recent influence actions and the one-shot regen penalty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfluenceLedger {
    /// Oldest first.
    recent: Vec<InfluenceActionKind>,
    pub regen_penalty: bool,
}

impl InfluenceLedger {
    pub fn last(&self) -> Option<InfluenceActionKind> {
        self.recent.last().copied()
    }

    pub fn recent(&self) -> &[InfluenceActionKind] {
        &self.recent
    }

    /// Append an action, dropping the oldest ones beyond `window`.
    pub fn record(&mut self, kind: InfluenceActionKind, window: usize) {
        self.recent.push(kind);
        if self.recent.len() > window {
            let excess = self.recent.len() - window;
            self.recent.drain(..excess);
        }
    }

    /// Read and clear the regen penalty.
    pub fn take_regen_penalty(&mut self) -> bool {
        std::mem::take(&mut self.regen_penalty)
    }
}

/// Everything that changes during one negotiation. Owned by the caller and
/// mutated only through the round engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NegotiationState {
    round: u32,
    pub climate: Score,
    pub issues: Issues,
    history: Vec<RoundRecord>,
    outcome: Option<Outcome>,
    pub registry: CharacterRegistry,
    pub ledger: InfluenceLedger,
    pub rng: ChaCha8Rng,
}

impl NegotiationState {
    pub fn new(scenario: &Scenario, registry: CharacterRegistry, rng: ChaCha8Rng) -> Self {
        Self {
            round: 1,
            climate: Score::new(scenario.rules.initial_climate),
            issues: scenario.initial_issues(),
            history: Vec::new(),
            outcome: None,
            registry,
            ledger: InfluenceLedger::default(),
            rng,
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Move to the next round and return its number.
    pub fn advance_round(&mut self) -> u32 {
        self.round += 1;
        self.round
    }

    pub fn history(&self) -> &[RoundRecord] {
        &self.history
    }

    pub fn record_round(&mut self, record: RoundRecord) {
        self.history.push(record);
    }

    /// True if the event fired in any committed round.
    pub fn event_occurred(&self, event_id: &str) -> bool {
        self.history
            .iter()
            .any(|r| r.event.as_deref() == Some(event_id))
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn is_terminated(&self) -> bool {
        self.outcome.is_some()
    }

    /// Set the outcome. An existing outcome is kept and returned instead.
    pub fn conclude(&mut self, outcome: Outcome) -> &Outcome {
        self.outcome.get_or_insert(outcome)
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.round == 0 {
            return Err(InvariantViolation::RoundZero);
        }
        self.registry.check_invariants()
    }

    pub fn snapshot(&self) -> StateSnapshot<'_> {
        StateSnapshot {
            round: self.round,
            climate: self.climate,
            issues: &self.issues,
            participants: self.registry.participants(),
            outcome: self.outcome.as_ref(),
        }
    }
}

/// Read-only view handed to hosts and visualizations.
#[derive(Clone, Debug, Serialize)]
pub struct StateSnapshot<'a> {
    pub round: u32,
    pub climate: Score,
    pub issues: &'a Issues,
    pub participants: &'a [Participant],
    pub outcome: Option<&'a Outcome>,
}
