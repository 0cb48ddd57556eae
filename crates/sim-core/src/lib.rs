#![deny(warnings)]

//! Core domain models and invariants for the negotiation simulation.
//!
//! This crate defines the serializable types shared by the economy, oracle
//! and runtime crates: bounded scores, participants, issues, the scenario
//! configuration with its validation, the character registry and the
//! session-scoped negotiation state.

mod issues;
mod participant;
mod registry;
mod scenario;
mod state;

pub use issues::{IssueDefinition, IssueId, IssueValue, Issues, ScaleLevel};
pub use participant::{Participant, ParticipantId, Persona, RoleId, Score, StanceCategory};
pub use registry::{CharacterRegistry, HUMAN_ID};
pub use scenario::{
    ActionDefinition, ComplianceRule, EventDefinition, EventTarget, FloorRaise,
    InfluenceActionKind, IssueCondition, PartyRule, RoleDefinition, Rules, Scenario,
    VictoryRules, BUILTIN_SCENARIO, MAX_MULTIPLIER,
};
pub use state::{InfluenceLedger, NegotiationState, Outcome, RoundRecord, StateSnapshot};

use thiserror::Error;

/// Caller-facing validation failures. The state is never touched when one of
/// these is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Statement was empty or whitespace only.
    #[error("statement is empty")]
    EmptyStatement,
    /// Statement is shorter than the configured minimum.
    #[error("statement has {words} words, at least {minimum} required")]
    StatementTooShort { words: usize, minimum: usize },
    /// The human cannot afford the action.
    #[error("not enough influence tokens: {required} required, {available} available")]
    InsufficientTokens { required: u32, available: u32 },
    /// The negotiation already has an outcome.
    #[error("negotiation has already ended")]
    SessionClosed,
}

/// Malformed scenario data or an impossible session setup. Fatal at
/// construction time.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    /// A role id was referenced but never defined.
    #[error("role `{0}` is not defined in the scenario")]
    MissingRole(RoleId),
    /// The role's stance distribution has no positive weight.
    #[error("role `{0}` has an empty stance distribution")]
    EmptyDistribution(RoleId),
    /// An issue id was referenced but is not in the catalog.
    #[error("{context} references unknown issue `{issue}`")]
    UnknownIssue { context: String, issue: IssueId },
    /// An event names a role that does not exist.
    #[error("event `{event}` targets unknown role `{role}`")]
    UnknownEventRole { event: String, role: RoleId },
    /// The action table lacks an entry.
    #[error("action `{0}` is missing from the action table")]
    MissingAction(InfluenceActionKind),
    /// A probability lies outside [0, 1].
    #[error("{name} = {value} is outside [0, 1]")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },
    /// Compliance must be checked against a percentage issue.
    #[error("compliance issue `{0}` must be a percentage")]
    ComplianceIssueNotPercent(IssueId),
    /// Any other rule that cannot hold.
    #[error("invalid rule: {0}")]
    InvalidRule(String),
    /// Scenario text could not be decoded.
    #[error("could not parse scenario: {0}")]
    Parse(String),
}

/// Programming defects. A correct engine never produces these; they are
/// returned rather than panicking so tests can assert on them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A debit larger than the balance was attempted.
    #[error("token debit of {debit} exceeds balance {balance} for `{participant}`")]
    TokenUnderflow {
        participant: ParticipantId,
        debit: u32,
        balance: u32,
    },
    /// A participant holds more tokens than its maximum.
    #[error("`{participant}` holds {tokens} tokens, above its maximum {max}")]
    TokensAboveMaximum {
        participant: ParticipantId,
        tokens: u32,
        max: u32,
    },
    /// There must be exactly one human.
    #[error("expected exactly one human participant, found {0}")]
    HumanCount(usize),
    /// Round counter must start at one.
    #[error("round counter must be >= 1")]
    RoundZero,
}
