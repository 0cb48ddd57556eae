#![deny(warnings)]

//! Dialogue oracle seam for the negotiation simulation.
//!
//! The engine never writes dialogue itself. It hands a [`DialogueRequest`] to
//! a [`DialogueOracle`] and gets back a line of dialogue plus a bounded opinion
//! delta. This crate also carries the pieces an LLM-backed oracle needs:
//! persona synthesis, prompt assembly and response parsing.

mod persona;
mod prompt;

pub use persona::{assign_personas, style_guide, synthesize_persona, StyleGuide};
pub use prompt::{build_prompt, deal_summary, history_transcript, mood, parse_response, Prompt};

use sim_core::{
    CharacterRegistry, Issues, Participant, RoleDefinition, RoleId, RoundRecord, Scenario, Score,
};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// Collaborator failures. Always recovered per participant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The backing service could not be reached or refused the call.
    #[error("dialogue oracle unavailable: {0}")]
    Unavailable(String),
    /// The reply could not be decoded.
    #[error("malformed dialogue oracle response: {0}")]
    Malformed(String),
}

/// Everything an oracle sees about one participant's turn.
#[derive(Clone, Copy, Debug)]
pub struct DialogueRequest<'a> {
    pub scenario: &'a Scenario,
    pub participant: &'a Participant,
    /// Used to name the speakers in `history`.
    pub registry: &'a CharacterRegistry,
    pub history: &'a [RoundRecord],
    pub statement: &'a str,
    pub climate: Score,
    pub issues: &'a Issues,
}

impl<'a> DialogueRequest<'a> {
    pub fn role(&self) -> Option<&'a RoleDefinition> {
        self.scenario.role(&self.participant.role)
    }
}

/// A participant's reply. `opinion_delta` is unbounded here; the engine
/// clamps and scales it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialogueResponse {
    pub dialogue: String,
    pub opinion_delta: i32,
    pub reasoning: Option<String>,
}

/// External generator of dialogue. Implementations must be callable from
/// several threads at once.
pub trait DialogueOracle: Send + Sync {
    fn respond(&self, request: &DialogueRequest<'_>) -> Result<DialogueResponse, OracleError>;
}

/// Deterministic reply used when the oracle fails.
pub fn fallback_response(name: &str) -> DialogueResponse {
    DialogueResponse {
        dialogue: format!("{name} listens but offers no response this round."),
        opinion_delta: 0,
        reasoning: None,
    }
}

/// Call the oracle, replacing failures and blank lines with the fallback.
pub fn respond_or_fallback(
    oracle: &dyn DialogueOracle,
    request: &DialogueRequest<'_>,
) -> DialogueResponse {
    let name = &request.participant.name;
    match oracle.respond(request) {
        Ok(response) if !response.dialogue.trim().is_empty() => response,
        Ok(_) => {
            warn!(participant = %request.participant.id, "oracle returned an empty line, using fallback");
            fallback_response(name)
        }
        Err(err) => {
            warn!(participant = %request.participant.id, error = %err, "oracle failed, using fallback");
            fallback_response(name)
        }
    }
}

/// Offline oracle with fixed deltas and persona-flavoured canned lines.
#[derive(Clone, Debug, Default)]
pub struct ScriptedOracle {
    delta: i32,
    role_deltas: BTreeMap<RoleId, i32>,
}

impl ScriptedOracle {
    pub fn new(delta: i32) -> Self {
        Self {
            delta,
            role_deltas: BTreeMap::new(),
        }
    }

    /// Override the delta for every participant of `role`.
    pub fn with_role_delta(mut self, role: RoleId, delta: i32) -> Self {
        self.role_deltas.insert(role, delta);
        self
    }
}

impl DialogueOracle for ScriptedOracle {
    fn respond(&self, request: &DialogueRequest<'_>) -> Result<DialogueResponse, OracleError> {
        let p = request.participant;
        let delta = self.role_deltas.get(&p.role).copied().unwrap_or(self.delta);
        let opener = match p.persona.as_ref().map(|persona| persona.style.as_str()) {
            Some("street") => "Listen, mate.",
            Some("academic") => "Consider the wider implications.",
            Some("corporate") => "From a deliverability standpoint,",
            Some("nimby") => "There is a clear precedent here.",
            Some("activist") => "This is about justice for the community!",
            _ => "I have heard you.",
        };
        let worry = p
            .persona
            .as_ref()
            .map(|persona| persona.pain_point.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("what this deal means for the neighbourhood");
        let verdict = match delta.signum() {
            1 => "You are moving me in the right direction.",
            -1 => "You are losing me.",
            _ => "I am not persuaded either way yet.",
        };
        Ok(DialogueResponse {
            dialogue: format!("{opener} {verdict} My concern remains: {worry}"),
            opinion_delta: delta,
            reasoning: Some(format!("scripted reply with delta {delta}")),
        })
    }
}
