//! Round orchestration over a caller-owned [`NegotiationState`].

use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sim_ai::{respond_or_fallback, DialogueOracle, DialogueRequest, DialogueResponse};
use sim_core::{
    ConfigurationError, InfluenceActionKind, InvariantViolation, IssueId, NegotiationState,
    Outcome, ParticipantId, RoleId, RoundRecord, Scenario, Score, StateSnapshot, ValidationError,
};
use sim_econ::{EconError, InfluenceReceipt};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::inject_event;
use crate::issues::resolve_issues;
use crate::notify::{RoundNotice, RoundNotifier};
use crate::victory::evaluate;

/// Tokens charged for one statement.
pub const STATEMENT_COST: u32 = 1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoundError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Influence(#[from] EconError),
    /// A step failed mid-round; the caller's state was not touched and the
    /// round may be retried.
    #[error("round aborted: {0}")]
    Aborted(String),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// What changed in one committed round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundReport {
    pub new_round: u32,
    pub climate: Score,
    pub history_delta: RoundRecord,
    pub tokens_remaining: u32,
    pub event_text: Option<String>,
    pub outcome: Option<Outcome>,
    /// Stance change applied to each responding participant.
    pub stance_shifts: BTreeMap<ParticipantId, i32>,
    pub issue_forces: BTreeMap<IssueId, f64>,
}

/// Oracle delta after the bound and the role's response sensitivity,
/// truncated toward zero.
pub fn bounded_opinion_delta(raw: i32, bound: i32, sensitivity: Decimal) -> i32 {
    sim_econ::scale_delta(raw.clamp(-bound, bound), sensitivity, RoundingStrategy::ToZero)
}

/// round(mean x 2) with ties to even, saturating at the i32 range; 0 when
/// nobody responded.
pub fn climate_shift<'a>(deltas: impl IntoIterator<Item = &'a i32>) -> i32 {
    let (sum, count) = deltas
        .into_iter()
        .fold((0i64, 0u64), |(s, c), d| (s + i64::from(*d), c + 1));
    if count == 0 {
        return 0;
    }
    let doubled = Decimal::from(sum) / Decimal::from(count) * Decimal::from(2);
    doubled
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .to_i32()
        .unwrap_or(if doubled.is_sign_negative() { i32::MIN } else { i32::MAX })
}

/// Drives negotiations for one scenario. Holds no per-session state, so one
/// engine can serve many sessions.
pub struct RoundEngine {
    scenario: Arc<Scenario>,
    oracle: Arc<dyn DialogueOracle>,
    notifier: Option<Arc<dyn RoundNotifier>>,
}

impl RoundEngine {
    pub fn new(scenario: Arc<Scenario>, oracle: Arc<dyn DialogueOracle>) -> Self {
        Self {
            scenario,
            oracle,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn RoundNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn new_session(
        &self,
        human_role: &RoleId,
        seed: u64,
    ) -> Result<NegotiationState, ConfigurationError> {
        crate::new_session(&self.scenario, human_role, seed)
    }

    pub fn snapshot<'a>(&self, state: &'a NegotiationState) -> StateSnapshot<'a> {
        state.snapshot()
    }

    /// Play one round with the human's statement. On any error the state is
    /// left exactly as it was.
    pub fn submit_statement(
        &self,
        state: &mut NegotiationState,
        text: &str,
    ) -> Result<RoundReport, RoundError> {
        self.validate_statement(state, text)?;
        let mut work = state.clone();
        let report = match self.run_round(&mut work, text) {
            Ok(report) => report,
            Err(err) => {
                warn!(round = state.round(), error = %err, "round rolled back");
                return Err(err);
            }
        };
        *state = work;
        info!(
            round = report.new_round,
            climate = %report.climate,
            tokens = report.tokens_remaining,
            "round committed"
        );
        self.notify(state);
        Ok(report)
    }

    /// End the negotiation now. Charges nothing.
    pub fn forfeit(&self, state: &mut NegotiationState) -> Result<Outcome, RoundError> {
        if state.is_terminated() {
            return Err(ValidationError::SessionClosed.into());
        }
        let round = state.round();
        let outcome = state.conclude(Outcome::Forfeited { round }).clone();
        info!(round, "negotiation forfeited");
        self.notify(state);
        Ok(outcome)
    }

    /// Price of an influence action against `target` right now.
    pub fn quote(
        &self,
        state: &NegotiationState,
        kind: InfluenceActionKind,
        target: &ParticipantId,
    ) -> Result<u32, RoundError> {
        let p = state
            .registry
            .get(target)
            .ok_or_else(|| EconError::UnknownTarget(target.clone()))?;
        Ok(sim_econ::quote(&self.scenario, &state.ledger, kind, &p.role)?)
    }

    /// Spend tokens on a directed action. Rejections mutate nothing.
    pub fn apply_influence_action(
        &self,
        state: &mut NegotiationState,
        kind: InfluenceActionKind,
        target: &ParticipantId,
    ) -> Result<InfluenceReceipt, RoundError> {
        if state.is_terminated() {
            return Err(ValidationError::SessionClosed.into());
        }
        let receipt = sim_econ::apply_action(
            &self.scenario,
            &mut state.registry,
            &mut state.ledger,
            kind,
            target,
            &mut state.rng,
        )?;
        Ok(receipt)
    }

    fn validate_statement(&self, state: &NegotiationState, text: &str) -> Result<(), RoundError> {
        if state.is_terminated() {
            return Err(ValidationError::SessionClosed.into());
        }
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyStatement.into());
        }
        let words = text.split_whitespace().count();
        let minimum = self.scenario.rules.min_statement_words;
        if words < minimum {
            return Err(ValidationError::StatementTooShort { words, minimum }.into());
        }
        let available = state
            .registry
            .human()
            .ok_or(InvariantViolation::HumanCount(0))?
            .tokens();
        if available < STATEMENT_COST {
            return Err(ValidationError::InsufficientTokens {
                required: STATEMENT_COST,
                available,
            }
            .into());
        }
        Ok(())
    }

    fn run_round(
        &self,
        work: &mut NegotiationState,
        statement: &str,
    ) -> Result<RoundReport, RoundError> {
        let scenario: &Scenario = &self.scenario;
        let rules = &scenario.rules;
        let round = work.round();

        let human = work
            .registry
            .human_mut()
            .ok_or(InvariantViolation::HumanCount(0))?;
        human.spend_tokens(STATEMENT_COST)?;
        let human_id = human.id.clone();

        for p in work.registry.iter_mut() {
            if !p.is_human {
                p.previous_stance = p.stance_category();
            }
            p.skipped_this_round = false;
        }

        let event = inject_event(
            scenario,
            round,
            &mut work.registry,
            &mut work.climate,
            &mut work.rng,
        );

        let responses = self.consult_oracle(scenario, work, statement);
        let mut statements = BTreeMap::from([(human_id, statement.to_string())]);
        let mut stance_shifts = BTreeMap::new();
        let mut opinion_deltas = Vec::with_capacity(responses.len());
        for (id, response) in responses {
            let p = work
                .registry
                .get_mut(&id)
                .ok_or_else(|| RoundError::Aborted(format!("participant `{id}` disappeared")))?;
            let sensitivity = scenario
                .role(&p.role)
                .map(|r| r.response_sensitivity)
                .ok_or_else(|| RoundError::Aborted(format!("role `{}` is not configured", p.role)))?;
            let delta = bounded_opinion_delta(response.opinion_delta, rules.oracle_delta_bound, sensitivity);
            opinion_deltas.push(delta);
            let before = p.stance;
            p.stance = before.shifted(delta);
            stance_shifts.insert(id.clone(), p.stance.get() - before.get());
            statements.insert(id, response.dialogue);
        }

        let record = RoundRecord {
            round,
            statements,
            event: event.as_ref().map(|e| e.id.clone()),
        };
        work.record_round(record.clone());

        let resolution = resolve_issues(work.registry.participants(), scenario, &work.issues)
            .map_err(|e| RoundError::Aborted(e.to_string()))?;
        for (issue, force) in &resolution.forces {
            debug!(issue = %issue, force, value = ?resolution.issues.get(issue), "issue force");
        }
        work.issues = resolution.issues;

        // Scaled deltas, before the stance clamp.
        let shift = climate_shift(&opinion_deltas);
        work.climate = work.climate.shifted(shift);
        debug!(shift, climate = %work.climate, "climate updated");

        let new_round = work.advance_round();
        let outcome = if new_round > rules.max_rounds {
            let outcome = evaluate(scenario, work);
            info!(outcome = %outcome, "negotiation concluded");
            Some(work.conclude(outcome).clone())
        } else {
            sim_econ::regenerate_tokens(rules, &mut work.registry, &mut work.ledger);
            None
        };

        work.check_invariants()?;
        let tokens_remaining = work.registry.human().map_or(0, |h| h.tokens());
        Ok(RoundReport {
            new_round,
            climate: work.climate,
            history_delta: record,
            tokens_remaining,
            event_text: event.map(|e| e.text),
            outcome,
            stance_shifts,
            issue_forces: resolution.forces,
        })
    }

    /// Ask every active synthetic participant for a reply, in parallel.
    /// Results come back in registry order.
    fn consult_oracle(
        &self,
        scenario: &Scenario,
        state: &NegotiationState,
        statement: &str,
    ) -> Vec<(ParticipantId, DialogueResponse)> {
        let oracle: &dyn DialogueOracle = self.oracle.as_ref();
        state
            .registry
            .participants()
            .par_iter()
            .filter(|p| !p.is_human && !p.skipped_this_round)
            .map(|p| {
                let request = DialogueRequest {
                    scenario,
                    participant: p,
                    registry: &state.registry,
                    history: state.history(),
                    statement,
                    climate: state.climate,
                    issues: &state.issues,
                };
                (p.id.clone(), respond_or_fallback(oracle, &request))
            })
            .collect()
    }

    fn notify(&self, state: &NegotiationState) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(RoundNotice::from_state(state));
        }
    }
}
