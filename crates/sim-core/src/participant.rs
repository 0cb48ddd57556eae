use serde::{Deserialize, Serialize};
use std::fmt;

use crate::InvariantViolation;

/// Stable identifier of a participant for the whole session.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        ParticipantId(value.to_string())
    }
}

/// Scenario role identifier, e.g. "developer" or "council_planner".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub String);

impl RoleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleId {
    fn from(value: &str) -> Self {
        RoleId(value.to_string())
    }
}

/// Integer score in [0, 100]. Every constructor and mutation clamps, so a
/// `Score` can never leave its range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub struct Score(u8);

impl Score {
    pub const MIN: Score = Score(0);
    pub const MAX: Score = Score(100);
    pub const NEUTRAL: Score = Score(50);

    /// Build a score, clamping into [0, 100].
    pub fn new(value: i32) -> Self {
        Score(value.clamp(0, 100) as u8)
    }

    pub fn get(self) -> i32 {
        i32::from(self.0)
    }

    /// Score moved by `delta`, clamped.
    pub fn shifted(self, delta: i32) -> Self {
        Score::new(self.get().saturating_add(delta))
    }

    /// Position on [-1, 1] with 50 mapping to 0.
    pub fn normalized(self) -> f64 {
        f64::from(self.get() - 50) / 50.0
    }
}

impl Default for Score {
    fn default() -> Self {
        Score::NEUTRAL
    }
}

impl From<i32> for Score {
    fn from(value: i32) -> Self {
        Score::new(value)
    }
}

impl From<Score> for i32 {
    fn from(value: Score) -> Self {
        value.get()
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Three-way reading of a stance score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StanceCategory {
    Oppose,
    Neutral,
    Support,
}

impl StanceCategory {
    /// Highest score still read as Oppose.
    pub const OPPOSE_MAX: i32 = 39;
    /// Lowest score read as Support.
    pub const SUPPORT_MIN: i32 = 61;

    pub fn from_score(score: Score) -> Self {
        match score.get() {
            s if s <= Self::OPPOSE_MAX => StanceCategory::Oppose,
            s if s >= Self::SUPPORT_MIN => StanceCategory::Support,
            _ => StanceCategory::Neutral,
        }
    }

    /// Score a synthetic participant starts with after sampling this category.
    pub fn initial_score(self) -> Score {
        match self {
            StanceCategory::Support => Score::new(75),
            StanceCategory::Neutral => Score::new(50),
            StanceCategory::Oppose => Score::new(25),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StanceCategory::Oppose => "Oppose",
            StanceCategory::Neutral => "Neutral",
            StanceCategory::Support => "Support",
        }
    }
}

impl fmt::Display for StanceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Character profile consumed by the dialogue oracle. The engine never reads
/// these fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// One-line label, e.g. "Developer (corporate, Career Peak (40s-50s))".
    pub summary: String,
    /// First-person narrative biography.
    pub bio: String,
    /// Speaking style key ("street", "academic", ...).
    pub style: String,
    pub pain_point: String,
    pub quirk: String,
    /// Negotiation flexibility, 1 (rigid) to 10 (easy).
    pub flexibility: u8,
}

/// A human or synthetic negotiator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub role: RoleId,
    pub is_human: bool,
    pub stance: Score,
    /// Category at the start of the latest round, for delta display only.
    pub previous_stance: StanceCategory,
    pub trust: Score,
    pub polarization: Score,
    tokens: u32,
    max_tokens: u32,
    /// Static aggregation weight; never spent.
    pub influence_weight: u32,
    pub skipped_this_round: bool,
    pub persona: Option<Persona>,
}

impl Participant {
    fn base(id: ParticipantId, name: String, role: RoleId, is_human: bool, stance: Score) -> Self {
        Self {
            id,
            name,
            role,
            is_human,
            stance,
            previous_stance: StanceCategory::from_score(stance),
            trust: Score::NEUTRAL,
            polarization: Score::MIN,
            tokens: 0,
            max_tokens: 0,
            influence_weight: 1,
            skipped_this_round: false,
            persona: None,
        }
    }

    /// The human participant starts neutral.
    pub fn human(id: ParticipantId, name: impl Into<String>, role: RoleId) -> Self {
        Self::base(id, name.into(), role, true, Score::NEUTRAL)
    }

    pub fn synthetic(
        id: ParticipantId,
        name: impl Into<String>,
        role: RoleId,
        stance: Score,
    ) -> Self {
        Self::base(id, name.into(), role, false, stance)
    }

    /// Set the token balance and its ceiling. The balance is capped at `max`.
    pub fn with_tokens(mut self, tokens: u32, max: u32) -> Self {
        self.max_tokens = max;
        self.tokens = tokens.min(max);
        self
    }

    pub fn with_trust(mut self, trust: Score) -> Self {
        self.trust = trust;
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.influence_weight = weight;
        self
    }

    pub fn stance_category(&self) -> StanceCategory {
        StanceCategory::from_score(self.stance)
    }

    pub fn tokens(&self) -> u32 {
        self.tokens
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Debit tokens. Callers check affordability first; an overdraft is a defect.
    pub fn spend_tokens(&mut self, amount: u32) -> Result<u32, InvariantViolation> {
        match self.tokens.checked_sub(amount) {
            Some(left) => {
                self.tokens = left;
                Ok(left)
            }
            None => Err(InvariantViolation::TokenUnderflow {
                participant: self.id.clone(),
                debit: amount,
                balance: self.tokens,
            }),
        }
    }

    /// Credit tokens, saturating at the participant's maximum. Returns the
    /// amount actually gained.
    pub fn regenerate(&mut self, amount: u32) -> u32 {
        let before = self.tokens;
        self.tokens = self.tokens.saturating_add(amount).min(self.max_tokens);
        self.tokens - before
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.tokens > self.max_tokens {
            return Err(InvariantViolation::TokensAboveMaximum {
                participant: self.id.clone(),
                tokens: self.tokens,
                max: self.max_tokens,
            });
        }
        Ok(())
    }
}
