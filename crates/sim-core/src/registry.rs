use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    ConfigurationError, InvariantViolation, Participant, ParticipantId, RoleId, Scenario, Score,
    StanceCategory,
};

/// Id given to the human participant.
pub const HUMAN_ID: &str = "player_0";

/// All participants of a session, in creation order (human first).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRegistry {
    participants: Vec<Participant>,
}

impl CharacterRegistry {
    /// Create the human plus `multiplier` synthetic participants for every
    /// other role, visiting roles in id order.
    pub fn build<R: Rng + ?Sized>(
        scenario: &Scenario,
        human_role: &RoleId,
        rng: &mut R,
    ) -> Result<Self, ConfigurationError> {
        let human_def = scenario
            .role(human_role)
            .ok_or_else(|| ConfigurationError::MissingRole(human_role.clone()))?;
        let human_tokens = human_def.player_tokens.unwrap_or(human_def.initial_tokens);
        let mut participants = vec![Participant::human(
            ParticipantId::from(HUMAN_ID),
            "You",
            human_role.clone(),
        )
        .with_tokens(human_tokens, scenario.rules.human_max_tokens)
        .with_weight(human_def.influence_weight)];

        let mut names = NamePool::new(&scenario.names);
        let mut next_id = 0usize;
        for (role_id, role) in &scenario.roles {
            if role_id == human_role {
                continue;
            }
            let categories: Vec<(StanceCategory, u32)> = role
                .stance_distribution
                .iter()
                .map(|(c, w)| (*c, *w))
                .collect();
            let dist = WeightedIndex::new(categories.iter().map(|(_, w)| *w))
                .map_err(|_| ConfigurationError::EmptyDistribution(role_id.clone()))?;
            let max_tokens = role.synthetic_max_tokens(scenario.rules.synthetic_token_cap);
            for _ in 0..role.multiplier {
                let category = categories[dist.sample(rng)].0;
                let name = names.draw(rng, &role.name, next_id);
                let participant = Participant::synthetic(
                    ParticipantId(format!("ai_{next_id}")),
                    name,
                    role_id.clone(),
                    category.initial_score(),
                )
                .with_tokens(role.initial_tokens, max_tokens)
                .with_trust(Score::new(role.initial_trust))
                .with_weight(role.influence_weight);
                debug!(
                    id = %participant.id,
                    role = %role_id,
                    stance = %category,
                    "synthetic participant created"
                );
                participants.push(participant);
                next_id += 1;
            }
        }
        Ok(Self { participants })
    }

    /// Wrap an explicit participant list, e.g. one assembled in a test.
    pub fn from_participants(participants: Vec<Participant>) -> Result<Self, InvariantViolation> {
        let registry = Self { participants };
        registry.check_invariants()?;
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Participant> {
        self.participants.iter_mut()
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    pub fn get_mut(&mut self, id: &ParticipantId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| &p.id == id)
    }

    pub fn human(&self) -> Option<&Participant> {
        self.participants.iter().find(|p| p.is_human)
    }

    pub fn human_mut(&mut self) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.is_human)
    }

    pub fn synthetic(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| !p.is_human)
    }

    pub fn with_role<'a>(&'a self, role: &'a RoleId) -> impl Iterator<Item = &'a Participant> {
        self.participants.iter().filter(move |p| &p.role == role)
    }

    /// Exactly one human and every balance within its ceiling.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let humans = self.participants.iter().filter(|p| p.is_human).count();
        if humans != 1 {
            return Err(InvariantViolation::HumanCount(humans));
        }
        self.participants
            .iter()
            .try_for_each(Participant::check_invariants)
    }
}

/// Names handed out without replacement; falls back to "<Role> <n>".
struct NamePool {
    remaining: Vec<String>,
}

impl NamePool {
    fn new(names: &[String]) -> Self {
        Self {
            remaining: names.to_vec(),
        }
    }

    fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R, role_name: &str, ordinal: usize) -> String {
        if self.remaining.is_empty() {
            return format!("{role_name} {}", ordinal + 1);
        }
        let i = rng.gen_range(0..self.remaining.len());
        self.remaining.swap_remove(i)
    }
}
