//! Random disruptive events injected at the start of a round.

use rand::seq::SliceRandom;
use rand::Rng;
use sim_core::{CharacterRegistry, EventTarget, ParticipantId, Scenario, Score};
use tracing::{debug, info};

/// An event that fired this round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InjectedEvent {
    pub id: String,
    /// Display text, "Round <n>: <text>".
    pub text: String,
    /// Participants whose stance (or skip flag) the event touched.
    pub affected: Vec<ParticipantId>,
}

/// One Bernoulli trial at the scenario's event probability; on success a
/// uniformly chosen event is applied to the climate and its targets.
pub fn inject_event<R: Rng + ?Sized>(
    scenario: &Scenario,
    round: u32,
    registry: &mut CharacterRegistry,
    climate: &mut Score,
    rng: &mut R,
) -> Option<InjectedEvent> {
    if scenario.events.is_empty() || !rng.gen_bool(scenario.rules.event_probability) {
        return None;
    }
    let event = scenario.events.choose(rng)?;
    *climate = climate.shifted(event.climate_delta);

    let mut affected = Vec::new();
    match &event.target {
        EventTarget::All => {
            for p in registry.iter_mut() {
                p.stance = p.stance.shifted(event.stance_delta);
                affected.push(p.id.clone());
            }
        }
        EventTarget::Role { role } => {
            for p in registry.iter_mut().filter(|p| &p.role == role) {
                p.stance = p.stance.shifted(event.stance_delta);
                affected.push(p.id.clone());
            }
        }
        EventTarget::RoleSpecific { role, skip_round } => {
            let eligible: Vec<ParticipantId> = registry
                .with_role(role)
                .filter(|p| !p.skipped_this_round)
                .map(|p| p.id.clone())
                .collect();
            match eligible.choose(rng).and_then(|id| registry.get_mut(id)) {
                Some(p) => {
                    p.stance = p.stance.shifted(event.stance_delta);
                    if *skip_round {
                        p.skipped_this_round = true;
                    }
                    affected.push(p.id.clone());
                }
                None => debug!(event = %event.id, role = %role, "no eligible participant"),
            }
        }
    }
    info!(
        event = %event.id,
        round,
        climate = %climate,
        affected = affected.len(),
        "event fired"
    );
    Some(InjectedEvent {
        id: event.id.clone(),
        text: format!("Round {round}: {}", event.text),
        affected,
    })
}
