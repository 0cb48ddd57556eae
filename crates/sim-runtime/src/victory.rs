//! End-of-negotiation rule evaluation. First matching rule wins.

use sim_core::{
    Issues, NegotiationState, Outcome, Participant, PartyRule, RoleId, Scenario, Score,
    StanceCategory,
};

/// Category of the mean stance of everyone holding `role`, rounded half away
/// from zero. `None` when nobody holds the role.
pub fn role_category(participants: &[Participant], role: &RoleId) -> Option<StanceCategory> {
    let (sum, count) = participants
        .iter()
        .filter(|p| &p.role == role)
        .fold((0i64, 0i64), |(s, c), p| (s + i64::from(p.stance.get()), c + 1));
    if count == 0 {
        return None;
    }
    let mean = (sum as f64 / count as f64).round() as i32;
    Some(StanceCategory::from_score(Score::new(mean)))
}

/// Human-readable rendering of the final deal.
pub fn describe_deal(scenario: &Scenario, issues: &Issues) -> String {
    let parts: Vec<String> = scenario
        .issues
        .iter()
        .filter_map(|(id, def)| issues.get(id).map(|v| format!("{} {v}", def.label)))
        .collect();
    if parts.is_empty() {
        "no terms agreed".to_string()
    } else {
        parts.join(", ")
    }
}

fn party_wins(rule: &PartyRule, participants: &[Participant], issues: &Issues) -> bool {
    rule.conditions.iter().all(|c| c.holds(issues))
        && role_category(participants, &rule.supporter_role) == Some(StanceCategory::Support)
}

/// Classify the final state.
pub fn evaluate(scenario: &Scenario, state: &NegotiationState) -> Outcome {
    let rules = &scenario.victory;
    let participants = state.registry.participants();
    let (climate, issues) = (state.climate, &state.issues);
    if climate.get() <= scenario.rules.critical_climate {
        return Outcome::CriticalClimateFailure { climate };
    }
    if role_category(participants, &rules.approval_role) == Some(StanceCategory::Oppose) {
        return Outcome::Vetoed {
            role: rules.approval_role.clone(),
        };
    }

    let compliance = &rules.compliance;
    let floor = match &compliance.raised_by {
        Some(raise) if state.event_occurred(&raise.event) => raise.floor,
        _ => compliance.floor,
    };
    let share = issues
        .get(&compliance.issue)
        .and_then(|v| v.as_percent())
        .unwrap_or(0);
    if share < floor {
        return Outcome::ComplianceFailure { share, floor };
    }

    let deal = describe_deal(scenario, issues);
    if party_wins(&rules.favorable, participants, issues) {
        return Outcome::FavorableVictory {
            label: rules.favorable.label.clone(),
            deal,
        };
    }
    if party_wins(&rules.opposing, participants, issues) {
        return Outcome::OpposingVictory {
            label: rules.opposing.label.clone(),
            deal,
        };
    }
    Outcome::Compromise { deal }
}
