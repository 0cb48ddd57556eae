//! Issue resolution: weighted stances push deal parameters one step at a time.

use sim_core::{IssueId, Issues, Participant, RoleId, Scenario};
use std::collections::BTreeMap;
use thiserror::Error;

/// The state and the scenario disagree about which issues or roles exist.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("role `{role}` prefers issue `{issue}`, which is not on the table")]
    UnknownIssue { role: RoleId, issue: IssueId },
    #[error("participant role `{0}` is not configured")]
    UnknownRole(RoleId),
}

/// New issue values plus the net force that produced them.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub issues: Issues,
    pub forces: BTreeMap<IssueId, f64>,
}

/// Sum normalized stance x preference x weight x (1 + polarization/100) per
/// issue and move each issue one step when its net force leaves the dead band.
pub fn resolve_issues(
    participants: &[Participant],
    scenario: &Scenario,
    current: &Issues,
) -> Result<Resolution, ResolveError> {
    let mut forces: BTreeMap<IssueId, f64> = current.keys().map(|id| (id.clone(), 0.0)).collect();
    for p in participants {
        let role = scenario
            .role(&p.role)
            .ok_or_else(|| ResolveError::UnknownRole(p.role.clone()))?;
        let pull = p.stance.normalized()
            * f64::from(p.influence_weight)
            * (1.0 + f64::from(p.polarization.get()) / 100.0);
        for (issue, preference) in &role.issue_preferences {
            let force = forces
                .get_mut(issue)
                .ok_or_else(|| ResolveError::UnknownIssue {
                    role: p.role.clone(),
                    issue: issue.clone(),
                })?;
            *force += pull * preference;
        }
    }

    let threshold = scenario.rules.issue_force_threshold;
    let issues = current
        .iter()
        .map(|(id, value)| {
            let step = scenario.issues.get(id).map_or(1, |def| def.step);
            let force = forces.get(id).copied().unwrap_or(0.0);
            let next = if force > threshold {
                value.step_up(step)
            } else if force < -threshold {
                value.step_down(step)
            } else {
                *value
            };
            (id.clone(), next)
        })
        .collect();
    Ok(Resolution { issues, forces })
}
