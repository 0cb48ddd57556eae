//! Scenario configuration: rules, role table, action table, event table,
//! issue catalog and victory rules. Read-only once a session starts.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{ConfigurationError, IssueDefinition, IssueId, IssueValue, Issues, RoleId, ScaleLevel, StanceCategory};

/// Canada Water scenario shipped with the engine.
pub const BUILTIN_SCENARIO: &str = include_str!("../data/canada_water.json");

/// Upper bound for every decimal multiplier a scenario may declare.
pub const MAX_MULTIPLIER: u32 = 100;

/// Directed influence actions the human can take against one participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfluenceActionKind {
    #[serde(alias = "gentle")]
    GentlePersuasion,
    #[serde(alias = "pressure")]
    PressureOpponent,
    #[serde(alias = "strong")]
    StrongPersuasion,
    #[serde(alias = "recruit")]
    AllyRecruitment,
}

impl InfluenceActionKind {
    pub const ALL: [InfluenceActionKind; 4] = [
        InfluenceActionKind::GentlePersuasion,
        InfluenceActionKind::PressureOpponent,
        InfluenceActionKind::StrongPersuasion,
        InfluenceActionKind::AllyRecruitment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InfluenceActionKind::GentlePersuasion => "gentle_persuasion",
            InfluenceActionKind::PressureOpponent => "pressure_opponent",
            InfluenceActionKind::StrongPersuasion => "strong_persuasion",
            InfluenceActionKind::AllyRecruitment => "ally_recruitment",
        }
    }

    /// Verb used in logs, e.g. "pressured".
    pub fn verb(self) -> &'static str {
        match self {
            InfluenceActionKind::GentlePersuasion => "gently persuaded",
            InfluenceActionKind::PressureOpponent => "pressured",
            InfluenceActionKind::StrongPersuasion => "strongly persuaded",
            InfluenceActionKind::AllyRecruitment => "tried to recruit",
        }
    }
}

impl fmt::Display for InfluenceActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InfluenceActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gentle_persuasion" | "gentle" => Ok(InfluenceActionKind::GentlePersuasion),
            "pressure_opponent" | "pressure" => Ok(InfluenceActionKind::PressureOpponent),
            "strong_persuasion" | "strong" => Ok(InfluenceActionKind::StrongPersuasion),
            "ally_recruitment" | "recruit" => Ok(InfluenceActionKind::AllyRecruitment),
            other => Err(format!("unknown influence action `{other}`")),
        }
    }
}

/// Cost and declared effect of one influence action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub base_cost: u32,
    pub stance_delta: i32,
    pub trust_delta: i32,
    /// Added when the human's previous action was the same kind.
    #[serde(default)]
    pub repeat_surcharge: u32,
    /// Applied to the target's polarization whether or not a leak happens.
    #[serde(default)]
    pub polarization_delta: i32,
}

fn default_actions() -> BTreeMap<InfluenceActionKind, ActionDefinition> {
    BTreeMap::from([
        (
            InfluenceActionKind::GentlePersuasion,
            ActionDefinition {
                base_cost: 1,
                stance_delta: 5,
                trust_delta: 2,
                repeat_surcharge: 0,
                polarization_delta: -5,
            },
        ),
        (
            InfluenceActionKind::PressureOpponent,
            ActionDefinition {
                base_cost: 2,
                stance_delta: -10,
                trust_delta: -15,
                repeat_surcharge: 2,
                polarization_delta: 10,
            },
        ),
        (
            InfluenceActionKind::StrongPersuasion,
            ActionDefinition {
                base_cost: 3,
                stance_delta: 15,
                trust_delta: 10,
                repeat_surcharge: 0,
                polarization_delta: 0,
            },
        ),
        (
            InfluenceActionKind::AllyRecruitment,
            ActionDefinition {
                base_cost: 4,
                stance_delta: 0,
                trust_delta: 15,
                repeat_surcharge: 0,
                polarization_delta: 0,
            },
        ),
    ])
}

/// Session-wide numeric rules. Every field defaults to the standard game.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    pub max_rounds: u32,
    pub min_statement_words: usize,
    pub event_probability: f64,
    pub initial_climate: i32,
    /// Climate at or below this value fails the negotiation.
    pub critical_climate: i32,
    pub human_max_tokens: u32,
    pub human_regen: u32,
    /// Regeneration while the regen penalty is active.
    pub human_penalized_regen: u32,
    pub synthetic_regen: u32,
    /// Synthetic maximum = floor(initial allotment x this factor).
    pub synthetic_token_cap: Decimal,
    pub base_leak_chance: f64,
    /// Stance lost by every bystander when pressure leaks.
    pub leak_stance_penalty: i32,
    pub issue_force_threshold: f64,
    /// Oracle deltas are clamped to +/- this bound.
    pub oracle_delta_bound: i32,
    /// How many past actions the influence ledger keeps.
    pub action_history_window: usize,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            max_rounds: 8,
            min_statement_words: 15,
            event_probability: 0.25,
            initial_climate: 50,
            critical_climate: 20,
            human_max_tokens: 12,
            human_regen: 2,
            human_penalized_regen: 1,
            synthetic_regen: 1,
            synthetic_token_cap: Decimal::new(15, 1),
            base_leak_chance: 0.40,
            leak_stance_penalty: 4,
            issue_force_threshold: 5.0,
            oracle_delta_bound: 10,
            action_history_window: 5,
        }
    }
}

/// One stakeholder role in the scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub name: String,
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub description: String,
    /// Relative weights for the initial stance draw.
    pub stance_distribution: BTreeMap<StanceCategory, u32>,
    pub initial_tokens: u32,
    /// Starting tokens when the human plays this role.
    #[serde(default)]
    pub player_tokens: Option<u32>,
    /// Synthetic participants created for this role.
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
    #[serde(default = "default_influence_weight")]
    pub influence_weight: u32,
    #[serde(default = "default_trust")]
    pub initial_trust: i32,
    /// Per-issue pull of this role's stance.
    #[serde(default)]
    pub issue_preferences: BTreeMap<IssueId, f64>,
    #[serde(default)]
    pub sensitivities: BTreeMap<InfluenceActionKind, Decimal>,
    #[serde(default)]
    pub token_modifiers: BTreeMap<InfluenceActionKind, Decimal>,
    /// Scales the base leak chance of pressure against this role.
    #[serde(default = "decimal_one")]
    pub polarization_modifier: Decimal,
    /// Scales oracle opinion deltas for this role.
    #[serde(default = "decimal_one")]
    pub response_sensitivity: Decimal,
}

fn default_multiplier() -> u32 {
    1
}

fn default_influence_weight() -> u32 {
    2
}

fn default_trust() -> i32 {
    50
}

fn decimal_one() -> Decimal {
    Decimal::ONE
}

impl RoleDefinition {
    pub fn sensitivity(&self, kind: InfluenceActionKind) -> Decimal {
        self.sensitivities.get(&kind).copied().unwrap_or(Decimal::ONE)
    }

    pub fn token_modifier(&self, kind: InfluenceActionKind) -> Decimal {
        self.token_modifiers.get(&kind).copied().unwrap_or(Decimal::ONE)
    }

    /// Token ceiling of a synthetic participant of this role.
    pub fn synthetic_max_tokens(&self, cap: Decimal) -> u32 {
        (Decimal::from(self.initial_tokens) * cap)
            .floor()
            .to_u32()
            .unwrap_or(self.initial_tokens)
    }
}

/// Which participants a scenario event touches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EventTarget {
    All,
    Role {
        role: RoleId,
    },
    /// Exactly one not-yet-skipped participant of the role.
    RoleSpecific {
        role: RoleId,
        #[serde(default)]
        skip_round: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub id: String,
    pub text: String,
    pub target: EventTarget,
    #[serde(default)]
    pub stance_delta: i32,
    #[serde(default)]
    pub climate_delta: i32,
}

/// Comparison against a single issue value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "test", rename_all = "snake_case")]
pub enum IssueCondition {
    Below { issue: IssueId, value: u8 },
    AtLeast { issue: IssueId, value: u8 },
    OneOf { issue: IssueId, levels: Vec<ScaleLevel> },
}

impl IssueCondition {
    pub fn issue(&self) -> &IssueId {
        match self {
            IssueCondition::Below { issue, .. }
            | IssueCondition::AtLeast { issue, .. }
            | IssueCondition::OneOf { issue, .. } => issue,
        }
    }

    /// Missing issues and mismatched value kinds never satisfy a condition.
    pub fn holds(&self, issues: &Issues) -> bool {
        let Some(value) = issues.get(self.issue()).copied() else {
            return false;
        };
        match self {
            IssueCondition::Below { value: bound, .. } => {
                value.as_percent().is_some_and(|p| p < *bound)
            }
            IssueCondition::AtLeast { value: bound, .. } => {
                value.as_percent().is_some_and(|p| p >= *bound)
            }
            IssueCondition::OneOf { levels, .. } => {
                value.as_scale().is_some_and(|l| levels.contains(&l))
            }
        }
    }
}

/// A party's victory: every issue condition plus the supporter role's backing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRule {
    pub label: String,
    pub supporter_role: RoleId,
    #[serde(default)]
    pub conditions: Vec<IssueCondition>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorRaise {
    /// Event id whose occurrence in history raises the floor.
    pub event: String,
    pub floor: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceRule {
    pub issue: IssueId,
    pub floor: u8,
    #[serde(default)]
    pub raised_by: Option<FloorRaise>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VictoryRules {
    /// Role whose opposition vetoes the plan.
    pub approval_role: RoleId,
    pub compliance: ComplianceRule,
    pub favorable: PartyRule,
    pub opposing: PartyRule,
}

/// Complete static configuration of a negotiation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub rules: Rules,
    pub roles: BTreeMap<RoleId, RoleDefinition>,
    #[serde(default = "default_actions")]
    pub actions: BTreeMap<InfluenceActionKind, ActionDefinition>,
    #[serde(default)]
    pub events: Vec<EventDefinition>,
    pub issues: BTreeMap<IssueId, IssueDefinition>,
    pub victory: VictoryRules,
    /// Pool of names handed to synthetic participants.
    #[serde(default)]
    pub names: Vec<String>,
}

impl Scenario {
    /// The embedded Canada Water scenario.
    pub fn builtin() -> Result<Self, ConfigurationError> {
        Self::from_json_str(BUILTIN_SCENARIO)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigurationError> {
        let scenario: Scenario =
            serde_json::from_str(text).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigurationError> {
        let scenario: Scenario =
            serde_yaml::from_str(text).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn role(&self, id: &RoleId) -> Option<&RoleDefinition> {
        self.roles.get(id)
    }

    pub fn action(&self, kind: InfluenceActionKind) -> Option<&ActionDefinition> {
        self.actions.get(&kind)
    }

    /// Initial deal taken from the issue catalog.
    pub fn initial_issues(&self) -> Issues {
        self.issues
            .iter()
            .map(|(id, def)| (id.clone(), def.initial))
            .collect()
    }

    /// Check cross references and numeric ranges.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.validate_rules()?;
        if self.roles.is_empty() {
            return Err(ConfigurationError::InvalidRule(
                "scenario defines no roles".to_string(),
            ));
        }
        for (id, def) in &self.issues {
            if let IssueValue::Percent(p) = def.initial {
                if p > 100 {
                    return Err(ConfigurationError::InvalidRule(format!(
                        "issue `{id}` starts at {p}%, above 100"
                    )));
                }
            }
        }
        for (id, role) in &self.roles {
            if role.stance_distribution.values().all(|w| *w == 0) {
                return Err(ConfigurationError::EmptyDistribution(id.clone()));
            }
            if role
                .stance_distribution
                .values()
                .try_fold(0u32, |total, w| total.checked_add(*w))
                .is_none()
            {
                return Err(ConfigurationError::InvalidRule(format!(
                    "role `{id}` stance weights overflow u32"
                )));
            }
            check_multiplier(|| format!("role `{id}` polarization_modifier"), role.polarization_modifier)?;
            check_multiplier(|| format!("role `{id}` response_sensitivity"), role.response_sensitivity)?;
            for (kind, value) in &role.sensitivities {
                check_multiplier(|| format!("role `{id}` sensitivity for {kind}"), *value)?;
            }
            for (kind, value) in &role.token_modifiers {
                check_multiplier(|| format!("role `{id}` token modifier for {kind}"), *value)?;
            }
            for issue in role.issue_preferences.keys() {
                self.require_issue(issue, || format!("role `{id}`"))?;
            }
        }
        for kind in InfluenceActionKind::ALL {
            if !self.actions.contains_key(&kind) {
                return Err(ConfigurationError::MissingAction(kind));
            }
        }
        for event in &self.events {
            match &event.target {
                EventTarget::All => {}
                EventTarget::Role { role } | EventTarget::RoleSpecific { role, .. } => {
                    if !self.roles.contains_key(role) {
                        return Err(ConfigurationError::UnknownEventRole {
                            event: event.id.clone(),
                            role: role.clone(),
                        });
                    }
                }
            }
        }
        self.validate_victory()
    }

    fn validate_rules(&self) -> Result<(), ConfigurationError> {
        let r = &self.rules;
        if r.max_rounds == 0 {
            return Err(ConfigurationError::InvalidRule(
                "max_rounds must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("event_probability", r.event_probability),
            ("base_leak_chance", r.base_leak_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigurationError::ProbabilityOutOfRange { name, value });
            }
        }
        if !r.issue_force_threshold.is_finite() || r.issue_force_threshold < 0.0 {
            return Err(ConfigurationError::InvalidRule(
                "issue_force_threshold must be finite and >= 0".to_string(),
            ));
        }
        if r.oracle_delta_bound < 0 {
            return Err(ConfigurationError::InvalidRule(
                "oracle_delta_bound must be >= 0".to_string(),
            ));
        }
        if r.synthetic_token_cap < Decimal::ONE {
            return Err(ConfigurationError::InvalidRule(
                "synthetic_token_cap must be >= 1".to_string(),
            ));
        }
        check_multiplier(|| "synthetic_token_cap".to_string(), r.synthetic_token_cap)?;
        Ok(())
    }

    fn validate_victory(&self) -> Result<(), ConfigurationError> {
        let v = &self.victory;
        for role in [
            &v.approval_role,
            &v.favorable.supporter_role,
            &v.opposing.supporter_role,
        ] {
            if !self.roles.contains_key(role) {
                return Err(ConfigurationError::MissingRole(role.clone()));
            }
        }
        let compliance = self.require_issue(&v.compliance.issue, || "compliance rule".to_string())?;
        if compliance.initial.as_percent().is_none() {
            return Err(ConfigurationError::ComplianceIssueNotPercent(
                v.compliance.issue.clone(),
            ));
        }
        for rule in [&v.favorable, &v.opposing] {
            for cond in &rule.conditions {
                self.require_issue(cond.issue(), || format!("victory rule `{}`", rule.label))?;
            }
        }
        Ok(())
    }

    fn require_issue(
        &self,
        issue: &IssueId,
        context: impl FnOnce() -> String,
    ) -> Result<&IssueDefinition, ConfigurationError> {
        self.issues
            .get(issue)
            .ok_or_else(|| ConfigurationError::UnknownIssue {
                context: context(),
                issue: issue.clone(),
            })
    }
}

/// Multipliers must lie in [0, MAX_MULTIPLIER] so every product with a token
/// count or a delta stays representable.
fn check_multiplier(name: impl FnOnce() -> String, value: Decimal) -> Result<(), ConfigurationError> {
    if value < Decimal::ZERO || value > Decimal::from(MAX_MULTIPLIER) {
        return Err(ConfigurationError::InvalidRule(format!(
            "{} = {value} is outside [0, {MAX_MULTIPLIER}]",
            name()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_scenario_is_valid() {
        let s = Scenario::builtin().unwrap();
        assert_eq!(s.rules.max_rounds, 8);
        assert_eq!(s.rules.min_statement_words, 15);
        assert_eq!(s.roles.len(), 7);
        assert!(s.role(&RoleId::from("council_planner")).is_some());
        assert_eq!(
            s.initial_issues().get(&IssueId::from("affordable_share")),
            Some(&IssueValue::Percent(35))
        );
    }

    #[test]
    fn short_action_keys_are_accepted() {
        let m: BTreeMap<InfluenceActionKind, Decimal> =
            serde_json::from_str(r#"{"pressure": 1.5, "gentle_persuasion": 1}"#).unwrap();
        assert_eq!(m[&InfluenceActionKind::PressureOpponent], Decimal::new(15, 1));
        assert_eq!(m[&InfluenceActionKind::GentlePersuasion], Decimal::ONE);
    }

    #[test]
    fn synthetic_cap_floors() {
        let mut s = Scenario::builtin().unwrap();
        let role = s.roles.get_mut(&RoleId::from("developer")).unwrap();
        role.initial_tokens = 5;
        assert_eq!(role.synthetic_max_tokens(Decimal::new(15, 1)), 7);
    }

    #[test]
    fn unknown_event_role_is_rejected() {
        let mut s = Scenario::builtin().unwrap();
        s.events.push(EventDefinition {
            id: "ghost".into(),
            text: "nobody".into(),
            target: EventTarget::Role {
                role: RoleId::from("mayor"),
            },
            stance_delta: 0,
            climate_delta: 0,
        });
        assert!(matches!(
            s.validate(),
            Err(ConfigurationError::UnknownEventRole { .. })
        ));
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        let mut s = Scenario::builtin().unwrap();
        s.rules.event_probability = 1.5;
        assert!(matches!(
            s.validate(),
            Err(ConfigurationError::ProbabilityOutOfRange { name: "event_probability", .. })
        ));
    }

    #[test]
    fn preference_for_unknown_issue_is_rejected() {
        let mut s = Scenario::builtin().unwrap();
        s.roles
            .get_mut(&RoleId::from("developer"))
            .unwrap()
            .issue_preferences
            .insert(IssueId::from("parking"), 1.0);
        assert!(matches!(
            s.validate(),
            Err(ConfigurationError::UnknownIssue { .. })
        ));
    }

    #[test]
    fn oversized_multipliers_are_rejected() {
        let mut s = Scenario::builtin().unwrap();
        s.roles
            .get_mut(&RoleId::from("developer"))
            .unwrap()
            .token_modifiers
            .insert(InfluenceActionKind::PressureOpponent, Decimal::MAX);
        assert!(matches!(s.validate(), Err(ConfigurationError::InvalidRule(msg)) if msg.contains("token modifier")));

        let mut s = Scenario::builtin().unwrap();
        s.roles
            .get_mut(&RoleId::from("community_activist"))
            .unwrap()
            .response_sensitivity = Decimal::from(101);
        assert!(matches!(s.validate(), Err(ConfigurationError::InvalidRule(msg)) if msg.contains("response_sensitivity")));

        let mut s = Scenario::builtin().unwrap();
        s.roles
            .get_mut(&RoleId::from("council_planner"))
            .unwrap()
            .sensitivities
            .insert(InfluenceActionKind::GentlePersuasion, Decimal::NEGATIVE_ONE);
        assert!(matches!(s.validate(), Err(ConfigurationError::InvalidRule(_))));

        let mut s = Scenario::builtin().unwrap();
        s.roles
            .get_mut(&RoleId::from("resident_social"))
            .unwrap()
            .sensitivities
            .insert(InfluenceActionKind::GentlePersuasion, Decimal::from(MAX_MULTIPLIER));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn overflowing_stance_weights_are_rejected() {
        let mut s = Scenario::builtin().unwrap();
        s.roles
            .get_mut(&RoleId::from("potential_buyer"))
            .unwrap()
            .stance_distribution = BTreeMap::from([
            (StanceCategory::Support, u32::MAX),
            (StanceCategory::Oppose, 1),
        ]);
        assert!(matches!(s.validate(), Err(ConfigurationError::InvalidRule(msg)) if msg.contains("overflow")));
    }

    #[test]
    fn compliance_issue_must_be_percent() {
        let mut s = Scenario::builtin().unwrap();
        s.victory.compliance.issue = IssueId::from("cultural_venue_scale");
        assert!(matches!(
            s.validate(),
            Err(ConfigurationError::ComplianceIssueNotPercent(_))
        ));
    }

    #[test]
    fn yaml_scenario_loads_with_rule_defaults() {
        let yaml = r#"
name: Tiny
roles:
  developer:
    name: Developer
    stance_distribution: { Support: 1 }
    initial_tokens: 4
  council_planner:
    name: Council Planner
    stance_distribution: { Neutral: 1 }
    initial_tokens: 5
issues:
  affordable_share:
    label: Affordable share
    initial: !percent 35
victory:
  approval_role: council_planner
  compliance: { issue: affordable_share, floor: 35 }
  favorable: { label: Developer Victory, supporter_role: developer }
  opposing: { label: Council Victory, supporter_role: council_planner }
"#;
        let s = Scenario::from_yaml_str(yaml).unwrap();
        assert_eq!(s.rules.event_probability, 0.25);
        assert_eq!(s.actions.len(), 4);
        assert!(s.events.is_empty());
    }

    #[test]
    fn conditions_ignore_mismatched_kinds() {
        let issues = Issues::from([
            (IssueId::from("share"), IssueValue::Percent(40)),
            (IssueId::from("venue"), IssueValue::Scale(ScaleLevel::Large)),
        ]);
        let below = IssueCondition::Below {
            issue: "venue".into(),
            value: 50,
        };
        assert!(!below.holds(&issues));
        let at_least = IssueCondition::AtLeast {
            issue: "share".into(),
            value: 40,
        };
        assert!(at_least.holds(&issues));
        let missing = IssueCondition::OneOf {
            issue: "parks".into(),
            levels: vec![ScaleLevel::Large],
        };
        assert!(!missing.holds(&issues));
    }
}
