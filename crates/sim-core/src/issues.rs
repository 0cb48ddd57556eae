use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a negotiable deal parameter, e.g. "affordable_share".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(pub String);

impl IssueId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IssueId {
    fn from(value: &str) -> Self {
        IssueId(value.to_string())
    }
}

/// Ordered categorical ladder. Moving past either end saturates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleLevel {
    Small,
    Medium,
    Large,
}

impl ScaleLevel {
    /// One level up; `Large` stays `Large`.
    pub fn raise(self) -> Self {
        match self {
            ScaleLevel::Small => ScaleLevel::Medium,
            ScaleLevel::Medium | ScaleLevel::Large => ScaleLevel::Large,
        }
    }

    /// One level down; `Small` stays `Small`.
    pub fn lower(self) -> Self {
        match self {
            ScaleLevel::Large => ScaleLevel::Medium,
            ScaleLevel::Medium | ScaleLevel::Small => ScaleLevel::Small,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScaleLevel::Small => "small",
            ScaleLevel::Medium => "medium",
            ScaleLevel::Large => "large",
        }
    }
}

impl fmt::Display for ScaleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current value of an issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueValue {
    /// Percentage in [0, 100].
    Percent(u8),
    Scale(ScaleLevel),
}

impl IssueValue {
    /// Move one step in the favourable direction. Percentages clamp at 100.
    pub fn step_up(self, step: u8) -> Self {
        match self {
            IssueValue::Percent(p) => IssueValue::Percent(p.saturating_add(step).min(100)),
            IssueValue::Scale(level) => IssueValue::Scale(level.raise()),
        }
    }

    /// Move one step down. Percentages floor at 0.
    pub fn step_down(self, step: u8) -> Self {
        match self {
            IssueValue::Percent(p) => IssueValue::Percent(p.saturating_sub(step)),
            IssueValue::Scale(level) => IssueValue::Scale(level.lower()),
        }
    }

    pub fn as_percent(self) -> Option<u8> {
        match self {
            IssueValue::Percent(p) => Some(p),
            IssueValue::Scale(_) => None,
        }
    }

    pub fn as_scale(self) -> Option<ScaleLevel> {
        match self {
            IssueValue::Scale(level) => Some(level),
            IssueValue::Percent(_) => None,
        }
    }
}

impl fmt::Display for IssueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueValue::Percent(p) => write!(f, "{p}%"),
            IssueValue::Scale(level) => write!(f, "{level}"),
        }
    }
}

/// The negotiated deal: issue id to its current value.
pub type Issues = BTreeMap<IssueId, IssueValue>;

/// Catalog entry for an issue.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IssueDefinition {
    pub label: String,
    pub initial: IssueValue,
    /// Percentage points per adjustment; ignored for scale issues.
    #[serde(default = "default_step")]
    pub step: u8,
}

fn default_step() -> u8 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_saturates_at_both_ends() {
        assert_eq!(ScaleLevel::Large.raise(), ScaleLevel::Large);
        assert_eq!(ScaleLevel::Small.lower(), ScaleLevel::Small);
        assert_eq!(ScaleLevel::Small.raise().raise(), ScaleLevel::Large);
        assert_eq!(ScaleLevel::Large.lower().lower(), ScaleLevel::Small);
    }

    #[test]
    fn percent_steps_clamp() {
        assert_eq!(IssueValue::Percent(100).step_up(1), IssueValue::Percent(100));
        assert_eq!(IssueValue::Percent(99).step_up(5), IssueValue::Percent(100));
        assert_eq!(IssueValue::Percent(0).step_down(1), IssueValue::Percent(0));
        assert_eq!(IssueValue::Percent(35).step_down(1), IssueValue::Percent(34));
    }

    #[test]
    fn issue_values_read_from_config_form() {
        let v: IssueValue = serde_json::from_str(r#"{"percent": 35}"#).unwrap();
        assert_eq!(v, IssueValue::Percent(35));
        let v: IssueValue = serde_json::from_str(r#"{"scale": "medium"}"#).unwrap();
        assert_eq!(v.as_scale(), Some(ScaleLevel::Medium));
        assert_eq!(v.to_string(), "medium");
    }
}
