//! Skip rules: conjunctions of field conditions evaluated before dispatch.

use crate::errors::ReplayError;
use crate::replay::step::InteractionStep;
use crate::types::ReplayProfile;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub type StepPredicate = Arc<dyn Fn(Option<&str>, &InteractionStep) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum Comparator {
    Equals(String),
    OneOf(Vec<String>),
    StartsWith(Vec<String>),
    Predicate(StepPredicate),
}

impl fmt::Debug for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals(v) => f.debug_tuple("Equals").field(v).finish(),
            Self::OneOf(v) => f.debug_tuple("OneOf").field(v).finish(),
            Self::StartsWith(v) => f.debug_tuple("StartsWith").field(v).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub field: String,
    pub comparator: Comparator,
}

impl Condition {
    pub fn equals(field: &str, value: &str) -> Self {
        Self {
            field: field.to_string(),
            comparator: Comparator::Equals(value.to_string()),
        }
    }

    pub fn one_of(field: &str, values: &[&str]) -> Self {
        Self {
            field: field.to_string(),
            comparator: Comparator::OneOf(values.iter().map(|v| v.to_string()).collect()),
        }
    }

    pub fn starts_with(field: &str, prefixes: &[&str]) -> Self {
        Self {
            field: field.to_string(),
            comparator: Comparator::StartsWith(prefixes.iter().map(|v| v.to_string()).collect()),
        }
    }

    pub fn predicate(
        field: &str,
        check: impl Fn(Option<&str>, &InteractionStep) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            field: field.to_string(),
            comparator: Comparator::Predicate(Arc::new(check)),
        }
    }

    pub fn matches(&self, step: &InteractionStep) -> bool {
        let actual = step.field(&self.field);
        match (&self.comparator, actual.as_deref()) {
            (Comparator::Predicate(check), actual) => check(actual, step),
            (_, None) => false,
            (Comparator::Equals(expected), Some(actual)) => actual == expected,
            (Comparator::OneOf(options), Some(actual)) => options.iter().any(|o| o == actual),
            (Comparator::StartsWith(prefixes), Some(actual)) => {
                prefixes.iter().any(|p| actual.starts_with(p.as_str()))
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.comparator {
            Comparator::Equals(v) => write!(f, "{}={v}", self.field),
            Comparator::OneOf(v) => write!(f, "{} in [{}]", self.field, v.join(",")),
            Comparator::StartsWith(v) => write!(f, "{}^=[{}]", self.field, v.join(",")),
            Comparator::Predicate(_) => write!(f, "{}~predicate", self.field),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SkipRule {
    pub conditions: Vec<Condition>,
}

impl SkipRule {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    /// All conditions hold. A rule without conditions never matches.
    pub fn matches(&self, step: &InteractionStep) -> bool {
        !self.conditions.is_empty() && self.conditions.iter().all(|c| c.matches(step))
    }

    pub fn describe(&self) -> String {
        self.conditions
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" && ")
    }

    pub fn from_spec(spec: &SkipRuleSpec) -> Result<Self, ReplayError> {
        if spec.conditions.is_empty() {
            return Err(ReplayError::InvalidConfig(
                "skip_rules entries need at least one condition".to_string(),
            ));
        }
        let conditions = spec
            .conditions
            .iter()
            .map(ConditionSpec::to_condition)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { conditions })
    }
}

/// Rules shipped with each profile.
pub fn default_rules(profile: ReplayProfile) -> Vec<SkipRule> {
    match profile {
        ReplayProfile::Full => Vec::new(),
        ReplayProfile::Simple => vec![
            SkipRule::new(vec![
                Condition::equals("event", "input"),
                Condition::equals("action", "set-value"),
                Condition::equals("testId", "sql-manager-add-query-name"),
            ]),
            SkipRule::new(vec![
                Condition::equals("event", "click"),
                Condition::equals("action", "activate"),
                Condition::equals("testId", "sql-codemirror"),
            ]),
        ],
    }
}

/// First rule matching `step`, if any.
pub fn first_match<'a>(rules: &'a [SkipRule], step: &InteractionStep) -> Option<&'a SkipRule> {
    rules.iter().find(|rule| rule.matches(step))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(v) => vec![v],
            Self::Many(v) => v,
        }
    }
}

/// `[[skip_rules]]` table as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SkipRuleSpec {
    #[serde(default)]
    pub conditions: Vec<ConditionSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSpec {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_with: Option<OneOrMany>,
}

impl ConditionSpec {
    fn to_condition(&self) -> Result<Condition, ReplayError> {
        if self.field.trim().is_empty() {
            return Err(ReplayError::InvalidConfig(
                "skip_rules condition field must not be empty".to_string(),
            ));
        }
        let comparator = match (&self.equals, &self.one_of, &self.starts_with) {
            (Some(v), None, None) => Comparator::Equals(v.clone()),
            (None, Some(v), None) => Comparator::OneOf(v.clone()),
            (None, None, Some(v)) => Comparator::StartsWith(v.clone().into_vec()),
            _ => {
                return Err(ReplayError::InvalidConfig(format!(
                    "skip_rules condition on `{}` needs exactly one of equals, one_of, starts_with",
                    self.field
                )))
            }
        };
        Ok(Condition {
            field: self.field.clone(),
            comparator,
        })
    }
}
