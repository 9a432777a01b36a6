//! Rule types and cached rule definitions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::ast::values::{scalars, Scalar};
use crate::error::DeidError;

/// The four families of de-identification rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    /// Replace values with a coarser category.
    Generalize,
    /// Blank out columns or drop rows.
    Suppress,
    /// Move dates by a per-person offset.
    Shift,
    /// Derive a field from a template expression.
    Compute,
}

impl RuleType {
    /// Order in which the compiler runs the handlers.
    ///
    /// Suppress runs before Shift: shifting is only emitted once a row filter exists.
    pub const EVALUATION_ORDER: [RuleType; 4] = [
        RuleType::Generalize,
        RuleType::Compute,
        RuleType::Suppress,
        RuleType::Shift,
    ];

    /// Order in which projections claim a column; the first claim wins.
    pub const PROJECTION_PRIORITY: [RuleType; 4] = [
        RuleType::Generalize,
        RuleType::Suppress,
        RuleType::Shift,
        RuleType::Compute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Generalize => "generalize",
            RuleType::Suppress => "suppress",
            RuleType::Shift => "shift",
            RuleType::Compute => "compute",
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = DeidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generalize" => Ok(RuleType::Generalize),
            "suppress" => Ok(RuleType::Suppress),
            "shift" => Ok(RuleType::Shift),
            "compute" => Ok(RuleType::Compute),
            other => Err(DeidError::Config(format!(
                "'{}' is unknown, [suppress, generalize, compute, shift] are allowed",
                other
            ))),
        }
    }
}

/// One candidate condition of a rule: when it holds, the value becomes `into`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCondition {
    /// SQL function applied to the field (REGEXP, COUNT, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply: Option<String>,
    /// Values matched by the condition.
    #[serde(default, deserialize_with = "scalars")]
    pub values: Vec<Scalar>,
    /// Operator written between the field (or function) and the values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    /// Replacement value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub into: Option<Scalar>,
    /// Category values restricting an aggregate to some rows.
    #[serde(default, deserialize_with = "scalars", skip_serializing_if = "Vec::is_empty")]
    pub on: Vec<Scalar>,
    /// Column counted by `COUNT-DISTINCT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct: Option<String>,
}

impl ValueCondition {
    /// Inline membership condition: `field <qualifier> (values)`.
    pub fn inline<I, S>(values: I, qualifier: &str, into: impl Into<Scalar>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        Self {
            apply: None,
            values: values.into_iter().map(Into::into).collect(),
            qualifier: Some(qualifier.to_string()),
            into: Some(into.into()),
            on: Vec::new(),
            distinct: None,
        }
    }

    /// Function-based condition: `FN(field, values) <qualifier>`.
    pub fn function<I, S>(apply: &str, values: I, qualifier: &str, into: impl Into<Scalar>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        Self {
            apply: Some(apply.to_string()),
            ..Self::inline(values, qualifier, into)
        }
    }

    /// Restrict an aggregate condition to some category values.
    pub fn on<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        self.on = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn distinct(mut self, field: &str) -> Self {
        self.distinct = Some(field.to_string());
        self
    }

    pub fn qualifier(&self) -> &str {
        self.qualifier.as_deref().unwrap_or("")
    }
}

/// The body of a rule: a list of value-conditions or a raw SQL template.
///
/// Rule files write a condition list, a single condition object, or a
/// template string; a single object is normalized into a one-element list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, from = "RawDefinition")]
pub enum RuleDefinition {
    Template(String),
    Conditions(Vec<ValueCondition>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDefinition {
    Text(String),
    Many(Vec<ValueCondition>),
    One(ValueCondition),
}

impl From<RawDefinition> for RuleDefinition {
    fn from(raw: RawDefinition) -> Self {
        match raw {
            RawDefinition::Text(text) => RuleDefinition::Template(text),
            RawDefinition::Many(conditions) => RuleDefinition::Conditions(conditions),
            RawDefinition::One(condition) => RuleDefinition::Conditions(vec![condition]),
        }
    }
}

impl RuleDefinition {
    pub fn template(text: impl Into<String>) -> Self {
        RuleDefinition::Template(text.into())
    }

    pub fn conditions(&self) -> &[ValueCondition] {
        match self {
            RuleDefinition::Conditions(conditions) => conditions,
            RuleDefinition::Template(_) => &[],
        }
    }

    pub fn as_template(&self) -> Option<&str> {
        match self {
            RuleDefinition::Template(text) => Some(text),
            RuleDefinition::Conditions(_) => None,
        }
    }
}

impl From<ValueCondition> for RuleDefinition {
    fn from(condition: ValueCondition) -> Self {
        RuleDefinition::Conditions(vec![condition])
    }
}

impl From<Vec<ValueCondition>> for RuleDefinition {
    fn from(conditions: Vec<ValueCondition>) -> Self {
        RuleDefinition::Conditions(conditions)
    }
}
