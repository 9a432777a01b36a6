//! Table configuration: which rules apply to which fields.

use serde::{Deserialize, Serialize};

use crate::ast::rules::{RuleDefinition, RuleType};
use crate::ast::values::{one_or_many, scalar_list, Scalar};
use crate::error::DeidResult;

/// One row of a table configuration.
///
/// `rules` is either a citation (`"@generalize.race"`) or a self-contained
/// body (condition list or template string). Every other key is a local
/// parameter handed to the rule handler. Keys a handler does not know,
/// `label` included, are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCitation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<RuleDefinition>,
    #[serde(default, deserialize_with = "scalar_list", skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_row: Option<String>,
    /// Outer value matched by `:key_value` in compute templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_value: Option<String>,
    /// Dataset and alias of the table an aggregate template reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Category predicate (meta tables) or row-filter field (suppress).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub into: Option<Scalar>,
    /// Extra columns receiving a copy of each generalized expression.
    #[serde(default, deserialize_with = "scalar_list", skip_serializing_if = "Vec::is_empty")]
    pub copy_to: Vec<String>,
}

impl RuleCitation {
    /// A row citing a cached rule, e.g. `RuleCitation::cite("@generalize.race")`.
    pub fn cite(reference: &str) -> Self {
        Self {
            rules: Some(RuleDefinition::template(reference)),
            ..Self::default()
        }
    }

    /// A self-contained row carrying its own rule body.
    pub fn inline(rules: impl Into<RuleDefinition>) -> Self {
        Self {
            rules: Some(rules.into()),
            ..Self::default()
        }
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    pub fn filter(mut self, filter: &str) -> Self {
        self.filter = Some(filter.to_string());
        self
    }

    pub fn key_field(mut self, key_field: &str) -> Self {
        self.key_field = Some(key_field.to_string());
        self
    }

    pub fn value_field(mut self, value_field: &str) -> Self {
        self.value_field = Some(value_field.to_string());
        self
    }

    pub fn key_row(mut self, key_row: &str) -> Self {
        self.key_row = Some(key_row.to_string());
        self
    }

    pub fn key_value(mut self, key_value: &str) -> Self {
        self.key_value = Some(key_value.to_string());
        self
    }

    pub fn dataset(mut self, dataset: &str) -> Self {
        self.dataset = Some(dataset.to_string());
        self
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn copy_to<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.copy_to = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn on(mut self, on: &str) -> Self {
        self.on = Some(on.to_string());
        self
    }

    pub fn qualifier(mut self, qualifier: &str) -> Self {
        self.qualifier = Some(qualifier.to_string());
        self
    }

    pub fn into_value(mut self, into: impl Into<Scalar>) -> Self {
        self.into = Some(into.into());
        self
    }

    /// The raw citation text, if `rules` is a string.
    pub fn reference(&self) -> Option<&str> {
        self.rules.as_ref().and_then(RuleDefinition::as_template)
    }
}

/// Per-table rule configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub generalize: Vec<RuleCitation>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub compute: Vec<RuleCitation>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub suppress: Vec<RuleCitation>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub shift: Vec<RuleCitation>,
}

impl TableConfig {
    pub fn from_json(text: &str) -> DeidResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn entries(&self, rule_type: RuleType) -> &[RuleCitation] {
        match rule_type {
            RuleType::Generalize => &self.generalize,
            RuleType::Compute => &self.compute,
            RuleType::Suppress => &self.suppress,
            RuleType::Shift => &self.shift,
        }
    }

    pub fn entries_mut(&mut self, rule_type: RuleType) -> &mut Vec<RuleCitation> {
        match rule_type {
            RuleType::Generalize => &mut self.generalize,
            RuleType::Compute => &mut self.compute,
            RuleType::Suppress => &mut self.suppress,
            RuleType::Shift => &mut self.shift,
        }
    }

    /// Add a citation under the given rule type.
    pub fn with(mut self, rule_type: RuleType, citation: RuleCitation) -> Self {
        self.entries_mut(rule_type).push(citation);
        self
    }

    pub fn is_empty(&self) -> bool {
        RuleType::EVALUATION_ORDER
            .iter()
            .all(|rule_type| self.entries(*rule_type).is_empty())
    }
}
