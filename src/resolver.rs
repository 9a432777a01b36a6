//! Reference resolution: a table-configuration row becomes the flat
//! parameter record a rule handler consumes.

use serde::Serialize;

use crate::ast::{RuleCitation, RuleDefinition, RuleType, Scalar, ValueCondition};
use crate::cache::RuleCache;
use crate::error::{DeidError, DeidResult};
use crate::parser::parse_citation;

/// Canonical parameters of one citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRule {
    pub rule_type: RuleType,
    /// `<rule_type>.<rule_id>` for citations, the rule-type name otherwise.
    pub label: String,
    pub rules: Option<RuleDefinition>,
    pub fields: Vec<String>,
    pub table: Option<String>,
    pub filter: Option<String>,
    pub key_field: Option<String>,
    pub value_field: Option<String>,
    pub key_row: Option<String>,
    pub key_value: Option<String>,
    pub dataset: Option<String>,
    pub alias: Option<String>,
    pub on: Option<String>,
    pub qualifier: Option<String>,
    pub into: Option<Scalar>,
    pub copy_to: Vec<String>,
}

impl ResolvedRule {
    pub fn conditions(&self) -> &[ValueCondition] {
        self.rules.as_ref().map_or(&[], RuleDefinition::conditions)
    }

    pub fn template(&self) -> Option<&str> {
        self.rules.as_ref().and_then(RuleDefinition::as_template)
    }

    /// Citation-level qualifier, empty when absent.
    pub fn qualifier(&self) -> &str {
        self.qualifier.as_deref().unwrap_or("")
    }

    /// Rule id part of the label, used in log events.
    pub fn rule_id(&self) -> &str {
        self.label
            .split_once('.')
            .map_or(self.label.as_str(), |(_, rule_id)| rule_id)
    }
}

/// Check a citation before resolving it.
///
/// A well-formed `@type.id` must name the rule type being compiled and a
/// rule present in the cache. Rows without a parseable citation are
/// self-contained and always pass.
pub fn validate(rule_type: RuleType, citation: &RuleCitation, cache: &RuleCache) -> DeidResult<()> {
    let Some(reference) = citation.reference() else {
        return Ok(());
    };
    let Some(parsed) = parse_citation(reference) else {
        return Ok(());
    };

    let cited_type: RuleType = parsed
        .rule_type
        .parse()
        .map_err(|e: DeidError| DeidError::reference(reference, e.to_string()))?;

    if cited_type != rule_type {
        return Err(DeidError::reference(
            reference,
            format!("a {} rule cannot be cited under '{}'", cited_type, rule_type),
        ));
    }

    if !cache.contains(cited_type, parsed.rule_id) {
        return Err(DeidError::reference(
            reference,
            format!("no {} rule named '{}'", cited_type, parsed.rule_id),
        ));
    }

    Ok(())
}

/// Resolve a citation against the cache.
///
/// The cached definition is set first and the row never overrides it; all
/// other keys come from the row.
pub fn resolve(rule_type: RuleType, citation: &RuleCitation, cache: &RuleCache) -> ResolvedRule {
    let parsed = citation.reference().and_then(parse_citation);

    let label = parsed
        .map(|c| c.label())
        .unwrap_or_else(|| rule_type.as_str().to_string());

    let cached = parsed.and_then(|c| {
        let cited_type = c.rule_type.parse::<RuleType>().ok()?;
        cache.get(cited_type, c.rule_id).cloned()
    });

    let rules = match (parsed, cached) {
        (_, Some(definition)) => Some(definition),
        // A citation with nothing behind it carries no body of its own.
        (Some(_), None) => None,
        (None, None) => citation.rules.clone(),
    };

    ResolvedRule {
        rule_type,
        label,
        rules,
        fields: citation.fields.clone(),
        table: citation.table.clone(),
        filter: citation.filter.clone(),
        key_field: citation.key_field.clone(),
        value_field: citation.value_field.clone(),
        key_row: citation.key_row.clone(),
        key_value: citation.key_value.clone(),
        dataset: citation.dataset.clone(),
        alias: citation.alias.clone(),
        on: citation.on.clone(),
        qualifier: citation.qualifier.clone(),
        into: citation.into.clone(),
        copy_to: citation.copy_to.clone(),
    }
}
