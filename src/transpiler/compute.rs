//! Computed fields: plain placeholder substitution into a template.

use crate::ast::{FieldProjection, RuleType};
use crate::error::{DeidError, DeidResult};
use crate::resolver::ResolvedRule;
use crate::transpiler::assembler::TABLE_PLACEHOLDER;

pub fn compute(rule: &ResolvedRule) -> DeidResult<Vec<FieldProjection>> {
    let template = rule
        .template()
        .ok_or_else(|| DeidError::template(&rule.label, "compute needs a template string"))?;

    let name = rule
        .fields
        .first()
        .or(rule.key_field.as_ref())
        .ok_or_else(|| DeidError::template(&rule.label, "no field to compute"))?;

    tracing::debug!(module = "compute", label = rule.rule_id(), on = %name);

    // The outer row's own column unless the row names another value.
    let key_value = rule
        .key_value
        .clone()
        .unwrap_or_else(|| format!("{}.{}", TABLE_PLACEHOLDER, name));

    let mut statement = template.replace(":FIELD", name);
    for (placeholder, value) in [
        (":value_field", rule.value_field.as_deref()),
        (":key_field", rule.key_field.as_deref()),
        (":key_value", Some(key_value.as_str())),
        (":table", rule.table.as_deref()),
    ] {
        if !statement.contains(placeholder) {
            continue;
        }
        let value = value.ok_or_else(|| {
            DeidError::template(&rule.label, format!("template needs '{}'", &placeholder[1..]))
        })?;
        statement = statement.replace(placeholder, value);
    }

    Ok(vec![FieldProjection::new(RuleType::Compute, name, statement, &rule.label)])
}
