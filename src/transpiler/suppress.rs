//! Suppression: blank out columns, or drop rows through inverted filters.

use crate::ast::{
    invert_qualifier, FieldProjection, RuleType, Scalar, SqlExpr, SuppressionFilter,
    SuppressionFilters,
};
use crate::error::{DeidError, DeidResult};
use crate::parser::negate_predicate;
use crate::resolver::ResolvedRule;
use crate::transpiler::dialect::Dialect;
use crate::transpiler::ToSql;

/// Label of filters derived from a bare `on` predicate.
pub const ROW_FILTER_LABEL: &str = "suppress.ROWS";

/// Column mode when `fields` is given without `on`; row mode otherwise.
///
/// Row mode only appends to `filters`; nothing already there is replaced.
pub fn suppress(
    rule: &ResolvedRule,
    dialect: Dialect,
    filters: &mut SuppressionFilters,
) -> DeidResult<Vec<FieldProjection>> {
    if !rule.fields.is_empty() && rule.on.is_none() {
        return Ok(suppress_columns(rule, dialect));
    }
    let new_filters = row_filters(rule, dialect, filters)?;
    filters.extend(new_filters);
    Ok(Vec::new())
}

fn suppress_columns(rule: &ResolvedRule, dialect: Dialect) -> Vec<FieldProjection> {
    let conditions = rule.conditions();
    tracing::debug!(module = "suppress", label = rule.rule_id(), on = ?rule.fields, kind = "columns");

    rule.fields
        .iter()
        .filter(|name| {
            conditions.is_empty()
                || conditions
                    .iter()
                    .any(|c| c.values.iter().any(|value| value.as_str() == name.as_str()))
        })
        .map(|name| {
            FieldProjection::new(
                RuleType::Suppress,
                name,
                blank(name).to_sql_with_dialect(dialect),
                &rule.label,
            )
        })
        .collect()
}

fn pattern(values: &[Scalar]) -> String {
    values.iter().map(Scalar::as_str).collect::<Vec<_>>().join("|")
}

/// `NULL` for identifier columns, an empty string otherwise, so the column
/// keeps its type.
fn blank(name: &str) -> SqlExpr {
    let value = if name.contains("_id") {
        SqlExpr::raw("NULL")
    } else {
        SqlExpr::Literal(String::new())
    };
    value.alias(name)
}

fn row_filters(
    rule: &ResolvedRule,
    dialect: Dialect,
    existing: &SuppressionFilters,
) -> DeidResult<Vec<SuppressionFilter>> {
    let conditions = rule.conditions();
    tracing::debug!(module = "suppress", label = rule.rule_id(), on = ?rule.on, kind = "rows");

    if conditions.is_empty() {
        let on = rule
            .on
            .as_deref()
            .ok_or_else(|| DeidError::template(&rule.label, "nothing to suppress: no fields, rules or 'on'"))?;
        let predicate = negate_predicate(on);
        if existing.contains(&predicate) {
            return Ok(Vec::new());
        }
        return Ok(vec![SuppressionFilter {
            predicate,
            label: ROW_FILTER_LABEL.to_string(),
        }]);
    }

    let profile = dialect.profile();
    let mut out = Vec::with_capacity(conditions.len());

    for condition in conditions {
        let qualifier = match rule.qualifier() {
            "" => condition.qualifier(),
            qualifier => qualifier,
        };
        let template = condition
            .apply
            .as_deref()
            .and_then(|function| profile.function(function).map(|t| (function, t)));

        let predicate = match (template, rule.on.as_deref()) {
            (Some((function, template)), _) => {
                let key_field = rule
                    .filter
                    .as_deref()
                    .or(rule.on.as_deref())
                    .ok_or_else(|| DeidError::template(&rule.label, "row filter needs 'filter' or 'on'"))?;
                let expression = template
                    .replace(":VAR", &pattern(&condition.values))
                    .replace(":FN", function)
                    .replace(":FIELD", key_field);
                format!("{} {}", expression, inverted(rule, qualifier)?)
            }
            (None, Some(on)) => {
                let qualifier = if qualifier.trim().is_empty() { "IN" } else { qualifier };
                let op = inverted(rule, qualifier)?;
                if condition.values.is_empty() {
                    on.to_string()
                } else {
                    SqlExpr::column(on)
                        .in_list(op, &condition.values)
                        .to_sql_with_dialect(dialect)
                }
            }
            (None, None) => {
                return Err(DeidError::template(
                    &rule.label,
                    format!(
                        "function {} has no template in the {} dialect and no 'on' field is given",
                        condition.apply.as_deref().unwrap_or("(none)"),
                        profile.name
                    ),
                ));
            }
        };

        out.push(SuppressionFilter {
            predicate,
            label: rule.label.clone(),
        });
    }

    Ok(out)
}

fn inverted(rule: &ResolvedRule, qualifier: &str) -> DeidResult<&'static str> {
    invert_qualifier(qualifier).ok_or_else(|| {
        DeidError::template(&rule.label, format!("qualifier '{}' cannot be inverted", qualifier))
    })
}
