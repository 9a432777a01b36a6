//! Generalization: replace values with a coarser category through a
//! chain of conditional branches.

use crate::ast::{is_aggregate, Branch, FieldProjection, RuleType, Scalar, SqlExpr, ValueCondition};
use crate::error::{DeidError, DeidResult};
use crate::resolver::ResolvedRule;
use crate::transpiler::assembler::DATASET_PLACEHOLDER;
use crate::transpiler::dialect::Dialect;
use crate::transpiler::ToSql;

pub fn generalize(rule: &ResolvedRule, dialect: Dialect) -> DeidResult<Vec<FieldProjection>> {
    let conditions = rule.conditions();
    if conditions.is_empty() {
        return Err(DeidError::template(&rule.label, "no value conditions to generalize with"));
    }

    let fields = target_fields(rule)?;
    let mut out = Vec::with_capacity(fields.len());

    for name in fields {
        let mut branches = Vec::with_capacity(conditions.len());
        for (index, condition) in conditions.iter().enumerate() {
            let into = rule
                .into
                .as_ref()
                .or(condition.into.as_ref())
                .ok_or_else(|| DeidError::template(&rule.label, "condition has no 'into' value"))?;

            let predicate = match condition.apply.as_deref() {
                Some(function) => {
                    tracing::debug!(module = "generalize", label = rule.rule_id(), on = %name, kind = function);
                    function_predicate(rule, name, function, condition, dialect)?
                }
                None => {
                    tracing::debug!(module = "generalize", label = rule.rule_id(), on = %name, kind = "inline");
                    inline_predicate(rule, name, condition)
                }
            };

            branches.push(Branch::at(index + 1, predicate, SqlExpr::outcome(into)));
        }

        // `copy_to` columns get the same chain under their own alias.
        let conditional = SqlExpr::conditional(branches, SqlExpr::column(name));
        for target in std::iter::once(name).chain(&rule.copy_to) {
            let expr = conditional.clone().alias(target);
            out.push(
                FieldProjection::new(RuleType::Generalize, target, expr.to_sql_with_dialect(dialect), &rule.label)
                    .on_value(rule.on.as_deref()),
            );
        }
    }

    Ok(out)
}

/// `fields`, or the value field of a meta table.
fn target_fields(rule: &ResolvedRule) -> DeidResult<Vec<&String>> {
    if !rule.fields.is_empty() {
        return Ok(rule.fields.iter().collect());
    }
    rule.value_field
        .as_ref()
        .map(|field| vec![field])
        .ok_or_else(|| DeidError::template(&rule.label, "no target fields"))
}

/// `filter qualifier ('v1','v2')`
fn inline_predicate(rule: &ResolvedRule, name: &str, condition: &ValueCondition) -> SqlExpr {
    let filter = rule.filter.as_deref().unwrap_or(name);
    let qualifier = match condition.qualifier().trim() {
        "" => "IN",
        qualifier => qualifier,
    };
    SqlExpr::column(filter).in_list(qualifier, &condition.values)
}

fn function_predicate(
    rule: &ResolvedRule,
    name: &str,
    function: &str,
    condition: &ValueCondition,
    dialect: Dialect,
) -> DeidResult<SqlExpr> {
    let profile = dialect.profile();
    let filter = rule.filter.as_deref().unwrap_or(name);
    let pattern = condition
        .values
        .iter()
        .map(Scalar::as_str)
        .collect::<Vec<_>>()
        .join("|");
    let qualifier = condition.qualifier();

    let Some(template) = profile.function(function) else {
        if is_aggregate(function) {
            return Err(DeidError::template(
                &rule.label,
                format!("aggregate {} has no template in the {} dialect", function, profile.name),
            ));
        }
        // Literal call when the dialect has no template for the function.
        let call = format!("{}({}, '{}')", function, filter, pattern);
        return Ok(SqlExpr::raw(call).qualified(qualifier));
    };

    let mut sql = template
        .replace(":FIELD", filter)
        .replace(":FN", function)
        .replace(":VAR", &pattern);

    if !is_aggregate(function) {
        return Ok(SqlExpr::raw(sql).qualified(qualifier));
    }

    for (placeholder, value, key) in [
        (":DATASET", Some(rule.dataset.as_deref().unwrap_or(DATASET_PLACEHOLDER)), "dataset"),
        (":ALIAS", rule.alias.as_deref(), "alias"),
        (":DISTINCT_FIELD", condition.distinct.as_deref(), "distinct"),
        (":TABLE", rule.table.as_deref(), "table"),
        (":KEY", rule.key_field.as_deref(), "key_field"),
        (":VALUE", rule.value_field.as_deref(), "value_field"),
    ] {
        if sql.contains(placeholder) {
            let value = value.ok_or_else(|| {
                DeidError::template(&rule.label, format!("aggregate {} needs '{}'", function, key))
            })?;
            sql = sql.replace(placeholder, value);
        }
    }

    if !condition.on.is_empty() {
        let key_row = rule.key_row.as_deref().unwrap_or(name).replace(":name", name);
        let conjunction = if sql.to_ascii_uppercase().contains(" WHERE ") {
            " AND "
        } else {
            " WHERE "
        };
        let guard = SqlExpr::column(&key_row).in_list("IN", &condition.on);
        sql = format!("{}{}{}", sql, conjunction, guard.to_sql_with_dialect(dialect));
    }

    if let Some(on) = rule.on.as_deref() {
        let on = match rule.alias.as_deref() {
            Some(alias) => on.replace(":join_tablename", alias),
            None => on.to_string(),
        };
        sql = format!("{} AND {}", sql, on);
    }

    Ok(SqlExpr::raw(sql).nested().qualified(qualifier))
}
