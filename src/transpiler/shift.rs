//! Date shifting.

use serde::{Deserialize, Serialize};

use crate::ast::{FieldProjection, RuleType, SqlExpr, SuppressionFilters};
use crate::error::{DeidError, DeidResult};
use crate::resolver::ResolvedRule;
use crate::transpiler::assembler::DATASET_PLACEHOLDER;
use crate::transpiler::dialect::{Dialect, DialectProfile};
use crate::transpiler::ToSql;

/// Where the day offset substituted for `:SHIFT` comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShiftSource {
    /// The dialect's random-integer expression.
    #[default]
    Random,
    /// Per-person offsets stored in `<dataset>.deid_map`; an empty dataset
    /// leaves the input-dataset placeholder for the assembler.
    MapTable { dataset: String, table: String },
}

impl ShiftSource {
    pub fn map_table(dataset: &str, table: &str) -> Self {
        ShiftSource::MapTable {
            dataset: dataset.to_string(),
            table: table.to_string(),
        }
    }

    /// The SQL producing the shift amount.
    pub fn amount(&self, profile: &DialectProfile) -> String {
        match self {
            ShiftSource::Random => profile.random.to_string(),
            ShiftSource::MapTable { dataset, table } => {
                let dataset = if dataset.is_empty() { DATASET_PLACEHOLDER } else { dataset.as_str() };
                format!(
                    "SELECT shift FROM {}.deid_map WHERE deid_map.person_id = {}.person_id",
                    dataset, table
                )
            }
        }
    }
}

/// Shift the first cited field.
///
/// Nothing is emitted until some row filter exists.
pub fn shift(
    rule: &ResolvedRule,
    dialect: Dialect,
    source: &ShiftSource,
    filters: &SuppressionFilters,
) -> DeidResult<Vec<FieldProjection>> {
    if filters.is_empty() {
        tracing::debug!(module = "shift", label = rule.rule_id(), "no row filters, shift skipped");
        return Ok(Vec::new());
    }

    let template = rule
        .template()
        .ok_or_else(|| DeidError::template(&rule.label, "shift needs a template string"))?;

    // Only the first field is shifted.
    let Some(name) = rule.fields.first() else {
        return Ok(Vec::new());
    };
    tracing::debug!(module = "shift", label = rule.rule_id(), on = %name);

    let profile = dialect.profile();
    let sql = template
        .replace(":FIELD", name)
        .replace(":SHIFT", &source.amount(profile))
        .replace(":RANDOM", profile.random);

    let projection = match rule.on.as_deref() {
        Some(on) => {
            let (expr, alias) = split_alias(&sql).unwrap_or((sql.as_str(), name.as_str()));
            let cast = SqlExpr::raw(expr)
                .cast(profile.string_type)
                .alias(alias)
                .to_sql_with_dialect(dialect);
            FieldProjection::new(RuleType::Shift, name, cast, &rule.label).on_value(Some(on))
        }
        None => FieldProjection::new(RuleType::Shift, name, sql.trim(), &rule.label),
    };

    Ok(vec![projection])
}

/// Split `expr AS alias` at the last ` AS ` (any case).
fn split_alias(sql: &str) -> Option<(&str, &str)> {
    let index = sql.to_ascii_uppercase().rfind(" AS ")?;
    let alias = sql[index + 4..].trim();
    (!alias.is_empty()).then(|| (sql[..index].trim(), alias))
}
