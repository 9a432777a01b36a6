//! Assembly of compiled projections into final SELECT statements.
//!
//! ```text
//! relational:  SELECT <projections> FROM dataset.table [WHERE f1 AND f2]
//! meta:        one branch per category   ... {WHERE|AND} <category>
//!              UNION ALL
//!              residual branch           ... {WHERE|AND} (<c1>) IS NOT TRUE AND (<c2>) IS NOT TRUE
//! ```
//!
//! The residual branch also takes rows whose category predicate is NULL.

use crate::ast::{CompiledQuery, FieldProjection, RuleType, SuppressionFilter, TableRef};
use crate::error::{DeidError, DeidResult};
use crate::parser::column_tokens;
use crate::transpiler::compiler::Compilation;

/// Placeholder for the input dataset inside rule templates.
pub const DATASET_PLACEHOLDER: &str = ":idataset";
/// Placeholder for the input table name, used to reach outer columns from subqueries.
pub const TABLE_PLACEHOLDER: &str = ":itable";

pub fn assemble(table: &TableRef, columns: &[String], compilation: &Compilation) -> DeidResult<CompiledQuery> {
    if columns.is_empty() {
        return Err(DeidError::assembly(table.to_string(), "table has no columns"));
    }

    let filters = applicable_filters(columns, compilation.filters.iter());
    let where_clause = if filters.is_empty() {
        String::new()
    } else {
        let predicates: Vec<&str> = filters.iter().map(|f| f.predicate.as_str()).collect();
        format!(" WHERE {}", predicates.join(" AND "))
    };
    let conjunction = if where_clause.is_empty() { " WHERE " } else { " AND " };

    let relational: Vec<&FieldProjection> = compilation.relational().collect();
    let categories = group_categories(table, &compilation.projections)?;

    let statement = |projections: &[&FieldProjection]| {
        format!(
            "SELECT {} FROM {}{}",
            select_list(columns, projections).join(", "),
            table,
            where_clause
        )
    };
    let query = if categories.is_empty() {
        CompiledQuery::Single(fill_placeholders(&statement(&relational), table))
    } else {
        let mut branches = Vec::with_capacity(categories.len() + 1);
        for (on, projections) in &categories {
            let mut scoped = projections.clone();
            scoped.extend(relational.iter().copied());
            branches.push(format!("{}{}{}", statement(&scoped), conjunction, on));
        }

        let residual: Vec<String> = categories
            .iter()
            .map(|(on, _)| format!("({}) IS NOT TRUE", on))
            .collect();
        branches.push(format!("{}{}{}", statement(&relational), conjunction, residual.join(" AND ")));

        CompiledQuery::UnionAll(
            branches
                .into_iter()
                .map(|branch| fill_placeholders(&branch, table))
                .collect(),
        )
    };

    tracing::info!(
        table = %table,
        meta = query.is_meta(),
        branches = query.branches().len(),
        filters = filters.len(),
        "assembled query"
    );

    Ok(query)
}

/// Substitute the input dataset and table; without a dataset, `:idataset.`
/// qualifiers are dropped.
fn fill_placeholders(sql: &str, table: &TableRef) -> String {
    let sql = match table.dataset.as_deref() {
        Some(dataset) => sql.replace(DATASET_PLACEHOLDER, dataset),
        None => sql
            .replace(&format!("{}.", DATASET_PLACEHOLDER), "")
            .replace(DATASET_PLACEHOLDER, ""),
    };
    sql.replace(TABLE_PLACEHOLDER, &table.table)
}

/// Filters whose identifiers mention at least one of the table's columns.
fn applicable_filters<'a>(
    columns: &[String],
    filters: impl Iterator<Item = &'a SuppressionFilter>,
) -> Vec<&'a SuppressionFilter> {
    filters
        .filter(|filter| {
            let tokens = column_tokens(&filter.predicate);
            columns.iter().any(|column| tokens.contains(column.as_str()))
        })
        .collect()
}

/// Meta projections grouped by category predicate, in first-seen order.
fn group_categories<'a>(
    table: &TableRef,
    projections: &'a [FieldProjection],
) -> DeidResult<Vec<(&'a str, Vec<&'a FieldProjection>)>> {
    let mut categories: Vec<(&str, Vec<&FieldProjection>)> = Vec::new();

    for projection in projections {
        let Some(on) = projection.on_value.as_deref() else {
            continue;
        };
        if on.trim().is_empty() {
            return Err(DeidError::assembly(
                table.to_string(),
                format!("projection of '{}' ({}) has an empty category", projection.name, projection.label),
            ));
        }
        match categories.iter_mut().find(|(existing, _)| *existing == on) {
            Some((_, members)) => members.push(projection),
            None => categories.push((on, vec![projection])),
        }
    }

    Ok(categories)
}

/// One entry per column: the winning projection's SQL or the bare column name.
pub(crate) fn select_list(columns: &[String], projections: &[&FieldProjection]) -> Vec<String> {
    columns
        .iter()
        .map(|column| {
            RuleType::PROJECTION_PRIORITY
                .iter()
                .find_map(|rule_type| {
                    projections
                        .iter()
                        .find(|p| p.rule_type == *rule_type && p.name == *column)
                })
                .map_or_else(|| column.clone(), |p| p.sql.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_empty_column_list_is_fatal() {
        let err = assemble(&TableRef::new("ds", "person"), &[], &Compilation::default()).unwrap_err();
        assert!(matches!(err, DeidError::Assembly { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_pass_through() {
        let query = assemble(
            &TableRef::new("ds", "person"),
            &columns(&["id", "ssn"]),
            &Compilation::default(),
        )
        .unwrap();
        assert_eq!(query, CompiledQuery::Single("SELECT id, ssn FROM ds.person".into()));
    }

    #[test]
    fn test_priority_generalize_over_compute() {
        let mut compilation = Compilation::default();
        compilation.projections.push(FieldProjection::new(RuleType::Compute, "dob", "c AS dob", "compute.year"));
        compilation.projections.push(FieldProjection::new(RuleType::Generalize, "dob", "g AS dob", "generalize.dob"));
        compilation.projections.push(FieldProjection::new(RuleType::Generalize, "dob", "g2 AS dob", "generalize.dob2"));

        let query = assemble(&TableRef::new("ds", "person"), &columns(&["dob"]), &compilation).unwrap();
        assert_eq!(query.to_sql(), "SELECT g AS dob FROM ds.person");
    }

    #[test]
    fn test_filters_only_apply_to_their_table() {
        let mut compilation = Compilation::default();
        compilation.filters.push(SuppressionFilter {
            predicate: "observation_source_value NOT IN ('x')".into(),
            label: "suppress.a".into(),
        });
        compilation.filters.push(SuppressionFilter {
            predicate: "person_id NOT IN ('1')".into(),
            label: "suppress.b".into(),
        });

        let query = assemble(&TableRef::new("ds", "person"), &columns(&["person_id", "dob"]), &compilation).unwrap();
        assert_eq!(
            query.to_sql(),
            "SELECT person_id, dob FROM ds.person WHERE person_id NOT IN ('1')"
        );
    }

    #[test]
    fn test_empty_category_is_fatal() {
        let mut compilation = Compilation::default();
        compilation.projections.push(
            FieldProjection::new(RuleType::Generalize, "v", "x AS v", "generalize.v").on_value(Some(" ")),
        );
        let err = assemble(&TableRef::new("ds", "observation"), &columns(&["v"]), &compilation).unwrap_err();
        assert!(matches!(err, DeidError::Assembly { .. }));
    }

    #[test]
    fn test_dataset_placeholder() {
        let mut compilation = Compilation::default();
        compilation.projections.push(FieldProjection::new(
            RuleType::Compute,
            "person_id",
            "(SELECT research_id FROM :idataset.deid_map WHERE person_id = :itable.person_id) AS person_id",
            "compute.id",
        ));
        let query = assemble(&TableRef::new("synpuf", "person"), &columns(&["person_id"]), &compilation).unwrap();
        assert_eq!(
            query.to_sql(),
            "SELECT (SELECT research_id FROM synpuf.deid_map WHERE person_id = person.person_id) AS person_id \
             FROM synpuf.person"
        );

        let query = assemble(&TableRef::bare("person"), &columns(&["person_id"]), &compilation).unwrap();
        assert_eq!(
            query.to_sql(),
            "SELECT (SELECT research_id FROM deid_map WHERE person_id = person.person_id) AS person_id FROM person"
        );
    }
}
