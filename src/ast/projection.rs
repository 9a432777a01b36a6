//! Compilation products: field projections, row filters and final queries.

use serde::Serialize;

use crate::ast::rules::RuleType;

/// A rewritten column: `sql` replaces the raw column name in the SELECT list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldProjection {
    pub name: String,
    pub sql: String,
    pub label: String,
    pub rule_type: RuleType,
    /// Category predicate; present only for meta (EAV) tables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_value: Option<String>,
}

impl FieldProjection {
    pub fn new(rule_type: RuleType, name: &str, sql: impl Into<String>, label: &str) -> Self {
        Self {
            name: name.to_string(),
            sql: sql.into(),
            label: label.to_string(),
            rule_type,
            on_value: None,
        }
    }

    pub fn on_value(mut self, on_value: Option<&str>) -> Self {
        self.on_value = on_value.map(str::to_string);
        self
    }

    pub fn is_meta(&self) -> bool {
        self.on_value.is_some()
    }
}

/// A row-exclusion predicate, applied as WHERE/AND.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuppressionFilter {
    pub predicate: String,
    pub label: String,
}

/// The ordered, append-only filter sequence of one compilation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuppressionFilters(Vec<SuppressionFilter>);

impl SuppressionFilters {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, filter: SuppressionFilter) {
        self.0.push(filter);
    }

    pub fn extend(&mut self, filters: impl IntoIterator<Item = SuppressionFilter>) {
        self.0.extend(filters);
    }

    pub fn contains(&self, predicate: &str) -> bool {
        self.0.iter().any(|filter| filter.predicate == predicate)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SuppressionFilter> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a SuppressionFilters {
    type Item = &'a SuppressionFilter;
    type IntoIter = std::slice::Iter<'a, SuppressionFilter>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Final SQL for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CompiledQuery {
    /// Relational table: one SELECT.
    Single(String),
    /// Meta table: one branch per category plus the residual branch, last.
    UnionAll(Vec<String>),
}

impl CompiledQuery {
    pub const UNION_ALL: &'static str = "\nUNION ALL\n";

    pub fn branches(&self) -> Vec<&str> {
        match self {
            CompiledQuery::Single(sql) => vec![sql.as_str()],
            CompiledQuery::UnionAll(branches) => branches.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_meta(&self) -> bool {
        matches!(self, CompiledQuery::UnionAll(_))
    }

    pub fn to_sql(&self) -> String {
        match self {
            CompiledQuery::Single(sql) => sql.clone(),
            CompiledQuery::UnionAll(branches) => branches.join(Self::UNION_ALL),
        }
    }
}

impl std::fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_sql())
    }
}
