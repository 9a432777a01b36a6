//! Compilation of one table configuration into projections and filters.

use serde::Serialize;

use crate::ast::{FieldProjection, RuleCitation, RuleType, SuppressionFilters, TableConfig};
use crate::cache::RuleCache;
use crate::error::DeidResult;
use crate::resolver::{resolve, validate};
use crate::transpiler::compute::compute;
use crate::transpiler::dialect::Dialect;
use crate::transpiler::generalize::generalize;
use crate::transpiler::shift::{shift, ShiftSource};
use crate::transpiler::suppress::suppress;

/// A citation left out of the compilation, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCitation {
    pub rule_type: RuleType,
    pub label: String,
    pub reason: String,
}

/// Result of one compilation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Compilation {
    pub projections: Vec<FieldProjection>,
    pub filters: SuppressionFilters,
    /// Best effort: failing citations are skipped, never fatal. Callers
    /// needing strict mode check this is empty.
    pub skipped: Vec<SkippedCitation>,
}

impl Compilation {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Projections that apply to every row.
    pub fn relational(&self) -> impl Iterator<Item = &FieldProjection> {
        self.projections.iter().filter(|p| !p.is_meta())
    }

    pub fn is_meta(&self) -> bool {
        self.projections.iter().any(FieldProjection::is_meta)
    }
}

/// Compiles table configurations against a shared, read-only rule cache.
///
/// Each call to [`Compiler::compile`] owns its own filter sequence, so one
/// compiler can serve many tables.
#[derive(Debug, Clone)]
pub struct Compiler<'a> {
    cache: &'a RuleCache,
    dialect: Dialect,
    shift_source: ShiftSource,
}

impl<'a> Compiler<'a> {
    pub fn new(cache: &'a RuleCache, dialect: Dialect) -> Self {
        Self {
            cache,
            dialect,
            shift_source: ShiftSource::default(),
        }
    }

    pub fn with_shift_source(mut self, source: ShiftSource) -> Self {
        self.shift_source = source;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn compile(&self, config: &TableConfig) -> Compilation {
        let mut compilation = Compilation::default();

        for rule_type in RuleType::EVALUATION_ORDER {
            for citation in config.entries(rule_type) {
                match self.compile_citation(rule_type, citation, &mut compilation.filters) {
                    Ok(projections) => compilation.projections.extend(projections),
                    Err(e) => {
                        let label = citation
                            .reference()
                            .map(str::to_string)
                            .unwrap_or_else(|| rule_type.to_string());
                        tracing::warn!(rule_type = %rule_type, label = %label, "skipping citation: {}", e);
                        compilation.skipped.push(SkippedCitation {
                            rule_type,
                            label,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        compilation
    }

    fn compile_citation(
        &self,
        rule_type: RuleType,
        citation: &RuleCitation,
        filters: &mut SuppressionFilters,
    ) -> DeidResult<Vec<FieldProjection>> {
        validate(rule_type, citation, self.cache)?;
        let rule = resolve(rule_type, citation, self.cache);

        match rule_type {
            RuleType::Generalize => generalize(&rule, self.dialect),
            RuleType::Compute => compute(&rule),
            RuleType::Suppress => suppress(&rule, self.dialect, filters),
            RuleType::Shift => shift(&rule, self.dialect, &self.shift_source, filters),
        }
    }
}
