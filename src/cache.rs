//! The rule cache: rule type → rule id → definition.
//!
//! Loaded once from the rule file, then shared read-only by every
//! compilation run.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;

use serde_json::Value;

use crate::ast::{RuleDefinition, RuleType};
use crate::error::{DeidError, DeidResult};
use crate::transpiler::DialectProfile;

/// Compute templates available under every rule file.
pub const BUILTIN_COMPUTE: [(&str, &str); 4] = [
    ("year", "EXTRACT(YEAR FROM :FIELD) AS :FIELD"),
    ("month", "EXTRACT(MONTH FROM :FIELD) AS :FIELD"),
    ("day", "EXTRACT(DAY FROM :FIELD) AS :FIELD"),
    (
        "id",
        "(SELECT :value_field FROM :table WHERE :key_field = :key_value) AS :FIELD",
    ),
];

#[derive(Debug, Clone)]
pub struct RuleCache {
    rules: HashMap<RuleType, BTreeMap<String, RuleDefinition>>,
}

impl Default for RuleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleCache {
    /// An empty cache holding only the built-in compute templates.
    pub fn new() -> Self {
        let mut cache = Self {
            rules: HashMap::new(),
        };
        for (rule_id, template) in BUILTIN_COMPUTE {
            cache.insert(RuleType::Compute, rule_id, RuleDefinition::template(template));
        }
        cache
    }

    /// Load a rule file: a JSON array of `{"_id": "<rule type>", "<rule id>": <definition>, ...}`.
    pub fn from_json(text: &str) -> DeidResult<Self> {
        let documents: Vec<serde_json::Map<String, Value>> = serde_json::from_str(text)?;
        let mut cache = Self::new();

        for (index, document) in documents.into_iter().enumerate() {
            let rule_type = match document.get("_id") {
                Some(Value::String(id)) => RuleType::from_str(id)?,
                _ => {
                    return Err(DeidError::Config(format!(
                        "rule document #{} has no string '_id'",
                        index
                    )));
                }
            };

            for (rule_id, body) in document {
                if rule_id == "_id" {
                    continue;
                }
                let definition: RuleDefinition = serde_json::from_value(body).map_err(|e| {
                    DeidError::Config(format!("rule '{}.{}': {}", rule_type, rule_id, e))
                })?;
                cache.insert(rule_type, &rule_id, definition);
            }
        }

        tracing::debug!(
            rules = cache.len(),
            "Loaded rule cache ({} generalize, {} suppress, {} shift, {} compute)",
            cache.count(RuleType::Generalize),
            cache.count(RuleType::Suppress),
            cache.count(RuleType::Shift),
            cache.count(RuleType::Compute),
        );

        Ok(cache)
    }

    pub fn from_path(path: impl AsRef<Path>) -> DeidResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Register a rule under a rule-type name, rejecting unknown names.
    pub fn set(
        &mut self,
        rule_type: &str,
        rule_id: &str,
        definition: impl Into<RuleDefinition>,
    ) -> DeidResult<()> {
        let rule_type = RuleType::from_str(rule_type)?;
        self.insert(rule_type, rule_id, definition.into());
        Ok(())
    }

    pub fn insert(&mut self, rule_type: RuleType, rule_id: &str, definition: RuleDefinition) {
        self.rules
            .entry(rule_type)
            .or_default()
            .insert(rule_id.to_string(), definition);
    }

    /// Builder form of [`RuleCache::insert`].
    pub fn with(mut self, rule_type: RuleType, rule_id: &str, definition: impl Into<RuleDefinition>) -> Self {
        self.insert(rule_type, rule_id, definition.into());
        self
    }

    /// Seed shift templates from the dialect where the rule file has none.
    pub fn with_dialect_defaults(mut self, dialect: &DialectProfile) -> Self {
        let shifts = self.rules.entry(RuleType::Shift).or_default();
        for (rule_id, template) in dialect.shift_templates {
            shifts
                .entry((*rule_id).to_string())
                .or_insert_with(|| RuleDefinition::template(*template));
        }
        self
    }

    pub fn get(&self, rule_type: RuleType, rule_id: &str) -> Option<&RuleDefinition> {
        self.rules.get(&rule_type)?.get(rule_id)
    }

    pub fn contains(&self, rule_type: RuleType, rule_id: &str) -> bool {
        self.get(rule_type, rule_id).is_some()
    }

    pub fn rule_ids(&self, rule_type: RuleType) -> impl Iterator<Item = &str> {
        self.rules
            .get(&rule_type)
            .into_iter()
            .flat_map(|rules| rules.keys().map(String::as_str))
    }

    pub fn count(&self, rule_type: RuleType) -> usize {
        self.rules.get(&rule_type).map_or(0, BTreeMap::len)
    }

    pub fn len(&self) -> usize {
        self.rules.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
