//! Compiler scenario tests.
//!
//! Tests are organized by category:
//! - `core`: end-to-end compilation of relational tables
//! - `dialects`: the same rules rendered for each target engine
//! - `meta`: UNION ALL partitioning of meta tables

mod core;
mod dialects;

use crate::ast::TableConfig;
use crate::cache::RuleCache;

pub(super) const RULES: &str = r#"[
    {"_id": "generalize",
     "race": [{"values": ["W", "B"], "qualifier": "IN", "into": "OTHER"}],
     "occupation": [
        {"apply": "REGEXP", "values": ["doctor", "nurse"], "into": "clinician"},
        {"apply": "REGEXP", "values": ["engineer"], "into": "technical"}
     ]},
    {"_id": "suppress",
     "DEMOGRAPHICS-COLUMNS": [{"values": ["ssn", "race_source_value", "provider_id"]}],
     "WITHDRAWN": [{"values": ["10", "20"]}]},
    {"_id": "compute",
     "shifted": "DATE_ADD(:FIELD, 1) AS :FIELD"}
]"#;

pub(super) fn cache() -> RuleCache {
    RuleCache::from_json(RULES).unwrap()
}

pub(super) fn config(json: &str) -> TableConfig {
    TableConfig::from_json(json).unwrap()
}

pub(super) fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}
