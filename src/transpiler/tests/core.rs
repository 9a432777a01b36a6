//! End-to-end compilation of relational tables.

use pretty_assertions::assert_eq;

use super::{cache, columns, config};
use crate::ast::{invert_qualifier, CompiledQuery, FieldProjection, RuleCitation, RuleType, TableRef, ValueCondition};
use crate::cache::RuleCache;
use crate::compile_table;
use crate::transpiler::assembler::select_list;
use crate::transpiler::{Compiler, Dialect};

#[test]
fn test_suppress_column_without_rules() {
    let query = compile_table(
        &RuleCache::new(),
        Dialect::Sqlite,
        &TableRef::new("dataset", "table"),
        &columns(&["id", "ssn", "dob"]),
        &config(r#"{"suppress": {"fields": ["ssn"]}}"#),
    )
    .unwrap();
    assert_eq!(query, CompiledQuery::Single("SELECT id, '' AS ssn, dob FROM dataset.table".into()));
}

#[test]
fn test_person_table() {
    let cache = cache().with_dialect_defaults(Dialect::Sqlite.profile());
    let table_config = config(
        r#"{
            "generalize": [
                {"rules": "@generalize.race", "fields": ["race_source_value"]},
                {"rules": "@generalize.occupation", "fields": ["occupation"]}
            ],
            "suppress": [
                {"rules": "@suppress.DEMOGRAPHICS-COLUMNS",
                 "fields": ["person_id", "race_source_value", "ssn", "occupation", "birth_date"]},
                {"rules": "@suppress.WITHDRAWN", "on": "person_id"}
            ],
            "shift": {"rules": "@shift.date", "fields": ["birth_date"]}
        }"#,
    );

    let query = compile_table(
        &cache,
        Dialect::Sqlite,
        &TableRef::new("synpuf", "person"),
        &columns(&["person_id", "race_source_value", "ssn", "occupation", "birth_date"]),
        &table_config,
    )
    .unwrap();

    assert_eq!(
        query.to_sql(),
        "SELECT person_id, \
         CASE WHEN race_source_value IN ('W','B') THEN 'OTHER' ELSE race_source_value END AS race_source_value, \
         '' AS ssn, \
         CASE WHEN LOWER(occupation) REGEXP LOWER('doctor|nurse') THEN 'clinician' ELSE \
         CASE WHEN LOWER(occupation) REGEXP LOWER('engineer') THEN 'technical' ELSE occupation END END AS occupation, \
         DATE(birth_date, '-' || (random() % 365) || ' days') AS birth_date \
         FROM synpuf.person WHERE person_id NOT IN ('10','20')"
    );
}

#[test]
fn test_projection_count_matches_columns() {
    let cache = cache().with_dialect_defaults(Dialect::Sqlite.profile());
    let table_columns = columns(&["person_id", "race_source_value", "ssn", "occupation", "birth_date"]);
    let configs = [
        r#"{}"#,
        r#"{"suppress": {"fields": ["ssn", "not_a_column"]}}"#,
        r#"{"generalize": [{"rules": "@generalize.race", "fields": ["race_source_value", "ssn"]}],
            "compute": {"rules": "@compute.year", "fields": ["birth_date"]}}"#,
        r#"{"suppress": [{"rules": "@suppress.WITHDRAWN", "on": "person_id"}],
            "shift": {"rules": "@shift.date", "fields": ["birth_date"]}}"#,
    ];

    for json in configs {
        let compilation = Compiler::new(&cache, Dialect::Sqlite).compile(&config(json));
        let relational: Vec<&FieldProjection> = compilation.relational().collect();
        assert_eq!(select_list(&table_columns, &relational).len(), table_columns.len(), "{}", json);
    }
}

#[test]
fn test_missing_rule_is_skipped_not_fatal() {
    let table_config = config(
        r#"{"generalize": [
            {"rules": "@generalize.ethnicity", "fields": ["ethnicity_source_value"]},
            {"rules": "@generalize.race", "fields": ["race_source_value"]}
        ]}"#,
    );
    let compilation = Compiler::new(&cache(), Dialect::Sqlite).compile(&table_config);

    assert_eq!(compilation.projections.len(), 1);
    assert_eq!(compilation.projections[0].label, "generalize.race");
    assert_eq!(compilation.skipped.len(), 1);
    assert_eq!(compilation.skipped[0].label, "@generalize.ethnicity");
    assert_eq!(compilation.skipped[0].rule_type, RuleType::Generalize);
    assert!(!compilation.is_complete());
}

#[test]
fn test_shift_without_row_filter_is_a_no_op() {
    let cache = cache().with_dialect_defaults(Dialect::Sqlite.profile());
    let compilation = Compiler::new(&cache, Dialect::Sqlite)
        .compile(&config(r#"{"shift": {"rules": "@shift.date", "fields": ["birth_date"]}}"#));
    assert!(compilation.projections.is_empty());
    assert!(compilation.is_complete());
}

#[test]
fn test_filters_are_scoped_per_run() {
    let cache = cache();
    let compiler = Compiler::new(&cache, Dialect::Sqlite);

    let first = compiler.compile(&config(r#"{"suppress": {"rules": "@suppress.WITHDRAWN", "on": "person_id"}}"#));
    let second = compiler.compile(&config(r#"{"generalize": {"rules": "@generalize.race", "fields": ["race"]}}"#));

    assert_eq!(first.filters.len(), 1);
    assert!(second.filters.is_empty());
}

#[test]
fn test_inline_generalize_round_trip() {
    let table_config = crate::ast::TableConfig::default().with(
        RuleType::Generalize,
        RuleCitation::inline(ValueCondition::inline(["a", "b"], "IN", "y")).fields(["x"]),
    );
    let compilation = Compiler::new(&RuleCache::new(), Dialect::Sqlite).compile(&table_config);
    let sql = &compilation.projections[0].sql;

    assert!(sql.contains("x IN ('a','b')"));
    assert_eq!(sql.matches("CASE WHEN").count(), 1);
    assert_eq!(sql.matches("THEN").count(), 1);
    assert_eq!(sql.matches("END").count(), 1);
}

#[test]
fn test_row_filter_uses_inverted_qualifier() {
    for (qualifier, inverted) in [("IN", "NOT IN"), ("=", "<>"), ("NOT IN", "IN"), ("<>", "=")] {
        let table_config = crate::ast::TableConfig::default().with(
            RuleType::Suppress,
            RuleCitation::inline(ValueCondition::inline(["1"], qualifier, ""))
                .on("code")
                .qualifier(qualifier),
        );
        let compilation = Compiler::new(&RuleCache::new(), Dialect::Sqlite).compile(&table_config);
        let filter = compilation.filters.iter().next().unwrap();
        assert_eq!(filter.predicate, format!("code {} ('1')", inverted));
        assert_eq!(invert_qualifier(qualifier), Some(inverted));
    }
    assert_eq!(invert_qualifier(""), Some("IS FALSE"));
    assert_eq!(invert_qualifier("TRUE"), Some("IS FALSE"));
}

#[test]
fn test_compute_built_in_and_rule_file_templates() {
    let table_config = config(
        r#"{"compute": [
            {"rules": "@compute.year", "fields": ["year_of_birth"]},
            {"rules": "@compute.shifted", "fields": ["visit_date"]}
        ]}"#,
    );
    let query = compile_table(
        &cache(),
        Dialect::Sqlite,
        &TableRef::new("ds", "visit"),
        &columns(&["visit_date", "year_of_birth"]),
        &table_config,
    )
    .unwrap();
    assert_eq!(
        query.to_sql(),
        "SELECT DATE_ADD(visit_date, 1) AS visit_date, EXTRACT(YEAR FROM year_of_birth) AS year_of_birth FROM ds.visit"
    );
}

#[test]
fn test_compilation_is_deterministic() {
    let cache = cache();
    let table_config = config(r#"{"generalize": {"rules": "@generalize.race", "fields": ["race"]}}"#);
    let compiler = Compiler::new(&cache, Dialect::BigQuery);
    assert_eq!(compiler.compile(&table_config), compiler.compile(&table_config));
}

#[test]
fn test_id_lookup_reads_the_outer_row() {
    let table_config = config(
        r#"{"compute": {"rules": "@compute.id", "fields": ["person_id"],
                        "key_field": "person_id", "value_field": "research_id",
                        "table": ":idataset.deid_map"}}"#,
    );
    let query = compile_table(
        &cache(),
        Dialect::Sqlite,
        &TableRef::new("synpuf", "person"),
        &columns(&["person_id", "gender"]),
        &table_config,
    )
    .unwrap();
    assert_eq!(
        query.to_sql(),
        "SELECT (SELECT research_id FROM synpuf.deid_map WHERE person_id = person.person_id) AS person_id, \
         gender FROM synpuf.person"
    );
}

#[test]
fn test_copy_to_fills_sibling_columns() {
    let table_config = config(
        r#"{"generalize": {"rules": "@generalize.race", "fields": ["race_source_value"],
                           "copy_to": ["race_concept_id"]}}"#,
    );
    let query = compile_table(
        &cache(),
        Dialect::Sqlite,
        &TableRef::new("ds", "person"),
        &columns(&["person_id", "race_source_value", "race_concept_id"]),
        &table_config,
    )
    .unwrap();
    assert_eq!(
        query.to_sql(),
        "SELECT person_id, \
         CASE WHEN race_source_value IN ('W','B') THEN 'OTHER' ELSE race_source_value END AS race_source_value, \
         CASE WHEN race_source_value IN ('W','B') THEN 'OTHER' ELSE race_source_value END AS race_concept_id \
         FROM ds.person"
    );
}
