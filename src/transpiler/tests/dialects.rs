//! The same rules rendered for each target engine.

use pretty_assertions::assert_eq;

use super::{cache, columns, config};
use crate::ast::{Branch, SqlExpr, TableRef};
use crate::cache::RuleCache;
use crate::compile_table;
use crate::error::DeidError;
use crate::transpiler::{Compiler, Dialect, ToSql};

const OCCUPATION: &str = r#"{"generalize": {"rules": "@generalize.occupation", "fields": ["occupation"]}}"#;

#[test]
fn test_sqlite_dialect() {
    let compilation = Compiler::new(&cache(), Dialect::Sqlite).compile(&config(OCCUPATION));
    assert_eq!(
        compilation.projections[0].sql,
        "CASE WHEN LOWER(occupation) REGEXP LOWER('doctor|nurse') THEN 'clinician' ELSE \
         CASE WHEN LOWER(occupation) REGEXP LOWER('engineer') THEN 'technical' ELSE occupation END END AS occupation"
    );
}

#[test]
fn test_bigquery_dialect() {
    let compilation = Compiler::new(&cache(), Dialect::BigQuery).compile(&config(OCCUPATION));
    assert_eq!(
        compilation.projections[0].sql,
        "IF ( REGEXP_CONTAINS (LOWER(occupation), LOWER('doctor|nurse')) , 'clinician' , \
         IF ( REGEXP_CONTAINS (LOWER(occupation), LOWER('engineer')) , 'technical' , occupation ) ) AS occupation"
    );
}

#[test]
fn test_postgres_dialect_falls_back_to_literal_call() {
    let compilation = Compiler::new(&cache(), Dialect::Postgres).compile(&config(OCCUPATION));
    assert_eq!(
        compilation.projections[0].sql,
        "CASE WHEN REGEXP(occupation, 'doctor|nurse') THEN 'clinician' ELSE \
         CASE WHEN REGEXP(occupation, 'engineer') THEN 'technical' ELSE occupation END END AS occupation"
    );
}

#[test]
fn test_unknown_dialect() {
    let err = "oracle".parse::<Dialect>().unwrap_err();
    assert!(matches!(err, DeidError::Config(_)));
    assert_eq!("BigQuery".parse::<Dialect>().unwrap(), Dialect::BigQuery);
    assert_eq!("postgres".parse::<Dialect>().unwrap(), Dialect::Postgres);
    assert_eq!(Dialect::default(), Dialect::Sqlite);
}

#[test]
fn test_else_quirk_in_every_dialect() {
    let branches = (1..=3)
        .map(|p| Branch::at(p, SqlExpr::raw(format!("c{}", p)), SqlExpr::outcome("x")))
        .collect();
    let expr = SqlExpr::conditional(branches, SqlExpr::column("f")).alias("f");

    assert_eq!(
        expr.to_sql_with_dialect(Dialect::Sqlite),
        "CASE WHEN c1 THEN 'x' ELSE CASE WHEN c2 THEN 'x' ELSE CASE WHEN c3 THEN 'x' f END END END AS f"
    );
    assert_eq!(
        expr.to_sql_with_dialect(Dialect::BigQuery),
        "IF ( c1 , 'x' , IF ( c2 , 'x' , IF ( c3 , 'x' f ) ) ) AS f"
    );
}

#[test]
fn test_shift_defaults_per_dialect() {
    let table_config = config(
        r#"{"suppress": {"rules": "@suppress.WITHDRAWN", "on": "person_id"},
            "shift": {"rules": "@shift.datetime", "fields": ["visit_start_datetime"]}}"#,
    );
    let table = TableRef::new("ds", "visit");
    let table_columns = columns(&["person_id", "visit_start_datetime"]);

    let expected = [
        (
            Dialect::Sqlite,
            "DATETIME(visit_start_datetime, '-' || (random() % 365) || ' days') AS visit_start_datetime",
        ),
        (
            Dialect::BigQuery,
            "TIMESTAMP_SUB(CAST(visit_start_datetime AS TIMESTAMP), INTERVAL (CAST( (RAND() * 364) + 1 AS INT64)) DAY) AS visit_start_datetime",
        ),
        (
            Dialect::Postgres,
            "visit_start_datetime - INTERVAL '1 DAY' * ((random() * 364) + 1 :: int) AS visit_start_datetime",
        ),
    ];

    for (dialect, shifted) in expected {
        let cache = cache().with_dialect_defaults(dialect.profile());
        let query = compile_table(&cache, dialect, &table, &table_columns, &table_config).unwrap();
        assert_eq!(
            query.to_sql(),
            format!("SELECT person_id, {} FROM ds.visit WHERE person_id NOT IN ('10','20')", shifted),
            "{}",
            dialect
        );
    }
}

#[test]
fn test_literal_escaping_per_dialect() {
    let expr = SqlExpr::column("name").in_list("IN", ["o'brien"]);
    assert_eq!(expr.to_sql_with_dialect(Dialect::Postgres), "name IN ('o''brien')");
    assert_eq!(expr.to_sql_with_dialect(Dialect::BigQuery), "name IN ('o\\'brien')");
}

#[test]
fn test_numeric_rule_values_are_bare() {
    let cache = RuleCache::from_json(
        r#"[{"_id": "generalize",
             "gender": [{"values": [8507, 8532], "qualifier": "IN", "into": -1}]}]"#,
    )
    .unwrap();
    let table_config = config(r#"{"generalize": {"rules": "@generalize.gender", "fields": ["gender_concept_id"]}}"#);
    let table = TableRef::new("ds", "person");
    let table_columns = columns(&["person_id", "gender_concept_id"]);

    let query = compile_table(&cache, Dialect::BigQuery, &table, &table_columns, &table_config).unwrap();
    assert_eq!(
        query.to_sql(),
        "SELECT person_id, IF ( gender_concept_id IN (8507,8532) , -1 , gender_concept_id ) AS gender_concept_id \
         FROM ds.person"
    );

    let query = compile_table(&cache, Dialect::Sqlite, &table, &table_columns, &table_config).unwrap();
    assert!(query.to_sql().contains("CASE WHEN gender_concept_id IN (8507,8532) THEN -1 ELSE"));
}
