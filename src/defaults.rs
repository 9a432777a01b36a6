//! Rules every table receives on top of its own configuration.

use crate::ast::{RuleCitation, TableConfig, TableRef};

pub const DEMOGRAPHICS_SUPPRESSION: &str = "@suppress.DEMOGRAPHICS-COLUMNS";
pub const SHIFT_DATE: &str = "@shift.date";
pub const SHIFT_DATETIME: &str = "@shift.datetime";

/// Add the default suppression and date-shift citations for a table.
///
/// Without a suppress entry the demographics suppression is cited over
/// every column; existing demographics citations get bound to the table and
/// its columns. Date and time columns are appended to the shift entries.
pub fn apply_defaults(mut config: TableConfig, table: &TableRef, columns: &[String]) -> TableConfig {
    let table_name = table.to_string();

    if config.suppress.is_empty() {
        config.suppress.push(
            RuleCitation::cite(DEMOGRAPHICS_SUPPRESSION)
                .table(&table_name)
                .fields(columns.iter().cloned()),
        );
    } else {
        for citation in &mut config.suppress {
            let is_demographics = citation
                .reference()
                .is_some_and(|reference| reference.ends_with("DEMOGRAPHICS-COLUMNS"));
            if is_demographics {
                citation.table = Some(table_name.clone());
                citation.fields = columns.to_vec();
            }
        }
    }

    let (datetimes, dates): (Vec<&String>, Vec<&String>) = columns
        .iter()
        .filter(|name| is_date_column(name))
        .partition(|name| name.contains("time"));

    for (reference, fields) in [(SHIFT_DATE, dates), (SHIFT_DATETIME, datetimes)] {
        if !fields.is_empty() {
            config.shift.push(RuleCitation::cite(reference).fields(fields.into_iter().cloned()));
        }
    }

    tracing::debug!(table = %table, shift = config.shift.len(), "applied default rules");
    config
}

/// A column whose `_`-separated name parts include date, time or datetime.
pub fn is_date_column(name: &str) -> bool {
    name.split('_')
        .any(|part| matches!(part, "date" | "time" | "datetime"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_default_suppression_is_added() {
        let table = TableRef::new("synpuf", "person");
        let config = apply_defaults(TableConfig::default(), &table, &columns(&["person_id", "ssn"]));

        assert_eq!(
            config.suppress,
            vec![RuleCitation::cite(DEMOGRAPHICS_SUPPRESSION)
                .table("synpuf.person")
                .fields(["person_id", "ssn"])]
        );
        assert!(config.shift.is_empty());
    }

    #[test]
    fn test_existing_demographics_citation_is_bound() {
        let table = TableRef::new("synpuf", "person");
        let config = TableConfig::default()
            .with(
                crate::ast::RuleType::Suppress,
                RuleCitation::cite(DEMOGRAPHICS_SUPPRESSION),
            )
            .with(
                crate::ast::RuleType::Suppress,
                RuleCitation::cite("@suppress.WITHDRAWN").on("person_id"),
            );
        let config = apply_defaults(config, &table, &columns(&["person_id", "ssn"]));

        assert_eq!(config.suppress.len(), 2);
        assert_eq!(config.suppress[0].fields, columns(&["person_id", "ssn"]));
        assert_eq!(config.suppress[0].table.as_deref(), Some("synpuf.person"));
        assert!(config.suppress[1].fields.is_empty());
    }

    #[test]
    fn test_date_columns_are_shifted() {
        let table = TableRef::new("synpuf", "visit_occurrence");
        let config = TableConfig::default().with(
            crate::ast::RuleType::Shift,
            RuleCitation::cite("@shift.date").fields(["custom_day"]),
        );
        let config = apply_defaults(
            config,
            &table,
            &columns(&[
                "visit_start_date",
                "visit_start_datetime",
                "visit_end_time",
                "update_dates",
                "person_id",
            ]),
        );

        assert_eq!(config.shift.len(), 3);
        assert_eq!(config.shift[1].reference(), Some(SHIFT_DATE));
        assert_eq!(config.shift[1].fields, columns(&["visit_start_date"]));
        assert_eq!(config.shift[2].reference(), Some(SHIFT_DATETIME));
        assert_eq!(config.shift[2].fields, columns(&["visit_start_datetime", "visit_end_time"]));
    }

    #[test]
    fn test_is_date_column() {
        assert!(is_date_column("birth_datetime"));
        assert!(is_date_column("date"));
        assert!(!is_date_column("update_dates"));
        assert!(!is_date_column("mandate"));
    }
}
