use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DeidError;

/// Supported target engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dialect {
    #[default]
    #[serde(rename = "sqlite")]
    Sqlite,
    #[serde(rename = "bigquery")]
    BigQuery,
    #[serde(rename = "postgresql", alias = "postgres")]
    Postgres,
}

/// Tokens of a conditional chain: `IF OPEN cond THEN value ELSE ... CLOSE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionalTokens {
    pub open_if: &'static str,
    pub open: &'static str,
    pub then: &'static str,
    pub otherwise: &'static str,
    pub close: &'static str,
}

/// SQL fragments specific to one target engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectProfile {
    pub name: &'static str,
    pub conditional: ConditionalTokens,
    /// Function templates keyed by function name.
    pub functions: &'static [(&'static str, &'static str)],
    /// Random day offset used for date shifting.
    pub random: &'static str,
    /// Type that meta-table values are cast to.
    pub string_type: &'static str,
    /// Shift templates seeded into the rule cache when the rule file has none.
    pub shift_templates: &'static [(&'static str, &'static str)],
    /// How a single quote is escaped inside a literal.
    pub quote_escape: &'static str,
}

const CASE_WHEN: ConditionalTokens = ConditionalTokens {
    open_if: "CASE WHEN",
    open: "",
    then: "THEN",
    otherwise: "ELSE",
    close: "END",
};

static SQLITE: DialectProfile = DialectProfile {
    name: "sqlite",
    conditional: CASE_WHEN,
    functions: &[
        ("REGEXP", "LOWER(:FIELD) REGEXP LOWER(':VAR')"),
        ("COUNT", "SELECT COUNT(DISTINCT :FIELD) FROM :TABLE WHERE :KEY=:VALUE"),
        (
            "COUNT-DISTINCT",
            "SELECT COUNT(DISTINCT :ALIAS.:DISTINCT_FIELD) FROM :DATASET.:TABLE AS :ALIAS WHERE :KEY=:VALUE",
        ),
    ],
    random: "random() % 365",
    string_type: "TEXT",
    shift_templates: &[
        ("date", "DATE(:FIELD, '-' || (:SHIFT) || ' days') AS :FIELD"),
        ("datetime", "DATETIME(:FIELD, '-' || (:SHIFT) || ' days') AS :FIELD"),
    ],
    quote_escape: "''",
};

static BIGQUERY: DialectProfile = DialectProfile {
    name: "bigquery",
    conditional: ConditionalTokens {
        open_if: "IF",
        open: "(",
        then: ",",
        otherwise: ",",
        close: ")",
    },
    functions: &[
        ("REGEXP", "REGEXP_CONTAINS (LOWER(:FIELD), LOWER(':VAR'))"),
        ("COUNT", "SELECT COUNT (DISTINCT :KEY) FROM :TABLE WHERE :KEY=:VALUE"),
        (
            "COUNT-DISTINCT",
            "SELECT COUNT (DISTINCT :ALIAS.:DISTINCT_FIELD) FROM :DATASET.:TABLE AS :ALIAS WHERE :KEY=:VALUE",
        ),
    ],
    random: "CAST( (RAND() * 364) + 1 AS INT64)",
    string_type: "STRING",
    shift_templates: &[
        ("date", "DATE_SUB(CAST(:FIELD AS DATE), INTERVAL (:SHIFT) DAY) AS :FIELD"),
        (
            "datetime",
            "TIMESTAMP_SUB(CAST(:FIELD AS TIMESTAMP), INTERVAL (:SHIFT) DAY) AS :FIELD",
        ),
    ],
    quote_escape: "\\'",
};

// No function templates: function-based conditions take the literal fallback.
static POSTGRES: DialectProfile = DialectProfile {
    name: "postgresql",
    conditional: CASE_WHEN,
    functions: &[],
    random: "(random() * 364) + 1 :: int",
    string_type: "TEXT",
    shift_templates: &[
        ("date", ":FIELD - INTERVAL '1 DAY' * (:SHIFT) AS :FIELD"),
        ("datetime", ":FIELD - INTERVAL '1 DAY' * (:SHIFT) AS :FIELD"),
    ],
    quote_escape: "''",
};

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::Sqlite, Dialect::BigQuery, Dialect::Postgres];

    pub fn profile(&self) -> &'static DialectProfile {
        match self {
            Dialect::Sqlite => &SQLITE,
            Dialect::BigQuery => &BIGQUERY,
            Dialect::Postgres => &POSTGRES,
        }
    }

    pub fn name(&self) -> &'static str {
        self.profile().name
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = DeidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "bigquery" => Ok(Dialect::BigQuery),
            "postgresql" | "postgres" => Ok(Dialect::Postgres),
            other => Err(DeidError::Config(format!(
                "unknown dialect '{}', expected one of sqlite, bigquery, postgresql",
                other
            ))),
        }
    }
}

impl DialectProfile {
    /// Function template by name (case-insensitive).
    pub fn function(&self, name: &str) -> Option<&'static str> {
        self.functions
            .iter()
            .find(|(function, _)| function.eq_ignore_ascii_case(name.trim()))
            .map(|(_, template)| *template)
    }

    pub fn has_functions(&self) -> bool {
        !self.functions.is_empty()
    }

    /// Quote a string literal, escaping embedded quotes.
    pub fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', self.quote_escape))
    }
}
