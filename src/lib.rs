//! # deid: de-identification rule compiler
//!
//! Compiles declarative de-identification rules (generalize, suppress,
//! shift, compute) into SQL for a chosen engine dialect.
//!
//! ## Quick Example
//!
//! ```rust
//! use deid::prelude::*;
//!
//! let cache = RuleCache::from_json(
//!     r#"[{"_id": "generalize",
//!          "race": [{"values": ["W", "B"], "qualifier": "IN", "into": "OTHER"}]}]"#,
//! )
//! .unwrap();
//! let config = TableConfig::from_json(
//!     r#"{"generalize": [{"rules": "@generalize.race", "fields": ["race"]}]}"#,
//! )
//! .unwrap();
//!
//! let query = deid::compile_table(
//!     &cache,
//!     Dialect::Sqlite,
//!     &TableRef::new("synpuf", "person"),
//!     &["person_id".to_string(), "race".to_string()],
//!     &config,
//! )
//! .unwrap();
//! assert!(query.to_sql().starts_with("SELECT person_id, CASE WHEN race IN ('W','B')"));
//! ```
//!
//! ## Rule types
//!
//! | Type         | Effect                                        |
//! |--------------|-----------------------------------------------|
//! | `generalize` | replaces matching values with a coarser one   |
//! | `suppress`   | blanks columns or drops rows                  |
//! | `shift`      | moves dates by a per-person offset            |
//! | `compute`    | replaces a column with a derived expression   |

pub mod ast;
pub mod cache;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod parser;
pub mod resolver;
pub mod schema;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::cache::RuleCache;
    pub use crate::config::DeidConfig;
    pub use crate::engine::{
        wait_on_jobs, Backoff, Destination, JobHandle, JobState, QueryExecutor, SqlFileExecutor,
        WriteDisposition,
    };
    pub use crate::error::*;
    pub use crate::schema::{JsonSchemaProvider, SchemaProvider};
    pub use crate::transpiler::{assemble, Compilation, Compiler, Dialect, ShiftSource, ToSql};
}

use ast::{CompiledQuery, TableConfig, TableRef};
use cache::RuleCache;
use error::DeidResult;
use transpiler::{Compiler, Dialect};

/// Compile one table's rule configuration into its final query.
///
/// Citations that fail to resolve or render are skipped; use
/// [`Compiler::compile`] directly to inspect what was left out.
pub fn compile_table(
    cache: &RuleCache,
    dialect: Dialect,
    table: &TableRef,
    columns: &[String],
    config: &TableConfig,
) -> DeidResult<CompiledQuery> {
    let compilation = Compiler::new(cache, dialect).compile(config);
    transpiler::assemble(table, columns, &compilation)
}
