//! Rule compiler: handlers, dialect rendering and query assembly.
//!
//! Turns resolved rule citations into field projections and row filters,
//! then assembles them into executable SQL.

pub mod assembler;
pub mod compiler;
pub mod compute;
pub mod dialect;
pub mod generalize;
pub mod render;
pub mod shift;
pub mod suppress;

#[cfg(test)]
mod tests;

pub use assembler::assemble;
pub use compiler::{Compilation, Compiler, SkippedCitation};
pub use dialect::{ConditionalTokens, Dialect, DialectProfile};
pub use shift::ShiftSource;

/// Trait for converting expression nodes to SQL.
pub trait ToSql {
    /// Convert this node to a SQL string using default dialect.
    fn to_sql(&self) -> String {
        self.to_sql_with_dialect(Dialect::default())
    }
    /// Convert this node to a SQL string with specific dialect.
    fn to_sql_with_dialect(&self, dialect: Dialect) -> String;
}
