pub mod citation;
pub mod expr;
pub mod operators;
pub mod projection;
pub mod rules;
pub mod table;
pub mod values;

pub use self::citation::{RuleCitation, TableConfig};
pub use self::expr::{Branch, SqlExpr};
pub use self::operators::{invert_qualifier, is_aggregate};
pub use self::projection::{CompiledQuery, FieldProjection, SuppressionFilter, SuppressionFilters};
pub use self::rules::{RuleDefinition, RuleType, ValueCondition};
pub use self::table::TableRef;
pub use self::values::Scalar;
