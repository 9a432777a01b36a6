//! SQL expression tree produced by the rule handlers.
//!
//! Handlers build expressions; the transpiler renders them for a dialect.

use serde::{Deserialize, Serialize};

use crate::ast::values::Scalar;

/// A SQL fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlExpr {
    /// A column reference, written verbatim.
    Column(String),
    /// A quoted string literal ('value').
    Literal(String),
    /// An unquoted numeric literal.
    Number(String),
    /// Pre-rendered SQL (an expanded template).
    Raw(String),
    /// Membership test: `expr op ('v1',2)`
    InList {
        expr: Box<SqlExpr>,
        op: String,
        values: Vec<Scalar>,
    },
    /// A predicate followed by a qualifier: `expr IS FALSE`, `(subquery) > 5`
    Qualified {
        expr: Box<SqlExpr>,
        qualifier: String,
    },
    /// Parenthesized expression
    Nested(Box<SqlExpr>),
    /// Chain of conditional branches ending with a fall-through value.
    Conditional {
        branches: Vec<Branch>,
        fallthrough: Box<SqlExpr>,
    },
    /// CAST(expr AS type)
    Cast {
        expr: Box<SqlExpr>,
        target_type: String,
    },
    /// expr AS alias
    Aliased { expr: Box<SqlExpr>, alias: String },
}

/// One `IF cond THEN outcome` step of a conditional chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub condition: SqlExpr,
    pub outcome: SqlExpr,
    /// Whether an ELSE token follows this branch.
    pub else_token: bool,
}

impl Branch {
    /// Build the branch at 1-based `position` of a condition list.
    pub fn at(position: usize, condition: SqlExpr, outcome: SqlExpr) -> Self {
        Self {
            condition,
            outcome,
            else_token: else_follows(position),
        }
    }
}

/// ELSE follows a branch when its 1-based position is even or not a
/// multiple of 3; positions 3, 9, 15, ... get none.
pub fn else_follows(position: usize) -> bool {
    position % 2 == 0 || position % 3 != 0
}

impl SqlExpr {
    pub fn column(name: &str) -> Self {
        SqlExpr::Column(name.to_string())
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        SqlExpr::Raw(sql.into())
    }

    /// The replacement value of a branch: numbers stay bare.
    pub fn outcome(into: impl Into<Scalar>) -> Self {
        match into.into() {
            Scalar::Number(n) => SqlExpr::Number(n),
            Scalar::Text(s) => SqlExpr::Literal(s),
        }
    }

    pub fn in_list<I, S>(self, op: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        SqlExpr::InList {
            expr: Box::new(self),
            op: op.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Append a qualifier; an empty qualifier leaves the expression as is.
    pub fn qualified(self, qualifier: &str) -> Self {
        if qualifier.trim().is_empty() {
            self
        } else {
            SqlExpr::Qualified {
                expr: Box::new(self),
                qualifier: qualifier.trim().to_string(),
            }
        }
    }

    pub fn nested(self) -> Self {
        SqlExpr::Nested(Box::new(self))
    }

    pub fn cast(self, target_type: &str) -> Self {
        SqlExpr::Cast {
            expr: Box::new(self),
            target_type: target_type.to_string(),
        }
    }

    pub fn alias(self, alias: &str) -> Self {
        SqlExpr::Aliased {
            expr: Box::new(self),
            alias: alias.to_string(),
        }
    }

    pub fn conditional(branches: Vec<Branch>, fallthrough: SqlExpr) -> Self {
        SqlExpr::Conditional {
            branches,
            fallthrough: Box::new(fallthrough),
        }
    }

    /// Number of opened conditionals, i.e. CLOSE tokens the renderer emits.
    pub fn open_count(&self) -> usize {
        match self {
            SqlExpr::Conditional { branches, .. } => branches.len(),
            SqlExpr::Aliased { expr, .. } | SqlExpr::Cast { expr, .. } | SqlExpr::Nested(expr) => {
                expr.open_count()
            }
            _ => 0,
        }
    }
}
