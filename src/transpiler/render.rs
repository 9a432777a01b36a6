//! Dialect rendering of the SQL expression tree.

use crate::ast::{Branch, Scalar, SqlExpr};
use crate::transpiler::dialect::{Dialect, DialectProfile};
use crate::transpiler::ToSql;

impl ToSql for SqlExpr {
    fn to_sql_with_dialect(&self, dialect: Dialect) -> String {
        render(self, dialect.profile())
    }
}

fn render(expr: &SqlExpr, profile: &DialectProfile) -> String {
    match expr {
        SqlExpr::Column(name) => name.clone(),
        SqlExpr::Literal(value) => profile.quote_literal(value),
        SqlExpr::Number(value) => value.clone(),
        SqlExpr::Raw(sql) => sql.trim().to_string(),
        SqlExpr::InList { expr, op, values } => {
            let list: Vec<String> = values
                .iter()
                .map(|v| match v {
                    Scalar::Number(n) => n.clone(),
                    Scalar::Text(s) => profile.quote_literal(s),
                })
                .collect();
            format!("{} {} ({})", render(expr, profile), op, list.join(","))
        }
        SqlExpr::Qualified { expr, qualifier } => {
            format!("{} {}", render(expr, profile), qualifier)
        }
        SqlExpr::Nested(inner) => format!("({})", render(inner, profile)),
        SqlExpr::Conditional {
            branches,
            fallthrough,
        } => render_conditional(branches, fallthrough, profile),
        SqlExpr::Cast { expr, target_type } => {
            format!("CAST({} AS {})", render(expr, profile), target_type)
        }
        SqlExpr::Aliased { expr, alias } => format!("{} AS {}", render(expr, profile), alias),
    }
}

/// `IF OPEN cond THEN value [ELSE] ... fallthrough CLOSE...`, one CLOSE per branch.
fn render_conditional(branches: &[Branch], fallthrough: &SqlExpr, profile: &DialectProfile) -> String {
    let tokens = &profile.conditional;
    let mut parts: Vec<String> = Vec::new();

    for branch in branches {
        parts.push(tokens.open_if.to_string());
        parts.push(tokens.open.to_string());
        parts.push(render(&branch.condition, profile));
        parts.push(tokens.then.to_string());
        parts.push(render(&branch.outcome, profile));
        if branch.else_token {
            parts.push(tokens.otherwise.to_string());
        }
    }

    parts.push(render(fallthrough, profile));
    parts.extend(std::iter::repeat_n(tokens.close.to_string(), branches.len()));

    parts
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
