//! Small nom parsers over rule text.
//!
//! ```text
//! @generalize.race          citation: rule type + rule id
//! person_id IN ('1','2')    membership predicate (meta categories, filters)
//! ```

use std::collections::BTreeSet;

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_till1, take_while, take_while1},
    character::complete::{anychar, char, multispace0, multispace1},
    combinator::{map, value},
    multi::many0,
    sequence::delimited,
    IResult,
};

use crate::ast::invert_qualifier;

/// A parsed `@<rule_type>.<rule_id>` reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Citation<'a> {
    pub rule_type: &'a str,
    pub rule_id: &'a str,
}

impl Citation<'_> {
    /// Label used in logs and projections: `<rule_type>.<rule_id>`.
    pub fn label(&self) -> String {
        format!("{}.{}", self.rule_type, self.rule_id)
    }
}

/// Parse a citation; anything else (inline template, no dot, extra dots) is `None`.
pub fn parse_citation(input: &str) -> Option<Citation<'_>> {
    match citation(input.trim()) {
        Ok(("", parsed)) => Some(parsed),
        _ => None,
    }
}

fn citation(input: &str) -> IResult<&str, Citation<'_>> {
    let (input, _) = char('@')(input)?;
    let (input, rule_type) = parse_identifier(input)?;
    let (input, _) = char('.')(input)?;
    let (input, rule_id) = take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-')(input)?;
    Ok((input, Citation { rule_type, rule_id }))
}

/// Parse an identifier (rule type, column name).
fn parse_identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

/// One lexical token: identifiers are kept, quoted literals and punctuation dropped.
fn token(input: &str) -> IResult<&str, Option<&str>> {
    alt((
        value(
            None,
            delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
        ),
        map(parse_identifier, Some),
        value(None, anychar),
    ))(input)
}

/// Identifier tokens of a SQL expression, used to match filters to table columns.
pub fn column_tokens(expr: &str) -> BTreeSet<&str> {
    match many0(token)(expr) {
        Ok((_, tokens)) => tokens.into_iter().flatten().collect(),
        Err(_) => BTreeSet::new(),
    }
}

/// A simple `lhs op rhs` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership<'a> {
    pub lhs: &'a str,
    pub op: &'a str,
    pub rhs: &'a str,
}

fn membership(input: &str) -> IResult<&str, Membership<'_>> {
    let (input, lhs) = take_till1(char::is_whitespace)(input)?;
    let (input, _) = multispace1(input)?;
    let (input, op) = alt((
        tag_no_case("NOT IN"),
        tag_no_case("IN"),
        tag("<>"),
        tag("!="),
        tag("="),
    ))(input)?;
    let (input, _) = multispace0(input)?;
    Ok(("", Membership { lhs, op, rhs: input.trim() }))
}

/// Parse `col IN (...)`, `col NOT IN (...)`, `col = v`, `col <> v`.
///
/// Compound predicates (anything joined by AND/OR) are rejected.
pub fn parse_membership(input: &str) -> Option<Membership<'_>> {
    let (_, parsed) = membership(input.trim()).ok()?;
    let is_list = parsed.op.eq_ignore_ascii_case("IN") || parsed.op.eq_ignore_ascii_case("NOT IN");
    let well_formed = if is_list {
        is_parenthesized(parsed.rhs)
    } else {
        is_single_token(parsed.rhs)
    };
    well_formed.then_some(parsed)
}

/// `(...)` whose opening paren closes at the very end, outside quotes.
fn is_parenthesized(text: &str) -> bool {
    if !text.starts_with('(') || !text.ends_with(')') {
        return false;
    }
    let mut depth = 0usize;
    let mut quoted = false;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != text.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0 && !quoted
}

fn is_single_token(text: &str) -> bool {
    let mut quoted = false;
    for c in text.chars() {
        match c {
            '\'' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => return false,
            _ => {}
        }
    }
    !text.is_empty() && !quoted
}

/// Negate a category predicate: flip the operator of a simple predicate,
/// otherwise wrap it in `NOT (...)`.
pub fn negate_predicate(predicate: &str) -> String {
    if let Some(parsed) = parse_membership(predicate) {
        let inverted = if parsed.op == "!=" {
            Some("=")
        } else {
            invert_qualifier(parsed.op)
        };
        if let Some(op) = inverted {
            return format!("{} {} {}", parsed.lhs, op, parsed.rhs);
        }
    }
    format!("NOT ({})", predicate.trim())
}
