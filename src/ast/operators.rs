//! Qualifier (operator) handling.

/// Aggregate functions: their templates take table/key/value placeholders.
pub const AGGREGATES: [&str; 4] = ["COUNT", "COUNT-DISTINCT", "AVG", "SUM"];

pub fn is_aggregate(function: &str) -> bool {
    AGGREGATES
        .iter()
        .any(|aggregate| aggregate.eq_ignore_ascii_case(function.trim()))
}

/// Invert a qualifier so that a "suppress these rows" rule becomes a
/// "keep the other rows" filter.
///
/// | qualifier | inverted   |
/// |-----------|------------|
/// | `IN`      | `NOT IN`   |
/// | `=`       | `<>`       |
/// | `NOT IN`  | `IN`       |
/// | `<>`      | `=`        |
/// | `''`      | `IS FALSE` |
/// | `TRUE`    | `IS FALSE` |
pub fn invert_qualifier(qualifier: &str) -> Option<&'static str> {
    let normalized = qualifier.split_whitespace().collect::<Vec<_>>().join(" ");
    match normalized.to_ascii_uppercase().as_str() {
        "IN" => Some("NOT IN"),
        "=" => Some("<>"),
        "NOT IN" => Some("IN"),
        "<>" => Some("="),
        "" | "TRUE" => Some("IS FALSE"),
        _ => None,
    }
}
