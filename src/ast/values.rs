//! Lenient scalar decoding for rule and table documents.
//!
//! Rule files are hand-written JSON: `values` lists mix strings and numbers,
//! `fields` is sometimes a bare string, `into` is sometimes a number.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A rule value. Text is quoted when written into SQL, numbers are bare.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scalar {
    Text(String),
    Number(String),
}

impl Scalar {
    pub fn text(value: impl Into<String>) -> Self {
        Scalar::Text(value.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Scalar::Text(s) | Scalar::Number(s) => s,
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Scalar::Text(s.clone())),
            Value::Number(n) => Some(Scalar::Number(n.to_string())),
            Value::Bool(b) => Some(Scalar::Text(b.to_string())),
            _ => None,
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value.to_string())
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Number(value.to_string())
    }
}

impl From<&Scalar> for Scalar {
    fn from(value: &Scalar) -> Self {
        value.clone()
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Number(n) => match n.parse::<serde_json::Number>() {
                Ok(number) => number.serialize(serializer),
                Err(_) => serializer.serialize_str(n),
            },
            Scalar::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Scalar::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("expected a scalar, found {}", value)))
    }
}

/// Accept `"a"`, `1`, `["a", 2]` or `null` as a list of scalars.
pub fn scalars<'de, D>(deserializer: D) -> Result<Vec<Scalar>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                Scalar::from_json(item).ok_or_else(|| {
                    serde::de::Error::custom(format!("expected a scalar, found {}", item))
                })
            })
            .collect(),
        other => Scalar::from_json(&other)
            .map(|s| vec![s])
            .ok_or_else(|| serde::de::Error::custom(format!("expected a list, found {}", other))),
    }
}

/// Same as [`scalars`], for names where the number/text distinction is moot.
pub fn scalar_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalars(deserializer)?
        .into_iter()
        .map(|scalar| match scalar {
            Scalar::Text(s) | Scalar::Number(s) => s,
        })
        .collect())
}

/// Accept either one object or a list of objects.
pub fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::Many(items)) => items,
        Some(OneOrMany::One(item)) => vec![item],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Condition {
        #[serde(default, deserialize_with = "scalars")]
        values: Vec<Scalar>,
        #[serde(default)]
        into: Option<Scalar>,
        #[serde(default, deserialize_with = "scalar_list")]
        fields: Vec<String>,
    }

    #[test]
    fn test_mixed_scalars() {
        let condition: Condition =
            serde_json::from_str(r#"{"values": ["W", 2, true], "into": -1}"#).unwrap();
        assert_eq!(
            condition.values,
            vec![Scalar::text("W"), Scalar::Number("2".into()), Scalar::text("true")]
        );
        assert_eq!(condition.into, Some(Scalar::from(-1)));
    }

    #[test]
    fn test_bare_string_becomes_list() {
        let condition: Condition = serde_json::from_str(r#"{"values": "ssn", "fields": 7}"#).unwrap();
        assert_eq!(condition.values, vec![Scalar::text("ssn")]);
        assert_eq!(condition.fields, vec!["7"]);
        assert_eq!(condition.into, None);
    }

    #[test]
    fn test_nested_list_rejected() {
        let result: Result<Condition, _> = serde_json::from_str(r#"{"values": [["a"]]}"#);
        assert!(result.is_err());
        let result: Result<Condition, _> = serde_json::from_str(r#"{"into": {"a": 1}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_numbers_serialize_as_numbers() {
        let values = vec![Scalar::from(8507), Scalar::text("8532")];
        assert_eq!(serde_json::to_string(&values).unwrap(), r#"[8507,"8532"]"#);
    }
}
