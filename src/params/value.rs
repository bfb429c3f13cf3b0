//! Values and Value Specifications
//!
//! A key's values are declared either as an explicit list of tokens or as
//! an integer range. Each token is classified exactly once, when it is
//! resolved, into an integer or an opaque string.
//!
//! # Example YAML Format
//!
//! ```yaml
//! lr: [0.1, 0.01]                      # enumerated
//! model: "small, large"                # enumerated, from list text
//! seed: { lower: 0, upper: 10, step: 3 }
//! ```
//!
//! Unquoted YAML numbers are re-rendered from their parsed value, so `0.10`
//! becomes `0.1` and `1e3` becomes `1000.0`. Quote a value (or use list
//! text) to keep its exact spelling: `lr: ["0.10", "1e-3"]`.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as Json;

use crate::error::BuildError;

/// A single argument value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i64),
    Str(String),
}

impl Value {
    /// Classifies a raw token.
    ///
    /// A token is an integer iff it is a non-negative integer literal
    /// (ASCII digits only) that fits in an `i64`.
    ///
    /// # Example
    /// ```
    /// use dagweaver::params::Value;
    ///
    /// assert_eq!(Value::classify("42"), Value::Int(42));
    /// assert_eq!(Value::classify("-3"), Value::Str("-3".to_string()));
    /// assert_eq!(Value::classify("0.5"), Value::Str("0.5".to_string()));
    /// ```
    pub fn classify(token: &str) -> Self {
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = token.parse::<i64>() {
                return Self::Int(n);
            }
        }
        Self::Str(token.to_string())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::Str(s) => serializer.serialize_str(s),
        }
    }
}

/// How the values of one key are declared.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSpec {
    /// Explicit ordered list of raw tokens
    Enumerated(Vec<String>),
    /// `lower, lower + step, ...` up to the largest value `<= upper`
    Range { lower: i64, upper: i64, step: i64 },
}

impl ValueSpec {
    /// Builds an enumerated spec from list text.
    ///
    /// If the text contains a comma, spaces are removed and it is split on
    /// commas; otherwise it is split on whitespace. Empty tokens are dropped.
    ///
    /// # Example
    /// ```
    /// use dagweaver::params::ValueSpec;
    ///
    /// let spec = ValueSpec::parse_list("a, b ,c");
    /// assert_eq!(spec, ValueSpec::Enumerated(vec!["a".into(), "b".into(), "c".into()]));
    /// ```
    pub fn parse_list(text: &str) -> Self {
        Self::Enumerated(split_tokens(text))
    }

    /// Resolves this spec into a concrete ordered list of values.
    pub fn resolve(&self) -> Result<Vec<Value>, BuildError> {
        resolve(self)
    }
}

/// Splits list text into tokens using the comma-or-whitespace rule.
pub(crate) fn split_tokens(text: &str) -> Vec<String> {
    if text.contains(',') {
        text.replace(' ', "")
            .split(',')
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        text.split_whitespace().map(str::to_string).collect()
    }
}

/// Resolves a value spec into an ordered list of values.
///
/// # Example
/// ```
/// use dagweaver::params::{resolve, Value, ValueSpec};
///
/// let values = resolve(&ValueSpec::Range { lower: 0, upper: 10, step: 3 }).unwrap();
/// assert_eq!(values, vec![Value::Int(0), Value::Int(3), Value::Int(6), Value::Int(9)]);
/// ```
pub fn resolve(spec: &ValueSpec) -> Result<Vec<Value>, BuildError> {
    match spec {
        ValueSpec::Enumerated(tokens) => {
            if tokens.is_empty() {
                return Err(BuildError::EmptyValueList);
            }
            Ok(tokens.iter().map(|t| Value::classify(t)).collect())
        }
        ValueSpec::Range { lower, upper, step } => {
            if lower >= upper || *step <= 0 {
                return Err(BuildError::InvalidRange {
                    lower: *lower,
                    upper: *upper,
                    step: *step,
                });
            }

            let mut values = Vec::new();
            let mut current = *lower;
            while current <= *upper {
                values.push(Value::Int(current));
                match current.checked_add(*step) {
                    Some(next) => current = next,
                    None => break,
                }
            }
            Ok(values)
        }
    }
}

/// Converts a scalar into a raw token. Numbers are rendered from their
/// parsed value, not their source text.
fn scalar_token<E: de::Error>(val: Json) -> Result<String, E> {
    match val {
        Json::String(s) => Ok(s),
        Json::Number(n) => Ok(n.to_string()),
        Json::Bool(b) => Ok(b.to_string()),
        _ => Err(E::custom("Expected a scalar value in list")),
    }
}

/// Accepts a list, list text, a single scalar, or a `{lower, upper, step}` map.
impl<'de> Deserialize<'de> for ValueSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let val = Json::deserialize(deserializer)?;
        match val {
            Json::Array(arr) => arr
                .into_iter()
                .map(scalar_token)
                .collect::<Result<Vec<_>, _>>()
                .map(ValueSpec::Enumerated),
            Json::String(s) => Ok(ValueSpec::parse_list(&s)),
            Json::Object(map) => {
                let bound = |name: &str| -> Result<i64, D::Error> {
                    map.get(name)
                        .and_then(Json::as_i64)
                        .ok_or_else(|| de::Error::custom(format!("Range needs integer '{}'", name)))
                };
                let step = match map.get("step") {
                    Some(_) => bound("step")?,
                    None => 1,
                };
                Ok(ValueSpec::Range {
                    lower: bound("lower")?,
                    upper: bound("upper")?,
                    step,
                })
            }
            Json::Null => Ok(ValueSpec::Enumerated(Vec::new())),
            other => Ok(ValueSpec::Enumerated(vec![scalar_token(other)?])),
        }
    }
}
