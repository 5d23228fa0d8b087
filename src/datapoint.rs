//! Datapoints and the structured values they carry.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Structured payload of a datapoint.
///
/// Serialized untagged, so any JSON document maps directly onto a `Value`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Name of the variant, used in type mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Coerces to a boolean. Numbers are true when non-zero; only the strings
    /// "true" and "false" are accepted.
    pub fn as_bool(&self) -> PipelineResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0),
            Value::String(s) if s == "true" => Ok(true),
            Value::String(s) if s == "false" => Ok(false),
            other => Err(PipelineError::type_mismatch("boolean", other.type_name())),
        }
    }

    /// Coerces to a number. Booleans map to 1 and 0, numeric strings are parsed.
    pub fn as_f64(&self) -> PipelineResult<f64> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| PipelineError::type_mismatch("number", "string")),
            other => Err(PipelineError::type_mismatch("number", other.type_name())),
        }
    }

    /// Coerces to an integer. Fails on fractional numbers.
    pub fn as_i64(&self) -> PipelineResult<i64> {
        let n = self.as_f64()?;
        if n.fract() != 0.0 || !n.is_finite() {
            return Err(PipelineError::type_mismatch("integer", "number"));
        }
        Ok(n as i64)
    }

    pub fn as_str(&self) -> PipelineResult<&str> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(PipelineError::type_mismatch("string", other.type_name())),
        }
    }

    pub fn as_array(&self) -> PipelineResult<&[Value]> {
        match self {
            Value::Array(items) => Ok(items),
            other => Err(PipelineError::type_mismatch("array", other.type_name())),
        }
    }

    pub fn as_object(&self) -> PipelineResult<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Ok(map),
            other => Err(PipelineError::type_mismatch("object", other.type_name())),
        }
    }

    /// Looks up a key of an object. Missing keys yield `None`.
    pub fn get(&self, key: &str) -> PipelineResult<Option<&Value>> {
        Ok(self.as_object()?.get(key))
    }

    /// Looks up an element of an array. Out-of-range indices yield `None`.
    pub fn index(&self, index: usize) -> PipelineResult<Option<&Value>> {
        Ok(self.as_array()?.get(index))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => write!(f, "<{}>", self.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serde_json::Value::from(n as i64)
            }
            Value::Number(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Object(map) => {
                serde_json::Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// A timestamped value. Timestamps are seconds, non-decreasing within a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    #[serde(rename = "t")]
    pub timestamp: f64,
    #[serde(rename = "d")]
    pub data: Value,
}

impl Datapoint {
    pub fn new(timestamp: f64, data: impl Into<Value>) -> Self {
        Self {
            timestamp,
            data: data.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_coercion() {
        assert!(Value::Bool(true).as_bool().unwrap());
        assert!(Value::Number(2.0).as_bool().unwrap());
        assert!(!Value::Number(0.0).as_bool().unwrap());
        assert!(!Value::from("false").as_bool().unwrap());

        let err = Value::from("maybe").as_bool().unwrap_err();
        assert_eq!(err, PipelineError::type_mismatch("boolean", "string"));
        assert!(Value::Null.as_bool().is_err());
    }

    #[test]
    fn test_number_coercion() {
        assert_eq!(Value::from(3).as_f64().unwrap(), 3.0);
        assert_eq!(Value::from(" 2.5 ").as_f64().unwrap(), 2.5);
        assert_eq!(Value::Bool(true).as_f64().unwrap(), 1.0);
        assert!(Value::Array(vec![]).as_f64().is_err());
        assert_eq!(Value::from(7).as_i64().unwrap(), 7);
        assert!(Value::from(7.5).as_i64().is_err());
    }

    #[test]
    fn test_string_is_strict() {
        assert_eq!(Value::from("abc").as_str().unwrap(), "abc");
        assert!(Value::from(1).as_str().is_err());
    }

    #[test]
    fn test_object_lookup() {
        let value: Value = serde_json::json!({"a": 1, "b": [true, null]}).into();
        assert_eq!(value.get("a").unwrap(), Some(&Value::Number(1.0)));
        assert_eq!(value.get("z").unwrap(), None);
        let b = value.get("b").unwrap().unwrap();
        assert_eq!(b.index(0).unwrap(), Some(&Value::Bool(true)));
        assert!(Value::from(1).get("a").is_err());
    }

    #[test]
    fn test_datapoint_json_shape() {
        let dp: Datapoint = serde_json::from_str(r#"{"t": 1.5, "d": {"x": [1, "y"]}}"#).unwrap();
        assert_eq!(dp.timestamp, 1.5);
        let x = dp.data.get("x").unwrap().unwrap();
        assert_eq!(x.index(1).unwrap(), Some(&Value::from("y")));

        let text = serde_json::to_string(&Datapoint::new(2.0, true)).unwrap();
        assert_eq!(text, r#"{"t":2.0,"d":true}"#);
    }

    #[test]
    fn test_json_conversion_keeps_integers() {
        assert_eq!(serde_json::Value::from(Value::from(3)), serde_json::json!(3));
        assert_eq!(serde_json::Value::from(Value::from(2.5)), serde_json::json!(2.5));
        assert_eq!(serde_json::Value::from(Value::from(f64::NAN)), serde_json::Value::Null);
    }
}
