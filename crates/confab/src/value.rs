//! value representation
//!
//! The merge model contains the following data types
//! - null
//! - boolean (true/false)
//! - integer (signed, currently: i64 - may change)
//! - decimal (currently: f64 - may change)
//! - string (utf-8)
//! - array ("list" of values)
//! - object (order-preserving "map"/"dictionary", where the key is of type string)
//!
//! `Array` and `Object` are distinct variants so the merge rules can tell
//! "list of contributions" apart from "keyed settings" without ever
//! inspecting key shapes.
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};

/// All possible value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(indexmap::IndexMap<String, Value>),
}

impl Value {
    /// The empty mapping
    ///
    /// Stands in for absent fragments and is the identity element of the merge.
    pub fn empty() -> Self {
        Value::Object(Default::default())
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::empty()
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(bool) => bool.into(),
            serde_json::Value::Number(num) => {
                if let Some(int) = num.as_i64() {
                    return Value::Integer(int);
                }

                Value::Decimal(
                    num.as_f64()
                        .expect("a json number that is not an integer must be a float"),
                )
            }
            serde_json::Value::String(s) => s.into(),
            serde_json::Value::Array(array) => array.into(),
            serde_json::Value::Object(object) => Value::Object(
                object
                    .into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(bool) => bool.into(),
            serde_yaml::Value::Number(num) => {
                if let Some(int) = num.as_i64() {
                    return Value::Integer(int);
                }

                Value::Decimal(
                    num.as_f64()
                        .expect("a yaml number that is not an integer must be a float"),
                )
            }
            serde_yaml::Value::String(s) => s.into(),
            serde_yaml::Value::Sequence(sequence) => sequence.into(),
            serde_yaml::Value::Mapping(mapping) => Value::Object(
                mapping
                    .into_iter()
                    .filter_map(|(key, value)| yaml_key(&key).map(|key| (key, value.into())))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => tagged.value.into(),
        }
    }
}

/// Stringify a yaml mapping key
///
/// Non-scalar keys have no representation in the output model and are dropped.
fn yaml_key(key: &serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Bool(bool) => Some(bool.to_string()),
        serde_yaml::Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}

impl From<hcl::Number> for Value {
    fn from(value: hcl::Number) -> Self {
        if let Some(int) = value.as_i64() {
            return Value::Integer(int);
        }

        Value::Decimal(
            value
                .as_f64()
                .expect("a numeric value that is not an integer must be a float"),
        )
    }
}

impl From<hcl::Value> for Value {
    fn from(value: hcl::Value) -> Value {
        match value {
            hcl::Value::Null => Value::Null,
            hcl::Value::Bool(b) => b.into(),
            hcl::Value::Number(n) => n.into(),
            hcl::Value::String(s) => s.into(),
            hcl::Value::Array(a) => a.into(),
            hcl::Value::Object(o) => Value::Object(
                o.into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for hcl::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => hcl::Value::Null,
            Value::Boolean(bool) => hcl::Value::Bool(bool),
            Value::Integer(int) => hcl::Value::Number(int.into()),
            Value::Decimal(decimal) => hcl::Number::from_f64(decimal)
                .map(hcl::Value::Number)
                .unwrap_or(hcl::Value::Null),
            Value::String(s) => hcl::Value::String(s),
            Value::Array(array) => hcl::Value::Array(array.into_iter().map(Into::into).collect()),
            Value::Object(object) => hcl::Value::Object(
                object
                    .into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect(),
            ),
        }
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
        }
    }
}
