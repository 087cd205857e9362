//! Typed field access on a JSON object.

use super::DecodeError;
use serde_json::{Map, Value};

/// Borrowed view of a JSON object with typed, fallible getters.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fields<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(value: &'a Value) -> Result<Self, DecodeError> {
        value
            .as_object()
            .map(|map| Self { map })
            .ok_or(DecodeError::NotAnObject)
    }

    pub(crate) fn value(&self, key: &str) -> Result<&'a Value, DecodeError> {
        self.map
            .get(key)
            .ok_or_else(|| DecodeError::MissingField(key.to_owned()))
    }

    pub(crate) fn str(&self, key: &str) -> Result<&'a str, DecodeError> {
        self.value(key)?
            .as_str()
            .ok_or_else(|| wrong_type(key, "a string"))
    }

    pub(crate) fn array(&self, key: &str) -> Result<&'a [Value], DecodeError> {
        self.value(key)?
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| wrong_type(key, "an array"))
    }

    pub(crate) fn object(&self, key: &str) -> Result<Fields<'a>, DecodeError> {
        Fields::new(self.value(key)?).map_err(|_| wrong_type(key, "an object"))
    }

    /// Reads an integer given either as a JSON number or as a numeric string.
    pub(crate) fn integer(&self, key: &str) -> Result<i32, DecodeError> {
        let value = self.value(key)?;
        let parsed = match value {
            Value::Number(number) => number.as_i64().and_then(|n| i32::try_from(n).ok()),
            Value::String(text) => text.trim().parse().ok(),
            _ => return Err(wrong_type(key, "a number or numeric string")),
        };
        parsed.ok_or_else(|| invalid_value(key, value))
    }

    pub(crate) fn optional_str(&self, key: &str) -> Option<&'a str> {
        self.map.get(key).and_then(Value::as_str)
    }
}

fn wrong_type(key: &str, expected: &'static str) -> DecodeError {
    DecodeError::WrongType {
        field: key.to_owned(),
        expected,
    }
}

pub(crate) fn invalid_value(key: &str, value: &Value) -> DecodeError {
    let value = match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    DecodeError::InvalidValue {
        field: key.to_owned(),
        value,
    }
}
