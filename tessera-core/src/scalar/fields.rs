//! Column view of a row's scalar fields.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Scalar fields of one row, split into text keys and numeric values.
///
/// Strings become text keys, booleans become `"1"`/`"0"`, integers become
/// both a text key and a numeric value, floats become numeric values. Each
/// element of an array is indexed on its own; nulls and objects are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldsDict {
    text: BTreeMap<String, Vec<String>>,
    numeric: BTreeMap<String, Vec<f64>>,
}

impl FieldsDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object. An empty or blank string is an empty dict.
    pub fn parse(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_str(json)
            .map_err(|e| Error::InvalidFields(format!("fields json parse failed: {}", e)))?;
        match value {
            Value::Object(map) => Ok(Self::from_map(&map)),
            other => Err(Error::InvalidFields(format!(
                "fields json must be an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn from_map(map: &Map<String, Value>) -> Self {
        let mut dict = Self::default();
        for (name, value) in map {
            match value {
                Value::Array(items) => {
                    for item in items {
                        dict.push(name, item);
                    }
                }
                other => dict.push(name, other),
            }
        }
        dict
    }

    fn push(&mut self, name: &str, value: &Value) {
        match value {
            Value::String(s) => self.push_text(name, s.clone()),
            Value::Bool(b) => self.push_text(name, if *b { "1" } else { "0" }.to_string()),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    self.push_text(name, i.to_string());
                    self.push_numeric(name, i as f64);
                } else if let Some(u) = n.as_u64() {
                    self.push_text(name, u.to_string());
                    self.push_numeric(name, u as f64);
                } else if let Some(f) = n.as_f64() {
                    self.push_numeric(name, f);
                }
            }
            Value::Null | Value::Array(_) | Value::Object(_) => {}
        }
    }

    /// Adds a text key for `name`.
    pub fn push_text(&mut self, name: &str, key: String) {
        self.text.entry(name.to_string()).or_default().push(key);
    }

    /// Adds a numeric value for `name`; non-finite values are dropped.
    pub fn push_numeric(&mut self, name: &str, value: f64) {
        if value.is_finite() {
            self.numeric.entry(name.to_string()).or_default().push(value);
        }
    }

    pub fn text(&self) -> &BTreeMap<String, Vec<String>> {
        &self.text
    }

    pub fn numeric(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.numeric
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.numeric.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_columns() {
        let dict = FieldsDict::parse(
            r#"{"color": "red", "flag": true, "year": 2024, "score": 0.5,
                "tags": ["a", "b"], "none": null}"#,
        )
        .unwrap();

        assert_eq!(dict.text()["color"], vec!["red"]);
        assert_eq!(dict.text()["flag"], vec!["1"]);
        assert_eq!(dict.text()["year"], vec!["2024"]);
        assert_eq!(dict.numeric()["year"], vec![2024.0]);
        assert_eq!(dict.numeric()["score"], vec![0.5]);
        assert!(!dict.text().contains_key("score"));
        assert_eq!(dict.text()["tags"], vec!["a", "b"]);
        assert!(!dict.text().contains_key("none"));
    }

    #[test]
    fn test_blank_is_empty() {
        assert!(FieldsDict::parse("").unwrap().is_empty());
        assert!(FieldsDict::parse("  ").unwrap().is_empty());
        assert!(FieldsDict::parse("{}").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(matches!(
            FieldsDict::parse("[1, 2]"),
            Err(Error::InvalidFields(_))
        ));
        assert!(matches!(
            FieldsDict::parse("{broken"),
            Err(Error::InvalidFields(_))
        ));
    }
}
