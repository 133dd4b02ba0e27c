//! Search DSL: filter trees and sorters.
//!
//! A DSL string may carry a filter, a sorter, or both:
//!
//! ```json
//! {"filter": {"op": "must", "field": "color", "conds": ["red"]},
//!  "sorter": {"op": "sort", "field": "price", "topk": 10}}
//! ```
//!
//! A bare operator object is accepted too; `sort` and `count` are sorters,
//! every other op is a filter.

pub mod filter;
pub mod sorter;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub use filter::FilterOp;
pub use sorter::{
    total_count_json, CountOp, SortOp, SortOrder, SorterOp, SorterOutput, TOTAL_COUNT_KEY,
};

/// Parsed form of one search DSL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchContext {
    pub filter: Option<FilterOp>,
    pub sorter: Option<SorterOp>,
}

impl SearchContext {
    pub fn is_empty(&self) -> bool {
        self.filter.is_none() && self.sorter.is_none()
    }
}

/// Detects and parses the filter and sorter of `dsl`.
pub fn parse_dsl(dsl: &str) -> Result<SearchContext> {
    if dsl.trim().is_empty() {
        return Ok(SearchContext::default());
    }
    let doc: Value =
        serde_json::from_str(dsl).map_err(|e| invalid(format!("dsl is not valid json: {}", e)))?;
    let obj = doc
        .as_object()
        .ok_or_else(|| invalid("dsl must be a json object"))?;
    if obj.is_empty() {
        return Ok(SearchContext::default());
    }

    let wrapped_sorter = obj.get("sorter").or_else(|| obj.get("counter"));
    if obj.contains_key("filter") || wrapped_sorter.is_some() {
        return Ok(SearchContext {
            filter: member(obj, "filter").map(FilterOp::parse).transpose()?,
            sorter: wrapped_sorter
                .filter(|v| !is_blank(v))
                .map(SorterOp::parse)
                .transpose()?,
        });
    }

    match op_name(obj)? {
        "sort" | "count" => Ok(SearchContext {
            filter: None,
            sorter: Some(SorterOp::parse(&doc)?),
        }),
        _ => Ok(SearchContext {
            filter: Some(FilterOp::parse(&doc)?),
            sorter: None,
        }),
    }
}

/// `null` and `{}` stand for an absent sub-tree.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn member<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !is_blank(v))
}

pub(crate) fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidQuery(msg.into())
}

pub(crate) fn op_name(obj: &Map<String, Value>) -> Result<&str> {
    obj.get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("operator object needs a string 'op'"))
}

pub(crate) fn f64_of(value: &Value, key: &str) -> Result<f64> {
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(format!("'{}' must be a number, got {}", key, value)))
}

/// A string, or a non-empty array of strings.
pub(crate) fn string_or_array(value: &Value, key: &str) -> Result<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid(format!("'{}' items must be strings", key)))
            })
            .collect(),
        _ => Err(invalid(format!(
            "'{}' must be a string or a non-empty array of strings",
            key
        ))),
    }
}
