//! Scalar sorters: top-k by field value and per-value counts.

use std::cmp::Ordering;

use roaring::RoaringBitmap;
use serde_json::{Map, Value};

use super::{f64_of, invalid, op_name, string_or_array};
use crate::error::Result;
use crate::scalar::{FieldSets, RangedMap};

/// Key of the side-channel count returned by a `count` without fields.
pub const TOTAL_COUNT_KEY: &str = "__total_count__";

const DEFAULT_MAX_ENTRY: i64 = 10_000;
const CENTER_1D: &str = "center1d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn parse(value: &Value) -> Result<Self> {
        match value.as_str() {
            Some("asc") => Ok(SortOrder::Asc),
            Some("desc") => Ok(SortOrder::Desc),
            _ => Err(invalid(format!("order must be \"asc\" or \"desc\", got {}", value))),
        }
    }

    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    }
}

/// Top-k rows ordered by one or more numeric fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SortOp {
    pub fields: Vec<String>,
    /// One order per field.
    pub orders: Vec<SortOrder>,
    /// Zero means "use the request's topk".
    pub topk: usize,
    /// Set for `center1d`: rows nearest to this value come first.
    pub center: Option<f64>,
}

/// Per-value counts over up to two fields, or a bare total.
#[derive(Debug, Clone, PartialEq)]
pub struct CountOp {
    pub fields: Vec<String>,
    /// Only counts strictly greater than this are reported.
    pub gt: i64,
    /// Maximum reported entries; zero or less means unlimited.
    pub max_entry: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SorterOp {
    Sort(SortOp),
    Count(CountOp),
}

/// Offsets with their scores, plus any side-channel JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SorterOutput {
    pub offsets: Vec<u32>,
    pub scores: Vec<f32>,
    pub extra_json: Option<Map<String, Value>>,
}

impl SorterOp {
    pub fn parse(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| invalid("sorter must be an object"))?;
        match op_name(obj)? {
            "sort" => parse_sort(obj).map(SorterOp::Sort),
            "count" => parse_count(obj).map(SorterOp::Count),
            other => Err(invalid(format!(
                "unsupported sorter op '{}'; expected sort or count",
                other
            ))),
        }
    }

    /// True for a `count` without fields.
    pub fn is_total_count(&self) -> bool {
        matches!(self, SorterOp::Count(op) if op.fields.is_empty())
    }

    /// Runs the sorter over `bitmap`, or over every live row when absent.
    pub fn compute(
        &self,
        sets: &FieldSets,
        bitmap: Option<&RoaringBitmap>,
        default_topk: usize,
    ) -> Result<SorterOutput> {
        match self {
            SorterOp::Sort(op) => op.compute(sets, bitmap, default_topk),
            SorterOp::Count(op) => op.compute(sets, bitmap),
        }
    }
}

/// Single-entry side-channel object carrying a total.
pub fn total_count_json(count: u64) -> Map<String, Value> {
    let mut extra = Map::new();
    extra.insert(TOTAL_COUNT_KEY.to_string(), Value::from(count));
    extra
}

fn parse_sort(obj: &Map<String, Value>) -> Result<SortOp> {
    let fields = obj
        .get("field")
        .ok_or_else(|| invalid("'sort' needs 'field'"))
        .and_then(|f| string_or_array(f, "field"))?;

    let mut orders = match obj.get("order") {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(SortOrder::parse)
            .collect::<Result<Vec<_>>>()?,
        Some(v) => vec![SortOrder::parse(v)?],
    };

    let topk = match obj.get("topk") {
        None => 0,
        Some(v) => v
            .as_u64()
            .and_then(|k| usize::try_from(k).ok())
            .ok_or_else(|| invalid(format!("'topk' must be a non-negative integer, got {}", v)))?,
    };

    let center_1d = match obj.get("type") {
        None => false,
        Some(Value::String(t)) if t == CENTER_1D => true,
        Some(t) => return Err(invalid(format!("unsupported sort type {}", t))),
    };

    if center_1d {
        let center = match obj.get("center") {
            Some(Value::Array(items)) if items.len() == 1 => f64_of(&items[0], "center")?,
            Some(Value::Array(_)) | None => {
                return Err(invalid("center1d sort needs exactly one 'center' value"))
            }
            Some(v) => f64_of(v, "center")?,
        };
        if fields.len() != 1 {
            return Err(invalid("center1d sort takes exactly one field"));
        }
        if orders.iter().any(|o| *o == SortOrder::Desc) || orders.len() > 1 {
            return Err(invalid("center1d sort only supports a single asc order"));
        }
        return Ok(SortOp {
            fields,
            orders: vec![SortOrder::Asc],
            topk,
            center: Some(center),
        });
    }

    match orders.len() {
        0 => orders = vec![SortOrder::Desc; fields.len()],
        1 => orders = vec![orders[0]; fields.len()],
        n if n != fields.len() => {
            return Err(invalid(format!(
                "'sort' has {} fields but {} orders",
                fields.len(),
                n
            )))
        }
        _ => {}
    }
    Ok(SortOp {
        fields,
        orders,
        topk,
        center: None,
    })
}

fn parse_count(obj: &Map<String, Value>) -> Result<CountOp> {
    let fields = match obj.get("field") {
        None => Vec::new(),
        Some(f) => string_or_array(f, "field")?,
    };
    if fields.len() > 2 {
        return Err(invalid("'count' takes at most two fields"));
    }
    let int_member = |key: &str, default: i64| -> Result<i64> {
        match obj.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_i64()
                .ok_or_else(|| invalid(format!("'{}' must be an integer, got {}", key, v))),
        }
    };
    Ok(CountOp {
        fields,
        gt: int_member("gt", -1)?,
        max_entry: int_member("max_entry", DEFAULT_MAX_ENTRY)?,
    })
}

impl SortOp {
    fn compute(
        &self,
        sets: &FieldSets,
        bitmap: Option<&RoaringBitmap>,
        default_topk: usize,
    ) -> Result<SorterOutput> {
        let maps = self
            .fields
            .iter()
            .map(|field| {
                sets.group(field)
                    .and_then(|g| g.ranged())
                    .ok_or_else(|| invalid(format!("sort field '{}' is not numeric", field)))
            })
            .collect::<Result<Vec<&RangedMap>>>()?;

        let topk = if self.topk > 0 { self.topk } else { default_topk };
        if topk == 0 {
            return Ok(SorterOutput::default());
        }

        let (primary, rest) = match maps.split_first() {
            Some(split) => split,
            None => return Ok(SorterOutput::default()),
        };
        let mut rows: Vec<(u32, Vec<f64>)> = primary
            .iter()
            .filter(|(offset, _)| bitmap.map_or(true, |bm| bm.contains(*offset)))
            .map(|(offset, value)| {
                let mut values = Vec::with_capacity(maps.len());
                values.push(value);
                values.extend(rest.iter().map(|m| m.get(offset).unwrap_or(0.0)));
                (offset, values)
            })
            .collect();

        let cmp = |a: &(u32, Vec<f64>), b: &(u32, Vec<f64>)| self.compare(a, b);
        if rows.len() > topk {
            rows.select_nth_unstable_by(topk - 1, cmp);
            rows.truncate(topk);
        }
        rows.sort_unstable_by(cmp);

        Ok(SorterOutput {
            scores: rows.iter().map(|(_, values)| values[0] as f32).collect(),
            offsets: rows.into_iter().map(|(offset, _)| offset).collect(),
            extra_json: None,
        })
    }

    /// Rows that sort first compare `Less`. Offsets break remaining ties.
    fn compare(&self, a: &(u32, Vec<f64>), b: &(u32, Vec<f64>)) -> Ordering {
        let ord = match self.center {
            Some(center) => {
                let (x, y) = (a.1[0], b.1[0]);
                (x - center)
                    .abs()
                    .total_cmp(&(y - center).abs())
                    .then_with(|| x.total_cmp(&y))
            }
            None => self
                .orders
                .iter()
                .zip(a.1.iter().zip(&b.1))
                .map(|(order, (x, y))| order.apply(x.total_cmp(y)))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal),
        };
        ord.then_with(|| a.0.cmp(&b.0))
    }
}

impl CountOp {
    fn compute(&self, sets: &FieldSets, bitmap: Option<&RoaringBitmap>) -> Result<SorterOutput> {
        if self.fields.is_empty() {
            let total = bitmap.map_or_else(|| sets.element_count(), |bm| bm.len());
            return Ok(SorterOutput {
                extra_json: Some(total_count_json(total)),
                ..Default::default()
            });
        }

        let counts = sets.count_values(&self.fields, bitmap).ok_or_else(|| {
            invalid(format!(
                "count field(s) {} not indexed",
                self.fields.join(",")
            ))
        })?;
        let limit = usize::try_from(self.max_entry)
            .ok()
            .filter(|&n| n > 0)
            .unwrap_or(usize::MAX);
        let extra: Map<String, Value> = counts
            .into_iter()
            .filter(|&(_, n)| i128::from(n) > i128::from(self.gt))
            .take(limit)
            .map(|(key, n)| (key, Value::from(n)))
            .collect();

        Ok(SorterOutput {
            extra_json: (!extra.is_empty()).then_some(extra),
            ..Default::default()
        })
    }
}
