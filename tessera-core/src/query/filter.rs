//! Filter expressions evaluated to candidate bitmaps.
//!
//! ```json
//! {"op": "and", "conds": [
//!     {"op": "must", "field": "color", "conds": ["red", "blue"]},
//!     {"op": "range", "field": "price", "gte": 10, "lt": 20},
//!     {"op": "must", "field": "dir", "conds": ["/docs"], "para": "-d=1"}
//! ]}
//! ```

use roaring::RoaringBitmap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{f64_of, invalid, op_name, string_or_array};
use crate::error::Result;
use crate::scalar::{FilterContext, RangeBounds};

/// Deepest path level a `-d=N` parameter may ask for.
const MAX_PATH_DEPTH: i64 = 50;

/// A parsed filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    And(Vec<FilterOp>),
    Or(Vec<FilterOp>),
    /// Rows holding any of `conds`. `depth` limits path descendants.
    Must {
        field: String,
        conds: Vec<String>,
        depth: Option<usize>,
    },
    /// Live rows holding none of `conds`.
    MustNot {
        field: String,
        conds: Vec<String>,
        depth: Option<usize>,
    },
    /// Rows whose value is inside `bounds`, or outside when `out`.
    Range {
        field: String,
        bounds: RangeBounds,
        out: bool,
    },
    /// Rows within `radius` of a point over two numeric fields.
    Range2d {
        fields: [String; 2],
        center: [f64; 2],
        radius: f64,
        out: bool,
    },
    Prefix {
        field: String,
        prefix: String,
    },
    Contains {
        field: String,
        substring: String,
    },
    LabelIn(Vec<u64>),
}

impl FilterOp {
    /// Parses one filter object.
    pub fn parse(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| invalid("filter must be an object"))?;
        let op = op_name(obj)?;
        match op {
            "and" => Ok(FilterOp::And(parse_children(obj, op)?)),
            "or" => Ok(FilterOp::Or(parse_children(obj, op)?)),
            "must" | "must_not" => {
                let field = field_name(obj, op)?;
                let conds = parse_conds(obj, op)?;
                let depth = parse_depth(obj)?;
                Ok(if op == "must" {
                    FilterOp::Must { field, conds, depth }
                } else {
                    FilterOp::MustNot { field, conds, depth }
                })
            }
            "range" | "range_out" => parse_range(obj, op == "range_out"),
            "prefix" => Ok(FilterOp::Prefix {
                field: field_name(obj, op)?,
                prefix: string_member(obj, "prefix", op)?,
            }),
            "contains" => Ok(FilterOp::Contains {
                field: field_name(obj, op)?,
                substring: string_member(obj, "substring", op)?,
            }),
            "label_in" => parse_labels(obj),
            other => Err(invalid(format!(
                "unsupported filter op '{}'; expected one of and, or, must, must_not, \
                 range, range_out, prefix, contains, label_in",
                other
            ))),
        }
    }

    /// Evaluates the tree. `None` means no bitmap could be computed, for
    /// example because a field is not indexed.
    pub fn evaluate(&self, ctx: &FilterContext<'_>) -> Option<RoaringBitmap> {
        let sets = ctx.sets;
        match self {
            FilterOp::And(children) => {
                let mut iter = children.iter();
                let mut acc = iter.next()?.evaluate(ctx)?;
                for child in iter {
                    acc &= child.evaluate(ctx)?;
                }
                Some(acc)
            }
            FilterOp::Or(children) => {
                children
                    .iter()
                    .filter_map(|c| c.evaluate(ctx))
                    .reduce(|acc, bm| acc | bm)
            }
            FilterOp::Must { field, conds, depth } => must_bitmap(ctx, field, conds, *depth),
            FilterOp::MustNot { field, conds, depth } => {
                let matched = must_bitmap(ctx, field, conds, *depth)?;
                Some(sets.exclude(&matched))
            }
            FilterOp::Range { field, bounds, out } => sets.range_bitmap(field, bounds, *out),
            FilterOp::Range2d {
                fields,
                center,
                radius,
                out,
            } => {
                let inside =
                    sets.range2d_bitmap([fields[0].as_str(), fields[1].as_str()], *center, *radius)?;
                Some(if *out { sets.exclude(&inside) } else { inside })
            }
            FilterOp::Prefix { field, prefix } => sets.prefix_bitmap(field, prefix),
            FilterOp::Contains { field, substring } => sets.contains_bitmap(field, substring),
            FilterOp::LabelIn(labels) => match ctx.resolver.offsets_for_labels(labels) {
                Ok(offsets) => Some(offsets.into_iter().collect()),
                Err(e) => {
                    warn!(error = %e, "label to offset resolution failed");
                    None
                }
            },
        }
    }
}

fn must_bitmap(
    ctx: &FilterContext<'_>,
    field: &str,
    conds: &[String],
    depth: Option<usize>,
) -> Option<RoaringBitmap> {
    let result = if ctx.sets.is_path_field(field) {
        ctx.sets.path_bitmap(field, conds, depth)
    } else {
        ctx.sets.value_bitmap(field, conds)
    };
    if result.is_none() {
        debug!(field, "filter on a field that is not indexed");
    }
    result
}

fn parse_children(obj: &Map<String, Value>, op: &str) -> Result<Vec<FilterOp>> {
    let conds = obj
        .get("conds")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid(format!("'{}' needs a 'conds' array", op)))?;
    if conds.is_empty() {
        return Err(invalid(format!("'{}' has an empty 'conds' array", op)));
    }
    conds.iter().map(FilterOp::parse).collect()
}

fn field_name(obj: &Map<String, Value>, op: &str) -> Result<String> {
    string_member(obj, "field", op)
}

fn string_member(obj: &Map<String, Value>, key: &str, op: &str) -> Result<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| invalid(format!("'{}' needs a string '{}'", op, key)))
}

/// Scalar conditions as index keys: integers in decimal, booleans as 1/0.
fn parse_conds(obj: &Map<String, Value>, op: &str) -> Result<Vec<String>> {
    let conds = obj
        .get("conds")
        .and_then(Value::as_array)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| invalid(format!("'{}' needs a non-empty 'conds' array", op)))?;
    conds
        .iter()
        .map(|cond| match cond {
            Value::String(s) => Ok(s.clone()),
            Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
            other => Err(invalid(format!(
                "'{}' conds must be strings, integers or booleans, got {}",
                op, other
            ))),
        })
        .collect()
}

/// Reads `para: "-d=N"` (or `["-d=N"]`). `None` means unlimited depth.
fn parse_depth(obj: &Map<String, Value>) -> Result<Option<usize>> {
    let para = match obj.get("para") {
        None => return Ok(None),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => match items.first() {
            Some(Value::String(s)) => {
                if items.len() > 1 {
                    warn!("'para' has several values; only the first is used");
                }
                s.clone()
            }
            _ => return Err(invalid("'para' must be a string or an array of strings")),
        },
        Some(_) => return Err(invalid("'para' must be a string or an array of strings")),
    };

    let para: String = para.chars().filter(|c| !c.is_whitespace()).collect();
    let Some(depth) = para.strip_prefix("-d=") else {
        if !para.is_empty() {
            warn!(para = %para, "ignoring unrecognised 'para'");
        }
        return Ok(None);
    };
    let depth: i64 = depth
        .parse()
        .map_err(|_| invalid(format!("invalid depth in 'para': {}", para)))?;
    let depth = depth.clamp(-1, MAX_PATH_DEPTH);
    Ok(usize::try_from(depth).ok())
}

fn parse_range(obj: &Map<String, Value>, out: bool) -> Result<FilterOp> {
    let op = if out { "range_out" } else { "range" };
    let fields = obj
        .get("field")
        .map(|f| string_or_array(f, "field"))
        .transpose()?
        .ok_or_else(|| invalid(format!("'{}' needs 'field'", op)))?;

    let center = match obj.get("center") {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| f64_of(v, "center"))
            .collect::<Result<Vec<f64>>>()?,
        Some(v) => vec![f64_of(v, "center")?],
    };
    let radius = obj.get("radius").map(|r| f64_of(r, "radius")).transpose()?;
    if radius.map_or(false, |r| r < 0.0) {
        return Err(invalid("'radius' must not be negative"));
    }

    match fields.as_slice() {
        [field] => {
            let mut bounds = RangeBounds::default();
            if let (&[c], Some(r)) = (center.as_slice(), radius) {
                bounds = RangeBounds::around(c, r);
            }
            if let Some(v) = obj.get("gte") {
                bounds.lower = Some((f64_of(v, "gte")?, true));
            } else if let Some(v) = obj.get("gt") {
                bounds.lower = Some((f64_of(v, "gt")?, false));
            }
            if let Some(v) = obj.get("lte") {
                bounds.upper = Some((f64_of(v, "lte")?, true));
            } else if let Some(v) = obj.get("lt") {
                bounds.upper = Some((f64_of(v, "lt")?, false));
            }
            if bounds.lower.is_none() && bounds.upper.is_none() {
                return Err(invalid(format!("'{}' on '{}' has no bounds", op, field)));
            }
            Ok(FilterOp::Range {
                field: field.clone(),
                bounds,
                out,
            })
        }
        [x, y] => match (center.as_slice(), radius) {
            (&[cx, cy], Some(radius)) => Ok(FilterOp::Range2d {
                fields: [x.clone(), y.clone()],
                center: [cx, cy],
                radius,
                out,
            }),
            _ => Err(invalid(format!(
                "'{}' over two fields needs a 2-element 'center' and 'radius'",
                op
            ))),
        },
        _ => Err(invalid(format!("'{}' takes one or two fields", op))),
    }
}

fn parse_labels(obj: &Map<String, Value>) -> Result<FilterOp> {
    let labels = obj
        .get("labels")
        .and_then(Value::as_array)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| invalid("'label_in' needs a non-empty 'labels' array"))?;
    let labels = labels
        .iter()
        .map(|l| {
            l.as_u64()
                .ok_or_else(|| invalid(format!("label must be an unsigned integer, got {}", l)))
        })
        .collect::<Result<Vec<u64>>>()?;
    Ok(FilterOp::LabelIn(labels))
}
