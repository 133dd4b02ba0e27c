//! Bitmap field groups for scalar pre-filtering.
//!
//! Every indexed field owns a [`FieldGroup`]: value bitmaps from a text key
//! to the offsets holding it, a ranged map from offset to numeric value, or
//! both, depending on the field kind. [`FieldSets`] also tracks the set of
//! every offset that was ever added and is still live, which negations and
//! unfiltered counts run against.

use std::collections::BTreeMap;

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::fields::FieldsDict;
use super::ScalarFieldKind;

/// Numeric bounds of a range query. The flag marks an inclusive bound.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RangeBounds {
    pub lower: Option<(f64, bool)>,
    pub upper: Option<(f64, bool)>,
}

impl RangeBounds {
    /// Inclusive `[center - radius, center + radius]`.
    pub fn around(center: f64, radius: f64) -> Self {
        Self {
            lower: Some((center - radius, true)),
            upper: Some((center + radius, true)),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        let above = match self.lower {
            Some((bound, true)) => value >= bound,
            Some((bound, false)) => value > bound,
            None => true,
        };
        let below = match self.upper {
            Some((bound, true)) => value <= bound,
            Some((bound, false)) => value < bound,
            None => true,
        };
        above && below
    }
}

/// Offset to numeric value, one value per offset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangedMap {
    scores: BTreeMap<u32, f64>,
}

impl RangedMap {
    pub fn insert(&mut self, offset: u32, value: f64) {
        self.scores.insert(offset, value);
    }

    pub fn remove(&mut self, offset: u32) {
        self.scores.remove(&offset);
    }

    pub fn get(&self, offset: u32) -> Option<f64> {
        self.scores.get(&offset).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Entries in offset order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.scores.iter().map(|(&o, &v)| (o, v))
    }

    /// Offsets whose value lies inside `bounds`, or outside when `out`.
    pub fn range(&self, bounds: &RangeBounds, out: bool) -> RoaringBitmap {
        self.iter()
            .filter(|&(_, v)| bounds.contains(v) != out)
            .map(|(o, _)| o)
            .collect()
    }
}

/// Index structures of one scalar field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldGroup {
    kind: ScalarFieldKind,
    values: BTreeMap<String, RoaringBitmap>,
    ranged: Option<RangedMap>,
}

impl FieldGroup {
    pub fn new(kind: ScalarFieldKind) -> Self {
        let ranged = match kind {
            ScalarFieldKind::Int64 | ScalarFieldKind::Float32 => Some(RangedMap::default()),
            _ => None,
        };
        Self {
            kind,
            values: BTreeMap::new(),
            ranged,
        }
    }

    pub fn kind(&self) -> ScalarFieldKind {
        self.kind
    }

    fn has_values(&self) -> bool {
        self.kind != ScalarFieldKind::Float32
    }

    pub fn ranged(&self) -> Option<&RangedMap> {
        self.ranged.as_ref()
    }

    /// Text keys in sorted order with their offsets.
    pub fn values(&self) -> &BTreeMap<String, RoaringBitmap> {
        &self.values
    }

    /// A value holding `;` indexes each non-empty part as its own key.
    fn keys_of(&self, raw: &str) -> Vec<String> {
        let parts: Vec<&str> = if raw.contains(';') {
            raw.split(';').filter(|p| !p.is_empty()).collect()
        } else {
            vec![raw]
        };
        match self.kind {
            ScalarFieldKind::Path => parts.into_iter().map(normalize_path).collect(),
            _ => parts.into_iter().map(str::to_string).collect(),
        }
    }

    fn add_text(&mut self, raw: &str, offset: u32) {
        if !self.has_values() {
            return;
        }
        for key in self.keys_of(raw) {
            self.values.entry(key).or_default().insert(offset);
        }
    }

    fn remove_text(&mut self, raw: &str, offset: u32) {
        for key in self.keys_of(raw) {
            let emptied = match self.values.get_mut(&key) {
                Some(bitmap) => {
                    bitmap.remove(offset);
                    bitmap.is_empty()
                }
                None => false,
            };
            if emptied {
                self.values.remove(&key);
            }
        }
    }

    fn remove_offset(&mut self, offset: u32) {
        self.values.retain(|_, bitmap| {
            bitmap.remove(offset);
            !bitmap.is_empty()
        });
        if let Some(ranged) = self.ranged.as_mut() {
            ranged.remove(offset);
        }
    }

    /// Union of the bitmaps of `keys`.
    fn union_of(&self, keys: &[String]) -> RoaringBitmap {
        let mut result = RoaringBitmap::new();
        for key in keys {
            if let Some(bitmap) = self.values.get(key) {
                result |= bitmap;
            }
        }
        result
    }

    fn union_where<F: Fn(&str) -> bool>(&self, pred: F) -> RoaringBitmap {
        self.values
            .iter()
            .filter(|(key, _)| pred(key))
            .fold(RoaringBitmap::new(), |acc, (_, bm)| &acc | bm)
    }
}

/// All field groups of a scalar index plus the live element set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSets {
    groups: BTreeMap<String, FieldGroup>,
    all_offsets: RoaringBitmap,
}

impl FieldSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `field` with `kind`. Unknown kinds are skipped.
    pub fn add_group(&mut self, field: &str, kind: ScalarFieldKind) {
        if kind == ScalarFieldKind::Unknown {
            warn!(field, "skipping scalar field of unknown type");
            return;
        }
        self.groups
            .entry(field.to_string())
            .or_insert_with(|| FieldGroup::new(kind));
    }

    pub fn group(&self, field: &str) -> Option<&FieldGroup> {
        self.groups.get(field)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_path_field(&self, field: &str) -> bool {
        self.group(field)
            .map(|g| g.kind == ScalarFieldKind::Path)
            .unwrap_or(false)
    }

    /// Every live offset.
    pub fn all_offsets(&self) -> &RoaringBitmap {
        &self.all_offsets
    }

    pub fn element_count(&self) -> u64 {
        self.all_offsets.len()
    }

    /// Indexes `fields` at `offset` and marks the offset live.
    pub fn add_field_data(&mut self, fields: &FieldsDict, offset: u32) {
        self.all_offsets.insert(offset);
        for (name, keys) in fields.text() {
            if let Some(group) = self.groups.get_mut(name) {
                for key in keys {
                    group.add_text(key, offset);
                }
            }
        }
        for (name, values) in fields.numeric() {
            if let Some(ranged) = self.groups.get_mut(name).and_then(|g| g.ranged.as_mut()) {
                if let Some(&value) = values.first() {
                    ranged.insert(offset, value);
                }
            }
        }
    }

    /// Removes the index entries `fields` made at `offset`.
    pub fn delete_field_data(&mut self, fields: &FieldsDict, offset: u32) {
        for (name, keys) in fields.text() {
            if let Some(group) = self.groups.get_mut(name) {
                for key in keys {
                    group.remove_text(key, offset);
                }
            }
        }
        for name in fields.numeric().keys() {
            if let Some(ranged) = self.groups.get_mut(name).and_then(|g| g.ranged.as_mut()) {
                ranged.remove(offset);
            }
        }
    }

    /// Drops `offset` from every group and from the element set.
    pub fn remove_offset(&mut self, offset: u32) {
        for group in self.groups.values_mut() {
            group.remove_offset(offset);
        }
        self.all_offsets.remove(offset);
    }

    /// Offsets holding any of `keys`. `None` when the field is not indexed.
    pub fn value_bitmap(&self, field: &str, keys: &[String]) -> Option<RoaringBitmap> {
        let group = self.group(field)?;
        let keys: Vec<String> = keys.iter().flat_map(|k| group.keys_of(k)).collect();
        Some(group.union_of(&keys))
    }

    /// Offsets whose path lies under any of `prefixes`, at most `depth`
    /// levels below it (`None` for unlimited).
    pub fn path_bitmap(
        &self,
        field: &str,
        prefixes: &[String],
        depth: Option<usize>,
    ) -> Option<RoaringBitmap> {
        let group = self.group(field)?;
        let prefixes: Vec<Vec<&str>> = prefixes.iter().map(|p| path_segments(p)).collect();
        if depth.is_none() && prefixes.iter().any(|p| p.is_empty()) {
            return Some(self.all_offsets.clone());
        }

        Some(group.union_where(|key| {
            let segments = path_segments(key);
            prefixes.iter().any(|prefix| {
                segments.starts_with(prefix)
                    && depth.map_or(true, |d| segments.len() - prefix.len() <= d)
            })
        }))
    }

    /// Live offsets outside `bitmap`.
    pub fn exclude(&self, bitmap: &RoaringBitmap) -> RoaringBitmap {
        &self.all_offsets - bitmap
    }

    /// Offsets whose numeric value is in `bounds` (outside when `out`).
    pub fn range_bitmap(
        &self,
        field: &str,
        bounds: &RangeBounds,
        out: bool,
    ) -> Option<RoaringBitmap> {
        let ranged = self.group(field)?.ranged()?;
        Some(ranged.range(bounds, out))
    }

    /// Offsets within euclidean `radius` of `center` over two numeric fields.
    pub fn range2d_bitmap(
        &self,
        fields: [&str; 2],
        center: [f64; 2],
        radius: f64,
    ) -> Option<RoaringBitmap> {
        let xs = self.group(fields[0])?.ranged()?;
        let ys = self.group(fields[1])?.ranged()?;
        let limit = radius * radius;
        Some(
            xs.iter()
                .filter_map(|(offset, x)| {
                    let y = ys.get(offset)?;
                    let (dx, dy) = (x - center[0], y - center[1]);
                    (dx * dx + dy * dy <= limit).then_some(offset)
                })
                .collect(),
        )
    }

    /// Offsets whose text key starts with `prefix`.
    pub fn prefix_bitmap(&self, field: &str, prefix: &str) -> Option<RoaringBitmap> {
        let group = self.group(field)?;
        let prefix = if group.kind == ScalarFieldKind::Path && !prefix.starts_with('/') {
            format!("/{}", prefix)
        } else {
            prefix.to_string()
        };
        Some(group.union_where(|key| key.starts_with(&prefix)))
    }

    /// Offsets whose text key contains `substring`.
    pub fn contains_bitmap(&self, field: &str, substring: &str) -> Option<RoaringBitmap> {
        let group = self.group(field)?;
        Some(group.union_where(|key| key.contains(substring)))
    }

    /// Per-key counts over one field, or over the joint keys of two fields
    /// (`"a,b"`), restricted to `valid` when given. Zero counts are omitted.
    pub fn count_values(
        &self,
        fields: &[String],
        valid: Option<&RoaringBitmap>,
    ) -> Option<BTreeMap<String, u64>> {
        let restrict = |bm: &RoaringBitmap| match valid {
            Some(v) => bm & v,
            None => bm.clone(),
        };

        let mut counts = BTreeMap::new();
        match fields {
            [field] => {
                for (key, bm) in self.group(field)?.values() {
                    let n = restrict(bm).len();
                    if n > 0 {
                        counts.insert(key.clone(), n);
                    }
                }
            }
            [first, second] => {
                let second = self.group(second)?;
                for (key1, bm1) in self.group(first)?.values() {
                    let base = restrict(bm1);
                    if base.is_empty() {
                        continue;
                    }
                    for (key2, bm2) in second.values() {
                        let n = (&base & bm2).len();
                        if n > 0 {
                            counts.insert(format!("{},{}", key1, key2), n);
                        }
                    }
                }
            }
            _ => return None,
        }
        Some(counts)
    }

    pub(crate) fn to_snapshot(&self) -> FieldSetsSnapshot {
        FieldSetsSnapshot {
            all_offsets: self.all_offsets.iter().collect(),
            groups: self
                .groups
                .iter()
                .map(|(name, group)| {
                    let snap = GroupSnapshot {
                        kind: group.kind,
                        values: group
                            .values
                            .iter()
                            .map(|(k, bm)| (k.clone(), bm.iter().collect()))
                            .collect(),
                        ranged: group.ranged.as_ref().map(|r| r.scores.clone()),
                    };
                    (name.clone(), snap)
                })
                .collect(),
        }
    }

    pub(crate) fn from_snapshot(snapshot: FieldSetsSnapshot) -> Self {
        let groups = snapshot
            .groups
            .into_iter()
            .map(|(name, snap)| {
                let group = FieldGroup {
                    kind: snap.kind,
                    values: snap
                        .values
                        .into_iter()
                        .map(|(k, offsets)| (k, offsets.into_iter().collect()))
                        .collect(),
                    ranged: snap.ranged.map(|scores| RangedMap { scores }),
                };
                (name, group)
            })
            .collect();
        Self {
            groups,
            all_offsets: snapshot.all_offsets.into_iter().collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct FieldSetsSnapshot {
    all_offsets: Vec<u32>,
    groups: BTreeMap<String, GroupSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GroupSnapshot {
    kind: ScalarFieldKind,
    values: BTreeMap<String, Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ranged: Option<BTreeMap<u32, f64>>,
}

fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Canonical form of a path key: leading slash, no empty segments.
pub fn normalize_path(path: &str) -> String {
    let segments = path_segments(path);
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(json: &str) -> FieldsDict {
        FieldsDict::parse(json).unwrap()
    }

    fn sample() -> FieldSets {
        let mut sets = FieldSets::new();
        sets.add_group("color", ScalarFieldKind::String);
        sets.add_group("year", ScalarFieldKind::Int64);
        sets.add_group("score", ScalarFieldKind::Float32);
        sets.add_group("dir", ScalarFieldKind::Path);

        sets.add_field_data(
            &dict(r#"{"color": "red", "year": 2020, "score": 0.1, "dir": "/a/b"}"#),
            0,
        );
        sets.add_field_data(
            &dict(r#"{"color": "blue", "year": 2022, "score": 0.5, "dir": "a/b/c/"}"#),
            1,
        );
        sets.add_field_data(
            &dict(r#"{"color": "red", "year": 2024, "score": 0.9, "dir": "/x"}"#),
            2,
        );
        sets
    }

    fn offsets(bm: &RoaringBitmap) -> Vec<u32> {
        bm.iter().collect()
    }

    #[test]
    fn test_value_bitmap() {
        let sets = sample();
        let red = sets.value_bitmap("color", &["red".into()]).unwrap();
        assert_eq!(offsets(&red), vec![0, 2]);

        let years = sets
            .value_bitmap("year", &["2020".into(), "2022".into()])
            .unwrap();
        assert_eq!(offsets(&years), vec![0, 1]);

        assert!(sets.value_bitmap("missing", &["x".into()]).is_none());
        assert!(sets
            .value_bitmap("score", &["0.5".into()])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_exclude_uses_live_offsets() {
        let sets = sample();
        let red = sets.value_bitmap("color", &["red".into()]).unwrap();
        assert_eq!(offsets(&sets.exclude(&red)), vec![1]);
    }

    #[test]
    fn test_range_and_range_out() {
        let sets = sample();
        let bounds = RangeBounds {
            lower: Some((0.2, false)),
            upper: Some((0.9, true)),
        };
        assert_eq!(
            offsets(&sets.range_bitmap("score", &bounds, false).unwrap()),
            vec![1, 2]
        );
        assert_eq!(
            offsets(&sets.range_bitmap("score", &bounds, true).unwrap()),
            vec![0]
        );
        assert!(sets.range_bitmap("color", &bounds, false).is_none());
    }

    #[test]
    fn test_range2d() {
        let sets = sample();
        let near = sets
            .range2d_bitmap(["year", "score"], [2022.0, 0.5], 1.0)
            .unwrap();
        assert_eq!(offsets(&near), vec![1]);
    }

    #[test]
    fn test_path_depth() {
        let sets = sample();
        let all_under_a = sets.path_bitmap("dir", &["/a".into()], None).unwrap();
        assert_eq!(offsets(&all_under_a), vec![0, 1]);

        let one_level = sets.path_bitmap("dir", &["a".into()], Some(1)).unwrap();
        assert_eq!(offsets(&one_level), vec![0]);

        let root = sets.path_bitmap("dir", &["/".into()], None).unwrap();
        assert_eq!(offsets(&root), vec![0, 1, 2]);
    }

    #[test]
    fn test_prefix_and_contains() {
        let sets = sample();
        assert_eq!(offsets(&sets.prefix_bitmap("dir", "a/b").unwrap()), vec![0, 1]);
        assert_eq!(offsets(&sets.contains_bitmap("color", "lu").unwrap()), vec![1]);
    }

    #[test]
    fn test_delete_and_remove_offset() {
        let mut sets = sample();
        sets.delete_field_data(&dict(r#"{"color": "red"}"#), 0);
        assert_eq!(
            offsets(&sets.value_bitmap("color", &["red".into()]).unwrap()),
            vec![2]
        );
        assert_eq!(sets.element_count(), 3);

        sets.remove_offset(2);
        assert!(sets
            .value_bitmap("color", &["red".into()])
            .unwrap()
            .is_empty());
        assert_eq!(sets.group("year").unwrap().ranged().unwrap().len(), 2);
        assert_eq!(sets.element_count(), 2);
    }

    #[test]
    fn test_count_values() {
        let sets = sample();
        let counts = sets.count_values(&["color".into()], None).unwrap();
        assert_eq!(counts["red"], 2);
        assert_eq!(counts["blue"], 1);

        let valid: RoaringBitmap = [0u32, 1].into_iter().collect();
        let joint = sets
            .count_values(&["color".into(), "year".into()], Some(&valid))
            .unwrap();
        assert_eq!(joint.len(), 2);
        assert_eq!(joint["red,2020"], 1);
        assert_eq!(joint["blue,2022"], 1);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let sets = sample();
        let json = serde_json::to_vec(&sets.to_snapshot()).unwrap();
        let restored =
            FieldSets::from_snapshot(serde_json::from_slice(&json).unwrap());
        assert_eq!(restored, sets);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("a//b/"), "/a/b");
        assert_eq!(normalize_path("/a"), "/a");
    }
}
