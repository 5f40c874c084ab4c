//! The metadata filter model.
//!
//! A [`Filter`] maps catalog metadata fields to constraints: equality
//! (string or number), a boolean flag, categorical "any of", or a numeric
//! range carrying any of {gt, gte, lt, lte}. Filters translate to the vector
//! index's predicate language via [`Filter::to_query`] and support a
//! client-side numeric re-check for the semantic fallback tier.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// An equality target: categorical fields carry lowercased strings,
/// numeric fields carry floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Text(String),
    Number(f64),
}

/// A numeric range; any subset of the four bounds may be present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
}

impl NumericRange {
    pub fn at_least(v: f64) -> Self {
        Self { gte: Some(v), ..Default::default() }
    }

    pub fn at_most(v: f64) -> Self {
        Self { lte: Some(v), ..Default::default() }
    }

    pub fn above(v: f64) -> Self {
        Self { gt: Some(v), ..Default::default() }
    }

    pub fn below(v: f64) -> Self {
        Self { lt: Some(v), ..Default::default() }
    }

    pub fn between(lo: f64, hi: f64) -> Self {
        Self { gte: Some(lo), lte: Some(hi), ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.gt.is_none() && self.gte.is_none() && self.lt.is_none() && self.lte.is_none()
    }

    /// Effective lower bound, if any.
    pub fn lower(&self) -> Option<f64> {
        match (self.gt, self.gte) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// Effective upper bound, if any.
    pub fn upper(&self) -> Option<f64> {
        match (self.lt, self.lte) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// A range is satisfiable unless both bounds exist and cross.
    pub fn is_satisfiable(&self) -> bool {
        match (self.lower(), self.upper()) {
            (Some(lo), Some(hi)) => lo <= hi,
            _ => true,
        }
    }

    /// Raise the lower bound to the tightest of the two.
    pub fn tighten_lower(&mut self, value: f64, inclusive: bool) {
        if inclusive {
            self.gte = Some(self.gte.map_or(value, |v| v.max(value)));
        } else {
            self.gt = Some(self.gt.map_or(value, |v| v.max(value)));
        }
    }

    /// Lower the upper bound to the tightest of the two.
    pub fn tighten_upper(&mut self, value: f64, inclusive: bool) {
        if inclusive {
            self.lte = Some(self.lte.map_or(value, |v| v.min(value)));
        } else {
            self.lt = Some(self.lt.map_or(value, |v| v.min(value)));
        }
    }

    /// Merge by union of bound kinds; bounds already present win.
    pub fn merge_missing(&mut self, other: &NumericRange) {
        if self.gt.is_none() {
            self.gt = other.gt;
        }
        if self.gte.is_none() {
            self.gte = other.gte;
        }
        if self.lt.is_none() {
            self.lt = other.lt;
        }
        if self.lte.is_none() {
            self.lte = other.lte;
        }
    }

    pub fn contains(&self, v: f64) -> bool {
        if let Some(t) = self.gt {
            if !(v > t) {
                return false;
            }
        }
        if let Some(t) = self.gte {
            if !(v >= t) {
                return false;
            }
        }
        if let Some(t) = self.lt {
            if !(v < t) {
                return false;
            }
        }
        if let Some(t) = self.lte {
            if !(v <= t) {
                return false;
            }
        }
        true
    }
}

/// A single field constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    Eq(FilterValue),
    Range(NumericRange),
    AnyOf(Vec<String>),
    Flag(bool),
}

/// A structured metadata filter: field name → constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    fields: BTreeMap<String, Constraint>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, constraint: Constraint) {
        self.fields.insert(field.into(), constraint);
    }

    pub fn get(&self, field: &str) -> Option<&Constraint> {
        self.fields.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Constraint> {
        self.fields.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Constraint)> {
        self.fields.iter()
    }

    /// Keep only the named field (used by the reroute tier).
    pub fn retain_field(&mut self, field: &str) {
        self.fields.retain(|k, _| k == field);
    }

    /// Drop unsatisfiable range dimensions. Ill-formed ranges are treated as
    /// no filter on that dimension, not as an error.
    pub fn sanitized(mut self) -> Option<Filter> {
        self.fields.retain(|field, c| match c {
            Constraint::Range(r) => {
                let ok = !r.is_empty() && r.is_satisfiable();
                if !ok {
                    tracing::debug!(field, "dropping unsatisfiable range constraint");
                }
                ok
            }
            Constraint::AnyOf(vals) => !vals.is_empty(),
            _ => true,
        });
        if self.fields.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    /// Translate to the index's query predicate language
    /// ($eq / $gt / $gte / $lt / $lte / $in).
    pub fn to_query(&self) -> Value {
        let mut out = serde_json::Map::new();
        for (field, c) in &self.fields {
            let v = match c {
                Constraint::Eq(FilterValue::Text(s)) => json!({ "$eq": s }),
                Constraint::Eq(FilterValue::Number(n)) => json!({ "$eq": n }),
                Constraint::Flag(b) => json!({ "$eq": b }),
                Constraint::AnyOf(vals) => json!({ "$in": vals }),
                Constraint::Range(r) => {
                    let mut ops = serde_json::Map::new();
                    if let Some(t) = r.gt {
                        ops.insert("$gt".into(), json!(t));
                    }
                    if let Some(t) = r.gte {
                        ops.insert("$gte".into(), json!(t));
                    }
                    if let Some(t) = r.lt {
                        ops.insert("$lt".into(), json!(t));
                    }
                    if let Some(t) = r.lte {
                        ops.insert("$lte".into(), json!(t));
                    }
                    Value::Object(ops)
                }
            };
            out.insert(field.clone(), v);
        }
        Value::Object(out)
    }

    /// Full predicate evaluation against a record's metadata, mirroring the
    /// index's server-side semantics. Used by the in-memory index.
    pub fn satisfies(&self, metadata: &serde_json::Map<String, Value>) -> bool {
        for (field, c) in &self.fields {
            let value = metadata.get(field);
            let ok = match c {
                Constraint::Eq(FilterValue::Text(want)) => {
                    matches!(value, Some(Value::String(s)) if s == want)
                }
                Constraint::Eq(FilterValue::Number(want)) => {
                    value.and_then(coerce_number) == Some(*want)
                }
                Constraint::Flag(want) => {
                    matches!(value, Some(Value::Bool(b)) if b == want)
                }
                Constraint::AnyOf(vals) => {
                    matches!(value, Some(Value::String(s)) if vals.iter().any(|v| v == s))
                }
                Constraint::Range(r) => {
                    value.and_then(coerce_number).is_some_and(|v| r.contains(v))
                }
            };
            if !ok {
                return false;
            }
        }
        true
    }

    /// Client-side check that a record's metadata meets every numeric
    /// constraint (ranges and numeric equality). Categorical constraints are
    /// not re-checked here; this backs the semantic fallback tier.
    pub fn satisfies_numeric(&self, metadata: &serde_json::Map<String, Value>) -> bool {
        for (field, c) in &self.fields {
            let (range, eq) = match c {
                Constraint::Range(r) => (Some(r), None),
                Constraint::Eq(FilterValue::Number(n)) => (None, Some(*n)),
                _ => continue,
            };
            let v = match metadata.get(field).and_then(coerce_number) {
                Some(v) => v,
                None => return false,
            };
            if let Some(r) = range {
                if !r.contains(v) {
                    return false;
                }
            }
            if let Some(target) = eq {
                if v != target {
                    return false;
                }
            }
        }
        true
    }
}

/// Coerce a metadata value to a number: numbers pass through, strings yield
/// their first embedded numeric literal, anything else is unparseable.
pub fn coerce_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_leading_number(s),
        _ => None,
    }
}

/// First numeric literal in a string ("6ft [1.8m]" → 6.0), or None.
fn parse_leading_number(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut start = None;
    for (i, &b) in bytes.iter().enumerate() {
        if b.is_ascii_digit() {
            start = Some(i);
            break;
        }
    }
    let mut start = start?;
    // allow a sign directly before the first digit
    if start > 0 && (bytes[start - 1] == b'-' || bytes[start - 1] == b'+') {
        start -= 1;
    }
    let mut end = start + 1;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => end += 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    s[start..end].trim_end_matches('.').parse().ok()
}
