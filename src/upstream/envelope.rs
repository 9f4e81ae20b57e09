//! Envelope extraction.
//!
//! Upstreams wrap their item lists in different shapes: a bare array,
//! a Spring-style `{content, number, totalPages, last}` page, an
//! `{items, totalCount}` page, or a `{data: {...}}` wrapper around either.

use serde_json::Value;

/// Container keys probed in priority order.
pub const CONTAINER_KEYS: &[&str] = &["content", "items", "results", "data"];

/// Return the item records carried by a decoded response body.
///
/// Unrecognized shapes yield an empty list, never an error.
pub fn extract_items(body: &Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items.clone(),
        Value::Object(_) => probe(body, 1).map(<[Value]>::to_vec).unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Probe container keys, descending into a nested object at most `depth` times.
fn probe(value: &Value, depth: u8) -> Option<&[Value]> {
    let map = value.as_object()?;

    for key in CONTAINER_KEYS {
        if let Some(Value::Array(items)) = map.get(*key) {
            return Some(items);
        }
    }

    if depth == 0 {
        return None;
    }

    CONTAINER_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .filter(|v| v.is_object())
        .find_map(|nested| probe(nested, depth - 1))
}

/// Pagination metadata that may accompany a page of items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMeta {
    pub last: Option<bool>,
    pub number: Option<i64>,
    pub total_pages: Option<i64>,
    pub total_count: Option<i64>,
}

impl PageMeta {
    /// Read metadata from the envelope, falling back to a nested `data` object.
    pub fn from_envelope(body: &Value) -> Self {
        let top = Self::read(body);
        if top != Self::default() {
            return top;
        }
        body.get("data").map(Self::read).unwrap_or_default()
    }

    fn read(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };
        Self {
            last: map.get("last").and_then(Value::as_bool),
            number: map.get("number").and_then(Value::as_i64),
            total_pages: map.get("totalPages").and_then(Value::as_i64),
            total_count: map.get("totalCount").and_then(Value::as_i64),
        }
    }

    /// True when the envelope itself says no page follows this one.
    pub fn is_final_page(&self) -> bool {
        if self.last == Some(true) {
            return true;
        }
        matches!(
            (self.number, self.total_pages),
            (Some(number), Some(total)) if number >= total.saturating_sub(1)
        )
    }
}
