//! Tolerant normalization of gateway completions into item candidates
//!
//! The remote model is asked for a JSON array of `{name, price, quantity}`
//! but is treated as untrusted: the payload may arrive wrapped in a fenced
//! code block, surrounded by prose, with fields missing or mistyped, or
//! with no array at all. Every failure mode degrades to defaults or an
//! empty list; this module never returns an error. The caller tells
//! "found 0 items" apart from "call failed" via the session state machine,
//! not via the return shape here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder name for items the model left unnamed
const UNKNOWN_ITEM_NAME: &str = "unknown item";

/// A line-item candidate as extracted from the completion text
///
/// Values are coerced but not sanitized: negative prices or quantities
/// pass through and are normalized when the bill session seeds its items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCandidate {
    pub name: String,
    pub price: f64,
    pub quantity: i64,
}

/// Normalize raw completion text into item candidates
///
/// Strips a single fenced code block if present (a ```json fence is
/// preferred over a bare one), parses the payload as a JSON array, and
/// coerces each object entry field-by-field. Source order is preserved.
pub fn normalize(raw: &str) -> Vec<ItemCandidate> {
    let fenced = fenced_block(raw, "json").or_else(|| fenced_block(raw, ""));

    // When the fenced payload does not parse, fall back to the raw text
    let parsed = match fenced {
        Some(inner) => serde_json::from_str::<Value>(inner)
            .or_else(|_| serde_json::from_str::<Value>(raw)),
        None => serde_json::from_str::<Value>(raw),
    };

    let entries = match parsed {
        Ok(Value::Array(entries)) => entries,
        _ => return Vec::new(),
    };

    entries.iter().filter_map(candidate_from_entry).collect()
}

/// Extract the inner text of the first fenced block with the given tag
fn fenced_block<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let opening = format!("```{}\n", tag);
    let start = text.find(&opening)? + opening.len();
    let end = text[start..].find("\n```")?;
    Some(&text[start..start + end])
}

/// Coerce one array entry; non-object entries are skipped
fn candidate_from_entry(entry: &Value) -> Option<ItemCandidate> {
    let object = entry.as_object()?;

    Some(ItemCandidate {
        name: coerce_name(object.get("name")),
        price: coerce_price(object.get("price")),
        quantity: coerce_quantity(object.get("quantity")),
    })
}

/// Name: non-empty string kept as-is, everything else gets the placeholder
fn coerce_name(value: Option<&Value>) -> String {
    match value.and_then(Value::as_str) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => UNKNOWN_ITEM_NAME.to_string(),
    }
}

/// Price: number or numeric string, defaulting to 0 when coercion fails
fn coerce_price(value: Option<&Value>) -> f64 {
    let coerced = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    coerced.filter(|p| p.is_finite()).unwrap_or(0.0)
}

/// Quantity: integer, with fractional inputs truncated, defaulting to 1
fn coerce_quantity(value: Option<&Value>) -> i64 {
    let coerced = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    };
    coerced.unwrap_or(1)
}
