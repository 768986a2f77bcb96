//! Clustering units and the loaders that produce them.
//!
//! An [`Item`] is one text to embed plus an opaque metadata payload carried
//! through to the reports. Items are positional: the index of an item in the
//! input slice is its identity in every later stage (embeddings, labels,
//! dendrogram leaves).
//!
//! Two input shapes are understood:
//!
//! | Shape | Top level | Text |
//! |-------|-----------|------|
//! | Plain items | JSON array of `{text, metadata?}` | `text` as given |
//! | Opinion cards | JSON object with `reviewThreadSuggestions` / `commentSuggestions` | `"Problem: .. Suggestion: .."` |

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

/// One clustering unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// The string that gets embedded.
    pub text: String,
    /// Opaque payload, reported but never interpreted. Missing or `null`
    /// metadata reads as `{}`.
    #[serde(default = "empty_metadata", deserialize_with = "metadata_or_empty")]
    pub metadata: Value,
}

fn empty_metadata() -> Value {
    Value::Object(Map::new())
}

fn metadata_or_empty<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Value, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => empty_metadata(),
        other => other,
    })
}

impl Item {
    /// Create an item.
    pub fn new(text: impl Into<String>, metadata: Value) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Create an item with empty (object) metadata.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(text, empty_metadata())
    }
}

/// Collapse every run of whitespace to a single space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Load items from a JSON file, detecting the input shape.
///
/// Texts are whitespace-normalized.
pub fn load_items(path: impl AsRef<Path>) -> Result<Vec<Item>> {
    let raw = fs::read_to_string(path.as_ref())?;
    let doc: Value = serde_json::from_str(&raw)?;
    let items = match doc {
        Value::Array(_) => serde_json::from_value::<Vec<Item>>(doc)?,
        Value::Object(_) => items_from_opinion_cards(&doc),
        _ => {
            return Err(Error::invalid_config(
                "input",
                "expected a JSON array of items or an opinion-card object",
            ))
        }
    };

    let items: Vec<Item> = items
        .into_iter()
        .map(|item| Item::new(normalize_whitespace(&item.text), item.metadata))
        .collect();
    tracing::info!(
        path = %path.as_ref().display(),
        n_items = items.len(),
        "loaded items"
    );
    Ok(items)
}

/// Load the opinion cards of an extraction document.
pub fn load_opinion_cards(path: impl AsRef<Path>) -> Result<Vec<Item>> {
    let raw = fs::read_to_string(path.as_ref())?;
    let doc: Value = serde_json::from_str(&raw)?;
    Ok(items_from_opinion_cards(&doc))
}

/// Build items from an extraction document.
///
/// Review-thread opinions come first, then comment opinions, each in document
/// order. Opinions missing a problem or a suggestion are skipped.
pub fn items_from_opinion_cards(doc: &Value) -> Vec<Item> {
    let mut items = Vec::new();
    collect_opinions(
        doc,
        "reviewThreadSuggestions",
        "reviewThreadId",
        "thread_id",
        "reviewThread",
        &mut items,
    );
    collect_opinions(
        doc,
        "commentSuggestions",
        "commentId",
        "comment_id",
        "comment",
        &mut items,
    );
    items
}

fn collect_opinions(
    doc: &Value,
    section: &str,
    source_id_key: &str,
    metadata_id_key: &str,
    source: &str,
    out: &mut Vec<Item>,
) {
    let Some(entries) = doc.get(section).and_then(Value::as_array) else {
        return;
    };

    for entry in entries {
        let source_id = entry
            .get(source_id_key)
            .and_then(Value::as_str)
            .unwrap_or_default();
        let Some(opinions) = entry.get("opinions").and_then(Value::as_array) else {
            continue;
        };

        for opinion in opinions {
            let problem = str_field(opinion, "problem").trim();
            let suggestion = str_field(opinion, "suggestion").trim();
            if problem.is_empty() || suggestion.is_empty() {
                continue;
            }

            let mut metadata = json!({
                "problem": problem,
                "suggestion": suggestion,
                "reasons": opinion.get("reasons").cloned().unwrap_or_else(|| json!([])),
                "contexts": opinion.get("contexts").cloned().unwrap_or_else(|| json!([])),
                "type": str_field(opinion, "type"),
                "card_id": str_field(opinion, "cardId"),
                "source": source,
            });
            metadata[metadata_id_key] = Value::String(source_id.to_string());

            out.push(Item::new(
                normalize_whitespace(&format!("Problem: {problem} Suggestion: {suggestion}")),
                metadata,
            ));
        }
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}
