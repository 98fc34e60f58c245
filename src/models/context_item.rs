#[cfg(test)]
#[path = "context_item_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::frame::non_empty_str;

/// One retrieved passage shown alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ContextItem {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: Map::new(),
        }
    }

    /// Build an item from one entry of a retrieval list. `index` is the
    /// entry's position and only shows up in the synthesized id.
    pub fn from_value(value: &Value, index: usize) -> Self {
        let metadata = value
            .get("metadata")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let id = id_of(metadata.get("segment_id"))
            .or_else(|| id_of(value.get("id")))
            .unwrap_or_else(|| format!("result-{}", index));

        let content = ["content", "text", "title"]
            .iter()
            .find_map(|field| non_empty_str(value.get(*field)))
            .unwrap_or_default()
            .to_string();

        Self {
            id,
            content,
            metadata,
        }
    }

    pub fn from_list(values: &[Value]) -> Vec<Self> {
        values
            .iter()
            .enumerate()
            .map(|(index, value)| Self::from_value(value, index))
            .collect()
    }
}

fn id_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
