//! Content nodes and the finished content tree.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::identity::LibraryId;

/// License tag written into node metadata ("U" = undisclosed)
pub const DEFAULT_LICENSE: &str = "U";

/// Presentation metadata carried by every node envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    pub content_type: String,
    pub license: String,
    pub title: String,
}

impl NodeMetadata {
    pub fn new(content_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            license: DEFAULT_LICENSE.to_string(),
            title: title.into(),
        }
    }
}

/// One wrapped payload: library reference + params + metadata + sub-content id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    /// Library reference, serialized as `"Name Major.Minor"`
    #[serde(with = "library_string")]
    pub library: LibraryId,

    pub params: Value,

    pub metadata: NodeMetadata,

    pub sub_content_id: String,
}

impl ContentNode {
    pub fn to_value(&self) -> Value {
        json!({
            "library": self.library.to_string(),
            "params": self.params,
            "metadata": self.metadata,
            "subContentId": self.sub_content_id,
        })
    }
}

/// One chapter: an `H5P.Column` node whose params hold the content list
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub title: String,
    pub library: LibraryId,
    pub sub_content_id: String,
    pub nodes: Vec<ContentNode>,
}

impl Chapter {
    /// Encode as a column node (`params.content[].content` holds each node)
    pub fn to_value(&self) -> Value {
        let content: Vec<Value> = self
            .nodes
            .iter()
            .map(|node| json!({ "content": node.to_value(), "useSeparator": "auto" }))
            .collect();

        json!({
            "library": self.library.to_string(),
            "params": { "content": content },
            "metadata": NodeMetadata::new("Column", &self.title),
            "subContentId": self.sub_content_id,
        })
    }

    /// Decode a column node produced by [`Chapter::to_value`]
    pub fn from_value(value: &Value) -> anyhow::Result<Self> {
        let node: ContentNode = serde_json::from_value(value.clone())?;
        let mut nodes = Vec::new();
        if let Some(entries) = node.params.get("content").and_then(Value::as_array) {
            for entry in entries {
                let inner = entry
                    .get("content")
                    .ok_or_else(|| anyhow::anyhow!("Column entry without content"))?;
                nodes.push(serde_json::from_value(inner.clone())?);
            }
        }
        Ok(Self {
            title: node.metadata.title,
            library: node.library,
            sub_content_id: node.sub_content_id,
            nodes,
        })
    }
}

/// The finished book → chapter → node hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct ContentTree {
    /// The outermost component (the book library)
    pub root: LibraryId,
    pub title: String,
    pub language: String,
    pub chapters: Vec<Chapter>,
    pub behaviour: Map<String, Value>,
    /// Other top-level params of the root library (e.g. UI strings)
    pub settings: Map<String, Value>,
}

impl ContentTree {
    /// The content document (`content/content.json`)
    pub fn to_document(&self) -> Value {
        let chapters: Vec<Value> = self.chapters.iter().map(Chapter::to_value).collect();
        let mut document = self.settings.clone();
        document.insert("chapters".to_string(), Value::Array(chapters));
        document.insert("behaviour".to_string(), Value::Object(self.behaviour.clone()));
        Value::Object(document)
    }

    /// Rebuild the chapter list from a content document.
    pub fn chapters_from_document(document: &Value) -> anyhow::Result<Vec<Chapter>> {
        document
            .get("chapters")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow::anyhow!("Content document has no chapters list"))?
            .iter()
            .map(Chapter::from_value)
            .collect()
    }

    /// Every library identity referenced anywhere in the tree, in first-seen order.
    ///
    /// Nested references inside node params (e.g. a column inside a
    /// column) are found by scanning for `library` string keys.
    pub fn referenced_libraries(&self) -> Vec<LibraryId> {
        let mut found: Vec<LibraryId> = Vec::new();
        let mut push = |id: LibraryId| {
            if !found.iter().any(|f| f.matches(&id)) {
                found.push(id);
            }
        };

        push(self.root.clone());
        for chapter in &self.chapters {
            push(chapter.library.clone());
            for node in &chapter.nodes {
                push(node.library.clone());
                collect_nested(&node.params, &mut push);
            }
        }
        found
    }

    pub fn node_count(&self) -> usize {
        self.chapters.iter().map(|c| c.nodes.len()).sum()
    }
}

fn collect_nested(value: &Value, push: &mut impl FnMut(LibraryId)) {
    match value {
        Value::Object(map) => {
            if let (Some(Value::String(library)), Some(_)) = (map.get("library"), map.get("params")) {
                if let Ok(id) = library.parse::<LibraryId>() {
                    push(id);
                }
            }
            for child in map.values() {
                collect_nested(child, push);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_nested(item, push);
            }
        }
        _ => {}
    }
}

mod library_string {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::LibraryId;

    pub fn serialize<S: Serializer>(id: &LibraryId, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<LibraryId, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
