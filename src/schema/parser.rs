//! Parse raw `semantics.json` into a [`Schema`].

use serde_json::{Map, Value};

use crate::domain::LibraryId;
use crate::error::SchemaError;

use super::{FieldKind, PrimitiveKind, Schema, SchemaField};

impl Schema {
    /// Parse a raw semantics definition (a JSON array of field objects).
    pub fn parse(raw: &Value) -> Result<Self, SchemaError> {
        let items = raw.as_array().ok_or(SchemaError::NotAnArray)?;
        let fields = parse_fields(items, "")?;
        Ok(Self { fields })
    }

    /// Parse semantics from JSON text
    pub fn parse_str(raw: &str) -> anyhow::Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(Self::parse(&value)?)
    }
}

fn parse_fields(items: &[Value], parent: &str) -> Result<Vec<SchemaField>, SchemaError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let object = item.as_object().ok_or_else(|| SchemaError::NotAnObject {
                path: format!("{}[{}]", display_parent(parent), i),
            })?;
            parse_field(object, parent, i)
        })
        .collect()
}

fn parse_field(
    object: &Map<String, Value>,
    parent: &str,
    index: usize,
) -> Result<SchemaField, SchemaError> {
    let name = object
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| SchemaError::MissingName {
            path: format!("{}[{}]", display_parent(parent), index),
        })?
        .to_string();
    let path = join(parent, &name);

    let type_name = object.get("type").and_then(Value::as_str).unwrap_or("text");
    let kind = match type_name {
        "text" | "html" => FieldKind::Primitive(PrimitiveKind::Text),
        "number" => FieldKind::Primitive(PrimitiveKind::Number),
        "boolean" => FieldKind::Primitive(PrimitiveKind::Boolean),
        "image" => FieldKind::Primitive(PrimitiveKind::Image),
        "file" => FieldKind::Primitive(PrimitiveKind::File),
        "audio" => FieldKind::Primitive(PrimitiveKind::Audio),
        "video" => FieldKind::Primitive(PrimitiveKind::Video),
        "select" => FieldKind::Primitive(PrimitiveKind::Select(select_options(object))),
        "group" => {
            let children = object
                .get("fields")
                .and_then(Value::as_array)
                .ok_or_else(|| SchemaError::MissingDefinition {
                    path: path.clone(),
                    key: "fields".to_string(),
                })?;
            FieldKind::Group(parse_fields(children, &path)?)
        }
        "list" => {
            let element = object
                .get("field")
                .and_then(Value::as_object)
                .ok_or_else(|| SchemaError::MissingDefinition {
                    path: path.clone(),
                    key: "field".to_string(),
                })?;
            FieldKind::List(Box::new(parse_field(element, &path, 0)?))
        }
        "library" => FieldKind::Library(library_options(object, &path)?),
        other => {
            return Err(SchemaError::UnknownType {
                path,
                kind: other.to_string(),
            })
        }
    };

    let optional = object
        .get("optional")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(SchemaField {
        name,
        kind,
        required: !optional,
        default: object.get("default").cloned(),
    })
}

/// Select options are `[{ "value": ..., "label": ... }]`
fn select_options(object: &Map<String, Value>) -> Vec<Value> {
    object
        .get("options")
        .and_then(Value::as_array)
        .map(|options| {
            options
                .iter()
                .filter_map(|o| o.get("value").cloned())
                .collect()
        })
        .unwrap_or_default()
}

/// Library options are `["H5P.Text 1.1", ...]`
fn library_options(object: &Map<String, Value>, path: &str) -> Result<Vec<LibraryId>, SchemaError> {
    let options = object
        .get("options")
        .and_then(Value::as_array)
        .ok_or_else(|| SchemaError::MissingDefinition {
            path: path.to_string(),
            key: "options".to_string(),
        })?;

    options
        .iter()
        .map(|option| {
            let raw = option.as_str().unwrap_or_default();
            raw.parse::<LibraryId>().map_err(|_| SchemaError::InvalidOption {
                path: path.to_string(),
                option: option.to_string(),
            })
        })
        .collect()
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

fn display_parent(parent: &str) -> &str {
    if parent.is_empty() {
        "<root>"
    } else {
        parent
    }
}
