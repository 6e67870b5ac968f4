//! Fill schema defaults into content values.
//!
//! Libraries declare defaults for most settings and UI strings, and the
//! player expects them to be present in `content.json`.

use serde_json::{Map, Value};

use super::{FieldKind, Schema, SchemaField};

impl Schema {
    /// Fill absent or null fields that declare a `default`.
    ///
    /// Absent groups are created when any of their children has a default.
    /// List elements receive their element defaults. Library fields are
    /// left untouched since their own semantics are not known here.
    pub fn apply_defaults(&self, value: &mut Value) {
        if let Value::Object(object) = value {
            fill_fields(object, &self.fields);
        }
    }
}

fn fill_fields(object: &mut Map<String, Value>, fields: &[SchemaField]) {
    for field in fields {
        let present = object.get(&field.name).map_or(false, |v| !v.is_null());
        if present {
            if let Some(value) = object.get_mut(&field.name) {
                fill_value(value, field);
            }
        } else if let Some(default) = default_for(field) {
            object.insert(field.name.clone(), default);
        }
    }
}

fn fill_value(value: &mut Value, field: &SchemaField) {
    match (&field.kind, value) {
        (FieldKind::Group(children), Value::Object(object)) => fill_fields(object, children),
        (FieldKind::List(element), Value::Array(items)) => {
            for item in items.iter_mut() {
                if item.is_null() {
                    if let Some(default) = default_for(element) {
                        *item = default;
                    }
                } else {
                    fill_value(item, element);
                }
            }
        }
        _ => {}
    }
}

/// Value for an absent field: its declared default, or a group built
/// from its children's defaults
fn default_for(field: &SchemaField) -> Option<Value> {
    if let Some(default) = &field.default {
        let mut value = default.clone();
        fill_value(&mut value, field);
        return Some(value);
    }

    match &field.kind {
        FieldKind::Group(children) => {
            let mut object = Map::new();
            fill_fields(&mut object, children);
            (!object.is_empty()).then_some(Value::Object(object))
        }
        _ => None,
    }
}
