//! Validate content values against a parsed [`Schema`].
//!
//! Errors are collected rather than short-circuited; each carries the
//! field path it was found at (`parent.child`, `items[2].answer`).
//!
//! A required field that is absent but declares a `default` is satisfied;
//! [`Schema::apply_defaults`] writes those defaults into the content.
//!
//! Library fields are checked for envelope shape and for membership of
//! the referenced library in the allowed set. The referenced library's
//! own semantics are not fetched here.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::LibraryId;

use super::{FieldKind, PrimitiveKind, Schema, SchemaField};

/// Keys every library envelope must carry
pub const ENVELOPE_KEYS: [&str; 3] = ["library", "params", "metadata"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Aggregated result of validating one value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn first(&self) -> Option<&ValidationIssue> {
        self.errors.first()
    }

    /// Append another report's errors under a path prefix
    pub fn merge_prefixed(&mut self, prefix: &str, other: ValidationReport) {
        for issue in other.errors {
            self.errors.push(ValidationIssue {
                path: join(prefix, &issue.path),
                message: issue.message,
            });
        }
    }

    fn push(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.into(),
        });
    }
}

impl Schema {
    /// Validate a params object against this schema.
    pub fn validate(&self, value: &Value) -> ValidationReport {
        let mut report = ValidationReport::default();
        match value.as_object() {
            Some(object) => validate_fields(object, &self.fields, "", &mut report),
            None => report.push("", format!("expected an object, found {}", type_name(value))),
        }
        report
    }
}

fn validate_fields(
    object: &Map<String, Value>,
    fields: &[SchemaField],
    parent: &str,
    report: &mut ValidationReport,
) {
    for field in fields {
        let path = join(parent, &field.name);
        validate_field(object.get(&field.name), field, &path, report);
    }
}

fn validate_field(value: Option<&Value>, field: &SchemaField, path: &str, report: &mut ValidationReport) {
    let value = match value {
        Some(Value::Null) | None => {
            if !field.required || field.default.is_some() {
                return;
            }
            // An absent group is an empty group: only children that
            // cannot fall back to a default are missing
            if let FieldKind::Group(children) = &field.kind {
                validate_fields(&Map::new(), children, path, report);
            } else {
                report.push(path, "required field is missing");
            }
            return;
        }
        Some(value) => value,
    };

    match &field.kind {
        FieldKind::Primitive(kind) => validate_primitive(value, kind, path, report),

        FieldKind::Group(children) => match value.as_object() {
            Some(object) => validate_fields(object, children, path, report),
            None => report.push(path, format!("expected a group object, found {}", type_name(value))),
        },

        FieldKind::List(element) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{}[{}]", path, i);
                    validate_field(Some(item), element, &item_path, report);
                }
            }
            None => report.push(path, format!("expected a list, found {}", type_name(value))),
        },

        FieldKind::Library(allowed) => validate_envelope(value, allowed, path, report),
    }
}

fn validate_primitive(value: &Value, kind: &PrimitiveKind, path: &str, report: &mut ValidationReport) {
    let ok = match kind {
        PrimitiveKind::Text => value.is_string(),
        PrimitiveKind::Number => value.is_number(),
        PrimitiveKind::Boolean => value.is_boolean(),
        PrimitiveKind::Select(options) => {
            if !(value.is_string() || value.is_number()) {
                false
            } else if !options.is_empty() && !options.contains(value) {
                report.push(path, format!("{} is not one of the allowed options", value));
                return;
            } else {
                true
            }
        }
        PrimitiveKind::Image | PrimitiveKind::File => has_path(value),
        PrimitiveKind::Audio | PrimitiveKind::Video => match value.as_array() {
            Some(files) => {
                for (i, file) in files.iter().enumerate() {
                    if !has_path(file) {
                        report.push(&format!("{}[{}]", path, i), "expected an object with a path");
                    }
                }
                return;
            }
            None => false,
        },
    };

    if !ok {
        report.push(path, format!("expected {}, found {}", kind.name(), type_name(value)));
    }
}

fn validate_envelope(value: &Value, allowed: &[LibraryId], path: &str, report: &mut ValidationReport) {
    let Some(object) = value.as_object() else {
        report.push(path, format!("expected a library envelope, found {}", type_name(value)));
        return;
    };

    for key in ENVELOPE_KEYS {
        if !object.contains_key(key) {
            report.push(&join(path, key), "missing envelope key");
        }
    }

    if let Some(library) = object.get("library") {
        match library.as_str().map(str::parse::<LibraryId>) {
            Some(Ok(id)) => {
                if !allowed.iter().any(|a| a.matches(&id)) {
                    report.push(
                        &join(path, "library"),
                        format!("{} is not an allowed library here", id),
                    );
                }
            }
            _ => report.push(&join(path, "library"), format!("invalid library reference {}", library)),
        }
    }

    for key in ["params", "metadata"] {
        if let Some(inner) = object.get(key) {
            if !inner.is_object() {
                report.push(&join(path, key), format!("expected an object, found {}", type_name(inner)));
            }
        }
    }
}

fn has_path(value: &Value) -> bool {
    value.get("path").map(Value::is_string).unwrap_or(false)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else if name.is_empty() {
        parent.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}
