//! The H5P semantics schema language.
//!
//! A schema is an ordered list of fields. Fields are recursive: groups
//! hold sub-fields, lists hold one element field, and library fields are
//! polymorphic references to one of several allowed libraries.
//!
//! - `parser`: raw `semantics.json` → [`Schema`]
//! - `validator`: [`Schema`] + content value → [`ValidationReport`]
//! - `defaults`: fills declared defaults into content values

pub mod defaults;
pub mod parser;
pub mod validator;

use serde_json::Value;

use crate::domain::LibraryId;

pub use validator::{ValidationIssue, ValidationReport};

/// A parsed schema: the top-level field list of a library's semantics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub fields: Vec<SchemaField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Primitive(PrimitiveKind),

    /// Ordered sub-fields stored as an object
    Group(Vec<SchemaField>),

    /// Every element validated against one element field
    List(Box<SchemaField>),

    /// One of the allowed libraries, wrapped in a node envelope
    Library(Vec<LibraryId>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveKind {
    Text,
    Number,
    Boolean,
    /// String (or number) restricted to the listed option values
    Select(Vec<Value>),
    /// Object with a `path`
    Image,
    /// Object with a `path`
    File,
    /// Array of objects with a `path`
    Audio,
    /// Array of objects with a `path`
    Video,
}

impl PrimitiveKind {
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Text => "text",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Select(_) => "select",
            PrimitiveKind::Image => "image",
            PrimitiveKind::File => "file",
            PrimitiveKind::Audio => "audio",
            PrimitiveKind::Video => "video",
        }
    }
}

impl Schema {
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Find a top-level field by name
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Descend the schema along a dotted path.
    ///
    /// A segment naming a list field resolves to that list's element
    /// field, so `questions.answers` walks into the element group of the
    /// `questions` list. Index suffixes (`items[2]`) are ignored.
    pub fn field_at(&self, path: &str) -> Option<&SchemaField> {
        let mut fields: &[SchemaField] = &self.fields;
        let mut current: Option<&SchemaField> = None;

        for segment in path.split('.').filter(|s| !s.is_empty()) {
            let name = segment.split('[').next().unwrap_or(segment);
            let mut field = fields.iter().find(|f| f.name == name)?;
            while let FieldKind::List(element) = &field.kind {
                field = element.as_ref();
            }
            fields = match &field.kind {
                FieldKind::Group(children) => children.as_slice(),
                _ => &[],
            };
            current = Some(field);
        }

        current
    }
}

impl SchemaField {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}
