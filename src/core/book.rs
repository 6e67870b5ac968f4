//! Book definitions and loading.
//!
//! Books are defined in YAML and consist of ordered chapters, each
//! holding ordered content items tagged by type.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CompileError;

/// A complete book definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookDefinition {
    /// Book title (also the package title)
    #[serde(default)]
    pub title: String,

    /// Content language code, e.g. "en"
    #[serde(default)]
    pub language: String,

    /// Ordered chapters
    #[serde(default)]
    pub chapters: Vec<ChapterDefinition>,
}

impl BookDefinition {
    /// Load a book from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read book file: {}", path.display()))?;

        Self::from_yaml(&content)
    }

    /// Parse a book from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse book YAML")
    }

    /// Check the top-level fields; item contents are the handlers' concern
    pub fn validate(&self) -> std::result::Result<(), CompileError> {
        if self.title.trim().is_empty() {
            return Err(CompileError::Configuration("Book title cannot be empty".to_string()));
        }

        if self.language.trim().is_empty() {
            return Err(CompileError::Configuration("Book language cannot be empty".to_string()));
        }

        if self.chapters.is_empty() {
            return Err(CompileError::Configuration(
                "Book must have at least one chapter".to_string(),
            ));
        }

        for (i, chapter) in self.chapters.iter().enumerate() {
            if chapter.title.trim().is_empty() {
                return Err(CompileError::Configuration(format!("Chapter {} has an empty title", i)));
            }

            for (j, item) in chapter.content.iter().enumerate() {
                if item.type_tag.trim().is_empty() {
                    return Err(CompileError::Configuration(format!(
                        "Item {} of chapter '{}' has no type",
                        j, chapter.title
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn item_count(&self) -> usize {
        self.chapters.iter().map(|c| c.content.len()).sum()
    }
}

/// A single chapter in a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterDefinition {
    #[serde(default)]
    pub title: String,

    /// Ordered content items
    #[serde(default)]
    pub content: Vec<ContentItem>,
}

/// A content item: a type tag plus the fields its handler understands
///
/// ```yaml
/// - type: quiz
///   question: What is 2 + 2?
///   answers:
///     - { text: "4", correct: true }
///     - { text: "5" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type", default)]
    pub type_tag: String,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ContentItem {
    pub fn new(type_tag: impl Into<String>, fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            type_tag: type_tag.into(),
            fields,
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    /// A non-empty string field
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Title for node metadata, falling back to the given default
    pub fn title_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.str_field("title").unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BOOK_YAML: &str = r#"
title: Fractions
language: en

chapters:
  - title: Basics
    content:
      - type: text
        text: "<p>A fraction has a numerator and a denominator.</p>"
      - type: image
        src: img/pizza.png
        alt: A pizza cut in eight

  - title: Check
    content:
      - type: quiz
        question: Which is larger?
        answers:
          - text: 1/2
            correct: true
          - text: 1/3
"#;

    #[test]
    fn test_book_parsing() {
        let book = BookDefinition::from_yaml(TEST_BOOK_YAML).unwrap();

        assert_eq!(book.title, "Fractions");
        assert_eq!(book.chapters.len(), 2);
        assert_eq!(book.item_count(), 3);

        let image = &book.chapters[0].content[1];
        assert_eq!(image.type_tag, "image");
        assert_eq!(image.str_field("src"), Some("img/pizza.png"));

        let quiz = &book.chapters[1].content[0];
        assert_eq!(quiz.field("answers").and_then(Value::as_array).map(Vec::len), Some(2));
    }

    #[test]
    fn test_book_validation() {
        let book = BookDefinition::from_yaml(TEST_BOOK_YAML).unwrap();
        assert!(book.validate().is_ok());
    }

    #[test]
    fn test_missing_language_is_configuration_error() {
        let yaml = r#"
title: No language
chapters:
  - title: One
    content: []
"#;
        let book = BookDefinition::from_yaml(yaml).unwrap();
        assert!(matches!(book.validate(), Err(CompileError::Configuration(_))));
    }

    #[test]
    fn test_untyped_item_is_configuration_error() {
        let yaml = r#"
title: Untyped
language: en
chapters:
  - title: One
    content:
      - text: hello
"#;
        let book = BookDefinition::from_yaml(yaml).unwrap();
        let err = book.validate().unwrap_err();
        assert!(err.to_string().contains("has no type"));
    }

    #[test]
    fn test_empty_book_rejected() {
        let book = BookDefinition::from_yaml("title: Empty\nlanguage: en\n").unwrap();
        assert!(book.validate().is_err());
    }
}
