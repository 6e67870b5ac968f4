//! Content handlers.
//!
//! A handler turns one type-tagged [`ContentItem`] into tree nodes. The
//! orchestrator looks handlers up by type tag, asks them to validate the
//! item before any I/O, then lets them process it against a
//! [`HandlerContext`] scoped to the item's chapter.

pub mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::{CompileOptions, ContentItem};
use crate::domain::MediaAsset;
use crate::registry::SchemaRegistry;
use crate::tree::ChapterAccumulator;

pub use builtin::{AudioHandler, ImageHandler, LibraryHandler, QuizHandler, TextHandler};

/// Why a handler refused an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRejection {
    /// Field path inside the item, e.g. `answers[1].text`
    pub path: String,
    pub message: String,
}

impl ItemRejection {
    pub fn missing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: "required field is missing".to_string(),
        }
    }

    pub fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ItemRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Generative-content provider (AI text and the like).
///
/// Providers live outside this crate; handlers receive one through the
/// context when the caller configured it.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Produce content for a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Everything a handler may touch while processing one item
pub struct HandlerContext<'a> {
    /// The chapter the item belongs to
    pub chapter: ChapterAccumulator<'a>,

    /// Resolver for library descriptors and schemas
    pub registry: &'a mut SchemaRegistry,

    pub generator: Option<&'a dyn ContentGenerator>,

    pub options: &'a CompileOptions,
}

impl<'a> HandlerContext<'a> {
    /// Directory relative media references resolve against
    pub fn base_path(&self) -> &Path {
        self.chapter.base_path()
    }

    /// Media registered so far across the whole book
    pub fn media_assets(&self) -> &[MediaAsset] {
        self.chapter.media_assets()
    }
}

/// Trait for content handlers
#[async_trait]
pub trait ContentHandler: Send + Sync {
    /// The item type tag this handler accepts
    fn declared_type(&self) -> &str;

    /// Check the item's fields without performing I/O
    fn validate(&self, item: &ContentItem) -> std::result::Result<(), ItemRejection>;

    /// Append the item's nodes to the context's chapter
    async fn process(&self, ctx: &mut HandlerContext<'_>, item: &ContentItem) -> Result<()>;

    /// Libraries this handler's nodes need, as `Name` or `Name Major.Minor`
    fn required_components(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Type tag → handler mapping, fixed once the orchestrator owns it
#[derive(Clone, Default)]
pub struct Handlers {
    by_type: HashMap<String, Arc<dyn ContentHandler>>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in `text`, `image`, `audio`, `quiz` and `library` handlers
    pub fn builtin() -> Self {
        Self::new()
            .with(TextHandler)
            .with(ImageHandler)
            .with(AudioHandler)
            .with(QuizHandler)
            .with(LibraryHandler)
    }

    /// Register a handler, replacing any previous one for the same tag
    pub fn with(mut self, handler: impl ContentHandler + 'static) -> Self {
        self.by_type
            .insert(handler.declared_type().to_string(), Arc::new(handler));
        self
    }

    pub fn get(&self, type_tag: &str) -> Option<Arc<dyn ContentHandler>> {
        self.by_type.get(type_tag).cloned()
    }

    /// Registered type tags, sorted
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.by_type.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers").field("types", &self.types()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_types() {
        let handlers = Handlers::builtin();
        assert_eq!(handlers.types(), vec!["audio", "image", "library", "quiz", "text"]);
        assert!(handlers.get("text").is_some());
        assert!(handlers.get("video").is_none());
    }

    #[test]
    fn test_rejection_display() {
        let rejection = ItemRejection::missing("answers[1].text");
        assert_eq!(rejection.to_string(), "answers[1].text: required field is missing");
    }
}
