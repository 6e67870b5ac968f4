//! Content tree construction.
//!
//! [`ContentTreeBuilder`] owns the book-level state for one compile: the
//! chapter sequence, the media registry and the sub-content id sequence.
//! Chapters are filled through a scoped [`ChapterAccumulator`] that wraps
//! payloads in node envelopes in call order.

pub mod media;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Chapter, ContentNode, ContentTree, LibraryId, MediaAsset, MediaKind, NodeMetadata};
use crate::schema::{Schema, ValidationReport};

pub use media::{MediaResolver, MediaSource};

/// Library versions used for the book, its chapters and built-in nodes
#[derive(Debug, Clone, PartialEq)]
pub struct LibrarySet {
    pub book: LibraryId,
    pub chapter: LibraryId,
    pub text: LibraryId,
    pub image: LibraryId,
    pub audio: LibraryId,
    pub quiz: LibraryId,
}

impl Default for LibrarySet {
    fn default() -> Self {
        Self {
            book: LibraryId::new("H5P.InteractiveBook", 1, 11),
            chapter: LibraryId::new("H5P.Column", 1, 16),
            text: LibraryId::new("H5P.AdvancedText", 1, 1),
            image: LibraryId::new("H5P.Image", 1, 1),
            audio: LibraryId::new("H5P.Audio", 1, 5),
            quiz: LibraryId::new("H5P.MultiChoice", 1, 16),
        }
    }
}

/// One answer of a multiple-choice quiz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub text: String,
    #[serde(default, deserialize_with = "null_as_false")]
    pub correct: bool,
    #[serde(default)]
    pub feedback: Option<String>,
}

fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

pub struct ContentTreeBuilder {
    title: String,
    language: String,
    libraries: LibrarySet,
    chapters: Vec<Chapter>,
    media: Vec<MediaAsset>,
    resolver: MediaResolver,
    sequence: u64,
    report: ValidationReport,
}

impl ContentTreeBuilder {
    /// Start a book: empty chapter sequence, empty media registry
    pub fn create_book(
        title: impl Into<String>,
        language: impl Into<String>,
        libraries: LibrarySet,
        resolver: MediaResolver,
    ) -> Self {
        Self {
            title: title.into(),
            language: language.into(),
            libraries,
            chapters: Vec::new(),
            media: Vec::new(),
            resolver,
            sequence: 0,
            report: ValidationReport::default(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn libraries(&self) -> &LibrarySet {
        &self.libraries
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    /// Append a chapter and return an accumulator scoped to it
    pub fn add_chapter(&mut self, title: impl Into<String>) -> ChapterAccumulator<'_> {
        let sub_content_id = self.next_sub_content_id();
        self.chapters.push(Chapter {
            title: title.into(),
            library: self.libraries.chapter.clone(),
            sub_content_id,
            nodes: Vec::new(),
        });
        let index = self.chapters.len() - 1;
        ChapterAccumulator {
            builder: self,
            index,
        }
    }

    /// Re-open an existing chapter
    pub fn chapter(&mut self, index: usize) -> Option<ChapterAccumulator<'_>> {
        if index >= self.chapters.len() {
            return None;
        }
        Some(ChapterAccumulator {
            builder: self,
            index,
        })
    }

    /// Media registered so far, in first-added order
    pub fn media_assets(&self) -> &[MediaAsset] {
        &self.media
    }

    /// Finish the tree and validate the book document against the root schema.
    ///
    /// Defaults declared by the root schema are filled into the book-level
    /// params first. Validation errors do not fail the build; read them
    /// via [`validate`].
    ///
    /// [`validate`]: ContentTreeBuilder::validate
    pub fn build(&mut self, root_schema: &Schema) -> ContentTree {
        let mut tree = ContentTree {
            root: self.libraries.book.clone(),
            title: self.title.clone(),
            language: self.language.clone(),
            chapters: self.chapters.clone(),
            behaviour: default_behaviour(),
            settings: Map::new(),
        };

        let mut document = tree.to_document();
        root_schema.apply_defaults(&mut document);
        self.report = root_schema.validate(&document);

        if let Value::Object(mut params) = document {
            params.remove("chapters");
            if let Some(Value::Object(behaviour)) = params.remove("behaviour") {
                tree.behaviour = behaviour;
            }
            tree.settings = params;
        }
        debug!(
            chapters = tree.chapters.len(),
            nodes = tree.node_count(),
            errors = self.report.errors.len(),
            "Built content tree"
        );
        tree
    }

    /// Errors found by the last [`build`](ContentTreeBuilder::build)
    pub fn validate(&self) -> &ValidationReport {
        &self.report
    }

    /// Deterministic UUIDv5 from the book title and a running sequence
    fn next_sub_content_id(&mut self) -> String {
        self.sequence += 1;
        let seed = format!("{}#{}", self.title, self.sequence);
        Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes()).to_string()
    }

    fn register_media(&mut self, asset: MediaAsset) -> &MediaAsset {
        let position = match self.media.iter().position(|m| m.filename == asset.filename) {
            Some(existing) => existing,
            None => {
                self.media.push(asset);
                self.media.len() - 1
            }
        };
        &self.media[position]
    }
}

/// Appends nodes to one chapter, preserving call order
pub struct ChapterAccumulator<'a> {
    builder: &'a mut ContentTreeBuilder,
    index: usize,
}

impl<'a> ChapterAccumulator<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn title(&self) -> &str {
        &self.builder.chapters[self.index].title
    }

    pub fn nodes(&self) -> &[ContentNode] {
        &self.builder.chapters[self.index].nodes
    }

    pub fn libraries(&self) -> &LibrarySet {
        &self.builder.libraries
    }

    pub fn media_assets(&self) -> &[MediaAsset] {
        &self.builder.media
    }

    pub fn base_path(&self) -> &std::path::Path {
        self.builder.resolver.base_path()
    }

    /// Rich-text node. Returns the new node's sub-content id.
    pub fn add_text_node(&mut self, html: impl Into<String>, title: &str) -> String {
        let library = self.builder.libraries.text.clone();
        self.push(library, json!({ "text": html.into() }), "Text", title)
    }

    /// Image node; the source is read and registered as media
    pub async fn add_image_node(&mut self, source: &str, alt: &str, title: &str) -> anyhow::Result<String> {
        let file = self.add_media(source, MediaKind::Image).await?;
        let params = json!({
            "file": file,
            "alt": alt,
            "contentName": "Image",
        });
        let library = self.builder.libraries.image.clone();
        Ok(self.push(library, params, "Image", title))
    }

    /// Audio node; the source is read and registered as media
    pub async fn add_audio_node(&mut self, source: &str, title: &str) -> anyhow::Result<String> {
        let file = self.add_media(source, MediaKind::Audio).await?;
        let params = json!({
            "files": [file],
            "playerMode": "full",
            "fitToWrapper": false,
            "controls": true,
            "autoplay": false,
            "contentName": "Audio",
        });
        let library = self.builder.libraries.audio.clone();
        Ok(self.push(library, params, "Audio", title))
    }

    /// Multiple-choice quiz node
    pub fn add_quiz_node(&mut self, question: &str, answers: &[QuizAnswer], title: &str) -> String {
        let answers: Vec<Value> = answers
            .iter()
            .map(|answer| {
                json!({
                    "text": as_html(&answer.text, "div"),
                    "correct": answer.correct,
                    "tipsAndFeedback": {
                        "chosenFeedback": answer.feedback.clone().unwrap_or_default(),
                    },
                })
            })
            .collect();
        let correct = answers.iter().filter(|a| a["correct"] == Value::Bool(true)).count();
        let quiz_type = if correct == 1 { "single" } else { "multi" };

        let params = json!({
            "question": as_html(question, "p"),
            "answers": answers,
            "behaviour": {
                "enableRetry": true,
                "enableSolutionsButton": true,
                "singlePoint": false,
                "randomAnswers": true,
                "type": quiz_type,
            },
        });
        let library = self.builder.libraries.quiz.clone();
        self.push(library, params, "Multiple Choice", title)
    }

    /// Node for any library with a caller-built payload
    pub fn add_custom_node(
        &mut self,
        library: LibraryId,
        params: Value,
        content_type: &str,
        title: &str,
    ) -> String {
        self.push(library, params, content_type, title)
    }

    /// Register a media file and return its H5P file object (`{path, mime}`)
    pub async fn add_media(&mut self, source: &str, kind: MediaKind) -> anyhow::Result<Value> {
        let asset = self.builder.resolver.load(source, kind).await?;
        let asset = self.builder.register_media(asset);
        Ok(json!({
            "path": asset.content_path(),
            "mime": asset.mime,
            "copyright": { "license": crate::domain::node::DEFAULT_LICENSE },
        }))
    }

    fn push(&mut self, library: LibraryId, params: Value, content_type: &str, title: &str) -> String {
        let sub_content_id = self.builder.next_sub_content_id();
        let node = ContentNode {
            library,
            params,
            metadata: NodeMetadata::new(content_type, title),
            sub_content_id: sub_content_id.clone(),
        };
        self.builder.chapters[self.index].nodes.push(node);
        sub_content_id
    }
}

/// Markup for a text field: input that starts with a tag is kept as
/// HTML, anything else is escaped and wrapped in `tag`
pub fn as_html(text: &str, tag: &str) -> String {
    let trimmed = text.trim();
    let is_markup = trimmed
        .strip_prefix('<')
        .and_then(|rest| rest.chars().next())
        .map_or(false, |c| c.is_ascii_alphabetic());

    if is_markup {
        trimmed.to_string()
    } else {
        format!("<{tag}>{}</{tag}>", escape_html(trimmed))
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Fill each top-level node's params with its library's schema defaults
pub fn apply_node_defaults<'s>(
    tree: &mut ContentTree,
    mut schema_for: impl FnMut(&LibraryId) -> Option<&'s Schema>,
) {
    for chapter in &mut tree.chapters {
        for node in &mut chapter.nodes {
            if let Some(schema) = schema_for(&node.library) {
                schema.apply_defaults(&mut node.params);
            }
        }
    }
}

/// Validate every top-level node's params against its own library schema.
///
/// `schema_for` returns `None` for libraries whose schema is unknown;
/// those nodes are skipped. Error paths are rooted at the content document.
pub fn validate_nodes<'s>(
    tree: &ContentTree,
    mut schema_for: impl FnMut(&LibraryId) -> Option<&'s Schema>,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    for (c, chapter) in tree.chapters.iter().enumerate() {
        for (n, node) in chapter.nodes.iter().enumerate() {
            let Some(schema) = schema_for(&node.library) else {
                continue;
            };
            let prefix = format!("chapters[{}].params.content[{}].content.params", c, n);
            report.merge_prefixed(&prefix, schema.validate(&node.params));
        }
    }
    report
}

fn default_behaviour() -> Map<String, Value> {
    let mut behaviour = Map::new();
    behaviour.insert("defaultTableOfContents".to_string(), Value::Bool(true));
    behaviour.insert("progressIndicators".to_string(), Value::Bool(true));
    behaviour.insert("progressAuto".to_string(), Value::Bool(true));
    behaviour.insert("displaySummary".to_string(), Value::Bool(true));
    behaviour
}
