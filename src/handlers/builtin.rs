//! Built-in handlers for the common item types.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::core::ContentItem;
use crate::domain::LibraryId;
use crate::tree::{as_html, QuizAnswer};

use super::{ContentHandler, HandlerContext, ItemRejection};

/// `text`: rich text, given inline or produced from a `prompt`
///
/// ```yaml
/// - type: text
///   text: "<p>Hello</p>"
/// - type: text
///   prompt: Summarise photosynthesis for ten year olds
/// ```
pub struct TextHandler;

#[async_trait]
impl ContentHandler for TextHandler {
    fn declared_type(&self) -> &str {
        "text"
    }

    fn validate(&self, item: &ContentItem) -> Result<(), ItemRejection> {
        if item.str_field("text").is_none() && item.str_field("prompt").is_none() {
            return Err(ItemRejection::missing("text"));
        }
        Ok(())
    }

    async fn process(&self, ctx: &mut HandlerContext<'_>, item: &ContentItem) -> Result<()> {
        let text = match (item.str_field("text"), item.str_field("prompt")) {
            (Some(text), _) => text.to_string(),
            (None, Some(prompt)) => {
                let generator = ctx
                    .generator
                    .context("Item asks for generated text but no content generator is configured")?;
                debug!(provider = generator.name(), "Generating text");
                generator
                    .generate(prompt)
                    .await
                    .with_context(|| format!("Provider '{}' failed", generator.name()))?
            }
            (None, None) => anyhow::bail!("text item has neither text nor prompt"),
        };

        ctx.chapter.add_text_node(as_html(&text, "p"), item.title_or("Text"));
        Ok(())
    }

    fn required_components(&self) -> Vec<String> {
        vec!["H5P.AdvancedText".to_string()]
    }
}

/// `image`: a local or remote picture with alt text
pub struct ImageHandler;

#[async_trait]
impl ContentHandler for ImageHandler {
    fn declared_type(&self) -> &str {
        "image"
    }

    fn validate(&self, item: &ContentItem) -> Result<(), ItemRejection> {
        item.str_field("src").ok_or_else(|| ItemRejection::missing("src"))?;
        Ok(())
    }

    async fn process(&self, ctx: &mut HandlerContext<'_>, item: &ContentItem) -> Result<()> {
        let src = item.str_field("src").context("image item has no src")?;
        let title = item.title_or("Image");
        let alt = item.str_field("alt").unwrap_or(title);
        ctx.chapter.add_image_node(src, alt, title).await?;
        Ok(())
    }

    fn required_components(&self) -> Vec<String> {
        vec!["H5P.Image".to_string()]
    }
}

/// `audio`: a local or remote audio clip
pub struct AudioHandler;

#[async_trait]
impl ContentHandler for AudioHandler {
    fn declared_type(&self) -> &str {
        "audio"
    }

    fn validate(&self, item: &ContentItem) -> Result<(), ItemRejection> {
        item.str_field("src").ok_or_else(|| ItemRejection::missing("src"))?;
        Ok(())
    }

    async fn process(&self, ctx: &mut HandlerContext<'_>, item: &ContentItem) -> Result<()> {
        let src = item.str_field("src").context("audio item has no src")?;
        ctx.chapter.add_audio_node(src, item.title_or("Audio")).await?;
        Ok(())
    }

    fn required_components(&self) -> Vec<String> {
        vec!["H5P.Audio".to_string()]
    }
}

/// `quiz`: multiple choice with at least one correct answer
pub struct QuizHandler;

#[async_trait]
impl ContentHandler for QuizHandler {
    fn declared_type(&self) -> &str {
        "quiz"
    }

    fn validate(&self, item: &ContentItem) -> Result<(), ItemRejection> {
        item.str_field("question")
            .ok_or_else(|| ItemRejection::missing("question"))?;

        let answers = match item.field("answers") {
            None => return Err(ItemRejection::missing("answers")),
            Some(Value::Array(answers)) if !answers.is_empty() => answers,
            Some(Value::Array(_)) => {
                return Err(ItemRejection::invalid("answers", "at least one answer is required"))
            }
            Some(_) => return Err(ItemRejection::invalid("answers", "expected a list")),
        };

        for (i, answer) in answers.iter().enumerate() {
            let text = answer.get("text").and_then(Value::as_str).filter(|t| !t.trim().is_empty());
            if text.is_none() {
                return Err(ItemRejection::missing(format!("answers[{}].text", i)));
            }
            if let Some(correct) = answer.get("correct") {
                if !correct.is_boolean() && !correct.is_null() {
                    return Err(ItemRejection::invalid(
                        format!("answers[{}].correct", i),
                        "expected a boolean",
                    ));
                }
            }
            if let Some(feedback) = answer.get("feedback") {
                if !feedback.is_string() && !feedback.is_null() {
                    return Err(ItemRejection::invalid(
                        format!("answers[{}].feedback", i),
                        "expected text",
                    ));
                }
            }
        }

        let any_correct = answers
            .iter()
            .any(|a| a.get("correct").and_then(Value::as_bool).unwrap_or(false));
        if !any_correct {
            return Err(ItemRejection::invalid("answers", "no answer is marked correct"));
        }

        Ok(())
    }

    async fn process(&self, ctx: &mut HandlerContext<'_>, item: &ContentItem) -> Result<()> {
        let question = item.str_field("question").context("quiz item has no question")?;
        let answers: Vec<QuizAnswer> = serde_json::from_value(
            item.field("answers").cloned().unwrap_or(Value::Null),
        )
        .context("Invalid quiz answers")?;

        ctx.chapter
            .add_quiz_node(question, &answers, item.title_or("Quiz"));
        Ok(())
    }

    fn required_components(&self) -> Vec<String> {
        vec!["H5P.MultiChoice".to_string()]
    }
}

/// `library`: any H5P library with hand-written params
///
/// ```yaml
/// - type: library
///   library: H5P.Summary 1.10
///   contentType: Summary
///   params: { intro: "Choose the correct statement." }
/// ```
pub struct LibraryHandler;

impl LibraryHandler {
    fn library(item: &ContentItem) -> Result<LibraryId, ItemRejection> {
        let raw = item
            .str_field("library")
            .ok_or_else(|| ItemRejection::missing("library"))?;
        raw.parse()
            .map_err(|e| ItemRejection::invalid("library", format!("{:#}", e)))
    }
}

#[async_trait]
impl ContentHandler for LibraryHandler {
    fn declared_type(&self) -> &str {
        "library"
    }

    fn validate(&self, item: &ContentItem) -> Result<(), ItemRejection> {
        Self::library(item)?;
        match item.field("params") {
            None => Err(ItemRejection::missing("params")),
            Some(Value::Object(_)) => Ok(()),
            Some(_) => Err(ItemRejection::invalid("params", "expected an object")),
        }
    }

    async fn process(&self, ctx: &mut HandlerContext<'_>, item: &ContentItem) -> Result<()> {
        let library = Self::library(item).map_err(|r| anyhow::anyhow!("{}", r))?;
        let params = item.field("params").cloned().unwrap_or_default();

        let short_name = library
            .name
            .strip_prefix("H5P.")
            .unwrap_or(&library.name)
            .to_string();
        let content_type = item.str_field("contentType").unwrap_or(&short_name);
        let title = item.title_or(content_type);

        ctx.chapter.add_custom_node(library, params, content_type, title);
        Ok(())
    }
}
