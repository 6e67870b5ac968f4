//! Schema validation tests
//!
//! Semantics are parsed from JSON the way libraries ship them; content is
//! checked both directly and through a built content tree.

mod common;

use h5pbook::tree::{validate_nodes, MediaResolver, QuizAnswer};
use h5pbook::{ContentTreeBuilder, LibraryId, LibrarySet, Schema};
use serde_json::json;

use common::{book_semantics, quiz_semantics, text_semantics};

fn parse(raw: serde_json::Value) -> Schema {
    Schema::parse(&raw).unwrap()
}

#[test]
fn test_conforming_content_has_no_errors() {
    let schema = parse(quiz_semantics());
    let report = schema.validate(&json!({
        "question": "<p>2 + 2?</p>",
        "answers": [
            { "text": "4", "correct": true },
            { "text": "5" }
        ],
        "behaviour": { "type": "single" }
    }));

    assert!(report.is_valid(), "{:?}", report.errors);
    assert!(report.first().is_none());
}

#[test]
fn test_missing_required_field_reports_exactly_once() {
    let schema = parse(quiz_semantics());
    let report = schema.validate(&json!({
        "answers": [{ "text": "4", "correct": true }]
    }));

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].path, "question");
    assert_eq!(report.errors[0].message, "required field is missing");
}

#[test]
fn test_null_counts_as_missing() {
    let schema = parse(text_semantics());
    let report = schema.validate(&json!({ "text": null }));
    assert_eq!(report.first().map(|e| e.path.as_str()), Some("text"));
}

#[test]
fn test_list_elements_validated_independently() {
    let schema = parse(quiz_semantics());
    let report = schema.validate(&json!({
        "question": "Pick",
        "answers": [
            { "text": "ok", "correct": true },
            { "correct": false },
            { "text": "fine", "correct": "yes" }
        ]
    }));

    let paths: Vec<&str> = report.errors.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["answers[1].text", "answers[2].correct"]);
}

#[test]
fn test_wrong_primitive_type() {
    let schema = parse(json!([
        { "name": "score", "type": "number" },
        { "name": "enabled", "type": "boolean", "optional": true }
    ]));
    let report = schema.validate(&json!({ "score": "ten", "enabled": 1 }));

    assert_eq!(report.errors.len(), 2);
    assert_eq!(report.errors[0].path, "score");
    assert_eq!(report.errors[1].path, "enabled");
    assert!(report.errors[1].message.contains("expected boolean"));
}

#[test]
fn test_select_options_enforced() {
    let schema = parse(json!([{
        "name": "mode",
        "type": "select",
        "options": [{ "value": "single", "label": "Single" }, { "value": "multi", "label": "Multi" }]
    }]));

    assert!(schema.validate(&json!({ "mode": "multi" })).is_valid());
    let report = schema.validate(&json!({ "mode": "many" }));
    assert!(report.errors[0].message.contains("not one of the allowed options"));
}

#[test]
fn test_library_field_membership_and_envelope() {
    let schema = parse(book_semantics());

    let allowed = json!({
        "chapters": [{
            "library": "H5P.Column 1.16",
            "params": { "content": [] },
            "metadata": { "title": "One" }
        }]
    });
    assert!(schema.validate(&allowed).is_valid());

    let report = schema.validate(&json!({
        "chapters": [
            { "library": "H5P.Accordion 1.0", "params": {}, "metadata": {} },
            { "library": "H5P.Column 1.16", "params": [] }
        ]
    }));
    let paths: Vec<&str> = report.errors.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "chapters[0].library",
            "chapters[1].metadata",
            "chapters[1].params"
        ]
    );
    assert!(report.errors[0].message.contains("not an allowed library"));
}

#[test]
fn test_built_tree_validates_against_book_and_node_schemas() {
    let set = LibrarySet::default();
    let mut builder = ContentTreeBuilder::create_book(
        "Arithmetic",
        "en",
        set.clone(),
        MediaResolver::new("."),
    );

    {
        let mut chapter = builder.add_chapter("Sums");
        chapter.add_text_node("<p>Adding numbers</p>", "Intro");
        chapter.add_quiz_node(
            "2 + 2?",
            &[
                QuizAnswer {
                    text: "4".into(),
                    correct: true,
                    feedback: None,
                },
                QuizAnswer {
                    text: "22".into(),
                    correct: false,
                    feedback: Some("Not a concatenation".into()),
                },
            ],
            "Check",
        );
    }

    let tree = builder.build(&parse(book_semantics()));
    assert!(builder.validate().is_valid(), "{:?}", builder.validate().errors);

    let text = parse(text_semantics());
    let quiz = parse(quiz_semantics());
    let report = validate_nodes(&tree, |id: &LibraryId| {
        if id.matches(&set.text) {
            Some(&text)
        } else if id.matches(&set.quiz) {
            Some(&quiz)
        } else {
            None
        }
    });
    assert!(report.is_valid(), "{:?}", report.errors);
}

#[test]
fn test_node_errors_are_rooted_at_the_document() {
    let set = LibrarySet::default();
    let mut builder = ContentTreeBuilder::create_book("Paths", "en", set.clone(), MediaResolver::new("."));
    builder.add_chapter("First");
    {
        let mut chapter = builder.add_chapter("Second");
        chapter.add_custom_node(set.text.clone(), json!({ "body": "wrong key" }), "Text", "Broken");
    }

    let tree = builder.build(&Schema::default());
    let text = parse(text_semantics());
    let report = validate_nodes(&tree, |_: &LibraryId| Some(&text));

    assert_eq!(report.errors.len(), 1);
    assert_eq!(
        report.errors[0].path,
        "chapters[1].params.content[0].content.params.text"
    );
}

#[test]
fn test_defaulted_required_field_is_not_missing() {
    let schema = parse(json!([
        { "name": "chapters", "type": "list", "field": {
            "name": "chapter", "type": "library", "options": ["H5P.Column 1.16"]
        }},
        { "name": "read", "type": "text", "default": "Read", "common": true }
    ]));

    assert!(schema.validate(&json!({ "chapters": [] })).is_valid());
}

#[test]
fn test_build_fills_root_defaults_into_document() {
    let mut semantics = book_semantics();
    semantics
        .as_array_mut()
        .unwrap()
        .push(json!({ "name": "read", "type": "text", "default": "Read" }));

    let mut builder = ContentTreeBuilder::create_book(
        "Defaults",
        "en",
        LibrarySet::default(),
        MediaResolver::new("."),
    );
    builder.add_chapter("Only").add_text_node("<p>x</p>", "Text");

    let tree = builder.build(&parse(semantics));
    assert!(builder.validate().is_valid(), "{:?}", builder.validate().errors);
    assert_eq!(tree.settings["read"], "Read");

    let document = tree.to_document();
    assert_eq!(document["read"], "Read");
    assert_eq!(document["chapters"].as_array().unwrap().len(), 1);
}
