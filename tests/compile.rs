//! End-to-end compile tests
//!
//! Books are compiled against a seeded temp cache; the resulting package
//! is read back and inspected.

mod common;

use h5pbook::{
    BookDefinition, CompileError, CompileOptions, ContentTree, LibraryId, LibrarySet, Orchestrator,
    PackageContents,
};
use tempfile::TempDir;

use common::{library_json, seed_default_stack, seed_library, zip_bundle, CountingSource};

fn book(yaml: &str) -> BookDefinition {
    BookDefinition::from_yaml(yaml).unwrap()
}

const ONE_TEXT: &str = r#"
title: Hello
language: en
chapters:
  - title: Welcome
    content:
      - type: text
        text: Hello, world
"#;

#[tokio::test]
async fn test_single_text_item_package() {
    let temp = TempDir::new().unwrap();
    seed_default_stack(temp.path());

    let options = CompileOptions::new(temp.path(), temp.path());
    let bytes = Orchestrator::default()
        .compile(&book(ONE_TEXT), &options)
        .await
        .unwrap();

    let package = PackageContents::read(&bytes).unwrap();
    assert!(package.files.contains(&"h5p.json".to_string()));
    assert!(package.files.contains(&"content/content.json".to_string()));
    assert!(package
        .files
        .contains(&"H5P.InteractiveBook-1.11/library.json".to_string()));
    assert!(package
        .files
        .contains(&"H5P.InteractiveBook-1.11/semantics.json".to_string()));

    assert_eq!(package.manifest.title, "Hello");
    assert_eq!(package.manifest.language, "en");
    assert_eq!(package.manifest.main_library, "H5P.InteractiveBook");
    assert_eq!(package.manifest.license, "U");

    let chapters = ContentTree::chapters_from_document(&package.document).unwrap();
    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0].title, "Welcome");
    assert_eq!(chapters[0].nodes[0].params["text"], "<p>Hello, world</p>");
    assert_eq!(chapters[0].nodes[0].library, LibraryId::new("H5P.AdvancedText", 1, 1));
}

#[tokio::test]
async fn test_shared_component_bundled_once() {
    let temp = TempDir::new().unwrap();
    seed_default_stack(temp.path());

    let yaml = r#"
title: Shared
language: en
chapters:
  - title: Listen
    content:
      - type: audio
        src: clip.mp3
  - title: Check
    content:
      - type: quiz
        question: What did you hear?
        answers:
          - { text: "A bell", correct: true }
          - { text: "A dog" }
"#;
    std::fs::write(temp.path().join("clip.mp3"), b"ID3-bell").unwrap();

    let options = CompileOptions::new(temp.path(), temp.path());
    let package = Orchestrator::default()
        .compile_package(&book(yaml), &options)
        .await
        .unwrap();

    let joubel: Vec<&LibraryId> = package
        .manifest
        .preloaded_dependencies
        .iter()
        .filter(|id| id.name == "H5P.JoubelUI")
        .collect();
    assert_eq!(joubel.len(), 1);

    let contents = PackageContents::read(&package.bytes).unwrap();
    let dirs = contents.library_dirs();
    assert_eq!(dirs.iter().filter(|d| d.starts_with("H5P.JoubelUI")).count(), 1);
    assert!(dirs.contains(&"H5P.Audio-1.5".to_string()));
    assert!(dirs.contains(&"H5P.MultiChoice-1.16".to_string()));
    // Image handler was never used
    assert!(!dirs.contains(&"H5P.Image-1.1".to_string()));

    assert_eq!(package.media_count, 1);
    assert_eq!(
        contents
            .files
            .iter()
            .filter(|f| f.starts_with("content/audios/audio-"))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_missing_field_rejected_before_any_fetch() {
    let temp = TempDir::new().unwrap();
    // Empty cache: any resolution would have to go to the source
    let source = CountingSource::new(Vec::new());

    let yaml = r#"
title: Broken
language: en
chapters:
  - title: Quiz
    content:
      - type: quiz
        answers:
          - { text: "yes", correct: true }
"#;
    let options = CompileOptions::new(temp.path().join("cache"), temp.path());
    let err = Orchestrator::default()
        .with_source(source.clone())
        .compile(&book(yaml), &options)
        .await
        .unwrap_err();

    match err {
        CompileError::Validation { item, path, .. } => {
            assert_eq!(path, "question");
            assert!(item.contains("chapters[0].content[0]"));
        }
        other => panic!("expected Validation, got {:?}", other),
    }
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_unknown_type_rejected() {
    let temp = TempDir::new().unwrap();
    seed_default_stack(temp.path());

    let yaml = r#"
title: Unknown
language: en
chapters:
  - title: One
    content:
      - type: text
        text: fine
      - type: flashcards
        cards: []
"#;
    let options = CompileOptions::new(temp.path(), temp.path());
    let err = Orchestrator::default()
        .compile(&book(yaml), &options)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CompileError::UnknownType { chapter: 0, index: 1, ref type_tag } if type_tag == "flashcards"
    ));
}

#[tokio::test]
async fn test_compile_is_idempotent() {
    let temp = TempDir::new().unwrap();
    seed_default_stack(temp.path());
    std::fs::write(temp.path().join("diagram.png"), b"\x89PNG-diagram").unwrap();

    let yaml = r#"
title: Twice
language: de
chapters:
  - title: Bild
    content:
      - type: image
        src: diagram.png
        alt: Ein Diagramm
      - type: text
        text: "<h2>Erklärung</h2>"
"#;
    let options = CompileOptions::new(temp.path(), temp.path());
    let orchestrator = Orchestrator::default();

    let first = orchestrator.compile(&book(yaml), &options).await.unwrap();
    let second = orchestrator.compile(&book(yaml), &options).await.unwrap();

    let first = PackageContents::read(&first).unwrap();
    let second = PackageContents::read(&second).unwrap();
    assert_eq!(first.files, second.files);
    assert_eq!(first.manifest, second.manifest);
    assert_eq!(first.document, second.document);

    let image = &ContentTree::chapters_from_document(&first.document).unwrap()[0].nodes[0];
    let path = image.params["file"]["path"].as_str().unwrap();
    assert!(path.starts_with("images/image-"));
    assert!(first.files.contains(&format!("content/{}", path)));
}

#[tokio::test]
async fn test_remote_fetch_populates_cache() {
    let temp = TempDir::new().unwrap();
    let cache = temp.path().join("cache");
    let set = LibrarySet::default();

    // One bundle carrying the book, its column and the text library
    let bundle = zip_bundle(&[
        (
            format!("{}/library.json", set.book.dir_name()),
            library_json(&set.book, &[&set.chapter]),
        ),
        (
            format!("{}/library.json", set.chapter.dir_name()),
            library_json(&set.chapter, &[]),
        ),
        (
            format!("{}/library.json", set.text.dir_name()),
            library_json(&set.text, &[]),
        ),
    ]);
    let source = CountingSource::new(bundle);
    let orchestrator = Orchestrator::default().with_source(source.clone());
    let options = CompileOptions::new(&cache, temp.path());

    let package = orchestrator
        .compile_package(&book(ONE_TEXT), &options)
        .await
        .unwrap();
    assert_eq!(package.remote_fetches, 1);
    assert_eq!(source.calls(), 1);
    assert!(cache.join("H5P.Column-1.16/library.json").exists());
    assert!(cache.join("H5P.AdvancedText-1.1/library.json").exists());

    // Second compile is served from the cache
    let again = orchestrator
        .compile_package(&book(ONE_TEXT), &options)
        .await
        .unwrap();
    assert_eq!(again.remote_fetches, 0);
    assert_eq!(source.calls(), 1);
    assert_eq!(again.manifest, package.manifest);
}

#[tokio::test]
async fn test_custom_library_item() {
    let temp = TempDir::new().unwrap();
    seed_default_stack(temp.path());
    let summary = LibraryId::new("H5P.Summary", 1, 10);
    seed_library(
        temp.path(),
        &summary,
        &[&LibraryId::new("H5P.JoubelUI", 1, 3)],
        Some(serde_json::json!([{ "name": "intro", "type": "text" }])),
    );

    let yaml = r#"
title: Custom
language: en
chapters:
  - title: Summary
    content:
      - type: library
        library: H5P.Summary 1.10
        params:
          intro: Choose the correct statement.
"#;
    let options = CompileOptions::new(temp.path(), temp.path());
    let package = Orchestrator::default()
        .compile_package(&book(yaml), &options)
        .await
        .unwrap();

    assert!(package.manifest.preloaded_dependencies.contains(&summary));
    let contents = PackageContents::read(&package.bytes).unwrap();
    assert!(contents.files.contains(&"H5P.Summary-1.10/dist/main.js".to_string()));
}

#[tokio::test]
async fn test_configuration_error_for_missing_title() {
    let temp = TempDir::new().unwrap();
    let options = CompileOptions::new(temp.path(), temp.path());

    let err = Orchestrator::default()
        .compile(&book("language: en\nchapters:\n  - title: One\n"), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, CompileError::Configuration(_)));
}

#[tokio::test]
async fn test_schema_defaults_fill_required_fields() {
    let temp = TempDir::new().unwrap();
    seed_default_stack(temp.path());
    let set = LibrarySet::default();

    // Required fields that only carry a default, as shipped libraries declare them
    let mut book_semantics = common::book_semantics();
    book_semantics
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!({ "name": "read", "type": "text", "default": "Read", "common": true }));
    book_semantics[1]["fields"]
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!({ "name": "baseColor", "type": "text", "default": "#1768c4" }));
    std::fs::write(
        temp.path().join(set.book.dir_name()).join("semantics.json"),
        book_semantics.to_string(),
    )
    .unwrap();
    std::fs::write(
        temp.path().join(set.text.dir_name()).join("semantics.json"),
        serde_json::json!([
            { "name": "text", "type": "text", "widget": "html" },
            { "name": "a11y", "type": "group", "fields": [
                { "name": "label", "type": "text", "default": "Text block" }
            ]}
        ])
        .to_string(),
    )
    .unwrap();

    let options = CompileOptions::new(temp.path(), temp.path());
    let bytes = Orchestrator::default()
        .compile(&book(ONE_TEXT), &options)
        .await
        .unwrap();

    let package = PackageContents::read(&bytes).unwrap();
    assert_eq!(package.document["read"], "Read");
    assert_eq!(package.document["behaviour"]["baseColor"], "#1768c4");
    assert_eq!(package.document["behaviour"]["progressIndicators"], true);

    let chapters = ContentTree::chapters_from_document(&package.document).unwrap();
    assert_eq!(chapters[0].nodes[0].params["a11y"]["label"], "Text block");
}

#[tokio::test]
async fn test_quiz_answer_with_empty_flag_compiles() {
    let temp = TempDir::new().unwrap();
    seed_default_stack(temp.path());

    let yaml = r#"
title: Flags
language: en
chapters:
  - title: Quiz
    content:
      - type: quiz
        question: "Is 7 prime?"
        answers:
          - { text: "yes", correct: true }
          - { text: "no", correct: }
"#;
    let definition = book(yaml);
    assert_eq!(Orchestrator::default().check(&definition).unwrap(), 1);

    let options = CompileOptions::new(temp.path(), temp.path());
    let bytes = Orchestrator::default()
        .compile(&definition, &options)
        .await
        .unwrap();

    let package = PackageContents::read(&bytes).unwrap();
    let chapters = ContentTree::chapters_from_document(&package.document).unwrap();
    assert_eq!(chapters[0].nodes[0].params["answers"][1]["correct"], false);
}
