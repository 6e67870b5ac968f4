//! Dependency closure integration tests
//!
//! Resolution against seeded caches, parent-bundle extraction and
//! case-mismatch handling.

mod common;

use h5pbook::{CompileError, LibraryId, LibraryRequest, SchemaRegistry};
use tempfile::TempDir;

use common::{library_json, seed_library, zip_bundle, CapturedLogs, CountingSource};

fn id(name: &str, major: u32, minor: u32) -> LibraryId {
    LibraryId::new(name, major, minor)
}

#[tokio::test]
async fn test_cyclic_graph_terminates_with_unique_entries() {
    let temp = TempDir::new().unwrap();
    let (a, b, c, d) = (id("A", 1, 0), id("B", 2, 0), id("C", 1, 4), id("D", 1, 0));
    seed_library(temp.path(), &a, &[&b, &c], None);
    seed_library(temp.path(), &b, &[&c, &a], None);
    seed_library(temp.path(), &c, &[&d, &b], None);
    seed_library(temp.path(), &d, &[&a], None);

    let mut registry = SchemaRegistry::new(temp.path(), None);
    let closure = registry.closure_of("A 1.0").await.unwrap();

    let keys: Vec<String> = closure.iter().map(|d| d.id.key()).collect();
    assert_eq!(keys, vec!["a@1.0", "b@2.0", "c@1.4", "d@1.0"]);
}

#[tokio::test]
async fn test_diamond_dependency_listed_once() {
    let temp = TempDir::new().unwrap();
    let shared = id("H5P.Question", 1, 5);
    let quiz = id("H5P.MultiChoice", 1, 16);
    let blanks = id("H5P.Blanks", 1, 14);
    seed_library(temp.path(), &shared, &[], None);
    seed_library(temp.path(), &quiz, &[&shared], None);
    seed_library(temp.path(), &blanks, &[&shared], None);

    let mut registry = SchemaRegistry::new(temp.path(), None);
    let closure = registry
        .closure_of_all(&[quiz.to_request(), blanks.to_request()])
        .await
        .unwrap();

    let names: Vec<&str> = closure.iter().map(|d| d.id.name.as_str()).collect();
    assert_eq!(names, vec!["H5P.MultiChoice", "H5P.Question", "H5P.Blanks"]);
}

#[tokio::test]
async fn test_case_mismatch_resolves_and_logs() {
    let temp = TempDir::new().unwrap();
    seed_library(temp.path(), &id("H5P.AdvancedText", 1, 1), &[], None);

    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut registry = SchemaRegistry::new(temp.path(), None);
    let descriptor = registry
        .resolve(&LibraryRequest::pinned("H5P.ADVANCEDTEXT", 1, 1))
        .await
        .unwrap();

    assert_eq!(descriptor.id, id("H5P.AdvancedText", 1, 1));
    assert!(descriptor.directory.ends_with("H5P.AdvancedText-1.1"));

    let output = logs.contents();
    assert!(output.contains("WARN"), "{}", output);
    assert!(output.contains("does not match the request"), "{}", output);
}

#[tokio::test]
async fn test_legacy_unversioned_entry() {
    let temp = TempDir::new().unwrap();
    let legacy = temp.path().join("H5P.FontIcons");
    std::fs::create_dir_all(&legacy).unwrap();
    std::fs::write(legacy.join("library.json"), library_json(&id("H5P.FontIcons", 1, 0), &[])).unwrap();

    let mut registry = SchemaRegistry::new(temp.path(), None);
    let descriptor = registry.resolve_name("H5P.FontIcons", Some((1, 0))).await.unwrap();
    assert_eq!(descriptor.id, id("H5P.FontIcons", 1, 0));

    // A pinned request for another version does not accept it
    let mut registry = SchemaRegistry::new(temp.path(), None);
    let err = registry.resolve_name("H5P.FontIcons", Some((2, 0))).await.unwrap_err();
    assert!(matches!(err, CompileError::DependencyResolution { .. }));
}

#[tokio::test]
async fn test_embedded_dependencies_extracted_from_parent_bundle() {
    let temp = TempDir::new().unwrap();
    let book = id("H5P.InteractiveBook", 1, 11);
    let column = id("H5P.Column", 1, 16);
    let text = id("H5P.AdvancedText", 1, 1);

    let source = CountingSource::new(zip_bundle(&[
        (format!("{}/library.json", book.dir_name()), library_json(&book, &[&column])),
        (format!("{}/library.json", column.dir_name()), library_json(&column, &[&text])),
        (format!("{}/library.json", text.dir_name()), library_json(&text, &[])),
        (format!("{}/dist/text.js", text.dir_name()), b"text();".to_vec()),
        ("content/content.json".to_string(), b"{}".to_vec()),
    ]));

    let mut registry = SchemaRegistry::new(temp.path(), Some(source.clone()));
    let closure = registry.closure_of("H5P.InteractiveBook 1.11").await.unwrap();

    assert_eq!(closure.len(), 3);
    assert_eq!(source.calls(), 1);
    assert_eq!(
        std::fs::read(temp.path().join("H5P.AdvancedText-1.1/dist/text.js")).unwrap(),
        b"text();"
    );
    // Staging directories never linger
    let leftovers = std::fs::read_dir(temp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
        .count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_unresolvable_without_source() {
    let temp = TempDir::new().unwrap();
    let mut registry = SchemaRegistry::new(temp.path(), None);

    match registry.closure_of("H5P.Nowhere 1.0").await {
        Err(CompileError::DependencyResolution { identity, reason }) => {
            assert_eq!(identity, "H5P.Nowhere 1.0");
            assert!(reason.contains("no remote source"));
        }
        other => panic!("expected DependencyResolution, got {:?}", other.map(|c| c.len())),
    }
}

#[test]
fn test_registry_is_usable_from_sync_code() {
    let temp = TempDir::new().unwrap();
    seed_library(temp.path(), &id("H5P.Column", 1, 16), &[], None);

    let mut registry = SchemaRegistry::new(temp.path(), None);
    let closure = tokio_test::block_on(registry.closure_of("H5P.Column")).unwrap();
    assert_eq!(closure.len(), 1);
    assert_eq!(closure[0].id, id("H5P.Column", 1, 16));
}
