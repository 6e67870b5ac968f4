//! Shared fixtures: seeded library caches and an in-memory component source.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing_subscriber::fmt::MakeWriter;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use h5pbook::{ComponentSource, LibraryId, LibraryRequest, LibrarySet};

pub fn library_json(id: &LibraryId, deps: &[&LibraryId]) -> Vec<u8> {
    json!({
        "title": id.name,
        "machineName": id.name,
        "majorVersion": id.major,
        "minorVersion": id.minor,
        "patchVersion": 3,
        "runnable": 1,
        "preloadedDependencies": deps,
    })
    .to_string()
    .into_bytes()
}

/// Write `<cache>/<Name-M.m>/` with library.json, optional semantics and a script
pub fn seed_library(cache: &Path, id: &LibraryId, deps: &[&LibraryId], semantics: Option<Value>) {
    let dir = cache.join(id.dir_name());
    std::fs::create_dir_all(dir.join("dist")).unwrap();
    std::fs::write(dir.join("library.json"), library_json(id, deps)).unwrap();
    std::fs::write(dir.join("dist").join("main.js"), format!("/* {} */", id)).unwrap();
    if let Some(semantics) = semantics {
        std::fs::write(dir.join("semantics.json"), semantics.to_string()).unwrap();
    }
}

pub fn book_semantics() -> Value {
    json!([
        {
            "name": "chapters",
            "type": "list",
            "field": { "name": "chapter", "type": "library", "options": ["H5P.Column 1.16"] }
        },
        {
            "name": "behaviour",
            "type": "group",
            "optional": true,
            "fields": [
                { "name": "defaultTableOfContents", "type": "boolean" },
                { "name": "progressIndicators", "type": "boolean" }
            ]
        }
    ])
}

pub fn text_semantics() -> Value {
    json!([{ "name": "text", "type": "text", "widget": "html" }])
}

pub fn image_semantics() -> Value {
    json!([
        { "name": "file", "type": "image" },
        { "name": "alt", "type": "text" }
    ])
}

pub fn audio_semantics() -> Value {
    json!([{ "name": "files", "type": "audio" }])
}

pub fn quiz_semantics() -> Value {
    json!([
        { "name": "question", "type": "text" },
        {
            "name": "answers",
            "type": "list",
            "field": {
                "name": "answer",
                "type": "group",
                "fields": [
                    { "name": "text", "type": "text" },
                    { "name": "correct", "type": "boolean", "optional": true }
                ]
            }
        }
    ])
}

/// The default book, chapter and built-in node libraries plus a shared
/// `H5P.JoubelUI` dependency
pub fn seed_default_stack(cache: &Path) {
    let set = LibrarySet::default();
    let ui = LibraryId::new("H5P.JoubelUI", 1, 3);

    seed_library(cache, &ui, &[], None);
    seed_library(cache, &set.book, &[&set.chapter, &ui], Some(book_semantics()));
    seed_library(cache, &set.chapter, &[], None);
    seed_library(cache, &set.text, &[], Some(text_semantics()));
    seed_library(cache, &set.image, &[], Some(image_semantics()));
    seed_library(cache, &set.audio, &[&ui], Some(audio_semantics()));
    seed_library(cache, &set.quiz, &[&ui], Some(quiz_semantics()));
}

/// ZIP bundle from `(path, contents)` pairs
pub fn zip_bundle(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (path, bytes) in entries {
        zip.start_file(path.as_str(), SimpleFileOptions::default()).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Serves one fixed bundle and counts fetches
pub struct CountingSource {
    bundle: Vec<u8>,
    calls: AtomicUsize,
}

impl CountingSource {
    pub fn new(bundle: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            bundle,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ComponentSource for CountingSource {
    fn name(&self) -> &str {
        "counting"
    }

    async fn fetch(&self, _request: &LibraryRequest) -> anyhow::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.bundle.clone())
    }
}

/// Captures formatted log output for assertions
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
