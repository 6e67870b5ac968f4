//! Library descriptors loaded from `library.json` + `semantics.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tokio::fs;

use crate::domain::LibraryId;
use crate::schema::Schema;

/// A resolved library: identity, schema and dependency manifest.
///
/// Immutable once loaded; shared as `Arc<LibraryDescriptor>` for the life
/// of a compile.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryDescriptor {
    pub id: LibraryId,
    pub patch: u32,
    pub title: String,

    /// Direct dependencies, in declaration order
    pub dependencies: Vec<LibraryId>,

    pub schema: Schema,

    /// Can run standalone as a content type
    pub runnable: bool,

    pub embed_types: Vec<String>,

    /// Cache directory holding this library's files
    pub directory: PathBuf,
}

/// Raw `library.json` (only the fields the compiler needs)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryJson {
    pub machine_name: String,
    pub major_version: u32,
    pub minor_version: u32,
    #[serde(default)]
    pub patch_version: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub runnable: Value,
    #[serde(default)]
    pub embed_types: Vec<String>,
    #[serde(default)]
    pub preloaded_dependencies: Vec<LibraryId>,
}

impl LibraryJson {
    pub fn id(&self) -> LibraryId {
        LibraryId::new(&self.machine_name, self.major_version, self.minor_version)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("Failed to parse library.json")
    }
}

impl LibraryDescriptor {
    /// Load a descriptor from a library directory.
    pub async fn load(directory: &Path) -> Result<Self> {
        let library_path = directory.join("library.json");
        let bytes = fs::read(&library_path)
            .await
            .with_context(|| format!("Failed to read {}", library_path.display()))?;
        let library = LibraryJson::from_slice(&bytes)
            .with_context(|| format!("Invalid library.json in {}", directory.display()))?;

        let semantics_path = directory.join("semantics.json");
        let schema = if semantics_path.exists() {
            let raw = fs::read_to_string(&semantics_path)
                .await
                .with_context(|| format!("Failed to read {}", semantics_path.display()))?;
            Schema::parse_str(&raw)
                .with_context(|| format!("Invalid semantics in {}", semantics_path.display()))?
        } else {
            Schema::default()
        };

        let runnable = match &library.runnable {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_u64() == Some(1),
            _ => false,
        };

        Ok(Self {
            id: library.id(),
            patch: library.patch_version,
            title: library.title,
            dependencies: library.preloaded_dependencies,
            schema,
            runnable,
            embed_types: library.embed_types,
            directory: directory.to_path_buf(),
        })
    }
}
