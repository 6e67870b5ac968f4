//! Package assembly.
//!
//! An H5P package is a ZIP container:
//!
//! ```text
//! h5p.json                      manifest
//! content/content.json          book document
//! content/images/image-….png    media, partitioned by kind
//! H5P.InteractiveBook-1.11/     one directory per bundled library,
//! H5P.Column-1.16/              copied from the cache byte for byte
//! ```
//!
//! Entries carry a fixed timestamp and are written in a stable order, so
//! identical inputs produce identical packages.

use std::collections::HashSet;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::domain::{ContentTree, LibraryId, MediaAsset, PackageManifest};
use crate::error::{CompileError, Result};
use crate::registry::LibraryDescriptor;

pub const MANIFEST_PATH: &str = "h5p.json";
pub const CONTENT_PATH: &str = "content/content.json";

#[derive(Debug, Clone)]
pub struct ArchiveAssembler {
    options: SimpleFileOptions,
}

impl Default for ArchiveAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveAssembler {
    pub fn new() -> Self {
        Self {
            options: SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .last_modified_time(DateTime::default()),
        }
    }

    /// Manifest for a tree: the root library is the main library, the
    /// closure (deduplicated, in order) is the dependency list.
    pub fn manifest_of(
        &self,
        tree: &ContentTree,
        closure: &[Arc<LibraryDescriptor>],
        title: &str,
        language: &str,
    ) -> PackageManifest {
        let mut seen = HashSet::new();
        let dependencies: Vec<LibraryId> = closure
            .iter()
            .map(|d| d.id.clone())
            .filter(|id| seen.insert(id.key()))
            .collect();
        PackageManifest::new(title, language, &tree.root, dependencies)
    }

    /// Encode the book document
    pub fn serialize_content(&self, tree: &ContentTree) -> Result<Vec<u8>> {
        serde_json::to_vec(&tree.to_document())
            .map_err(|e| CompileError::assembly(format!("Failed to serialize content: {}", e)))
    }

    /// Copy every library directory of the closure into the archive.
    ///
    /// Returns the number of files written.
    pub fn bundle_components<W: Write + Seek>(
        &self,
        zip: &mut ZipWriter<W>,
        closure: &[Arc<LibraryDescriptor>],
    ) -> Result<usize> {
        let mut written = 0;
        let mut bundled = HashSet::new();

        for descriptor in closure {
            let dir_name = descriptor.id.dir_name();
            if !bundled.insert(dir_name.clone()) {
                continue;
            }
            let count = self.bundle_directory(zip, &descriptor.directory, &dir_name)?;
            debug!(library = %descriptor.id, files = count, "Bundled library");
            written += count;
        }

        Ok(written)
    }

    fn bundle_directory<W: Write + Seek>(
        &self,
        zip: &mut ZipWriter<W>,
        source: &Path,
        dir_name: &str,
    ) -> Result<usize> {
        let mut written = 0;

        for entry in WalkDir::new(source).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                CompileError::assembly(format!("Failed to walk {}: {}", source.display(), e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| CompileError::assembly(e.to_string()))?;
            let relative: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();

            let bytes = std::fs::read(entry.path())?;
            self.write_entry(zip, &format!("{}/{}", dir_name, relative.join("/")), &bytes)?;
            written += 1;
        }

        Ok(written)
    }

    /// Write media under `content/{kind folder}/{filename}`
    pub fn add_media<W: Write + Seek>(
        &self,
        zip: &mut ZipWriter<W>,
        assets: &[MediaAsset],
    ) -> Result<()> {
        let mut written = HashSet::new();
        for asset in assets {
            let path = asset.archive_path();
            if written.insert(path.clone()) {
                self.write_entry(zip, &path, &asset.bytes)?;
            }
        }
        Ok(())
    }

    /// Compose manifest, content document, libraries and media into one package
    pub fn assemble(
        &self,
        tree: &ContentTree,
        closure: &[Arc<LibraryDescriptor>],
        assets: &[MediaAsset],
        title: &str,
        language: &str,
    ) -> Result<Vec<u8>> {
        let manifest = self.manifest_of(tree, closure, title, language);
        let manifest = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| CompileError::assembly(format!("Failed to serialize manifest: {}", e)))?;
        let content = self.serialize_content(tree)?;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        self.write_entry(&mut zip, MANIFEST_PATH, &manifest)?;
        self.write_entry(&mut zip, CONTENT_PATH, &content)?;
        self.add_media(&mut zip, assets)?;
        let files = self.bundle_components(&mut zip, closure)?;

        let bytes = zip.finish()?.into_inner();
        info!(
            libraries = closure.len(),
            library_files = files,
            media = assets.len(),
            size = bytes.len(),
            "Assembled package"
        );
        Ok(bytes)
    }

    fn write_entry<W: Write + Seek>(
        &self,
        zip: &mut ZipWriter<W>,
        path: &str,
        bytes: &[u8],
    ) -> Result<()> {
        zip.start_file(path, self.options)?;
        zip.write_all(bytes)?;
        Ok(())
    }
}

/// A package read back from its bytes
#[derive(Debug, Clone)]
pub struct PackageContents {
    pub manifest: PackageManifest,
    pub document: Value,
    /// Every file entry, in archive order
    pub files: Vec<String>,
}

impl PackageContents {
    pub fn read(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let files: Vec<String> = archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(String::from)
            .collect();

        let manifest = read_json(&mut archive, MANIFEST_PATH)?;
        let manifest: PackageManifest = serde_json::from_value(manifest)
            .map_err(|e| CompileError::assembly(format!("Invalid {}: {}", MANIFEST_PATH, e)))?;
        let document = read_json(&mut archive, CONTENT_PATH)?;

        Ok(Self {
            manifest,
            document,
            files,
        })
    }

    /// Top-level library directories present in the package, sorted
    pub fn library_dirs(&self) -> Vec<String> {
        let mut dirs: Vec<String> = self
            .files
            .iter()
            .filter_map(|f| f.split_once('/').map(|(dir, _)| dir))
            .filter(|dir| *dir != "content")
            .map(String::from)
            .collect();
        dirs.sort();
        dirs.dedup();
        dirs
    }
}

fn read_json<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Value> {
    let mut file = archive
        .by_name(name)
        .map_err(|e| CompileError::assembly(format!("Missing {}: {}", name, e)))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| CompileError::assembly(format!("Invalid {}: {}", name, e)))
}
