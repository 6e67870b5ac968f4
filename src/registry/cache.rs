//! On-disk library cache.
//!
//! # Layout
//!
//! ```text
//! <cache>/
//! ├── H5P.InteractiveBook-1.11/   # versioned entry
//! │   ├── library.json
//! │   ├── semantics.json
//! │   └── dist/...
//! ├── H5P.Column-1.16/
//! └── H5P.JoubelUI/               # legacy unversioned entry
//! ```
//!
//! One entry per (name, major.minor). Writes are staged in a hidden
//! temp directory and renamed into place.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::debug;

use crate::domain::{LibraryId, LibraryRequest};

use super::descriptor::LibraryDescriptor;

/// How a cache lookup matched the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMatch {
    /// `Name-Major.Minor` with identical name spelling
    Exact,
    /// Versioned entry whose name differs only in letter case
    CaseMismatch,
    /// Unversioned directory named after the library
    Legacy,
}

/// One directory in the cache
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub dir_name: String,
    pub path: PathBuf,
    /// Parsed from the directory name; `None` for legacy entries
    pub id: Option<LibraryId>,
}

#[derive(Debug, Clone)]
pub struct LibraryCache {
    root: PathBuf,
}

impl LibraryCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List cache entries sorted by directory name
    pub async fn entries(&self) -> Result<Vec<CacheEntry>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.root)
            .await
            .with_context(|| format!("Failed to read cache directory: {}", self.root.display()))?;

        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(dir_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if dir_name.starts_with('.') {
                continue;
            }
            entries.push(CacheEntry {
                id: LibraryId::from_dir_name(&dir_name),
                path: entry.path(),
                dir_name,
            });
        }

        entries.sort_by(|a, b| a.dir_name.cmp(&b.dir_name));
        Ok(entries)
    }

    /// Find the best cache entry for a request.
    ///
    /// Order: exact versioned → case-insensitive versioned → legacy
    /// unversioned. Among several versions of an unpinned request the
    /// highest (major, minor) wins.
    pub async fn lookup(&self, request: &LibraryRequest) -> Result<Option<(LibraryDescriptor, CacheMatch)>> {
        let entries = self.entries().await?;

        let exact = best_versioned(&entries, request, |id| id.name == request.name);
        if let Some(entry) = exact {
            return Ok(Some((LibraryDescriptor::load(&entry.path).await?, CacheMatch::Exact)));
        }

        let folded = best_versioned(&entries, request, |id| {
            id.name.eq_ignore_ascii_case(&request.name)
        });
        if let Some(entry) = folded {
            return Ok(Some((
                LibraryDescriptor::load(&entry.path).await?,
                CacheMatch::CaseMismatch,
            )));
        }

        for entry in entries.iter().filter(|e| e.id.is_none()) {
            if !entry.dir_name.eq_ignore_ascii_case(&request.name) {
                continue;
            }
            let descriptor = LibraryDescriptor::load(&entry.path).await?;
            if request.accepts(&descriptor.id) {
                return Ok(Some((descriptor, CacheMatch::Legacy)));
            }
            debug!(
                entry = %entry.dir_name,
                found = %descriptor.id,
                "Legacy cache entry has a different version"
            );
        }

        Ok(None)
    }

    /// Write a library's files into `<cache>/<Name-Major.Minor>/`.
    ///
    /// Files are `(relative path, bytes)` pairs with `/` separators.
    pub async fn persist(&self, id: &LibraryId, files: &[(String, Vec<u8>)]) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create cache directory: {}", self.root.display()))?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)
            .context("Failed to create cache staging directory")?;

        for (relative, bytes) in files {
            let path = staging.path().join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&path, bytes)
                .await
                .with_context(|| format!("Failed to write cache file: {}", path.display()))?;
        }

        let target = self.root.join(id.dir_name());
        if target.exists() {
            // Entries are content-stable per identity; the newest write wins
            if let Err(e) = fs::remove_dir_all(&target).await {
                debug!(library = %id, error = %e, "Could not remove existing cache entry");
            }
        }
        if let Err(e) = fs::rename(staging.path(), &target).await {
            if !target.join("library.json").exists() {
                return Err(e).with_context(|| format!("Failed to move {} into cache", id.dir_name()));
            }
            debug!(library = %id, "Concurrent cache write won the rename");
        }

        Ok(target)
    }
}

fn best_versioned<'a>(
    entries: &'a [CacheEntry],
    request: &LibraryRequest,
    name_matches: impl Fn(&LibraryId) -> bool,
) -> Option<&'a CacheEntry> {
    entries
        .iter()
        .filter(|e| match &e.id {
            Some(id) => name_matches(id) && request.accepts(id),
            None => false,
        })
        .max_by_key(|e| e.id.as_ref().map(|id| (id.major, id.minor)))
}
