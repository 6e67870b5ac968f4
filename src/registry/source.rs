//! Remote component sources and fetched bundles.
//!
//! A source returns a ZIP bundle holding one or more `Name-Major.Minor/`
//! library directories (an `.h5p` package works as a bundle too). The
//! registry keeps every fetched bundle for the rest of the compile so
//! libraries embedded in a parent's bundle can be extracted without
//! another fetch.

use std::io::{Cursor, Read};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;
use zip::ZipArchive;

use crate::domain::{LibraryId, LibraryRequest};

use super::descriptor::LibraryJson;

/// Trait for remote library sources
#[async_trait]
pub trait ComponentSource: Send + Sync {
    /// Human-readable source name
    fn name(&self) -> &str;

    /// Fetch a ZIP bundle containing the requested library
    async fn fetch(&self, request: &LibraryRequest) -> Result<Vec<u8>>;
}

/// Fetches bundles over HTTP.
///
/// Pinned requests: `{base_url}/{Name}-{Major}.{Minor}.zip`.
/// Unpinned requests: `{base_url}/{Name}.zip`.
pub struct HttpComponentSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpComponentSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn bundle_url(&self, request: &LibraryRequest) -> String {
        match request.version {
            Some((major, minor)) => {
                format!("{}/{}-{}.{}.zip", self.base_url, request.name, major, minor)
            }
            None => format!("{}/{}.zip", self.base_url, request.name),
        }
    }
}

#[async_trait]
impl ComponentSource for HttpComponentSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, request: &LibraryRequest) -> Result<Vec<u8>> {
        let url = self.bundle_url(request);
        debug!(%url, "Fetching library bundle");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("GET {} returned {}", url, response.status());
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;
        Ok(bytes.to_vec())
    }
}

/// A fetched ZIP bundle retained for parent extraction
#[derive(Debug, Clone)]
pub struct Bundle {
    /// The request that fetched this bundle
    pub origin: String,
    bytes: Vec<u8>,
}

/// A library found inside a bundle, ready to persist
#[derive(Debug, Clone)]
pub struct ExtractedLibrary {
    pub id: LibraryId,
    /// `(relative path, bytes)` pairs under the library directory
    pub files: Vec<(String, Vec<u8>)>,
}

impl Bundle {
    pub fn new(origin: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            origin: origin.into(),
            bytes,
        }
    }

    /// Libraries contained in this bundle: `(top-level dir, identity)`
    pub fn libraries(&self) -> Result<Vec<(String, LibraryId)>> {
        let mut archive = ZipArchive::new(Cursor::new(self.bytes.as_slice()))
            .with_context(|| format!("Bundle for {} is not a valid ZIP", self.origin))?;

        let dirs: Vec<String> = archive
            .file_names()
            .filter_map(|name| {
                let (dir, rest) = name.split_once('/')?;
                (rest == "library.json").then(|| dir.to_string())
            })
            .collect();

        let mut found = Vec::new();
        for dir in dirs {
            let bytes = read_entry(&mut archive, &format!("{}/library.json", dir))?;
            let library = LibraryJson::from_slice(&bytes)
                .with_context(|| format!("Invalid library.json in bundle entry {}", dir))?;
            found.push((dir, library.id()));
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }

    /// Extract the best library matching a request, if the bundle holds one.
    pub fn extract(&self, request: &LibraryRequest) -> Result<Option<ExtractedLibrary>> {
        let Some((dir, id)) = self
            .libraries()?
            .into_iter()
            .filter(|(_, id)| request.accepts(id))
            .max_by_key(|(_, id)| (id.major, id.minor))
        else {
            return Ok(None);
        };

        let mut archive = ZipArchive::new(Cursor::new(self.bytes.as_slice()))?;
        let prefix = format!("{}/", dir);
        let mut files = Vec::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let Some(relative) = name.strip_prefix(&prefix) else {
                continue;
            };
            if !is_safe_relative(relative) {
                anyhow::bail!("Bundle entry escapes its library directory: {}", name);
            }
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes)?;
            files.push((relative.to_string(), bytes));
        }

        Ok(Some(ExtractedLibrary { id, files }))
    }
}

fn read_entry<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut file = archive
        .by_name(name)
        .with_context(|| format!("Missing bundle entry {}", name))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains('\\')
        && path.split('/').all(|segment| segment != "..")
}
