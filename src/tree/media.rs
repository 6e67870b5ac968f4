//! Media resolution: local paths and remote URLs → [`MediaAsset`]s.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::debug;

use crate::domain::{MediaAsset, MediaKind};

/// Default upper bound for one media file (50MB)
pub const DEFAULT_MAX_MEDIA_BYTES: u64 = 50 * 1024 * 1024;

/// Where a media reference points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Local(PathBuf),
    Remote(String),
}

impl MediaSource {
    /// `http(s)://` is remote; anything else is a path relative to `base`
    pub fn parse(reference: &str, base: &Path) -> Self {
        let lower = reference.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Self::Remote(reference.to_string());
        }
        let path = PathBuf::from(reference);
        if path.is_absolute() {
            Self::Local(path)
        } else {
            Self::Local(base.join(path))
        }
    }

    /// File extension of the reference (query strings ignored)
    pub fn extension(&self) -> Option<String> {
        let name = match self {
            Self::Local(path) => path.file_name()?.to_str()?.to_string(),
            Self::Remote(url) => {
                let without_query = url.split(['?', '#']).next().unwrap_or(url);
                without_query.rsplit('/').next()?.to_string()
            }
        };
        let (_, extension) = name.rsplit_once('.')?;
        (!extension.is_empty()).then(|| extension.to_lowercase())
    }
}

/// Reads media bytes from disk or over HTTP
#[derive(Debug, Clone)]
pub struct MediaResolver {
    base_path: PathBuf,
    max_bytes: u64,
    client: reqwest::Client,
}

impl MediaResolver {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            max_bytes: DEFAULT_MAX_MEDIA_BYTES,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Load a reference into an asset with a content-derived filename
    pub async fn load(&self, reference: &str, kind: MediaKind) -> Result<MediaAsset> {
        let source = MediaSource::parse(reference, &self.base_path);
        let bytes = match &source {
            MediaSource::Local(path) => fs::read(path)
                .await
                .with_context(|| format!("Failed to read media file: {}", path.display()))?,
            MediaSource::Remote(url) => self.download(url).await?,
        };

        if bytes.len() as u64 > self.max_bytes {
            anyhow::bail!(
                "Media '{}' is {} bytes, limit is {}",
                reference,
                bytes.len(),
                self.max_bytes
            );
        }

        let extension = source
            .extension()
            .unwrap_or_else(|| default_extension(kind).to_string());
        let asset = MediaAsset::new(kind, &extension, bytes);
        debug!(reference, filename = %asset.filename, "Resolved media");
        Ok(asset)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to download media: {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("GET {} returned {}", url, response.status());
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read media body: {}", url))?;
        Ok(bytes.to_vec())
    }
}

fn default_extension(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "png",
        MediaKind::Audio => "mp3",
        MediaKind::Video => "mp4",
        MediaKind::File => "bin",
    }
}
