//! Media assets bundled next to the content document.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kind of media; decides the folder under `content/`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    File,
}

impl MediaKind {
    /// Folder under `content/` holding this kind
    pub fn folder(&self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Audio => "audios",
            MediaKind::Video => "videos",
            MediaKind::File => "files",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::File => write!(f, "file"),
        }
    }
}

impl FromStr for MediaKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "image" | "images" => Ok(MediaKind::Image),
            "audio" | "audios" => Ok(MediaKind::Audio),
            "video" | "videos" => Ok(MediaKind::Video),
            "file" | "files" => Ok(MediaKind::File),
            _ => anyhow::bail!("Unknown media kind: {}", s),
        }
    }
}

/// A media file registered during tree construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    /// Canonical filename (no folder), e.g. `image-0123456789abcdef.png`
    pub filename: String,
    pub kind: MediaKind,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl MediaAsset {
    /// Create an asset whose filename is derived from its content hash.
    pub fn new(kind: MediaKind, extension: &str, bytes: Vec<u8>) -> Self {
        let extension = extension.trim_start_matches('.').to_lowercase();
        let filename = format!("{}-{}.{}", kind, content_hash(&bytes), extension);
        Self {
            filename,
            kind,
            mime: mime_for_extension(&extension).to_string(),
            bytes,
        }
    }

    /// Path relative to `content/`, as referenced from node params
    pub fn content_path(&self) -> String {
        format!("{}/{}", self.kind.folder(), self.filename)
    }

    /// Path inside the package
    pub fn archive_path(&self) -> String {
        format!("content/{}", self.content_path())
    }
}

/// SHA256(bytes)[0:8] as 16 hex chars
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..8])
}

pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
