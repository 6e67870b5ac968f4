//! Library identities.
//!
//! H5P names a library in three spellings:
//! - `H5P.Text 1.1` inside content documents and schema options
//! - `H5P.Text-1.1` as a package/cache directory name
//! - `H5P.Text` as an unversioned (legacy) cache directory name

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A fully versioned library identity (name + major.minor).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LibraryId {
    /// Machine name, e.g. `H5P.AdvancedText`
    #[serde(rename = "machineName")]
    pub name: String,

    #[serde(rename = "majorVersion")]
    pub major: u32,

    #[serde(rename = "minorVersion")]
    pub minor: u32,
}

impl LibraryId {
    pub fn new(name: impl Into<String>, major: u32, minor: u32) -> Self {
        Self {
            name: name.into(),
            major,
            minor,
        }
    }

    /// Directory name used inside packages and the cache (`Name-Major.Minor`)
    pub fn dir_name(&self) -> String {
        format!("{}-{}.{}", self.name, self.major, self.minor)
    }

    /// Deduplication key: case-insensitive name plus version
    pub fn key(&self) -> String {
        format!("{}@{}.{}", self.name.to_lowercase(), self.major, self.minor)
    }

    /// Same name (ignoring case) and same version
    pub fn matches(&self, other: &LibraryId) -> bool {
        self.key() == other.key()
    }

    /// Parse a directory name of the form `Name-Major.Minor`.
    pub fn from_dir_name(dir: &str) -> Option<Self> {
        let (name, version) = dir.rsplit_once('-')?;
        let (major, minor) = parse_version(version)?;
        if name.is_empty() {
            return None;
        }
        Some(Self::new(name, major, minor))
    }

    /// The request that pins exactly this identity
    pub fn to_request(&self) -> LibraryRequest {
        LibraryRequest {
            name: self.name.clone(),
            version: Some((self.major, self.minor)),
        }
    }
}

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}", self.name, self.major, self.minor)
    }
}

impl FromStr for LibraryId {
    type Err = anyhow::Error;

    /// Accepts `Name Major.Minor` and `Name-Major.Minor`.
    fn from_str(s: &str) -> anyhow::Result<Self> {
        let request: LibraryRequest = s.parse()?;
        match request.version {
            Some((major, minor)) => Ok(Self::new(request.name, major, minor)),
            None => anyhow::bail!("Library identity '{}' has no version", s),
        }
    }
}

/// A request for a library, optionally pinned to a major.minor version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LibraryRequest {
    pub name: String,
    pub version: Option<(u32, u32)>,
}

impl LibraryRequest {
    /// Request the newest available version of `name`
    pub fn latest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    pub fn pinned(name: impl Into<String>, major: u32, minor: u32) -> Self {
        Self {
            name: name.into(),
            version: Some((major, minor)),
        }
    }

    /// Does a resolved identity satisfy this request?
    ///
    /// Names compare case-insensitively; a pinned version must match exactly.
    pub fn accepts(&self, id: &LibraryId) -> bool {
        if !self.name.eq_ignore_ascii_case(&id.name) {
            return false;
        }
        match self.version {
            Some(version) => version == (id.major, id.minor),
            None => true,
        }
    }

    /// Key used for visited-set bookkeeping before resolution
    pub fn key(&self) -> String {
        match self.version {
            Some((major, minor)) => format!("{}@{}.{}", self.name.to_lowercase(), major, minor),
            None => format!("{}@*", self.name.to_lowercase()),
        }
    }
}

impl fmt::Display for LibraryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some((major, minor)) => write!(f, "{} {}.{}", self.name, major, minor),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for LibraryRequest {
    type Err = anyhow::Error;

    /// Accepts `Name`, `Name Major.Minor` and `Name-Major.Minor`.
    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            anyhow::bail!("Empty library identity");
        }

        if let Some((name, version)) = s.split_once(' ') {
            let (major, minor) = parse_version(version.trim())
                .ok_or_else(|| anyhow::anyhow!("Invalid library version in '{}'", s))?;
            return Ok(Self::pinned(name, major, minor));
        }

        if let Some(id) = LibraryId::from_dir_name(s) {
            return Ok(id.to_request());
        }

        Ok(Self::latest(s))
    }
}

impl From<&LibraryId> for LibraryRequest {
    fn from(id: &LibraryId) -> Self {
        id.to_request()
    }
}

/// Parse `Major.Minor` (a trailing `.Patch` is tolerated and ignored)
fn parse_version(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}
