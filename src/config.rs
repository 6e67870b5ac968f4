//! Configuration for h5pbook paths, registry, media limits and library versions.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (H5PBOOK_HOME, H5PBOOK_CACHE, H5PBOOK_REGISTRY_URL)
//! 2. Config file (.h5pbook/config.yaml)
//! 3. Defaults (~/.h5pbook, cache in ~/.h5pbook/libraries)
//!
//! Config file discovery:
//! - Searches current directory and parents for .h5pbook/config.yaml
//! - `paths.home` is relative to the .h5pbook/ directory, `paths.cache`
//!   to the project root (the parent of .h5pbook/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::LibraryId;
use crate::tree::media::DEFAULT_MAX_MEDIA_BYTES;
use crate::tree::LibrarySet;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub registry: Option<RegistryConfig>,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub libraries: LibraryVersions,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .h5pbook/)
    pub home: Option<String>,
    /// Library cache directory (relative to the project root)
    pub cache: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Base URL serving `Name-Major.Minor.zip` bundles
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaConfig {
    /// Upper bound for one media file
    pub max_bytes: Option<u64>,
}

/// Library versions as `"Name Major.Minor"` strings; unset keeps the default
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryVersions {
    pub book: Option<String>,
    pub chapter: Option<String>,
    pub text: Option<String>,
    pub image: Option<String>,
    pub audio: Option<String>,
    pub quiz: Option<String>,
}

impl LibraryVersions {
    /// Override the given set with every configured version
    pub fn apply(&self, mut set: LibrarySet) -> Result<LibrarySet> {
        let slots = [
            ("book", &self.book, &mut set.book),
            ("chapter", &self.chapter, &mut set.chapter),
            ("text", &self.text, &mut set.text),
            ("image", &self.image, &mut set.image),
            ("audio", &self.audio, &mut set.audio),
            ("quiz", &self.quiz, &mut set.quiz),
        ];

        for (key, configured, slot) in slots {
            if let Some(raw) = configured {
                *slot = raw
                    .parse::<LibraryId>()
                    .with_context(|| format!("Invalid libraries.{} in config: '{}'", key, raw))?;
            }
        }
        Ok(set)
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to h5pbook home
    pub home: PathBuf,
    /// Absolute path to the library cache
    pub cache_dir: PathBuf,
    /// Remote library registry, if any
    pub registry_url: Option<String>,
    /// Library versions used for generated packages
    pub libraries: LibrarySet,
    pub max_media_bytes: u64,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".h5pbook").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge a config file, environment lookups and defaults
fn resolve_config(
    file: Option<(&Path, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
    default_home: PathBuf,
) -> Result<ResolvedConfig> {
    let config_file = file.as_ref().map(|(path, _)| path.to_path_buf());

    let (home, cache_dir, registry_url, max_media_bytes, libraries) = match file {
        Some((config_path, config)) => {
            // .h5pbook/ and the project root above it
            let config_dir = config_path.parent().unwrap_or(Path::new("."));
            let base_dir = config_dir.parent().unwrap_or(Path::new("."));

            let home = match (env("H5PBOOK_HOME"), &config.paths.home) {
                (Some(env_home), _) => PathBuf::from(env_home),
                (None, Some(home_path)) => resolve_path(config_dir, home_path),
                (None, None) => default_home,
            };

            let cache_dir = match (env("H5PBOOK_CACHE"), &config.paths.cache) {
                (Some(env_cache), _) => PathBuf::from(env_cache),
                (None, Some(cache_path)) => resolve_path(base_dir, cache_path),
                (None, None) => home.join("libraries"),
            };

            let registry = config.registry.as_ref();
            let registry_url = env("H5PBOOK_REGISTRY_URL")
                .or_else(|| registry.and_then(|r| r.url.clone()));
            let max_media_bytes = config.media.max_bytes.unwrap_or(DEFAULT_MAX_MEDIA_BYTES);

            let libraries = config.libraries.apply(LibrarySet::default())?;

            (home, cache_dir, registry_url, max_media_bytes, libraries)
        }
        None => {
            // No config file - use env vars or defaults
            let home = env("H5PBOOK_HOME").map(PathBuf::from).unwrap_or(default_home);
            let cache_dir = env("H5PBOOK_CACHE")
                .map(PathBuf::from)
                .unwrap_or_else(|| home.join("libraries"));

            (
                home,
                cache_dir,
                env("H5PBOOK_REGISTRY_URL"),
                DEFAULT_MAX_MEDIA_BYTES,
                LibrarySet::default(),
            )
        }
    };

    Ok(ResolvedConfig {
        home,
        cache_dir,
        registry_url,
        libraries,
        max_media_bytes,
        config_file,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".h5pbook");

    let file = match find_config_file() {
        Some(path) => {
            let config = load_config_file(&path)?;
            Some((path, config))
        }
        None => None,
    };

    resolve_config(
        file.as_ref().map(|(path, config)| (path.as_path(), config.clone())),
        |key| std::env::var(key).ok().filter(|v| !v.is_empty()),
        default_home,
    )
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the library cache directory.
pub fn cache_dir() -> Result<PathBuf> {
    Ok(config()?.cache_dir.clone())
}
