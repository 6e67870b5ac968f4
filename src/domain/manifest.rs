//! The package manifest (`h5p.json`).

use serde::{Deserialize, Serialize};

use super::identity::LibraryId;

/// Embed modes advertised by every package
pub const EMBED_TYPES: &[&str] = &["iframe"];

/// License policy for every package ("U" = undisclosed)
pub const PACKAGE_LICENSE: &str = "U";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    pub title: String,
    pub language: String,
    pub default_language: String,

    /// Machine name of the root library
    pub main_library: String,

    pub embed_types: Vec<String>,
    pub license: String,

    /// Flattened, deduplicated dependency closure
    pub preloaded_dependencies: Vec<LibraryId>,
}

impl PackageManifest {
    pub fn new(
        title: impl Into<String>,
        language: impl Into<String>,
        main_library: &LibraryId,
        dependencies: Vec<LibraryId>,
    ) -> Self {
        let language = language.into();
        Self {
            title: title.into(),
            default_language: language.clone(),
            language,
            main_library: main_library.name.clone(),
            embed_types: EMBED_TYPES.iter().map(|s| s.to_string()).collect(),
            license: PACKAGE_LICENSE.to_string(),
            preloaded_dependencies: dependencies,
        }
    }
}
