//! h5pbook - Compile declarative books into H5P packages
//!
//! A book (YAML) is a tree of chapters holding type-tagged content items.
//! The compiler turns it into an `H5P.InteractiveBook` package: every
//! library the content needs is resolved from a local cache (or fetched
//! from a registry), the content is validated against the libraries'
//! semantics, and everything is zipped into one `.h5p` file.
//!
//! # Pipeline
//!
//! - Handlers validate each item, then append nodes through a
//!   [`tree::ChapterAccumulator`]
//! - The [`registry::SchemaRegistry`] resolves the dependency closure
//! - [`schema`] validates the tree against library semantics
//! - The [`archive::ArchiveAssembler`] writes the package
//!
//! # Modules
//!
//! - `archive`: Package assembly
//! - `core`: Book definitions and the orchestrator
//! - `domain`: Data structures (LibraryId, ContentNode, MediaAsset)
//! - `handlers`: Content handlers for item types
//! - `registry`: Library cache, sources and dependency closures
//! - `schema`: Semantics parsing and validation
//! - `tree`: Content tree construction
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Compile a book
//! h5pbook compile book.yaml -o book.h5p
//!
//! # Check a book without fetching anything
//! h5pbook validate book.yaml
//!
//! # List cached libraries
//! h5pbook cache list
//! ```

pub mod archive;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod schema;
pub mod tree;

// Re-export main types at crate root for convenience
pub use archive::{ArchiveAssembler, PackageContents};
pub use core::{BookDefinition, CompileOptions, CompiledPackage, ContentItem, Orchestrator};
pub use domain::{ContentTree, LibraryId, LibraryRequest, MediaAsset, MediaKind, PackageManifest};
pub use error::{CompileError, SchemaError};
pub use handlers::{ContentGenerator, ContentHandler, HandlerContext, Handlers, ItemRejection};
pub use registry::{ComponentSource, HttpComponentSource, LibraryDescriptor, SchemaRegistry};
pub use schema::{Schema, ValidationReport};
pub use tree::{ChapterAccumulator, ContentTreeBuilder, LibrarySet};
