//! Domain types for the package compiler.
//!
//! This module contains the core data structures:
//! - Identity: library names and versions
//! - Node: content nodes, chapters and the finished tree
//! - Media: bundled media assets
//! - Manifest: the package manifest

pub mod identity;
pub mod manifest;
pub mod media;
pub mod node;

// Re-export commonly used types
pub use identity::{LibraryId, LibraryRequest};
pub use manifest::PackageManifest;
pub use media::{MediaAsset, MediaKind};
pub use node::{Chapter, ContentNode, ContentTree, NodeMetadata};
