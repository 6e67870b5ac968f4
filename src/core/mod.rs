//! Core compilation logic.
//!
//! This module contains:
//! - Book: book definitions and loading
//! - State: the compile state machine
//! - Orchestrator: main compilation engine

pub mod book;
pub mod orchestrator;
pub mod state;

// Re-export commonly used types
pub use book::{BookDefinition, ChapterDefinition, ContentItem};
pub use orchestrator::{CompileOptions, CompiledPackage, Orchestrator};
pub use state::{CompileState, StateTracker};
