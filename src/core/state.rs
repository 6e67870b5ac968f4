//! Compile state machine.
//!
//! ```text
//! Empty → BookCreated → (per item) Validating → Processing
//!       → Accumulated → ClosureResolved → Assembled
//! ```
//!
//! Any state except `Assembled` may move to the terminal `Failed`.

use std::fmt;

use crate::error::{CompileError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileState {
    Empty,
    BookCreated,
    Validating,
    Processing,
    Accumulated,
    ClosureResolved,
    Assembled,
    Failed,
}

impl CompileState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Assembled | Self::Failed)
    }

    pub fn can_transition_to(self, next: CompileState) -> bool {
        use CompileState::*;

        match (self, next) {
            (Assembled | Failed, _) => false,
            (_, Failed) => true,
            (Empty, BookCreated) => true,
            (BookCreated, Validating) => true,
            // A book whose chapters hold no items goes straight to accumulated
            (BookCreated, Accumulated) => true,
            (Validating, Processing) => true,
            (Processing, Validating) => true,
            (Processing, Accumulated) => true,
            (Accumulated, ClosureResolved) => true,
            (ClosureResolved, Assembled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CompileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Empty => "empty",
            Self::BookCreated => "book_created",
            Self::Validating => "validating",
            Self::Processing => "processing",
            Self::Accumulated => "accumulated",
            Self::ClosureResolved => "closure_resolved",
            Self::Assembled => "assembled",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Tracks one compile's state and rejects illegal moves
#[derive(Debug)]
pub struct StateTracker {
    current: CompileState,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            current: CompileState::Empty,
        }
    }

    pub fn current(&self) -> CompileState {
        self.current
    }

    pub fn advance(&mut self, next: CompileState) -> Result<()> {
        if !self.current.can_transition_to(next) {
            return Err(CompileError::assembly(format!(
                "Illegal compile state transition {} -> {}",
                self.current, next
            )));
        }
        self.current = next;
        Ok(())
    }

    /// Mark the compile failed; a no-op once terminal
    pub fn fail(&mut self) {
        if !self.current.is_terminal() {
            self.current = CompileState::Failed;
        }
    }
}
