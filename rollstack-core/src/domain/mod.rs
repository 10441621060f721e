//! Core domain types
//!
//! The entities persisted by the orchestrator and returned through its API.
//! Status enums carry their own string form so every storage backend and
//! every client agrees on the same spelling.

pub mod deployment;
pub mod integration;
pub mod log;
pub mod stack;

/// Error returned when a stored string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl std::fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}
