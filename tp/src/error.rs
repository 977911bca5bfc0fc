//! Error types for progress reporting
//!
//! Usage and structural errors fail immediately and synchronously; failures
//! raised inside scope or loop bodies are never wrapped or swallowed - they
//! propagate unchanged after the terminal record has been emitted.

use thiserror::Error;

/// Errors from the progress core
#[derive(Debug, Error)]
pub enum ProgressError {
    /// Ambient update with no active scope and no explicit identity
    #[error("no active progress scope on this thread; open one with Reporter::scope or emit with an explicit id")]
    NoActiveScope,

    /// Malformed emission threshold for a driven loop
    #[error("invalid emission threshold {0}: must be finite and non-negative")]
    InvalidThreshold(f64),
}
