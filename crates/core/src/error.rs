//! Error types for the Concord domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Domain refusals
//! (duplicate key, not found, not owner) are *not* errors here: they travel
//! as [`Outcome::Error`](crate::Outcome) data. These types cover only the
//! faults that abort a request.

use thiserror::Error;

/// The top-level error type for Concord operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Concept errors ---
    #[error("Concept error: {0}")]
    Concept(#[from] ConceptError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Faults raised while calling into a concept.
///
/// A concept returns one of these only when the call itself is malformed
/// or the backing store failed, never for an ordinary refusal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConceptError {
    #[error("Unknown concept: {0}")]
    UnknownConcept(String),

    #[error("Unknown operation: {concept}.{operation}")]
    UnknownOperation { concept: String, operation: String },

    #[error("Invalid input for {operation}: {reason}")]
    InvalidInput { operation: String, reason: String },

    #[error("Store error: {0}")]
    Store(String),
}
