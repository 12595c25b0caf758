//! Error types for the sync engine.
//!
//! Split by the phase that raises them: declaration (`SyncError`), registry
//! loading (`RegistryError`), frame manipulation (`FrameError`), `where`
//! extension (`ExtendError`), `then` dispatch (`DispatchError`), request
//! resolution (`EngineError`) and response extraction (`ResponseError`).

use concord_core::ConceptError;
use thiserror::Error;

use crate::pattern::Var;

/// A sync declaration is malformed. Raised by `SyncBuilder::build`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("Sync '{sync}' has no when patterns")]
    NoWhen { sync: String },

    #[error("Sync '{sync}' has no then patterns")]
    NoThen { sync: String },

    #[error("Sync '{sync}' uses variable {var} declared by another sync")]
    ForeignVariable { sync: String, var: Var },

    #[error("Sync '{sync}' references variable '{var}' in then, but nothing binds it")]
    UnboundVariable { sync: String, var: String },

    #[error("Sync '{sync}' has an output template on then pattern {concept}.{action}")]
    ThenOutput {
        sync: String,
        concept: String,
        action: String,
    },

    #[error("Sync '{sync}' declares more than one where clause")]
    DuplicateWhere { sync: String },

    #[error("Sync '{sync}' declares more than {limit} variables")]
    TooManyVariables { sync: String, limit: usize },
}

/// The sync registry cannot be loaded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate sync name: {0}")]
    DuplicateName(String),

    #[error("Sync '{sync}' references unknown concept '{concept}'")]
    UnknownConcept { sync: String, concept: String },

    #[error("Sync '{sync}' references unknown operation {concept}.{operation}")]
    UnknownOperation {
        sync: String,
        concept: String,
        operation: String,
    },

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Binding a variable failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Variable {var} is already bound to a different value")]
    Conflict { var: Var },

    #[error("Variable {var} does not belong to this frame")]
    UnknownVariable { var: Var },
}

/// A `where` clause failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtendError {
    #[error("Query argument uses unbound variable {var}")]
    Unbound { var: Var },

    #[error(transparent)]
    Concept(#[from] ConceptError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("{0}")]
    Failed(String),
}

/// A `then` pattern could not be dispatched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Then pattern uses unbound variable {var}")]
    Unbound { var: Var },

    #[error(transparent)]
    Concept(#[from] ConceptError),
}

/// Resolving one request failed. Every variant is fatal for the request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Request did not reach quiescence within {rounds} rounds")]
    NonTermination { rounds: u32 },

    #[error("Invocation log exceeded {limit} records")]
    LogOverflow { limit: usize },

    #[error("Where clause of sync '{sync}' failed: {source}")]
    Extend { sync: String, source: ExtendError },

    #[error("Sync '{sync}' left variable '{var}' unbound at dispatch")]
    Dispatch { sync: String, var: String },

    #[error("Sync '{sync}' dispatch failed: {source}")]
    Concept { sync: String, source: ConceptError },

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Request exceeded its time limit of {limit_ms} ms")]
    Timeout { limit_ms: u64 },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A resolved request did not produce exactly one response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResponseError {
    #[error("Request produced no response")]
    NoResponse,

    #[error("Request produced {0} responses")]
    Multiple(usize),
}
