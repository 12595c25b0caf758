//! # Concord Core
//!
//! Domain types, traits, and error definitions shared by every Concord crate.
//! This crate has **no framework dependencies**. It defines the vocabulary
//! every other crate speaks.
//!
//! ## Design Philosophy
//!
//! A *concept* is a self-contained state machine exposing named actions and
//! queries. Concepts never call each other; the engine coordinates them by
//! watching the [`InvocationLog`] of one request. Everything that crosses a
//! concept boundary is plain JSON ([`Value`] / [`Fields`]), and every action
//! result is an explicit [`Outcome`] rather than an ad-hoc error field.

pub mod concept;
pub mod error;
pub mod invocation;
pub mod value;

// Re-export key types at crate root for ergonomics
pub use concept::{Concept, ConceptRegistry};
pub use error::{ConceptError, Error, Result};
pub use invocation::{InvocationLog, InvocationRecord, OperationKind};
pub use value::{Fields, Outcome, Value, optional_str, require_str, to_fields};
