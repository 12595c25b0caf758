//! Invocation records and the request-scoped, append-only log.
//!
//! One external request owns exactly one [`InvocationLog`]. Every concept
//! action the engine dispatches on behalf of that request is appended here
//! together with its resolved input and output, and synchronizations match
//! their `when` patterns against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Fields;

/// Whether an operation mutates state or only reads it.
///
/// Query names start with an underscore (`_getUser`); everything else is an
/// action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Action,
    Query,
}

impl OperationKind {
    pub fn of(operation: &str) -> Self {
        if operation.starts_with('_') {
            OperationKind::Query
        } else {
            OperationKind::Action
        }
    }
}

/// An immutable fact: one concept operation and its resolved result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRecord {
    /// Position in the log, dense and starting at 0.
    pub seq: u64,

    pub concept: String,

    pub action: String,

    pub kind: OperationKind,

    pub input: Fields,

    pub output: Fields,

    /// When the record was appended
    pub at: DateTime<Utc>,
}

impl InvocationRecord {
    /// Does this record describe `concept.action`?
    pub fn is(&self, concept: &str, action: &str) -> bool {
        self.concept == concept && self.action == action
    }

    /// Whether the recorded output is a domain refusal.
    pub fn is_error(&self) -> bool {
        self.output.contains_key("error")
    }

    /// The `/Concept/action` route form of this record.
    pub fn route(&self) -> String {
        format!("/{}/{}", self.concept, self.action)
    }
}

/// Append-only log of the invocations made while resolving one request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InvocationLog {
    records: Vec<InvocationRecord>,
}

impl InvocationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return its sequence number.
    pub fn append(
        &mut self,
        concept: impl Into<String>,
        action: impl Into<String>,
        input: Fields,
        output: Fields,
    ) -> u64 {
        let seq = self.next_seq();
        let action = action.into();
        self.records.push(InvocationRecord {
            seq,
            concept: concept.into(),
            kind: OperationKind::of(&action),
            action,
            input,
            output,
            at: Utc::now(),
        });
        seq
    }

    pub fn records(&self) -> &[InvocationRecord] {
        &self.records
    }

    /// Records appended at or after `seq`.
    pub fn since(&self, seq: u64) -> &[InvocationRecord] {
        let start = (seq as usize).min(self.records.len());
        &self.records[start..]
    }

    pub fn get(&self, seq: u64) -> Option<&InvocationRecord> {
        self.records.get(seq as usize)
    }

    /// The sequence number the next append will receive.
    pub fn next_seq(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All invocations of `concept.action`, in log order.
    pub fn find<'a>(
        &'a self,
        concept: &'a str,
        action: &'a str,
    ) -> impl Iterator<Item = &'a InvocationRecord> + 'a {
        self.records.iter().filter(move |r| r.is(concept, action))
    }
}
