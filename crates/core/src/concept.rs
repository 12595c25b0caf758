//! Concept trait: the abstraction over independent units of behavior.
//!
//! A concept owns its state and exposes it through named actions (which may
//! mutate state and return an [`Outcome`]) and named queries (which read
//! state and return a JSON value). Concepts never reference each other;
//! synchronizations coordinate them.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::ConceptError;
use crate::invocation::OperationKind;
use crate::value::{Fields, Outcome, Value};

/// The core Concept trait.
///
/// Each concept (UserAuth, Sessioning, Profile, ...) implements this trait
/// and is registered in the [`ConceptRegistry`] under its name.
#[async_trait]
pub trait Concept: Send + Sync {
    /// The unique name of this concept (e.g., "Sessioning").
    fn name(&self) -> &str;

    /// Names of the actions this concept supports.
    fn actions(&self) -> &[&'static str];

    /// Names of the queries this concept supports. Query names start with `_`.
    fn queries(&self) -> &[&'static str];

    /// Run an action.
    ///
    /// Domain refusals come back as `Ok(Outcome::Error(..))`. `Err` is
    /// reserved for malformed calls and store failures.
    async fn perform(&self, action: &str, input: &Fields) -> Result<Outcome, ConceptError>;

    /// Run a query.
    ///
    /// Returns `Value::Null` for "no result", an array for multi-row
    /// queries, and a scalar or object otherwise.
    async fn query(&self, query: &str, input: &Fields) -> Result<Value, ConceptError>;

    /// Whether this concept exposes `operation`, as an action or a query.
    fn supports(&self, operation: &str) -> bool {
        match OperationKind::of(operation) {
            OperationKind::Action => self.actions().contains(&operation),
            OperationKind::Query => self.queries().contains(&operation),
        }
    }
}

/// A registry of available concepts, keyed by name.
///
/// Backed by a `BTreeMap` so listings come out in a stable order.
pub struct ConceptRegistry {
    concepts: BTreeMap<String, Box<dyn Concept>>,
}

impl ConceptRegistry {
    pub fn new() -> Self {
        Self {
            concepts: BTreeMap::new(),
        }
    }

    /// Register a concept. Replaces any existing concept with the same name.
    pub fn register(&mut self, concept: Box<dyn Concept>) {
        let name = concept.name().to_string();
        self.concepts.insert(name, concept);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, concept: Box<dyn Concept>) -> Self {
        self.register(concept);
        self
    }

    /// Get a concept by name.
    pub fn get(&self, name: &str) -> Option<&dyn Concept> {
        self.concepts.get(name).map(|c| c.as_ref())
    }

    fn lookup(&self, concept: &str, operation: &str) -> Result<&dyn Concept, ConceptError> {
        let found = self
            .get(concept)
            .ok_or_else(|| ConceptError::UnknownConcept(concept.to_string()))?;
        if !found.supports(operation) {
            return Err(ConceptError::UnknownOperation {
                concept: concept.to_string(),
                operation: operation.to_string(),
            });
        }
        Ok(found)
    }

    /// Run an action on a named concept.
    pub async fn perform(
        &self,
        concept: &str,
        action: &str,
        input: &Fields,
    ) -> Result<Outcome, ConceptError> {
        if OperationKind::of(action) != OperationKind::Action {
            return Err(ConceptError::UnknownOperation {
                concept: concept.to_string(),
                operation: action.to_string(),
            });
        }
        let target = self.lookup(concept, action)?;
        tracing::debug!(concept, action, "Performing action");
        target.perform(action, input).await
    }

    /// Run a query on a named concept.
    pub async fn query(
        &self,
        concept: &str,
        query: &str,
        input: &Fields,
    ) -> Result<Value, ConceptError> {
        if OperationKind::of(query) != OperationKind::Query {
            return Err(ConceptError::UnknownOperation {
                concept: concept.to_string(),
                operation: query.to_string(),
            });
        }
        let target = self.lookup(concept, query)?;
        target.query(query, input).await
    }

    /// Run either kind of operation and return the output map that would be
    /// recorded for it.
    ///
    /// Actions record their outcome fields; queries record `{ "result": value }`.
    pub async fn invoke(
        &self,
        concept: &str,
        operation: &str,
        input: &Fields,
    ) -> Result<Fields, ConceptError> {
        match OperationKind::of(operation) {
            OperationKind::Action => Ok(self.perform(concept, operation, input).await?.into_fields()),
            OperationKind::Query => {
                let value = self.query(concept, operation, input).await?;
                let mut fields = Fields::new();
                fields.insert("result".into(), value);
                Ok(fields)
            }
        }
    }

    /// Whether `concept.operation` exists.
    pub fn has_operation(&self, concept: &str, operation: &str) -> bool {
        self.lookup(concept, operation).is_ok()
    }

    /// Every `(concept, operation)` pair, actions before queries.
    pub fn operations(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (name, concept) in &self.concepts {
            for op in concept.actions().iter().chain(concept.queries()) {
                out.push((name.clone(), op.to_string()));
            }
        }
        out
    }

    /// List all registered concept names.
    pub fn names(&self) -> Vec<&str> {
        self.concepts.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}

impl Default for ConceptRegistry {
    fn default() -> Self {
        Self::new()
    }
}
