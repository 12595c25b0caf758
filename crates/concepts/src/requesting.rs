//! Requesting: the concept external requests enter and leave through.
//!
//! The gateway seeds `request` records directly into a request's log, and
//! syncs answer them with `respond`. The response body travels in the log,
//! so this concept keeps no state of its own.

use async_trait::async_trait;
use concord_core::{Concept, ConceptError, Fields, Outcome, Value, require_str};

use crate::store::fresh_id;

pub struct RequestingConcept;

impl RequestingConcept {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RequestingConcept {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Concept for RequestingConcept {
    fn name(&self) -> &str {
        "Requesting"
    }

    fn actions(&self) -> &[&'static str] {
        &["request", "respond"]
    }

    fn queries(&self) -> &[&'static str] {
        &[]
    }

    async fn perform(&self, action: &str, input: &Fields) -> Result<Outcome, ConceptError> {
        match action {
            "request" => Ok(Outcome::field("request", fresh_id())),
            "respond" => {
                let request = require_str(input, action, "request")?;
                Ok(Outcome::field("request", request))
            }
            other => Err(ConceptError::UnknownOperation {
                concept: self.name().to_string(),
                operation: other.to_string(),
            }),
        }
    }

    async fn query(&self, query: &str, _input: &Fields) -> Result<Value, ConceptError> {
        Err(ConceptError::UnknownOperation {
            concept: self.name().to_string(),
            operation: query.to_string(),
        })
    }
}
