//! Sessioning: keep a user logged in across requests.

use async_trait::async_trait;
use concord_core::{Concept, ConceptError, Fields, Outcome, Value, require_str};

use crate::store::{Collection, Document, fresh_id, remove_by_id};

#[derive(Debug, Clone)]
struct SessionDoc {
    id: String,
    user: String,
}

impl Document for SessionDoc {
    fn id(&self) -> &str {
        &self.id
    }
}

pub struct SessioningConcept {
    sessions: Collection<SessionDoc>,
}

impl SessioningConcept {
    pub fn new() -> Self {
        Self {
            sessions: Collection::new(),
        }
    }
}

impl Default for SessioningConcept {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Concept for SessioningConcept {
    fn name(&self) -> &str {
        "Sessioning"
    }

    fn actions(&self) -> &[&'static str] {
        &["create", "delete"]
    }

    fn queries(&self) -> &[&'static str] {
        &["_getUser"]
    }

    async fn perform(&self, action: &str, input: &Fields) -> Result<Outcome, ConceptError> {
        match action {
            "create" => {
                let user = require_str(input, action, "user")?;
                let session = SessionDoc {
                    id: fresh_id(),
                    user: user.to_string(),
                };
                let id = session.id.clone();
                self.sessions.write().await.push(session);
                Ok(Outcome::field("session", id))
            }
            "delete" => {
                let session = require_str(input, action, "session")?;
                if remove_by_id(&mut *self.sessions.write().await, session) {
                    Ok(Outcome::empty())
                } else {
                    Ok(Outcome::error(format!("Session with ID {session} not found.")))
                }
            }
            other => Err(ConceptError::UnknownOperation {
                concept: self.name().to_string(),
                operation: other.to_string(),
            }),
        }
    }

    async fn query(&self, query: &str, input: &Fields) -> Result<Value, ConceptError> {
        match query {
            "_getUser" => {
                let session = require_str(input, query, "session")?;
                Ok(self
                    .sessions
                    .get(session)
                    .await
                    .map(|s| Value::String(s.user))
                    .unwrap_or(Value::Null))
            }
            other => Err(ConceptError::UnknownOperation {
                concept: self.name().to_string(),
                operation: other.to_string(),
            }),
        }
    }
}
