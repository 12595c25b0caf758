//! Profile: a display name attached to a user.

use async_trait::async_trait;
use concord_core::{Concept, ConceptError, Fields, Outcome, Value, require_str};
use serde_json::json;

use crate::store::{Collection, Document, fresh_id};

#[derive(Debug, Clone)]
struct ProfileDoc {
    id: String,
    user: String,
    name: String,
}

impl Document for ProfileDoc {
    fn id(&self) -> &str {
        &self.id
    }
}

pub struct ProfileConcept {
    profiles: Collection<ProfileDoc>,
}

impl ProfileConcept {
    pub fn new() -> Self {
        Self {
            profiles: Collection::new(),
        }
    }

    async fn create_profile(&self, input: &Fields) -> Result<Outcome, ConceptError> {
        let user = require_str(input, "createProfile", "user")?;
        let name = require_str(input, "createProfile", "name")?;

        let mut profiles = self.profiles.write().await;
        if profiles.iter().any(|p| p.user == user) {
            return Ok(Outcome::error(format!("Profile for user {user} already exists.")));
        }
        let profile = ProfileDoc {
            id: fresh_id(),
            user: user.to_string(),
            name: name.to_string(),
        };
        let id = profile.id.clone();
        profiles.push(profile);
        Ok(Outcome::field("profile", id))
    }

    async fn update_name(&self, input: &Fields) -> Result<Outcome, ConceptError> {
        let user = require_str(input, "updateName", "user")?;
        let name = require_str(input, "updateName", "name")?;

        let mut profiles = self.profiles.write().await;
        match profiles.iter_mut().find(|p| p.user == user) {
            Some(profile) => {
                profile.name = name.to_string();
                Ok(Outcome::field("profile", profile.id.clone()))
            }
            None => Ok(Outcome::error(format!("Profile for user {user} not found."))),
        }
    }

    async fn delete_profile(&self, input: &Fields) -> Result<Outcome, ConceptError> {
        let user = require_str(input, "deleteProfile", "user")?;

        let mut profiles = self.profiles.write().await;
        let before = profiles.len();
        profiles.retain(|p| p.user != user);
        if profiles.len() == before {
            return Ok(Outcome::error(format!("Profile for user {user} not found.")));
        }
        Ok(Outcome::empty())
    }

    async fn by_user(&self, input: &Fields, query: &str) -> Result<Option<ProfileDoc>, ConceptError> {
        let user = require_str(input, query, "user")?;
        Ok(self.profiles.find_one(|p| p.user == user).await)
    }
}

impl Default for ProfileConcept {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Concept for ProfileConcept {
    fn name(&self) -> &str {
        "Profile"
    }

    fn actions(&self) -> &[&'static str] {
        &["createProfile", "updateName", "deleteProfile"]
    }

    fn queries(&self) -> &[&'static str] {
        &["_getProfile", "_getName"]
    }

    async fn perform(&self, action: &str, input: &Fields) -> Result<Outcome, ConceptError> {
        match action {
            "createProfile" => self.create_profile(input).await,
            "updateName" => self.update_name(input).await,
            "deleteProfile" => self.delete_profile(input).await,
            other => Err(ConceptError::UnknownOperation {
                concept: self.name().to_string(),
                operation: other.to_string(),
            }),
        }
    }

    async fn query(&self, query: &str, input: &Fields) -> Result<Value, ConceptError> {
        match query {
            "_getProfile" => Ok(self
                .by_user(input, query)
                .await?
                .map(|p| json!({ "profile": p.id, "name": p.name }))
                .unwrap_or(Value::Null)),
            "_getName" => Ok(self
                .by_user(input, query)
                .await?
                .map(|p| Value::String(p.name))
                .unwrap_or(Value::Null)),
            other => Err(ConceptError::UnknownOperation {
                concept: self.name().to_string(),
                operation: other.to_string(),
            }),
        }
    }
}
