//! UserAuth: verify a user's identity from a username and password.
//!
//! Passwords are stored as a salted SHA-256 digest. Each user gets a fresh
//! random salt at registration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use concord_core::{Concept, ConceptError, Fields, Outcome, Value, require_str};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::store::{Collection, Document, fresh_id};

#[derive(Debug, Clone)]
struct UserDoc {
    id: String,
    username: String,
    salt: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl Document for UserDoc {
    fn id(&self) -> &str {
        &self.id
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct UserAuthConcept {
    users: Collection<UserDoc>,
}

impl UserAuthConcept {
    pub fn new() -> Self {
        Self {
            users: Collection::new(),
        }
    }

    /// Register a new user. Usernames are unique.
    async fn register(&self, input: &Fields) -> Result<Outcome, ConceptError> {
        let username = require_str(input, "register", "username")?;
        let password = require_str(input, "register", "password")?;

        let mut users = self.users.write().await;
        if users.iter().any(|u| u.username == username) {
            return Ok(Outcome::error(format!(
                "User with username {username} already exists."
            )));
        }

        let salt = fresh_id();
        let user = UserDoc {
            id: fresh_id(),
            username: username.to_string(),
            password_hash: hash_password(&salt, password),
            salt,
            created_at: Utc::now(),
        };
        let id = user.id.clone();
        users.push(user);
        tracing::info!(user = %id, "User registered");
        Ok(Outcome::field("user", id))
    }

    /// Check credentials and return the matching user.
    async fn login(&self, input: &Fields) -> Result<Outcome, ConceptError> {
        let username = require_str(input, "login", "username")?;
        let password = require_str(input, "login", "password")?;

        let Some(user) = self.users.find_one(|u| u.username == username).await else {
            return Ok(Outcome::error(format!(
                "User with username {username} not found."
            )));
        };
        if hash_password(&user.salt, password) != user.password_hash {
            return Ok(Outcome::error("Invalid password."));
        }
        Ok(Outcome::field("user", user.id))
    }

    async fn get_user_by_username(&self, input: &Fields) -> Result<Value, ConceptError> {
        let username = require_str(input, "_getUserByUsername", "username")?;
        Ok(self
            .users
            .find_one(|u| u.username == username)
            .await
            .map(|u| {
                json!({
                    "user": u.id,
                    "username": u.username,
                    "createdAt": u.created_at.to_rfc3339(),
                })
            })
            .unwrap_or(Value::Null))
    }
}

impl Default for UserAuthConcept {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Concept for UserAuthConcept {
    fn name(&self) -> &str {
        "UserAuth"
    }

    fn actions(&self) -> &[&'static str] {
        &["register", "login"]
    }

    fn queries(&self) -> &[&'static str] {
        &["_getUserByUsername"]
    }

    async fn perform(&self, action: &str, input: &Fields) -> Result<Outcome, ConceptError> {
        match action {
            "register" => self.register(input).await,
            "login" => self.login(input).await,
            other => Err(ConceptError::UnknownOperation {
                concept: self.name().to_string(),
                operation: other.to_string(),
            }),
        }
    }

    async fn query(&self, query: &str, input: &Fields) -> Result<Value, ConceptError> {
        match query {
            "_getUserByUsername" => self.get_user_by_username(input).await,
            other => Err(ConceptError::UnknownOperation {
                concept: self.name().to_string(),
                operation: other.to_string(),
            }),
        }
    }
}
