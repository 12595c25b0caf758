//! Relationship: named people a user keeps track of, each with a type
//! such as "friend" or "sister".

use async_trait::async_trait;
use concord_core::{Concept, ConceptError, Fields, Outcome, Value, optional_str, require_str};
use serde_json::json;

use crate::store::{Collection, Document, fresh_id, remove_by_id};

#[derive(Debug, Clone)]
struct RelationshipDoc {
    id: String,
    owner: String,
    name: String,
    relationship_type: String,
}

impl Document for RelationshipDoc {
    fn id(&self) -> &str {
        &self.id
    }
}

fn check_name(name: &str) -> Option<Outcome> {
    name.trim()
        .is_empty()
        .then(|| Outcome::error("Name cannot be empty."))
}

fn check_type(relationship_type: &str) -> Option<Outcome> {
    relationship_type
        .trim()
        .is_empty()
        .then(|| Outcome::error("RelationshipType cannot be empty."))
}

fn duplicate(name: &str, owner: &str) -> Outcome {
    Outcome::error(format!(
        "Relationship with name \"{name}\" already exists for owner {owner}."
    ))
}

fn not_found(id: &str) -> Outcome {
    Outcome::error(format!("Relationship with ID {id} not found."))
}

pub struct RelationshipConcept {
    relationships: Collection<RelationshipDoc>,
}

impl RelationshipConcept {
    pub fn new() -> Self {
        Self {
            relationships: Collection::new(),
        }
    }

    async fn create(&self, input: &Fields) -> Result<Outcome, ConceptError> {
        let op = "createRelationship";
        let owner = require_str(input, op, "owner")?;
        let name = require_str(input, op, "name")?;
        let relationship_type = require_str(input, op, "relationshipType")?;

        if let Some(refusal) = check_name(name).or_else(|| check_type(relationship_type)) {
            return Ok(refusal);
        }

        let mut relationships = self.relationships.write().await;
        if relationships.iter().any(|r| r.owner == owner && r.name == name) {
            return Ok(duplicate(name, owner));
        }
        let doc = RelationshipDoc {
            id: fresh_id(),
            owner: owner.to_string(),
            name: name.to_string(),
            relationship_type: relationship_type.to_string(),
        };
        let id = doc.id.clone();
        relationships.push(doc);
        Ok(Outcome::field("relationship", id))
    }

    /// Rename and/or retype a relationship. Empty strings count as not
    /// provided for the "at least one" check but are refused when given
    /// alongside the other field.
    async fn update(&self, input: &Fields) -> Result<Outcome, ConceptError> {
        let op = "updateRelationship";
        let id = require_str(input, op, "relationship")?;
        let name = optional_str(input, op, "name")?;
        let relationship_type = optional_str(input, op, "relationshipType")?;

        let provided = |v: Option<&str>| v.is_some_and(|s| !s.is_empty());
        if !provided(name) && !provided(relationship_type) {
            return Ok(Outcome::error(
                "At least one of name or relationshipType must be provided.",
            ));
        }

        let mut relationships = self.relationships.write().await;
        let Some(index) = relationships.iter().position(|r| r.id == id) else {
            return Ok(not_found(id));
        };
        let owner = relationships[index].owner.clone();

        if let Some(name) = name {
            if let Some(refusal) = check_name(name) {
                return Ok(refusal);
            }
            if name != relationships[index].name
                && relationships.iter().any(|r| r.owner == owner && r.name == name)
            {
                return Ok(duplicate(name, &owner));
            }
        }
        if let Some(refusal) = relationship_type.and_then(check_type) {
            return Ok(refusal);
        }

        let doc = &mut relationships[index];
        if let Some(name) = name {
            doc.name = name.to_string();
        }
        if let Some(relationship_type) = relationship_type {
            doc.relationship_type = relationship_type.to_string();
        }
        Ok(Outcome::field("relationship", id))
    }

    async fn delete(&self, input: &Fields) -> Result<Outcome, ConceptError> {
        let id = require_str(input, "deleteRelationship", "relationship")?;
        if remove_by_id(&mut *self.relationships.write().await, id) {
            Ok(Outcome::empty())
        } else {
            Ok(not_found(id))
        }
    }
}

impl Default for RelationshipConcept {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Concept for RelationshipConcept {
    fn name(&self) -> &str {
        "Relationship"
    }

    fn actions(&self) -> &[&'static str] {
        &["createRelationship", "updateRelationship", "deleteRelationship"]
    }

    fn queries(&self) -> &[&'static str] {
        &["_getRelationship", "_getRelationships", "_getRelationshipByName"]
    }

    async fn perform(&self, action: &str, input: &Fields) -> Result<Outcome, ConceptError> {
        match action {
            "createRelationship" => self.create(input).await,
            "updateRelationship" => self.update(input).await,
            "deleteRelationship" => self.delete(input).await,
            other => Err(ConceptError::UnknownOperation {
                concept: self.name().to_string(),
                operation: other.to_string(),
            }),
        }
    }

    async fn query(&self, query: &str, input: &Fields) -> Result<Value, ConceptError> {
        match query {
            "_getRelationship" => {
                let id = require_str(input, query, "relationship")?;
                Ok(self
                    .relationships
                    .get(id)
                    .await
                    .map(|r| {
                        json!({
                            "owner": r.owner,
                            "name": r.name,
                            "relationshipType": r.relationship_type,
                        })
                    })
                    .unwrap_or(Value::Null))
            }
            "_getRelationships" => {
                let owner = require_str(input, query, "owner")?;
                let found = self.relationships.find(|r| r.owner == owner).await;
                Ok(Value::Array(
                    found
                        .into_iter()
                        .map(|r| {
                            json!({
                                "relationship": r.id,
                                "name": r.name,
                                "relationshipType": r.relationship_type,
                            })
                        })
                        .collect(),
                ))
            }
            "_getRelationshipByName" => {
                let owner = require_str(input, query, "owner")?;
                let name = require_str(input, query, "name")?;
                if name.trim().is_empty() {
                    return Ok(Value::Null);
                }
                Ok(self
                    .relationships
                    .find_one(|r| r.owner == owner && r.name == name)
                    .await
                    .map(|r| json!({ "relationship": r.id, "relationshipType": r.relationship_type }))
                    .unwrap_or(Value::Null))
            }
            other => Err(ConceptError::UnknownOperation {
                concept: self.name().to_string(),
                operation: other.to_string(),
            }),
        }
    }
}
