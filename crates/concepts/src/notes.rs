//! Notes: titled notes a user keeps about one of their relationships.

use async_trait::async_trait;
use concord_core::{Concept, ConceptError, Fields, Outcome, Value, optional_str, require_str};
use serde_json::json;

use crate::store::{Collection, Document, fresh_id, remove_by_id};

#[derive(Debug, Clone)]
struct NoteDoc {
    id: String,
    owner: String,
    relationship: String,
    title: String,
    content: String,
}

impl Document for NoteDoc {
    fn id(&self) -> &str {
        &self.id
    }
}

fn duplicate(title: &str, owner: &str, relationship: &str) -> Outcome {
    Outcome::error(format!(
        "Note with title \"{title}\" already exists for owner {owner} and relationship {relationship}."
    ))
}

pub struct NotesConcept {
    notes: Collection<NoteDoc>,
}

impl NotesConcept {
    pub fn new() -> Self {
        Self {
            notes: Collection::new(),
        }
    }

    async fn create(&self, input: &Fields) -> Result<Outcome, ConceptError> {
        let op = "createNote";
        let owner = require_str(input, op, "owner")?;
        let relationship = require_str(input, op, "relationship")?;
        let title = require_str(input, op, "title")?;
        let content = require_str(input, op, "content")?;

        if title.trim().is_empty() {
            return Ok(Outcome::error("Title cannot be empty."));
        }

        let mut notes = self.notes.write().await;
        if notes
            .iter()
            .any(|n| n.owner == owner && n.relationship == relationship && n.title == title)
        {
            return Ok(duplicate(title, owner, relationship));
        }
        let note = NoteDoc {
            id: fresh_id(),
            owner: owner.to_string(),
            relationship: relationship.to_string(),
            title: title.to_string(),
            content: content.to_string(),
        };
        let id = note.id.clone();
        notes.push(note);
        tracing::debug!(note = %id, owner, "Note created");
        Ok(Outcome::field("note", id))
    }

    async fn update(&self, input: &Fields) -> Result<Outcome, ConceptError> {
        let op = "updateNote";
        let id = require_str(input, op, "note")?;
        let title = optional_str(input, op, "title")?;
        let content = optional_str(input, op, "content")?;

        // Content may be set to "" but an empty title alone is no update.
        if title.is_none_or(str::is_empty) && content.is_none() {
            return Ok(Outcome::error(
                "At least one of title or content must be provided.",
            ));
        }

        let mut notes = self.notes.write().await;
        let Some(index) = notes.iter().position(|n| n.id == id) else {
            return Ok(Outcome::error(format!("Note with ID {id} not found.")));
        };

        if let Some(title) = title {
            if title.trim().is_empty() {
                return Ok(Outcome::error("Title cannot be empty."));
            }
            let existing = &notes[index];
            if title != existing.title
                && notes.iter().any(|n| {
                    n.owner == existing.owner
                        && n.relationship == existing.relationship
                        && n.title == title
                })
            {
                return Ok(duplicate(title, &existing.owner, &existing.relationship));
            }
        }

        let note = &mut notes[index];
        if let Some(title) = title {
            note.title = title.to_string();
        }
        if let Some(content) = content {
            note.content = content.to_string();
        }
        Ok(Outcome::field("note", id))
    }

    async fn delete(&self, input: &Fields) -> Result<Outcome, ConceptError> {
        let id = require_str(input, "deleteNote", "note")?;
        if remove_by_id(&mut *self.notes.write().await, id) {
            Ok(Outcome::empty())
        } else {
            Ok(Outcome::error(format!("Note with ID {id} not found.")))
        }
    }
}

impl Default for NotesConcept {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Concept for NotesConcept {
    fn name(&self) -> &str {
        "Notes"
    }

    fn actions(&self) -> &[&'static str] {
        &["createNote", "updateNote", "deleteNote"]
    }

    fn queries(&self) -> &[&'static str] {
        &["_getNote", "_getNotes", "_getNotesByRelationship", "_getNoteByTitle"]
    }

    async fn perform(&self, action: &str, input: &Fields) -> Result<Outcome, ConceptError> {
        match action {
            "createNote" => self.create(input).await,
            "updateNote" => self.update(input).await,
            "deleteNote" => self.delete(input).await,
            other => Err(ConceptError::UnknownOperation {
                concept: self.name().to_string(),
                operation: other.to_string(),
            }),
        }
    }

    async fn query(&self, query: &str, input: &Fields) -> Result<Value, ConceptError> {
        match query {
            "_getNote" => {
                let id = require_str(input, query, "note")?;
                Ok(self
                    .notes
                    .get(id)
                    .await
                    .map(|n| {
                        json!({
                            "owner": n.owner,
                            "relationship": n.relationship,
                            "title": n.title,
                            "content": n.content,
                        })
                    })
                    .unwrap_or(Value::Null))
            }
            "_getNotes" => {
                let owner = require_str(input, query, "owner")?;
                let notes = self.notes.find(|n| n.owner == owner).await;
                Ok(notes
                    .into_iter()
                    .map(|n| {
                        json!({
                            "note": n.id,
                            "relationship": n.relationship,
                            "title": n.title,
                            "content": n.content,
                        })
                    })
                    .collect())
            }
            "_getNotesByRelationship" => {
                let owner = require_str(input, query, "owner")?;
                let relationship = require_str(input, query, "relationship")?;
                let notes = self
                    .notes
                    .find(|n| n.owner == owner && n.relationship == relationship)
                    .await;
                Ok(notes
                    .into_iter()
                    .map(|n| json!({ "note": n.id, "title": n.title, "content": n.content }))
                    .collect())
            }
            "_getNoteByTitle" => {
                let owner = require_str(input, query, "owner")?;
                let relationship = require_str(input, query, "relationship")?;
                let title = require_str(input, query, "title")?;
                Ok(self
                    .notes
                    .find_one(|n| {
                        n.owner == owner && n.relationship == relationship && n.title == title
                    })
                    .await
                    .map(|n| json!({ "note": n.id, "content": n.content }))
                    .unwrap_or(Value::Null))
            }
            other => Err(ConceptError::UnknownOperation {
                concept: self.name().to_string(),
                operation: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::to_fields;

    async fn create(notes: &NotesConcept, relationship: &str, title: &str) -> Outcome {
        notes
            .perform(
                "createNote",
                &to_fields(json!({
                    "owner": "u1",
                    "relationship": relationship,
                    "title": title,
                    "content": "likes tea",
                })),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn titles_are_unique_per_relationship() {
        let notes = NotesConcept::new();
        assert!(!create(&notes, "r1", "Gifts").await.is_error());
        assert!(!create(&notes, "r2", "Gifts").await.is_error());
        assert_eq!(
            create(&notes, "r1", "Gifts").await,
            Outcome::error("Note with title \"Gifts\" already exists for owner u1 and relationship r1.")
        );
        assert_eq!(create(&notes, "r1", " ").await, Outcome::error("Title cannot be empty."));
    }

    #[tokio::test]
    async fn listing_queries() {
        let notes = NotesConcept::new();
        create(&notes, "r1", "Gifts").await;
        create(&notes, "r1", "Birthday").await;
        create(&notes, "r2", "Food").await;

        let all = notes
            .query("_getNotes", &to_fields(json!({"owner": "u1"})))
            .await
            .unwrap();
        assert_eq!(all.as_array().unwrap().len(), 3);

        let by_rel = notes
            .query(
                "_getNotesByRelationship",
                &to_fields(json!({"owner": "u1", "relationship": "r1"})),
            )
            .await
            .unwrap();
        assert_eq!(by_rel[1]["title"], "Birthday");
        assert!(by_rel[0].get("relationship").is_none());

        let by_title = notes
            .query(
                "_getNoteByTitle",
                &to_fields(json!({"owner": "u1", "relationship": "r2", "title": "Food"})),
            )
            .await
            .unwrap();
        assert_eq!(by_title["content"], "likes tea");
    }

    #[tokio::test]
    async fn update_and_delete() {
        let notes = NotesConcept::new();
        let id = create(&notes, "r1", "Gifts").await.into_fields()["note"].clone();
        create(&notes, "r1", "Food").await;

        let update = |fields: Value| {
            let notes = &notes;
            async move { notes.perform("updateNote", &to_fields(fields)).await.unwrap() }
        };

        assert_eq!(
            update(json!({"note": id})).await,
            Outcome::error("At least one of title or content must be provided.")
        );
        assert!(update(json!({"note": id, "title": "Food"})).await.is_error());
        assert_eq!(
            update(json!({"note": id, "content": ""})).await,
            Outcome::field("note", id.clone())
        );

        let note = notes
            .query("_getNote", &to_fields(json!({"note": id})))
            .await
            .unwrap();
        assert_eq!(note["content"], "");

        let target = to_fields(json!({"note": id}));
        assert_eq!(notes.perform("deleteNote", &target).await.unwrap(), Outcome::empty());
        assert!(notes.perform("deleteNote", &target).await.unwrap().is_error());
        assert!(notes.query("_getNote", &target).await.unwrap().is_null());
    }
}
