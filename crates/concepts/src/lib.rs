//! # Concord Concepts
//!
//! The application's concepts. Each one owns its state in an in-memory
//! [`store::Collection`] and knows nothing about the others; they are
//! composed only through synchronizations.

pub mod notes;
pub mod profile;
pub mod relationship;
pub mod requesting;
pub mod sessioning;
pub mod store;
pub mod user_auth;

pub use notes::NotesConcept;
pub use profile::ProfileConcept;
pub use relationship::RelationshipConcept;
pub use requesting::RequestingConcept;
pub use sessioning::SessioningConcept;
pub use user_auth::UserAuthConcept;

use concord_core::ConceptRegistry;

/// A registry holding a fresh instance of every concept.
pub fn default_concepts() -> ConceptRegistry {
    ConceptRegistry::new()
        .with(Box::new(RequestingConcept::new()))
        .with(Box::new(UserAuthConcept::new()))
        .with(Box::new(SessioningConcept::new()))
        .with(Box::new(ProfileConcept::new()))
        .with(Box::new(RelationshipConcept::new()))
        .with(Box::new(NotesConcept::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_concepts_registers_all() {
        let concepts = default_concepts();
        assert_eq!(
            concepts.names(),
            vec!["Notes", "Profile", "Relationship", "Requesting", "Sessioning", "UserAuth"]
        );
        assert!(concepts.has_operation("UserAuth", "register"));
        assert!(concepts.has_operation("Notes", "_getNotesByRelationship"));
        assert!(!concepts.has_operation("Profile", "rename"));
    }
}
