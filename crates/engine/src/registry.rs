//! The sync registry: the complete, immutable set of rules.
//!
//! Built once at process start and shared read-only by every request.

use std::collections::HashSet;
use std::sync::Arc;

use concord_core::ConceptRegistry;
use serde::Serialize;

use crate::error::RegistryError;
use crate::sync::Synchronization;

/// Listing entry for one sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub name: String,
    pub when: Vec<String>,
    pub guarded: bool,
    pub then: Vec<String>,
}

/// Immutable table of synchronizations, in declaration order.
#[derive(Debug, Clone)]
pub struct SyncRegistry {
    syncs: Arc<[Synchronization]>,
}

impl SyncRegistry {
    /// Build a registry. Sync names must be unique.
    pub fn new(syncs: Vec<Synchronization>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for sync in &syncs {
            if !seen.insert(sync.name().to_string()) {
                return Err(RegistryError::DuplicateName(sync.name().to_string()));
            }
        }
        Ok(Self {
            syncs: syncs.into(),
        })
    }

    /// Check that every pattern names a registered concept operation.
    pub fn validate_against(&self, concepts: &ConceptRegistry) -> Result<(), RegistryError> {
        for sync in self.syncs.iter() {
            for pattern in sync.when().iter().chain(sync.then()) {
                let Some(concept) = concepts.get(pattern.concept()) else {
                    return Err(RegistryError::UnknownConcept {
                        sync: sync.name().to_string(),
                        concept: pattern.concept().to_string(),
                    });
                };
                if !concept.supports(pattern.action()) {
                    return Err(RegistryError::UnknownOperation {
                        sync: sync.name().to_string(),
                        concept: pattern.concept().to_string(),
                        operation: pattern.action().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Synchronization> {
        self.syncs.iter()
    }

    pub fn len(&self) -> usize {
        self.syncs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.syncs.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Synchronization> {
        self.syncs.iter().find(|s| s.name() == name)
    }

    /// Human-readable listing of every sync.
    pub fn summaries(&self) -> Vec<SyncSummary> {
        self.syncs
            .iter()
            .map(|sync| SyncSummary {
                name: sync.name().to_string(),
                when: sync
                    .when()
                    .iter()
                    .map(|p| p.describe(sync.var_names()))
                    .collect(),
                guarded: sync.has_where(),
                then: sync
                    .then()
                    .iter()
                    .map(|p| p.describe(sync.var_names()))
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Pattern;
    use crate::sync::SyncBuilder;
    use crate::test_support::{Scripted, registry, requesting};

    fn echo(name: &str, concept: &str, action: &str) -> Synchronization {
        let mut b = SyncBuilder::new(name);
        let req = b.var("request");
        b.when(Pattern::new("Requesting", "request").output("request", req))
            .then(Pattern::new(concept, action).input("request", req));
        b.build().unwrap()
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = SyncRegistry::new(vec![
            echo("Same", "Requesting", "respond"),
            echo("Same", "Requesting", "respond"),
        ])
        .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateName("Same".into()));
    }

    #[test]
    fn validates_operations_against_concepts() {
        let concepts = registry(vec![requesting(), Scripted::new("X", &["create"], &[])]);

        let ok = SyncRegistry::new(vec![echo("Ok", "X", "create")]).unwrap();
        assert!(ok.validate_against(&concepts).is_ok());

        let bad_concept = SyncRegistry::new(vec![echo("Bad", "Y", "create")]).unwrap();
        assert!(matches!(
            bad_concept.validate_against(&concepts),
            Err(RegistryError::UnknownConcept { .. })
        ));

        let bad_action = SyncRegistry::new(vec![echo("Bad", "X", "explode")]).unwrap();
        assert!(matches!(
            bad_action.validate_against(&concepts),
            Err(RegistryError::UnknownOperation { .. })
        ));
    }

    #[test]
    fn summaries_follow_declaration_order() {
        let registry = SyncRegistry::new(vec![
            echo("First", "X", "create"),
            echo("Second", "X", "create"),
        ])
        .unwrap();
        let names: Vec<_> = registry.summaries().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["First", "Second"]);
        assert!(registry.get("Second").is_some());
        assert_eq!(
            registry.summaries()[0].then,
            vec!["X.create { request: ?request }".to_string()]
        );
    }
}
