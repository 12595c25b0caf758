//! Scripted concepts for engine unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use concord_core::{Concept, ConceptError, ConceptRegistry, Fields, Outcome, Value};

pub(crate) type Calls = Arc<Mutex<Vec<(String, Fields)>>>;

/// A concept whose action outcomes and query answers are fixed up front.
///
/// Queries are answered by the first string argument; a query with no
/// string argument uses the key `""`. Unscripted actions succeed with `{}`
/// and unscripted queries return `Null`.
pub(crate) struct Scripted {
    name: String,
    actions: Vec<&'static str>,
    queries: Vec<&'static str>,
    outcomes: HashMap<String, Outcome>,
    answers: HashMap<(String, String), Value>,
    calls: Calls,
}

impl Scripted {
    pub fn new(name: &str, actions: &[&'static str], queries: &[&'static str]) -> Self {
        Self {
            name: name.to_string(),
            actions: actions.to_vec(),
            queries: queries.to_vec(),
            outcomes: HashMap::new(),
            answers: HashMap::new(),
            calls: Calls::default(),
        }
    }

    pub fn outcome(mut self, action: &str, outcome: Outcome) -> Self {
        self.outcomes.insert(action.to_string(), outcome);
        self
    }

    pub fn answer(mut self, query: &str, key: &str, value: Value) -> Self {
        self.answers.insert((query.to_string(), key.to_string()), value);
        self
    }

    pub fn calls(&self) -> Calls {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Concept for Scripted {
    fn name(&self) -> &str {
        &self.name
    }

    fn actions(&self) -> &[&'static str] {
        &self.actions
    }

    fn queries(&self) -> &[&'static str] {
        &self.queries
    }

    async fn perform(&self, action: &str, input: &Fields) -> Result<Outcome, ConceptError> {
        self.calls
            .lock()
            .unwrap()
            .push((action.to_string(), input.clone()));
        Ok(self
            .outcomes
            .get(action)
            .cloned()
            .unwrap_or_else(Outcome::empty))
    }

    async fn query(&self, query: &str, input: &Fields) -> Result<Value, ConceptError> {
        let key = input
            .values()
            .find_map(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(self
            .answers
            .get(&(query.to_string(), key))
            .cloned()
            .unwrap_or(Value::Null))
    }
}

pub(crate) fn requesting() -> Scripted {
    Scripted::new("Requesting", &["request", "respond"], &[])
}

pub(crate) fn registry(concepts: Vec<Scripted>) -> ConceptRegistry {
    concepts
        .into_iter()
        .fold(ConceptRegistry::new(), |registry, concept| {
            registry.with(Box::new(concept))
        })
}
