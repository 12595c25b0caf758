//! An engine over the real concepts, and shortcuts for the common setup steps.

use std::sync::Arc;

use concord_concepts::default_concepts;
use concord_core::{Fields, to_fields};
use concord_engine::{EngineLimits, Seed, SyncEngine};
use serde_json::{Value, json};

pub(crate) fn engine() -> SyncEngine {
    SyncEngine::new(
        crate::registry().unwrap(),
        Arc::new(default_concepts()),
        EngineLimits::default(),
    )
    .unwrap()
}

pub(crate) fn body(value: Value) -> Fields {
    to_fields(value)
}

async fn respond(engine: &SyncEngine, path: &str, value: Value) -> Fields {
    engine
        .resolve(Seed::request(path, body(value)))
        .await
        .unwrap()
        .response()
        .unwrap()
}

fn string(fields: &Fields, key: &str) -> String {
    match fields.get(key) {
        Some(Value::String(s)) => s.clone(),
        other => panic!("expected string {key}, got {other:?} in {fields:?}"),
    }
}

/// Register a user and return its id.
pub(crate) async fn register(engine: &SyncEngine, username: &str, password: &str) -> String {
    let response = respond(
        engine,
        "/UserAuth/register",
        json!({"username": username, "password": password}),
    )
    .await;
    string(&response, "user")
}

/// Log in and return the session id.
pub(crate) async fn login(engine: &SyncEngine, username: &str, password: &str) -> String {
    let response = respond(
        engine,
        "/UserAuth/login",
        json!({"username": username, "password": password}),
    )
    .await;
    string(&response, "session")
}

pub(crate) async fn create_relationship(
    engine: &SyncEngine,
    session: &str,
    name: &str,
    kind: &str,
) -> String {
    let response = respond(
        engine,
        "/Relationship/createRelationship",
        json!({"session": session, "name": name, "relationshipType": kind}),
    )
    .await;
    string(&response, "relationship")
}
