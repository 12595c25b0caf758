//! The concept route: `POST {base_url}/{Concept}/{op}`.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use concord_core::{ConceptError, Fields, OperationKind, Outcome, Value};
use concord_engine::{CancelFlag, EngineError, Resolution, Seed};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::SharedState;

/// Body returned for every engine fault.
pub const INTERNAL_ERROR: &str = "An internal server error occurred.";

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// 400 when the body is a refusal, 200 otherwise.
fn fields_response(fields: Fields) -> Response {
    let status = if fields.contains_key("error") {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    (status, Json(Value::Object(fields))).into_response()
}

/// Parse a request body. Empty means `{}`; anything but an object is refused.
fn parse_body(bytes: &[u8]) -> Result<Fields, Response> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Fields::new());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(error_response(
            StatusCode::BAD_REQUEST,
            "Request body must be a JSON object.",
        )),
        Err(e) => Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid JSON body: {e}"),
        )),
    }
}

pub async fn concept_handler(
    State(state): State<SharedState>,
    Path((concept, operation)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let body = match parse_body(&body) {
        Ok(fields) => fields,
        Err(response) => return response,
    };
    let route = format!("/{concept}/{operation}");

    if state.passthrough().is_included(&route) {
        debug!(%route, "Passthrough");
        return passthrough(&state, &concept, &operation, body).await;
    }
    through_engine(&state, &route, body).await
}

/// Call the concept directly, then let syncs react to the action.
async fn passthrough(state: &SharedState, concept: &str, operation: &str, input: Fields) -> Response {
    let concepts = state.engine.concepts();
    match OperationKind::of(operation) {
        OperationKind::Query => match concepts.query(concept, operation, &input).await {
            Ok(value) => (StatusCode::OK, Json(value)).into_response(),
            Err(e) => concept_error(e),
        },
        OperationKind::Action => {
            let outcome = match concepts.perform(concept, operation, &input).await {
                Ok(outcome) => outcome,
                Err(e) => return concept_error(e),
            };
            let fields = outcome.clone().into_fields();
            if !outcome.is_error() {
                cascade(state, concept, operation, input, outcome).await;
            }
            fields_response(fields)
        }
    }
}

/// Run the syncs that follow a passthrough action. Their failure does not
/// change the action's own response.
async fn cascade(state: &SharedState, concept: &str, operation: &str, input: Fields, outcome: Outcome) {
    let seed = Seed::action(concept, operation, input, outcome);
    match state.engine.resolve(seed).await {
        Ok(resolution) => {
            debug!(concept, operation, rounds = resolution.rounds(), "Cascade finished");
        }
        Err(e) => error!(concept, operation, error = %e, "Cascade failed"),
    }
}

fn concept_error(e: ConceptError) -> Response {
    match e {
        ConceptError::UnknownConcept(_) | ConceptError::UnknownOperation { .. } => {
            error_response(StatusCode::NOT_FOUND, e.to_string())
        }
        ConceptError::InvalidInput { .. } => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        ConceptError::Store(_) => {
            error!(error = %e, "Concept store failure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
        }
    }
}

/// Resolve a request through the sync registry, bounded by the request
/// timeout. On expiry the engine stops after its in-flight round.
async fn through_engine(state: &SharedState, route: &str, body: Fields) -> Response {
    let engine = state.engine.clone();
    let timeout = state.config.engine.request_timeout();
    let cancel = CancelFlag::new();
    let seed = Seed::request(route, body);

    let flag = cancel.clone();
    let mut task = tokio::spawn(async move { engine.resolve_with_cancel(seed, &flag).await });

    match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(result)) => resolution_response(route, result),
        Ok(Err(join)) => {
            error!(%route, error = %join, "Resolution task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
        }
        Err(_) => {
            cancel.cancel();
            warn!(%route, timeout_ms = timeout.as_millis() as u64, "Request timed out");
            error_response(StatusCode::GATEWAY_TIMEOUT, INTERNAL_ERROR)
        }
    }
}

fn resolution_response(route: &str, result: Result<Resolution, EngineError>) -> Response {
    let resolution = match result {
        Ok(resolution) => resolution,
        Err(EngineError::Timeout { limit_ms }) => {
            warn!(%route, limit_ms, "Request timed out");
            return error_response(StatusCode::GATEWAY_TIMEOUT, INTERNAL_ERROR);
        }
        Err(e) => {
            error!(%route, error = %e, "Request failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR);
        }
    };
    match resolution.response() {
        Ok(fields) => {
            debug!(
                %route,
                request = resolution.request_id().unwrap_or_default(),
                rounds = resolution.rounds(),
                "Responded"
            );
            fields_response(fields)
        }
        Err(e) => {
            error!(%route, error = %e, records = resolution.log().len(), "No single response");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GatewayState, build_router};
    use async_trait::async_trait;
    use axum::Router;
    use axum::body::Body;
    use axum::http::Request;
    use concord_config::AppConfig;
    use concord_core::{Concept, ConceptRegistry};
    use concord_engine::{Pattern, SyncBuilder, SyncEngine, SyncRegistry};
    use http_body_util::BodyExt;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let state = GatewayState::from_config(AppConfig::default()).unwrap();
        build_router(Arc::new(state))
    }

    async fn post(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn register_passes_through_and_cascades() {
        let app = app();
        let (status, body) = post(
            &app,
            "/api/UserAuth/register",
            json!({"username": "ada", "password": "pw"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let user = body["user"].as_str().unwrap().to_string();

        let (status, body) = post(&app, "/api/Profile/_getProfile", json!({"user": user})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["profile"]["name"], "");
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_bad_request() {
        let app = app();
        let creds = json!({"username": "ada", "password": "pw"});
        post(&app, "/api/UserAuth/register", creds.clone()).await;
        let (status, body) = post(&app, "/api/UserAuth/register", creds).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "User with username ada already exists.");
    }

    #[tokio::test]
    async fn login_goes_through_the_engine() {
        let app = app();
        let creds = json!({"username": "ada", "password": "pw"});
        let (_, registered) = post(&app, "/api/UserAuth/register", creds.clone()).await;

        let (status, body) = post(&app, "/api/UserAuth/login", creds).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"], registered["user"]);
        assert!(body["session"].is_string());
        assert!(body.get("request").is_none());
    }

    #[tokio::test]
    async fn invalid_session_is_a_bad_request() {
        let app = app();
        let (status, body) = post(
            &app,
            "/api/Relationship/_getRelationships",
            json!({"session": "nope"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid session.");
    }

    #[tokio::test]
    async fn unanswered_route_is_an_internal_error() {
        let app = app();
        let (status, body) = post(&app, "/api/Nothing/here", json!({})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn empty_body_counts_as_empty_object() {
        let app = app();
        let req = Request::builder()
            .method("POST")
            .uri("/api/UserAuth/register")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].as_str().unwrap().contains("missing field 'username'"));
    }

    #[tokio::test]
    async fn non_object_body_is_refused() {
        let app = app();
        let (status, body) = post(&app, "/api/UserAuth/login", json!([1, 2])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Request body must be a JSON object.");
    }

    struct Slow;

    #[async_trait]
    impl Concept for Slow {
        fn name(&self) -> &str {
            "Slow"
        }
        fn actions(&self) -> &[&'static str] {
            &["wait"]
        }
        fn queries(&self) -> &[&'static str] {
            &[]
        }
        async fn perform(&self, _action: &str, _input: &Fields) -> Result<Outcome, ConceptError> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(Outcome::empty())
        }
        async fn query(&self, query: &str, _input: &Fields) -> Result<Value, ConceptError> {
            Err(ConceptError::UnknownOperation {
                concept: "Slow".into(),
                operation: query.into(),
            })
        }
    }

    #[tokio::test]
    async fn slow_request_times_out() {
        let concepts = ConceptRegistry::new()
            .with(Box::new(concord_concepts::RequestingConcept::new()))
            .with(Box::new(Slow));
        let mut b = SyncBuilder::new("WaitRequest");
        let req = b.var("request");
        b.when(
            Pattern::new("Requesting", "request")
                .input("path", "/Slow/wait")
                .output("request", req),
        )
        .then(Pattern::new("Slow", "wait"));
        let syncs = SyncRegistry::new(vec![b.build().unwrap()]).unwrap();

        let mut config = AppConfig::default();
        config.engine.request_timeout_ms = 50;
        let engine =
            SyncEngine::new(syncs, Arc::new(concepts), crate::engine_limits(&config)).unwrap();
        let app = build_router(Arc::new(GatewayState::new(engine, config)));

        let (status, body) = post(&app, "/api/Slow/wait", json!({})).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"], INTERNAL_ERROR);
    }
}
