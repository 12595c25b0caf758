//! # Concord Gateway
//!
//! Axum-based HTTP binding for the sync engine.
//!
//! Every concept operation is reachable as `POST {base_url}/{Concept}/{op}`.
//! Routes listed as passthrough inclusions call the concept directly; every
//! other route seeds a `Requesting.request` record and is answered by
//! whichever sync dispatches `Requesting.respond`.

pub mod api;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use concord_config::{AppConfig, PassthroughConfig};
use concord_core::ConceptRegistry;
use concord_engine::engine::REQUESTING;
use concord_engine::{EngineLimits, SyncEngine};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

/// Shared state handed to every handler.
pub struct GatewayState {
    pub engine: SyncEngine,
    pub config: AppConfig,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(engine: SyncEngine, config: AppConfig) -> Self {
        Self { engine, config }
    }

    /// Build the engine from the application concepts and syncs.
    pub fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let concepts = Arc::new(concord_concepts::default_concepts());
        let syncs = concord_syncs::registry()?;
        let engine = SyncEngine::new(syncs, concepts, engine_limits(&config))?;
        Ok(Self::new(engine, config))
    }

    pub fn passthrough(&self) -> &PassthroughConfig {
        &self.config.passthrough
    }
}

/// Engine limits from the `[engine]` config section.
pub fn engine_limits(config: &AppConfig) -> EngineLimits {
    EngineLimits {
        max_rounds: config.engine.max_rounds,
        max_log_len: config.engine.max_log_len,
        request_timeout: config.engine.request_timeout(),
    }
}

/// Concept routes that are neither included nor excluded.
///
/// `Requesting` is the gateway's own concept and never exposed as a route.
pub fn unverified_routes(concepts: &ConceptRegistry, passthrough: &PassthroughConfig) -> Vec<String> {
    concepts
        .operations()
        .into_iter()
        .filter(|(concept, _)| concept != REQUESTING)
        .map(|(concept, operation)| format!("/{concept}/{operation}"))
        .filter(|route| !passthrough.is_included(route) && !passthrough.is_excluded(route))
        .collect()
}

/// The path template concept routes are mounted on.
fn concept_route(base_url: &str) -> String {
    format!("{}/{{concept}}/{{operation}}", base_url.trim_end_matches('/'))
}

/// Build the router: health check plus the concept route, with tracing.
pub fn build_router(state: SharedState) -> Router {
    let route = concept_route(&state.config.gateway.base_url);
    Router::new()
        .route("/health", get(health_handler))
        .route(&route, post(api::concept_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the router with the body limit and CORS layers applied.
pub fn build_full_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.gateway.cors_origins);
    build_router(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(%origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.bind_addr();
    let state = GatewayState::from_config(config)?;

    for (route, reason) in &state.passthrough().inclusions {
        info!(%route, %reason, "Passthrough route");
    }
    for route in unverified_routes(state.engine.concepts(), state.passthrough()) {
        warn!(%route, "Unverified route: neither included nor excluded from passthrough");
    }
    info!(
        syncs = state.engine.syncs().len(),
        concepts = state.engine.concepts().len(),
        base_url = %state.config.gateway.base_url,
        "Sync engine ready"
    );

    let app = build_full_router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway starting...");
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        Arc::new(GatewayState::from_config(AppConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state());

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
    }

    #[test]
    fn default_policy_covers_every_route() {
        let state = test_state();
        let unverified = unverified_routes(state.engine.concepts(), state.passthrough());
        assert!(unverified.is_empty(), "{unverified:?}");
    }

    #[test]
    fn routes_missing_from_both_lists_are_unverified() {
        let state = test_state();
        let mut passthrough = state.passthrough().clone();
        passthrough.exclusions.retain(|r| r != "/Notes/_getNotes");
        let unverified = unverified_routes(state.engine.concepts(), &passthrough);
        assert_eq!(unverified, vec!["/Notes/_getNotes".to_string()]);
    }

    #[test]
    fn concept_route_ignores_trailing_slash() {
        assert_eq!(concept_route("/api/"), "/api/{concept}/{operation}");
        assert_eq!(concept_route("/"), "/{concept}/{operation}");
    }

    #[tokio::test]
    async fn cors_preflight_is_answered() {
        let app = build_full_router(test_state());

        let req = Request::builder()
            .method("OPTIONS")
            .uri("/api/UserAuth/login")
            .header("origin", "http://localhost:5173")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert!(response.status().is_success());
        assert!(
            response
                .headers()
                .contains_key("access-control-allow-origin")
        );
    }
}
