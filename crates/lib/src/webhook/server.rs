//! Webhook HTTP server.

use crate::config::{Config, Settings};
use crate::device::{DeviceGateway, IotHubGateway};
use crate::dispatch::{DispatchError, DispatchOutcome, IntentDispatcher};
use crate::voice::{QueryError, VoiceQuery};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;

/// Route the voice platform posts fulfillment queries to.
pub const FULFILLMENT_PATH: &str = "/api/fulfillment";

/// Header carrying the function key (alternative: `?code=` query parameter).
const KEY_HEADER: &str = "x-functions-key";

/// Shared state for the webhook (dispatcher, required key).
#[derive(Clone)]
pub struct WebhookState {
    pub dispatcher: IntentDispatcher,
    /// When Some, fulfillment requests must present this key.
    pub webhook_key: Option<Arc<str>>,
    pub port: u16,
}

/// Request failures, each with its own status code.
#[derive(Debug)]
enum WebhookError {
    Unauthorized,
    Malformed(QueryError),
    Unhandled(String),
    Dispatch(DispatchError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            WebhookError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "missing or invalid webhook key".to_string())
            }
            WebhookError::Malformed(e) => {
                log::debug!("rejecting malformed request: {}", e);
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            WebhookError::Unhandled(name) => (
                StatusCode::NOT_FOUND,
                format!("Intent {} is not handled!", name),
            ),
            WebhookError::Dispatch(e) => {
                log::warn!("fulfillment failed: {}", e);
                match e {
                    DispatchError::DeviceNotFound(_) | DispatchError::DeviceNotConnected(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "device unavailable".to_string())
                    }
                    DispatchError::Transport(_) => {
                        (StatusCode::BAD_GATEWAY, "device gateway error".to_string())
                    }
                }
            }
        };
        (status, body).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct KeyParams {
    code: Option<String>,
}

/// Build the webhook router (health + fulfillment).
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route(FULFILLMENT_PATH, post(fulfill))
        .with_state(state)
}

/// Validate config, connect the registry gateway, and serve until SIGINT/SIGTERM.
/// Misconfiguration fails here, before the listener is bound.
pub async fn run_webhook(config: Config) -> Result<()> {
    let settings = Settings::resolve(&config).context("invalid configuration")?;
    let gateway = IotHubGateway::new(settings.hub.clone(), settings.hub_options.clone());
    log::info!(
        "device {} via registry {}",
        settings.device_id,
        gateway.host_name()
    );
    run_webhook_with(settings, Arc::new(gateway)).await
}

/// Serve with an explicit gateway.
pub async fn run_webhook_with(settings: Settings, gateway: Arc<dyn DeviceGateway>) -> Result<()> {
    let state = WebhookState {
        dispatcher: IntentDispatcher::new(settings.device_id.clone(), gateway),
        webhook_key: settings.webhook_key.as_deref().map(Arc::from),
        port: settings.port,
    };
    if state.webhook_key.is_none() {
        log::info!("webhook auth disabled (loopback bind)");
    }
    let app = router(state);

    let bind_addr = format!("{}:{}", settings.bind, settings.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("webhook listening on {}{}", bind_addr, FULFILLMENT_PATH);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("webhook server exited")?;
    log::info!("webhook stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// True when no key is required, or the request carries it in the header or `?code=`.
fn authorized(state: &WebhookState, headers: &HeaderMap, params: &KeyParams) -> bool {
    let Some(ref expected) = state.webhook_key else {
        return true;
    };
    let provided = headers
        .get(KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or(params.code.as_deref())
        .unwrap_or("");
    keys_match(provided, expected)
}

/// Compare HMAC tags of both keys (keyed by the expected key) in constant time,
/// so neither the length nor the first differing byte of `provided` shows in timing.
fn keys_match(provided: &str, expected: &str) -> bool {
    let tag = |value: &str| {
        Hmac::<Sha256>::new_from_slice(expected.as_bytes()).map(|mut mac| {
            mac.update(value.as_bytes());
            mac
        })
    };
    let (Ok(expected_mac), Ok(provided_mac)) = (tag(expected), tag(provided)) else {
        return false;
    };
    let expected_tag = expected_mac.finalize().into_bytes();
    provided_mac.verify_slice(&expected_tag).is_ok()
}

/// POST /api/fulfillment: parse the query, dispatch it, answer with the prompt.
async fn fulfill(
    State(state): State<WebhookState>,
    Query(params): Query<KeyParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WebhookError> {
    if !authorized(&state, &headers, &params) {
        return Err(WebhookError::Unauthorized);
    }
    let query = VoiceQuery::from_slice(&body).map_err(WebhookError::Malformed)?;
    match state
        .dispatcher
        .dispatch(&query)
        .await
        .map_err(WebhookError::Dispatch)?
    {
        DispatchOutcome::Handled(response) => Ok(Json(response).into_response()),
        DispatchOutcome::Unhandled(name) => Err(WebhookError::Unhandled(name)),
    }
}

/// GET / returns a simple health JSON (for liveness checks).
async fn health_http(State(state): State<WebhookState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.port,
    }))
}
