//! HTTP surface of the gateway.

use crate::audit::AuditEvent;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gateway_core::config::AppConfig;
use gateway_core::models::{ChatCompletionRequest, ChatCompletionResponse, ErrorBody};
use gateway_core::pipeline::{self, GatewayServices};
use gateway_core::vault::PiiVault;
use gateway_core::GatewayError;
use providers::ChatMessage;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Clone)]
pub struct AppState {
    pub services: GatewayServices,
}

pub fn router(services: GatewayServices) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat/completions", post(chat_completions))
        .with_state(AppState { services })
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

pub enum ApiError {
    Gateway(GatewayError),
    /// The request body could not be read as a chat completion request.
    Body(JsonRejection),
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError::Gateway(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::Gateway(err) => err,
            ApiError::Body(rejection) => {
                let detail = rejection.body_text();
                return (rejection.status(), Json(ErrorBody { detail })).into_response();
            }
        };
        let (status, detail) = match &err {
            GatewayError::NoMessages => (StatusCode::BAD_REQUEST, err.to_string()),
            GatewayError::MaliciousPrompt => (StatusCode::FORBIDDEN, err.to_string()),
            GatewayError::Upstream(err) => {
                error!(error = %err, "upstream call failed");
                (StatusCode::BAD_GATEWAY, format!("Upstream model error: {}", err))
            }
            GatewayError::Vault(err) => {
                error!(error = %format!("{:#}", err), "vault failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal vault error.".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

fn session_from(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

async fn chat_completions(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let started = tokio::time::Instant::now();
    let services = &state.services;
    let request_id = uuid::Uuid::new_v4().to_string();
    let session_id = session_from(&headers);
    let client_ip = connect
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    AuditEvent::new("request_received", &request_id, &session_id)
        .with("client_ip", client_ip)
        .with("model", request.model.as_str())
        .emit();

    let Some(last) = request.messages.last() else {
        return Err(GatewayError::NoMessages.into());
    };

    let verdict = services.scanner.scan(&last.content).await;
    if !verdict.is_safe() {
        AuditEvent::new("security_alert", &request_id, &session_id)
            .with("action", "blocked")
            .with("reason", verdict.reason())
            .emit();
        return Err(GatewayError::MaliciousPrompt.into());
    }
    AuditEvent::new("security_scan", &request_id, &session_id)
        .with("status", "passed")
        .emit();

    // earlier assistant turns carry restored PII, so every message is sanitized
    let mut sanitized = Vec::with_capacity(request.messages.len());
    let mut redactions = 0;
    for msg in &request.messages {
        let anon = services
            .vault
            .anonymize(&msg.content, &session_id)
            .await
            .map_err(GatewayError::vault)?;
        redactions += anon.redactions;
        sanitized.push(ChatMessage {
            role: msg.role.clone(),
            content: anon.text,
        });
    }
    AuditEvent::new("pii_redaction", &request_id, &session_id)
        .with(
            "status",
            if redactions > 0 { "redacted" } else { "no_pii_detected" },
        )
        .with("redactions", redactions)
        .emit();

    let model = services
        .model_override
        .clone()
        .unwrap_or_else(|| request.model.clone());
    let reply = services
        .llm
        .chat(&model, &sanitized)
        .await
        .map_err(GatewayError::from)?;

    let content = services
        .vault
        .deanonymize(&reply, &session_id)
        .await
        .map_err(GatewayError::vault)?;

    AuditEvent::new("response_sent", &request_id, &session_id)
        .with("status", "success")
        .with("latency_ms", started.elapsed().as_millis() as u64)
        .emit();

    let body = ChatCompletionResponse::single(
        &request_id,
        &request.model,
        chrono::Utc::now().timestamp(),
        content,
    );
    let mut response = Json(body).into_response();
    if let Ok(value) = HeaderValue::from_str(&session_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(SESSION_HEADER), value);
    }
    Ok(response)
}

/// Periodically drops expired vault mappings.
pub fn spawn_purge_task(vault: Arc<PiiVault>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match vault.purge_expired().await {
                Ok(0) => {}
                Ok(n) => info!(purged = n, "expired vault entries removed"),
                Err(err) => warn!(error = %err, "vault purge failed"),
            }
        }
    })
}

pub fn bind_addr(config: &AppConfig) -> anyhow::Result<SocketAddr> {
    let raw = format!("{}:{}", config.server.host, config.server.port);
    raw.parse()
        .map_err(|e| anyhow::anyhow!("invalid listen address {}: {}", raw, e))
}

/// Builds every service, then binds. Nothing listens unless start-up succeeded.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let addr = bind_addr(&config)?;
    let services = pipeline::build_services(&config).await?;
    info!("Security Gateway is ready.");

    if config.server.purge_interval_secs > 0 {
        spawn_purge_task(
            services.vault.clone(),
            Duration::from_secs(config.server.purge_interval_secs),
        );
    }

    let app = router(services);
    info!(%addr, "listening");
    axum::Server::try_bind(&addr)?
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
    }
}
