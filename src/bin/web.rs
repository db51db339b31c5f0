//! Hive Web API
//!
//! 启动: cargo run --bin hive-web --features web
//! POST /api/prompt {"prompt": "..."} -> {"response": "..."}

#![cfg(feature = "web")]

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use hive::config::load_config;
use hive::{EngineError, ExchangeAgent};

#[derive(Deserialize)]
struct PromptRequest {
    prompt: String,
}

#[derive(Serialize)]
struct PromptResponse {
    response: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        EngineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hive::observability::init();

    let cfg = load_config(None)?;
    let agent = Arc::new(ExchangeAgent::from_config(&cfg)?);

    let app = Router::new()
        .route("/api/prompt", post(api_prompt))
        .route("/api/health", get(api_health))
        .with_state(agent);

    let port = std::env::var("HIVE_WEB_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(cfg.web.port);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Hive Web API: http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn api_prompt(
    State(agent): State<Arc<ExchangeAgent>>,
    Json(req): Json<PromptRequest>,
) -> Result<Json<PromptResponse>, (StatusCode, String)> {
    agent
        .serve(&req.prompt)
        .await
        .map(|response| Json(PromptResponse { response }))
        .map_err(|e| (status_for(&e), e.to_string()))
}

async fn api_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
