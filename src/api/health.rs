use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::api::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub gateway_configured: bool,
    pub supported_methods: Vec<String>,
}

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let version = env!("CARGO_PKG_VERSION").to_string();

    let response = HealthResponse {
        status: "healthy".to_string(),
        version,
        environment: state.config.server.environment.clone(),
        gateway_configured: state.config.paynow.is_configured(),
        supported_methods: state
            .config
            .merchant
            .supported_methods
            .iter()
            .map(|m| m.to_string())
            .collect(),
    };

    Ok(Json(response))
}
