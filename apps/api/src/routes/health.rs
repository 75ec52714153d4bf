use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status, version and the live calibration generation.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let calibration = state.calibration.snapshot().await;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "careerfit-api",
        "default_dataset": state.config.default_dataset,
        "calibration_generation": calibration.generation
    }))
}
