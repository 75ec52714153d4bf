pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::calibration::handlers as calibration;
use crate::recommendation::handlers as recommendation;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Recommendation API
        .route(
            "/api/v1/career-recommendation/analyze-multi",
            post(recommendation::handle_analyze_multi),
        )
        .route(
            "/api/v1/career-recommendation/analyze",
            post(recommendation::handle_analyze),
        )
        // Calibration API
        .route(
            "/api/v1/career-recommendation/calibration",
            get(calibration::handle_get_calibration),
        )
        .route(
            "/api/v1/career-recommendation/calibrate",
            post(calibration::handle_calibrate),
        )
        .route(
            "/api/v1/career-recommendation/optimize-weights",
            post(calibration::handle_optimize_weights),
        )
        .route(
            "/api/v1/career-recommendation/calibrate-scores",
            post(calibration::handle_calibrate_scores),
        )
        .with_state(state)
}
