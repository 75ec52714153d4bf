//! Axum route handlers for the Recommendation API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::errors::AppError;
use crate::models::{Category, UserProfile};
use crate::recommendation::{self, OccupationMatch, Recommendations};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    pub user_profile: UserProfile,
    pub top_k: Option<usize>,
    pub dataset_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub matches: Vec<OccupationMatch>,
    /// "combined" for multi-category analysis, else the analyzed category.
    pub category: String,
    pub methodology: String,
    pub total_occupations_analyzed: usize,
    pub categories_used: Vec<Category>,
    pub calibration_generation: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/career-recommendation/analyze-multi
///
/// Importance-weighted aggregation over every category the user rated.
pub async fn handle_analyze_multi(
    State(state): State<AppState>,
    Json(request): Json<RecommendationRequest>,
) -> Result<Json<RecommendationResponse>, AppError> {
    if request.user_profile.is_empty() {
        return Err(AppError::Validation(
            "user_profile must contain at least one rating".to_string(),
        ));
    }

    let dataset = request
        .dataset_name
        .unwrap_or_else(|| state.config.default_dataset.clone());
    let corpus = state.corpus.load(&dataset).await?;
    let snapshot = state.calibration.snapshot().await;
    let top_k = request.top_k.unwrap_or(state.config.recommendation_top_k);
    let options = state.config.scoring_options();
    let generation = snapshot.generation;
    let user = request.user_profile;

    let result: Recommendations = tokio::task::spawn_blocking(move || {
        recommendation::recommend(
            &corpus,
            &snapshot,
            &user,
            top_k,
            options,
            &CancellationToken::new(),
        )
    })
    .await
    .map_err(|e| anyhow::anyhow!("recommendation task failed: {e}"))??;

    Ok(Json(RecommendationResponse {
        methodology: format!(
            "Importance-weighted multi-category aggregation using {} assessment types",
            result.categories_used.len()
        ),
        category: "combined".to_string(),
        matches: result.matches,
        total_occupations_analyzed: result.total_occupations_analyzed,
        categories_used: result.categories_used,
        calibration_generation: generation,
    }))
}

/// POST /api/v1/career-recommendation/analyze
///
/// Single-category correlation on the category with the most ratings.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<RecommendationRequest>,
) -> Result<Json<RecommendationResponse>, AppError> {
    if request.user_profile.is_empty() {
        return Err(AppError::Validation("Insufficient assessment data".to_string()));
    }

    let dataset = request
        .dataset_name
        .unwrap_or_else(|| state.config.default_dataset.clone());
    let corpus = state.corpus.load(&dataset).await?;
    let snapshot = state.calibration.snapshot().await;
    let top_k = request.top_k.unwrap_or(state.config.recommendation_top_k);
    let options = state.config.scoring_options();
    let generation = snapshot.generation;
    let user = request.user_profile;

    let (category, result) = tokio::task::spawn_blocking(move || {
        recommendation::analyze_single(
            &corpus,
            &snapshot,
            &user,
            top_k,
            options,
            &CancellationToken::new(),
        )
    })
    .await
    .map_err(|e| anyhow::anyhow!("recommendation task failed: {e}"))??;

    Ok(Json(RecommendationResponse {
        matches: result.matches,
        category: category.to_string(),
        methodology: "Single category correlation".to_string(),
        total_occupations_analyzed: result.total_occupations_analyzed,
        categories_used: result.categories_used,
        calibration_generation: generation,
    }))
}
