//! Axum route handlers for the Calibration API.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::calibration::score::{self, FitParams, ScoreFitReport};
use crate::calibration::thresholds::{self, CalibrationMode, MAX_TOP_K};
use crate::calibration::validation::ValidationParams;
use crate::calibration::weights;
use crate::cancel::CancellationToken;
use crate::corpus::OccupationCorpus;
use crate::errors::{AppError, EngineError};
use crate::models::{
    CalibrationRule, CalibrationState, CalibrationWarning, CategoryWeights, ScoreCalibration,
};
use crate::state::AppState;

const DEFAULT_RULE_LIMIT: usize = 5;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CalibrationQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct CalibrationStateResponse {
    #[serde(flatten)]
    pub state: CalibrationState,
    /// False when the score calibration was fit against another configuration.
    pub consistent: bool,
    pub warnings: Vec<CalibrationWarning>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CalibrationRequest {
    pub importance_percentile: Option<f64>,
    pub level_percentile: Option<f64>,
    pub top_k: Option<usize>,
    pub dataset_name: Option<String>,
    pub importance_candidates: Option<Vec<f64>>,
    pub ratio_candidates: Option<Vec<f64>>,
    pub validation: Option<ValidationParams>,
}

#[derive(Debug, Serialize)]
pub struct CalibrationResponse {
    pub generation: u64,
    pub calibration_mode: CalibrationMode,
    pub importance_critical_threshold: f64,
    pub min_requirement_ratio: f64,
    pub rules_count: usize,
    pub sample_rules: Vec<CalibrationRule>,
    pub dimension_weights: CategoryWeights,
    pub combination_weights: CategoryWeights,
    pub score_calibration: Option<ScoreCalibration>,
    pub auc: Option<f64>,
    pub validation_pairs: Option<usize>,
    pub warnings: Vec<CalibrationWarning>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OptimizationRequest {
    pub dataset_name: Option<String>,
    pub dimension_candidates: Option<Vec<CategoryWeights>>,
    pub combination_candidates: Option<Vec<CategoryWeights>>,
    pub validation: Option<ValidationParams>,
}

#[derive(Debug, Serialize)]
pub struct OptimizationResponse {
    pub generation: u64,
    pub dimension_weights: CategoryWeights,
    pub combination_weights: CategoryWeights,
    pub auc: f64,
    pub evaluated_pairs: usize,
    pub combinations_evaluated: usize,
    pub warnings: Vec<CalibrationWarning>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScoreCalibrationRequest {
    pub dataset_name: Option<String>,
    pub learning_rate: Option<f64>,
    pub max_iter: Option<usize>,
    pub validation: Option<ValidationParams>,
}

#[derive(Debug, Serialize)]
pub struct ScoreCalibrationResponse {
    pub generation: u64,
    #[serde(flatten)]
    pub report: ScoreFitReport,
}

// ────────────────────────────────────────────────────────────────────────────
// Tuning run plumbing
// ────────────────────────────────────────────────────────────────────────────

/// Request validation params with the configured seed applied when the caller gave none.
fn validation_params(state: &AppState, requested: Option<ValidationParams>) -> ValidationParams {
    let mut params = requested.unwrap_or_default();
    if params.seed.is_none() {
        params.seed = state.config.validation_seed;
    }
    params
}

/// Loads the corpus, takes the tuning lock, runs `job` on the blocking pool
/// under the tuning timeout and commits its successor state.
async fn run_tuning<T, F>(
    state: &AppState,
    dataset_name: Option<String>,
    job: F,
) -> Result<(Arc<CalibrationState>, T), AppError>
where
    T: Send + 'static,
    F: FnOnce(&OccupationCorpus, &CalibrationState, &CancellationToken)
            -> Result<(CalibrationState, T), EngineError>
        + Send
        + 'static,
{
    let dataset = dataset_name.unwrap_or_else(|| state.config.default_dataset.clone());
    let corpus = state.corpus.load(&dataset).await?;

    let _tuning = state.calibration.lock_tuning().await;
    let base = state.calibration.snapshot().await;

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let task = tokio::task::spawn_blocking(move || job(&corpus, &base, &token));

    let timeout_secs = state.config.tuning_timeout_secs;
    let (next, report) = match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await
    {
        Ok(joined) => joined.map_err(|e| anyhow::anyhow!("tuning task failed: {e}"))??,
        Err(_) => {
            cancel.cancel();
            warn!("Tuning run on '{dataset}' exceeded {timeout_secs}s; cancelled");
            return Err(AppError::Timeout(timeout_secs));
        }
    };

    let committed = state.calibration.commit(next).await?;
    Ok((committed, report))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/career-recommendation/calibration?limit=
///
/// Current calibration state with at most `limit` sample rules (default 5, cap 500).
pub async fn handle_get_calibration(
    State(state): State<AppState>,
    Query(query): Query<CalibrationQuery>,
) -> Result<Json<CalibrationStateResponse>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_RULE_LIMIT).min(MAX_TOP_K);
    let snapshot = state.calibration.snapshot().await;

    let mut current = (*snapshot).clone();
    current.sample_rules.truncate(limit);

    Ok(Json(CalibrationStateResponse {
        consistent: snapshot.is_consistent(),
        warnings: snapshot.warnings(),
        state: current,
    }))
}

/// POST /api/v1/career-recommendation/calibrate
///
/// Percentile thresholds by default; an AUC search when any candidate list is non-empty.
pub async fn handle_calibrate(
    State(state): State<AppState>,
    Json(request): Json<CalibrationRequest>,
) -> Result<Json<CalibrationResponse>, AppError> {
    let top_k = thresholds::check_top_k(request.top_k.unwrap_or(thresholds::DEFAULT_RULES_TOP_K))?;
    let mode = CalibrationMode::resolve(
        request.importance_percentile,
        request.level_percentile,
        request.importance_candidates,
        request.ratio_candidates,
        Some(validation_params(&state, request.validation)),
    )?;
    let options = state.config.scoring_options();

    let (committed, report) =
        run_tuning(&state, request.dataset_name, move |corpus, base, cancel| {
            thresholds::calibrate(corpus, base, &mode, top_k, options, cancel)
        })
        .await?;

    Ok(Json(CalibrationResponse {
        generation: committed.generation,
        calibration_mode: report.mode,
        importance_critical_threshold: committed.importance_critical_threshold,
        min_requirement_ratio: committed.min_requirement_ratio,
        rules_count: committed.rules_count,
        sample_rules: committed.sample_rules.clone(),
        dimension_weights: committed.dimension_weights.clone(),
        combination_weights: committed.combination_weights.clone(),
        score_calibration: committed.score_calibration.clone(),
        auc: report.auc,
        validation_pairs: report.validation_pairs,
        warnings: committed.warnings(),
    }))
}

/// POST /api/v1/career-recommendation/optimize-weights
pub async fn handle_optimize_weights(
    State(state): State<AppState>,
    Json(request): Json<OptimizationRequest>,
) -> Result<Json<OptimizationResponse>, AppError> {
    let params = validation_params(&state, request.validation);
    let options = state.config.scoring_options();
    let dimension_candidates = request.dimension_candidates;
    let combination_candidates = request.combination_candidates;

    let (committed, report) =
        run_tuning(&state, request.dataset_name, move |corpus, base, cancel| {
            weights::optimize(
                corpus,
                base,
                dimension_candidates,
                combination_candidates,
                &params,
                options,
                cancel,
            )
        })
        .await?;

    Ok(Json(OptimizationResponse {
        generation: committed.generation,
        dimension_weights: report.dimension_weights,
        combination_weights: report.combination_weights,
        auc: report.auc,
        evaluated_pairs: report.evaluated_pairs,
        combinations_evaluated: report.combinations_evaluated,
        warnings: committed.warnings(),
    }))
}

/// POST /api/v1/career-recommendation/calibrate-scores
///
/// Refits the logistic transform against the current thresholds and weights.
pub async fn handle_calibrate_scores(
    State(state): State<AppState>,
    Json(request): Json<ScoreCalibrationRequest>,
) -> Result<Json<ScoreCalibrationResponse>, AppError> {
    let fit_params = FitParams {
        learning_rate: request.learning_rate.unwrap_or(score::DEFAULT_LEARNING_RATE),
        max_iter: request.max_iter.unwrap_or(score::DEFAULT_MAX_ITER),
    };
    fit_params.validate()?;
    let params = validation_params(&state, request.validation);
    let options = state.config.scoring_options();

    let (committed, report) =
        run_tuning(&state, request.dataset_name, move |corpus, base, cancel| {
            score::calibrate_scores(corpus, base, &fit_params, &params, options, cancel)
        })
        .await?;

    Ok(Json(ScoreCalibrationResponse {
        generation: committed.generation,
        report,
    }))
}
