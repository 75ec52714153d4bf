use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::corpus::CorpusError;

/// Failure taxonomy of the matching and calibration engine.
///
/// Every variant aborts the run that raised it; no calibration state is
/// committed after an error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("dataset '{0}' not found")]
    DatasetNotFound(String),

    #[error("insufficient validation data: {positives} positive(s), {negatives} negative(s)")]
    InsufficientValidationData { positives: usize, negatives: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("corpus '{0}' has no occupation descriptors")]
    EmptyCorpus(String),

    #[error("non-finite value in {0}")]
    NonFinite(String),

    #[error("score calibration is not monotonic: auc before {auc_before:.6}, after {auc_after:.6}")]
    NonMonotonicCalibration { auc_before: f64, auc_after: f64 },

    #[error("run cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn invalid(message: impl Into<String>) -> Self {
        EngineError::InvalidParameter(message.into())
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Corpus error: {0}")]
    Corpus(CorpusError),

    #[error("Run exceeded the {0}s tuning timeout")]
    Timeout(u64),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Unknown datasets surface as the engine's `DatasetNotFound`.
impl From<CorpusError> for AppError {
    fn from(err: CorpusError) -> Self {
        match err {
            CorpusError::NotFound(name) => AppError::Engine(EngineError::DatasetNotFound(name)),
            other => AppError::Corpus(other),
        }
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Engine(err) => match err {
                EngineError::DatasetNotFound(_) => {
                    (StatusCode::NOT_FOUND, "DATASET_NOT_FOUND", err.to_string())
                }
                EngineError::InsufficientValidationData { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "INSUFFICIENT_VALIDATION_DATA",
                    err.to_string(),
                ),
                EngineError::InvalidParameter(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_PARAMETER", err.to_string())
                }
                EngineError::EmptyCorpus(_) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "EMPTY_CORPUS",
                    err.to_string(),
                ),
                EngineError::NonFinite(_) | EngineError::NonMonotonicCalibration { .. } => {
                    tracing::error!("Numerical failure: {err}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "NUMERICAL_ERROR",
                        format!("{err}; calibration state left unchanged"),
                    )
                }
                EngineError::Cancelled => {
                    (StatusCode::GATEWAY_TIMEOUT, "CANCELLED", err.to_string())
                }
            },
            AppError::Corpus(err) => {
                tracing::error!("Corpus error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CORPUS_ERROR",
                    "The occupation corpus could not be loaded".to_string(),
                )
            }
            AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", self.to_string()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_map_to_statuses() {
        let cases = vec![
            (
                AppError::from(EngineError::DatasetNotFound("x".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::from(EngineError::InsufficientValidationData {
                    positives: 3,
                    negatives: 0,
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::from(EngineError::invalid("top_k must be >= 1")),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(EngineError::NonFinite("raw score".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::Timeout(5), StatusCode::GATEWAY_TIMEOUT),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_corpus_not_found_becomes_dataset_not_found() {
        let err = AppError::from(CorpusError::NotFound("missing".into()));
        assert!(matches!(
            &err,
            AppError::Engine(EngineError::DatasetNotFound(name)) if name == "missing"
        ));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

        let other = AppError::from(CorpusError::Task("join failed".into()));
        assert!(matches!(other, AppError::Corpus(_)));
        assert_eq!(
            other.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_insufficient_data_message_reports_counts() {
        let err = EngineError::InsufficientValidationData {
            positives: 10,
            negatives: 0,
        };
        assert_eq!(
            err.to_string(),
            "insufficient validation data: 10 positive(s), 0 negative(s)"
        );
    }
}
