//! Score Calibrator: Platt scaling of raw fit scores onto match probabilities.
//!
//! `calibrated = sigmoid(A·raw + B)`, fit by batch gradient descent on mean
//! log-loss over the validation pairs, starting from `A = 1, B = 0`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calibration::stats::{self, sigmoid};
use crate::calibration::validation::{self, ValidationParams};
use crate::cancel::CancellationToken;
use crate::corpus::OccupationCorpus;
use crate::errors::EngineError;
use crate::matching::{ScoringConfig, ScoringOptions};
use crate::models::{CalibrationSource, CalibrationState, ScoreCalibration};

pub const DEFAULT_LEARNING_RATE: f64 = 0.01;
pub const DEFAULT_MAX_ITER: usize = 500;
const CONVERGENCE_TOLERANCE: f64 = 1e-9;
const AUC_TOLERANCE: f64 = 1e-6;
const CANCEL_CHECK_EVERY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitParams {
    pub learning_rate: f64,
    pub max_iter: usize,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            learning_rate: DEFAULT_LEARNING_RATE,
            max_iter: DEFAULT_MAX_ITER,
        }
    }
}

impl FitParams {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(EngineError::invalid(format!(
                "learning_rate must be > 0, got {}",
                self.learning_rate
            )));
        }
        if self.max_iter == 0 {
            return Err(EngineError::invalid("max_iter must be >= 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreFitReport {
    #[serde(rename = "A")]
    pub a: f64,
    #[serde(rename = "B")]
    pub b: f64,
    pub iterations: usize,
    pub auc_before: f64,
    pub auc_after: f64,
    pub samples: usize,
    pub log_loss: f64,
}

fn predictions(raw: &[f64], a: f64, b: f64) -> Vec<f64> {
    raw.iter().map(|x| sigmoid(a * x + b)).collect()
}

/// Fits (A, B) on `(raw, label)` samples. Fails with `NonMonotonicCalibration`
/// when the transform changes the ranking.
pub fn fit(
    raw: &[f64],
    labels: &[bool],
    params: &FitParams,
    cancel: &CancellationToken,
) -> Result<ScoreFitReport, EngineError> {
    params.validate()?;
    let auc_before = stats::auc(labels, raw)?;

    let n = raw.len() as f64;
    let (mut a, mut b) = (1.0_f64, 0.0_f64);
    let mut loss = stats::log_loss(labels, &predictions(raw, a, b));
    let mut iterations = 0;

    for iteration in 0..params.max_iter {
        if iteration % CANCEL_CHECK_EVERY == 0 {
            cancel.check()?;
        }

        let (mut grad_a, mut grad_b) = (0.0, 0.0);
        for (x, label) in raw.iter().zip(labels) {
            let residual = sigmoid(a * x + b) - if *label { 1.0 } else { 0.0 };
            grad_a += residual * x;
            grad_b += residual;
        }
        a -= params.learning_rate * grad_a / n;
        b -= params.learning_rate * grad_b / n;
        if !a.is_finite() || !b.is_finite() {
            return Err(EngineError::NonFinite("score calibration parameters".into()));
        }
        iterations = iteration + 1;

        let next_loss = stats::log_loss(labels, &predictions(raw, a, b));
        let improvement = loss - next_loss;
        loss = next_loss;
        if improvement < CONVERGENCE_TOLERANCE {
            break;
        }
    }

    let auc_after = stats::auc(labels, &predictions(raw, a, b))?;
    if (auc_after - auc_before).abs() > AUC_TOLERANCE {
        return Err(EngineError::NonMonotonicCalibration {
            auc_before,
            auc_after,
        });
    }

    Ok(ScoreFitReport {
        a,
        b,
        iterations,
        auc_before,
        auc_after,
        samples: raw.len(),
        log_loss: loss,
    })
}

/// Builds the validation set, scores it under the current configuration and
/// fits the transform. Returns the uncommitted successor state.
pub fn calibrate_scores(
    corpus: &OccupationCorpus,
    base: &CalibrationState,
    params: &FitParams,
    validation_params: &ValidationParams,
    options: ScoringOptions,
    cancel: &CancellationToken,
) -> Result<(CalibrationState, ScoreFitReport), EngineError> {
    params.validate()?;

    let dataset = validation::build(corpus, validation_params, cancel)?;
    dataset.ensure_discriminable()?;
    let config = ScoringConfig::from_state(base, options);
    let raw = dataset.score(corpus, &config, cancel)?;
    let report = fit(&raw, &dataset.labels(), params, cancel)?;

    let mut next = base.successor(CalibrationSource::ScoreFit);
    next.score_calibration = Some(ScoreCalibration {
        a: report.a,
        b: report.b,
        enabled: true,
        iterations: report.iterations,
        samples: report.samples,
        log_loss: report.log_loss,
        auc: report.auc_after,
        fitted_at: Utc::now(),
        fitted_against: base.fingerprint(),
    });

    info!(
        "Score calibration on '{}': A={:.4} B={:.4} after {} iterations (auc={:.4})",
        corpus.name(),
        report.a,
        report.b,
        report.iterations,
        report.auc_after
    );

    Ok((next, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::fixtures;

    fn separable() -> (Vec<f64>, Vec<bool>) {
        let raw = vec![0.9, 0.85, 0.8, 0.7, 0.4, 0.35, 0.3, 0.2, 0.1, 0.05];
        let labels = vec![true, true, true, false, true, false, false, false, false, false];
        (raw, labels)
    }

    #[test]
    fn test_fit_preserves_ranking() {
        let (raw, labels) = separable();
        let report = fit(&raw, &labels, &FitParams::default(), &CancellationToken::new()).unwrap();
        assert!((report.auc_after - report.auc_before).abs() < 1e-6);
        assert!(report.a > 0.0);
        assert!(report.iterations >= 1 && report.iterations <= DEFAULT_MAX_ITER);
        assert_eq!(report.samples, 10);
        assert!(report.log_loss.is_finite());
    }

    #[test]
    fn test_fit_reduces_log_loss() {
        let (raw, labels) = separable();
        let initial = stats::log_loss(&labels, &predictions(&raw, 1.0, 0.0));
        let params = FitParams {
            learning_rate: 0.5,
            max_iter: 2000,
        };
        let report = fit(&raw, &labels, &params, &CancellationToken::new()).unwrap();
        assert!(report.log_loss < initial);
    }

    #[test]
    fn test_fit_honors_max_iter() {
        let (raw, labels) = separable();
        let params = FitParams {
            learning_rate: 0.01,
            max_iter: 3,
        };
        let report = fit(&raw, &labels, &params, &CancellationToken::new()).unwrap();
        assert_eq!(report.iterations, 3);
    }

    #[test]
    fn test_fit_rejects_ranking_inversion() {
        // Positives sit below negatives, so descent drives the slope negative.
        let raw = vec![0.9, 0.8, 0.2, 0.1];
        let labels = vec![false, false, true, true];
        let params = FitParams {
            learning_rate: 1.0,
            max_iter: 500,
        };
        let err = fit(&raw, &labels, &params, &CancellationToken::new()).unwrap_err();
        match err {
            EngineError::NonMonotonicCalibration {
                auc_before,
                auc_after,
            } => {
                assert_eq!(auc_before, 0.0);
                assert_eq!(auc_after, 1.0);
            }
            other => panic!("expected NonMonotonicCalibration, got {other:?}"),
        }
    }

    #[test]
    fn test_fit_rejects_bad_params() {
        let (raw, labels) = separable();
        for params in [
            FitParams {
                learning_rate: 0.0,
                max_iter: 10,
            },
            FitParams {
                learning_rate: f64::NAN,
                max_iter: 10,
            },
            FitParams {
                learning_rate: 0.1,
                max_iter: 0,
            },
        ] {
            assert!(matches!(
                fit(&raw, &labels, &params, &CancellationToken::new()),
                Err(EngineError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_calibrate_scores_records_fingerprint() {
        let corpus = fixtures::corpus(10);
        let base = CalibrationState::defaults("fixture");
        let validation = ValidationParams {
            seed: Some(17),
            ..Default::default()
        };
        let (next, report) = calibrate_scores(
            &corpus,
            &base,
            &FitParams::default(),
            &validation,
            ScoringOptions::default(),
            &CancellationToken::new(),
        )
        .unwrap();

        let fit = next.score_calibration.as_ref().unwrap();
        assert_eq!(fit.fitted_against, base.fingerprint());
        assert!(fit.enabled);
        assert_eq!(fit.a, report.a);
        assert_eq!(report.samples, 40);
        assert!(next.is_consistent());
        assert!((report.auc_after - report.auc_before).abs() < 1e-6);
    }

    #[test]
    fn test_calibrate_scores_requires_negatives() {
        let corpus = fixtures::corpus(5);
        let base = CalibrationState::defaults("fixture");
        let validation = ValidationParams {
            negatives_per_positive: 0,
            seed: Some(1),
            ..Default::default()
        };
        let err = calibrate_scores(
            &corpus,
            &base,
            &FitParams::default(),
            &validation,
            ScoringOptions::default(),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientValidationData { .. }));
    }
}
