use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::EngineError;
use crate::models::occupation::Category;

pub const DEFAULT_IMPORTANCE_CRITICAL_THRESHOLD: f64 = 80.0;
pub const DEFAULT_MIN_REQUIREMENT_RATIO: f64 = 0.75;

// ────────────────────────────────────────────────────────────────────────────
// Weights and thresholds
// ────────────────────────────────────────────────────────────────────────────

/// Non-negative per-category weights. Missing keys read as 0.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryWeights(BTreeMap<Category, f64>);

impl CategoryWeights {
    pub fn new(entries: impl IntoIterator<Item = (Category, f64)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Aggregation weights applied to category scores.
    pub fn default_combination() -> Self {
        Self::new([
            (Category::Interests, 0.35),
            (Category::Abilities, 0.25),
            (Category::Knowledge, 0.20),
            (Category::Skills, 0.20),
        ])
    }

    /// Per-category scaling of descriptor agreement.
    pub fn default_dimension() -> Self {
        Self::new(Category::ALL.into_iter().map(|c| (c, 1.0)))
    }

    pub fn get(&self, category: Category) -> f64 {
        self.0.get(&category).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        self.0.iter().map(|(c, w)| (*c, *w))
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Returns a copy where only the keys present in `partial` are replaced.
    pub fn overlay(&self, partial: &CategoryWeights) -> CategoryWeights {
        let mut merged = self.0.clone();
        for (category, weight) in partial.iter() {
            merged.insert(category, weight);
        }
        CategoryWeights(merged)
    }

    /// Every weight must be finite and within [0, 1].
    pub fn validate(&self, label: &str) -> Result<(), EngineError> {
        for (category, weight) in self.iter() {
            if !weight.is_finite() {
                return Err(EngineError::NonFinite(format!("{label}.{category}")));
            }
            if !(0.0..=1.0).contains(&weight) {
                return Err(EngineError::invalid(format!(
                    "{label}.{category} must be within [0, 1], got {weight}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub importance_critical_threshold: f64,
    pub min_requirement_ratio: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            importance_critical_threshold: DEFAULT_IMPORTANCE_CRITICAL_THRESHOLD,
            min_requirement_ratio: DEFAULT_MIN_REQUIREMENT_RATIO,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), EngineError> {
        let importance = self.importance_critical_threshold;
        let ratio = self.min_requirement_ratio;
        if !importance.is_finite() {
            return Err(EngineError::NonFinite("importance_critical_threshold".into()));
        }
        if !ratio.is_finite() {
            return Err(EngineError::NonFinite("min_requirement_ratio".into()));
        }
        if !(0.0..=100.0).contains(&importance) {
            return Err(EngineError::invalid(format!(
                "importance_critical_threshold must be within [0, 100], got {importance}"
            )));
        }
        if !(0.0..=1.0).contains(&ratio) {
            return Err(EngineError::invalid(format!(
                "min_requirement_ratio must be within [0, 1], got {ratio}"
            )));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Score calibration
// ────────────────────────────────────────────────────────────────────────────

/// The threshold/weight configuration a score calibration was fit against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFingerprint {
    pub thresholds: Thresholds,
    pub dimension_weights: CategoryWeights,
    pub combination_weights: CategoryWeights,
}

/// Logistic transform `sigmoid(A·raw + B)` plus fit metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCalibration {
    #[serde(rename = "A")]
    pub a: f64,
    #[serde(rename = "B")]
    pub b: f64,
    pub enabled: bool,
    pub iterations: usize,
    pub samples: usize,
    pub log_loss: f64,
    pub auc: f64,
    pub fitted_at: DateTime<Utc>,
    pub fitted_against: ConfigFingerprint,
}

// ────────────────────────────────────────────────────────────────────────────
// Rules and warnings
// ────────────────────────────────────────────────────────────────────────────

/// A descriptor deemed critical for an occupation under the current thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRule {
    pub occupation_code: String,
    pub occupation_title: String,
    pub category: Category,
    pub element: String,
    pub importance: f64,
    pub required_level: f64,
    /// Lowest rating that still counts as meeting the requirement.
    pub minimum_rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalibrationWarning {
    /// The score calibration was fit against a different threshold/weight configuration.
    StaleScoreCalibration { fitted_at: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationSource {
    Defaults,
    PercentileThresholds,
    OptimizedThresholds,
    WeightSearch,
    ScoreFit,
}

// ────────────────────────────────────────────────────────────────────────────
// CalibrationState
// ────────────────────────────────────────────────────────────────────────────

/// Complete tunable state read by every scoring call.
///
/// Runs build a whole new value and hand it to `CalibrationStore::commit`;
/// fields are never patched in place on a live state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationState {
    pub generation: u64,
    pub run_id: Uuid,
    pub updated_at: DateTime<Utc>,
    pub source: CalibrationSource,
    pub dataset_name: String,
    pub importance_critical_threshold: f64,
    pub min_requirement_ratio: f64,
    pub dimension_weights: CategoryWeights,
    pub combination_weights: CategoryWeights,
    pub score_calibration: Option<ScoreCalibration>,
    pub rules_count: usize,
    pub sample_rules: Vec<CalibrationRule>,
}

impl CalibrationState {
    /// Default thresholds and weights with no rules derived yet.
    pub fn defaults(dataset_name: impl Into<String>) -> Self {
        let thresholds = Thresholds::default();
        Self {
            generation: 0,
            run_id: Uuid::new_v4(),
            updated_at: Utc::now(),
            source: CalibrationSource::Defaults,
            dataset_name: dataset_name.into(),
            importance_critical_threshold: thresholds.importance_critical_threshold,
            min_requirement_ratio: thresholds.min_requirement_ratio,
            dimension_weights: CategoryWeights::default_dimension(),
            combination_weights: CategoryWeights::default_combination(),
            score_calibration: None,
            rules_count: 0,
            sample_rules: Vec::new(),
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            importance_critical_threshold: self.importance_critical_threshold,
            min_requirement_ratio: self.min_requirement_ratio,
        }
    }

    pub fn fingerprint(&self) -> ConfigFingerprint {
        ConfigFingerprint {
            thresholds: self.thresholds(),
            dimension_weights: self.dimension_weights.clone(),
            combination_weights: self.combination_weights.clone(),
        }
    }

    /// True unless a score calibration exists that was fit against another configuration.
    pub fn is_consistent(&self) -> bool {
        self.score_calibration
            .as_ref()
            .map(|fit| fit.fitted_against == self.fingerprint())
            .unwrap_or(true)
    }

    pub fn warnings(&self) -> Vec<CalibrationWarning> {
        match &self.score_calibration {
            Some(fit) if !self.is_consistent() => vec![CalibrationWarning::StaleScoreCalibration {
                fitted_at: fit.fitted_at,
            }],
            _ => Vec::new(),
        }
    }

    /// Derives a successor: fresh run id and timestamp, same generation until committed.
    pub fn successor(&self, source: CalibrationSource) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            updated_at: Utc::now(),
            source,
            ..self.clone()
        }
    }

    /// Checks the invariants a state must satisfy before it can be served.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.thresholds().validate()?;
        self.dimension_weights.validate("dimension_weights")?;
        self.combination_weights.validate("combination_weights")?;
        if let Some(fit) = &self.score_calibration {
            if !fit.a.is_finite() || !fit.b.is_finite() {
                return Err(EngineError::NonFinite("score_calibration".into()));
            }
        }
        if self.sample_rules.len() > self.rules_count {
            return Err(EngineError::invalid(
                "sample_rules cannot exceed rules_count",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit_for(state: &CalibrationState) -> ScoreCalibration {
        ScoreCalibration {
            a: 4.0,
            b: -2.0,
            enabled: true,
            iterations: 10,
            samples: 40,
            log_loss: 0.4,
            auc: 0.9,
            fitted_at: Utc::now(),
            fitted_against: state.fingerprint(),
        }
    }

    #[test]
    fn test_overlay_replaces_only_listed_keys() {
        let base = CategoryWeights::default_combination();
        let partial = CategoryWeights::new([(Category::Skills, 0.5)]);
        let merged = base.overlay(&partial);
        assert_eq!(merged.get(Category::Skills), 0.5);
        assert_eq!(merged.get(Category::Interests), 0.35);
        assert_eq!(merged.get(Category::Abilities), 0.25);
    }

    #[test]
    fn test_weights_validate_rejects_out_of_range_and_nan() {
        let too_big = CategoryWeights::new([(Category::Skills, 1.5)]);
        assert!(matches!(
            too_big.validate("w"),
            Err(EngineError::InvalidParameter(_))
        ));
        let nan = CategoryWeights::new([(Category::Skills, f64::NAN)]);
        assert!(matches!(nan.validate("w"), Err(EngineError::NonFinite(_))));
        assert!(CategoryWeights::default_combination().validate("w").is_ok());
    }

    #[test]
    fn test_weights_serialize_as_plain_map() {
        let json = serde_json::to_value(CategoryWeights::default_combination()).unwrap();
        assert_eq!(json["interests"], 0.35);
        let parsed: CategoryWeights = serde_json::from_str(r#"{"skills":0.3}"#).unwrap();
        assert_eq!(parsed.get(Category::Skills), 0.3);
        assert_eq!(parsed.get(Category::Abilities), 0.0);
    }

    #[test]
    fn test_thresholds_validate_ranges() {
        assert!(Thresholds::default().validate().is_ok());
        let bad_ratio = Thresholds {
            importance_critical_threshold: 50.0,
            min_requirement_ratio: 1.2,
        };
        assert!(bad_ratio.validate().is_err());
        let nan = Thresholds {
            importance_critical_threshold: f64::NAN,
            min_requirement_ratio: 0.5,
        };
        assert!(matches!(nan.validate(), Err(EngineError::NonFinite(_))));
    }

    #[test]
    fn test_consistency_tracks_fingerprint() {
        let mut state = CalibrationState::defaults("onet-core");
        assert!(state.is_consistent());

        state.score_calibration = Some(fit_for(&state));
        assert!(state.is_consistent());
        assert!(state.warnings().is_empty());

        state.importance_critical_threshold = 70.0;
        assert!(!state.is_consistent());
        assert_eq!(state.warnings().len(), 1);
    }

    #[test]
    fn test_validate_rejects_non_finite_calibration() {
        let mut state = CalibrationState::defaults("onet-core");
        let mut fit = fit_for(&state);
        fit.a = f64::INFINITY;
        state.score_calibration = Some(fit);
        assert!(matches!(state.validate(), Err(EngineError::NonFinite(_))));
    }

    #[test]
    fn test_score_calibration_serializes_upper_case_params() {
        let state = CalibrationState::defaults("onet-core");
        let json = serde_json::to_value(fit_for(&state)).unwrap();
        assert_eq!(json["A"], 4.0);
        assert_eq!(json["B"], -2.0);
    }
}
