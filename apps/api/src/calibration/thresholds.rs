//! Calibration Engine: derives the importance-critical threshold and the
//! minimum-requirement ratio, then re-instantiates the critical-requirement rules.

use serde::Serialize;
use tracing::{debug, info};

use crate::calibration::stats;
use crate::calibration::validation::{self, ValidationParams};
use crate::cancel::CancellationToken;
use crate::corpus::OccupationCorpus;
use crate::errors::EngineError;
use crate::matching::{ScoringConfig, ScoringOptions};
use crate::models::{CalibrationRule, CalibrationSource, CalibrationState, Category, Thresholds};

pub const DEFAULT_IMPORTANCE_PERCENTILE: f64 = 75.0;
pub const DEFAULT_LEVEL_PERCENTILE: f64 = 65.0;
pub const DEFAULT_RULES_TOP_K: usize = 20;
pub const MAX_TOP_K: usize = 500;

const AUC_TIE_TOLERANCE: f64 = 1e-12;

/// How a threshold run derives its values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CalibrationMode {
    /// Corpus percentiles; never touches the validation builder.
    Percentile {
        importance_percentile: f64,
        level_percentile: f64,
    },
    /// AUC search over the Cartesian product of candidates. An empty list
    /// stands for the current value.
    Optimized {
        importance_candidates: Vec<f64>,
        ratio_candidates: Vec<f64>,
        validation: ValidationParams,
    },
}

impl CalibrationMode {
    /// Optimized as soon as either candidate list is non-empty.
    pub fn resolve(
        importance_percentile: Option<f64>,
        level_percentile: Option<f64>,
        importance_candidates: Option<Vec<f64>>,
        ratio_candidates: Option<Vec<f64>>,
        validation: Option<ValidationParams>,
    ) -> Result<Self, EngineError> {
        let importance_percentile = importance_percentile.unwrap_or(DEFAULT_IMPORTANCE_PERCENTILE);
        let level_percentile = level_percentile.unwrap_or(DEFAULT_LEVEL_PERCENTILE);
        for (name, value) in [
            ("importance_percentile", importance_percentile),
            ("level_percentile", level_percentile),
        ] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(EngineError::invalid(format!(
                    "{name} must be within [0, 100], got {value}"
                )));
            }
        }

        let importance_candidates = importance_candidates.unwrap_or_default();
        let ratio_candidates = ratio_candidates.unwrap_or_default();
        for candidate in &importance_candidates {
            if !candidate.is_finite() || !(0.0..=100.0).contains(candidate) {
                return Err(EngineError::invalid(format!(
                    "importance candidate {candidate} outside [0, 100]"
                )));
            }
        }
        for candidate in &ratio_candidates {
            if !candidate.is_finite() || !(0.0..=1.0).contains(candidate) {
                return Err(EngineError::invalid(format!(
                    "ratio candidate {candidate} outside [0, 1]"
                )));
            }
        }

        if importance_candidates.is_empty() && ratio_candidates.is_empty() {
            return Ok(CalibrationMode::Percentile {
                importance_percentile,
                level_percentile,
            });
        }

        Ok(CalibrationMode::Optimized {
            importance_candidates,
            ratio_candidates,
            validation: validation.unwrap_or_default(),
        })
    }

    pub fn source(&self) -> CalibrationSource {
        match self {
            CalibrationMode::Percentile { .. } => CalibrationSource::PercentileThresholds,
            CalibrationMode::Optimized { .. } => CalibrationSource::OptimizedThresholds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdReport {
    pub mode: CalibrationMode,
    pub thresholds: Thresholds,
    /// Best AUC; optimized mode only.
    pub auc: Option<f64>,
    /// Size of the validation dataset; `None` when none was built.
    pub validation_pairs: Option<usize>,
    pub candidates_evaluated: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Rules
// ────────────────────────────────────────────────────────────────────────────

/// Every descriptor whose importance exceeds the threshold, ordered by
/// importance desc, then occupation title, then descriptor name.
pub fn critical_rules(corpus: &OccupationCorpus, thresholds: &Thresholds) -> Vec<CalibrationRule> {
    let mut rules: Vec<CalibrationRule> = corpus
        .occupations()
        .iter()
        .flat_map(move |occupation| {
            Category::DESCRIPTOR.into_iter().flat_map(move |category| {
                occupation
                    .descriptors(category)
                    .iter()
                    .filter(move |d| d.importance > thresholds.importance_critical_threshold)
                    .map(move |d| CalibrationRule {
                        occupation_code: occupation.code.clone(),
                        occupation_title: occupation.title.clone(),
                        category,
                        element: d.name.clone(),
                        importance: d.importance,
                        required_level: d.level,
                        minimum_rating: thresholds.min_requirement_ratio * d.level,
                    })
            })
        })
        .collect();

    rules.sort_by(|a, b| {
        b.importance
            .total_cmp(&a.importance)
            .then_with(|| a.occupation_title.cmp(&b.occupation_title))
            .then_with(|| a.element.cmp(&b.element))
            .then_with(|| a.category.cmp(&b.category))
    });
    rules
}

/// Validates `top_k` against [1, MAX_TOP_K].
pub fn check_top_k(top_k: usize) -> Result<usize, EngineError> {
    if top_k == 0 || top_k > MAX_TOP_K {
        return Err(EngineError::invalid(format!(
            "top_k must be within [1, {MAX_TOP_K}], got {top_k}"
        )));
    }
    Ok(top_k)
}

// ────────────────────────────────────────────────────────────────────────────
// Modes
// ────────────────────────────────────────────────────────────────────────────

fn percentile_thresholds(
    corpus: &OccupationCorpus,
    importance_percentile: f64,
    level_percentile: f64,
) -> Result<Thresholds, EngineError> {
    let descriptors: Vec<_> = corpus
        .occupations()
        .iter()
        .flat_map(|o| Category::DESCRIPTOR.into_iter().flat_map(move |c| o.descriptors(c)))
        .collect();

    let importances: Vec<f64> = descriptors.iter().map(|d| d.importance).collect();
    let ratios: Vec<f64> = descriptors
        .iter()
        .filter(|d| d.importance > 0.0)
        .map(|d| d.level / d.importance)
        .collect();
    if importances.is_empty() || ratios.is_empty() {
        return Err(EngineError::EmptyCorpus(corpus.name().to_string()));
    }

    Ok(Thresholds {
        importance_critical_threshold: stats::percentile(&importances, importance_percentile)?,
        min_requirement_ratio: stats::percentile(&ratios, level_percentile)?.clamp(0.0, 1.0),
    })
}

struct SearchOutcome {
    thresholds: Thresholds,
    auc: f64,
    validation_pairs: usize,
    candidates_evaluated: usize,
}

fn search_thresholds(
    corpus: &OccupationCorpus,
    base: &CalibrationState,
    importance_candidates: &[f64],
    ratio_candidates: &[f64],
    params: &ValidationParams,
    options: ScoringOptions,
    cancel: &CancellationToken,
) -> Result<SearchOutcome, EngineError> {
    let importances = if importance_candidates.is_empty() {
        vec![base.importance_critical_threshold]
    } else {
        importance_candidates.to_vec()
    };
    let ratios = if ratio_candidates.is_empty() {
        vec![base.min_requirement_ratio]
    } else {
        ratio_candidates.to_vec()
    };

    let dataset = validation::build(corpus, params, cancel)?;
    dataset.ensure_discriminable()?;

    let mut config = ScoringConfig::from_state(base, options);
    let mut best: Option<(Thresholds, f64)> = None;
    let mut evaluated = 0;

    for importance in &importances {
        for ratio in &ratios {
            cancel.check()?;
            config.thresholds = Thresholds {
                importance_critical_threshold: *importance,
                min_requirement_ratio: *ratio,
            };
            let auc = dataset.auc(corpus, &config, cancel)?;
            evaluated += 1;
            debug!("threshold candidate importance={importance} ratio={ratio}: auc={auc:.6}");

            let better = match &best {
                None => true,
                Some((current, best_auc)) => {
                    auc > best_auc + AUC_TIE_TOLERANCE
                        || ((auc - best_auc).abs() <= AUC_TIE_TOLERANCE
                            && *importance > current.importance_critical_threshold)
                }
            };
            if better {
                best = Some((config.thresholds, auc));
            }
        }
    }

    let (thresholds, auc) =
        best.ok_or_else(|| EngineError::invalid("no threshold candidates to evaluate"))?;
    Ok(SearchOutcome {
        thresholds,
        auc,
        validation_pairs: dataset.pairs.len(),
        candidates_evaluated: evaluated,
    })
}

/// Runs one threshold calibration and returns the uncommitted successor state.
/// Weights and score calibration carry over unchanged.
pub fn calibrate(
    corpus: &OccupationCorpus,
    base: &CalibrationState,
    mode: &CalibrationMode,
    top_k: usize,
    options: ScoringOptions,
    cancel: &CancellationToken,
) -> Result<(CalibrationState, ThresholdReport), EngineError> {
    let top_k = check_top_k(top_k)?;

    let report = match mode {
        CalibrationMode::Percentile {
            importance_percentile,
            level_percentile,
        } => ThresholdReport {
            mode: mode.clone(),
            thresholds: percentile_thresholds(corpus, *importance_percentile, *level_percentile)?,
            auc: None,
            validation_pairs: None,
            candidates_evaluated: 0,
        },
        CalibrationMode::Optimized {
            importance_candidates,
            ratio_candidates,
            validation,
        } => {
            let outcome = search_thresholds(
                corpus,
                base,
                importance_candidates,
                ratio_candidates,
                validation,
                options,
                cancel,
            )?;
            ThresholdReport {
                mode: mode.clone(),
                thresholds: outcome.thresholds,
                auc: Some(outcome.auc),
                validation_pairs: Some(outcome.validation_pairs),
                candidates_evaluated: outcome.candidates_evaluated,
            }
        }
    };
    report.thresholds.validate()?;
    cancel.check()?;

    let rules = critical_rules(corpus, &report.thresholds);
    let mut next = base.successor(mode.source());
    next.dataset_name = corpus.name().to_string();
    next.importance_critical_threshold = report.thresholds.importance_critical_threshold;
    next.min_requirement_ratio = report.thresholds.min_requirement_ratio;
    next.rules_count = rules.len();
    next.sample_rules = rules.into_iter().take(top_k).collect();

    info!(
        "Threshold calibration on '{}': importance={:.2} ratio={:.3} rules={}",
        corpus.name(),
        next.importance_critical_threshold,
        next.min_requirement_ratio,
        next.rules_count
    );

    Ok((next, report))
}
