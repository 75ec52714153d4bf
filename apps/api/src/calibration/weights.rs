//! Weight Optimizer: grid search over dimension × combination weight candidates,
//! maximizing validation AUC.

use serde::Serialize;
use tracing::{debug, info};

use crate::calibration::validation::{self, ValidationParams};
use crate::cancel::CancellationToken;
use crate::corpus::OccupationCorpus;
use crate::errors::EngineError;
use crate::matching::{ScoringConfig, ScoringOptions};
use crate::models::{CalibrationSource, CalibrationState, Category, CategoryWeights};

/// Dimension grid searched when the caller lists none.
pub fn default_dimension_grid() -> Vec<CategoryWeights> {
    vec![
        CategoryWeights::default_dimension(),
        CategoryWeights::new([
            (Category::Interests, 1.0),
            (Category::Abilities, 0.9),
            (Category::Knowledge, 0.8),
            (Category::Skills, 0.9),
        ]),
        CategoryWeights::new([
            (Category::Interests, 0.8),
            (Category::Abilities, 1.0),
            (Category::Knowledge, 1.0),
            (Category::Skills, 1.0),
        ]),
    ]
}

/// Combination grid searched when the caller lists none.
pub fn default_combination_grid() -> Vec<CategoryWeights> {
    vec![
        CategoryWeights::default_combination(),
        CategoryWeights::new([
            (Category::Interests, 0.30),
            (Category::Abilities, 0.30),
            (Category::Knowledge, 0.20),
            (Category::Skills, 0.20),
        ]),
        CategoryWeights::new([
            (Category::Interests, 0.40),
            (Category::Abilities, 0.25),
            (Category::Knowledge, 0.20),
            (Category::Skills, 0.15),
        ]),
        CategoryWeights::new([
            (Category::Interests, 0.33),
            (Category::Abilities, 0.27),
            (Category::Knowledge, 0.20),
            (Category::Skills, 0.20),
        ]),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightReport {
    pub dimension_weights: CategoryWeights,
    pub combination_weights: CategoryWeights,
    pub auc: f64,
    /// positives × negatives × combinations evaluated
    pub evaluated_pairs: usize,
    pub combinations_evaluated: usize,
}

/// Overlays each candidate onto `current` and validates the result.
/// An empty candidate list falls back to `grid`.
fn expand_candidates(
    current: &CategoryWeights,
    candidates: Option<Vec<CategoryWeights>>,
    grid: fn() -> Vec<CategoryWeights>,
    label: &str,
) -> Result<Vec<CategoryWeights>, EngineError> {
    let candidates = match candidates {
        Some(list) if !list.is_empty() => list,
        _ => grid(),
    };
    candidates
        .iter()
        .map(|candidate| {
            let merged = current.overlay(candidate);
            merged.validate(label)?;
            Ok(merged)
        })
        .collect()
}

/// Searches the full Cartesian product; the first strict maximum wins.
/// Returns the uncommitted successor state with the winning weights.
pub fn optimize(
    corpus: &OccupationCorpus,
    base: &CalibrationState,
    dimension_candidates: Option<Vec<CategoryWeights>>,
    combination_candidates: Option<Vec<CategoryWeights>>,
    params: &ValidationParams,
    options: ScoringOptions,
    cancel: &CancellationToken,
) -> Result<(CalibrationState, WeightReport), EngineError> {
    let dimensions = expand_candidates(
        &base.dimension_weights,
        dimension_candidates,
        default_dimension_grid,
        "dimension_candidates",
    )?;
    let combinations = expand_candidates(
        &base.combination_weights,
        combination_candidates,
        default_combination_grid,
        "combination_candidates",
    )?;

    let dataset = validation::build(corpus, params, cancel)?;
    dataset.ensure_discriminable()?;
    let positives = dataset.positives();
    let negatives = dataset.negatives();

    let mut config = ScoringConfig::from_state(base, options);
    let mut best: Option<(usize, usize, f64)> = None;
    let mut evaluated = 0;

    for (d, dimension) in dimensions.iter().enumerate() {
        for (c, combination) in combinations.iter().enumerate() {
            cancel.check()?;
            config.dimension_weights = dimension.clone();
            config.combination_weights = combination.clone();

            let auc = dataset.auc(corpus, &config, cancel)?;
            evaluated += 1;
            debug!("weight candidate dimension#{d} combination#{c}: auc={auc:.6}");

            if best.map_or(true, |(_, _, best_auc)| auc > best_auc) {
                best = Some((d, c, auc));
            }
        }
    }

    let (d, c, auc) = best.ok_or_else(|| EngineError::invalid("no weight candidates"))?;
    let report = WeightReport {
        dimension_weights: dimensions[d].clone(),
        combination_weights: combinations[c].clone(),
        auc,
        evaluated_pairs: positives * negatives * evaluated,
        combinations_evaluated: evaluated,
    };

    let mut next = base.successor(CalibrationSource::WeightSearch);
    next.dataset_name = corpus.name().to_string();
    next.dimension_weights = report.dimension_weights.clone();
    next.combination_weights = report.combination_weights.clone();

    info!(
        "Weight search on '{}': {} combinations, best auc={:.4}",
        corpus.name(),
        evaluated,
        auc
    );

    Ok((next, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::fixtures;

    fn params() -> ValidationParams {
        ValidationParams {
            noise_std: 4.0,
            seed: Some(21),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_candidate_pair_is_returned() {
        let corpus = fixtures::corpus(10);
        let base = CalibrationState::defaults("fixture");
        let dimension = CategoryWeights::new([(Category::Knowledge, 0.7)]);
        let combination = CategoryWeights::new([(Category::Skills, 0.1)]);

        let (next, report) = optimize(
            &corpus,
            &base,
            Some(vec![dimension]),
            Some(vec![combination]),
            &params(),
            ScoringOptions::default(),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(report.combinations_evaluated, 1);
        // 10 positives × 30 negatives × 1 combination
        assert_eq!(report.evaluated_pairs, 10 * 30);
        assert_eq!(report.dimension_weights.get(Category::Knowledge), 0.7);
        assert_eq!(report.dimension_weights.get(Category::Skills), 1.0);
        assert_eq!(report.combination_weights.get(Category::Skills), 0.1);
        assert_eq!(report.combination_weights.get(Category::Interests), 0.35);
        assert_eq!(next.combination_weights, report.combination_weights);
        assert_eq!(next.source, CalibrationSource::WeightSearch);
        assert_eq!(next.importance_critical_threshold, base.importance_critical_threshold);
    }

    #[test]
    fn test_default_grids_cover_full_product() {
        let corpus = fixtures::corpus(10);
        let base = CalibrationState::defaults("fixture");
        let (_, report) = optimize(
            &corpus,
            &base,
            None,
            Some(vec![]),
            &params(),
            ScoringOptions::default(),
            &CancellationToken::new(),
        )
        .unwrap();
        let combos = default_dimension_grid().len() * default_combination_grid().len();
        assert_eq!(report.combinations_evaluated, combos);
        assert_eq!(report.evaluated_pairs, 10 * 30 * combos);
        assert!((0.0..=1.0).contains(&report.auc));
    }

    #[test]
    fn test_identical_candidates_keep_the_first() {
        let corpus = fixtures::corpus(8);
        let base = CalibrationState::defaults("fixture");
        let first = CategoryWeights::new([(Category::Abilities, 0.25)]);
        let second = CategoryWeights::new([(Category::Abilities, 0.25)]);
        let (_, report) = optimize(
            &corpus,
            &base,
            Some(vec![CategoryWeights::default()]),
            Some(vec![first, second]),
            &params(),
            ScoringOptions::default(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(report.combinations_evaluated, 2);
        assert_eq!(report.combination_weights, base.combination_weights);
    }

    #[test]
    fn test_rejects_out_of_range_candidates_before_building() {
        let corpus = fixtures::corpus(8);
        let base = CalibrationState::defaults("fixture");
        let err = optimize(
            &corpus,
            &base,
            Some(vec![CategoryWeights::new([(Category::Skills, 1.2)])]),
            None,
            &params(),
            ScoringOptions::default(),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter(_)));
    }

    #[test]
    fn test_requires_both_classes() {
        let corpus = fixtures::corpus(8);
        let base = CalibrationState::defaults("fixture");
        let params = ValidationParams {
            negatives_per_positive: 0,
            seed: Some(2),
            ..Default::default()
        };
        let err = optimize(
            &corpus,
            &base,
            None,
            None,
            &params,
            ScoringOptions::default(),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientValidationData {
                positives: 8,
                negatives: 0
            }
        );
    }
}
