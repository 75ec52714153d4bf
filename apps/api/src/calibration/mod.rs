//! Calibration: validation data synthesis plus the three tuning runs
//! (thresholds, weights, score transform) and the store they commit to.
//!
//! Every run is a pure function from (corpus, base state, parameters) to an
//! uncommitted successor state. Handlers execute runs on the blocking pool
//! under the tuning lock and hand the result to `CalibrationStore::commit`.

pub mod handlers;
pub mod score;
pub mod stats;
pub mod store;
pub mod thresholds;
pub mod validation;
pub mod weights;

use crate::cancel::CancellationToken;
use crate::corpus::OccupationCorpus;
use crate::errors::EngineError;
use crate::matching::ScoringOptions;
use crate::models::CalibrationState;

pub use store::CalibrationStore;

/// Percentile calibration with default percentiles, used at boot.
pub fn startup_calibration(
    corpus: &OccupationCorpus,
    options: ScoringOptions,
) -> Result<CalibrationState, EngineError> {
    let base = CalibrationState::defaults(corpus.name());
    let mode = thresholds::CalibrationMode::resolve(None, None, None, None, None)?;
    let (next, _) = thresholds::calibrate(
        corpus,
        &base,
        &mode,
        thresholds::DEFAULT_RULES_TOP_K,
        options,
        &CancellationToken::new(),
    )?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::builtin;
    use crate::models::CalibrationSource;

    #[tokio::test]
    async fn test_startup_calibration_commits_generation_one() {
        let corpus = builtin::onet_core().unwrap();
        let store = CalibrationStore::new(CalibrationState::defaults(corpus.name()));
        let next = startup_calibration(&corpus, ScoringOptions::default()).unwrap();
        let committed = store.commit(next).await.unwrap();

        assert_eq!(committed.generation, 1);
        assert_eq!(committed.source, CalibrationSource::PercentileThresholds);
        assert_eq!(committed.dataset_name, "onet-core");
        assert!(committed.rules_count > 0);
        assert!(committed.sample_rules.len() <= 20);
        assert!(committed.is_consistent());
    }
}
