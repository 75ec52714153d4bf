use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{info, warn};

use crate::errors::EngineError;
use crate::models::CalibrationState;

/// Single swap point for the live `CalibrationState`.
///
/// Readers clone an `Arc` snapshot and never wait on a tuning run. Runs hold
/// the tuning lock from snapshot to commit so they never build on a base
/// another run is about to replace.
pub struct CalibrationStore {
    current: RwLock<Arc<CalibrationState>>,
    tuning: Mutex<()>,
}

impl CalibrationStore {
    pub fn new(initial: CalibrationState) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            tuning: Mutex::new(()),
        }
    }

    pub async fn snapshot(&self) -> Arc<CalibrationState> {
        self.current.read().await.clone()
    }

    /// Serializes tuning runs; hold the guard until after `commit`.
    pub async fn lock_tuning(&self) -> MutexGuard<'_, ()> {
        self.tuning.lock().await
    }

    /// Validates `next`, stamps it with the next generation and swaps it in.
    pub async fn commit(&self, mut next: CalibrationState) -> Result<Arc<CalibrationState>, EngineError> {
        next.validate()?;

        let mut current = self.current.write().await;
        next.generation = current.generation + 1;
        let next = Arc::new(next);
        *current = next.clone();
        drop(current);

        info!(
            "Committed calibration generation {} ({:?}, run {})",
            next.generation, next.source, next.run_id
        );
        for warning in next.warnings() {
            warn!("Calibration generation {}: {warning:?}", next.generation);
        }

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CalibrationSource;

    #[tokio::test]
    async fn test_commit_bumps_generation_and_swaps() {
        let store = CalibrationStore::new(CalibrationState::defaults("onet-core"));
        let before = store.snapshot().await;
        assert_eq!(before.generation, 0);

        let mut next = before.successor(CalibrationSource::PercentileThresholds);
        next.importance_critical_threshold = 70.0;
        let committed = store.commit(next).await.unwrap();

        assert_eq!(committed.generation, 1);
        assert_eq!(store.snapshot().await.importance_critical_threshold, 70.0);
        // the old snapshot is untouched
        assert_eq!(before.importance_critical_threshold, 80.0);
    }

    #[tokio::test]
    async fn test_invalid_state_is_not_committed() {
        let store = CalibrationStore::new(CalibrationState::defaults("onet-core"));
        let mut next = store.snapshot().await.successor(CalibrationSource::WeightSearch);
        next.min_requirement_ratio = 1.5;

        assert!(store.commit(next).await.is_err());
        let current = store.snapshot().await;
        assert_eq!(current.generation, 0);
        assert_eq!(current.min_requirement_ratio, 0.75);
    }

    #[tokio::test]
    async fn test_tuning_lock_is_exclusive() {
        let store = CalibrationStore::new(CalibrationState::defaults("onet-core"));
        let guard = store.lock_tuning().await;
        assert!(store.tuning.try_lock().is_err());
        drop(guard);
        assert!(store.tuning.try_lock().is_ok());
    }
}
