use std::sync::Arc;

use crate::calibration::CalibrationStore;
use crate::config::Config;
use crate::corpus::CorpusProvider;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Pluggable corpus source. Default: embedded datasets plus `CORPUS_DIR`.
    pub corpus: Arc<dyn CorpusProvider>,
    /// Live calibration snapshot; tuning runs commit through it.
    pub calibration: Arc<CalibrationStore>,
}
