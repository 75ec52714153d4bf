use crate::corpus::{CorpusError, OccupationCorpus};

/// Name of the dataset compiled into the binary.
pub const DATASET_NAME: &str = "onet-core";

const ONET_CORE_JSON: &str = include_str!("../../data/onet-core.json");

/// O*NET-derived sample: 21 occupations, 16 abilities / skills / knowledge areas each,
/// plus RIASEC interest profiles. Values are on the 0–100 scale.
pub fn onet_core() -> Result<OccupationCorpus, CorpusError> {
    OccupationCorpus::from_json(DATASET_NAME, ONET_CORE_JSON)
}
