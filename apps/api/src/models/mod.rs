pub mod calibration;
pub mod occupation;
pub mod profile;

pub use calibration::{
    CalibrationRule, CalibrationSource, CalibrationState, CalibrationWarning, CategoryWeights,
    ScoreCalibration, Thresholds,
};
pub use occupation::{Category, Descriptor, OccupationProfile, RiasecProfile, RiasecType};
pub use profile::{Rating, UserProfile, RATING_MAX};
