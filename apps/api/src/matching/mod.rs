//! Matching Engine: raw fit score and per-category contributions for a
//! (user profile, occupation) pair under a given threshold/weight configuration.
//!
//! Descriptor categories score importance-weighted agreement between the user's
//! rating and the occupation's required level. Only descriptors the user meets
//! (`rating ≥ ratio × level`) count, except critical ones (`importance >
//! threshold`) which count as a zero-agreement miss when unmet. Interests use the
//! configured [`InterestModel`]. Category scores are combined with combination
//! weights redistributed over the categories the user supplied.
//!
//! Under [`RelevanceGate::Strict`] a category only contributes when the user
//! rated at least [`min_overlap`] of its descriptors and met every critical one.

pub mod interests;
pub mod parallel;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::models::{
    CalibrationState, Category, CategoryWeights, Descriptor, OccupationProfile, RiasecType,
    Thresholds, UserProfile, RATING_MAX,
};

pub use interests::InterestModel;

const MAX_ELEMENTS_MATCHED: usize = 3;

/// Fewest rated descriptors (RIASEC types shared, for interests) a category
/// needs to contribute under the strict gate.
pub fn min_overlap(category: Category) -> usize {
    match category {
        Category::Interests => 3,
        Category::Abilities => 5,
        Category::Knowledge => 4,
        Category::Skills => 4,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceGate {
    /// Unmet critical descriptors count as zero-agreement misses.
    #[default]
    Soft,
    /// A category below its minimum overlap, or with any unmet critical
    /// descriptor, contributes nothing.
    Strict,
}

impl FromStr for RelevanceGate {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "soft" => Ok(RelevanceGate::Soft),
            "strict" => Ok(RelevanceGate::Strict),
            other => Err(format!("unknown relevance gate '{other}'")),
        }
    }
}

impl fmt::Display for RelevanceGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelevanceGate::Soft => f.write_str("soft"),
            RelevanceGate::Strict => f.write_str("strict"),
        }
    }
}

/// Service-level scoring choices that are not part of the calibration state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoringOptions {
    pub interest_model: InterestModel,
    pub relevance_gate: RelevanceGate,
}

impl From<InterestModel> for ScoringOptions {
    fn from(interest_model: InterestModel) -> Self {
        Self {
            interest_model,
            ..Self::default()
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Configuration and outputs
// ────────────────────────────────────────────────────────────────────────────

/// Everything a scoring call reads. Built from a `CalibrationState` snapshot or
/// from a candidate under evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub thresholds: Thresholds,
    pub dimension_weights: CategoryWeights,
    pub combination_weights: CategoryWeights,
    pub interest_model: InterestModel,
    pub relevance_gate: RelevanceGate,
}

impl ScoringConfig {
    pub fn from_state(state: &CalibrationState, options: ScoringOptions) -> Self {
        Self {
            thresholds: state.thresholds(),
            dimension_weights: state.dimension_weights.clone(),
            combination_weights: state.combination_weights.clone(),
            interest_model: options.interest_model,
            relevance_gate: options.relevance_gate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryContribution {
    pub category: Category,
    /// 0 – 100
    pub score: f64,
    /// Effective combination weight after redistribution.
    pub weight: f64,
    pub overlap_count: usize,
    pub elements_matched: Vec<String>,
    #[serde(default)]
    pub critical_misses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OccupationScore {
    /// 0 – 1
    pub raw_score: f64,
    pub contributions: Vec<CategoryContribution>,
}

// ────────────────────────────────────────────────────────────────────────────
// PreparedProfile
// ────────────────────────────────────────────────────────────────────────────

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A validated user profile indexed for repeated scoring.
#[derive(Debug, Clone)]
pub struct PreparedProfile {
    ratings: HashMap<Category, HashMap<String, f64>>,
    interests: [f64; 6],
    present: Vec<Category>,
}

impl PreparedProfile {
    /// Rejects non-finite ratings and ratings outside the 0–100 scale. Later
    /// duplicates of a descriptor name win.
    pub fn new(user: &UserProfile) -> Result<Self, EngineError> {
        let mut ratings: HashMap<Category, HashMap<String, f64>> = HashMap::new();
        let mut interests = [0.0; 6];

        for category in Category::ALL {
            for rating in user.ratings(category) {
                if !rating.rating.is_finite() {
                    return Err(EngineError::NonFinite(format!(
                        "{category} rating '{}'",
                        rating.name
                    )));
                }
                if !(0.0..=RATING_MAX).contains(&rating.rating) {
                    return Err(EngineError::invalid(format!(
                        "{category} rating '{}' must be within [0, {RATING_MAX}], got {}",
                        rating.name, rating.rating
                    )));
                }

                if category == Category::Interests {
                    if let Some(kind) = RiasecType::parse(&rating.name) {
                        interests[kind.index()] = rating.rating;
                    }
                } else {
                    ratings
                        .entry(category)
                        .or_default()
                        .insert(normalize_name(&rating.name), rating.rating);
                }
            }
        }

        Ok(Self {
            ratings,
            interests,
            present: user.present_categories(),
        })
    }

    /// Categories the user supplied data for, in canonical order.
    pub fn present_categories(&self) -> &[Category] {
        &self.present
    }

    fn rating(&self, category: Category, name: &str) -> Option<f64> {
        self.ratings
            .get(&category)
            .and_then(|r| r.get(&normalize_name(name)))
            .copied()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scoring
// ────────────────────────────────────────────────────────────────────────────

struct CategoryScore {
    score: f64,
    overlap_count: usize,
    elements_matched: Vec<String>,
    critical_misses: Vec<String>,
}

impl CategoryScore {
    fn empty() -> Self {
        Self {
            score: 0.0,
            overlap_count: 0,
            elements_matched: Vec::new(),
            critical_misses: Vec::new(),
        }
    }
}

fn score_descriptors(
    profile: &PreparedProfile,
    category: Category,
    descriptors: &[Descriptor],
    config: &ScoringConfig,
) -> CategoryScore {
    let total_importance: f64 = descriptors
        .iter()
        .filter(|d| d.importance > 0.0)
        .map(|d| d.importance)
        .sum();
    if total_importance <= 0.0 {
        return CategoryScore::empty();
    }

    let dimension_weight = config.dimension_weights.get(category);
    let thresholds = &config.thresholds;

    let mut agreement_sum = 0.0;
    let mut denominator = 0.0;
    let mut matched: Vec<(&str, f64)> = Vec::new();
    let mut critical_misses = Vec::new();
    let mut rated = 0;

    for descriptor in descriptors.iter().filter(|d| d.importance > 0.0) {
        let Some(rating) = profile.rating(category, &descriptor.name) else {
            continue;
        };
        rated += 1;
        let relative = descriptor.importance / total_importance;

        if rating >= thresholds.min_requirement_ratio * descriptor.level {
            let agreement = 1.0 - (rating / RATING_MAX - descriptor.level / RATING_MAX).abs();
            agreement_sum += relative * agreement;
            denominator += relative;
            matched.push((&descriptor.name, dimension_weight * relative * agreement));
        } else if descriptor.importance > thresholds.importance_critical_threshold {
            denominator += relative;
            critical_misses.push(descriptor.name.clone());
        }
    }

    if config.relevance_gate == RelevanceGate::Strict
        && (rated < min_overlap(category) || !critical_misses.is_empty())
    {
        return CategoryScore::empty();
    }

    if matched.is_empty() {
        return CategoryScore {
            critical_misses,
            ..CategoryScore::empty()
        };
    }

    let overlap_count = matched.len();
    matched.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    CategoryScore {
        score: dimension_weight * agreement_sum / denominator * 100.0,
        overlap_count,
        elements_matched: matched
            .into_iter()
            .take(MAX_ELEMENTS_MATCHED)
            .map(|(name, _)| name.to_string())
            .collect(),
        critical_misses,
    }
}

fn score_interests(
    profile: &PreparedProfile,
    occupation: &OccupationProfile,
    config: &ScoringConfig,
) -> CategoryScore {
    let Some(occupation_interests) = occupation.interests else {
        return CategoryScore::empty();
    };
    let occupation_interests = occupation_interests.to_array();

    let (overlap_count, elements_matched) =
        interests::shared_types(&profile.interests, &occupation_interests);
    if overlap_count == 0 {
        return CategoryScore::empty();
    }
    if config.relevance_gate == RelevanceGate::Strict
        && overlap_count < min_overlap(Category::Interests)
    {
        return CategoryScore::empty();
    }

    let similarity = config
        .interest_model
        .similarity(&profile.interests, &occupation_interests);

    CategoryScore {
        score: similarity * config.dimension_weights.get(Category::Interests) * 100.0,
        overlap_count,
        elements_matched,
        critical_misses: Vec::new(),
    }
}

/// Effective combination weight per present category: `w × total / present_mass`.
/// The returned weights sum to the full mass whenever any present category has weight.
pub fn effective_combination_weights(
    weights: &CategoryWeights,
    present: &[Category],
) -> Vec<(Category, f64)> {
    let total = weights.total();
    let present_mass: f64 = present.iter().map(|c| weights.get(*c)).sum();

    present
        .iter()
        .map(|c| {
            let effective = if present_mass > 0.0 {
                weights.get(*c) * total / present_mass
            } else {
                0.0
            };
            (*c, effective)
        })
        .collect()
}

/// Scores one occupation. Zero overlap everywhere yields `raw_score = 0` and no
/// contributions.
pub fn score_occupation(
    profile: &PreparedProfile,
    occupation: &OccupationProfile,
    config: &ScoringConfig,
) -> Result<OccupationScore, EngineError> {
    let total = config.combination_weights.total();

    let mut raw_score = 0.0;
    let mut contributions = Vec::new();

    for (category, weight) in
        effective_combination_weights(&config.combination_weights, profile.present_categories())
    {
        let category_score = match category {
            Category::Interests => score_interests(profile, occupation, config),
            _ => score_descriptors(
                profile,
                category,
                occupation.descriptors(category),
                config,
            ),
        };

        if !category_score.score.is_finite() {
            return Err(EngineError::NonFinite(format!(
                "{category} score for {}",
                occupation.code
            )));
        }
        if category_score.overlap_count == 0 {
            continue;
        }

        if total > 0.0 {
            raw_score += weight * category_score.score / 100.0 / total;
        }
        contributions.push(CategoryContribution {
            category,
            score: category_score.score,
            weight,
            overlap_count: category_score.overlap_count,
            elements_matched: category_score.elements_matched,
            critical_misses: category_score.critical_misses,
        });
    }

    if !raw_score.is_finite() {
        return Err(EngineError::NonFinite(format!(
            "raw score for {}",
            occupation.code
        )));
    }

    Ok(OccupationScore {
        raw_score: raw_score.clamp(0.0, 1.0),
        contributions,
    })
}
