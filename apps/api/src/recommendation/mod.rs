//! Recommendation Orchestrator: scores every occupation against a user profile
//! under one calibration snapshot and returns the ranked top-K matches.

pub mod handlers;

use std::cmp::Ordering;

use serde::Serialize;

use crate::calibration::stats::sigmoid;
use crate::calibration::thresholds::check_top_k;
use crate::cancel::CancellationToken;
use crate::corpus::OccupationCorpus;
use crate::errors::EngineError;
use crate::matching::{
    self, parallel, CategoryContribution, PreparedProfile, ScoringConfig, ScoringOptions,
};
use crate::models::{CalibrationState, Category, UserProfile};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupationMatch {
    pub code: String,
    pub title: String,
    /// Calibrated match probability when a score calibration is enabled, else the raw score.
    pub correlation: f64,
    pub raw_score: f64,
    pub calibrated: bool,
    pub contributions: Vec<CategoryContribution>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendations {
    pub matches: Vec<OccupationMatch>,
    pub total_occupations_analyzed: usize,
    pub categories_used: Vec<Category>,
}

/// correlation desc, then raw score desc, then title asc
fn rank(a: &OccupationMatch, b: &OccupationMatch) -> Ordering {
    b.correlation
        .total_cmp(&a.correlation)
        .then_with(|| b.raw_score.total_cmp(&a.raw_score))
        .then_with(|| a.title.cmp(&b.title))
}

/// "Strong match based on your X and Y" from the two largest `weight × score` contributions.
fn multi_category_rationale(contributions: &[CategoryContribution]) -> String {
    let mut ranked: Vec<&CategoryContribution> = contributions.iter().collect();
    ranked.sort_by(|a, b| (b.weight * b.score).total_cmp(&(a.weight * a.score)));
    let names: Vec<&str> = ranked.iter().take(2).map(|c| c.category.as_str()).collect();
    format!("Strong match based on your {}", names.join(" and "))
}

fn single_category_rationale(category: Category, overlap: usize) -> String {
    match category {
        Category::Interests => "Based on RIASEC interest profile".to_string(),
        Category::Skills => format!("Based on {overlap} matching skills"),
        Category::Abilities => format!("Based on {overlap} matching abilities"),
        Category::Knowledge => format!("Based on {overlap} matching knowledge areas"),
    }
}

#[allow(clippy::too_many_arguments)]
fn score_and_rank(
    corpus: &OccupationCorpus,
    state: &CalibrationState,
    user: &UserProfile,
    top_k: usize,
    options: ScoringOptions,
    apply_calibration: bool,
    describe: impl Fn(&[CategoryContribution]) -> String,
    cancel: &CancellationToken,
) -> Result<Recommendations, EngineError> {
    let top_k = check_top_k(top_k)?;
    let profile = PreparedProfile::new(user)?;
    if profile.present_categories().is_empty() {
        return Err(EngineError::invalid("user_profile contains no ratings"));
    }

    let config = ScoringConfig::from_state(state, options);
    let transform = state
        .score_calibration
        .as_ref()
        .filter(|fit| apply_calibration && fit.enabled)
        .map(|fit| (fit.a, fit.b));

    let scores = parallel::try_map(corpus.occupations(), cancel, |occupation| {
        matching::score_occupation(&profile, occupation, &config)
    })?;

    let mut matches: Vec<OccupationMatch> = corpus
        .occupations()
        .iter()
        .zip(scores)
        .filter(|(_, score)| !score.contributions.is_empty())
        .map(|(occupation, score)| {
            let correlation = match transform {
                Some((a, b)) => sigmoid(a * score.raw_score + b),
                None => score.raw_score,
            };
            OccupationMatch {
                code: occupation.code.clone(),
                title: occupation.title.clone(),
                correlation,
                raw_score: score.raw_score,
                calibrated: transform.is_some(),
                description: describe(&score.contributions),
                contributions: score.contributions,
            }
        })
        .collect();

    matches.sort_by(rank);
    matches.truncate(top_k);

    Ok(Recommendations {
        matches,
        total_occupations_analyzed: corpus.len(),
        categories_used: profile.present_categories().to_vec(),
    })
}

/// Multi-category recommendation under one calibration snapshot.
pub fn recommend(
    corpus: &OccupationCorpus,
    state: &CalibrationState,
    user: &UserProfile,
    top_k: usize,
    options: ScoringOptions,
    cancel: &CancellationToken,
) -> Result<Recommendations, EngineError> {
    score_and_rank(
        corpus,
        state,
        user,
        top_k,
        options,
        true,
        multi_category_rationale,
        cancel,
    )
}

/// Scores only the category with the most ratings. The score transform is fit
/// on multi-category raw scores, so single-category correlations stay raw.
pub fn analyze_single(
    corpus: &OccupationCorpus,
    state: &CalibrationState,
    user: &UserProfile,
    top_k: usize,
    options: ScoringOptions,
    cancel: &CancellationToken,
) -> Result<(Category, Recommendations), EngineError> {
    let category = user
        .primary_category()
        .ok_or_else(|| EngineError::invalid("Insufficient assessment data"))?;

    let recommendations = score_and_rank(
        corpus,
        state,
        &user.only(category),
        top_k,
        options,
        false,
        |contributions| {
            let overlap = contributions.first().map_or(0, |c| c.overlap_count);
            single_category_rationale(category, overlap)
        },
        cancel,
    )?;
    Ok((category, recommendations))
}
