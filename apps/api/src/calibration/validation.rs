//! Validation Dataset Builder: synthesizes labeled (user, occupation) pairs from a corpus.
//!
//! Each sampled occupation yields synthetic users whose ratings are the
//! occupation's top descriptors at their required level plus Gaussian noise.
//! A user is paired with its source occupation (label 1) and with distinct
//! other occupations drawn uniformly (label 0).

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::calibration::stats;
use crate::cancel::CancellationToken;
use crate::corpus::OccupationCorpus;
use crate::errors::EngineError;
use crate::matching::{self, parallel, PreparedProfile, ScoringConfig};
use crate::models::{Category, OccupationProfile, Rating, RiasecType, UserProfile, RATING_MAX};

/// Upper bound on `sample × positives × (1 + negatives)` for one dataset.
pub const MAX_VALIDATION_PAIRS: usize = 250_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationParams {
    /// `None` samples the whole corpus.
    pub sample_occupations: Option<usize>,
    pub positives_per_occupation: usize,
    pub negatives_per_positive: usize,
    pub topn_abilities: usize,
    pub topn_skills: usize,
    pub topn_knowledge: usize,
    pub include_interests: bool,
    pub noise_std: f64,
    pub seed: Option<u64>,
}

impl Default for ValidationParams {
    fn default() -> Self {
        Self {
            sample_occupations: None,
            positives_per_occupation: 1,
            negatives_per_positive: 3,
            topn_abilities: 5,
            topn_skills: 5,
            topn_knowledge: 5,
            include_interests: true,
            noise_std: 5.0,
            seed: None,
        }
    }
}

impl ValidationParams {
    pub fn validate(&self, corpus_size: usize) -> Result<(), EngineError> {
        if let Some(sample) = self.sample_occupations {
            if sample == 0 || sample > corpus_size {
                return Err(EngineError::invalid(format!(
                    "sample_occupations must be within [1, {corpus_size}], got {sample}"
                )));
            }
        }
        if self.positives_per_occupation == 0 {
            return Err(EngineError::invalid("positives_per_occupation must be >= 1"));
        }
        if self.negatives_per_positive > corpus_size.saturating_sub(1) {
            return Err(EngineError::invalid(format!(
                "negatives_per_positive must be <= {}, got {}",
                corpus_size.saturating_sub(1),
                self.negatives_per_positive
            )));
        }
        if !self.noise_std.is_finite() || self.noise_std < 0.0 {
            return Err(EngineError::invalid(format!(
                "noise_std must be finite and >= 0, got {}",
                self.noise_std
            )));
        }
        self.pair_count(corpus_size)?;
        Ok(())
    }

    /// Dataset size these params produce on a corpus of `corpus_size`.
    pub fn pair_count(&self, corpus_size: usize) -> Result<usize, EngineError> {
        let sample = self.sample_occupations.unwrap_or(corpus_size);
        sample
            .checked_mul(self.positives_per_occupation)
            .and_then(|users| users.checked_mul(self.negatives_per_positive.checked_add(1)?))
            .filter(|pairs| *pairs <= MAX_VALIDATION_PAIRS)
            .ok_or_else(|| {
                EngineError::invalid(format!(
                    "validation dataset would exceed {MAX_VALIDATION_PAIRS} pairs \
                     ({sample} occupations × {} positives × {} pairs per positive)",
                    self.positives_per_occupation,
                    self.negatives_per_positive.saturating_add(1)
                ))
            })
    }

    fn topn(&self, category: Category) -> usize {
        match category {
            Category::Abilities => self.topn_abilities,
            Category::Skills => self.topn_skills,
            Category::Knowledge => self.topn_knowledge,
            Category::Interests => 0,
        }
    }
}

/// One labeled pair. `user` indexes `ValidationDataset::users`, `occupation`
/// indexes the corpus the dataset was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationPair {
    pub user: usize,
    pub occupation: usize,
    pub label: u8,
}

#[derive(Debug, Clone)]
pub struct ValidationDataset {
    pub users: Vec<UserProfile>,
    pub pairs: Vec<ValidationPair>,
    prepared: Vec<PreparedProfile>,
}

impl ValidationDataset {
    pub fn positives(&self) -> usize {
        self.pairs.iter().filter(|p| p.label == 1).count()
    }

    pub fn negatives(&self) -> usize {
        self.pairs.len() - self.positives()
    }

    pub fn labels(&self) -> Vec<bool> {
        self.pairs.iter().map(|p| p.label == 1).collect()
    }

    /// Both classes must be present for any AUC-based consumer.
    pub fn ensure_discriminable(&self) -> Result<(), EngineError> {
        let (positives, negatives) = (self.positives(), self.negatives());
        if positives == 0 || negatives == 0 {
            return Err(EngineError::InsufficientValidationData {
                positives,
                negatives,
            });
        }
        Ok(())
    }

    /// Raw score of every pair under `config`, in pair order.
    pub fn score(
        &self,
        corpus: &OccupationCorpus,
        config: &ScoringConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<f64>, EngineError> {
        parallel::try_map(&self.pairs, cancel, |pair| {
            let occupation = corpus.get(pair.occupation).ok_or_else(|| {
                EngineError::invalid(format!(
                    "validation pair references occupation {} outside the corpus",
                    pair.occupation
                ))
            })?;
            matching::score_occupation(&self.prepared[pair.user], occupation, config)
                .map(|s| s.raw_score)
        })
    }

    /// AUC of the raw scores under `config`.
    pub fn auc(
        &self,
        corpus: &OccupationCorpus,
        config: &ScoringConfig,
        cancel: &CancellationToken,
    ) -> Result<f64, EngineError> {
        self.ensure_discriminable()?;
        let scores = self.score(corpus, config, cancel)?;
        stats::auc(&self.labels(), &scores)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

/// Zero-mean Gaussian sample (Box–Muller).
fn gaussian(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev == 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn perturb(rng: &mut StdRng, value: f64, std_dev: f64) -> f64 {
    (value + gaussian(rng, std_dev)).clamp(0.0, RATING_MAX)
}

fn synthetic_user(
    occupation: &OccupationProfile,
    params: &ValidationParams,
    rng: &mut StdRng,
) -> UserProfile {
    let mut user = UserProfile::default();

    for category in Category::DESCRIPTOR {
        let ratings: Vec<Rating> = occupation
            .top_descriptors(category, params.topn(category))
            .into_iter()
            .map(|d| Rating::new(d.name.clone(), perturb(rng, d.level, params.noise_std)))
            .collect();
        *user.ratings_mut(category) = ratings;
    }

    if params.include_interests {
        if let Some(interests) = occupation.interests {
            user.interests = RiasecType::ALL
                .into_iter()
                .map(|kind| {
                    Rating::new(
                        kind.name(),
                        perturb(rng, interests.get(kind), params.noise_std),
                    )
                })
                .collect();
        }
    }

    user
}

/// Builds the labeled dataset. Deterministic when `params.seed` is set.
pub fn build(
    corpus: &OccupationCorpus,
    params: &ValidationParams,
    cancel: &CancellationToken,
) -> Result<ValidationDataset, EngineError> {
    if corpus.is_empty() {
        return Err(EngineError::EmptyCorpus(corpus.name().to_string()));
    }
    params.validate(corpus.len())?;

    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let n = corpus.len();
    let sample = params.sample_occupations.unwrap_or(n);
    let sampled = index::sample(&mut rng, n, sample).into_vec();

    let mut users = Vec::new();
    let mut prepared = Vec::new();
    let mut pairs = Vec::new();

    for occupation_index in sampled {
        let occupation = &corpus.occupations()[occupation_index];
        for _ in 0..params.positives_per_occupation {
            cancel.check()?;
            let user = synthetic_user(occupation, params, &mut rng);
            let user_index = users.len();
            prepared.push(PreparedProfile::new(&user)?);
            users.push(user);

            pairs.push(ValidationPair {
                user: user_index,
                occupation: occupation_index,
                label: 1,
            });

            // Draw from the n − 1 other occupations, skipping over the true one.
            for other in index::sample(&mut rng, n - 1, params.negatives_per_positive) {
                let negative = if other >= occupation_index {
                    other + 1
                } else {
                    other
                };
                pairs.push(ValidationPair {
                    user: user_index,
                    occupation: negative,
                    label: 0,
                });
            }
        }
    }

    Ok(ValidationDataset {
        users,
        pairs,
        prepared,
    })
}
