//! RIASEC interest similarity: plain cosine, or Holland hexagon congruence.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::RiasecType;

/// Iachan agreement weights for the first, second and third letters of a Holland code.
const IACHAN_WEIGHTS: [f64; 3] = [3.0, 2.0, 1.0];
/// Share of the Iachan component in the blended congruence.
const HEXAGON_BLEND: f64 = 0.6;
const ANGLE_SHARE: f64 = 0.7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestModel {
    #[default]
    Cosine,
    Holland,
}

impl FromStr for InterestModel {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(InterestModel::Cosine),
            "holland" => Ok(InterestModel::Holland),
            other => Err(format!("unknown interest model '{other}'")),
        }
    }
}

impl fmt::Display for InterestModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterestModel::Cosine => f.write_str("cosine"),
            InterestModel::Holland => f.write_str("holland"),
        }
    }
}

impl InterestModel {
    /// Similarity in [0, 1]. Zero when either vector has no positive mass.
    pub fn similarity(&self, user: &[f64; 6], occupation: &[f64; 6]) -> f64 {
        match self {
            InterestModel::Cosine => cosine(user, occupation),
            InterestModel::Holland => holland_congruence(user, occupation),
        }
    }
}

pub fn cosine(a: &[f64; 6], b: &[f64; 6]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Types ordered by score desc; ties keep hexagon order.
fn ranked_types(values: &[f64; 6]) -> [usize; 6] {
    let mut order = [0, 1, 2, 3, 4, 5];
    order.sort_by(|a, b| values[*b].total_cmp(&values[*a]).then(a.cmp(b)));
    order
}

fn hexagon_distance(a: usize, b: usize) -> f64 {
    let diff = a.abs_diff(b);
    diff.min(6 - diff) as f64
}

/// Centroid of the score-weighted hexagon vertices: (angle, magnitude).
fn hexagon_centroid(values: &[f64; 6]) -> (f64, f64) {
    let total: f64 = values.iter().sum();
    let (mut x, mut y) = (0.0, 0.0);
    for (k, value) in values.iter().enumerate() {
        let theta = k as f64 * PI / 3.0;
        x += value / total * theta.cos();
        y += value / total * theta.sin();
    }
    (y.atan2(x), x.hypot(y))
}

/// Iachan top-three agreement blended with a continuous centroid similarity.
pub fn holland_congruence(user: &[f64; 6], occupation: &[f64; 6]) -> f64 {
    let positive = |v: &[f64; 6]| v.iter().sum::<f64>() > 0.0 && v.iter().all(|x| *x >= 0.0);
    if !positive(user) || !positive(occupation) {
        return 0.0;
    }

    let user_code = ranked_types(user);
    let occupation_code = ranked_types(occupation);
    let discrete: f64 = IACHAN_WEIGHTS
        .iter()
        .enumerate()
        .map(|(i, weight)| (weight - hexagon_distance(user_code[i], occupation_code[i])).max(0.0))
        .sum::<f64>()
        / IACHAN_WEIGHTS.iter().sum::<f64>();

    let (user_angle, user_magnitude) = hexagon_centroid(user);
    let (occupation_angle, occupation_magnitude) = hexagon_centroid(occupation);
    let mut angle_diff = (user_angle - occupation_angle).abs();
    angle_diff = angle_diff.min(2.0 * PI - angle_diff);
    let angular = 0.5 * (1.0 + angle_diff.cos());
    let magnitude = (1.0 - (user_magnitude - occupation_magnitude).abs()).max(0.0);
    let continuous = ANGLE_SHARE * angular + (1.0 - ANGLE_SHARE) * magnitude;

    (HEXAGON_BLEND * discrete + (1.0 - HEXAGON_BLEND) * continuous).clamp(0.0, 1.0)
}

/// RIASEC names positive in both vectors, top three by product.
pub fn shared_types(user: &[f64; 6], occupation: &[f64; 6]) -> (usize, Vec<String>) {
    let mut shared: Vec<(RiasecType, f64)> = RiasecType::ALL
        .into_iter()
        .filter(|t| user[t.index()] > 0.0 && occupation[t.index()] > 0.0)
        .map(|t| (t, user[t.index()] * occupation[t.index()]))
        .collect();
    let overlap = shared.len();
    shared.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.index().cmp(&b.0.index())));
    let names = shared
        .into_iter()
        .take(3)
        .map(|(t, _)| t.name().to_string())
        .collect();
    (overlap, names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        let a = [10.0, 80.0, 0.0, 0.0, 20.0, 60.0];
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-12);
        let b = [0.0, 0.0, 50.0, 50.0, 0.0, 0.0];
        assert_eq!(cosine(&a, &b), 0.0);
        assert_eq!(cosine(&a, &[0.0; 6]), 0.0);
    }

    #[test]
    fn test_holland_identical_profiles_are_fully_congruent() {
        let a = [10.0, 80.0, 5.0, 0.0, 20.0, 60.0];
        assert!((holland_congruence(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_holland_prefers_adjacent_codes() {
        // User IRC; one occupation shares the code, the other sits opposite on the hexagon.
        let user = [50.0, 90.0, 0.0, 0.0, 0.0, 40.0];
        let same = [45.0, 85.0, 5.0, 5.0, 5.0, 35.0];
        let opposite = [0.0, 0.0, 40.0, 90.0, 50.0, 0.0];
        assert!(holland_congruence(&user, &same) > holland_congruence(&user, &opposite));
        assert!(holland_congruence(&user, &opposite) >= 0.0);
    }

    #[test]
    fn test_shared_types_ranked_by_product() {
        let user = [10.0, 80.0, 0.0, 0.0, 20.0, 60.0];
        let occupation = [50.0, 70.0, 30.0, 0.0, 10.0, 90.0];
        let (overlap, names) = shared_types(&user, &occupation);
        assert_eq!(overlap, 4);
        assert_eq!(names, vec!["Investigative", "Conventional", "Realistic"]);
    }

    #[test]
    fn test_interest_model_parses_case_insensitively() {
        assert_eq!("Holland".parse::<InterestModel>(), Ok(InterestModel::Holland));
        assert_eq!("cosine".parse::<InterestModel>(), Ok(InterestModel::Cosine));
        assert!("pearson".parse::<InterestModel>().is_err());
    }
}
