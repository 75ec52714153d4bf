//! Percentiles, rank-sum AUC, and the logistic helpers used by the score calibrator.

use crate::errors::EngineError;

const LOG_LOSS_EPSILON: f64 = 1e-15;

/// Percentile with linear interpolation between order statistics
/// (`pct = 0` is the minimum, `100` the maximum).
pub fn percentile(values: &[f64], pct: f64) -> Result<f64, EngineError> {
    if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
        return Err(EngineError::invalid(format!(
            "percentile must be within [0, 100], got {pct}"
        )));
    }
    if values.is_empty() {
        return Err(EngineError::invalid("percentile of an empty set"));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(EngineError::NonFinite("percentile input".into()));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Mann–Whitney AUC with midranks, so tied scores count ½.
///
/// `labels[i]` marks `scores[i]` as a positive. Fails with
/// `InsufficientValidationData` unless both classes are present.
pub fn auc(labels: &[bool], scores: &[f64]) -> Result<f64, EngineError> {
    if labels.len() != scores.len() {
        return Err(EngineError::invalid(format!(
            "{} labels for {} scores",
            labels.len(),
            scores.len()
        )));
    }
    let positives = labels.iter().filter(|l| **l).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(EngineError::InsufficientValidationData {
            positives,
            negatives,
        });
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(EngineError::NonFinite("AUC scores".into()));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| scores[*a].total_cmp(&scores[*b]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // ranks are 1-based; the tie group [start, end) shares the mean rank
        let midrank = (start + end + 1) as f64 / 2.0;
        let group_positives = order[start..end].iter().filter(|i| labels[**i]).count();
        positive_rank_sum += midrank * group_positives as f64;
        start = end;
    }

    let p = positives as f64;
    let n = negatives as f64;
    let u = positive_rank_sum - p * (p + 1.0) / 2.0;
    Ok((u / (p * n)).clamp(0.0, 1.0))
}

/// Numerically stable logistic function.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Mean binary cross-entropy; probabilities are clamped away from 0 and 1.
pub fn log_loss(labels: &[bool], probabilities: &[f64]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let total: f64 = labels
        .iter()
        .zip(probabilities)
        .map(|(label, p)| {
            let p = p.clamp(LOG_LOSS_EPSILON, 1.0 - LOG_LOSS_EPSILON);
            if *label {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    total / labels.len() as f64
}
