use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

use crate::calibration::thresholds::check_top_k;
use crate::corpus::builtin;
use crate::matching::{InterestModel, RelevanceGate, ScoringOptions};

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Directory of additional datasets (`<name>.json` or `<name>/*.csv`).
    pub corpus_dir: Option<PathBuf>,
    pub default_dataset: String,
    pub tuning_timeout_secs: u64,
    pub recommendation_top_k: usize,
    pub validation_seed: Option<u64>,
    pub calibrate_on_startup: bool,
    pub interest_model: InterestModel,
    pub relevance_gate: RelevanceGate,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Config {
            port: parse_or(&var, "PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            corpus_dir: var("CORPUS_DIR").map(PathBuf::from),
            default_dataset: var("DEFAULT_DATASET")
                .unwrap_or_else(|| builtin::DATASET_NAME.to_string()),
            tuning_timeout_secs: parse_or(&var, "TUNING_TIMEOUT_SECS", 120)
                .context("TUNING_TIMEOUT_SECS must be a whole number of seconds")?,
            recommendation_top_k: parse_or(&var, "RECOMMENDATION_TOP_K", 20)
                .and_then(|top_k| check_top_k(top_k).map_err(anyhow::Error::from))
                .context("RECOMMENDATION_TOP_K must be an integer within [1, 500]")?,
            validation_seed: var("VALIDATION_SEED")
                .map(|raw| raw.trim().parse::<u64>())
                .transpose()
                .context("VALIDATION_SEED must be an unsigned integer")?,
            calibrate_on_startup: parse_bool(var("CALIBRATE_ON_STARTUP"), true)
                .context("CALIBRATE_ON_STARTUP must be true or false")?,
            interest_model: var("INTEREST_MODEL")
                .map(|raw| raw.parse::<InterestModel>())
                .transpose()
                .map_err(|e| anyhow!(e))
                .context("INTEREST_MODEL must be 'cosine' or 'holland'")?
                .unwrap_or_default(),
            relevance_gate: var("RELEVANCE_GATE")
                .map(|raw| raw.parse::<RelevanceGate>())
                .transpose()
                .map_err(|e| anyhow!(e))
                .context("RELEVANCE_GATE must be 'soft' or 'strict'")?
                .unwrap_or_default(),
        })
    }

    pub fn scoring_options(&self) -> ScoringOptions {
        ScoringOptions {
            interest_model: self.interest_model,
            relevance_gate: self.relevance_gate,
        }
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value '{raw}' for {key}")),
        None => Ok(default),
    }
}

fn parse_bool(raw: Option<String>, default: bool) -> Result<bool> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(anyhow!("invalid boolean '{v}'")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.default_dataset, "onet-core");
        assert_eq!(config.tuning_timeout_secs, 120);
        assert_eq!(config.recommendation_top_k, 20);
        assert_eq!(config.validation_seed, None);
        assert!(config.calibrate_on_startup);
        assert_eq!(config.interest_model, InterestModel::Cosine);
        assert_eq!(config.relevance_gate, RelevanceGate::Soft);
        assert!(config.corpus_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("PORT", "9090"),
            ("CORPUS_DIR", "/srv/corpora"),
            ("DEFAULT_DATASET", "onet-2024"),
            ("VALIDATION_SEED", "42"),
            ("CALIBRATE_ON_STARTUP", "false"),
            ("INTEREST_MODEL", "Holland"),
            ("RELEVANCE_GATE", "strict"),
        ])
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.corpus_dir, Some(PathBuf::from("/srv/corpora")));
        assert_eq!(config.default_dataset, "onet-2024");
        assert_eq!(config.validation_seed, Some(42));
        assert!(!config.calibrate_on_startup);
        assert_eq!(config.interest_model, InterestModel::Holland);
        assert_eq!(
            config.scoring_options(),
            ScoringOptions {
                interest_model: InterestModel::Holland,
                relevance_gate: RelevanceGate::Strict,
            }
        );
    }

    #[test]
    fn test_malformed_values_fail() {
        assert!(config(&[("PORT", "not-a-port")]).is_err());
        assert!(config(&[("VALIDATION_SEED", "-3")]).is_err());
        assert!(config(&[("CALIBRATE_ON_STARTUP", "maybe")]).is_err());
        assert!(config(&[("INTEREST_MODEL", "pearson")]).is_err());
        assert!(config(&[("RELEVANCE_GATE", "loose")]).is_err());
    }

    #[test]
    fn test_recommendation_top_k_is_range_checked() {
        assert!(config(&[("RECOMMENDATION_TOP_K", "0")]).is_err());
        assert!(config(&[("RECOMMENDATION_TOP_K", "501")]).is_err());
        assert_eq!(
            config(&[("RECOMMENDATION_TOP_K", "500")])
                .unwrap()
                .recommendation_top_k,
            500
        );
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = config(&[("PORT", "  "), ("DEFAULT_DATASET", "")]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.default_dataset, "onet-core");
    }
}
