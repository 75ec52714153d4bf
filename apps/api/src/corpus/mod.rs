//! Occupation Corpus: read-only tables of occupation profiles, keyed by dataset name.
//!
//! `AppState` holds an `Arc<dyn CorpusProvider>`. The default provider serves the
//! embedded `onet-core` dataset and, when `CORPUS_DIR` is set, additional datasets
//! from disk (native JSON or O*NET long-format CSV directories). Loaded corpora are
//! cached and shared as `Arc<OccupationCorpus>` across concurrent readers.

pub mod builtin;
pub mod onet_csv;

#[cfg(test)]
pub mod fixtures;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::models::{Category, OccupationProfile};

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("dataset '{0}' not found")]
    NotFound(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid corpus JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid O*NET CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid corpus '{dataset}': {reason}")]
    Invalid { dataset: String, reason: String },

    #[error("corpus loader task failed: {0}")]
    Task(String),
}

// ────────────────────────────────────────────────────────────────────────────
// OccupationCorpus
// ────────────────────────────────────────────────────────────────────────────

/// On-disk / embedded JSON shape of a corpus.
#[derive(Debug, Deserialize)]
struct CorpusDocument {
    occupations: Vec<OccupationProfile>,
}

/// A validated, immutable set of occupation profiles.
#[derive(Debug, Clone)]
pub struct OccupationCorpus {
    name: String,
    occupations: Vec<OccupationProfile>,
}

impl OccupationCorpus {
    /// Validates every profile: unique codes, non-empty titles, finite values in [0, 100].
    pub fn new(
        name: impl Into<String>,
        occupations: Vec<OccupationProfile>,
    ) -> Result<Self, CorpusError> {
        let name = name.into();
        let invalid = |reason: String| CorpusError::Invalid {
            dataset: name.clone(),
            reason,
        };

        let mut codes = HashSet::new();
        for occupation in &occupations {
            if occupation.title.trim().is_empty() {
                return Err(invalid(format!("occupation {} has no title", occupation.code)));
            }
            if !codes.insert(occupation.code.as_str()) {
                return Err(invalid(format!("duplicate occupation code {}", occupation.code)));
            }
            for category in Category::DESCRIPTOR {
                for descriptor in occupation.descriptors(category) {
                    for (scale, value) in [
                        ("importance", descriptor.importance),
                        ("level", descriptor.level),
                    ] {
                        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                            return Err(invalid(format!(
                                "{} / {} {scale} {value} outside [0, 100]",
                                occupation.title, descriptor.name
                            )));
                        }
                    }
                }
            }
            if let Some(interests) = &occupation.interests {
                if interests
                    .to_array()
                    .iter()
                    .any(|v| !v.is_finite() || *v < 0.0)
                {
                    return Err(invalid(format!(
                        "{} has a negative or non-finite interest score",
                        occupation.title
                    )));
                }
            }
        }

        Ok(Self { name, occupations })
    }

    pub fn from_json(name: impl Into<String>, raw: &str) -> Result<Self, CorpusError> {
        let document: CorpusDocument = serde_json::from_str(raw)?;
        Self::new(name, document.occupations)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn occupations(&self) -> &[OccupationProfile] {
        &self.occupations
    }

    pub fn get(&self, index: usize) -> Option<&OccupationProfile> {
        self.occupations.get(index)
    }

    pub fn len(&self) -> usize {
        self.occupations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupations.is_empty()
    }

    /// Number of (occupation, descriptor) entries across the descriptor categories.
    pub fn descriptor_count(&self) -> usize {
        self.occupations
            .iter()
            .map(|o| {
                Category::DESCRIPTOR
                    .iter()
                    .map(|c| o.descriptors(*c).len())
                    .sum::<usize>()
            })
            .sum()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Provider trait
// ────────────────────────────────────────────────────────────────────────────

/// Source of occupation corpora. Implement this to swap the backing store
/// without touching the engine or the handlers.
#[async_trait]
pub trait CorpusProvider: Send + Sync {
    async fn load(&self, dataset_name: &str) -> Result<Arc<OccupationCorpus>, CorpusError>;
}

/// Embedded datasets plus an optional directory of extra datasets, with a load cache.
pub struct CatalogCorpusProvider {
    corpus_dir: Option<PathBuf>,
    cache: RwLock<HashMap<String, Arc<OccupationCorpus>>>,
}

impl CatalogCorpusProvider {
    pub fn new(corpus_dir: Option<PathBuf>) -> Self {
        Self {
            corpus_dir,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn load_uncached(&self, dataset_name: &str) -> Result<OccupationCorpus, CorpusError> {
        if dataset_name == builtin::DATASET_NAME {
            return builtin::onet_core();
        }

        let dir = match &self.corpus_dir {
            Some(dir) if is_safe_dataset_name(dataset_name) => dir,
            _ => return Err(CorpusError::NotFound(dataset_name.to_string())),
        };

        let json_path = dir.join(format!("{dataset_name}.json"));
        if json_path.is_file() {
            let raw = tokio::fs::read_to_string(&json_path)
                .await
                .map_err(|source| CorpusError::Io {
                    path: json_path.clone(),
                    source,
                })?;
            return OccupationCorpus::from_json(dataset_name, &raw);
        }

        let csv_dir = dir.join(dataset_name);
        if csv_dir.is_dir() {
            let name = dataset_name.to_string();
            return tokio::task::spawn_blocking(move || onet_csv::load_dir(&name, &csv_dir))
                .await
                .map_err(|e| CorpusError::Task(e.to_string()))?;
        }

        Err(CorpusError::NotFound(dataset_name.to_string()))
    }
}

#[async_trait]
impl CorpusProvider for CatalogCorpusProvider {
    async fn load(&self, dataset_name: &str) -> Result<Arc<OccupationCorpus>, CorpusError> {
        if let Some(corpus) = self.cache.read().await.get(dataset_name) {
            return Ok(corpus.clone());
        }

        let corpus = Arc::new(self.load_uncached(dataset_name).await?);
        info!(
            "Loaded corpus '{}': {} occupations, {} descriptors",
            dataset_name,
            corpus.len(),
            corpus.descriptor_count()
        );

        let mut cache = self.cache.write().await;
        let entry = cache
            .entry(dataset_name.to_string())
            .or_insert_with(|| corpus.clone());
        Ok(entry.clone())
    }
}

/// Dataset names map to file names; path separators and dot-prefixes are refused.
fn is_safe_dataset_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && Path::new(name).components().count() == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Descriptor;

    fn occupation(code: &str, title: &str, importance: f64) -> OccupationProfile {
        OccupationProfile {
            code: code.to_string(),
            title: title.to_string(),
            description: String::new(),
            abilities: vec![Descriptor {
                name: "Near Vision".to_string(),
                importance,
                level: 50.0,
            }],
            skills: vec![],
            knowledge: vec![],
            interests: None,
        }
    }

    #[test]
    fn test_new_rejects_duplicate_codes() {
        let result = OccupationCorpus::new(
            "dup",
            vec![occupation("1", "A", 50.0), occupation("1", "B", 50.0)],
        );
        assert!(matches!(result, Err(CorpusError::Invalid { .. })));
    }

    #[test]
    fn test_new_rejects_out_of_range_values() {
        let result = OccupationCorpus::new("bad", vec![occupation("1", "A", 120.0)]);
        assert!(matches!(result, Err(CorpusError::Invalid { .. })));
        let result = OccupationCorpus::new("nan", vec![occupation("1", "A", f64::NAN)]);
        assert!(matches!(result, Err(CorpusError::Invalid { .. })));
    }

    #[test]
    fn test_descriptor_count() {
        let corpus = OccupationCorpus::new(
            "two",
            vec![occupation("1", "A", 50.0), occupation("2", "B", 60.0)],
        )
        .unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.descriptor_count(), 2);
    }

    #[test]
    fn test_safe_dataset_names() {
        assert!(is_safe_dataset_name("onet-2024"));
        assert!(is_safe_dataset_name("careers_v2.1"));
        assert!(!is_safe_dataset_name("../etc"));
        assert!(!is_safe_dataset_name("a/b"));
        assert!(!is_safe_dataset_name(".hidden"));
        assert!(!is_safe_dataset_name(""));
    }

    #[tokio::test]
    async fn test_provider_serves_builtin_and_caches() {
        let provider = CatalogCorpusProvider::new(None);
        let first = provider.load(builtin::DATASET_NAME).await.unwrap();
        let second = provider.load(builtin::DATASET_NAME).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_provider_unknown_dataset_is_not_found() {
        let provider = CatalogCorpusProvider::new(None);
        let err = provider.load("does-not-exist").await.unwrap_err();
        assert!(matches!(err, CorpusError::NotFound(name) if name == "does-not-exist"));
    }

    #[tokio::test]
    async fn test_provider_loads_json_from_corpus_dir() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = serde_json::json!({
            "occupations": [{
                "code": "99-0001.00",
                "title": "Test Pilots",
                "abilities": [{"name": "Near Vision", "importance": 90.0, "level": 80.0}]
            }]
        });
        std::fs::write(dir.path().join("pilots.json"), corpus.to_string()).unwrap();

        let provider = CatalogCorpusProvider::new(Some(dir.path().to_path_buf()));
        let loaded = provider.load("pilots").await.unwrap();
        assert_eq!(loaded.name(), "pilots");
        assert_eq!(loaded.occupations()[0].title, "Test Pilots");

        let err = provider.load("../pilots").await.unwrap_err();
        assert!(matches!(err, CorpusError::NotFound(_)));
    }
}
