//! O*NET long-format CSV ingestion.
//!
//! A dataset directory holds up to four files: `abilities.csv`, `skills.csv`,
//! `knowledge.csv` and `interests.csv`, each with the O*NET database columns
//! `O*NET-SOC Code`, `Title`, `Element Name`, `Scale Name`, `Data Value`.
//! Rows are pivoted into one profile per occupation title; duplicate rows are
//! averaged, and an element is kept only when both its Importance and Level
//! scales are present. Scales whose observed maximum is ≤ 10 (O*NET's 1–5 / 0–7
//! / 1–7 scales) are rescaled onto 0–100.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::corpus::{CorpusError, OccupationCorpus};
use crate::models::{Category, Descriptor, OccupationProfile, RiasecProfile, RiasecType};

const IMPORTANCE_SCALE: &str = "Importance";
const LEVEL_SCALE: &str = "Level";
const INTEREST_SCALE: &str = "Occupational Interests";
const SMALL_SCALE_MAX: f64 = 10.0;

#[derive(Debug, Deserialize)]
struct ElementRow {
    #[serde(rename = "O*NET-SOC Code", default)]
    code: Option<String>,
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Element Name")]
    element: String,
    #[serde(rename = "Scale Name")]
    scale: String,
    #[serde(rename = "Data Value", deserialize_with = "csv::invalid_option")]
    value: Option<f64>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Debug, Default)]
struct ElementScales {
    importance: Mean,
    level: Mean,
}

#[derive(Debug, Default)]
struct OccupationAccumulator {
    code: Option<String>,
    descriptors: BTreeMap<Category, BTreeMap<String, ElementScales>>,
    interests: BTreeMap<usize, Mean>,
}

/// Loads every category file present in `dir` into a validated corpus.
pub fn load_dir(dataset_name: &str, dir: &Path) -> Result<OccupationCorpus, CorpusError> {
    let mut occupations: BTreeMap<String, OccupationAccumulator> = BTreeMap::new();
    let mut files_read = 0;

    for (category, file_name) in [
        (Category::Abilities, "abilities.csv"),
        (Category::Skills, "skills.csv"),
        (Category::Knowledge, "knowledge.csv"),
        (Category::Interests, "interests.csv"),
    ] {
        let path = dir.join(file_name);
        if !path.is_file() {
            debug!("{dataset_name}: no {file_name}, skipping {category}");
            continue;
        }
        let rows = read_rows(&path)?;
        files_read += 1;
        accumulate(&mut occupations, category, rows);
    }

    if files_read == 0 {
        return Err(CorpusError::NotFound(dataset_name.to_string()));
    }

    let mut profiles = build_profiles(occupations);
    rescale_small_scales(&mut profiles);

    if profiles.is_empty() {
        return Err(CorpusError::Invalid {
            dataset: dataset_name.to_string(),
            reason: "no occupation rows".to_string(),
        });
    }

    OccupationCorpus::new(dataset_name, profiles)
}

fn read_rows(path: &Path) -> Result<Vec<ElementRow>, CorpusError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CorpusError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    reader
        .deserialize::<ElementRow>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| CorpusError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

fn accumulate(
    occupations: &mut BTreeMap<String, OccupationAccumulator>,
    category: Category,
    rows: Vec<ElementRow>,
) {
    let mut skipped = 0usize;

    for row in rows {
        let Some(value) = row.value.filter(|v| v.is_finite()) else {
            skipped += 1;
            continue;
        };

        let entry = occupations.entry(row.title.clone()).or_default();
        if entry.code.is_none() {
            entry.code = row.code.clone().filter(|c| !c.is_empty());
        }

        if category == Category::Interests {
            if row.scale != INTEREST_SCALE {
                continue;
            }
            match RiasecType::parse(&row.element) {
                Some(kind) => entry.interests.entry(kind.index()).or_default().push(value),
                None => skipped += 1,
            }
            continue;
        }

        let scales = entry
            .descriptors
            .entry(category)
            .or_default()
            .entry(row.element.clone())
            .or_default();
        match row.scale.as_str() {
            IMPORTANCE_SCALE => scales.importance.push(value),
            LEVEL_SCALE => scales.level.push(value),
            _ => {}
        }
    }

    if skipped > 0 {
        warn!("Skipped {skipped} unusable {category} rows");
    }
}

fn build_profiles(occupations: BTreeMap<String, OccupationAccumulator>) -> Vec<OccupationProfile> {
    occupations
        .into_iter()
        .enumerate()
        .map(|(idx, (title, acc))| {
            let mut profile = OccupationProfile {
                code: acc.code.unwrap_or_else(|| format!("untitled-{idx:05}")),
                title,
                description: String::new(),
                abilities: Vec::new(),
                skills: Vec::new(),
                knowledge: Vec::new(),
                interests: None,
            };

            for (category, elements) in acc.descriptors {
                let descriptors: Vec<Descriptor> = elements
                    .into_iter()
                    .filter_map(|(name, scales)| {
                        Some(Descriptor {
                            name,
                            importance: scales.importance.value()?,
                            level: scales.level.value()?,
                        })
                    })
                    .collect();
                match category {
                    Category::Abilities => profile.abilities = descriptors,
                    Category::Skills => profile.skills = descriptors,
                    Category::Knowledge => profile.knowledge = descriptors,
                    Category::Interests => {}
                }
            }

            if !acc.interests.is_empty() {
                let mut interests = RiasecProfile::default();
                for kind in RiasecType::ALL {
                    if let Some(mean) = acc.interests.get(&kind.index()).and_then(Mean::value) {
                        interests.set(kind, mean);
                    }
                }
                profile.interests = Some(interests);
            }

            profile
        })
        .collect()
}

/// Rescales each small scale onto 0–100 by its observed maximum.
fn rescale_small_scales(profiles: &mut [OccupationProfile]) {
    for category in Category::DESCRIPTOR {
        let (max_importance, max_level) = profiles
            .iter()
            .flat_map(|p| p.descriptors(category))
            .fold((0.0_f64, 0.0_f64), |(imp, lvl), d| {
                (imp.max(d.importance), lvl.max(d.level))
            });
        let importance_factor = small_scale_factor(max_importance);
        let level_factor = small_scale_factor(max_level);
        if importance_factor.is_none() && level_factor.is_none() {
            continue;
        }

        for profile in profiles.iter_mut() {
            let descriptors = match category {
                Category::Abilities => &mut profile.abilities,
                Category::Skills => &mut profile.skills,
                Category::Knowledge => &mut profile.knowledge,
                Category::Interests => continue,
            };
            for descriptor in descriptors.iter_mut() {
                if let Some(factor) = importance_factor {
                    descriptor.importance *= factor;
                }
                if let Some(factor) = level_factor {
                    descriptor.level *= factor;
                }
            }
        }
    }

    let max_interest = profiles
        .iter()
        .filter_map(|p| p.interests)
        .flat_map(|i| i.to_array())
        .fold(0.0_f64, f64::max);
    if let Some(factor) = small_scale_factor(max_interest) {
        for interests in profiles.iter_mut().filter_map(|p| p.interests.as_mut()) {
            *interests = RiasecProfile::from_array(interests.to_array().map(|v| v * factor));
        }
    }
}

fn small_scale_factor(max_value: f64) -> Option<f64> {
    (max_value > 0.0 && max_value <= SMALL_SCALE_MAX).then(|| 100.0 / max_value)
}
