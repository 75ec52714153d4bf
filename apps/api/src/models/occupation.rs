use std::fmt;

use serde::{Deserialize, Serialize};

/// Assessment category. Declaration order is the canonical order used for
/// contributions, weight maps and tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Interests,
    Abilities,
    Knowledge,
    Skills,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Interests,
        Category::Abilities,
        Category::Knowledge,
        Category::Skills,
    ];

    /// Categories scored from (importance, level) descriptor vectors.
    pub const DESCRIPTOR: [Category; 3] =
        [Category::Abilities, Category::Knowledge, Category::Skills];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Interests => "interests",
            Category::Abilities => "abilities",
            Category::Knowledge => "knowledge",
            Category::Skills => "skills",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named occupation requirement with its importance and required level (both 0–100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub name: String,
    pub importance: f64,
    pub level: f64,
}

/// The six Holland interest types, in hexagon order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiasecType {
    Realistic,
    Investigative,
    Artistic,
    Social,
    Enterprising,
    Conventional,
}

impl RiasecType {
    pub const ALL: [RiasecType; 6] = [
        RiasecType::Realistic,
        RiasecType::Investigative,
        RiasecType::Artistic,
        RiasecType::Social,
        RiasecType::Enterprising,
        RiasecType::Conventional,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RiasecType::Realistic => "Realistic",
            RiasecType::Investigative => "Investigative",
            RiasecType::Artistic => "Artistic",
            RiasecType::Social => "Social",
            RiasecType::Enterprising => "Enterprising",
            RiasecType::Conventional => "Conventional",
        }
    }

    /// Accepts the full name or the single-letter code, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        let key = raw.trim().to_ascii_lowercase();
        RiasecType::ALL.into_iter().find(|t| {
            let name = t.name().to_ascii_lowercase();
            key == name || (key.len() == 1 && name.starts_with(&key))
        })
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// RIASEC score vector, indexed in hexagon order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiasecProfile {
    #[serde(default)]
    pub realistic: f64,
    #[serde(default)]
    pub investigative: f64,
    #[serde(default)]
    pub artistic: f64,
    #[serde(default)]
    pub social: f64,
    #[serde(default)]
    pub enterprising: f64,
    #[serde(default)]
    pub conventional: f64,
}

impl RiasecProfile {
    pub fn from_array(values: [f64; 6]) -> Self {
        Self {
            realistic: values[0],
            investigative: values[1],
            artistic: values[2],
            social: values[3],
            enterprising: values[4],
            conventional: values[5],
        }
    }

    pub fn to_array(&self) -> [f64; 6] {
        [
            self.realistic,
            self.investigative,
            self.artistic,
            self.social,
            self.enterprising,
            self.conventional,
        ]
    }

    pub fn get(&self, kind: RiasecType) -> f64 {
        self.to_array()[kind.index()]
    }

    pub fn set(&mut self, kind: RiasecType, value: f64) {
        let mut values = self.to_array();
        values[kind.index()] = value;
        *self = Self::from_array(values);
    }

    pub fn is_empty(&self) -> bool {
        self.to_array().iter().all(|v| *v <= 0.0)
    }
}

/// Immutable occupation profile as loaded from a corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupationProfile {
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub abilities: Vec<Descriptor>,
    #[serde(default)]
    pub skills: Vec<Descriptor>,
    #[serde(default)]
    pub knowledge: Vec<Descriptor>,
    #[serde(default)]
    pub interests: Option<RiasecProfile>,
}

impl OccupationProfile {
    /// Descriptor vector for a descriptor category; interests have none.
    pub fn descriptors(&self, category: Category) -> &[Descriptor] {
        match category {
            Category::Abilities => &self.abilities,
            Category::Skills => &self.skills,
            Category::Knowledge => &self.knowledge,
            Category::Interests => &[],
        }
    }

    /// Top `n` descriptors of a category by importance (ties by name).
    pub fn top_descriptors(&self, category: Category, n: usize) -> Vec<&Descriptor> {
        let mut ranked: Vec<&Descriptor> = self.descriptors(category).iter().collect();
        ranked.sort_by(|a, b| {
            b.importance
                .total_cmp(&a.importance)
                .then_with(|| a.name.cmp(&b.name))
        });
        ranked.truncate(n);
        ranked
    }
}
