//! Programmatic corpora shared by the engine tests.

use crate::corpus::OccupationCorpus;
use crate::models::{
    Category, Descriptor, OccupationProfile, Rating, RiasecProfile, RiasecType, UserProfile,
};

pub const DESCRIPTORS_PER_CATEGORY: usize = 8;

fn descriptor_name(category: Category, j: usize) -> String {
    format!("{} element {j}", category.as_str())
}

/// Occupation `i` of a synthetic corpus. Importances and levels vary with
/// `i` so every occupation has a distinct requirement shape.
pub fn occupation(i: usize) -> OccupationProfile {
    let descriptors = |category: Category, salt: usize| -> Vec<Descriptor> {
        (0..DESCRIPTORS_PER_CATEGORY)
            .map(|j| Descriptor {
                name: descriptor_name(category, j),
                importance: 20.0 + ((i * 37 + j * 13 + salt) % 80) as f64,
                level: 10.0 + ((i * 53 + j * 29 + salt * 3) % 90) as f64,
            })
            .collect()
    };

    let mut interests = RiasecProfile::default();
    for kind in RiasecType::ALL {
        let value = 10.0 + ((i * 19 + kind.index() * 41) % 90) as f64;
        interests.set(kind, value);
    }

    OccupationProfile {
        code: format!("00-{:04}.00", i + 1),
        title: format!("Occupation {:02}", i + 1),
        description: String::new(),
        abilities: descriptors(Category::Abilities, 1),
        skills: descriptors(Category::Skills, 7),
        knowledge: descriptors(Category::Knowledge, 11),
        interests: Some(interests),
    }
}

pub fn corpus(n: usize) -> OccupationCorpus {
    OccupationCorpus::new("fixture", (0..n).map(occupation).collect())
        .expect("fixture corpus is valid")
}

/// A user whose ratings equal the occupation's required levels.
pub fn user_matching(occupation: &OccupationProfile) -> UserProfile {
    let ratings = |category: Category| -> Vec<Rating> {
        occupation
            .descriptors(category)
            .iter()
            .map(|d| Rating::new(d.name.clone(), d.level))
            .collect()
    };

    let interests = occupation
        .interests
        .map(|profile| {
            RiasecType::ALL
                .into_iter()
                .map(|kind| Rating::new(kind.name(), profile.get(kind)))
                .collect()
        })
        .unwrap_or_default();

    UserProfile {
        interests,
        abilities: ratings(Category::Abilities),
        knowledge: ratings(Category::Knowledge),
        skills: ratings(Category::Skills),
    }
}
