use serde::{Deserialize, Serialize};

use crate::models::occupation::Category;

/// Upper bound of the rating scale; ratings share the 0–100 scale of occupation levels.
pub const RATING_MAX: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub name: String,
    pub rating: f64,
}

impl Rating {
    pub fn new(name: impl Into<String>, rating: f64) -> Self {
        Self {
            name: name.into(),
            rating,
        }
    }
}

/// Caller-supplied self-ratings. Transient: never persisted by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub interests: Vec<Rating>,
    #[serde(default)]
    pub abilities: Vec<Rating>,
    #[serde(default)]
    pub knowledge: Vec<Rating>,
    #[serde(default)]
    pub skills: Vec<Rating>,
}

impl UserProfile {
    pub fn ratings(&self, category: Category) -> &[Rating] {
        match category {
            Category::Interests => &self.interests,
            Category::Abilities => &self.abilities,
            Category::Knowledge => &self.knowledge,
            Category::Skills => &self.skills,
        }
    }

    pub fn ratings_mut(&mut self, category: Category) -> &mut Vec<Rating> {
        match category {
            Category::Interests => &mut self.interests,
            Category::Abilities => &mut self.abilities,
            Category::Knowledge => &mut self.knowledge,
            Category::Skills => &mut self.skills,
        }
    }

    /// Categories with at least one rating, in canonical order.
    pub fn present_categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| !self.ratings(*c).is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.present_categories().is_empty()
    }

    /// Category with the most ratings; ties go to the earlier canonical category.
    pub fn primary_category(&self) -> Option<Category> {
        let mut best: Option<(Category, usize)> = None;
        for category in Category::ALL {
            let count = self.ratings(category).len();
            if count == 0 {
                continue;
            }
            match best {
                Some((_, best_count)) if best_count >= count => {}
                _ => best = Some((category, count)),
            }
        }
        best.map(|(category, _)| category)
    }

    /// Copy of this profile keeping only one category.
    pub fn only(&self, category: Category) -> UserProfile {
        let mut filtered = UserProfile::default();
        *filtered.ratings_mut(category) = self.ratings(category).to_vec();
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_categories_in_canonical_order() {
        let profile = UserProfile {
            skills: vec![Rating::new("Programming", 70.0)],
            interests: vec![Rating::new("Investigative", 80.0)],
            ..Default::default()
        };
        assert_eq!(
            profile.present_categories(),
            vec![Category::Interests, Category::Skills]
        );
        assert!(!profile.is_empty());
        assert!(UserProfile::default().is_empty());
    }

    #[test]
    fn test_primary_category_prefers_most_ratings() {
        let profile = UserProfile {
            interests: vec![Rating::new("Social", 50.0)],
            skills: vec![
                Rating::new("Programming", 70.0),
                Rating::new("Writing", 40.0),
            ],
            ..Default::default()
        };
        assert_eq!(profile.primary_category(), Some(Category::Skills));
        assert_eq!(UserProfile::default().primary_category(), None);
    }

    #[test]
    fn test_primary_category_tie_goes_to_canonical_order() {
        let profile = UserProfile {
            knowledge: vec![Rating::new("Mathematics", 70.0)],
            abilities: vec![Rating::new("Near Vision", 70.0)],
            ..Default::default()
        };
        assert_eq!(profile.primary_category(), Some(Category::Abilities));
    }

    #[test]
    fn test_only_keeps_single_category() {
        let profile = UserProfile {
            interests: vec![Rating::new("Social", 50.0)],
            skills: vec![Rating::new("Programming", 70.0)],
            ..Default::default()
        };
        let filtered = profile.only(Category::Skills);
        assert!(filtered.interests.is_empty());
        assert_eq!(filtered.skills.len(), 1);
    }

    #[test]
    fn test_missing_categories_deserialize_as_empty() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"skills":[{"name":"Programming","rating":55}]}"#).unwrap();
        assert!(profile.abilities.is_empty());
        assert_eq!(profile.skills[0].rating, 55.0);
    }
}
