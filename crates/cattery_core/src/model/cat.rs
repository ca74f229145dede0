//! Cat domain model.
//!
//! # Responsibility
//! - Define the owning record of the favored/avoided toy relations.
//! - Validate scalar fields before any repository write.
//!
//! # Invariants
//! - `recommendations` starts at 0 and never goes negative.
//! - `favorite_toys` and `hated_toys` are independent sets; one toy may be in
//!   both.

use crate::model::toy::Toy;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned cat identifier.
pub type CatId = i64;

/// Canonical cat record with both relation sets preloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cat {
    /// `None` until the first save.
    pub id: Option<CatId>,
    pub name: String,
    pub age: i64,
    pub breed: String,
    /// Counter bumped by the recommend action only.
    pub recommendations: i64,
    pub favorite_toys: Vec<Toy>,
    pub hated_toys: Vec<Toy>,
}

/// Validation errors for cat/toy writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatValidationError {
    BlankName,
    BlankBreed,
    NegativeAge(i64),
    NegativeRecommendations(i64),
    BlankToyName,
    RecommendationsOverflow,
}

impl Display for CatValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "cat name must not be blank"),
            Self::BlankBreed => write!(f, "cat breed must not be blank"),
            Self::NegativeAge(age) => write!(f, "cat age must not be negative, got {age}"),
            Self::NegativeRecommendations(count) => {
                write!(f, "recommendations must not be negative, got {count}")
            }
            Self::BlankToyName => write!(f, "toy name must not be blank"),
            Self::RecommendationsOverflow => write!(f, "recommendations counter overflow"),
        }
    }
}

impl Error for CatValidationError {}

impl Cat {
    /// Creates an unsaved cat with empty relation sets and a zero counter.
    pub fn new(name: impl Into<String>, age: i64, breed: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            age,
            breed: breed.into(),
            recommendations: 0,
            favorite_toys: Vec::new(),
            hated_toys: Vec::new(),
        }
    }

    /// Checks scalar fields and toy names.
    pub fn validate(&self) -> Result<(), CatValidationError> {
        if self.name.trim().is_empty() {
            return Err(CatValidationError::BlankName);
        }
        if self.breed.trim().is_empty() {
            return Err(CatValidationError::BlankBreed);
        }
        if self.age < 0 {
            return Err(CatValidationError::NegativeAge(self.age));
        }
        if self.recommendations < 0 {
            return Err(CatValidationError::NegativeRecommendations(
                self.recommendations,
            ));
        }
        if self
            .favorite_toys
            .iter()
            .chain(self.hated_toys.iter())
            .any(|toy| toy.name.trim().is_empty())
        {
            return Err(CatValidationError::BlankToyName);
        }
        Ok(())
    }

    /// Bumps the recommendation counter by exactly one and returns the new
    /// value.
    pub fn record_recommendation(&mut self) -> Result<i64, CatValidationError> {
        self.recommendations = self
            .recommendations
            .checked_add(1)
            .ok_or(CatValidationError::RecommendationsOverflow)?;
        Ok(self.recommendations)
    }

    /// Favorite toy names, sorted.
    pub fn favorite_toy_names(&self) -> Vec<&str> {
        sorted_names(&self.favorite_toys)
    }

    /// Hated toy names, sorted.
    pub fn hated_toy_names(&self) -> Vec<&str> {
        sorted_names(&self.hated_toys)
    }
}

/// Partial update merged onto a stored cat.
///
/// `None` leaves the stored value untouched. For relation sets,
/// `Some(vec![])` clears the set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatPatch {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub breed: Option<String>,
    pub favorite_toys: Option<Vec<Toy>>,
    pub hated_toys: Option<Vec<Toy>>,
}

impl CatPatch {
    /// Applies provided fields onto `cat`; identity and counter are never
    /// touched.
    pub fn apply_to(&self, cat: &mut Cat) {
        if let Some(name) = &self.name {
            cat.name = name.clone();
        }
        if let Some(age) = self.age {
            cat.age = age;
        }
        if let Some(breed) = &self.breed {
            cat.breed = breed.clone();
        }
        if let Some(toys) = &self.favorite_toys {
            cat.favorite_toys = toys.clone();
        }
        if let Some(toys) = &self.hated_toys {
            cat.hated_toys = toys.clone();
        }
    }
}

fn sorted_names(toys: &[Toy]) -> Vec<&str> {
    let mut names: Vec<&str> = toys.iter().map(|toy| toy.name.as_str()).collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::{Cat, CatPatch, CatValidationError};
    use crate::model::toy::Toy;

    #[test]
    fn new_cat_starts_with_zero_recommendations_and_no_toys() {
        let cat = Cat::new("Whiskers", 3, "Tabby");
        assert_eq!(cat.id, None);
        assert_eq!(cat.recommendations, 0);
        assert!(cat.favorite_toys.is_empty());
        assert!(cat.hated_toys.is_empty());
        assert!(cat.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_and_negative_fields() {
        assert_eq!(
            Cat::new("  ", 1, "Tabby").validate(),
            Err(CatValidationError::BlankName)
        );
        assert_eq!(
            Cat::new("Tom", 1, "").validate(),
            Err(CatValidationError::BlankBreed)
        );
        assert_eq!(
            Cat::new("Tom", -2, "Tabby").validate(),
            Err(CatValidationError::NegativeAge(-2))
        );

        let mut with_blank_toy = Cat::new("Tom", 1, "Tabby");
        with_blank_toy.hated_toys.push(Toy::unsaved(" "));
        assert_eq!(
            with_blank_toy.validate(),
            Err(CatValidationError::BlankToyName)
        );
    }

    #[test]
    fn record_recommendation_increments_by_one_and_guards_overflow() {
        let mut cat = Cat::new("Tom", 1, "Tabby");
        assert_eq!(cat.record_recommendation(), Ok(1));
        assert_eq!(cat.record_recommendation(), Ok(2));

        cat.recommendations = i64::MAX;
        assert_eq!(
            cat.record_recommendation(),
            Err(CatValidationError::RecommendationsOverflow)
        );
        assert_eq!(cat.recommendations, i64::MAX);
    }

    #[test]
    fn patch_only_overwrites_provided_fields() {
        let mut cat = Cat::new("Whiskers", 3, "Tabby");
        cat.id = Some(9);
        cat.recommendations = 4;
        cat.favorite_toys.push(Toy::unsaved("Feather Wand"));
        cat.hated_toys.push(Toy::unsaved("Vacuum"));

        let patch = CatPatch {
            age: Some(5),
            hated_toys: Some(Vec::new()),
            ..CatPatch::default()
        };
        patch.apply_to(&mut cat);

        assert_eq!(cat.id, Some(9));
        assert_eq!(cat.name, "Whiskers");
        assert_eq!(cat.age, 5);
        assert_eq!(cat.recommendations, 4);
        assert_eq!(cat.favorite_toy_names(), vec!["Feather Wand"]);
        assert!(cat.hated_toys.is_empty());
    }

    #[test]
    fn serializes_with_relation_sets() {
        let mut cat = Cat::new("Whiskers", 2, "Siamese");
        cat.favorite_toys.push(Toy::unsaved("Feather Wand"));
        let json = serde_json::to_value(&cat).unwrap();
        assert_eq!(json["favorite_toys"][0]["name"], "Feather Wand");
        assert_eq!(json["recommendations"], 0);
    }
}
