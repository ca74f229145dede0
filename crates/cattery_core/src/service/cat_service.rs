//! Cat use-case service.
//!
//! # Responsibility
//! - Create and partially update cats, resolving toy references by name.
//! - Provide lenient delete and the read use-cases around cats and toys.
//!
//! # Invariants
//! - Create always writes both relation sets; update only rewrites the sets
//!   the caller supplied.
//! - Delete of an absent cat is a successful no-op.
//! - Repository failures surface unchanged; there is no silent recovery.

use crate::model::cat::{Cat, CatId, CatPatch, CatValidationError};
use crate::model::toy::{Toy, ToyId, ToyRef};
use crate::repo::cat_repo::{CatListQuery, CatRepository, RepoError, RepoResult};
use crate::repo::toy_repo::ToyRepository;
use crate::service::toy_registry::{RelationUpdate, ToyRegistry};
use log::{debug, info};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for cat use-cases.
#[derive(Debug)]
pub enum CatServiceError {
    /// Input rejected by cat/toy validation.
    InvalidInput(CatValidationError),
    /// No cat stored under the given id.
    CatNotFound(CatId),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for CatServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(err) => write!(f, "invalid cat input: {err}"),
            Self::CatNotFound(id) => write!(f, "cat with id {id} could not be found"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CatServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInput(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::CatNotFound(_) => None,
        }
    }
}

impl From<RepoError> for CatServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::CatNotFound(id) => Self::CatNotFound(id),
            RepoError::Validation(err) => Self::InvalidInput(err),
            other => Self::Repo(other),
        }
    }
}

/// Request model for creating a cat.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewCat {
    pub name: String,
    pub age: i64,
    pub breed: String,
    #[serde(default)]
    pub favorite_toys: Vec<ToyRef>,
    #[serde(default)]
    pub hated_toys: Vec<ToyRef>,
}

/// Request model for a partial cat update. Absent fields stay as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UpdateCat {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub breed: Option<String>,
    pub favorite_toys: Option<Vec<ToyRef>>,
    pub hated_toys: Option<Vec<ToyRef>>,
}

/// Cat service facade over cat and toy repositories.
pub struct CatService<C: CatRepository, T: ToyRepository> {
    cats: C,
    registry: ToyRegistry<T>,
}

impl<C: CatRepository, T: ToyRepository> CatService<C, T> {
    pub fn new(cats: C, toys: T) -> Self {
        Self {
            cats,
            registry: ToyRegistry::new(toys),
        }
    }

    /// Creates one cat with both relation sets and returns the stored cat,
    /// including ids minted for new toys.
    pub fn create_cat(&self, request: NewCat) -> Result<Cat, CatServiceError> {
        let favorite_toys = self.resolve_explicit(&request.favorite_toys)?;
        let hated_toys = self.resolve_explicit(&request.hated_toys)?;

        let mut cat = Cat::new(request.name, request.age, request.breed);
        cat.favorite_toys = favorite_toys;
        cat.hated_toys = hated_toys;
        cat.validate().map_err(CatServiceError::InvalidInput)?;

        let created = self.cats.create_cat(&cat)?;
        info!(
            "event=cat_create module=service status=ok cat_id={} favorite_count={} hated_count={}",
            created.id.unwrap_or_default(),
            created.favorite_toys.len(),
            created.hated_toys.len()
        );
        Ok(created)
    }

    /// Merges provided fields onto the cat stored under `id`.
    ///
    /// Relation sets absent from `request` are preserved exactly; an empty
    /// list clears the set.
    pub fn update_cat(&self, id: CatId, request: UpdateCat) -> Result<Cat, CatServiceError> {
        let favorite_toys = self
            .registry
            .resolve_relation_set(request.favorite_toys.as_deref())?;
        let hated_toys = self
            .registry
            .resolve_relation_set(request.hated_toys.as_deref())?;
        let touched_favorites = favorite_toys != RelationUpdate::Untouched;
        let touched_hated = hated_toys != RelationUpdate::Untouched;

        let patch = CatPatch {
            name: request.name,
            age: request.age,
            breed: request.breed,
            favorite_toys: favorite_toys.into_replacement(),
            hated_toys: hated_toys.into_replacement(),
        };
        let updated = self.cats.update_cat(id, &patch)?;
        info!(
            "event=cat_update module=service status=ok cat_id={id} favorites_replaced={touched_favorites} hated_replaced={touched_hated}"
        );
        Ok(updated)
    }

    /// Deletes the cat stored under `id`; absent ids are a no-op.
    pub fn remove_cat(&self, id: CatId) -> Result<(), CatServiceError> {
        let removed = self.cats.delete_cat(id)?;
        if removed {
            info!("event=cat_remove module=service status=ok cat_id={id}");
        } else {
            debug!("event=cat_remove module=service status=noop cat_id={id}");
        }
        Ok(())
    }

    /// Gets one cat with relations, failing with `CatNotFound` when absent.
    pub fn get_cat(&self, id: CatId) -> Result<Cat, CatServiceError> {
        self.cats
            .get_cat(id)?
            .ok_or(CatServiceError::CatNotFound(id))
    }

    /// Lists cats by ascending id. `limit = None` returns all remaining rows.
    pub fn list_cats(&self, limit: Option<u32>, offset: u32) -> RepoResult<Vec<Cat>> {
        self.cats.list_cats(&CatListQuery { limit, offset })
    }

    pub fn find_cats_by_breed(&self, breed: &str) -> RepoResult<Vec<Cat>> {
        self.cats.find_cats_by_breed(breed)
    }

    pub fn list_toys(&self) -> RepoResult<Vec<Toy>> {
        self.registry.repo().list_toys()
    }

    /// Ids of cats that list `toy_id` as a favorite.
    pub fn toy_admirers(&self, toy_id: ToyId) -> RepoResult<Vec<CatId>> {
        self.registry.repo().cats_that_like(toy_id)
    }

    /// Ids of cats that list `toy_id` as hated.
    pub fn toy_haters(&self, toy_id: ToyId) -> RepoResult<Vec<CatId>> {
        self.registry.repo().cats_that_hate(toy_id)
    }

    fn resolve_explicit(&self, refs: &[ToyRef]) -> Result<Vec<Toy>, CatServiceError> {
        match self.registry.resolve_relation_set(Some(refs))? {
            RelationUpdate::Replace(toys) => Ok(toys),
            RelationUpdate::Untouched => Ok(Vec::new()),
        }
    }
}
