//! Toy registry and relation-set resolution.
//!
//! # Responsibility
//! - Resolve a toy name to its canonical stored toy, or to an unsaved toy
//!   that the owning cat write will mint.
//! - Turn optional caller toy lists into explicit relation updates.
//!
//! # Invariants
//! - Resolution never writes; persistence happens with the owning cat save.
//! - "Not provided" (`Untouched`) and "provided but empty" (`Replace(vec![])`)
//!   stay distinct.
//! - Duplicate names in one request collapse to a single toy.

use crate::model::toy::{Toy, ToyRef};
use crate::repo::cat_repo::RepoResult;
use crate::repo::toy_repo::ToyRepository;
use std::collections::BTreeMap;

/// Requested change for one relation set of a cat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationUpdate {
    /// Caller did not mention the set; keep what is stored.
    Untouched,
    /// Caller supplied the full new set (possibly empty).
    Replace(Vec<Toy>),
}

impl RelationUpdate {
    /// Maps to the patch shape used by `CatRepository::update_cat`.
    pub fn into_replacement(self) -> Option<Vec<Toy>> {
        match self {
            Self::Untouched => None,
            Self::Replace(toys) => Some(toys),
        }
    }
}

/// Name-keyed resolver over the toy vocabulary.
pub struct ToyRegistry<R: ToyRepository> {
    repo: R,
}

impl<R: ToyRepository> ToyRegistry<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Underlying repository, for read-only toy queries.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Returns the stored toy named `name`, or an unsaved toy with that name.
    ///
    /// Store-read failures propagate unchanged.
    pub fn resolve_by_name(&self, name: &str) -> RepoResult<Toy> {
        match self.repo.find_toy_by_name(name)? {
            Some(existing) => Ok(existing),
            None => Ok(Toy::unsaved(name)),
        }
    }

    /// Resolves an optional list of toy references into a relation update.
    pub fn resolve_relation_set(&self, provided: Option<&[ToyRef]>) -> RepoResult<RelationUpdate> {
        let Some(refs) = provided else {
            return Ok(RelationUpdate::Untouched);
        };

        let mut by_name: BTreeMap<&str, Toy> = BTreeMap::new();
        for toy_ref in refs {
            if by_name.contains_key(toy_ref.name.as_str()) {
                continue;
            }
            let toy = self.resolve_by_name(toy_ref.name.as_str())?;
            by_name.insert(toy_ref.name.as_str(), toy);
        }
        Ok(RelationUpdate::Replace(by_name.into_values().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::{RelationUpdate, ToyRegistry};
    use crate::model::cat::CatId;
    use crate::model::toy::{Toy, ToyId, ToyRef};
    use crate::repo::cat_repo::{RepoError, RepoResult};
    use crate::repo::toy_repo::ToyRepository;
    use std::cell::Cell;

    struct FixedToys {
        stored: Vec<Toy>,
        lookups: Cell<usize>,
        fail: bool,
    }

    impl FixedToys {
        fn new(stored: Vec<Toy>) -> Self {
            Self {
                stored,
                lookups: Cell::new(0),
                fail: false,
            }
        }
    }

    impl ToyRepository for FixedToys {
        fn find_toy_by_name(&self, name: &str) -> RepoResult<Option<Toy>> {
            self.lookups.set(self.lookups.get() + 1);
            if self.fail {
                return Err(RepoError::InvalidData("store offline".to_string()));
            }
            Ok(self.stored.iter().find(|toy| toy.name == name).cloned())
        }

        fn get_toy(&self, id: ToyId) -> RepoResult<Option<Toy>> {
            Ok(self.stored.iter().find(|toy| toy.id == Some(id)).cloned())
        }

        fn list_toys(&self) -> RepoResult<Vec<Toy>> {
            Ok(self.stored.clone())
        }

        fn cats_that_like(&self, _id: ToyId) -> RepoResult<Vec<CatId>> {
            Ok(Vec::new())
        }

        fn cats_that_hate(&self, _id: ToyId) -> RepoResult<Vec<CatId>> {
            Ok(Vec::new())
        }
    }

    fn stored(id: ToyId, name: &str) -> Toy {
        Toy {
            id: Some(id),
            name: name.to_string(),
        }
    }

    #[test]
    fn existing_name_resolves_to_stored_toy() {
        let registry = ToyRegistry::new(FixedToys::new(vec![stored(3, "Feather Wand")]));
        assert_eq!(
            registry.resolve_by_name("Feather Wand").unwrap(),
            stored(3, "Feather Wand")
        );
    }

    #[test]
    fn unknown_name_resolves_to_unsaved_toy() {
        let registry = ToyRegistry::new(FixedToys::new(Vec::new()));
        let toy = registry.resolve_by_name("Laser Pointer").unwrap();
        assert_eq!(toy, Toy::unsaved("Laser Pointer"));
        assert!(!toy.is_persisted());
    }

    #[test]
    fn name_match_is_case_sensitive() {
        let registry = ToyRegistry::new(FixedToys::new(vec![stored(1, "Ball")]));
        assert_eq!(registry.resolve_by_name("ball").unwrap().id, None);
    }

    #[test]
    fn absent_list_is_untouched_and_empty_list_is_replace() {
        let registry = ToyRegistry::new(FixedToys::new(Vec::new()));
        assert_eq!(
            registry.resolve_relation_set(None).unwrap(),
            RelationUpdate::Untouched
        );
        assert_eq!(
            registry.resolve_relation_set(Some(Vec::new().as_slice())).unwrap(),
            RelationUpdate::Replace(Vec::new())
        );
        assert_eq!(RelationUpdate::Untouched.into_replacement(), None);
    }

    #[test]
    fn duplicate_names_collapse_to_one_lookup() {
        let registry = ToyRegistry::new(FixedToys::new(vec![stored(7, "Vacuum")]));
        let refs = vec![
            ToyRef::new("Vacuum"),
            ToyRef::new("Box"),
            ToyRef::new("Vacuum"),
        ];
        let update = registry.resolve_relation_set(Some(refs.as_slice())).unwrap();
        assert_eq!(
            update,
            RelationUpdate::Replace(vec![Toy::unsaved("Box"), stored(7, "Vacuum")])
        );
        assert_eq!(registry.repo().lookups.get(), 2);
    }

    #[test]
    fn store_failures_propagate() {
        let mut repo = FixedToys::new(Vec::new());
        repo.fail = true;
        let registry = ToyRegistry::new(repo);
        let refs = vec![ToyRef::new("Yarn")];
        let err = registry
            .resolve_relation_set(Some(refs.as_slice()))
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(_)));
    }
}
