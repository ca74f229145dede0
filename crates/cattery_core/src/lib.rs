//! Core domain logic for the cattery store.
//! This crate owns the consistent write path: toy resolution by name,
//! partial cat updates, and the atomic counted action.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::cat::{Cat, CatId, CatPatch, CatValidationError};
pub use model::event::{Event, EventId, EventPayload};
pub use model::toy::{Toy, ToyId, ToyRef};
pub use repo::action_store::{ActionStore, ActionTransaction, SqliteActionStore};
pub use repo::cat_repo::{CatListQuery, CatRepository, RepoError, RepoResult, SqliteCatRepository};
pub use repo::event_repo::{EventListQuery, EventRepository, SqliteEventRepository};
pub use repo::toy_repo::{SqliteToyRepository, ToyRepository};
pub use service::action_coordinator::{
    ActionCoordinator, ActionError, ActionReceipt, ActionStage, CountedAction, RECOMMEND_TOY,
};
pub use service::cat_service::{CatService, CatServiceError, NewCat, UpdateCat};
pub use service::toy_registry::{RelationUpdate, ToyRegistry};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
