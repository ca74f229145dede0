//! Domain model for cats, toys and the event log.
//!
//! # Responsibility
//! - Define canonical records shared by repositories and services.
//! - Keep the write-side ownership explicit: a cat owns its toy relations.
//!
//! # Invariants
//! - Ids are assigned by the store; `None` means "not persisted yet".
//! - Toy names are the natural key used for deduplication.
//! - Events are immutable once written.

pub mod cat;
pub mod event;
pub mod toy;
