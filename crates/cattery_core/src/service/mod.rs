//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the cat write path.
//! - Keep request layers decoupled from storage details.

pub mod action_coordinator;
pub mod cat_service;
pub mod toy_registry;
