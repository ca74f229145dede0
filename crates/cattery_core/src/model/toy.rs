//! Toy records and caller-side toy references.

use serde::{Deserialize, Serialize};

/// Store-assigned toy identifier.
pub type ToyId = i64;

/// Shared toy vocabulary entry.
///
/// Back-relations (cats that like / hate a toy) are not stored here; they are
/// answered by `ToyRepository` queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toy {
    /// `None` until the owning cat write persists this toy.
    pub id: Option<ToyId>,
    /// Natural key. Matched exactly, including case.
    pub name: String,
}

impl Toy {
    /// Builds an in-memory toy that the next cat save will mint.
    pub fn unsaved(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    /// Returns whether this toy already has a stored row.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// Toy reference as supplied by callers of create/update.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToyRef {
    pub name: String,
}

impl ToyRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl From<&str> for ToyRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
