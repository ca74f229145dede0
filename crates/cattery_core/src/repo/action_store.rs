//! Transactional store seam for counted actions.
//!
//! # Responsibility
//! - Hand out one isolated mutation scope per action (`ActionStore::begin`).
//! - Expose the reads and writes a counted action performs inside it.
//!
//! # Invariants
//! - A transaction handle borrows its connection and cannot outlive it.
//! - `commit` and `rollback` consume the handle; afterwards it is released.
//! - A failed `commit` leaves nothing applied.
//! - Dropping an unfinished handle rolls it back.

use crate::model::cat::{Cat, CatId};
use crate::model::event::{Event, EventId};
use crate::repo::cat_repo::{load_cat, RepoError, RepoResult};
use crate::repo::ensure_store_ready;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

/// Operations available inside one open action transaction.
pub trait ActionTransaction {
    /// Loads a cat as seen by this transaction.
    fn load_cat(&self, id: CatId) -> RepoResult<Option<Cat>>;
    /// Persists the cat's scalar fields and counter. Relations are untouched.
    fn save_cat(&self, cat: &Cat) -> RepoResult<()>;
    /// Appends one event and returns its id.
    fn append_event(&self, event: &Event) -> RepoResult<EventId>;
    fn commit(self: Box<Self>) -> RepoResult<()>;
    fn rollback(self: Box<Self>) -> RepoResult<()>;
}

/// Source of action transactions.
pub trait ActionStore {
    fn begin(&self) -> RepoResult<Box<dyn ActionTransaction + '_>>;
}

/// SQLite action store using IMMEDIATE transactions.
///
/// IMMEDIATE takes the write lock at `BEGIN`, so the load-modify-save of a
/// counted action cannot interleave with another writer.
pub struct SqliteActionStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteActionStore<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_store_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ActionStore for SqliteActionStore<'_> {
    fn begin(&self) -> RepoResult<Box<dyn ActionTransaction + '_>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        Ok(Box::new(SqliteActionTransaction { tx }))
    }
}

struct SqliteActionTransaction<'conn> {
    tx: Transaction<'conn>,
}

impl ActionTransaction for SqliteActionTransaction<'_> {
    fn load_cat(&self, id: CatId) -> RepoResult<Option<Cat>> {
        load_cat(&self.tx, id)
    }

    fn save_cat(&self, cat: &Cat) -> RepoResult<()> {
        let id = cat.id.ok_or_else(|| {
            RepoError::InvalidData("save_cat requires a persisted cat".to_string())
        })?;
        cat.validate()?;

        let changed = self.tx.execute(
            "UPDATE cats
             SET
                name = ?1,
                age = ?2,
                breed = ?3,
                recommendations = ?4,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?5;",
            params![
                cat.name.as_str(),
                cat.age,
                cat.breed.as_str(),
                cat.recommendations,
                id
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::CatNotFound(id));
        }
        Ok(())
    }

    fn append_event(&self, event: &Event) -> RepoResult<EventId> {
        let payload = serde_json::to_string(&event.payload).map_err(|err| {
            RepoError::InvalidData(format!("event payload is not serializable: {err}"))
        })?;
        self.tx.execute(
            "INSERT INTO events (type, name, payload) VALUES (?1, ?2, ?3);",
            params![event.kind.as_str(), event.name.as_str(), payload],
        )?;
        Ok(self.tx.last_insert_rowid())
    }

    fn commit(self: Box<Self>) -> RepoResult<()> {
        // On failure rusqlite drops the transaction, which rolls it back.
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> RepoResult<()> {
        self.tx.rollback()?;
        Ok(())
    }
}
