//! Toy repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Look toys up by id and by exact name.
//! - Answer the derived back-relations (cats that like / hate a toy).
//!
//! # Invariants
//! - This repository never writes; toys are minted by cat writes only.
//! - Back-relations are queries over the cat-owned join tables, not stored
//!   state.

use crate::model::cat::CatId;
use crate::model::toy::{Toy, ToyId};
use crate::repo::cat_repo::{RepoResult, ToyRelation};
use crate::repo::ensure_store_ready;
use rusqlite::{Connection, OptionalExtension};

/// Read-side interface for the toy vocabulary.
pub trait ToyRepository {
    /// Exact, case-sensitive name lookup.
    fn find_toy_by_name(&self, name: &str) -> RepoResult<Option<Toy>>;
    fn get_toy(&self, id: ToyId) -> RepoResult<Option<Toy>>;
    /// All toys sorted by name.
    fn list_toys(&self) -> RepoResult<Vec<Toy>>;
    /// Ids of cats whose favorite set contains `id`.
    fn cats_that_like(&self, id: ToyId) -> RepoResult<Vec<CatId>>;
    /// Ids of cats whose hated set contains `id`.
    fn cats_that_hate(&self, id: ToyId) -> RepoResult<Vec<CatId>>;
}

/// SQLite-backed toy repository.
pub struct SqliteToyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteToyRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_store_ready(conn)?;
        Ok(Self { conn })
    }

    fn owners(&self, id: ToyId, relation: ToyRelation) -> RepoResult<Vec<CatId>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT cat_id FROM {} WHERE toy_id = ?1 ORDER BY cat_id ASC;",
            relation.table()
        ))?;
        let mut rows = stmt.query([id])?;
        let mut cat_ids = Vec::new();
        while let Some(row) = rows.next()? {
            cat_ids.push(row.get(0)?);
        }
        Ok(cat_ids)
    }
}

impl ToyRepository for SqliteToyRepository<'_> {
    fn find_toy_by_name(&self, name: &str) -> RepoResult<Option<Toy>> {
        let toy = self
            .conn
            .query_row(
                "SELECT id, name FROM toys WHERE name = ?1;",
                [name],
                |row| {
                    Ok(Toy {
                        id: Some(row.get(0)?),
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(toy)
    }

    fn get_toy(&self, id: ToyId) -> RepoResult<Option<Toy>> {
        let toy = self
            .conn
            .query_row("SELECT id, name FROM toys WHERE id = ?1;", [id], |row| {
                Ok(Toy {
                    id: Some(row.get(0)?),
                    name: row.get(1)?,
                })
            })
            .optional()?;
        Ok(toy)
    }

    fn list_toys(&self) -> RepoResult<Vec<Toy>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM toys ORDER BY name ASC, id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut toys = Vec::new();
        while let Some(row) = rows.next()? {
            toys.push(Toy {
                id: Some(row.get(0)?),
                name: row.get(1)?,
            });
        }
        Ok(toys)
    }

    fn cats_that_like(&self, id: ToyId) -> RepoResult<Vec<CatId>> {
        self.owners(id, ToyRelation::Favorite)
    }

    fn cats_that_hate(&self, id: ToyId) -> RepoResult<Vec<CatId>> {
        self.owners(id, ToyRelation::Hated)
    }
}
