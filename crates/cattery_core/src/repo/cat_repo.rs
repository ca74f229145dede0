//! Cat repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist cats together with their favorite/hated toy relations.
//! - Mint toys referenced by name as part of the owning cat write.
//!
//! # Invariants
//! - Every write runs in one IMMEDIATE transaction: scalars, newly minted
//!   toys and join rows land together or not at all.
//! - A toy name maps to at most one `toys` row, even under concurrent writers.
//! - `update_cat` only rewrites the relation sets present in the patch.
//! - Deleting a cat never deletes toys.

use crate::db::DbError;
use crate::model::cat::{Cat, CatId, CatPatch, CatValidationError};
use crate::model::toy::{Toy, ToyId};
use crate::repo::ensure_store_ready;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const CAT_SELECT_SQL: &str = "SELECT
    id,
    name,
    age,
    breed,
    recommendations
FROM cats";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by cat, toy, event and action-store operations.
#[derive(Debug)]
pub enum RepoError {
    /// Write rejected before touching SQL.
    Validation(CatValidationError),
    /// Store-level failure: I/O, constraint violation, lock timeout.
    Db(DbError),
    CatNotFound(CatId),
    InvalidData(String),
    /// Connection was not opened through `open_db*`.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::CatNotFound(id) => write!(f, "cat not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::CatNotFound(_) => None,
            Self::InvalidData(_) => None,
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<CatValidationError> for RepoError {
    fn from(value: CatValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing cats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatListQuery {
    /// `None` returns every remaining row.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Which relation join table a toy set lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ToyRelation {
    Favorite,
    Hated,
}

impl ToyRelation {
    pub(crate) fn table(self) -> &'static str {
        match self {
            Self::Favorite => "cat_favorite_toys",
            Self::Hated => "cat_hated_toys",
        }
    }
}

/// Repository interface for cat persistence.
pub trait CatRepository {
    /// Inserts an unsaved cat, minting unsaved toys, and returns the stored
    /// cat with every id filled in.
    fn create_cat(&self, cat: &Cat) -> RepoResult<Cat>;
    /// Merges `patch` onto the stored cat and returns the result.
    fn update_cat(&self, id: CatId, patch: &CatPatch) -> RepoResult<Cat>;
    /// Loads one cat with both relation sets.
    fn get_cat(&self, id: CatId) -> RepoResult<Option<Cat>>;
    /// Lists cats by ascending id.
    fn list_cats(&self, query: &CatListQuery) -> RepoResult<Vec<Cat>>;
    /// Exact breed match, ascending id.
    fn find_cats_by_breed(&self, breed: &str) -> RepoResult<Vec<Cat>>;
    /// Deletes one cat. Returns `false` when nothing was stored under `id`.
    fn delete_cat(&self, id: CatId) -> RepoResult<bool>;
}

/// SQLite-backed cat repository.
pub struct SqliteCatRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_store_ready(conn)?;
        Ok(Self { conn })
    }
}

impl CatRepository for SqliteCatRepository<'_> {
    fn create_cat(&self, cat: &Cat) -> RepoResult<Cat> {
        if cat.id.is_some() {
            return Err(RepoError::InvalidData(
                "create_cat expects a cat without id".to_string(),
            ));
        }
        cat.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO cats (name, age, breed, recommendations)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                cat.name.as_str(),
                cat.age,
                cat.breed.as_str(),
                cat.recommendations
            ],
        )?;
        let cat_id = tx.last_insert_rowid();
        replace_relation(&tx, cat_id, ToyRelation::Favorite, &cat.favorite_toys)?;
        replace_relation(&tx, cat_id, ToyRelation::Hated, &cat.hated_toys)?;
        tx.commit()?;

        self.get_cat(cat_id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("created cat {cat_id} missing in read-back"))
        })
    }

    fn update_cat(&self, id: CatId, patch: &CatPatch) -> RepoResult<Cat> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut cat = load_cat(&tx, id)?.ok_or(RepoError::CatNotFound(id))?;
        patch.apply_to(&mut cat);
        cat.validate()?;

        tx.execute(
            "UPDATE cats
             SET
                name = ?1,
                age = ?2,
                breed = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?4;",
            params![cat.name.as_str(), cat.age, cat.breed.as_str(), id],
        )?;
        if let Some(toys) = &patch.favorite_toys {
            replace_relation(&tx, id, ToyRelation::Favorite, toys)?;
        }
        if let Some(toys) = &patch.hated_toys {
            replace_relation(&tx, id, ToyRelation::Hated, toys)?;
        }

        let stored = load_cat(&tx, id)?.ok_or(RepoError::CatNotFound(id))?;
        tx.commit()?;
        Ok(stored)
    }

    fn get_cat(&self, id: CatId) -> RepoResult<Option<Cat>> {
        load_cat(self.conn, id)
    }

    fn list_cats(&self, query: &CatListQuery) -> RepoResult<Vec<Cat>> {
        let mut sql = format!("{CAT_SELECT_SQL} ORDER BY id ASC");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut cats = Vec::new();
        while let Some(row) = rows.next()? {
            cats.push(parse_cat_row(row)?);
        }
        drop(rows);

        for cat in &mut cats {
            attach_relations(self.conn, cat)?;
        }
        Ok(cats)
    }

    fn find_cats_by_breed(&self, breed: &str) -> RepoResult<Vec<Cat>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CAT_SELECT_SQL} WHERE breed = ?1 ORDER BY id ASC;"))?;
        let mut rows = stmt.query([breed])?;
        let mut cats = Vec::new();
        while let Some(row) = rows.next()? {
            cats.push(parse_cat_row(row)?);
        }
        drop(rows);

        for cat in &mut cats {
            attach_relations(self.conn, cat)?;
        }
        Ok(cats)
    }

    fn delete_cat(&self, id: CatId) -> RepoResult<bool> {
        let changed = self.conn.execute("DELETE FROM cats WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }
}

/// Loads one cat with relations. Works on plain connections and inside
/// transactions.
pub(crate) fn load_cat(conn: &Connection, id: CatId) -> RepoResult<Option<Cat>> {
    let mut stmt = conn.prepare(&format!("{CAT_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let mut cat = parse_cat_row(row)?;
    drop(rows);

    attach_relations(conn, &mut cat)?;
    Ok(Some(cat))
}

fn attach_relations(conn: &Connection, cat: &mut Cat) -> RepoResult<()> {
    let Some(cat_id) = cat.id else {
        return Ok(());
    };
    cat.favorite_toys = load_relation(conn, cat_id, ToyRelation::Favorite)?;
    cat.hated_toys = load_relation(conn, cat_id, ToyRelation::Hated)?;
    Ok(())
}

fn load_relation(conn: &Connection, cat_id: CatId, relation: ToyRelation) -> RepoResult<Vec<Toy>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT t.id, t.name
         FROM {} rel
         INNER JOIN toys t ON t.id = rel.toy_id
         WHERE rel.cat_id = ?1
         ORDER BY t.name ASC, t.id ASC;",
        relation.table()
    ))?;
    let mut rows = stmt.query([cat_id])?;
    let mut toys = Vec::new();
    while let Some(row) = rows.next()? {
        toys.push(Toy {
            id: Some(row.get(0)?),
            name: row.get(1)?,
        });
    }
    Ok(toys)
}

/// Rewrites one relation set of `cat_id` to exactly `toys`.
fn replace_relation(
    tx: &Transaction<'_>,
    cat_id: CatId,
    relation: ToyRelation,
    toys: &[Toy],
) -> RepoResult<()> {
    tx.execute(
        &format!("DELETE FROM {} WHERE cat_id = ?1;", relation.table()),
        [cat_id],
    )?;

    for toy in toys {
        let toy_id = persist_toy(tx, toy)?;
        tx.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (cat_id, toy_id) VALUES (?1, ?2);",
                relation.table()
            ),
            params![cat_id, toy_id],
        )?;
    }
    Ok(())
}

/// Returns the stored id for `toy`, inserting it by name when unsaved.
///
/// `INSERT OR IGNORE` plus the unique name index makes a concurrent writer
/// that minted the same name first win; this call then reuses its row.
fn persist_toy(tx: &Transaction<'_>, toy: &Toy) -> RepoResult<ToyId> {
    if let Some(id) = toy.id {
        return Ok(id);
    }
    if toy.name.trim().is_empty() {
        return Err(RepoError::Validation(CatValidationError::BlankToyName));
    }

    tx.execute(
        "INSERT OR IGNORE INTO toys (name) VALUES (?1);",
        [toy.name.as_str()],
    )?;
    let id = tx.query_row(
        "SELECT id FROM toys WHERE name = ?1;",
        [toy.name.as_str()],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn parse_cat_row(row: &Row<'_>) -> RepoResult<Cat> {
    let cat = Cat {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        age: row.get("age")?,
        breed: row.get("breed")?,
        recommendations: row.get("recommendations")?,
        favorite_toys: Vec::new(),
        hated_toys: Vec::new(),
    };
    cat.validate().map_err(|err| {
        RepoError::InvalidData(format!(
            "cat {} failed validation: {err}",
            cat.id.unwrap_or_default()
        ))
    })?;
    Ok(cat)
}
