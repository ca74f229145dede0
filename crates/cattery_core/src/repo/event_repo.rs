//! Read-only access to the append-only event log.
//!
//! Events are appended exclusively through `ActionTransaction::append_event`;
//! nothing here mutates the log.

use crate::model::event::{Event, EventId, EventPayload};
use crate::repo::cat_repo::{RepoError, RepoResult};
use crate::repo::ensure_store_ready;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};

const EVENT_SELECT_SQL: &str = "SELECT id, type, name, payload FROM events";

/// Query options for reading the event log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventListQuery {
    /// Exact action-name filter, e.g. `recommend_toy`.
    pub name: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Read-side interface for events.
pub trait EventRepository {
    fn get_event(&self, id: EventId) -> RepoResult<Option<Event>>;
    /// Lists events in append order.
    fn list_events(&self, query: &EventListQuery) -> RepoResult<Vec<Event>>;
}

/// SQLite-backed event log reader.
pub struct SqliteEventRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEventRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_store_ready(conn)?;
        Ok(Self { conn })
    }
}

impl EventRepository for SqliteEventRepository<'_> {
    fn get_event(&self, id: EventId) -> RepoResult<Option<Event>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{EVENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_event_row(row)?));
        }
        Ok(None)
    }

    fn list_events(&self, query: &EventListQuery) -> RepoResult<Vec<Event>> {
        let mut sql = format!("{EVENT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(name) = query.name.as_ref() {
            sql.push_str(" AND name = ?");
            bind_values.push(Value::Text(name.clone()));
        }

        sql.push_str(" ORDER BY id ASC");
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
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }
        Ok(events)
    }
}

fn parse_event_row(row: &Row<'_>) -> RepoResult<Event> {
    let id: EventId = row.get("id")?;
    let payload_text: String = row.get("payload")?;
    let payload: EventPayload = serde_json::from_str(&payload_text).map_err(|err| {
        RepoError::InvalidData(format!("event {id} payload is not a JSON object: {err}"))
    })?;

    Ok(Event {
        id: Some(id),
        kind: row.get("type")?,
        name: row.get("name")?,
        payload,
    })
}
