use cattery_core::db::{open_db, open_db_in_memory, DbError};
use cattery_core::{
    ActionCoordinator, ActionError, ActionStage, ActionStore, ActionTransaction, Cat, CatId,
    CatService, Event, EventId, EventListQuery, EventRepository, NewCat, RepoError, RepoResult,
    SqliteActionStore, SqliteCatRepository, SqliteEventRepository, SqliteToyRepository,
};
use rusqlite::Connection;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

fn seed_cat(conn: &Connection, name: &str) -> CatId {
    let service = CatService::new(
        SqliteCatRepository::try_new(conn).unwrap(),
        SqliteToyRepository::try_new(conn).unwrap(),
    );
    service
        .create_cat(NewCat {
            name: name.to_string(),
            age: 2,
            breed: "Tabby".to_string(),
            favorite_toys: Vec::new(),
            hated_toys: Vec::new(),
        })
        .unwrap()
        .id
        .unwrap()
}

fn recommendations(conn: &Connection, cat_id: CatId) -> i64 {
    conn.query_row(
        "SELECT recommendations FROM cats WHERE id = ?1;",
        [cat_id],
        |row| row.get(0),
    )
    .unwrap()
}

fn event_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM events;", [], |row| row.get(0))
        .unwrap()
}

fn recommend_events(conn: &Connection) -> Vec<Event> {
    SqliteEventRepository::try_new(conn)
        .unwrap()
        .list_events(&EventListQuery {
            name: Some("recommend_toy".to_string()),
            ..EventListQuery::default()
        })
        .unwrap()
}

fn injected_io_error() -> RepoError {
    RepoError::Db(DbError::Sqlite(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_IOERR),
        Some("injected commit failure".to_string()),
    )))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Fault {
    Commit,
    PanicOnAppend,
}

/// Wraps the SQLite store and breaks one step of every transaction.
struct FaultyStore<'conn> {
    inner: SqliteActionStore<'conn>,
    fault: Fault,
}

struct FaultyTransaction<'a> {
    inner: Box<dyn ActionTransaction + 'a>,
    fault: Fault,
}

impl ActionStore for FaultyStore<'_> {
    fn begin(&self) -> RepoResult<Box<dyn ActionTransaction + '_>> {
        Ok(Box::new(FaultyTransaction {
            inner: self.inner.begin()?,
            fault: self.fault,
        }))
    }
}

impl ActionTransaction for FaultyTransaction<'_> {
    fn load_cat(&self, id: CatId) -> RepoResult<Option<Cat>> {
        self.inner.load_cat(id)
    }

    fn save_cat(&self, cat: &Cat) -> RepoResult<()> {
        self.inner.save_cat(cat)
    }

    fn append_event(&self, event: &Event) -> RepoResult<EventId> {
        if self.fault == Fault::PanicOnAppend {
            panic!("append_event blew up");
        }
        self.inner.append_event(event)
    }

    fn commit(self: Box<Self>) -> RepoResult<()> {
        if self.fault == Fault::Commit {
            self.inner.rollback()?;
            return Err(injected_io_error());
        }
        self.inner.commit()
    }

    fn rollback(self: Box<Self>) -> RepoResult<()> {
        self.inner.rollback()
    }
}

#[test]
fn recommend_bumps_counter_and_appends_one_event() {
    let conn = open_db_in_memory().unwrap();
    let cat_id = seed_cat(&conn, "Whiskers");
    let coordinator = ActionCoordinator::new(SqliteActionStore::try_new(&conn).unwrap());

    let receipt = coordinator.recommend_toy(cat_id, 3).unwrap();

    assert_eq!(receipt.cat_id, cat_id);
    assert_eq!(receipt.recommendations, 1);
    assert_eq!(recommendations(&conn, cat_id), 1);

    let events = recommend_events(&conn);
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.id, Some(receipt.event_id));
    assert_eq!(event.kind, "toy");
    assert_eq!(event.payload_i64("cat_id"), Some(cat_id));
    assert_eq!(event.payload_i64("toy_id"), Some(3));
    assert!(conn.is_autocommit());

    let second = coordinator.recommend_toy(cat_id, 8).unwrap();
    assert_eq!(second.recommendations, 2);
    assert!(second.event_id > receipt.event_id);
    assert_eq!(recommend_events(&conn).len(), 2);
}

#[test]
fn recommend_for_unknown_toy_id_is_still_recorded() {
    let conn = open_db_in_memory().unwrap();
    let cat_id = seed_cat(&conn, "Tom");
    let coordinator = ActionCoordinator::new(SqliteActionStore::try_new(&conn).unwrap());

    coordinator.recommend_toy(cat_id, 12_345).unwrap();

    assert_eq!(recommend_events(&conn)[0].payload_i64("toy_id"), Some(12_345));
}

#[test]
fn missing_cat_is_not_found_and_changes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let coordinator = ActionCoordinator::new(SqliteActionStore::try_new(&conn).unwrap());

    let err = coordinator.recommend_toy(99, 1).unwrap_err();

    assert!(matches!(err, ActionError::CatNotFound(99)));
    assert_eq!(event_count(&conn), 0);
    assert!(conn.is_autocommit());
}

#[test]
fn failed_event_append_rolls_back_counter() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO cats (id, name, age, breed) VALUES (7, 'Whiskers', 3, 'Tabby');",
        [],
    )
    .unwrap();
    conn.execute_batch(
        "CREATE TRIGGER fail_events BEFORE INSERT ON events
         BEGIN
             SELECT RAISE(ABORT, 'forced');
         END;",
    )
    .unwrap();
    let coordinator = ActionCoordinator::new(SqliteActionStore::try_new(&conn).unwrap());

    let err = coordinator.recommend_toy(7, 3).unwrap_err();

    assert!(matches!(
        err,
        ActionError::Failed {
            cat_id: 7,
            stage: ActionStage::AppendEvent,
            source: RepoError::Db(_),
        }
    ));
    assert_eq!(recommendations(&conn, 7), 0);
    assert_eq!(event_count(&conn), 0);
    assert!(conn.is_autocommit());

    // The scope was released, so the next action can take the write lock.
    conn.execute_batch("DROP TRIGGER fail_events;").unwrap();
    assert_eq!(coordinator.recommend_toy(7, 3).unwrap().recommendations, 1);
}

#[test]
fn commit_failure_surfaces_and_leaves_store_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let cat_id = seed_cat(&conn, "Felix");
    let coordinator = ActionCoordinator::new(FaultyStore {
        inner: SqliteActionStore::try_new(&conn).unwrap(),
        fault: Fault::Commit,
    });

    let err = coordinator.recommend_toy(cat_id, 3).unwrap_err();

    match err {
        ActionError::Failed { stage, source, .. } => {
            assert_eq!(stage, ActionStage::Commit);
            assert!(source.to_string().contains("injected commit failure"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(recommendations(&conn, cat_id), 0);
    assert_eq!(event_count(&conn), 0);
    assert!(conn.is_autocommit());
}

#[test]
fn panic_inside_scope_rolls_back_and_releases() {
    let conn = open_db_in_memory().unwrap();
    let cat_id = seed_cat(&conn, "Garfield");
    let coordinator = ActionCoordinator::new(FaultyStore {
        inner: SqliteActionStore::try_new(&conn).unwrap(),
        fault: Fault::PanicOnAppend,
    });

    let outcome = catch_unwind(AssertUnwindSafe(|| coordinator.recommend_toy(cat_id, 3)));

    assert!(outcome.is_err());
    assert_eq!(recommendations(&conn, cat_id), 0);
    assert_eq!(event_count(&conn), 0);
    assert!(conn.is_autocommit());
}

#[test]
fn concurrent_recommends_serialize_without_lost_updates() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 5;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cattery.db");
    let cat_id = {
        let conn = open_db(&path).unwrap();
        seed_cat(&conn, "Popular")
    };

    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let path = path.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let coordinator =
                    ActionCoordinator::new(SqliteActionStore::try_new(&conn).unwrap());
                for step in 0..PER_THREAD {
                    let toy_id = (worker * PER_THREAD + step) as i64;
                    coordinator.recommend_toy(cat_id, toy_id).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let conn = open_db(&path).unwrap();
    let total = (THREADS * PER_THREAD) as i64;
    assert_eq!(recommendations(&conn, cat_id), total);
    let events = recommend_events(&conn);
    assert_eq!(events.len() as i64, total);

    let mut counters: Vec<i64> = events
        .iter()
        .filter_map(|event| event.payload_i64("recommendations"))
        .collect();
    counters.sort_unstable();
    assert_eq!(counters, (1..=total).collect::<Vec<_>>());
}
