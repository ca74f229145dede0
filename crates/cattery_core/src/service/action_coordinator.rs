//! Counted-action coordinator.
//!
//! # Responsibility
//! - Bump a cat's counter and append the correlated event as one atomic unit.
//! - Report a store failure as a typed error after rolling everything back.
//!
//! # Invariants
//! - Scope lifecycle is `Began -> {Committed | RolledBack} -> Released`, and
//!   `Released` is reached on every exit path, including unwinding.
//! - Either the counter moved by exactly one and one event exists, or the
//!   store is unchanged.
//! - No retries happen here.

use crate::model::cat::CatId;
use crate::model::event::{Event, EventId, EventPayload};
use crate::model::toy::ToyId;
use crate::repo::action_store::{ActionStore, ActionTransaction};
use crate::repo::cat_repo::{RepoError, RepoResult};
use log::{error, info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Describes one counted action and the event it leaves behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountedAction {
    /// Event `type`, the action's domain category.
    pub event_type: &'static str,
    /// Event `name`, the action identifier.
    pub event_name: &'static str,
    /// Payload key under which the correlation id is stored.
    pub correlation_key: &'static str,
}

/// Recommending a toy to a cat.
pub const RECOMMEND_TOY: CountedAction = CountedAction {
    event_type: "toy",
    event_name: "recommend_toy",
    correlation_key: "toy_id",
};

impl CountedAction {
    /// Builds the event recording this action for `cat_id`.
    ///
    /// The payload carries the resulting counter so the log alone can replay
    /// what happened.
    pub fn event_for(&self, cat_id: CatId, correlation_id: i64, recommendations: i64) -> Event {
        let mut payload = EventPayload::new();
        payload.insert("cat_id".to_string(), Value::from(cat_id));
        payload.insert(self.correlation_key.to_string(), Value::from(correlation_id));
        payload.insert("recommendations".to_string(), Value::from(recommendations));
        Event::new(self.event_type, self.event_name, payload)
    }
}

/// Step of a counted action that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStage {
    Begin,
    LoadCat,
    Mutate,
    SaveCat,
    AppendEvent,
    Commit,
}

impl ActionStage {
    fn as_str(self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::LoadCat => "load_cat",
            Self::Mutate => "mutate",
            Self::SaveCat => "save_cat",
            Self::AppendEvent => "append_event",
            Self::Commit => "commit",
        }
    }
}

/// Outcome of a failed counted action.
#[derive(Debug)]
pub enum ActionError {
    /// Target cat does not exist; nothing was written.
    CatNotFound(CatId),
    /// A store step failed; every mutation of this action was rolled back.
    Failed {
        cat_id: CatId,
        stage: ActionStage,
        source: RepoError,
    },
}

impl Display for ActionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CatNotFound(id) => write!(f, "cat with id {id} does not exist"),
            Self::Failed {
                cat_id,
                stage,
                source,
            } => write!(
                f,
                "counted action on cat {cat_id} failed at {}: {source}",
                stage.as_str()
            ),
        }
    }
}

impl Error for ActionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CatNotFound(_) => None,
            Self::Failed { source, .. } => Some(source),
        }
    }
}

/// Result of a committed counted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionReceipt {
    pub cat_id: CatId,
    /// Counter value after the action.
    pub recommendations: i64,
    pub event_id: EventId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeState {
    Began,
    Committed,
    RolledBack,
}

impl ScopeState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Began => "began",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        }
    }
}

/// Guard around one action transaction.
///
/// Dropping a scope that was neither committed nor rolled back rolls it back
/// before releasing it.
struct ActionScope<'s> {
    tx: Option<Box<dyn ActionTransaction + 's>>,
    state: ScopeState,
    cat_id: CatId,
    action: &'static str,
}

impl<'s> ActionScope<'s> {
    fn begin(store: &'s impl ActionStore, cat_id: CatId, action: &'static str) -> RepoResult<Self> {
        let tx = store.begin()?;
        info!("event=action_scope module=service status=began action={action} cat_id={cat_id}");
        Ok(Self {
            tx: Some(tx),
            state: ScopeState::Began,
            cat_id,
            action,
        })
    }

    fn open(&self) -> RepoResult<&(dyn ActionTransaction + 's)> {
        self.tx.as_deref().ok_or_else(|| {
            RepoError::InvalidData(format!(
                "action scope for cat {} is already {}",
                self.cat_id,
                self.state.as_str()
            ))
        })
    }

    fn commit(&mut self) -> RepoResult<()> {
        let tx = self.take_open()?;
        match tx.commit() {
            Ok(()) => {
                self.state = ScopeState::Committed;
                info!(
                    "event=action_scope module=service status=committed action={} cat_id={}",
                    self.action, self.cat_id
                );
                Ok(())
            }
            Err(err) => {
                self.state = ScopeState::RolledBack;
                Err(err)
            }
        }
    }

    fn rollback(&mut self) -> RepoResult<()> {
        let tx = self.take_open()?;
        self.state = ScopeState::RolledBack;
        tx.rollback()?;
        warn!(
            "event=action_scope module=service status=rolled_back action={} cat_id={}",
            self.action, self.cat_id
        );
        Ok(())
    }

    fn take_open(&mut self) -> RepoResult<Box<dyn ActionTransaction + 's>> {
        self.open()?;
        self.tx.take().ok_or_else(|| {
            RepoError::InvalidData(format!("action scope for cat {} is closed", self.cat_id))
        })
    }
}

impl Drop for ActionScope<'_> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            // Early return or unwinding skipped commit/rollback.
            if let Err(err) = self.rollback() {
                error!(
                    "event=action_scope module=service status=error action={} cat_id={} error_code=rollback_on_drop_failed error={}",
                    self.action, self.cat_id, err
                );
            }
        }
        info!(
            "event=action_scope module=service status=released action={} cat_id={} outcome={}",
            self.action,
            self.cat_id,
            self.state.as_str()
        );
    }
}

/// Runs counted actions against an action store.
pub struct ActionCoordinator<S: ActionStore> {
    store: S,
}

impl<S: ActionStore> ActionCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Recommends `toy_id` to `cat_id`: bumps the cat's recommendation
    /// counter and logs a `toy/recommend_toy` event.
    ///
    /// The toy id is recorded as-is; it is a correlation value, not a
    /// reference that must exist.
    pub fn recommend_toy(&self, cat_id: CatId, toy_id: ToyId) -> Result<ActionReceipt, ActionError> {
        self.perform_counted_action(cat_id, toy_id, &RECOMMEND_TOY)
    }

    /// Executes `action` on `cat_id` as one all-or-nothing unit.
    pub fn perform_counted_action(
        &self,
        cat_id: CatId,
        correlation_id: i64,
        action: &CountedAction,
    ) -> Result<ActionReceipt, ActionError> {
        let mut scope = ActionScope::begin(&self.store, cat_id, action.event_name).map_err(
            |source| ActionError::Failed {
                cat_id,
                stage: ActionStage::Begin,
                source,
            },
        )?;

        match apply_action(&scope, cat_id, correlation_id, action) {
            Ok(receipt) => {
                scope.commit().map_err(|source| {
                    log_failure(cat_id, action, ActionStage::Commit, &source);
                    ActionError::Failed {
                        cat_id,
                        stage: ActionStage::Commit,
                        source,
                    }
                })?;
                Ok(receipt)
            }
            Err(err) => {
                if let ActionError::Failed { stage, source, .. } = &err {
                    log_failure(cat_id, action, *stage, source);
                }
                if let Err(rollback_err) = scope.rollback() {
                    error!(
                        "event=counted_action module=service status=error action={} cat_id={cat_id} error_code=rollback_failed error={rollback_err}",
                        action.event_name
                    );
                }
                Err(err)
            }
        }
    }
}

fn apply_action(
    scope: &ActionScope<'_>,
    cat_id: CatId,
    correlation_id: i64,
    action: &CountedAction,
) -> Result<ActionReceipt, ActionError> {
    let failed = |stage: ActionStage| {
        move |source: RepoError| ActionError::Failed {
            cat_id,
            stage,
            source,
        }
    };
    let tx = scope.open().map_err(failed(ActionStage::LoadCat))?;

    let mut cat = tx
        .load_cat(cat_id)
        .map_err(failed(ActionStage::LoadCat))?
        .ok_or(ActionError::CatNotFound(cat_id))?;
    let recommendations = cat
        .record_recommendation()
        .map_err(|err| failed(ActionStage::Mutate)(RepoError::Validation(err)))?;
    let event = action.event_for(cat_id, correlation_id, recommendations);

    tx.save_cat(&cat).map_err(failed(ActionStage::SaveCat))?;
    let event_id = tx
        .append_event(&event)
        .map_err(failed(ActionStage::AppendEvent))?;

    Ok(ActionReceipt {
        cat_id,
        recommendations,
        event_id,
    })
}

fn log_failure(cat_id: CatId, action: &CountedAction, stage: ActionStage, source: &RepoError) {
    error!(
        "event=counted_action module=service status=error action={} cat_id={cat_id} stage={} error={source}",
        action.event_name,
        stage.as_str()
    );
}
