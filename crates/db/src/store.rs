//! [`PgEngineStore`]: the Postgres implementation of the engine's storage
//! ports.
//!
//! Single-statement operations delegate to the repositories. Multi-table
//! commits (raise, transition, assignment, default switch) run here as
//! explicit transactions: the request row is locked with
//! `SELECT ... FOR UPDATE`, the optimistic guards are re-checked under the
//! lock, and the ledger append lands in the same transaction as the cache
//! refresh on the row. `now()` is transaction-stable in Postgres, so every
//! timestamp written by one commit carries the same instant.

use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::{Postgres, Transaction};

use praxis_core::error::CoreError;
use praxis_core::graph::{Step, Transition, Workflow, WorkflowGraph};
use praxis_core::notification::{NewNotification, Notification};
use praxis_core::request::{AssignmentHistoryEntry, ServiceRequest, StepHistoryEntry};
use praxis_core::staff::Accountant;
use praxis_core::store::{
    AssignmentChange, AssignmentCommit, CommitOutcome, EngineStore, EventStore, NewEvent,
    NewRequest, NewStep, NewTransition, NewWorkflow, NotificationStore, RequestFilter,
    RequestStore, StaffStore, TransitionCommit, WorkflowStore,
};
use praxis_core::types::DbId;
use praxis_engine::collab::RoleProvider;

use crate::models::history::{AssignmentHistoryRow, StepHistoryRow};
use crate::models::request::ServiceRequestRow;
use crate::models::workflow::WorkflowRow;
use crate::repositories::event_repo::EventRepo;
use crate::repositories::history_repo::{self, HistoryRepo};
use crate::repositories::notification_repo::NotificationRepo;
use crate::repositories::request_repo::{self, RequestRepo};
use crate::repositories::staff_repo::AccountantRepo;
use crate::repositories::step_repo::StepRepo;
use crate::repositories::transition_repo::TransitionRepo;
use crate::repositories::workflow_repo::{self, WorkflowRepo};
use crate::DbPool;

/// Postgres-backed [`EngineStore`]. Cheap to clone; all state lives in the
/// connection pool.
#[derive(Clone)]
pub struct PgEngineStore {
    pool: DbPool,
}

impl PgEngineStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a sqlx failure onto the domain taxonomy. Constraint violations keep
/// their class; everything else surfaces as internal so driver detail stays
/// out of API responses.
fn classify(err: sqlx::Error) -> CoreError {
    match &err {
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::UniqueViolation => CoreError::Conflict(format!(
                "duplicate value violates {}",
                db.constraint().unwrap_or("a unique constraint")
            )),
            ErrorKind::ForeignKeyViolation => CoreError::Validation(format!(
                "referenced record does not exist ({})",
                db.constraint().unwrap_or("foreign key")
            )),
            ErrorKind::CheckViolation => CoreError::Validation(format!(
                "value violates {}",
                db.constraint().unwrap_or("a check constraint")
            )),
            _ => CoreError::Internal(err.to_string()),
        },
        _ => CoreError::Internal(err.to_string()),
    }
}

/// Collapse buffered field updates into one JSONB patch, later keys winning.
/// An empty patch is the `||` identity, so a single UPDATE covers both
/// cases.
fn field_patch(updates: &[(String, serde_json::Value)]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (name, value) in updates {
        map.insert(name.clone(), value.clone());
    }
    serde_json::Value::Object(map)
}

/// Lock a request row inside `tx`, or report it missing.
async fn lock_request(
    tx: &mut Transaction<'_, Postgres>,
    request_id: DbId,
) -> Result<ServiceRequestRow, CoreError> {
    let query = format!(
        "SELECT {} FROM service_requests WHERE id = $1 FOR UPDATE",
        request_repo::COLUMNS
    );
    sqlx::query_as::<_, ServiceRequestRow>(&query)
        .bind(request_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(classify)?
        .ok_or(CoreError::NotFound {
            entity: "request",
            id: request_id,
        })
}

/// Append one assignment ledger entry inside `tx`.
async fn insert_assignment_entry(
    tx: &mut Transaction<'_, Postgres>,
    request_id: DbId,
    change: &AssignmentChange,
) -> Result<AssignmentHistoryEntry, CoreError> {
    let query = format!(
        "INSERT INTO assignment_history
            (request_id, from_user_id, to_user_id, kind, actor_id, reason)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {}",
        history_repo::ASSIGNMENT_COLUMNS
    );
    let row = sqlx::query_as::<_, AssignmentHistoryRow>(&query)
        .bind(request_id)
        .bind(change.from_user_id)
        .bind(change.to_user_id)
        .bind(change.kind.as_str())
        .bind(change.actor_id)
        .bind(&change.reason)
        .fetch_one(&mut **tx)
        .await
        .map_err(classify)?;
    row.try_into()
}

// ---------------------------------------------------------------------------
// Workflow definitions
// ---------------------------------------------------------------------------

#[async_trait]
impl WorkflowStore for PgEngineStore {
    async fn create_workflow(&self, new: NewWorkflow) -> Result<Workflow, CoreError> {
        let row = WorkflowRepo::create(&self.pool, &new)
            .await
            .map_err(classify)?;
        Ok(row.into())
    }

    async fn find_workflow(&self, id: DbId) -> Result<Option<Workflow>, CoreError> {
        let row = WorkflowRepo::find_by_id(&self.pool, id)
            .await
            .map_err(classify)?;
        Ok(row.map(Workflow::from))
    }

    async fn list_workflows(&self, firm_id: DbId) -> Result<Vec<Workflow>, CoreError> {
        let rows = WorkflowRepo::list_for_firm(&self.pool, firm_id)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(Workflow::from).collect())
    }

    async fn load_graph(&self, id: DbId) -> Result<Option<WorkflowGraph>, CoreError> {
        let Some(workflow) = WorkflowRepo::find_by_id(&self.pool, id)
            .await
            .map_err(classify)?
        else {
            return Ok(None);
        };
        // Transitions before steps: both tables are append-only, so every
        // endpoint referenced here is present in the later read.
        let transitions = TransitionRepo::list_for_workflow(&self.pool, id)
            .await
            .map_err(classify)?
            .into_iter()
            .map(Transition::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let steps = StepRepo::list_for_workflow(&self.pool, id)
            .await
            .map_err(classify)?
            .into_iter()
            .map(Step::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(WorkflowGraph::new(workflow.into(), steps, transitions)))
    }

    async fn add_step(&self, workflow_id: DbId, new: NewStep) -> Result<Step, CoreError> {
        if WorkflowRepo::find_by_id(&self.pool, workflow_id)
            .await
            .map_err(classify)?
            .is_none()
        {
            return Err(CoreError::NotFound {
                entity: "workflow",
                id: workflow_id,
            });
        }
        let row = StepRepo::insert(&self.pool, workflow_id, &new)
            .await
            .map_err(classify)?;
        row.try_into()
    }

    async fn add_transition(
        &self,
        workflow_id: DbId,
        new: NewTransition,
    ) -> Result<Transition, CoreError> {
        if WorkflowRepo::find_by_id(&self.pool, workflow_id)
            .await
            .map_err(classify)?
            .is_none()
        {
            return Err(CoreError::NotFound {
                entity: "workflow",
                id: workflow_id,
            });
        }
        // Steps are never deleted, so a membership check now holds at
        // insert time too.
        for step_id in [new.from_step_id, new.to_step_id] {
            let belongs = StepRepo::find_by_id(&self.pool, step_id)
                .await
                .map_err(classify)?
                .is_some_and(|s| s.workflow_id == workflow_id);
            if !belongs {
                return Err(CoreError::Validation(format!(
                    "step {step_id} does not belong to workflow {workflow_id}"
                )));
            }
        }
        let row = TransitionRepo::insert(&self.pool, workflow_id, &new)
            .await
            .map_err(classify)?;
        row.try_into()
    }

    async fn set_workflow_active(&self, id: DbId) -> Result<Workflow, CoreError> {
        let row = WorkflowRepo::set_active(&self.pool, id)
            .await
            .map_err(classify)?
            .ok_or(CoreError::NotFound {
                entity: "workflow",
                id,
            })?;
        Ok(row.into())
    }

    async fn set_default_workflow(&self, id: DbId) -> Result<Workflow, CoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        let query = format!(
            "SELECT {} FROM workflows WHERE id = $1 FOR UPDATE",
            workflow_repo::COLUMNS
        );
        let Some(target) = sqlx::query_as::<_, WorkflowRow>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(classify)?
        else {
            return Err(CoreError::NotFound {
                entity: "workflow",
                id,
            });
        };
        sqlx::query(
            "UPDATE workflows SET is_default = FALSE, updated_at = now()
             WHERE firm_id = $1 AND service_type = $2 AND is_default AND id <> $3",
        )
        .bind(target.firm_id)
        .bind(&target.service_type)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;
        let query = format!(
            "UPDATE workflows SET is_default = TRUE, updated_at = now()
             WHERE id = $1
             RETURNING {}",
            workflow_repo::COLUMNS
        );
        let row = sqlx::query_as::<_, WorkflowRow>(&query)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify)?;
        tx.commit().await.map_err(classify)?;
        Ok(row.into())
    }

    async fn find_default_workflow(
        &self,
        firm_id: DbId,
        service_type: &str,
    ) -> Result<Option<Workflow>, CoreError> {
        let row = WorkflowRepo::find_default(&self.pool, firm_id, service_type)
            .await
            .map_err(classify)?;
        Ok(row.map(Workflow::from))
    }
}

// ---------------------------------------------------------------------------
// Requests and the ledger
// ---------------------------------------------------------------------------

#[async_trait]
impl RequestStore for PgEngineStore {
    async fn insert_request(
        &self,
        new: NewRequest,
    ) -> Result<(ServiceRequest, StepHistoryEntry), CoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        let query = format!(
            "INSERT INTO service_requests
                (firm_id, workflow_id, client_ref, title, current_step_id, status)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            request_repo::COLUMNS
        );
        let request = sqlx::query_as::<_, ServiceRequestRow>(&query)
            .bind(new.firm_id)
            .bind(new.workflow_id)
            .bind(&new.client_ref)
            .bind(&new.title)
            .bind(new.start_step_id)
            .bind(&new.status)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify)?;
        let query = format!(
            "INSERT INTO step_history (request_id, to_step_id, actor_id)
             VALUES ($1, $2, $3)
             RETURNING {}",
            history_repo::STEP_COLUMNS
        );
        let entry = sqlx::query_as::<_, StepHistoryRow>(&query)
            .bind(request.id)
            .bind(new.start_step_id)
            .bind(new.actor_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify)?;
        tx.commit().await.map_err(classify)?;
        Ok((request.into(), entry.into()))
    }

    async fn find_request(&self, id: DbId) -> Result<Option<ServiceRequest>, CoreError> {
        let row = RequestRepo::find_by_id(&self.pool, id)
            .await
            .map_err(classify)?;
        Ok(row.map(ServiceRequest::from))
    }

    async fn list_requests(&self, filter: RequestFilter) -> Result<Vec<ServiceRequest>, CoreError> {
        let rows = RequestRepo::list(&self.pool, &filter)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(ServiceRequest::from).collect())
    }

    async fn commit_transition(
        &self,
        commit: TransitionCommit,
    ) -> Result<CommitOutcome, CoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let current = lock_request(&mut tx, commit.request_id).await?;
        if current.current_step_id != commit.expected_step_id {
            // Dropping the transaction rolls it back.
            tracing::debug!(
                request_id = commit.request_id,
                expected_step_id = commit.expected_step_id,
                current_step_id = current.current_step_id,
                "Transition commit rejected as stale"
            );
            return Err(CoreError::StaleTransition {
                request_id: commit.request_id,
                expected_step_id: commit.expected_step_id,
            });
        }

        let patch = field_patch(&commit.field_updates);
        let assigned_to = commit
            .assignment
            .as_ref()
            .map(|change| change.to_user_id)
            .or(current.assigned_to);
        let query = format!(
            "UPDATE service_requests
             SET current_step_id = $2, status = $3, fields = fields || $4,
                 assigned_to = $5, updated_at = now()
             WHERE id = $1
             RETURNING {}",
            request_repo::COLUMNS
        );
        let request = sqlx::query_as::<_, ServiceRequestRow>(&query)
            .bind(commit.request_id)
            .bind(commit.to_step_id)
            .bind(&commit.status)
            .bind(&patch)
            .bind(assigned_to)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify)?;

        // Duration comes from the latest ledger entry, measured against the
        // transaction's now() so it matches created_at exactly.
        let query = format!(
            "INSERT INTO step_history
                (request_id, from_step_id, to_step_id, actor_id, note, duration_secs)
             VALUES ($1, $2, $3, $4, $5,
                     (SELECT FLOOR(EXTRACT(EPOCH FROM (now() - created_at)))::BIGINT
                      FROM step_history
                      WHERE request_id = $1
                      ORDER BY id DESC
                      LIMIT 1))
             RETURNING {}",
            history_repo::STEP_COLUMNS
        );
        let step_entry = sqlx::query_as::<_, StepHistoryRow>(&query)
            .bind(commit.request_id)
            .bind(commit.expected_step_id)
            .bind(commit.to_step_id)
            .bind(commit.actor_id)
            .bind(&commit.note)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify)?;

        let assignment_entry = match &commit.assignment {
            Some(change) => {
                Some(insert_assignment_entry(&mut tx, commit.request_id, change).await?)
            }
            None => None,
        };

        tx.commit().await.map_err(classify)?;
        tracing::debug!(
            request_id = commit.request_id,
            to_step_id = commit.to_step_id,
            "Transition committed"
        );
        Ok(CommitOutcome {
            request: request.into(),
            step_entry: step_entry.into(),
            assignment_entry,
        })
    }

    async fn commit_assignment(
        &self,
        commit: AssignmentCommit,
    ) -> Result<(ServiceRequest, AssignmentHistoryEntry), CoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let current = lock_request(&mut tx, commit.request_id).await?;
        if current.assigned_to != commit.change.from_user_id {
            return Err(CoreError::Conflict(format!(
                "assignment of request {} changed concurrently",
                commit.request_id
            )));
        }

        let patch = field_patch(&commit.field_updates);
        let query = format!(
            "UPDATE service_requests
             SET assigned_to = $2, fields = fields || $3, updated_at = now()
             WHERE id = $1
             RETURNING {}",
            request_repo::COLUMNS
        );
        let request = sqlx::query_as::<_, ServiceRequestRow>(&query)
            .bind(commit.request_id)
            .bind(commit.change.to_user_id)
            .bind(&patch)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify)?;
        let entry = insert_assignment_entry(&mut tx, commit.request_id, &commit.change).await?;

        tx.commit().await.map_err(classify)?;
        tracing::debug!(
            request_id = commit.request_id,
            to_user_id = commit.change.to_user_id,
            "Assignment committed"
        );
        Ok((request.into(), entry))
    }

    async fn step_history(&self, request_id: DbId) -> Result<Vec<StepHistoryEntry>, CoreError> {
        let rows = HistoryRepo::list_steps(&self.pool, request_id)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(StepHistoryEntry::from).collect())
    }

    async fn assignment_history(
        &self,
        request_id: DbId,
    ) -> Result<Vec<AssignmentHistoryEntry>, CoreError> {
        let rows = HistoryRepo::list_assignments(&self.pool, request_id)
            .await
            .map_err(classify)?;
        rows.into_iter()
            .map(AssignmentHistoryEntry::try_from)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Staff, notifications, events
// ---------------------------------------------------------------------------

#[async_trait]
impl StaffStore for PgEngineStore {
    async fn find_accountant(&self, id: DbId) -> Result<Option<Accountant>, CoreError> {
        let row = AccountantRepo::find_by_id(&self.pool, id)
            .await
            .map_err(classify)?;
        Ok(row.map(Accountant::from))
    }
}

#[async_trait]
impl NotificationStore for PgEngineStore {
    async fn insert_notification(&self, new: NewNotification) -> Result<Notification, CoreError> {
        let row = NotificationRepo::insert(&self.pool, &new)
            .await
            .map_err(classify)?;
        Ok(row.into())
    }

    async fn list_notifications(
        &self,
        accountant_id: DbId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, CoreError> {
        let rows = NotificationRepo::list_for_accountant(&self.pool, accountant_id, unread_only)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn mark_notification_read(&self, id: DbId, accountant_id: DbId) -> Result<bool, CoreError> {
        NotificationRepo::mark_read(&self.pool, id, accountant_id)
            .await
            .map_err(classify)
    }
}

#[async_trait]
impl EventStore for PgEngineStore {
    async fn append_event(&self, event: NewEvent) -> Result<DbId, CoreError> {
        EventRepo::insert(&self.pool, &event).await.map_err(classify)
    }
}

#[async_trait]
impl EngineStore for PgEngineStore {
    async fn ping(&self) -> Result<(), CoreError> {
        crate::health_check(&self.pool).await.map_err(classify)
    }
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

#[async_trait]
impl RoleProvider for PgEngineStore {
    async fn actor_has_role(&self, actor_id: DbId, role: &str) -> Result<bool, CoreError> {
        AccountantRepo::has_role(&self.pool, actor_id, role)
            .await
            .map_err(classify)
    }

    async fn resolve_role_assignee(
        &self,
        firm_id: DbId,
        role: &str,
    ) -> Result<Option<DbId>, CoreError> {
        let row = AccountantRepo::find_role_holder(&self.pool, firm_id, role)
            .await
            .map_err(classify)?;
        Ok(row.map(|accountant| accountant.id))
    }
}
