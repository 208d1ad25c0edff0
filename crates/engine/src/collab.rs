//! Collaborator interfaces the executor calls back into.
//!
//! Identity/roles, request-field mutation, and task creation are owned by
//! other parts of the platform. The engine consumes them through these
//! traits; the defaults here are the in-process implementations used until
//! a subsystem grows its own service.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use praxis_core::error::CoreError;
use praxis_core::graph::TaskSpec;
use praxis_core::types::DbId;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of an external collaborator call.
///
/// `retryable` distinguishes a transient fault (timeout, connection drop)
/// from a permanent rejection (invalid value). The executor surfaces it as
/// `CoreError::AutomationFailed` with the same flag; nothing is committed
/// either way, so a transient failure may be retried by repeating the whole
/// transition call.
#[derive(Debug, Clone)]
pub struct CollabError {
    pub reason: String,
    pub retryable: bool,
}

impl CollabError {
    pub fn permanent(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retryable: false,
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retryable: true,
        }
    }
}

impl std::fmt::Display for CollabError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Identity and role membership, used for transition role restrictions and
/// role-targeted assignment automations.
#[async_trait]
pub trait RoleProvider: Send + Sync {
    async fn actor_has_role(&self, actor_id: DbId, role: &str) -> Result<bool, CoreError>;

    /// Pick the accountant an `assign_to(role)` automation resolves to:
    /// an active accountant of the firm holding `role`, or `None`.
    async fn resolve_role_assignee(
        &self,
        firm_id: DbId,
        role: &str,
    ) -> Result<Option<DbId>, CoreError>;
}

/// Validation hook for `set_field` automations.
///
/// Accepted values are buffered by the executor and persisted inside the
/// transition commit, so implementations must not write anything
/// themselves.
#[async_trait]
pub trait FieldStore: Send + Sync {
    async fn set_request_field(
        &self,
        request_id: DbId,
        name: &str,
        value: &serde_json::Value,
    ) -> Result<(), CollabError>;
}

/// Task creation for `create_task` automations.
///
/// The call happens before the transition commits; an external task system
/// is at-least-once and exempt from rollback.
#[async_trait]
pub trait TaskCreator: Send + Sync {
    async fn create_task(&self, request_id: DbId, spec: &TaskSpec) -> Result<DbId, CollabError>;
}

// ---------------------------------------------------------------------------
// Default implementations
// ---------------------------------------------------------------------------

/// Request-row columns that `set_field` may never shadow.
const RESERVED_FIELDS: &[&str] = &["id", "status", "current_step_id", "assigned_to", "workflow_id"];

/// Default [`FieldStore`]: checks the field name and value shape, then
/// accepts. Every rejection is permanent; the caller must fix the workflow
/// definition, not retry.
pub struct FieldValidator;

#[async_trait]
impl FieldStore for FieldValidator {
    async fn set_request_field(
        &self,
        _request_id: DbId,
        name: &str,
        value: &serde_json::Value,
    ) -> Result<(), CollabError> {
        if name.trim().is_empty() {
            return Err(CollabError::permanent("field name must not be empty"));
        }
        if name.len() > 128 {
            return Err(CollabError::permanent(
                "field name must be at most 128 characters",
            ));
        }
        if RESERVED_FIELDS.contains(&name) {
            return Err(CollabError::permanent(format!(
                "field name '{name}' is reserved"
            )));
        }
        if value.is_null() {
            return Err(CollabError::permanent(
                "field value must not be null; omit the action instead",
            ));
        }
        Ok(())
    }
}

/// Default [`TaskCreator`]: records the task and hands out sequential ids.
/// Stands in until the task subsystem exists as its own service.
#[derive(Default)]
pub struct TaskRegister {
    next_id: AtomicI64,
    created: Mutex<Vec<(DbId, TaskSpec)>>,
}

impl TaskRegister {
    /// Tasks recorded so far, oldest first.
    pub fn created(&self) -> Vec<(DbId, TaskSpec)> {
        self.created.lock().expect("task register poisoned").clone()
    }
}

#[async_trait]
impl TaskCreator for TaskRegister {
    async fn create_task(&self, request_id: DbId, spec: &TaskSpec) -> Result<DbId, CollabError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.created
            .lock()
            .expect("task register poisoned")
            .push((request_id, spec.clone()));
        tracing::info!(request_id, task_id = id, title = %spec.title, "Task created");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn field_validator_rejects_reserved_and_empty_names() {
        let v = FieldValidator;
        assert!(v
            .set_request_field(1, "deadline", &serde_json::json!("2026-09-30"))
            .await
            .is_ok());

        let err = v
            .set_request_field(1, "status", &serde_json::json!("x"))
            .await
            .unwrap_err();
        assert!(!err.retryable);

        assert!(v
            .set_request_field(1, "  ", &serde_json::json!("x"))
            .await
            .is_err());
        assert!(v
            .set_request_field(1, "note", &serde_json::Value::Null)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn task_register_hands_out_sequential_ids() {
        let tasks = TaskRegister::default();
        let spec = TaskSpec {
            title: "Chase trustee signature".into(),
            notes: None,
            due_in_days: Some(7),
        };
        let a = tasks.create_task(5, &spec).await.unwrap();
        let b = tasks.create_task(5, &spec).await.unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(tasks.created().len(), 2);
    }
}
