//! In-memory implementation of the storage port.
//!
//! Backs the engine and API test suites and behaves like the Postgres
//! store, including the optimistic guards on the commit operations: a
//! commit whose expected state no longer matches is rejected, never
//! half-applied.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use praxis_core::error::CoreError;
use praxis_core::graph::{Step, Transition, Workflow, WorkflowGraph};
use praxis_core::notification::{NewNotification, Notification};
use praxis_core::request::{AssignmentHistoryEntry, ServiceRequest, StepHistoryEntry};
use praxis_core::staff::Accountant;
use praxis_core::store::{
    AssignmentCommit, CommitOutcome, EngineStore, EventStore, NewEvent, NewRequest, NewStep,
    NewTransition, NewWorkflow, NotificationStore, RequestFilter, RequestStore, StaffStore,
    TransitionCommit, WorkflowStore,
};
use praxis_core::types::DbId;

use crate::collab::RoleProvider;

#[derive(Default)]
struct Inner {
    next_id: DbId,
    workflows: HashMap<DbId, Workflow>,
    steps: Vec<Step>,
    transitions: Vec<Transition>,
    requests: HashMap<DbId, ServiceRequest>,
    step_entries: Vec<StepHistoryEntry>,
    assignment_entries: Vec<AssignmentHistoryEntry>,
    accountants: HashMap<DbId, Accountant>,
    roles: HashMap<DbId, HashSet<String>>,
    notifications: Vec<Notification>,
    events: Vec<(DbId, NewEvent)>,
}

impl Inner {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

/// One shared mutable state behind a mutex; every operation locks, applies,
/// and releases without awaiting, so the store itself cannot deadlock.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, CoreError> {
        self.inner
            .lock()
            .map_err(|_| CoreError::Internal("memory store lock poisoned".into()))
    }

    /// Insert an accountant with the given roles. Test/demo seeding.
    pub fn seed_accountant(
        &self,
        firm_id: DbId,
        display_name: &str,
        roles: &[&str],
    ) -> Result<Accountant, CoreError> {
        let mut inner = self.lock()?;
        let id = inner.next_id();
        let accountant = Accountant {
            id,
            firm_id,
            display_name: display_name.to_string(),
            email: format!(
                "{}@praxis.test",
                display_name.to_lowercase().replace(' ', ".")
            ),
            is_active: true,
            created_at: Utc::now(),
        };
        inner.accountants.insert(id, accountant.clone());
        inner
            .roles
            .insert(id, roles.iter().map(|r| r.to_string()).collect());
        Ok(accountant)
    }

    pub fn set_accountant_active(&self, id: DbId, active: bool) -> Result<(), CoreError> {
        let mut inner = self.lock()?;
        let accountant = inner
            .accountants
            .get_mut(&id)
            .ok_or(CoreError::NotFound {
                entity: "accountant",
                id,
            })?;
        accountant.is_active = active;
        Ok(())
    }

    /// Snapshot of the durable event log, oldest first.
    pub fn recorded_events(&self) -> Result<Vec<NewEvent>, CoreError> {
        Ok(self.lock()?.events.iter().map(|(_, e)| e.clone()).collect())
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn create_workflow(&self, new: NewWorkflow) -> Result<Workflow, CoreError> {
        let mut inner = self.lock()?;
        let id = inner.next_id();
        let now = Utc::now();
        let workflow = Workflow {
            id,
            firm_id: new.firm_id,
            name: new.name,
            service_type: new.service_type,
            is_active: false,
            is_default: false,
            created_at: now,
            updated_at: now,
        };
        inner.workflows.insert(id, workflow.clone());
        Ok(workflow)
    }

    async fn find_workflow(&self, id: DbId) -> Result<Option<Workflow>, CoreError> {
        Ok(self.lock()?.workflows.get(&id).cloned())
    }

    async fn list_workflows(&self, firm_id: DbId) -> Result<Vec<Workflow>, CoreError> {
        let inner = self.lock()?;
        let mut workflows: Vec<_> = inner
            .workflows
            .values()
            .filter(|w| w.firm_id == firm_id)
            .cloned()
            .collect();
        workflows.sort_by_key(|w| w.id);
        Ok(workflows)
    }

    async fn load_graph(&self, id: DbId) -> Result<Option<WorkflowGraph>, CoreError> {
        let inner = self.lock()?;
        let Some(workflow) = inner.workflows.get(&id).cloned() else {
            return Ok(None);
        };
        let steps = inner
            .steps
            .iter()
            .filter(|s| s.workflow_id == id)
            .cloned()
            .collect();
        let transitions = inner
            .transitions
            .iter()
            .filter(|t| t.workflow_id == id)
            .cloned()
            .collect();
        Ok(Some(WorkflowGraph::new(workflow, steps, transitions)))
    }

    async fn add_step(&self, workflow_id: DbId, new: NewStep) -> Result<Step, CoreError> {
        let mut inner = self.lock()?;
        if !inner.workflows.contains_key(&workflow_id) {
            return Err(CoreError::NotFound {
                entity: "workflow",
                id: workflow_id,
            });
        }
        let id = inner.next_id();
        let step = Step {
            id,
            workflow_id,
            name: new.name,
            ordering: new.ordering,
            kind: new.kind,
        };
        inner.steps.push(step.clone());
        Ok(step)
    }

    async fn add_transition(
        &self,
        workflow_id: DbId,
        new: NewTransition,
    ) -> Result<Transition, CoreError> {
        let mut inner = self.lock()?;
        if !inner.workflows.contains_key(&workflow_id) {
            return Err(CoreError::NotFound {
                entity: "workflow",
                id: workflow_id,
            });
        }
        for step_id in [new.from_step_id, new.to_step_id] {
            let belongs = inner
                .steps
                .iter()
                .any(|s| s.id == step_id && s.workflow_id == workflow_id);
            if !belongs {
                return Err(CoreError::Validation(format!(
                    "step {step_id} does not belong to workflow {workflow_id}"
                )));
            }
        }
        let id = inner.next_id();
        let transition = Transition {
            id,
            workflow_id,
            from_step_id: new.from_step_id,
            to_step_id: new.to_step_id,
            name: new.name,
            allowed_roles: new.allowed_roles,
            actions: new.actions,
        };
        inner.transitions.push(transition.clone());
        Ok(transition)
    }

    async fn set_workflow_active(&self, id: DbId) -> Result<Workflow, CoreError> {
        let mut inner = self.lock()?;
        let workflow = inner.workflows.get_mut(&id).ok_or(CoreError::NotFound {
            entity: "workflow",
            id,
        })?;
        workflow.is_active = true;
        workflow.updated_at = Utc::now();
        Ok(workflow.clone())
    }

    async fn set_default_workflow(&self, id: DbId) -> Result<Workflow, CoreError> {
        let mut inner = self.lock()?;
        let target = inner.workflows.get(&id).cloned().ok_or(CoreError::NotFound {
            entity: "workflow",
            id,
        })?;
        let now = Utc::now();
        for workflow in inner.workflows.values_mut() {
            if workflow.firm_id == target.firm_id
                && workflow.service_type == target.service_type
                && workflow.is_default
            {
                workflow.is_default = false;
                workflow.updated_at = now;
            }
        }
        let workflow = inner
            .workflows
            .get_mut(&id)
            .ok_or(CoreError::NotFound {
                entity: "workflow",
                id,
            })?;
        workflow.is_default = true;
        workflow.updated_at = now;
        Ok(workflow.clone())
    }

    async fn find_default_workflow(
        &self,
        firm_id: DbId,
        service_type: &str,
    ) -> Result<Option<Workflow>, CoreError> {
        Ok(self
            .lock()?
            .workflows
            .values()
            .find(|w| w.firm_id == firm_id && w.service_type == service_type && w.is_default)
            .cloned())
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn insert_request(
        &self,
        new: NewRequest,
    ) -> Result<(ServiceRequest, StepHistoryEntry), CoreError> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        let request_id = inner.next_id();
        let entry_id = inner.next_id();
        let request = ServiceRequest {
            id: request_id,
            firm_id: new.firm_id,
            workflow_id: new.workflow_id,
            client_ref: new.client_ref,
            title: new.title,
            current_step_id: new.start_step_id,
            status: new.status,
            assigned_to: None,
            fields: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        };
        let entry = StepHistoryEntry {
            id: entry_id,
            request_id,
            from_step_id: None,
            to_step_id: new.start_step_id,
            actor_id: new.actor_id,
            note: None,
            duration_secs: None,
            created_at: now,
        };
        inner.requests.insert(request_id, request.clone());
        inner.step_entries.push(entry.clone());
        Ok((request, entry))
    }

    async fn find_request(&self, id: DbId) -> Result<Option<ServiceRequest>, CoreError> {
        Ok(self.lock()?.requests.get(&id).cloned())
    }

    async fn list_requests(&self, filter: RequestFilter) -> Result<Vec<ServiceRequest>, CoreError> {
        let inner = self.lock()?;
        let mut requests: Vec<_> = inner
            .requests
            .values()
            .filter(|r| filter.firm_id.map_or(true, |f| r.firm_id == f))
            .filter(|r| filter.step_id.map_or(true, |s| r.current_step_id == s))
            .filter(|r| filter.assigned_to.map_or(true, |a| r.assigned_to == Some(a)))
            .filter(|r| {
                filter
                    .status
                    .as_deref()
                    .map_or(true, |status| r.status == status)
            })
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let offset = filter.offset.max(0) as usize;
        let limit = filter.limit.max(0) as usize;
        Ok(requests.into_iter().skip(offset).take(limit).collect())
    }

    async fn commit_transition(
        &self,
        commit: TransitionCommit,
    ) -> Result<CommitOutcome, CoreError> {
        let mut inner = self.lock()?;
        let now = Utc::now();

        // Duration comes from the latest ledger entry, read before any write.
        let previous_created_at = inner
            .step_entries
            .iter()
            .rev()
            .find(|e| e.request_id == commit.request_id)
            .map(|e| e.created_at);

        {
            let request =
                inner
                    .requests
                    .get(&commit.request_id)
                    .ok_or(CoreError::NotFound {
                        entity: "request",
                        id: commit.request_id,
                    })?;
            if request.current_step_id != commit.expected_step_id {
                return Err(CoreError::StaleTransition {
                    request_id: commit.request_id,
                    expected_step_id: commit.expected_step_id,
                });
            }
        }

        let step_entry_id = inner.next_id();
        let assignment_entry_id = if commit.assignment.is_some() {
            Some(inner.next_id())
        } else {
            None
        };

        let request = inner
            .requests
            .get_mut(&commit.request_id)
            .ok_or(CoreError::NotFound {
                entity: "request",
                id: commit.request_id,
            })?;
        if let serde_json::Value::Object(fields) = &mut request.fields {
            for (name, value) in &commit.field_updates {
                fields.insert(name.clone(), value.clone());
            }
        }
        request.current_step_id = commit.to_step_id;
        request.status = commit.status.clone();
        request.updated_at = now;
        if let Some(change) = &commit.assignment {
            request.assigned_to = Some(change.to_user_id);
        }
        let request = request.clone();

        let step_entry = StepHistoryEntry {
            id: step_entry_id,
            request_id: commit.request_id,
            from_step_id: Some(commit.expected_step_id),
            to_step_id: commit.to_step_id,
            actor_id: commit.actor_id,
            note: commit.note.clone(),
            duration_secs: previous_created_at.map(|t| (now - t).num_seconds()),
            created_at: now,
        };
        inner.step_entries.push(step_entry.clone());

        let assignment_entry = match (&commit.assignment, assignment_entry_id) {
            (Some(change), Some(id)) => {
                let entry = AssignmentHistoryEntry {
                    id,
                    request_id: commit.request_id,
                    from_user_id: change.from_user_id,
                    to_user_id: change.to_user_id,
                    kind: change.kind,
                    actor_id: change.actor_id,
                    reason: change.reason.clone(),
                    created_at: now,
                };
                inner.assignment_entries.push(entry.clone());
                Some(entry)
            }
            _ => None,
        };

        Ok(CommitOutcome {
            request,
            step_entry,
            assignment_entry,
        })
    }

    async fn commit_assignment(
        &self,
        commit: AssignmentCommit,
    ) -> Result<(ServiceRequest, AssignmentHistoryEntry), CoreError> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        let entry_id = inner.next_id();

        let request = inner
            .requests
            .get_mut(&commit.request_id)
            .ok_or(CoreError::NotFound {
                entity: "request",
                id: commit.request_id,
            })?;
        if request.assigned_to != commit.change.from_user_id {
            return Err(CoreError::Conflict(format!(
                "assignment of request {} changed concurrently",
                commit.request_id
            )));
        }
        if let serde_json::Value::Object(fields) = &mut request.fields {
            for (name, value) in &commit.field_updates {
                fields.insert(name.clone(), value.clone());
            }
        }
        request.assigned_to = Some(commit.change.to_user_id);
        request.updated_at = now;
        let request = request.clone();

        let entry = AssignmentHistoryEntry {
            id: entry_id,
            request_id: commit.request_id,
            from_user_id: commit.change.from_user_id,
            to_user_id: commit.change.to_user_id,
            kind: commit.change.kind,
            actor_id: commit.change.actor_id,
            reason: commit.change.reason,
            created_at: now,
        };
        inner.assignment_entries.push(entry.clone());
        Ok((request, entry))
    }

    async fn step_history(&self, request_id: DbId) -> Result<Vec<StepHistoryEntry>, CoreError> {
        Ok(self
            .lock()?
            .step_entries
            .iter()
            .filter(|e| e.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn assignment_history(
        &self,
        request_id: DbId,
    ) -> Result<Vec<AssignmentHistoryEntry>, CoreError> {
        Ok(self
            .lock()?
            .assignment_entries
            .iter()
            .filter(|e| e.request_id == request_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StaffStore for MemoryStore {
    async fn find_accountant(&self, id: DbId) -> Result<Option<Accountant>, CoreError> {
        Ok(self.lock()?.accountants.get(&id).cloned())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(&self, new: NewNotification) -> Result<Notification, CoreError> {
        let mut inner = self.lock()?;
        let id = inner.next_id();
        let notification = Notification {
            id,
            accountant_id: new.accountant_id,
            template: new.template,
            body: new.body,
            read_at: None,
            created_at: Utc::now(),
        };
        inner.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn list_notifications(
        &self,
        accountant_id: DbId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, CoreError> {
        let inner = self.lock()?;
        let mut notifications: Vec<_> = inner
            .notifications
            .iter()
            .filter(|n| n.accountant_id == accountant_id)
            .filter(|n| !unread_only || n.read_at.is_none())
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }

    async fn mark_notification_read(&self, id: DbId, accountant_id: DbId) -> Result<bool, CoreError> {
        let mut inner = self.lock()?;
        match inner
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.accountant_id == accountant_id)
        {
            Some(notification) => {
                if notification.read_at.is_none() {
                    notification.read_at = Some(Utc::now());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn append_event(&self, event: NewEvent) -> Result<DbId, CoreError> {
        let mut inner = self.lock()?;
        let id = inner.next_id();
        inner.events.push((id, event));
        Ok(id)
    }
}

#[async_trait]
impl RoleProvider for MemoryStore {
    async fn actor_has_role(&self, actor_id: DbId, role: &str) -> Result<bool, CoreError> {
        Ok(self
            .lock()?
            .roles
            .get(&actor_id)
            .is_some_and(|roles| roles.contains(role)))
    }

    async fn resolve_role_assignee(
        &self,
        firm_id: DbId,
        role: &str,
    ) -> Result<Option<DbId>, CoreError> {
        let inner = self.lock()?;
        let mut candidates: Vec<DbId> = inner
            .accountants
            .values()
            .filter(|a| a.firm_id == firm_id && a.is_active)
            .filter(|a| {
                inner
                    .roles
                    .get(&a.id)
                    .is_some_and(|roles| roles.contains(role))
            })
            .map(|a| a.id)
            .collect();
        candidates.sort_unstable();
        Ok(candidates.first().copied())
    }
}

#[async_trait]
impl EngineStore for MemoryStore {
    async fn ping(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use praxis_core::graph::StepKind;
    use praxis_core::request::AssignmentKind;
    use praxis_core::store::AssignmentChange;

    async fn seed_request(store: &MemoryStore) -> (ServiceRequest, DbId, DbId) {
        let workflow = store
            .create_workflow(NewWorkflow {
                firm_id: 1,
                name: "Audit".into(),
                service_type: "smsf_audit".into(),
            })
            .await
            .unwrap();
        let start = store
            .add_step(
                workflow.id,
                NewStep {
                    name: "New".into(),
                    ordering: 0,
                    kind: StepKind::Start,
                },
            )
            .await
            .unwrap();
        let next = store
            .add_step(
                workflow.id,
                NewStep {
                    name: "In progress".into(),
                    ordering: 1,
                    kind: StepKind::Normal,
                },
            )
            .await
            .unwrap();
        let (request, _) = store
            .insert_request(NewRequest {
                firm_id: 1,
                workflow_id: workflow.id,
                client_ref: "FUND-001".into(),
                title: "FY26 audit".into(),
                start_step_id: start.id,
                status: "open".into(),
                actor_id: 99,
            })
            .await
            .unwrap();
        (request, start.id, next.id)
    }

    #[tokio::test]
    async fn commit_transition_enforces_expected_step() {
        let store = MemoryStore::new();
        let (request, start_id, next_id) = seed_request(&store).await;

        let stale = store
            .commit_transition(TransitionCommit {
                request_id: request.id,
                expected_step_id: next_id, // wrong: request is at start
                to_step_id: start_id,
                status: "open".into(),
                actor_id: 99,
                note: None,
                field_updates: Vec::new(),
                assignment: None,
            })
            .await;
        assert_matches!(stale, Err(CoreError::StaleTransition { .. }));
        assert_eq!(store.step_history(request.id).await.unwrap().len(), 1);

        let outcome = store
            .commit_transition(TransitionCommit {
                request_id: request.id,
                expected_step_id: start_id,
                to_step_id: next_id,
                status: "in_progress".into(),
                actor_id: 99,
                note: Some("starting".into()),
                field_updates: vec![("priority".into(), serde_json::json!("high"))],
                assignment: Some(AssignmentChange {
                    from_user_id: None,
                    to_user_id: 7,
                    kind: AssignmentKind::Initial,
                    actor_id: 99,
                    reason: None,
                }),
            })
            .await
            .unwrap();

        assert_eq!(outcome.request.current_step_id, next_id);
        assert_eq!(outcome.request.status, "in_progress");
        assert_eq!(outcome.request.assigned_to, Some(7));
        assert_eq!(outcome.request.fields["priority"], "high");
        assert_eq!(outcome.step_entry.from_step_id, Some(start_id));
        assert!(outcome.step_entry.duration_secs.is_some());
        let assignment = outcome.assignment_entry.unwrap();
        assert_eq!(assignment.to_user_id, 7);
        assert_eq!(assignment.created_at, outcome.step_entry.created_at);
    }

    #[tokio::test]
    async fn commit_assignment_rejects_concurrent_change() {
        let store = MemoryStore::new();
        let (request, _, _) = seed_request(&store).await;

        store
            .commit_assignment(AssignmentCommit {
                request_id: request.id,
                change: AssignmentChange {
                    from_user_id: None,
                    to_user_id: 7,
                    kind: AssignmentKind::Initial,
                    actor_id: 99,
                    reason: None,
                },
                field_updates: Vec::new(),
            })
            .await
            .unwrap();

        // A second initial assignment raced in; its expected prior state is
        // stale now.
        let conflict = store
            .commit_assignment(AssignmentCommit {
                request_id: request.id,
                change: AssignmentChange {
                    from_user_id: None,
                    to_user_id: 8,
                    kind: AssignmentKind::Initial,
                    actor_id: 99,
                    reason: None,
                },
                field_updates: Vec::new(),
            })
            .await;
        assert_matches!(conflict, Err(CoreError::Conflict(_)));
        assert_eq!(store.assignment_history(request.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn set_default_workflow_clears_previous_default() {
        let store = MemoryStore::new();
        let a = store
            .create_workflow(NewWorkflow {
                firm_id: 1,
                name: "Audit v1".into(),
                service_type: "smsf_audit".into(),
            })
            .await
            .unwrap();
        let b = store
            .create_workflow(NewWorkflow {
                firm_id: 1,
                name: "Audit v2".into(),
                service_type: "smsf_audit".into(),
            })
            .await
            .unwrap();

        store.set_default_workflow(a.id).await.unwrap();
        store.set_default_workflow(b.id).await.unwrap();

        let old = store.find_workflow(a.id).await.unwrap().unwrap();
        assert!(!old.is_default);
        let found = store
            .find_default_workflow(1, "smsf_audit")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, b.id);
    }

    #[tokio::test]
    async fn role_assignee_resolution_skips_inactive_accountants() {
        let store = MemoryStore::new();
        let first = store.seed_accountant(1, "Avery Chen", &["auditor"]).unwrap();
        let second = store.seed_accountant(1, "Bram Holt", &["auditor"]).unwrap();
        store.seed_accountant(2, "Other Firm", &["auditor"]).unwrap();

        assert_eq!(
            store.resolve_role_assignee(1, "auditor").await.unwrap(),
            Some(first.id)
        );

        store.set_accountant_active(first.id, false).unwrap();
        assert_eq!(
            store.resolve_role_assignee(1, "auditor").await.unwrap(),
            Some(second.id)
        );
        assert_eq!(store.resolve_role_assignee(1, "partner").await.unwrap(), None);
    }
}
