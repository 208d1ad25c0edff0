//! Manual assignment operations.
//!
//! `assign` and `reassign` run under the same per-request lock as the
//! transition executor, so an automation-driven assignment and a manual
//! one can never interleave on one request. The assignment ledger is the
//! source of truth; `assigned_to` on the request row is a cache written
//! in the same commit.

use praxis_core::error::CoreError;
use praxis_core::request::{AssignmentHistoryEntry, AssignmentKind, ServiceRequest};
use praxis_core::staff::Accountant;
use praxis_core::store::{AssignmentChange, AssignmentCommit};
use praxis_core::types::{DbId, Timestamp};
use praxis_events::bus::{EVENT_REQUEST_ASSIGNED, EVENT_REQUEST_REASSIGNED};
use praxis_events::PlatformEvent;

use crate::executor::WorkflowEngine;

impl WorkflowEngine {
    /// Give an unassigned request its first assignee, optionally recording
    /// a deadline and priority on the request's fields.
    pub async fn assign(
        &self,
        request_id: DbId,
        accountant_id: DbId,
        actor_id: DbId,
        deadline: Option<Timestamp>,
        priority: Option<String>,
    ) -> Result<(ServiceRequest, AssignmentHistoryEntry), CoreError> {
        let _guard = self.locks().acquire(request_id).await;

        let request = self.find_request(request_id).await?;
        if let Some(assignee_id) = request.assigned_to {
            return Err(CoreError::AlreadyAssigned {
                request_id,
                assignee_id,
            });
        }
        let accountant = self.active_accountant(accountant_id).await?;

        let mut field_updates = Vec::new();
        if let Some(deadline) = deadline {
            field_updates.push(("deadline".to_string(), serde_json::json!(deadline)));
        }
        if let Some(priority) = &priority {
            field_updates.push(("priority".to_string(), serde_json::json!(priority)));
        }

        let (request, entry) = self
            .store()
            .commit_assignment(AssignmentCommit {
                request_id,
                change: AssignmentChange {
                    from_user_id: None,
                    to_user_id: accountant.id,
                    kind: AssignmentKind::Initial,
                    actor_id,
                    reason: None,
                },
                field_updates,
            })
            .await?;

        tracing::info!(
            request_id,
            accountant_id = accountant.id,
            actor_id,
            "Request assigned"
        );
        self.bus().publish(
            PlatformEvent::new(EVENT_REQUEST_ASSIGNED)
                .with_entity("request", request_id)
                .with_actor(actor_id)
                .with_payload(serde_json::json!({
                    "from_user_id": null,
                    "to_user_id": accountant.id,
                    "via": "manual",
                    "deadline": deadline,
                    "priority": priority,
                })),
        );
        Ok((request, entry))
    }

    /// Move a request to a different accountant. The reason is mandatory
    /// and lands verbatim in the assignment ledger.
    pub async fn reassign(
        &self,
        request_id: DbId,
        new_accountant_id: DbId,
        actor_id: DbId,
        reason: String,
    ) -> Result<(ServiceRequest, AssignmentHistoryEntry), CoreError> {
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(CoreError::MissingReason);
        }

        let _guard = self.locks().acquire(request_id).await;

        let request = self.find_request(request_id).await?;
        let Some(current) = request.assigned_to else {
            return Err(CoreError::Conflict(format!(
                "request {request_id} is unassigned; use assign instead"
            )));
        };
        if current == new_accountant_id {
            return Err(CoreError::Conflict(format!(
                "request {request_id} is already assigned to accountant {new_accountant_id}"
            )));
        }
        let accountant = self.active_accountant(new_accountant_id).await?;

        let (request, entry) = self
            .store()
            .commit_assignment(AssignmentCommit {
                request_id,
                change: AssignmentChange {
                    from_user_id: Some(current),
                    to_user_id: accountant.id,
                    kind: AssignmentKind::Reassignment,
                    actor_id,
                    reason: Some(reason.clone()),
                },
                field_updates: Vec::new(),
            })
            .await?;

        tracing::info!(
            request_id,
            from_user_id = current,
            to_user_id = accountant.id,
            actor_id,
            "Request reassigned"
        );
        self.bus().publish(
            PlatformEvent::new(EVENT_REQUEST_REASSIGNED)
                .with_entity("request", request_id)
                .with_actor(actor_id)
                .with_payload(serde_json::json!({
                    "from_user_id": current,
                    "to_user_id": accountant.id,
                    "via": "manual",
                    "reason": reason,
                })),
        );
        Ok((request, entry))
    }

    /// The assignee according to the assignment ledger, not the cached
    /// request row.
    pub async fn current_assignee(&self, request_id: DbId) -> Result<Option<DbId>, CoreError> {
        self.find_request(request_id).await?;
        let history = self.store().assignment_history(request_id).await?;
        Ok(history.last().map(|entry| entry.to_user_id))
    }

    async fn find_request(&self, request_id: DbId) -> Result<ServiceRequest, CoreError> {
        self.store()
            .find_request(request_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "request",
                id: request_id,
            })
    }

    async fn active_accountant(&self, accountant_id: DbId) -> Result<Accountant, CoreError> {
        let accountant = self
            .store()
            .find_accountant(accountant_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "accountant",
                id: accountant_id,
            })?;
        if !accountant.is_active {
            return Err(CoreError::Validation(format!(
                "accountant {accountant_id} is inactive"
            )));
        }
        Ok(accountant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fixture;
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};
    use praxis_core::store::RequestStore;
    use praxis_events::bus::EVENT_REQUEST_REASSIGNED;

    #[tokio::test]
    async fn assign_sets_assignee_and_records_initial_entry() {
        let fx = fixture().await;
        let request = fx.raise().await;
        let deadline = Utc::now() + Duration::days(14);

        let (request, entry) = fx
            .engine
            .assign(
                request.id,
                fx.auditor,
                fx.manager,
                Some(deadline),
                Some("high".into()),
            )
            .await
            .unwrap();

        assert_eq!(request.assigned_to, Some(fx.auditor));
        assert_eq!(request.fields["priority"], "high");
        assert!(request.fields.get("deadline").is_some());
        assert_eq!(entry.kind, AssignmentKind::Initial);
        assert_eq!(entry.from_user_id, None);
        assert_eq!(entry.to_user_id, fx.auditor);
        assert_eq!(entry.reason, None);

        assert_eq!(
            fx.engine.current_assignee(request.id).await.unwrap(),
            Some(fx.auditor)
        );
    }

    #[tokio::test]
    async fn assign_rejects_an_already_assigned_request() {
        let fx = fixture().await;
        let request = fx.raise().await;
        fx.engine
            .assign(request.id, fx.auditor, fx.manager, None, None)
            .await
            .unwrap();

        let err = fx
            .engine
            .assign(request.id, fx.partner, fx.manager, None, None)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::AlreadyAssigned { assignee_id, .. } => {
            assert_eq!(assignee_id, fx.auditor);
        });
    }

    #[tokio::test]
    async fn assign_rejects_unknown_and_inactive_accountants() {
        let fx = fixture().await;
        let request = fx.raise().await;

        let err = fx
            .engine
            .assign(request.id, 9999, fx.manager, None, None)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NotFound { entity: "accountant", .. });

        fx.store.set_accountant_active(fx.auditor, false).unwrap();
        let err = fx
            .engine
            .assign(request.id, fx.auditor, fx.manager, None, None)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[tokio::test]
    async fn reassign_requires_a_reason_and_a_prior_assignee() {
        let fx = fixture().await;
        let request = fx.raise().await;

        let err = fx
            .engine
            .reassign(request.id, fx.auditor, fx.manager, "  ".into())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::MissingReason);

        let err = fx
            .engine
            .reassign(request.id, fx.auditor, fx.manager, "load balancing".into())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));
    }

    #[tokio::test]
    async fn reassign_records_from_to_and_reason() {
        let fx = fixture().await;
        let request = fx.raise().await;
        fx.engine
            .assign(request.id, fx.auditor, fx.manager, None, None)
            .await
            .unwrap();
        let mut rx = fx.bus.subscribe();

        let (request, entry) = fx
            .engine
            .reassign(request.id, fx.partner, fx.manager, "auditor on leave".into())
            .await
            .unwrap();

        assert_eq!(request.assigned_to, Some(fx.partner));
        assert_eq!(entry.kind, AssignmentKind::Reassignment);
        assert_eq!(entry.from_user_id, Some(fx.auditor));
        assert_eq!(entry.to_user_id, fx.partner);
        assert_eq!(entry.reason.as_deref(), Some("auditor on leave"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EVENT_REQUEST_REASSIGNED);
        assert_eq!(event.payload["reason"], "auditor on leave");

        let history = fx.store.assignment_history(request.id).await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn reassign_to_the_same_accountant_is_a_conflict() {
        let fx = fixture().await;
        let request = fx.raise().await;
        fx.engine
            .assign(request.id, fx.auditor, fx.manager, None, None)
            .await
            .unwrap();

        let err = fx
            .engine
            .reassign(request.id, fx.auditor, fx.manager, "no-op move".into())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));
    }

    #[tokio::test]
    async fn current_assignee_follows_the_ledger() {
        let fx = fixture().await;
        let request = fx.raise().await;
        assert_eq!(fx.engine.current_assignee(request.id).await.unwrap(), None);

        fx.engine
            .assign(request.id, fx.auditor, fx.manager, None, None)
            .await
            .unwrap();
        fx.engine
            .reassign(request.id, fx.partner, fx.manager, "handover".into())
            .await
            .unwrap();
        assert_eq!(
            fx.engine.current_assignee(request.id).await.unwrap(),
            Some(fx.partner)
        );

        assert_matches!(
            fx.engine.current_assignee(9999).await.unwrap_err(),
            CoreError::NotFound { .. }
        );
    }
}
