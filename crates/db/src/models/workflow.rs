//! Workflow, step, and transition row structs.

use serde::Serialize;
use sqlx::FromRow;

use praxis_core::error::CoreError;
use praxis_core::graph::{AutomationAction, Step, StepKind, Transition, Workflow};
use praxis_core::types::{DbId, Timestamp};

/// A row from the `workflows` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkflowRow {
    pub id: DbId,
    pub firm_id: DbId,
    pub name: String,
    pub service_type: String,
    pub is_active: bool,
    pub is_default: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<WorkflowRow> for Workflow {
    fn from(row: WorkflowRow) -> Self {
        Workflow {
            id: row.id,
            firm_id: row.firm_id,
            name: row.name,
            service_type: row.service_type,
            is_active: row.is_active,
            is_default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A row from the `steps` table. `kind` is constrained by a CHECK to the
/// four step kinds, so a parse failure means the schema and the enum have
/// drifted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StepRow {
    pub id: DbId,
    pub workflow_id: DbId,
    pub name: String,
    pub ordering: i32,
    pub kind: String,
}

impl TryFrom<StepRow> for Step {
    type Error = CoreError;

    fn try_from(row: StepRow) -> Result<Self, Self::Error> {
        let kind = StepKind::parse(&row.kind).ok_or_else(|| {
            CoreError::Internal(format!("step {} has unknown kind '{}'", row.id, row.kind))
        })?;
        Ok(Step {
            id: row.id,
            workflow_id: row.workflow_id,
            name: row.name,
            ordering: row.ordering,
            kind,
        })
    }
}

/// A row from the `transitions` table with its JSONB columns undecoded.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TransitionRow {
    pub id: DbId,
    pub workflow_id: DbId,
    pub from_step_id: DbId,
    pub to_step_id: DbId,
    pub name: String,
    pub allowed_roles: Option<serde_json::Value>,
    pub actions: serde_json::Value,
}

impl TryFrom<TransitionRow> for Transition {
    type Error = CoreError;

    fn try_from(row: TransitionRow) -> Result<Self, Self::Error> {
        let allowed_roles = row
            .allowed_roles
            .map(serde_json::from_value::<Vec<String>>)
            .transpose()
            .map_err(|e| {
                CoreError::Internal(format!("transition {} has bad allowed_roles: {e}", row.id))
            })?;
        let actions: Vec<AutomationAction> =
            serde_json::from_value(row.actions).map_err(|e| {
                CoreError::Internal(format!("transition {} has bad actions: {e}", row.id))
            })?;
        Ok(Transition {
            id: row.id,
            workflow_id: row.workflow_id,
            from_step_id: row.from_step_id,
            to_step_id: row.to_step_id,
            name: row.name,
            allowed_roles,
            actions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_row_parses_kind() {
        let row = StepRow {
            id: 7,
            workflow_id: 1,
            name: "Review".into(),
            ordering: 3,
            kind: "query".into(),
        };
        let step = Step::try_from(row).unwrap();
        assert_eq!(step.kind, StepKind::Query);

        let bad = StepRow {
            id: 8,
            workflow_id: 1,
            name: "Review".into(),
            ordering: 3,
            kind: "paused".into(),
        };
        assert!(Step::try_from(bad).is_err());
    }

    #[test]
    fn transition_row_decodes_roles_and_actions() {
        let row = TransitionRow {
            id: 3,
            workflow_id: 1,
            from_step_id: 10,
            to_step_id: 11,
            name: "approve".into(),
            allowed_roles: Some(serde_json::json!(["partner"])),
            actions: serde_json::json!([
                {"type": "notify", "template": "request_moved"},
                {"type": "set_field", "name": "approved", "value": true}
            ]),
        };
        let transition = Transition::try_from(row).unwrap();
        assert_eq!(transition.allowed_roles.as_deref(), Some(&["partner".to_string()][..]));
        assert_eq!(transition.actions.len(), 2);
        assert_eq!(transition.actions[0].kind(), "notify");
    }
}
