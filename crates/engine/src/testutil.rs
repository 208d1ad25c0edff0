//! Shared test fixture: a wired engine over the in-memory store plus a
//! five-step SMSF audit workflow.
//!
//! Step chain: New (start) -> Collecting docs -> In progress -> Review ->
//! Completed (end), with a Review -> In progress rework edge, a Review
//! self-loop, and a partner-only approve edge.

use std::collections::HashMap;
use std::sync::Arc;

use praxis_core::graph::{AutomationAction, Step, StepKind, Transition};
use praxis_core::request::ServiceRequest;
use praxis_core::store::{NewStep, NewTransition, NewWorkflow};
use praxis_core::types::DbId;
use praxis_events::EventBus;

use crate::authoring::WorkflowAuthoring;
use crate::cache::WorkflowCache;
use crate::collab::{FieldStore, FieldValidator, RoleProvider, TaskCreator, TaskRegister};
use crate::executor::{RaiseRequest, WorkflowEngine};
use crate::memory::MemoryStore;

pub const FIRM: DbId = 1;

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub bus: Arc<EventBus>,
    pub engine: Arc<WorkflowEngine>,
    pub authoring: WorkflowAuthoring,
    pub workflow_id: DbId,
    pub steps: HashMap<String, Step>,
    pub transitions: HashMap<String, Transition>,
    pub partner: DbId,
    pub auditor: DbId,
    pub manager: DbId,
}

impl Fixture {
    pub fn step_id(&self, name: &str) -> DbId {
        self.steps[name].id
    }

    pub fn transition_id(&self, name: &str) -> DbId {
        self.transitions[name].id
    }

    /// Raise a request through the default-workflow path, acting as the
    /// manager.
    pub async fn raise(&self) -> ServiceRequest {
        let (request, _) = self
            .engine
            .raise_request(
                RaiseRequest {
                    firm_id: FIRM,
                    workflow_id: None,
                    service_type: Some("smsf_audit".into()),
                    client_ref: "FUND-001".into(),
                    title: "FY26 SMSF audit".into(),
                },
                self.manager,
            )
            .await
            .expect("fixture raise should succeed");
        request
    }

    /// Append an extra transition to the fixture workflow.
    pub async fn add_transition(
        &self,
        from: &str,
        to: &str,
        name: &str,
        allowed_roles: Option<Vec<String>>,
        actions: Vec<AutomationAction>,
    ) -> Transition {
        self.authoring
            .add_transition(
                self.workflow_id,
                NewTransition {
                    from_step_id: self.step_id(from),
                    to_step_id: self.step_id(to),
                    name: name.into(),
                    allowed_roles,
                    actions,
                },
            )
            .await
            .expect("fixture transition should append")
    }
}

pub async fn fixture() -> Fixture {
    fixture_with(Arc::new(FieldValidator), Arc::new(TaskRegister::default())).await
}

pub async fn fixture_with(fields: Arc<dyn FieldStore>, tasks: Arc<dyn TaskCreator>) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(EventBus::new(64));
    let graphs = Arc::new(WorkflowCache::new());

    let authoring = WorkflowAuthoring::new(store.clone(), graphs.clone(), bus.clone());
    let engine = Arc::new(WorkflowEngine::new(
        store.clone(),
        graphs,
        store.clone() as Arc<dyn RoleProvider>,
        fields,
        tasks,
        bus.clone(),
    ));

    let partner = store
        .seed_accountant(FIRM, "Paula Reid", &["partner"])
        .unwrap()
        .id;
    let auditor = store
        .seed_accountant(FIRM, "Avery Chen", &["auditor"])
        .unwrap()
        .id;
    let manager = store
        .seed_accountant(FIRM, "Mia Holt", &["manager"])
        .unwrap()
        .id;

    let workflow = authoring
        .create_workflow(NewWorkflow {
            firm_id: FIRM,
            name: "SMSF audit".into(),
            service_type: "smsf_audit".into(),
        })
        .await
        .unwrap();

    let mut steps = HashMap::new();
    for (ordering, (name, kind)) in [
        ("New", StepKind::Start),
        ("Collecting docs", StepKind::Normal),
        ("In progress", StepKind::Normal),
        ("Review", StepKind::Normal),
        ("Completed", StepKind::End),
    ]
    .into_iter()
    .enumerate()
    {
        let step = authoring
            .add_step(
                workflow.id,
                NewStep {
                    name: name.into(),
                    ordering: ordering as i32,
                    kind,
                },
            )
            .await
            .unwrap();
        steps.insert(name.to_string(), step);
    }

    let mut transitions = HashMap::new();
    let edges = [
        ("submit", "New", "Collecting docs", None),
        ("begin", "Collecting docs", "In progress", None),
        ("finish", "In progress", "Review", None),
        ("rework", "Review", "In progress", None),
        ("raise_query", "Review", "Review", None),
        ("approve", "Review", "Completed", Some(vec!["partner".to_string()])),
    ];
    for (name, from, to, allowed_roles) in edges {
        let transition = authoring
            .add_transition(
                workflow.id,
                NewTransition {
                    from_step_id: steps[from].id,
                    to_step_id: steps[to].id,
                    name: name.into(),
                    allowed_roles,
                    actions: Vec::new(),
                },
            )
            .await
            .unwrap();
        transitions.insert(name.to_string(), transition);
    }

    authoring.activate(workflow.id, manager).await.unwrap();
    authoring.set_default(workflow.id).await.unwrap();

    Fixture {
        store,
        bus,
        engine,
        authoring,
        workflow_id: workflow.id,
        steps,
        transitions,
        partner,
        auditor,
        manager,
    }
}
