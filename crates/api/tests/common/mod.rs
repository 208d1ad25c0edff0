//! Shared harness for the API integration tests.
//!
//! The suite runs the production middleware stack and handlers over
//! [`MemoryStore`], so no database is needed. Workflows are seeded through
//! the HTTP API itself; only accountants are seeded directly on the store,
//! since staff management has no endpoint here.

// Shared across several test binaries; not every binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use praxis_api::config::ServerConfig;
use praxis_api::notifications::NotificationRouter;
use praxis_api::router::build_app_router;
use praxis_api::state::AppState;
use praxis_core::types::DbId;
use praxis_engine::collab::{FieldValidator, TaskRegister};
use praxis_engine::{MemoryStore, WorkflowAuthoring, WorkflowCache, WorkflowEngine};
use praxis_events::EventBus;

pub const FIRM: DbId = 1;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
    }
}

/// A wired application plus direct access to its in-memory store.
pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryStore>,
}

/// Build the full application router over a fresh in-memory store.
///
/// Mirrors the wiring in `main.rs`: same middleware stack, same engine
/// construction, and the notification router consuming the bus on its own
/// task. The task exits when the app (and with it the bus) is dropped.
pub fn build_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(EventBus::default());
    let graphs = Arc::new(WorkflowCache::new());

    tokio::spawn(NotificationRouter::new(store.clone()).run(bus.subscribe()));

    let state = AppState {
        engine: Arc::new(WorkflowEngine::new(
            store.clone(),
            graphs.clone(),
            store.clone(),
            Arc::new(FieldValidator),
            Arc::new(TaskRegister::default()),
            bus.clone(),
        )),
        authoring: Arc::new(WorkflowAuthoring::new(store.clone(), graphs, bus)),
        store: store.clone(),
    };

    TestApp {
        app: build_app_router(state, &test_config()),
        store,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: &Router, uri: &str, actor: DbId) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("x-actor-id", actor.to_string())
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post(app: &Router, uri: &str, actor: DbId, body: Value) -> Response {
    send_json(app, Method::POST, uri, actor, body).await
}

pub async fn put(app: &Router, uri: &str, actor: DbId, body: Value) -> Response {
    send_json(app, Method::PUT, uri, actor, body).await
}

async fn send_json(app: &Router, method: Method, uri: &str, actor: DbId, body: Value) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .header("x-actor-id", actor.to_string())
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("response body should collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}

/// Assert a 201 and return the created row's id.
pub async fn created_id(response: Response) -> DbId {
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"]
        .as_i64()
        .expect("created row should carry an id")
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

/// The firm's staff, seeded directly on the store.
pub struct Staff {
    pub partner: DbId,
    pub manager: DbId,
    pub senior: DbId,
}

pub fn seed_staff(store: &MemoryStore) -> Staff {
    Staff {
        partner: store
            .seed_accountant(FIRM, "Noor Haddad", &["partner"])
            .unwrap()
            .id,
        manager: store
            .seed_accountant(FIRM, "Felix Marsh", &["manager"])
            .unwrap()
            .id,
        senior: store
            .seed_accountant(FIRM, "June Okafor", &["senior"])
            .unwrap()
            .id,
    }
}

/// Ids of the workflow seeded by [`seed_workflow`].
///
/// Step chain: New (start) -> Preparing -> Review -> Lodged (end), with a
/// Review -> Preparing rework edge. `finish` needs manager or partner;
/// `approve` is partner-only.
pub struct SeededWorkflow {
    pub workflow_id: DbId,
    pub new_step: DbId,
    pub preparing: DbId,
    pub review: DbId,
    pub lodged: DbId,
    pub submit: DbId,
    pub finish: DbId,
    pub approve: DbId,
    pub rework: DbId,
}

/// Create, activate, and set as default a company-tax workflow, entirely
/// through the HTTP API.
pub async fn seed_workflow(app: &Router, actor: DbId) -> SeededWorkflow {
    let workflow_id = created_id(
        post(
            app,
            "/api/v1/workflows",
            actor,
            json!({
                "firm_id": FIRM,
                "name": "Company tax return",
                "service_type": "company_tax",
            }),
        )
        .await,
    )
    .await;

    let new_step = add_step(app, actor, workflow_id, "New", 0, "start").await;
    let preparing = add_step(app, actor, workflow_id, "Preparing", 1, "normal").await;
    let review = add_step(app, actor, workflow_id, "Review", 2, "normal").await;
    let lodged = add_step(app, actor, workflow_id, "Lodged", 3, "end").await;

    let submit = add_transition(app, actor, workflow_id, new_step, preparing, "Submit", None).await;
    let finish = add_transition(
        app,
        actor,
        workflow_id,
        preparing,
        review,
        "Finish preparation",
        Some(vec!["manager", "partner"]),
    )
    .await;
    let approve = add_transition(
        app,
        actor,
        workflow_id,
        review,
        lodged,
        "Approve and lodge",
        Some(vec!["partner"]),
    )
    .await;
    let rework = add_transition(app, actor, workflow_id, review, preparing, "Rework", None).await;

    let response = post(
        app,
        &format!("/api/v1/workflows/{workflow_id}/activate"),
        actor,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post(
        app,
        &format!("/api/v1/workflows/{workflow_id}/default"),
        actor,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    SeededWorkflow {
        workflow_id,
        new_step,
        preparing,
        review,
        lodged,
        submit,
        finish,
        approve,
        rework,
    }
}

pub async fn add_step(
    app: &Router,
    actor: DbId,
    workflow_id: DbId,
    name: &str,
    ordering: i32,
    kind: &str,
) -> DbId {
    created_id(
        post(
            app,
            &format!("/api/v1/workflows/{workflow_id}/steps"),
            actor,
            json!({ "name": name, "ordering": ordering, "kind": kind }),
        )
        .await,
    )
    .await
}

pub async fn add_transition(
    app: &Router,
    actor: DbId,
    workflow_id: DbId,
    from_step_id: DbId,
    to_step_id: DbId,
    name: &str,
    allowed_roles: Option<Vec<&str>>,
) -> DbId {
    created_id(
        post(
            app,
            &format!("/api/v1/workflows/{workflow_id}/transitions"),
            actor,
            json!({
                "from_step_id": from_step_id,
                "to_step_id": to_step_id,
                "name": name,
                "allowed_roles": allowed_roles,
            }),
        )
        .await,
    )
    .await
}

/// Raise a request through the seeded default workflow, returning its id.
pub async fn raise_request(app: &Router, actor: DbId) -> DbId {
    let response = post(
        app,
        "/api/v1/requests",
        actor,
        json!({
            "firm_id": FIRM,
            "service_type": "company_tax",
            "client_ref": "ACME-042",
            "title": "FY26 company tax return",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["request"]["id"]
        .as_i64()
        .expect("raised request should carry an id")
}
