//! Integration tests for raising requests, executing transitions, and
//! reading history.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, build_test_app, get, post, raise_request, seed_staff, seed_workflow, FIRM,
};
use serde_json::json;

#[tokio::test]
async fn raise_lands_on_the_start_step_of_the_default_workflow() {
    let harness = build_test_app();
    let staff = seed_staff(&harness.store);
    let seeded = seed_workflow(&harness.app, staff.partner).await;

    let response = post(
        &harness.app,
        "/api/v1/requests",
        staff.manager,
        json!({
            "firm_id": FIRM,
            "service_type": "company_tax",
            "client_ref": "ACME-042",
            "title": "FY26 company tax return",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;

    assert_eq!(json["request"]["workflow_id"].as_i64(), Some(seeded.workflow_id));
    assert_eq!(json["request"]["current_step_id"].as_i64(), Some(seeded.new_step));
    assert_eq!(json["request"]["status"], "open");
    assert!(json["request"]["assigned_to"].is_null());

    // The creation ledger entry has no origin step and no duration.
    assert!(json["creation_entry"]["from_step_id"].is_null());
    assert_eq!(json["creation_entry"]["to_step_id"].as_i64(), Some(seeded.new_step));
    assert!(json["creation_entry"]["duration_secs"].is_null());
}

#[tokio::test]
async fn raise_without_a_default_workflow_is_rejected() {
    let harness = build_test_app();
    let staff = seed_staff(&harness.store);

    let response = post(
        &harness.app,
        "/api/v1/requests",
        staff.manager,
        json!({
            "firm_id": FIRM,
            "service_type": "payroll",
            "client_ref": "ACME-042",
            "title": "Payroll onboarding",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn request_detail_filters_legal_transitions_by_role() {
    let harness = build_test_app();
    let staff = seed_staff(&harness.store);
    let seeded = seed_workflow(&harness.app, staff.partner).await;
    let request_id = raise_request(&harness.app, staff.manager).await;

    // Move to Preparing, where `finish` needs manager or partner.
    let response = post(
        &harness.app,
        &format!("/api/v1/requests/{request_id}/transitions/{}", seeded.submit),
        staff.manager,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let detail = body_json(
        get(
            &harness.app,
            &format!("/api/v1/requests/{request_id}"),
            staff.manager,
        )
        .await,
    )
    .await;
    assert_eq!(detail["step"]["name"], "Preparing");
    let names: Vec<_> = detail["legal_transitions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Finish preparation"]);

    // The senior holds no qualifying role, so nothing is legal here.
    let detail = body_json(
        get(
            &harness.app,
            &format!("/api/v1/requests/{request_id}"),
            staff.senior,
        )
        .await,
    )
    .await;
    assert!(detail["legal_transitions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn execute_moves_the_request_and_returns_the_refreshed_view() {
    let harness = build_test_app();
    let staff = seed_staff(&harness.store);
    let seeded = seed_workflow(&harness.app, staff.partner).await;
    let request_id = raise_request(&harness.app, staff.manager).await;

    let response = post(
        &harness.app,
        &format!("/api/v1/requests/{request_id}/transitions/{}", seeded.submit),
        staff.manager,
        json!({ "note": "Client docs complete" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["request"]["current_step_id"].as_i64(), Some(seeded.preparing));
    assert_eq!(json["request"]["status"], "preparing");
    assert_eq!(json["step"]["name"], "Preparing");

    assert_eq!(json["step_entry"]["from_step_id"].as_i64(), Some(seeded.new_step));
    assert_eq!(json["step_entry"]["to_step_id"].as_i64(), Some(seeded.preparing));
    assert_eq!(json["step_entry"]["note"], "Client docs complete");
    assert!(json["step_entry"]["duration_secs"].is_i64());

    // The refreshed view already reflects the manager's next options.
    let names: Vec<_> = json["legal_transitions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Finish preparation"]);
}

#[tokio::test]
async fn executing_from_a_stale_view_conflicts() {
    let harness = build_test_app();
    let staff = seed_staff(&harness.store);
    let seeded = seed_workflow(&harness.app, staff.partner).await;
    let request_id = raise_request(&harness.app, staff.manager).await;

    let uri = format!("/api/v1/requests/{request_id}/transitions/{}", seeded.submit);
    let response = post(&harness.app, &uri, staff.manager, json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Submitting again from the same (now outdated) view conflicts.
    let response = post(&harness.app, &uri, staff.manager, json!({})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "STALE_TRANSITION");
}

#[tokio::test]
async fn role_gated_transitions_are_forbidden_to_outsiders() {
    let harness = build_test_app();
    let staff = seed_staff(&harness.store);
    let seeded = seed_workflow(&harness.app, staff.partner).await;
    let request_id = raise_request(&harness.app, staff.manager).await;

    let response = post(
        &harness.app,
        &format!("/api/v1/requests/{request_id}/transitions/{}", seeded.submit),
        staff.manager,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post(
        &harness.app,
        &format!("/api/v1/requests/{request_id}/transitions/{}", seeded.finish),
        staff.senior,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "FORBIDDEN");
}

#[tokio::test]
async fn unknown_transition_is_not_found() {
    let harness = build_test_app();
    let staff = seed_staff(&harness.store);
    seed_workflow(&harness.app, staff.partner).await;
    let request_id = raise_request(&harness.app, staff.manager).await;

    let response = post(
        &harness.app,
        &format!("/api/v1/requests/{request_id}/transitions/99999"),
        staff.manager,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn terminal_requests_accept_no_further_transitions() {
    let harness = build_test_app();
    let staff = seed_staff(&harness.store);
    let seeded = seed_workflow(&harness.app, staff.partner).await;
    let request_id = raise_request(&harness.app, staff.manager).await;

    for (transition, actor) in [
        (seeded.submit, staff.manager),
        (seeded.finish, staff.manager),
        (seeded.approve, staff.partner),
    ] {
        let response = post(
            &harness.app,
            &format!("/api/v1/requests/{request_id}/transitions/{transition}"),
            actor,
            json!({}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let detail = body_json(
        get(
            &harness.app,
            &format!("/api/v1/requests/{request_id}"),
            staff.partner,
        )
        .await,
    )
    .await;
    assert_eq!(detail["request"]["status"], "completed");
    assert!(detail["legal_transitions"].as_array().unwrap().is_empty());

    let response = post(
        &harness.app,
        &format!("/api/v1/requests/{request_id}/transitions/{}", seeded.rework),
        staff.manager,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "ALREADY_TERMINAL");

    // Four step entries: creation plus three moves.
    let history = body_json(
        get(
            &harness.app,
            &format!("/api/v1/requests/{request_id}/history"),
            staff.partner,
        )
        .await,
    )
    .await;
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|e| e["entry_type"] == "step"));
}

#[tokio::test]
async fn automations_update_fields_assign_and_notify() {
    let harness = build_test_app();
    let staff = seed_staff(&harness.store);

    // A workflow whose first transition runs the full automation set.
    let workflow_id = common::created_id(
        post(
            &harness.app,
            "/api/v1/workflows",
            staff.partner,
            json!({ "firm_id": FIRM, "name": "Audit intake", "service_type": "audit" }),
        )
        .await,
    )
    .await;
    let new_step = common::add_step(&harness.app, staff.partner, workflow_id, "New", 0, "start").await;
    let triage = common::add_step(&harness.app, staff.partner, workflow_id, "Triage", 1, "normal").await;
    let done = common::add_step(&harness.app, staff.partner, workflow_id, "Done", 2, "end").await;

    let start_triage = common::created_id(
        post(
            &harness.app,
            &format!("/api/v1/workflows/{workflow_id}/transitions"),
            staff.partner,
            json!({
                "from_step_id": new_step,
                "to_step_id": triage,
                "name": "Start triage",
                "actions": [
                    { "type": "set_field", "name": "urgency", "value": "high" },
                    { "type": "assign_to", "target": { "kind": "role", "name": "manager" } },
                    { "type": "notify", "template": "request_moved" },
                ],
            }),
        )
        .await,
    )
    .await;
    common::add_transition(
        &harness.app,
        staff.partner,
        workflow_id,
        triage,
        done,
        "Close",
        None,
    )
    .await;
    let response = post(
        &harness.app,
        &format!("/api/v1/workflows/{workflow_id}/activate"),
        staff.partner,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post(
        &harness.app,
        "/api/v1/requests",
        staff.senior,
        json!({
            "firm_id": FIRM,
            "workflow_id": workflow_id,
            "client_ref": "FUND-007",
            "title": "FY26 audit",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let request_id = body_json(response).await["request"]["id"].as_i64().unwrap();

    let response = post(
        &harness.app,
        &format!("/api/v1/requests/{request_id}/transitions/{start_triage}"),
        staff.senior,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["request"]["fields"]["urgency"], "high");
    assert_eq!(json["request"]["assigned_to"].as_i64(), Some(staff.manager));
    assert_eq!(json["assignment_entry"]["kind"], "initial");
    assert_eq!(json["assignment_entry"]["to_user_id"].as_i64(), Some(staff.manager));

    // Notification delivery is asynchronous; poll the manager's feed.
    let mut notifications = Vec::new();
    for _ in 0..50 {
        let body = body_json(
            get(
                &harness.app,
                "/api/v1/notifications?unread_only=true",
                staff.manager,
            )
            .await,
        )
        .await;
        notifications = body.as_array().unwrap().clone();
        if !notifications.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["template"], "request_moved");
    assert_eq!(notifications[0]["body"]["request_id"].as_i64(), Some(request_id));
}

#[tokio::test]
async fn list_requests_filters_by_status_and_assignee() {
    let harness = build_test_app();
    let staff = seed_staff(&harness.store);
    let seeded = seed_workflow(&harness.app, staff.partner).await;

    let first = raise_request(&harness.app, staff.manager).await;
    let second = raise_request(&harness.app, staff.manager).await;

    // Move the first to Preparing and assign it to the senior.
    let response = post(
        &harness.app,
        &format!("/api/v1/requests/{first}/transitions/{}", seeded.submit),
        staff.manager,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = post(
        &harness.app,
        &format!("/api/v1/requests/{first}/assignment"),
        staff.manager,
        json!({ "accountant_id": staff.senior }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let listed = body_json(
        get(
            &harness.app,
            &format!("/api/v1/requests?firm_id={FIRM}&status=preparing"),
            staff.manager,
        )
        .await,
    )
    .await;
    let ids: Vec<_> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![first]);

    let listed = body_json(
        get(
            &harness.app,
            &format!("/api/v1/requests?firm_id={FIRM}&assigned_to={}", staff.senior),
            staff.manager,
        )
        .await,
    )
    .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Listing is newest first; page two holds the older request.
    let listed = body_json(
        get(
            &harness.app,
            &format!("/api/v1/requests?firm_id={FIRM}"),
            staff.manager,
        )
        .await,
    )
    .await;
    let ids: Vec<_> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![second, first]);

    let listed = body_json(
        get(
            &harness.app,
            &format!("/api/v1/requests?firm_id={FIRM}&limit=1&offset=1"),
            staff.manager,
        )
        .await,
    )
    .await;
    let ids: Vec<_> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![first]);
}
