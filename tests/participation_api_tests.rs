// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end join, leave and report flows through the HTTP router.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;
use volunteer_ledger::config::{Config, LedgerPolicy};
use volunteer_ledger::db::ParticipationStore;
use volunteer_ledger::middleware::Role;
use volunteer_ledger::models::{ActivityKind, ActivityStatus};

mod common;
use common::{body_json, create_test_app, get_request, json_request, seed_event, token_for};

fn join_body(activity_id: &str) -> serde_json::Value {
    json!({"activityId": activity_id, "activityKind": "event"})
}

#[tokio::test]
async fn test_join_returns_history_entry() {
    let (app, state, store) = create_test_app();
    seed_event(&store, "e1", 3);
    let token = token_for(&state, "u1", Role::Volunteer);

    let response = app
        .oneshot(json_request("POST", "/participation/join", &token, join_body("e1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["pending"], json!([]));
    assert_eq!(json["historyEntry"]["activityId"], "e1");
    assert_eq!(json["historyEntry"]["kind"], "join");
    assert_eq!(json["historyEntry"]["pointsDelta"], 5);
    assert_eq!(json["historyEntry"]["label"]["en"], "Joined event: Event e1");
    assert_eq!(json["capacity"], json!({"filled": 1, "total": 3}));

    let user = store.get_user("u1").await.unwrap().unwrap();
    assert_eq!(user.display_name, "Volunteer u1");
    assert_eq!(user.rank.points, 5);
}

#[tokio::test]
async fn test_join_errors_map_to_status_codes() {
    let (app, state, store) = create_test_app();
    seed_event(&store, "e1", 1);
    let u1 = token_for(&state, "u1", Role::Volunteer);
    let u2 = token_for(&state, "u2", Role::Volunteer);

    let ok = app
        .clone()
        .oneshot(json_request("POST", "/participation/join", &u1, join_body("e1")))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);

    let again = app
        .clone()
        .oneshot(json_request("POST", "/participation/join", &u1, join_body("e1")))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(again).await["error"], "already_joined");

    let full = app
        .clone()
        .oneshot(json_request("POST", "/participation/join", &u2, join_body("e1")))
        .await
        .unwrap();
    assert_eq!(full.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(full).await["error"], "activity_full");

    let missing = app
        .clone()
        .oneshot(json_request("POST", "/participation/join", &u2, join_body("nope")))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(missing).await["error"], "activity_not_found");

    let empty_id = app
        .oneshot(json_request("POST", "/participation/join", &u2, join_body("")))
        .await
        .unwrap();
    assert_eq!(empty_id.status(), StatusCode::BAD_REQUEST);

    let activity = store
        .get_activity(ActivityKind::Event, "e1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(activity.capacity.filled, 1);
    assert_eq!(activity.status, ActivityStatus::Full);
}

#[tokio::test]
async fn test_leave_round_trip() {
    let (app, state, store) = create_test_app();
    seed_event(&store, "e1", 3);
    let token = token_for(&state, "u1", Role::Volunteer);

    app.clone()
        .oneshot(json_request("POST", "/participation/join", &token, join_body("e1")))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(json_request("POST", "/participation/leave", &token, join_body("e1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["activityId"], "e1");
    assert_eq!(json["status"], "success");
    assert_eq!(json["capacity"]["filled"], 0);

    let me = app
        .oneshot(get_request("/account/me", &token))
        .await
        .unwrap();
    let json = body_json(me).await;
    assert_eq!(json["history"], json!([]));
    assert_eq!(json["rank"]["points"], 0);
}

#[tokio::test]
async fn test_leave_by_non_participant() {
    let (app, state, store) = create_test_app();
    seed_event(&store, "e1", 3);
    let token = token_for(&state, "u1", Role::Volunteer);

    let response = app
        .oneshot(json_request("POST", "/participation/leave", &token, join_body("e1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "not_a_participant");
}

#[tokio::test]
async fn test_report_batch_with_one_invalid_entry() {
    let (app, state, store) = create_test_app();
    seed_event(&store, "e1", 5);
    let admin = token_for(&state, "admin", Role::Admin);
    for id in ["u1", "u2"] {
        let token = token_for(&state, id, Role::Volunteer);
        app.clone()
            .oneshot(json_request("POST", "/participation/join", &token, join_body("e1")))
            .await
            .unwrap();
    }

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/participation/reports",
            &admin,
            json!({
                "activityId": "e1",
                "activityKind": "event",
                "reports": [
                    {"userId": "u1", "hours": 4, "rating": 5, "feedback": "Great help"},
                    {"userId": "u2", "hours": -1, "rating": 5}
                ]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "partial_success");
    assert_eq!(json["succeeded"], json!(["u1"]));
    assert_eq!(json["failed"][0]["userId"], "u2");

    // Join bonus plus four hours
    let u1 = store.get_user("u1").await.unwrap().unwrap();
    assert_eq!(u1.rank.points, 45);
    assert_eq!(u1.total_hours, 4.0);
    assert_eq!(u1.history.len(), 2);

    let activity = app
        .clone()
        .oneshot(get_request("/activities/event/e1", &admin))
        .await
        .unwrap();
    let json = body_json(activity).await;
    assert_eq!(json["status"], "ended");
    assert_eq!(json["reportSubmitted"], true);
    assert!(json.get("participantIds").is_none());

    let records = app
        .oneshot(get_request("/participation/records/event/e1", &admin))
        .await
        .unwrap();
    assert_eq!(records.status(), StatusCode::OK);
    let json = body_json(records).await;
    let kinds: Vec<&str> = json["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds.iter().filter(|k| **k == "join").count(), 2);
    assert_eq!(kinds.iter().filter(|k| **k == "report").count(), 1);
}

#[tokio::test]
async fn test_second_report_batch_rejected() {
    let (app, state, store) = create_test_app();
    seed_event(&store, "e1", 5);
    let manager = token_for(&state, "m1", Role::Manager);
    let body = json!({
        "activityId": "e1",
        "activityKind": "event",
        "reports": [{"userId": "nobody", "hours": 1, "rating": 3}]
    });

    let first = app
        .clone()
        .oneshot(json_request("POST", "/participation/reports", &manager, body.clone()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(body_json(first).await["failed"][0]["reason"], "user not found");

    let second = app
        .oneshot(json_request("POST", "/participation/reports", &manager, body))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(second).await["error"], "already_reported");
}

#[tokio::test]
async fn test_resubmission_policy_flag() {
    let config = Config {
        policy: LedgerPolicy {
            allow_report_resubmission: true,
            ..LedgerPolicy::default()
        },
        ..Config::test_default()
    };
    let (app, state, store) = common::create_test_app_with(config);
    seed_event(&store, "e1", 5);
    let admin = token_for(&state, "admin", Role::Admin);
    let body = json!({
        "activityId": "e1",
        "activityKind": "event",
        "reports": [{"userId": "nobody", "hours": 1, "rating": 3}]
    });

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/participation/reports", &admin, body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_admin_creates_and_resizes_activity() {
    let (app, state, store) = create_test_app();
    let admin = token_for(&state, "admin", Role::Admin);
    let volunteer = token_for(&state, "u1", Role::Volunteer);

    let created = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/admin/activities/opportunity/o1",
            &admin,
            json!({"title": "Library shelving", "period": "2026-06-01", "total": 2}),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::OK);
    let json = body_json(created).await;
    assert_eq!(json["kind"], "opportunity");
    assert_eq!(json["status"], "open");

    app.clone()
        .oneshot(json_request(
            "POST",
            "/participation/join",
            &volunteer,
            json!({"activityId": "o1", "activityKind": "opportunity"}),
        ))
        .await
        .unwrap();

    // Shrinking below the current fill keeps the fill
    let resized = app
        .oneshot(json_request(
            "PUT",
            "/admin/activities/opportunity/o1",
            &admin,
            json!({"title": "Library shelving", "period": "2026-06-01", "total": 0}),
        ))
        .await
        .unwrap();
    let json = body_json(resized).await;
    assert_eq!(json["capacity"], json!({"filled": 1, "total": 1}));
    assert_eq!(json["status"], "full");

    let stored = store
        .get_activity(ActivityKind::Opportunity, "o1")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.has_participant("u1"));
    assert_eq!(stored.period.as_deref(), Some("2026-06-01"));
}

#[tokio::test]
async fn test_unknown_kind_is_bad_request() {
    let (app, state, _) = create_test_app();
    let admin = token_for(&state, "admin", Role::Admin);

    let response = app
        .oneshot(get_request("/participation/records/party/e1", &admin))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_report_entry_with_negative_rating_fails_alone() {
    let (app, state, store) = create_test_app();
    seed_event(&store, "e1", 5);
    let admin = token_for(&state, "admin", Role::Admin);
    for id in ["u1", "u2"] {
        let token = token_for(&state, id, Role::Volunteer);
        app.clone()
            .oneshot(json_request("POST", "/participation/join", &token, join_body("e1")))
            .await
            .unwrap();
    }

    let response = app
        .oneshot(json_request(
            "POST",
            "/participation/reports",
            &admin,
            json!({
                "activityId": "e1",
                "activityKind": "event",
                "reports": [
                    {"userId": "u1", "hours": 4, "rating": 5},
                    {"userId": "u2", "hours": 1, "rating": -1},
                    {"userId": "u2", "rating": 4}
                ]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "partial_success");
    assert_eq!(json["succeeded"], json!(["u1"]));
    assert_eq!(json["failed"][0]["reason"], "invalid entry: rating out of range");
    assert_eq!(json["failed"][1]["reason"], "invalid entry: hours missing");

    let u1 = store.get_user("u1").await.unwrap().unwrap();
    assert_eq!(u1.total_hours, 4.0);
}
