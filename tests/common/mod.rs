// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use std::sync::Arc;
use volunteer_ledger::config::Config;
use volunteer_ledger::db::{FirestoreDb, MemoryStore};
use volunteer_ledger::middleware::Role;
use volunteer_ledger::models::{Activity, ActivityKind};
use volunteer_ledger::routes::create_router;
use volunteer_ledger::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app backed by a fresh in-memory store.
/// Returns the router, the shared state and the store for seeding.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, MemoryStore) {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> (axum::Router, Arc<AppState>, MemoryStore) {
    let store = MemoryStore::new();
    let state = Arc::new(AppState::new(config, Arc::new(store.clone())));
    (create_router(state.clone()), state, store)
}

/// Create a test app whose store is always unavailable.
#[allow(dead_code)]
pub fn create_offline_app() -> axum::Router {
    let state = Arc::new(AppState::new(
        Config::test_default(),
        Arc::new(FirestoreDb::new_mock()),
    ));
    create_router(state)
}

/// Seed an event with the given capacity.
#[allow(dead_code)]
pub fn seed_event(store: &MemoryStore, activity_id: &str, total: u32) {
    store.put_activity(Activity::new(
        activity_id,
        ActivityKind::Event,
        format!("Event {}", activity_id),
        total,
        chrono::Utc::now(),
    ));
}

/// Session token for `user_id` signed with the test key.
#[allow(dead_code)]
pub fn token_for(state: &AppState, user_id: &str, role: Role) -> String {
    volunteer_ledger::middleware::auth::create_jwt(
        user_id,
        &format!("Volunteer {}", user_id),
        role,
        &state.config.jwt_signing_key,
    )
    .unwrap()
}

/// JSON request with a bearer token.
#[allow(dead_code)]
pub fn json_request(
    method: &str,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub fn get_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
