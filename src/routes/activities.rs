// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity summary (public) and activity administration routes.

use crate::db::ActivityDraft;
use crate::error::Result;
use crate::middleware::auth::Principal;
use crate::models::{Activity, ActivityKind, ActivityStatus, Capacity};
use crate::routes::participation::parse_kind;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Public routes (no auth).
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/activities/{kind}/{activity_id}", get(get_activity))
}

/// Admin routes; the role check happens in the ledger.
pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new().route("/admin/activities/{kind}/{activity_id}", put(put_activity))
}

/// Activity as shown to anyone; participant ids are never exposed.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivitySummary {
    pub activity_id: String,
    pub kind: ActivityKind,
    pub title: String,
    pub period: Option<String>,
    pub capacity: Capacity,
    pub status: ActivityStatus,
    pub report_submitted: bool,
    pub ended_at: Option<String>,
}

impl From<Activity> for ActivitySummary {
    fn from(activity: Activity) -> Self {
        Self {
            activity_id: activity.activity_id,
            kind: activity.kind,
            title: activity.title,
            period: activity.period,
            capacity: activity.capacity,
            status: activity.status,
            report_submitted: activity.report_submitted,
            ended_at: activity.ended_at.map(format_utc_rfc3339),
        }
    }
}

async fn get_activity(
    State(state): State<Arc<AppState>>,
    Path((kind, activity_id)): Path<(String, String)>,
) -> Result<Json<ActivitySummary>> {
    let kind = parse_kind(&kind)?;
    let activity = state.ledger.activity(kind, &activity_id).await?;
    Ok(Json(activity.into()))
}

/// Create or edit title, period and total. Participants are preserved and
/// total is never set below the current fill.
async fn put_activity(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((kind, activity_id)): Path<(String, String)>,
    Json(draft): Json<ActivityDraft>,
) -> Result<Json<ActivitySummary>> {
    let kind = parse_kind(&kind)?;
    let activity = state
        .ledger
        .upsert_activity(&principal, kind, &activity_id, &draft)
        .await?;
    Ok(Json(activity.into()))
}
