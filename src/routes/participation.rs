// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Join, leave and report routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::Principal;
use crate::models::{ActivityKind, Capacity, HistoryEntry, ParticipationRecord};
use crate::services::{LedgerWarning, ReportEntry, ReportFailure};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Participation routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/participation/join", post(join))
        .route("/participation/leave", post(leave))
        .route("/participation/reports", post(submit_reports))
        .route(
            "/participation/records/{kind}/{activity_id}",
            get(get_records),
        )
}

/// Whether every step of an operation was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum CompletionStatus {
    Success,
    PartialSuccess,
}

impl CompletionStatus {
    fn from_warnings(warnings: &[LedgerWarning]) -> Self {
        if warnings.is_empty() {
            CompletionStatus::Success
        } else {
            CompletionStatus::PartialSuccess
        }
    }
}

/// Parse the `{kind}` path segment.
pub(crate) fn parse_kind(raw: &str) -> Result<ActivityKind> {
    raw.parse().map_err(AppError::BadRequest)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ActivityRequest {
    #[validate(length(min = 1, max = 128))]
    activity_id: String,
    activity_kind: ActivityKind,
}

// ─── Join / Leave ────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct JoinResponse {
    pub history_entry: HistoryEntry,
    pub status: CompletionStatus,
    /// Steps not yet written when `status` is `partial_success`
    pub pending: Vec<LedgerWarning>,
    pub capacity: Capacity,
}

async fn join(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<ActivityRequest>,
) -> Result<Json<JoinResponse>> {
    req.validate()?;

    let outcome = state
        .ledger
        .join(&principal, req.activity_kind, &req.activity_id)
        .await?;

    Ok(Json(JoinResponse {
        status: CompletionStatus::from_warnings(&outcome.warnings),
        history_entry: outcome.history_entry,
        pending: outcome.warnings,
        capacity: outcome.activity.capacity,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LeaveResponse {
    pub activity_id: String,
    pub status: CompletionStatus,
    pub warnings: Vec<LedgerWarning>,
    pub capacity: Capacity,
}

async fn leave(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<ActivityRequest>,
) -> Result<Json<LeaveResponse>> {
    req.validate()?;

    let outcome = state
        .ledger
        .leave(&principal, req.activity_kind, &req.activity_id)
        .await?;

    Ok(Json(LeaveResponse {
        activity_id: req.activity_id,
        status: CompletionStatus::from_warnings(&outcome.warnings),
        warnings: outcome.warnings,
        capacity: outcome.activity.capacity,
    }))
}

// ─── Reports ─────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ReportsRequest {
    #[validate(length(min = 1, max = 128))]
    activity_id: String,
    activity_kind: ActivityKind,
    /// Entries are validated one by one by the ledger
    #[validate(length(min = 1, max = 500))]
    reports: Vec<ReportEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ReportsResponse {
    pub status: CompletionStatus,
    pub succeeded: Vec<String>,
    pub failed: Vec<ReportFailure>,
    pub warnings: Vec<LedgerWarning>,
}

async fn submit_reports(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<ReportsRequest>,
) -> Result<Json<ReportsResponse>> {
    req.validate()?;

    let outcome = state
        .ledger
        .submit_reports(&principal, req.activity_kind, &req.activity_id, req.reports)
        .await?;

    let status = if outcome.is_complete_success() {
        CompletionStatus::Success
    } else {
        CompletionStatus::PartialSuccess
    };

    Ok(Json(ReportsResponse {
        status,
        succeeded: outcome.succeeded,
        failed: outcome.failed,
        warnings: outcome.warnings,
    }))
}

// ─── Audit records ───────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RecordsResponse {
    pub records: Vec<ParticipationRecord>,
}

async fn get_records(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((kind, activity_id)): Path<(String, String)>,
) -> Result<Json<RecordsResponse>> {
    let kind = parse_kind(&kind)?;
    let records = state.ledger.records(&principal, kind, &activity_id).await?;
    Ok(Json(RecordsResponse { records }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("events").unwrap(), ActivityKind::Event);
        assert_eq!(parse_kind("opportunity").unwrap(), ActivityKind::Opportunity);
        assert!(matches!(parse_kind("party"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_report_request_uses_camel_case() {
        let json = r#"{
            "activityId": "e1",
            "activityKind": "event",
            "reports": [{"userId": "u1", "hours": 4, "rating": 5}]
        }"#;
        let req: ReportsRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.reports[0].user_id, "u1");
        assert_eq!(req.reports[0].hours, Some(4.0));
        assert!(req.reports[0].feedback.is_none());
    }

    #[test]
    fn test_completion_status_serializes_snake_case() {
        let status = CompletionStatus::from_warnings(&[LedgerWarning::MissingHistoryEntry]);
        assert_eq!(
            serde_json::to_value(status).unwrap(),
            serde_json::json!("partial_success")
        );
    }
}
