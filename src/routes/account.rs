// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account routes: sign-in sync, profile and account deletion.

use crate::error::Result;
use crate::middleware::auth::{Capability, Principal};
use crate::models::{HistoryEntry, Rank, User};
use crate::services::retry_transient;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/account/sync", post(sync_account))
        .route("/account/me", get(get_me))
        .route("/account/delete", post(delete_account))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileResponse {
    pub user_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub rank: Rank,
    pub total_hours: f64,
    /// Most recent first
    pub history: Vec<HistoryEntry>,
    pub member_since: String,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            member_since: format_utc_rfc3339(user.created_at),
            user_id: user.user_id,
            display_name: user.display_name,
            email: user.email,
            avatar_url: user.avatar_url,
            rank: user.rank,
            total_hours: user.total_hours,
            history: user.history,
        }
    }
}

/// Create the user on first sign-in; later calls return the stored profile.
async fn sync_account(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ProfileResponse>> {
    let user = state.ledger.sync_user(&principal).await?;
    tracing::debug!(user_id = %user.user_id, "Account synced");
    Ok(Json(user.into()))
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ProfileResponse>> {
    let user = state.ledger.profile(&principal).await?;
    Ok(Json(user.into()))
}

// ─── Account Deletion ────────────────────────────────────────

/// Response for account deletion.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteAccountResponse {
    pub success: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub activities_released: usize,
    pub message: String,
}

/// Delete the caller's account after removing them from every activity.
///
/// Participation records are kept as the audit trail. The cascade is
/// idempotent, so a transient store failure is retried once.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<DeleteAccountResponse>> {
    principal.authorize(Capability::Participate)?;
    tracing::info!(user_id = %principal.user_id, "User-initiated account deletion");

    let outcome = retry_transient("delete_user_cascade", || {
        state.ledger.delete_user_cascade(&principal.user_id)
    })
    .await?;

    Ok(Json(DeleteAccountResponse {
        success: true,
        activities_released: outcome.activities_released,
        message: "Account deleted.".to_string(),
    }))
}
