// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Append-only participation audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{ActivityKind, ParticipationKind};

/// Immutable audit row for analytics, independent of User/Activity state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ParticipationRecord {
    pub record_id: String,
    pub user_id: String,
    pub activity_id: String,
    pub activity_kind: ActivityKind,
    /// Admin or manager who submitted the report (None for joins)
    pub admin_id: Option<String>,
    pub hours: f64,
    /// 1-5, only for reports
    pub rating: Option<u8>,
    pub feedback: Option<String>,
    pub kind: ParticipationKind,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub recorded_at: DateTime<Utc>,
}

impl ParticipationRecord {
    /// Join record; the id carries the timestamp since a user may re-join.
    pub fn join(
        user_id: &str,
        activity_kind: ActivityKind,
        activity_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            record_id: format!(
                "join_{}_{}_{}_{}",
                activity_kind,
                urlencoding::encode(activity_id),
                urlencoding::encode(user_id),
                now.timestamp_micros()
            ),
            user_id: user_id.to_string(),
            activity_id: activity_id.to_string(),
            activity_kind,
            admin_id: None,
            hours: 0.0,
            rating: None,
            feedback: None,
            kind: ParticipationKind::Join,
            recorded_at: now,
        }
    }

    /// Report record; one per (activity, user), so a retried write overwrites.
    #[allow(clippy::too_many_arguments)]
    pub fn report(
        user_id: &str,
        activity_kind: ActivityKind,
        activity_id: &str,
        admin_id: &str,
        hours: f64,
        rating: u8,
        feedback: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            record_id: format!(
                "report_{}_{}_{}",
                activity_kind,
                urlencoding::encode(activity_id),
                urlencoding::encode(user_id)
            ),
            user_id: user_id.to_string(),
            activity_id: activity_id.to_string(),
            activity_kind,
            admin_id: Some(admin_id.to_string()),
            hours,
            rating: Some(rating),
            feedback,
            kind: ParticipationKind::Report,
            recorded_at: now,
        }
    }
}
