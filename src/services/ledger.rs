// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Participation ledger: join, leave, report and account-deletion cascade.
//!
//! The ledger is the only writer of activity seats, user points/history and
//! participation records. The store gives atomicity per document only, so
//! each operation orders its writes as:
//!
//! 1. the gating conditional update (seat claim/release), which decides
//!    whether the operation happens at all;
//! 2. the append-only audit record;
//! 3. the user's history and points.
//!
//! A failure after step 1 is reported as a partial success listing what is
//! still missing, never as a silent success.

use crate::config::LedgerPolicy;
use crate::db::{ActivityDraft, ParticipationStore, ReleaseMode, ReportCredit};
use crate::error::{AppError, Result};
use crate::middleware::auth::{Capability, Principal};
use crate::models::{
    Activity, ActivityKind, HistoryEntry, ParticipationKind, ParticipationRecord, SeatClaim,
    SeatRelease, User, UserUpdate,
};
use crate::services::labels;
use crate::time_utils::format_utc_rfc3339;
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const MAX_CONCURRENT_DB_OPS: usize = 50;
/// Upper bound on hours in a single report entry.
const MAX_REPORT_HOURS: f64 = 10_000.0;

/// Something that did not get written although the operation went ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum LedgerWarning {
    /// Leave found no join entry in the user's history
    MissingHistoryEntry,
    AuditRecordNotWritten,
    UserHistoryNotUpdated,
    ActivityNotMarkedEnded,
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub history_entry: HistoryEntry,
    pub activity: Activity,
    pub warnings: Vec<LedgerWarning>,
}

#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    pub activity: Activity,
    pub warnings: Vec<LedgerWarning>,
}

/// One volunteer's hours for a finished activity.
///
/// Numbers are taken wide and optional so that a bad value fails only its
/// own entry, not the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    #[serde(default)]
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    #[serde(default)]
    pub hours: Option<f64>,
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub feedback: Option<String>,
}

impl ReportEntry {
    pub fn new(user_id: impl Into<String>, hours: f64, rating: u8) -> Self {
        Self {
            user_id: user_id.into(),
            hours: Some(hours),
            rating: Some(rating.into()),
            feedback: None,
        }
    }

    fn checked(self) -> std::result::Result<CheckedReport, ReportFailure> {
        let invalid = |reason: &str| failure(&self.user_id, format!("invalid entry: {}", reason));

        if let Err(e) = self.validate() {
            return Err(invalid(&e.to_string()));
        }
        let hours = match self.hours {
            Some(h) if h.is_finite() && (0.0..=MAX_REPORT_HOURS).contains(&h) => h,
            Some(_) => return Err(invalid("hours out of range")),
            None => return Err(invalid("hours missing")),
        };
        let rating = match self.rating.map(u8::try_from) {
            Some(Ok(r)) if (1..=5).contains(&r) => r,
            Some(_) => return Err(invalid("rating out of range")),
            None => return Err(invalid("rating missing")),
        };

        Ok(CheckedReport {
            user_id: self.user_id,
            hours,
            rating,
            feedback: self.feedback,
        })
    }
}

/// A report entry that passed validation.
struct CheckedReport {
    user_id: String,
    hours: f64,
    rating: u8,
    feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ReportFailure {
    pub user_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReportOutcome {
    /// In submission order
    pub succeeded: Vec<String>,
    /// In submission order
    pub failed: Vec<ReportFailure>,
    pub warnings: Vec<LedgerWarning>,
}

impl ReportOutcome {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CascadeOutcome {
    pub activities_released: usize,
    pub user_deleted: bool,
}

/// Retry `op` once if it fails with a transient store error.
///
/// Only for operations whose effects are idempotent.
pub async fn retry_transient<T, F, Fut>(operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op().await {
        Err(e) if e.is_transient() => {
            tracing::warn!(operation, error = %e, "Transient store failure, retrying once");
            op().await
        }
        other => other,
    }
}

/// Participation ledger over a document store.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn ParticipationStore>,
    policy: LedgerPolicy,
}

impl Ledger {
    pub fn new(store: Arc<dyn ParticipationStore>, policy: LedgerPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    fn entry_period(activity: &Activity, now: chrono::DateTime<chrono::Utc>) -> String {
        activity
            .period
            .clone()
            .unwrap_or_else(|| format_utc_rfc3339(now))
    }

    // ─── Users ───────────────────────────────────────────────────

    /// Create the user on first sign-in. A repeated sync returns the stored
    /// user unchanged.
    pub async fn sync_user(&self, principal: &Principal) -> Result<User> {
        principal.authorize(Capability::Participate)?;

        let mut user = User::new(
            principal.user_id.clone(),
            principal.display_name.clone(),
            chrono::Utc::now(),
        );
        user.email = principal.email.clone();
        user.avatar_url = principal.avatar_url.clone();

        self.store.create_user_if_absent(&user).await
    }

    pub async fn profile(&self, principal: &Principal) -> Result<User> {
        principal.authorize(Capability::Participate)?;
        self.store
            .get_user(&principal.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", principal.user_id)))
    }

    // ─── Activities ──────────────────────────────────────────────

    pub async fn activity(&self, kind: ActivityKind, activity_id: &str) -> Result<Activity> {
        self.store
            .get_activity(kind, activity_id)
            .await?
            .ok_or_else(|| AppError::ActivityNotFound(activity_id.to_string()))
    }

    /// Create or edit activity metadata. Seats are never taken from input.
    pub async fn upsert_activity(
        &self,
        principal: &Principal,
        kind: ActivityKind,
        activity_id: &str,
        draft: &ActivityDraft,
    ) -> Result<Activity> {
        principal.authorize(Capability::ManageActivities)?;
        draft.validate()?;

        let activity = self.store.upsert_activity(kind, activity_id, draft).await?;
        tracing::info!(
            admin_id = %principal.user_id,
            kind = %kind,
            activity_id,
            total = activity.capacity.total,
            "Activity saved"
        );
        Ok(activity)
    }

    pub async fn records(
        &self,
        principal: &Principal,
        kind: ActivityKind,
        activity_id: &str,
    ) -> Result<Vec<ParticipationRecord>> {
        principal.authorize(Capability::SubmitReports)?;
        self.store.records_for_activity(kind, activity_id).await
    }

    // ─── Join / Leave ────────────────────────────────────────────

    pub async fn join(
        &self,
        principal: &Principal,
        kind: ActivityKind,
        activity_id: &str,
    ) -> Result<JoinOutcome> {
        principal.authorize(Capability::Participate)?;
        let user_id = principal.user_id.as_str();

        let (claim, activity) = self
            .store
            .claim_seat(kind, activity_id, user_id)
            .await?
            .ok_or_else(|| AppError::ActivityNotFound(activity_id.to_string()))?;

        match claim {
            SeatClaim::Claimed => {}
            SeatClaim::Full => return Err(AppError::ActivityFull(activity_id.to_string())),
            SeatClaim::AlreadyJoined => {
                return Err(AppError::AlreadyJoined(activity_id.to_string()))
            }
            SeatClaim::Ended => return Err(AppError::ActivityEnded(activity_id.to_string())),
        }

        tracing::info!(
            user_id,
            kind = %kind,
            activity_id,
            filled = activity.capacity.filled,
            total = activity.capacity.total,
            "Seat claimed"
        );

        let now = chrono::Utc::now();
        let mut warnings = Vec::new();

        // Only a claimed seat creates the user, so a refused join writes nothing.
        if let Err(e) = self.sync_user(principal).await {
            tracing::warn!(user_id, activity_id, error = %e, "User not created for join");
        }

        let record = ParticipationRecord::join(user_id, kind, activity_id, now);
        if let Err(e) = self.store.insert_record(&record).await {
            tracing::warn!(user_id, activity_id, error = %e, "Join record not written");
            warnings.push(LedgerWarning::AuditRecordNotWritten);
        }

        let entry = HistoryEntry {
            activity_id: activity_id.to_string(),
            activity_kind: kind,
            kind: ParticipationKind::Join,
            label: labels::history_label(ParticipationKind::Join, kind, &activity.title),
            period: Self::entry_period(&activity, now),
            points_delta: self.policy.join_bonus_points,
            recorded_at: now,
        };

        let update = UserUpdate::prepend(entry.clone(), self.policy.ranks);
        match self.store.update_user(user_id, &update).await {
            Ok(Some((user, _))) => {
                tracing::debug!(
                    user_id,
                    points = user.rank.points,
                    tier = ?user.rank.tier,
                    "Join credited"
                );
            }
            Ok(None) => {
                tracing::warn!(user_id, activity_id, "User vanished before join credit");
                warnings.push(LedgerWarning::UserHistoryNotUpdated);
            }
            Err(e) => {
                tracing::warn!(user_id, activity_id, error = %e, "Join credit not applied");
                warnings.push(LedgerWarning::UserHistoryNotUpdated);
            }
        }

        Ok(JoinOutcome {
            history_entry: entry,
            activity,
            warnings,
        })
    }

    pub async fn leave(
        &self,
        principal: &Principal,
        kind: ActivityKind,
        activity_id: &str,
    ) -> Result<LeaveOutcome> {
        principal.authorize(Capability::Participate)?;
        let user_id = principal.user_id.as_str();

        let (release, activity) = self
            .store
            .release_seat(kind, activity_id, user_id, ReleaseMode::Leave)
            .await?
            .ok_or_else(|| AppError::ActivityNotFound(activity_id.to_string()))?;

        match release {
            SeatRelease::Released => {}
            SeatRelease::NotAParticipant => {
                return Err(AppError::NotAParticipant(activity_id.to_string()))
            }
            SeatRelease::Ended => return Err(AppError::ActivityEnded(activity_id.to_string())),
        }

        tracing::info!(
            user_id,
            kind = %kind,
            activity_id,
            filled = activity.capacity.filled,
            "Seat released"
        );

        let mut warnings = Vec::new();
        let update = UserUpdate::remove_join(kind, activity_id, self.policy.ranks);
        match self.store.update_user(user_id, &update).await {
            Ok(Some((_, effect))) if effect.history_removed => {}
            Ok(_) => {
                tracing::warn!(user_id, activity_id, "No join entry in history to remove");
                warnings.push(LedgerWarning::MissingHistoryEntry);
            }
            Err(e) => {
                tracing::warn!(user_id, activity_id, error = %e, "Join entry not removed");
                warnings.push(LedgerWarning::UserHistoryNotUpdated);
            }
        }

        Ok(LeaveOutcome { activity, warnings })
    }

    // ─── Reports ─────────────────────────────────────────────────

    /// Credit volunteer hours for a finished activity and end it.
    ///
    /// Entries are independent: a bad or failing entry is listed in
    /// `failed` and the rest still go through.
    pub async fn submit_reports(
        &self,
        principal: &Principal,
        kind: ActivityKind,
        activity_id: &str,
        reports: Vec<ReportEntry>,
    ) -> Result<ReportOutcome> {
        principal.authorize(Capability::SubmitReports)?;

        if reports.is_empty() {
            return Err(AppError::BadRequest("reports must not be empty".to_string()));
        }

        let activity = self.activity(kind, activity_id).await?;
        if activity.report_submitted && !self.policy.allow_report_resubmission {
            return Err(AppError::AlreadyReported(activity_id.to_string()));
        }

        tracing::info!(
            admin_id = %principal.user_id,
            kind = %kind,
            activity_id,
            entries = reports.len(),
            resubmission = activity.report_submitted,
            "Submitting reports"
        );

        let mut results: Vec<(usize, std::result::Result<String, ReportFailure>)> =
            Vec::with_capacity(reports.len());
        let mut accepted = Vec::new();
        let mut seen = HashSet::new();

        for (index, entry) in reports.into_iter().enumerate() {
            match entry.checked() {
                Err(f) => results.push((index, Err(f))),
                // A second entry for the same user would double-credit.
                Ok(report) if !seen.insert(report.user_id.clone()) => {
                    let duplicate = failure(&report.user_id, "duplicate entry for user");
                    results.push((index, Err(duplicate)));
                }
                Ok(report) => accepted.push((index, report)),
            }
        }

        let admin_id = principal.user_id.as_str();
        let activity_ref = &activity;
        let credited: Vec<_> = stream::iter(accepted)
            .map(|(index, report)| async move {
                (index, self.credit_one(admin_id, activity_ref, report).await)
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect()
            .await;
        results.extend(credited);
        results.sort_by_key(|(index, _)| *index);

        let mut outcome = ReportOutcome::default();
        for (_, result) in results {
            match result {
                Ok(user_id) => outcome.succeeded.push(user_id),
                Err(f) => outcome.failed.push(f),
            }
        }

        if let Err(e) = self.store.mark_reported(kind, activity_id).await {
            tracing::error!(activity_id, error = %e, "Activity not marked as ended");
            outcome.warnings.push(LedgerWarning::ActivityNotMarkedEnded);
        }

        tracing::info!(
            activity_id,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "Reports processed"
        );

        Ok(outcome)
    }

    async fn credit_one(
        &self,
        admin_id: &str,
        activity: &Activity,
        report: CheckedReport,
    ) -> std::result::Result<String, ReportFailure> {
        let now = chrono::Utc::now();
        let kind = activity.kind;
        let points = (report.hours * self.policy.points_per_hour as f64).round() as u64;

        let record = ParticipationRecord::report(
            &report.user_id,
            kind,
            &activity.activity_id,
            admin_id,
            report.hours,
            report.rating,
            report.feedback.clone(),
            now,
        );
        let history = HistoryEntry {
            activity_id: activity.activity_id.clone(),
            activity_kind: kind,
            kind: ParticipationKind::Report,
            label: labels::report_label(kind, &activity.title, report.hours),
            period: Self::entry_period(activity, now),
            points_delta: points,
            recorded_at: now,
        };
        let update = UserUpdate::prepend(history, self.policy.ranks).with_hours(report.hours);

        match self.store.credit_report(&record, &update).await {
            Ok(ReportCredit::Credited(user)) => {
                tracing::debug!(
                    user_id = %report.user_id,
                    points,
                    total_points = user.rank.points,
                    tier = ?user.rank.tier,
                    "Report credited"
                );
                Ok(report.user_id)
            }
            Ok(ReportCredit::AlreadyCredited) => {
                Err(failure(&report.user_id, "already credited for this activity"))
            }
            Ok(ReportCredit::UserNotFound) => Err(failure(&report.user_id, "user not found")),
            Err(e) => {
                tracing::warn!(user_id = %report.user_id, error = %e, "Report credit failed");
                Err(failure(&report.user_id, e.to_string()))
            }
        }
    }

    // ─── Account deletion ────────────────────────────────────────

    /// Remove the user from every activity, then delete the user document.
    ///
    /// Safe to re-run: removing an absent participant changes nothing, and
    /// the user document is only deleted once every release succeeded.
    pub async fn delete_user_cascade(&self, user_id: &str) -> Result<CascadeOutcome> {
        let activities = self.store.activities_with_participant(user_id).await?;

        let releases: Vec<Result<Option<(SeatRelease, Activity)>>> = stream::iter(activities)
            .map(|activity| async move {
                self.store
                    .release_seat(
                        activity.kind,
                        &activity.activity_id,
                        user_id,
                        ReleaseMode::Cascade,
                    )
                    .await
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect()
            .await;

        let mut outcome = CascadeOutcome::default();
        for release in releases {
            // Anything but Released means the user was already gone
            if let Some((SeatRelease::Released, activity)) = release? {
                tracing::debug!(
                    user_id,
                    activity_id = %activity.activity_id,
                    filled = activity.capacity.filled,
                    "Removed participant"
                );
                outcome.activities_released += 1;
            }
        }

        outcome.user_deleted = self.store.delete_user(user_id).await?;

        tracing::info!(
            user_id,
            activities_released = outcome.activities_released,
            user_deleted = outcome.user_deleted,
            "User deletion cascade complete"
        );

        Ok(outcome)
    }
}

fn failure(user_id: &str, reason: impl Into<String>) -> ReportFailure {
    ReportFailure {
        user_id: user_id.to_string(),
        reason: reason.into(),
    }
}
