// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer: the store contract used by the ledger and its backends.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::models::{
    Activity, ActivityKind, ParticipationRecord, SeatClaim, SeatRelease, User, UserUpdate,
    UserUpdateEffect,
};
use serde::Deserialize;
use validator::Validate;

/// Collection names as constants.
pub mod collections {
    use crate::models::ActivityKind;

    pub const USERS: &str = "users";
    pub const EVENTS: &str = "events";
    pub const OPPORTUNITIES: &str = "opportunities";
    /// Append-only audit rows
    pub const PARTICIPATION_RECORDS: &str = "participation_records";

    pub fn for_kind(kind: ActivityKind) -> &'static str {
        match kind {
            ActivityKind::Event => EVENTS,
            ActivityKind::Opportunity => OPPORTUNITIES,
        }
    }
}

/// Document ID for an externally supplied id (activity or user).
pub fn doc_id(external_id: &str) -> String {
    urlencoding::encode(external_id).into_owned()
}

/// Administrative activity fields. Participants and `filled` are owned by
/// the ledger and never taken from input.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ActivityDraft {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 100))]
    pub period: Option<String>,
    #[validate(range(max = 100_000))]
    pub total: u32,
}

/// How a seat release treats ended activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseMode {
    /// Volunteer leaving; refused once the activity ended
    Leave,
    /// Account deletion; applies to ended activities as well
    Cascade,
}

/// Outcome of crediting one report to one user.
#[derive(Debug, Clone)]
pub enum ReportCredit {
    Credited(User),
    AlreadyCredited,
    UserNotFound,
}

/// Collection-level primitives over Users, Activities and
/// ParticipationRecords.
///
/// Every method is one atomic store operation on a single document (plus
/// the audit record for `credit_report`). Nothing here spans collections
/// otherwise; ordering across collections is the ledger's job.
#[async_trait::async_trait]
pub trait ParticipationStore: Send + Sync {
    // ─── Users ───────────────────────────────────────────────────

    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Insert `user` unless a document already exists; returns the stored user.
    async fn create_user_if_absent(&self, user: &User) -> Result<User>;

    /// Conditional read-modify-write. `None` if the user does not exist.
    async fn update_user(
        &self,
        user_id: &str,
        update: &UserUpdate,
    ) -> Result<Option<(User, UserUpdateEffect)>>;

    /// Returns whether a document was deleted.
    async fn delete_user(&self, user_id: &str) -> Result<bool>;

    // ─── Activities ──────────────────────────────────────────────

    async fn get_activity(&self, kind: ActivityKind, activity_id: &str)
        -> Result<Option<Activity>>;

    async fn upsert_activity(
        &self,
        kind: ActivityKind,
        activity_id: &str,
        draft: &ActivityDraft,
    ) -> Result<Activity>;

    /// Add a participant only if a seat is free and they are not already in.
    /// `None` if the activity does not exist.
    async fn claim_seat(
        &self,
        kind: ActivityKind,
        activity_id: &str,
        user_id: &str,
    ) -> Result<Option<(SeatClaim, Activity)>>;

    /// Remove a participant, decrementing `filled` only if one was removed.
    async fn release_seat(
        &self,
        kind: ActivityKind,
        activity_id: &str,
        user_id: &str,
        mode: ReleaseMode,
    ) -> Result<Option<(SeatRelease, Activity)>>;

    async fn mark_reported(&self, kind: ActivityKind, activity_id: &str)
        -> Result<Option<Activity>>;

    /// All activities of both kinds listing `user_id` as a participant.
    async fn activities_with_participant(&self, user_id: &str) -> Result<Vec<Activity>>;

    // ─── Participation records ───────────────────────────────────

    async fn insert_record(&self, record: &ParticipationRecord) -> Result<()>;

    /// Write a report record and apply `update` to its user as one unit.
    /// Refuses users already credited for the same activity.
    async fn credit_report(
        &self,
        record: &ParticipationRecord,
        update: &UserUpdate,
    ) -> Result<ReportCredit>;

    /// Records for an activity, most recent first.
    async fn records_for_activity(
        &self,
        kind: ActivityKind,
        activity_id: &str,
    ) -> Result<Vec<ParticipationRecord>>;
}
