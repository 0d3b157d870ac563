// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for local development and tests.
//!
//! Each document lives in a `DashMap` entry; conditional updates run while
//! holding that entry's shard lock, which makes them atomic per document in
//! the same way a Firestore transaction is.

use crate::db::{ActivityDraft, ParticipationStore, ReleaseMode, ReportCredit};
#[cfg(test)]
use crate::error::AppError;
use crate::error::Result;
use crate::models::{
    Activity, ActivityKind, ParticipationRecord, SeatClaim, SeatRelease, User, UserUpdate,
    UserUpdateEffect,
};
use dashmap::DashMap;
#[cfg(test)]
use dashmap::DashSet;
use std::sync::Arc;

type ActivityKey = (ActivityKind, String);

#[derive(Default)]
struct Inner {
    users: DashMap<String, User>,
    activities: DashMap<ActivityKey, Activity>,
    records: DashMap<String, ParticipationRecord>,
    /// Users whose writes fail with `StoreUnavailable` (test builds only)
    #[cfg(test)]
    failing_users: DashSet<String>,
    /// Activities whose writes fail with `StoreUnavailable` (test builds only)
    #[cfg(test)]
    failing_activities: DashSet<String>,
}

/// Cheaply cloneable handle to a shared in-memory store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an activity document as-is (seeding and tests).
    pub fn put_activity(&self, activity: Activity) {
        self.inner
            .activities
            .insert((activity.kind, activity.activity_id.clone()), activity);
    }

    /// Insert or replace a user document as-is (seeding and tests).
    pub fn put_user(&self, user: User) {
        self.inner.users.insert(user.user_id.clone(), user);
    }

    pub fn record_count(&self) -> usize {
        self.inner.records.len()
    }

    /// Make every write touching `user_id` fail (test builds only).
    #[cfg(test)]
    pub fn fail_user_writes(&self, user_id: &str) {
        self.inner.failing_users.insert(user_id.to_string());
    }

    /// Make every write touching `activity_id` fail (test builds only).
    #[cfg(test)]
    pub fn fail_activity_writes(&self, activity_id: &str) {
        self.inner.failing_activities.insert(activity_id.to_string());
    }

    #[cfg(test)]
    pub fn heal(&self) {
        self.inner.failing_users.clear();
        self.inner.failing_activities.clear();
    }

    #[cfg(test)]
    fn check_user_writable(&self, user_id: &str) -> Result<()> {
        if self.inner.failing_users.contains(user_id) {
            return Err(AppError::StoreUnavailable(format!(
                "injected failure for user {}",
                user_id
            )));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_user_writable(&self, _user_id: &str) -> Result<()> {
        Ok(())
    }

    #[cfg(test)]
    fn check_activity_writable(&self, activity_id: &str) -> Result<()> {
        if self.inner.failing_activities.contains(activity_id) {
            return Err(AppError::StoreUnavailable(format!(
                "injected failure for activity {}",
                activity_id
            )));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_activity_writable(&self, _activity_id: &str) -> Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl ParticipationStore for MemoryStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.inner.users.get(user_id).map(|u| u.clone()))
    }

    async fn create_user_if_absent(&self, user: &User) -> Result<User> {
        if let Some(existing) = self.inner.users.get(&user.user_id) {
            return Ok(existing.clone());
        }
        self.check_user_writable(&user.user_id)?;
        Ok(self
            .inner
            .users
            .entry(user.user_id.clone())
            .or_insert_with(|| user.clone())
            .clone())
    }

    async fn update_user(
        &self,
        user_id: &str,
        update: &UserUpdate,
    ) -> Result<Option<(User, UserUpdateEffect)>> {
        self.check_user_writable(user_id)?;
        let Some(mut user) = self.inner.users.get_mut(user_id) else {
            return Ok(None);
        };
        let effect = user.apply(update, chrono::Utc::now());
        Ok(Some((user.clone(), effect)))
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        self.check_user_writable(user_id)?;
        Ok(self.inner.users.remove(user_id).is_some())
    }

    async fn get_activity(
        &self,
        kind: ActivityKind,
        activity_id: &str,
    ) -> Result<Option<Activity>> {
        Ok(self
            .inner
            .activities
            .get(&(kind, activity_id.to_string()))
            .map(|a| a.clone()))
    }

    async fn upsert_activity(
        &self,
        kind: ActivityKind,
        activity_id: &str,
        draft: &ActivityDraft,
    ) -> Result<Activity> {
        self.check_activity_writable(activity_id)?;
        let now = chrono::Utc::now();
        let mut entry = self
            .inner
            .activities
            .entry((kind, activity_id.to_string()))
            .or_insert_with(|| Activity::new(activity_id, kind, draft.title.clone(), 0, now));
        entry.apply_metadata(draft.title.clone(), draft.period.clone(), draft.total, now);
        Ok(entry.clone())
    }

    async fn claim_seat(
        &self,
        kind: ActivityKind,
        activity_id: &str,
        user_id: &str,
    ) -> Result<Option<(SeatClaim, Activity)>> {
        self.check_activity_writable(activity_id)?;
        let Some(mut activity) = self.inner.activities.get_mut(&(kind, activity_id.to_string()))
        else {
            return Ok(None);
        };
        let claim = activity.try_claim_seat(user_id, chrono::Utc::now());
        Ok(Some((claim, activity.clone())))
    }

    async fn release_seat(
        &self,
        kind: ActivityKind,
        activity_id: &str,
        user_id: &str,
        mode: ReleaseMode,
    ) -> Result<Option<(SeatRelease, Activity)>> {
        self.check_activity_writable(activity_id)?;
        let Some(mut activity) = self.inner.activities.get_mut(&(kind, activity_id.to_string()))
        else {
            return Ok(None);
        };
        let now = chrono::Utc::now();
        let release = match mode {
            ReleaseMode::Leave => activity.release_seat(user_id, now),
            ReleaseMode::Cascade => activity.remove_participant(user_id, now),
        };
        Ok(Some((release, activity.clone())))
    }

    async fn mark_reported(
        &self,
        kind: ActivityKind,
        activity_id: &str,
    ) -> Result<Option<Activity>> {
        self.check_activity_writable(activity_id)?;
        let Some(mut activity) = self.inner.activities.get_mut(&(kind, activity_id.to_string()))
        else {
            return Ok(None);
        };
        activity.mark_reported(chrono::Utc::now());
        Ok(Some(activity.clone()))
    }

    async fn activities_with_participant(&self, user_id: &str) -> Result<Vec<Activity>> {
        Ok(self
            .inner
            .activities
            .iter()
            .filter(|a| a.participant_ids.iter().any(|id| id == user_id))
            .map(|a| a.clone())
            .collect())
    }

    async fn insert_record(&self, record: &ParticipationRecord) -> Result<()> {
        self.check_user_writable(&record.user_id)?;
        self.inner
            .records
            .insert(record.record_id.clone(), record.clone());
        Ok(())
    }

    async fn credit_report(
        &self,
        record: &ParticipationRecord,
        update: &UserUpdate,
    ) -> Result<ReportCredit> {
        self.check_user_writable(&record.user_id)?;
        // Holding the user entry serializes credits for the same user.
        let Some(mut user) = self.inner.users.get_mut(&record.user_id) else {
            return Ok(ReportCredit::UserNotFound);
        };
        if user.has_report_for(record.activity_kind, &record.activity_id) {
            return Ok(ReportCredit::AlreadyCredited);
        }

        self.inner
            .records
            .insert(record.record_id.clone(), record.clone());
        user.apply(update, chrono::Utc::now());
        Ok(ReportCredit::Credited(user.clone()))
    }

    async fn records_for_activity(
        &self,
        kind: ActivityKind,
        activity_id: &str,
    ) -> Result<Vec<ParticipationRecord>> {
        let mut records: Vec<ParticipationRecord> = self
            .inner
            .records
            .iter()
            .filter(|r| r.activity_kind == kind && r.activity_id == activity_id)
            .map(|r| r.clone())
            .collect();
        records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(records)
    }
}
