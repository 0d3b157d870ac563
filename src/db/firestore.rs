// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile, rank and history)
//! - Events and opportunities (capacity and participants)
//! - Participation records (append-only audit rows)
//!
//! Every conditional update reads and writes inside one Firestore
//! transaction, so the check and the write cannot interleave with a
//! concurrent request on the same document. A transaction aborted by a
//! concurrent writer is rerun, so the loser of a race decides on fresh data.

use crate::db::{collections, doc_id, ActivityDraft, ParticipationStore, ReleaseMode, ReportCredit};
use crate::error::{AppError, Result};
use crate::models::{
    Activity, ActivityKind, ParticipationRecord, SeatClaim, SeatRelease, User, UserUpdate,
    UserUpdateEffect,
};
use firestore::errors::FirestoreError;
use firestore::{FirestoreConsistencySelector, FirestoreResult, FirestoreTransaction};
use std::future::Future;
use std::time::Duration;

/// Attempts per transaction before contention is reported as unavailable.
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;
const CONTENTION_BACKOFF: Duration = Duration::from_millis(20);

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

fn store_err(e: impl std::fmt::Display) -> AppError {
    AppError::StoreUnavailable(e.to_string())
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| store_err(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| store_err(format!("Failed to connect to Firestore Emulator: {}", e)))?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return `StoreUnavailable` if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client
            .as_ref()
            .ok_or_else(|| store_err("Database not connected (offline mode)"))
    }

    /// A client whose reads join `transaction`, registering the documents
    /// for conflict detection.
    fn reader_in(
        client: &firestore::FirestoreDb,
        transaction: &FirestoreTransaction<'_>,
    ) -> firestore::FirestoreDb {
        client.clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
            transaction.transaction_id().clone(),
        ))
    }

    async fn read_activity_in(
        client: &firestore::FirestoreDb,
        transaction: &FirestoreTransaction<'_>,
        kind: ActivityKind,
        activity_id: &str,
    ) -> FirestoreResult<Option<Activity>> {
        Self::reader_in(client, transaction)
            .fluent()
            .select()
            .by_id_in(collections::for_kind(kind))
            .obj()
            .one(&doc_id(activity_id))
            .await
    }

    async fn read_user_in(
        client: &firestore::FirestoreDb,
        transaction: &FirestoreTransaction<'_>,
        user_id: &str,
    ) -> FirestoreResult<Option<User>> {
        Self::reader_in(client, transaction)
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&doc_id(user_id))
            .await
    }

    fn write_activity_in(
        client: &firestore::FirestoreDb,
        transaction: &mut FirestoreTransaction<'_>,
        activity: &Activity,
    ) -> FirestoreResult<()> {
        client
            .fluent()
            .update()
            .in_col(collections::for_kind(activity.kind))
            .document_id(doc_id(&activity.activity_id))
            .object(activity)
            .add_to_transaction(transaction)?;
        Ok(())
    }

    fn write_user_in(
        client: &firestore::FirestoreDb,
        transaction: &mut FirestoreTransaction<'_>,
        user: &User,
    ) -> FirestoreResult<()> {
        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(doc_id(&user.user_id))
            .object(user)
            .add_to_transaction(transaction)?;
        Ok(())
    }

    /// Read an activity, let `mutate` change it, and write it back if it
    /// returns `true`. All in one transaction, rerun from the read when the
    /// commit loses a race.
    async fn modify_activity<T, F>(
        &self,
        kind: ActivityKind,
        activity_id: &str,
        mutate: F,
    ) -> Result<Option<(T, Activity)>>
    where
        F: Fn(&mut Activity) -> (T, bool) + Send + Sync,
        T: Send,
    {
        let client = self.get_client()?;
        let mutate = &mutate;
        run_contended("modify_activity", move || async move {
            let mut transaction = client.begin_transaction().await?;

            let Some(mut activity) =
                Self::read_activity_in(client, &transaction, kind, activity_id).await?
            else {
                let _ = transaction.rollback().await;
                return Ok(None);
            };

            let (outcome, changed) = mutate(&mut activity);
            if !changed {
                let _ = transaction.rollback().await;
                return Ok(Some((outcome, activity)));
            }

            Self::write_activity_in(client, &mut transaction, &activity)?;
            transaction.commit().await?;
            Ok(Some((outcome, activity)))
        })
        .await
    }
}

/// Firestore aborts the losing side of two transactions that touched the
/// same document. Those, and other errors the backend marks retryable.
fn is_contention(e: &FirestoreError) -> bool {
    matches!(e, FirestoreError::DatabaseError(db_err) if db_err.retry_possible)
}

/// Run a read-modify-write transaction, starting over on contention.
///
/// Each attempt re-reads, so the loser of a race sees the winner's write.
async fn run_contended<T, F, Fut>(operation: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FirestoreResult<T>>,
{
    let mut tries = 1;
    loop {
        match attempt().await {
            Err(e) if is_contention(&e) && tries < MAX_TRANSACTION_ATTEMPTS => {
                tracing::debug!(operation, tries, error = %e, "Transaction contended, retrying");
                tokio::time::sleep(CONTENTION_BACKOFF * tries).await;
                tries += 1;
            }
            result => {
                return result.map_err(|e| store_err(format!("{} failed: {}", operation, e)))
            }
        }
    }
}

#[async_trait::async_trait]
impl ParticipationStore for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&doc_id(user_id))
            .await
            .map_err(store_err)
    }

    async fn create_user_if_absent(&self, user: &User) -> Result<User> {
        let client = self.get_client()?;
        let (stored, created) = run_contended("create_user", move || async move {
            let mut transaction = client.begin_transaction().await?;

            if let Some(existing) = Self::read_user_in(client, &transaction, &user.user_id).await? {
                let _ = transaction.rollback().await;
                return Ok((existing, false));
            }

            Self::write_user_in(client, &mut transaction, user)?;
            transaction.commit().await?;
            Ok((user.clone(), true))
        })
        .await?;

        if created {
            tracing::info!(user_id = %user.user_id, "Created user");
        }
        Ok(stored)
    }

    async fn update_user(
        &self,
        user_id: &str,
        update: &UserUpdate,
    ) -> Result<Option<(User, UserUpdateEffect)>> {
        let client = self.get_client()?;
        run_contended("update_user", move || async move {
            let mut transaction = client.begin_transaction().await?;

            let Some(mut user) = Self::read_user_in(client, &transaction, user_id).await? else {
                let _ = transaction.rollback().await;
                return Ok(None);
            };

            let effect = user.apply(update, chrono::Utc::now());
            Self::write_user_in(client, &mut transaction, &user)?;
            transaction.commit().await?;
            Ok(Some((user, effect)))
        })
        .await
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        let existed = self.get_user(user_id).await?.is_some();

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::USERS)
            .document_id(doc_id(user_id))
            .execute()
            .await
            .map_err(store_err)?;

        Ok(existed)
    }

    // ─── Activity Operations ─────────────────────────────────────

    async fn get_activity(
        &self,
        kind: ActivityKind,
        activity_id: &str,
    ) -> Result<Option<Activity>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::for_kind(kind))
            .obj()
            .one(&doc_id(activity_id))
            .await
            .map_err(store_err)
    }

    async fn upsert_activity(
        &self,
        kind: ActivityKind,
        activity_id: &str,
        draft: &ActivityDraft,
    ) -> Result<Activity> {
        let client = self.get_client()?;
        run_contended("upsert_activity", move || async move {
            let now = chrono::Utc::now();
            let mut transaction = client.begin_transaction().await?;

            let mut activity = Self::read_activity_in(client, &transaction, kind, activity_id)
                .await?
                .unwrap_or_else(|| Activity::new(activity_id, kind, draft.title.clone(), 0, now));
            activity.apply_metadata(draft.title.clone(), draft.period.clone(), draft.total, now);

            Self::write_activity_in(client, &mut transaction, &activity)?;
            transaction.commit().await?;
            Ok(activity)
        })
        .await
    }

    async fn claim_seat(
        &self,
        kind: ActivityKind,
        activity_id: &str,
        user_id: &str,
    ) -> Result<Option<(SeatClaim, Activity)>> {
        let now = chrono::Utc::now();
        self.modify_activity(kind, activity_id, |activity| {
            let claim = activity.try_claim_seat(user_id, now);
            (claim, claim == SeatClaim::Claimed)
        })
        .await
    }

    async fn release_seat(
        &self,
        kind: ActivityKind,
        activity_id: &str,
        user_id: &str,
        mode: ReleaseMode,
    ) -> Result<Option<(SeatRelease, Activity)>> {
        let now = chrono::Utc::now();
        self.modify_activity(kind, activity_id, |activity| {
            let release = match mode {
                ReleaseMode::Leave => activity.release_seat(user_id, now),
                ReleaseMode::Cascade => activity.remove_participant(user_id, now),
            };
            (release, release == SeatRelease::Released)
        })
        .await
    }

    async fn mark_reported(
        &self,
        kind: ActivityKind,
        activity_id: &str,
    ) -> Result<Option<Activity>> {
        let now = chrono::Utc::now();
        let result = self
            .modify_activity(kind, activity_id, |activity| {
                activity.mark_reported(now);
                ((), true)
            })
            .await?;
        Ok(result.map(|(_, activity)| activity))
    }

    async fn activities_with_participant(&self, user_id: &str) -> Result<Vec<Activity>> {
        let mut found = Vec::new();

        for kind in ActivityKind::ALL {
            let activities: Vec<Activity> = self
                .get_client()?
                .fluent()
                .select()
                .from(collections::for_kind(kind))
                .filter(|q| q.for_all([q.field("participantIds").array_contains(user_id)]))
                .obj()
                .query()
                .await
                .map_err(store_err)?;
            found.extend(activities);
        }

        Ok(found)
    }

    // ─── Participation Records ───────────────────────────────────

    async fn insert_record(&self, record: &ParticipationRecord) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PARTICIPATION_RECORDS)
            .document_id(&record.record_id)
            .object(record)
            .execute()
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn credit_report(
        &self,
        record: &ParticipationRecord,
        update: &UserUpdate,
    ) -> Result<ReportCredit> {
        let client = self.get_client()?;
        run_contended("credit_report", move || async move {
            let mut transaction = client.begin_transaction().await?;

            // The user read registers the document, so two credits for the
            // same user conflict and the loser re-reads the winner's history.
            let Some(mut user) =
                Self::read_user_in(client, &transaction, &record.user_id).await?
            else {
                let _ = transaction.rollback().await;
                return Ok(ReportCredit::UserNotFound);
            };

            if user.has_report_for(record.activity_kind, &record.activity_id) {
                let _ = transaction.rollback().await;
                return Ok(ReportCredit::AlreadyCredited);
            }

            user.apply(update, chrono::Utc::now());

            client
                .fluent()
                .update()
                .in_col(collections::PARTICIPATION_RECORDS)
                .document_id(&record.record_id)
                .object(record)
                .add_to_transaction(&mut transaction)?;
            Self::write_user_in(client, &mut transaction, &user)?;

            transaction.commit().await?;
            Ok(ReportCredit::Credited(user))
        })
        .await
    }

    async fn records_for_activity(
        &self,
        kind: ActivityKind,
        activity_id: &str,
    ) -> Result<Vec<ParticipationRecord>> {
        let mut records: Vec<ParticipationRecord> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::PARTICIPATION_RECORDS)
            .filter(|q| {
                q.for_all([
                    q.field("activityKind").eq(kind.as_str()),
                    q.field("activityId").eq(activity_id),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(store_err)?;

        // Sorted here to avoid requiring a composite index.
        records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firestore::errors::{FirestoreDatabaseError, FirestoreErrorPublicGenericDetails};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn db_error(retry_possible: bool) -> FirestoreError {
        FirestoreError::DatabaseError(FirestoreDatabaseError::new(
            FirestoreErrorPublicGenericDetails::new("Aborted".to_string()),
            "transaction aborted by a concurrent writer".to_string(),
            retry_possible,
        ))
    }

    #[tokio::test]
    async fn test_contended_transaction_is_rerun() {
        let attempts = AtomicU32::new(0);

        let result = run_contended("claim", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(db_error(true))
                } else {
                    Ok(SeatClaim::Full)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), SeatClaim::Full);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_rerun() {
        let attempts = AtomicU32::new(0);

        let result: Result<()> = run_contended("claim", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(db_error(false)) }
        })
        .await;

        assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_contention_gives_up_after_bounded_attempts() {
        let attempts = AtomicU32::new(0);

        let result: Result<()> = run_contended("claim", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(db_error(true)) }
        })
        .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_TRANSACTION_ATTEMPTS);
    }
}
