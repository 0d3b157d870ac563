// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity model (events and volunteer opportunities) with seat accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// The two activity variants. Each lives in its own collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ActivityKind {
    Event,
    Opportunity,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 2] = [ActivityKind::Event, ActivityKind::Opportunity];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Event => "event",
            ActivityKind::Opportunity => "opportunity",
        }
    }
}

impl std::str::FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event" | "events" => Ok(ActivityKind::Event),
            "opportunity" | "opportunities" => Ok(ActivityKind::Opportunity),
            other => Err(format!("unknown activity kind '{}'", other)),
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ActivityStatus {
    Open,
    Full,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Capacity {
    pub filled: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
}

/// Outcome of a conditional seat claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatClaim {
    Claimed,
    Full,
    AlreadyJoined,
    Ended,
}

/// Outcome of a seat release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatRelease {
    Released,
    NotAParticipant,
    Ended,
}

/// Stored activity document.
///
/// Document ID is the url-encoded `activity_id`; the collection is chosen by
/// `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Stable external id (distinct from any storage-assigned id)
    pub activity_id: String,
    pub kind: ActivityKind,
    pub title: String,
    /// Display period, e.g. "2026-05-01 - 2026-05-03"
    #[serde(default)]
    pub period: Option<String>,
    pub capacity: Capacity,
    #[serde(default)]
    pub participants: Vec<Participant>,
    /// Mirror of `participants[].user_id` for array-contains queries
    #[serde(default)]
    pub participant_ids: Vec<String>,
    pub status: ActivityStatus,
    #[serde(default)]
    pub report_submitted: bool,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Activity {
    pub fn new(
        activity_id: impl Into<String>,
        kind: ActivityKind,
        title: impl Into<String>,
        total: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let mut activity = Self {
            activity_id: activity_id.into(),
            kind,
            title: title.into(),
            period: None,
            capacity: Capacity { filled: 0, total },
            participants: Vec::new(),
            participant_ids: Vec::new(),
            status: ActivityStatus::Open,
            report_submitted: false,
            ended_at: None,
            updated_at: now,
        };
        activity.refresh_status();
        activity
    }

    pub fn is_ended(&self) -> bool {
        self.report_submitted || self.ended_at.is_some()
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }

    fn refresh_status(&mut self) {
        self.status = if self.is_ended() {
            ActivityStatus::Ended
        } else if self.capacity.filled >= self.capacity.total {
            ActivityStatus::Full
        } else {
            ActivityStatus::Open
        };
    }

    fn sync_counters(&mut self) {
        self.participant_ids = self.participants.iter().map(|p| p.user_id.clone()).collect();
        self.capacity.filled = self.participants.len().min(u32::MAX as usize) as u32;
        self.refresh_status();
    }

    /// Add `user_id` if there is a free seat and they are not already in.
    ///
    /// Callers must run this inside the store's atomic section so the check
    /// and the increment cannot interleave with another claim.
    pub fn try_claim_seat(&mut self, user_id: &str, now: DateTime<Utc>) -> SeatClaim {
        if self.is_ended() {
            return SeatClaim::Ended;
        }
        if self.has_participant(user_id) {
            return SeatClaim::AlreadyJoined;
        }
        if self.capacity.filled >= self.capacity.total {
            return SeatClaim::Full;
        }

        self.participants.push(Participant {
            user_id: user_id.to_string(),
            joined_at: now,
        });
        self.sync_counters();
        self.updated_at = now;
        SeatClaim::Claimed
    }

    /// Remove `user_id` from the participant list.
    ///
    /// `filled` only moves when an entry was actually removed, and never
    /// below zero.
    pub fn release_seat(&mut self, user_id: &str, now: DateTime<Utc>) -> SeatRelease {
        if self.is_ended() {
            return SeatRelease::Ended;
        }
        self.remove_participant(user_id, now)
    }

    /// Like [`release_seat`](Self::release_seat) but also applies to ended
    /// activities. Used by the account-deletion cascade.
    pub fn remove_participant(&mut self, user_id: &str, now: DateTime<Utc>) -> SeatRelease {
        let before = self.participants.len();
        self.participants.retain(|p| p.user_id != user_id);
        if self.participants.len() == before {
            return SeatRelease::NotAParticipant;
        }

        self.sync_counters();
        self.updated_at = now;
        SeatRelease::Released
    }

    /// Mark the activity as ended after reports were submitted.
    pub fn mark_reported(&mut self, now: DateTime<Utc>) {
        self.report_submitted = true;
        self.ended_at.get_or_insert(now);
        self.updated_at = now;
        self.refresh_status();
    }

    /// Apply administrative edits. `total` is clamped to the current fill.
    pub fn apply_metadata(
        &mut self,
        title: String,
        period: Option<String>,
        total: u32,
        now: DateTime<Utc>,
    ) {
        self.title = title;
        self.period = period;
        self.capacity.total = total.max(self.capacity.filled);
        self.updated_at = now;
        self.refresh_status();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(total: u32) -> Activity {
        Activity::new("a1", ActivityKind::Event, "Cleanup", total, Utc::now())
    }

    #[test]
    fn test_claim_until_full() {
        let mut a = activity(2);
        let now = Utc::now();

        assert_eq!(a.try_claim_seat("u1", now), SeatClaim::Claimed);
        assert_eq!(a.status, ActivityStatus::Open);
        assert_eq!(a.try_claim_seat("u2", now), SeatClaim::Claimed);
        assert_eq!(a.status, ActivityStatus::Full);
        assert_eq!(a.try_claim_seat("u3", now), SeatClaim::Full);

        assert_eq!(a.capacity.filled, 2);
        assert_eq!(a.participant_ids, vec!["u1", "u2"]);
    }

    #[test]
    fn test_duplicate_claim_rejected() {
        let mut a = activity(5);
        let now = Utc::now();

        a.try_claim_seat("u1", now);
        assert_eq!(a.try_claim_seat("u1", now), SeatClaim::AlreadyJoined);
        assert_eq!(a.capacity.filled, 1);
    }

    #[test]
    fn test_release_absent_user_is_noop() {
        let mut a = activity(5);
        let now = Utc::now();
        a.try_claim_seat("u1", now);

        assert_eq!(a.release_seat("u2", now), SeatRelease::NotAParticipant);
        assert_eq!(a.capacity.filled, 1);

        assert_eq!(a.release_seat("u1", now), SeatRelease::Released);
        assert_eq!(a.capacity.filled, 0);
        assert_eq!(a.release_seat("u1", now), SeatRelease::NotAParticipant);
        assert_eq!(a.capacity.filled, 0);
    }

    #[test]
    fn test_ended_activity_rejects_claims() {
        let mut a = activity(5);
        let now = Utc::now();
        a.try_claim_seat("u1", now);
        a.mark_reported(now);

        assert_eq!(a.status, ActivityStatus::Ended);
        assert_eq!(a.try_claim_seat("u2", now), SeatClaim::Ended);
        assert_eq!(a.release_seat("u1", now), SeatRelease::Ended);
        assert_eq!(a.remove_participant("u1", now), SeatRelease::Released);
        assert_eq!(a.status, ActivityStatus::Ended);
    }

    #[test]
    fn test_metadata_total_never_below_filled() {
        let mut a = activity(3);
        let now = Utc::now();
        a.try_claim_seat("u1", now);
        a.try_claim_seat("u2", now);

        a.apply_metadata("Renamed".to_string(), None, 1, now);
        assert_eq!(a.capacity.total, 2);
        assert_eq!(a.status, ActivityStatus::Full);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("event".parse::<ActivityKind>(), Ok(ActivityKind::Event));
        assert_eq!(
            "opportunities".parse::<ActivityKind>(),
            Ok(ActivityKind::Opportunity)
        );
        assert!("course".parse::<ActivityKind>().is_err());
    }
}
