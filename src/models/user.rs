// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! User model with rank and participation history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::ActivityKind;
use crate::services::rank::{RankTable, Tier};

/// Kind of participation event, shared by history entries and audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ParticipationKind {
    Join,
    Report,
}

/// Text in both site languages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LocalizedText {
    pub mn: String,
    pub en: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Rank {
    pub tier: Tier,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub points: u64,
}

/// One user-visible line of participation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub activity_id: String,
    pub activity_kind: ActivityKind,
    pub kind: ParticipationKind,
    pub label: LocalizedText,
    /// Activity period if known, otherwise the RFC3339 time of the entry
    pub period: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub points_delta: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    fn is_for(
        &self,
        kind: ParticipationKind,
        activity_kind: ActivityKind,
        activity_id: &str,
    ) -> bool {
        self.kind == kind && self.activity_kind == activity_kind && self.activity_id == activity_id
    }
}

/// User profile stored in Firestore (document ID = `user_id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Identity provider subject
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Opaque profile attributes (age, region, affiliation, ...)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub rank: Rank,
    #[serde(default)]
    pub total_hours: f64,
    /// Most recent first
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single all-or-nothing change to a user's points and history.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    /// Entry to put at the head of the history
    pub prepend: Option<HistoryEntry>,
    /// Remove the join entry for this activity and take back its points
    pub remove_join: Option<(ActivityKind, String)>,
    pub hours: f64,
    pub ranks: RankTable,
}

impl UserUpdate {
    pub fn prepend(entry: HistoryEntry, ranks: RankTable) -> Self {
        Self {
            prepend: Some(entry),
            remove_join: None,
            hours: 0.0,
            ranks,
        }
    }

    pub fn remove_join(kind: ActivityKind, activity_id: &str, ranks: RankTable) -> Self {
        Self {
            prepend: None,
            remove_join: Some((kind, activity_id.to_string())),
            hours: 0.0,
            ranks,
        }
    }

    pub fn with_hours(mut self, hours: f64) -> Self {
        self.hours = hours;
        self
    }
}

/// What [`User::apply`] actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserUpdateEffect {
    pub history_removed: bool,
}

impl User {
    pub fn new(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            email: None,
            avatar_url: None,
            attributes: BTreeMap::new(),
            rank: Rank::default(),
            total_hours: 0.0,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a report for this activity was already credited.
    pub fn has_report_for(&self, kind: ActivityKind, activity_id: &str) -> bool {
        self.history
            .iter()
            .any(|e| e.is_for(ParticipationKind::Report, kind, activity_id))
    }

    /// Apply an update; the tier is always recomputed from the points.
    pub fn apply(&mut self, update: &UserUpdate, now: DateTime<Utc>) -> UserUpdateEffect {
        let mut effect = UserUpdateEffect::default();

        if let Some((kind, activity_id)) = &update.remove_join {
            let position = self
                .history
                .iter()
                .position(|e| e.is_for(ParticipationKind::Join, *kind, activity_id));
            if let Some(index) = position {
                let removed = self.history.remove(index);
                self.rank.points = self.rank.points.saturating_sub(removed.points_delta);
                effect.history_removed = true;
            }
        }

        if let Some(entry) = &update.prepend {
            self.rank.points = self.rank.points.saturating_add(entry.points_delta);
            self.history.insert(0, entry.clone());
        }

        if update.hours > 0.0 {
            self.total_hours += update.hours;
        }

        self.rank.tier = update.ranks.tier_for(self.rank.points);
        self.updated_at = now;
        effect
    }

    /// Sum of history point deltas; equals `rank.points` for consistent data.
    pub fn history_points(&self) -> u64 {
        self.history.iter().map(|e| e.points_delta).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::labels::history_label;

    fn entry(activity_id: &str, kind: ParticipationKind, points: u64) -> HistoryEntry {
        HistoryEntry {
            activity_id: activity_id.to_string(),
            activity_kind: ActivityKind::Event,
            kind,
            label: history_label(kind, ActivityKind::Event, "Test"),
            period: "2026-01-01".to_string(),
            points_delta: points,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_prepend_keeps_most_recent_first() {
        let mut user = User::new("u1", "Bat", Utc::now());
        let ranks = RankTable::default();

        user.apply(
            &UserUpdate::prepend(entry("a1", ParticipationKind::Join, 5), ranks),
            Utc::now(),
        );
        user.apply(
            &UserUpdate::prepend(entry("a2", ParticipationKind::Join, 5), ranks),
            Utc::now(),
        );

        assert_eq!(user.history[0].activity_id, "a2");
        assert_eq!(user.rank.points, 10);
        assert_eq!(user.rank.points, user.history_points());
    }

    #[test]
    fn test_remove_join_matches_by_activity_not_position() {
        let mut user = User::new("u1", "Bat", Utc::now());
        let ranks = RankTable::default();
        user.apply(
            &UserUpdate::prepend(entry("a1", ParticipationKind::Join, 5), ranks),
            Utc::now(),
        );
        user.apply(
            &UserUpdate::prepend(entry("a2", ParticipationKind::Join, 7), ranks),
            Utc::now(),
        );

        let effect = user.apply(
            &UserUpdate::remove_join(ActivityKind::Event, "a1", ranks),
            Utc::now(),
        );

        assert!(effect.history_removed);
        assert_eq!(user.history.len(), 1);
        assert_eq!(user.history[0].activity_id, "a2");
        assert_eq!(user.rank.points, 7);
    }

    #[test]
    fn test_remove_missing_entry_reports_no_removal() {
        let mut user = User::new("u1", "Bat", Utc::now());
        let effect = user.apply(
            &UserUpdate::remove_join(ActivityKind::Event, "nope", RankTable::default()),
            Utc::now(),
        );
        assert!(!effect.history_removed);
        assert_eq!(user.rank.points, 0);
    }

    #[test]
    fn test_tier_follows_points() {
        let mut user = User::new("u1", "Bat", Utc::now());
        let ranks = RankTable::default();

        let report = UserUpdate::prepend(entry("a1", ParticipationKind::Report, 600), ranks)
            .with_hours(60.0);
        user.apply(&report, Utc::now());
        assert_eq!(user.rank.tier, Tier::Silver);
        assert_eq!(user.total_hours, 60.0);
        assert!(user.has_report_for(ActivityKind::Event, "a1"));
        assert!(!user.has_report_for(ActivityKind::Opportunity, "a1"));
    }
}
