// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod record;
pub mod user;

pub use activity::{
    Activity, ActivityKind, ActivityStatus, Capacity, Participant, SeatClaim, SeatRelease,
};
pub use record::ParticipationRecord;
pub use user::{
    HistoryEntry, LocalizedText, ParticipationKind, Rank, User, UserUpdate, UserUpdateEffect,
};
