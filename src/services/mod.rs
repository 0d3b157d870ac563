// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod labels;
pub mod ledger;
pub mod rank;

pub use ledger::{
    retry_transient, CascadeOutcome, JoinOutcome, Ledger, LeaveOutcome, LedgerWarning,
    ReportEntry, ReportFailure, ReportOutcome,
};
pub use rank::{RankTable, Tier};
