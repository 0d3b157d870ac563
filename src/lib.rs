// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Volunteer participation ledger.
//!
//! This crate provides the backend API through which volunteers join and
//! leave events and opportunities, staff report volunteer hours, and points
//! accumulate into a rank tier.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::ParticipationStore;
use services::Ledger;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub ledger: Ledger,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ParticipationStore>) -> Self {
        let ledger = Ledger::new(store, config.policy);
        Self { config, ledger }
    }
}
