// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables by the deployment and
//! read once at startup.

use crate::services::rank::RankTable;
use std::env;

/// Which document store backs the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    /// In-process store, data is lost on restart (local development only)
    Memory,
}

/// Point and reporting policy applied by the participation ledger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerPolicy {
    /// Points credited for joining an activity
    pub join_bonus_points: u64,
    /// Points credited per reported volunteer hour
    pub points_per_hour: u64,
    /// Accept a second report batch for an already-ended activity
    pub allow_report_resubmission: bool,
    pub ranks: RankTable,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            join_bonus_points: 5,
            points_per_hour: 10,
            allow_report_resubmission: false,
            ranks: RankTable::default(),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    pub store_backend: StoreBackend,
    pub policy: LedgerPolicy,

    // --- Secrets ---
    /// Shared key used to verify identity provider session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            store_backend: match env::var("STORE_BACKEND").as_deref() {
                Ok("memory") => StoreBackend::Memory,
                Ok("firestore") | Err(_) => StoreBackend::Firestore,
                Ok(_) => return Err(ConfigError::Invalid("STORE_BACKEND")),
            },
            policy: policy_from_env()?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }

    /// Config for tests: in-memory store and a fixed signing key.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            policy: LedgerPolicy::default(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }
}

fn policy_from_env() -> Result<LedgerPolicy, ConfigError> {
    let defaults = LedgerPolicy::default();

    let join_bonus_points = match env::var("JOIN_BONUS_POINTS") {
        Ok(v) => v
            .parse()
            .map_err(|_| ConfigError::Invalid("JOIN_BONUS_POINTS"))?,
        Err(_) => defaults.join_bonus_points,
    };
    let points_per_hour = match env::var("POINTS_PER_HOUR") {
        Ok(v) => v
            .parse()
            .map_err(|_| ConfigError::Invalid("POINTS_PER_HOUR"))?,
        Err(_) => defaults.points_per_hour,
    };
    let allow_report_resubmission = match env::var("ALLOW_REPORT_RESUBMISSION") {
        Ok(v) => matches!(v.trim(), "1" | "true" | "yes"),
        Err(_) => defaults.allow_report_resubmission,
    };
    let ranks = match env::var("RANK_THRESHOLDS") {
        Ok(v) => RankTable::parse(&v).ok_or(ConfigError::Invalid("RANK_THRESHOLDS"))?,
        Err(_) => defaults.ranks,
    };

    Ok(LedgerPolicy {
        join_bonus_points,
        points_per_hour,
        allow_report_resubmission,
        ranks,
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
