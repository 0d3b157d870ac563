// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Rank tiers derived from accumulated volunteer points.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Volunteer rank tier, ordered from lowest to highest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Tier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Diamond,
}

/// Point thresholds at which each tier starts. Bronze always starts at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankTable {
    pub silver: u64,
    pub gold: u64,
    pub diamond: u64,
}

impl Default for RankTable {
    fn default() -> Self {
        Self {
            silver: 500,
            gold: 2000,
            diamond: 5000,
        }
    }
}

impl RankTable {
    /// Build a table, rejecting thresholds that are not strictly ascending.
    pub fn new(silver: u64, gold: u64, diamond: u64) -> Option<Self> {
        (0 < silver && silver < gold && gold < diamond).then_some(Self {
            silver,
            gold,
            diamond,
        })
    }

    /// Parse `"silver,gold,diamond"`, e.g. `"500,2000,5000"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let parts: Vec<u64> = raw
            .split(',')
            .map(|p| p.trim().parse().ok())
            .collect::<Option<Vec<u64>>>()?;

        match parts.as_slice() {
            [silver, gold, diamond] => Self::new(*silver, *gold, *diamond),
            _ => None,
        }
    }

    pub fn tier_for(&self, points: u64) -> Tier {
        if points >= self.diamond {
            Tier::Diamond
        } else if points >= self.gold {
            Tier::Gold
        } else if points >= self.silver {
            Tier::Silver
        } else {
            Tier::Bronze
        }
    }
}
