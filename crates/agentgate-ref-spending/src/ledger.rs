//! The shared spend ledger.
//!
//! Stands in for the on-chain spend counters the spending-limit policy
//! writes during commit. Spend is tracked per (app, agent wallet) and a
//! "day" is the trailing 24 hours.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use agentgate_contracts::identity::{Address, AppId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendEntry {
    pub usd_micros: u128,
    pub tx_hash: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SpendLedger {
    entries: Arc<Mutex<HashMap<(AppId, String), Vec<SpendEntry>>>>,
}

impl SpendLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, app_id: AppId, wallet: &Address, usd_micros: u128, tx_hash: impl Into<String>) {
        self.record_at(app_id, wallet, usd_micros, tx_hash, Utc::now());
    }

    pub fn record_at(
        &self,
        app_id: AppId,
        wallet: &Address,
        usd_micros: u128,
        tx_hash: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        if let Ok(mut entries) = self.entries.lock() {
            entries
                .entry((app_id, wallet.as_str().to_ascii_lowercase()))
                .or_default()
                .push(SpendEntry {
                    usd_micros,
                    tx_hash: tx_hash.into(),
                    at,
                });
        }
    }

    /// Spend in the trailing 24 hours, in micro-dollars.
    pub fn spent_today(&self, app_id: AppId, wallet: &Address) -> u128 {
        let since = Utc::now() - Duration::hours(24);
        self.history(app_id, wallet)
            .iter()
            .filter(|e| e.at > since)
            .map(|e| e.usd_micros)
            .sum()
    }

    pub fn history(&self, app_id: AppId, wallet: &Address) -> Vec<SpendEntry> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| {
                entries
                    .get(&(app_id, wallet.as_str().to_ascii_lowercase()))
                    .cloned()
            })
            .unwrap_or_default()
    }
}
