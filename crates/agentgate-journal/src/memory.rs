//! In-memory implementation of `ReportSink`.
//!
//! `InMemoryJournal` keeps every recorded report in a `Vec` behind a
//! `Mutex`, so one journal can be shared by every pipeline in the process.
//! Use `export()` for a snapshot and `verify_integrity()` at any time to
//! confirm the chain has not been altered in memory.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, warn};

use agentgate_contracts::{
    error::{GateError, GateResult},
    identity::InvocationId,
    report::ExecutionReport,
};
use agentgate_core::traits::ReportSink;

use crate::{
    chain::{hash_entry, verify_chain, ChainBreak},
    entry::{JournalEntry, JournalSnapshot},
};

pub(crate) struct JournalState {
    pub(crate) entries: Vec<JournalEntry>,
    pub(crate) head_hash: String,
}

pub struct InMemoryJournal {
    journal_id: String,
    pub(crate) state: Arc<Mutex<JournalState>>,
}

impl InMemoryJournal {
    pub fn new(journal_id: impl Into<String>) -> Self {
        Self {
            journal_id: journal_id.into(),
            state: Arc::new(Mutex::new(JournalState {
                entries: Vec::new(),
                head_hash: JournalEntry::GENESIS_HASH.to_string(),
            })),
        }
    }

    pub fn journal_id(&self) -> &str {
        &self.journal_id
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The entry recorded for `invocation_id`, if any.
    pub fn find(&self, invocation_id: InvocationId) -> Option<JournalEntry> {
        let state = self.state.lock().ok()?;
        state
            .entries
            .iter()
            .find(|e| e.report.invocation_id == invocation_id)
            .cloned()
    }

    pub fn export(&self) -> GateResult<JournalSnapshot> {
        let state = self.lock()?;
        Ok(JournalSnapshot {
            journal_id: self.journal_id.clone(),
            entries: state.entries.clone(),
            exported_at: Utc::now(),
            head_hash: state
                .entries
                .last()
                .map(|e| e.this_hash.clone())
                .unwrap_or_default(),
        })
    }

    pub fn verify(&self) -> Result<(), ChainBreak> {
        match self.state.lock() {
            Ok(state) => verify_chain(&state.entries),
            // A poisoned journal cannot vouch for its first entry.
            Err(_) => Err(ChainBreak::Digest { sequence: 0 }),
        }
    }

    pub fn verify_integrity(&self) -> bool {
        match self.verify() {
            Ok(()) => true,
            Err(brk) => {
                warn!(journal_id = %self.journal_id, error = %brk, "journal integrity check failed");
                false
            }
        }
    }

    fn lock(&self) -> GateResult<std::sync::MutexGuard<'_, JournalState>> {
        self.state.lock().map_err(|e| GateError::JournalWriteFailed {
            reason: format!("journal state lock poisoned: {}", e),
        })
    }
}

impl ReportSink for InMemoryJournal {
    /// Append one report to the chain.
    fn record(&self, report: &ExecutionReport) -> GateResult<()> {
        let mut state = self.lock()?;

        let sequence = state.entries.len() as u64;
        let prev_hash = state.head_hash.clone();
        let this_hash = hash_entry(&self.journal_id, sequence, report, &prev_hash)?;

        state.entries.push(JournalEntry {
            sequence,
            journal_id: self.journal_id.clone(),
            report: report.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
            recorded_at: Utc::now(),
        });
        state.head_hash = this_hash;

        debug!(
            journal_id = %self.journal_id,
            sequence,
            invocation_id = %report.invocation_id,
            head_hash = %state.head_hash,
            "report journaled"
        );

        Ok(())
    }
}
