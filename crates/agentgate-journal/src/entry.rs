//! Journal entry and snapshot types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agentgate_contracts::report::ExecutionReport;

/// One execution report, chained to the entry before it.
///
/// Changing any field of the embedded report invalidates `this_hash` and
/// every later `prev_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position in the journal, starting at 0.
    pub sequence: u64,
    pub journal_id: String,
    pub report: ExecutionReport,
    /// `GENESIS_HASH` for the first entry.
    pub prev_hash: String,
    pub this_hash: String,
    pub recorded_at: DateTime<Utc>,
}

impl JournalEntry {
    /// The `prev_hash` of the first entry in every journal.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A point-in-time copy of a journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalSnapshot {
    pub journal_id: String,
    pub entries: Vec<JournalEntry>,
    pub exported_at: DateTime<Utc>,
    /// `this_hash` of the last entry; empty when the journal is empty.
    pub head_hash: String,
}
