//! Hash-chain primitives for the report journal.
//!
//! Hash input layout (bytes, in order):
//!   1. journal_id as UTF-8 bytes
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. compact JSON of the execution report

use sha2::{Digest, Sha256};
use thiserror::Error;

use agentgate_contracts::{
    error::{GateError, GateResult},
    report::ExecutionReport,
};

use crate::entry::JournalEntry;

/// Where and how a chain stops verifying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainBreak {
    #[error("entry {found} is out of sequence; expected {expected}")]
    Sequence { expected: u64, found: u64 },

    #[error("entry {sequence} does not link to its predecessor")]
    Linkage { sequence: u64 },

    #[error("entry {sequence} does not match its recorded hash")]
    Digest { sequence: u64 },
}

/// SHA-256 over one entry's content, as lowercase hex.
pub fn hash_entry(
    journal_id: &str,
    sequence: u64,
    report: &ExecutionReport,
    prev_hash: &str,
) -> GateResult<String> {
    let report_json = serde_json::to_vec(report).map_err(|e| GateError::JournalWriteFailed {
        reason: format!("report is not serializable: {e}"),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(journal_id.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&report_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Check sequence numbering, prev-hash linkage and every entry's hash.
///
/// An empty chain is valid.
pub fn verify_chain(entries: &[JournalEntry]) -> Result<(), ChainBreak> {
    let mut expected_prev = JournalEntry::GENESIS_HASH.to_string();

    for (index, entry) in entries.iter().enumerate() {
        if entry.sequence != index as u64 {
            return Err(ChainBreak::Sequence {
                expected: index as u64,
                found: entry.sequence,
            });
        }
        if entry.prev_hash != expected_prev {
            return Err(ChainBreak::Linkage {
                sequence: entry.sequence,
            });
        }
        let recomputed = hash_entry(&entry.journal_id, entry.sequence, &entry.report, &entry.prev_hash)
            .map_err(|_| ChainBreak::Digest {
                sequence: entry.sequence,
            })?;
        if entry.this_hash != recomputed {
            return Err(ChainBreak::Digest {
                sequence: entry.sequence,
            });
        }
        expected_prev = entry.this_hash.clone();
    }

    Ok(())
}
