//! # agentgate-journal
//!
//! Append-only, SHA-256 hash-chained journal of execution reports.
//!
//! ## Overview
//!
//! Every report handed to the journal is wrapped in a `JournalEntry` that
//! links to the previous entry through its hash. Altering any recorded
//! report breaks the chain, and `verify_chain` says where.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agentgate_journal::InMemoryJournal;
//!
//! let journal = Arc::new(InMemoryJournal::new("spending-demo"));
//! let pipeline = pipeline.with_sink(journal.clone());
//! pipeline.invoke(request).await?;
//! assert!(journal.verify_integrity());
//! ```

pub mod chain;
pub mod entry;
pub mod memory;

pub use chain::{hash_entry, verify_chain, ChainBreak};
pub use entry::{JournalEntry, JournalSnapshot};
pub use memory::InMemoryJournal;

// ── Tests ─────────────────────────────────────────────────────────────────────
