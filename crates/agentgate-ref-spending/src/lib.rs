//! # agentgate-ref-spending
//!
//! Spending-limit reference runtime for the agentgate invocation pipeline.
//!
//! A mock token-swap ability runs under two policies:
//!
//! - **Spending limit**: the USD value of swaps in any 24-hour window must
//!   stay under a configured daily limit. The spend is recorded in commit.
//! - **Allowed tokens**: the token being sold must be on a configured list.
//!
//! Five scenarios exercise the pipeline end to end with a real registry,
//! schema validator and journal:
//!
//! 1. **Happy path**: swaps with and without policies attached.
//! 2. **Spend-limit deny**: cumulative spend breaks the limit in execute.
//! 3. **Commit failure**: the ledger write fails after the swap executed.
//! 4. **Disabled version**: rejected during resolution, no code runs.
//! 5. **Policy ordering**: the first declared policy to deny decides.
//!
//! Prices, swaps and transaction hashes are simulated. No network calls are
//! made.

pub mod ledger;
pub mod market;
pub mod programs;
pub mod runtime;
pub mod sandbox;
pub mod scenarios;
