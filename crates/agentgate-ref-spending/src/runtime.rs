//! Wiring for the reference runtime.
//!
//! `SpendingRuntime` assembles real agentgate components (registry,
//! sandbox, schema validator, journal, pipeline) around the reference
//! programs, and keeps inspectable handles to each so scenarios can show
//! what happened.

use std::sync::Arc;

use serde_json::json;

use agentgate_contracts::{
    error::GateResult,
    identity::{Address, AgentWalletId, AppId, AppVersion, Cid},
};
use agentgate_core::{InvocationRequest, PackageCatalog, Pipeline, PipelineConfig};
use agentgate_journal::InMemoryJournal;
use agentgate_registry::engine::InMemoryRegistry;
use agentgate_schema::engine::JsonSchemaValidator;

use crate::ledger::SpendLedger;
use crate::programs::{AllowedTokensPolicy, SpendingLimitPolicy, SwapAbility};
use crate::sandbox::LocalSandbox;

/// Embedded registry fixture: one wallet, three delegatees, three versions.
pub const REGISTRY_FIXTURE: &str = include_str!("../fixtures/registry.toml");

pub const APP_ID: AppId = AppId(1);
pub const AGENT_WALLET: &str = "1001";
pub const AGENT_WALLET_ADDRESS: &str = "0x7a11e7000000000000000000000000000000a11e";

/// Delegated to version 1: the swap with no policies.
pub const BARE_DELEGATEE: &str = "0xd0000000000000000000000000000000000000b1";
/// Delegated to version 2: spending limit, then allowed tokens.
pub const GUARDED_DELEGATEE: &str = "0xd0000000000000000000000000000000000000b2";
/// Delegated to version 3: allowed tokens, then spending limit.
pub const REORDERED_DELEGATEE: &str = "0xd0000000000000000000000000000000000000b3";

pub const BARE_VERSION: AppVersion = AppVersion(1);
pub const GUARDED_VERSION: AppVersion = AppVersion(2);

pub const SWAP_CID: &str = "QmSwapAbility1xRkN4hcJ9vYb3oWm5tPzq8L2fD7sGeHuA";
pub const SPENDING_LIMIT_CID: &str = "QmSpendLimit7cW2eQy8nB4xT1vR6kH3mZ9pD5aJ0sFgLuE";
pub const ALLOWED_TOKENS_CID: &str = "QmAllowTokens3kP9sV2wX7yB1nM4qR8tE6uH0jC5dGfLzA";

/// The catalog of every package the reference sandbox can run.
pub fn catalog() -> PackageCatalog {
    let mut catalog = PackageCatalog::new();
    catalog.register_ability(SwapAbility::contract(Cid::new(SWAP_CID)));
    catalog.register_policy(SpendingLimitPolicy::contract(Cid::new(SPENDING_LIMIT_CID)));
    catalog.register_policy(AllowedTokensPolicy::contract(Cid::new(ALLOWED_TOKENS_CID)));
    catalog
}

pub struct SpendingRuntime {
    pub pipeline: Pipeline,
    pub registry: Arc<InMemoryRegistry>,
    pub sandbox: Arc<LocalSandbox>,
    pub ledger: SpendLedger,
    pub spending_limit: Arc<SpendingLimitPolicy>,
    pub journal: Arc<InMemoryJournal>,
}

impl SpendingRuntime {
    pub fn new(config: PipelineConfig) -> GateResult<Self> {
        let registry = Arc::new(InMemoryRegistry::from_toml_str(REGISTRY_FIXTURE)?);
        let ledger = SpendLedger::new();
        let spending_limit = Arc::new(SpendingLimitPolicy::new(ledger.clone()));

        let mut sandbox = LocalSandbox::new();
        sandbox.install(Cid::new(SWAP_CID), Arc::new(SwapAbility));
        sandbox.install(Cid::new(SPENDING_LIMIT_CID), spending_limit.clone());
        sandbox.install(Cid::new(ALLOWED_TOKENS_CID), Arc::new(AllowedTokensPolicy));
        let sandbox = Arc::new(sandbox);

        let journal = Arc::new(InMemoryJournal::new("spending-reference"));

        let pipeline = Pipeline::new(
            registry.clone(),
            sandbox.clone(),
            Arc::new(JsonSchemaValidator::new()),
            Arc::new(catalog()),
            config,
        )?
        .with_sink(journal.clone());

        Ok(Self {
            pipeline,
            registry,
            sandbox,
            ledger,
            spending_limit,
            journal,
        })
    }

    /// Spend recorded for the reference wallet in the last 24 hours.
    pub fn spent_today(&self) -> u128 {
        self.ledger
            .spent_today(APP_ID, &Address::new(AGENT_WALLET_ADDRESS))
    }
}

/// A swap request from `delegatee` for the reference wallet.
pub fn swap_request(
    delegatee: &str,
    token_in: &str,
    token_out: &str,
    amount_in: u128,
) -> InvocationRequest {
    InvocationRequest {
        delegatee: Address::new(delegatee),
        agent_wallet: AgentWalletId::new(AGENT_WALLET),
        ability_cid: Cid::new(SWAP_CID),
        params: json!({
            "tokenIn": token_in,
            "tokenOut": token_out,
            "amountIn": amount_in.to_string()
        }),
    }
}
