//! The daily spending-limit policy.
//!
//! - Precheck: the single trade alone must fit under the limit.
//! - Execute: the trade plus everything spent in the last 24 hours must fit.
//!   Uses the ability's precheck quote for the USD value when present.
//! - Commit: records the actual spend against the ability's transaction
//!   hash in the shared ledger.
//!
//! A Deny in execute leaves nothing to undo: spend is only written in
//! commit, after the swap has gone through.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{json, Value};
use tracing::info;

use agentgate_contracts::{
    context::PhaseContext,
    descriptor::{Phase, PhaseSchemas, PolicyContract},
    error::SandboxError,
    identity::Cid,
    outcome::PhaseResponse,
};

use super::{str_field, uint_field};
use crate::ledger::SpendLedger;
use crate::market;
use crate::sandbox::LocalProgram;

pub const PACKAGE_NAME: &str = "@agentgate/policy-spending-limit";

pub const DENY_CODE: &str = "spending_limit_exceeded";
pub const DENY_REASON: &str = "Attempted buy amount exceeds daily limit";

pub struct SpendingLimitPolicy {
    ledger: SpendLedger,
    fail_commits: AtomicBool,
}

impl SpendingLimitPolicy {
    pub fn new(ledger: SpendLedger) -> Self {
        Self {
            ledger,
            fail_commits: AtomicBool::new(false),
        }
    }

    /// Make every commit fail at the ledger, as a reverted write would.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn contract(cid: Cid) -> PolicyContract {
        let amounts = json!({
            "type": "object",
            "required": ["usdValueMicros"]
        });
        PolicyContract {
            package_name: PACKAGE_NAME.to_string(),
            cid,
            ability_params_schema: json!({
                "type": "object",
                "properties": {
                    "buyAmount": { "type": "string", "format": "uint-string" },
                    "token": { "type": "string", "format": "evm-address" }
                },
                "required": ["buyAmount", "token"]
            }),
            user_params_schema: json!({
                "type": "object",
                "properties": {
                    "maxDailySpendUsd": { "type": "string", "format": "uint-string" }
                },
                "required": ["maxDailySpendUsd"]
            }),
            precheck: Some(PhaseSchemas::new(amounts.clone(), amounts.clone())),
            execute: Some(PhaseSchemas::new(
                json!({
                    "type": "object",
                    "required": ["usdValueMicros", "spentTodayMicros", "remainingMicros"]
                }),
                amounts,
            )),
            commit: Some(PhaseSchemas::new(
                json!({
                    "type": "object",
                    "properties": { "recorded": { "const": true } },
                    "required": ["recorded", "txHash"]
                }),
                Value::Null,
            )),
        }
    }

    fn trade_value(context: &PhaseContext) -> Result<Option<u128>, SandboxError> {
        // The ability's own quote wins when it already exists.
        if let Some(quote) = &context.prior.ability_precheck {
            return uint_field(quote, "usdValueMicros").map(Some);
        }
        let token = str_field(&context.params, "token")?;
        let amount = uint_field(&context.params, "buyAmount")?;
        Ok(market::usd_value_micros(token, amount))
    }

    fn limit(user_params: &Value) -> Result<u128, SandboxError> {
        let whole = uint_field(user_params, "maxDailySpendUsd")?;
        market::checked_usd(whole)
            .ok_or_else(|| SandboxError::new(format!("maxDailySpendUsd {whole} is out of range")))
    }

    fn check(&self, phase: Phase, context: &PhaseContext) -> Result<PhaseResponse, SandboxError> {
        let limit = Self::limit(&context.user_params)?;
        let Some(usd) = Self::trade_value(context)? else {
            return Ok(PhaseResponse::deny(
                json!({ "usdValueMicros": "0" }),
                "unpriced_token",
                "Buy amount cannot be valued in USD",
            ));
        };

        let spent = match phase {
            Phase::Execute => self
                .ledger
                .spent_today(context.app_id, &context.agent_wallet_address),
            _ => 0,
        };

        if spent.saturating_add(usd) > limit {
            return Ok(PhaseResponse::deny(
                json!({
                    "usdValueMicros": usd.to_string(),
                    "spentTodayMicros": spent.to_string(),
                    "limitMicros": limit.to_string()
                }),
                DENY_CODE,
                DENY_REASON,
            ));
        }

        Ok(match phase {
            Phase::Execute => PhaseResponse::allow(json!({
                "usdValueMicros": usd.to_string(),
                "spentTodayMicros": spent.to_string(),
                "remainingMicros": (limit - spent - usd).to_string()
            })),
            _ => PhaseResponse::allow(json!({ "usdValueMicros": usd.to_string() })),
        })
    }

    fn commit(&self, context: &PhaseContext) -> Result<PhaseResponse, SandboxError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(SandboxError::new("spend ledger write reverted"));
        }

        let executed = context
            .prior
            .ability_execute
            .as_ref()
            .ok_or_else(|| SandboxError::new("commit without an ability execute result"))?;
        let tx_hash = str_field(executed, "txHash")?;
        let own = context
            .prior
            .own_execute
            .as_ref()
            .ok_or_else(|| SandboxError::new("commit without this policy's execute result"))?;
        let usd = uint_field(own, "usdValueMicros")?;

        self.ledger
            .record(context.app_id, &context.agent_wallet_address, usd, tx_hash);
        let spent = self
            .ledger
            .spent_today(context.app_id, &context.agent_wallet_address);

        info!(
            invocation_id = %context.invocation_id,
            wallet = %context.agent_wallet_address,
            usd = %market::format_usd(usd),
            tx_hash = %tx_hash,
            "spend recorded"
        );

        Ok(PhaseResponse::allow(json!({
            "recorded": true,
            "txHash": tx_hash,
            "spentTodayMicros": spent.to_string()
        })))
    }
}

impl LocalProgram for SpendingLimitPolicy {
    fn run(&self, phase: Phase, context: &PhaseContext) -> Result<PhaseResponse, SandboxError> {
        match phase {
            Phase::Precheck | Phase::Execute => self.check(phase, context),
            Phase::Commit => self.commit(context),
        }
    }
}
