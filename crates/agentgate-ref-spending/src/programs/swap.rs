//! The mock swap ability.
//!
//! Precheck prices the trade against the mock market and returns a quote.
//! Execute "submits" the swap and returns a deterministic transaction hash.
//! How a real swap is routed is out of scope; only the declared shapes
//! matter to the pipeline.

use serde_json::{json, Value};

use agentgate_contracts::{
    context::PhaseContext,
    descriptor::{AbilityContract, Phase, PhaseSchemas},
    error::SandboxError,
    identity::Cid,
    outcome::PhaseResponse,
};

use super::{str_field, uint_field};
use crate::market;
use crate::sandbox::LocalProgram;

pub const PACKAGE_NAME: &str = "@agentgate/ability-swap";

pub struct SwapAbility;

impl SwapAbility {
    pub fn contract(cid: Cid) -> AbilityContract {
        AbilityContract {
            package_name: PACKAGE_NAME.to_string(),
            cid,
            params_schema: json!({
                "type": "object",
                "properties": {
                    "tokenIn": { "type": "string", "format": "evm-address" },
                    "tokenOut": { "type": "string", "format": "evm-address" },
                    "amountIn": { "type": "string", "format": "uint-string" }
                },
                "required": ["tokenIn", "tokenOut", "amountIn"]
            }),
            precheck: Some(PhaseSchemas::new(
                json!({
                    "type": "object",
                    "required": ["usdValue", "usdValueMicros", "amountOut"]
                }),
                json!({ "type": "object", "required": ["token"] }),
            )),
            execute: Some(PhaseSchemas::new(
                json!({
                    "type": "object",
                    "properties": {
                        "txHash": { "type": "string", "pattern": "^0x[0-9a-f]{64}$" }
                    },
                    "required": ["txHash", "amountOut", "usdValueMicros"]
                }),
                json!({ "type": "object" }),
            )),
        }
    }

    fn quote(params: &Value) -> Result<Result<(u128, u128), PhaseResponse>, SandboxError> {
        let token_in = str_field(params, "tokenIn")?;
        let token_out = str_field(params, "tokenOut")?;
        let amount_in = uint_field(params, "amountIn")?;

        if token_in.eq_ignore_ascii_case(token_out) {
            return Ok(Err(PhaseResponse::deny(
                json!({ "token": token_out }),
                "same_token",
                "Cannot swap a token for itself",
            )));
        }
        for token in [token_in, token_out] {
            if market::listing(token).is_none() {
                return Ok(Err(PhaseResponse::deny(
                    json!({ "token": token }),
                    "unsupported_token",
                    format!("No price feed for token {token}"),
                )));
            }
        }

        let priced = market::usd_value_micros(token_in, amount_in)
            .and_then(|usd| market::quote_amount_out(token_out, usd).map(|out| (usd, out)));
        match priced {
            Some(quote) => Ok(Ok(quote)),
            None => Ok(Err(PhaseResponse::deny(
                json!({ "token": token_in }),
                "amount_too_large",
                "Swap amount cannot be priced",
            ))),
        }
    }
}

impl LocalProgram for SwapAbility {
    fn run(&self, phase: Phase, context: &PhaseContext) -> Result<PhaseResponse, SandboxError> {
        let (usd_micros, amount_out) = match Self::quote(&context.params)? {
            Ok(quote) => quote,
            Err(denial) => return Ok(denial),
        };

        match phase {
            Phase::Precheck => Ok(PhaseResponse::allow(json!({
                "usdValue": market::format_usd(usd_micros),
                "usdValueMicros": usd_micros.to_string(),
                "amountOut": amount_out.to_string()
            }))),
            Phase::Execute => {
                let tx_hash = market::tx_hash(
                    &context.invocation_id.to_string(),
                    str_field(&context.params, "tokenIn")?,
                    uint_field(&context.params, "amountIn")?,
                );
                Ok(PhaseResponse::allow(json!({
                    "txHash": tx_hash,
                    "amountOut": amount_out.to_string(),
                    "usdValueMicros": usd_micros.to_string()
                })))
            }
            Phase::Commit => Err(SandboxError::new("abilities do not commit")),
        }
    }
}
