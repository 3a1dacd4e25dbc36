//! Simulated token market for the reference runtime.
//!
//! All prices are hardcoded and fictional. No external systems are
//! contacted. Amounts are in token base units; USD values are carried as
//! micro-dollars so every computation stays in integers.

use sha2::{Digest, Sha256};

pub const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
pub const WETH: &str = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2";
pub const LINK: &str = "0x514910771af9ca656af840dff83e8264ecf986ca";

const MICROS_PER_USD: u128 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Listing {
    pub symbol: &'static str,
    pub decimals: u32,
    /// Price of one whole token in micro-dollars.
    pub price_micros: u128,
}

const LISTINGS: [(&str, Listing); 3] = [
    (USDC, Listing { symbol: "USDC", decimals: 6, price_micros: 1_000_000 }),
    (WETH, Listing { symbol: "WETH", decimals: 18, price_micros: 3_000_000_000 }),
    (LINK, Listing { symbol: "LINK", decimals: 18, price_micros: 15_000_000 }),
];

/// Look up a token by address, case-insensitively.
pub fn listing(token: &str) -> Option<Listing> {
    let token = token.to_ascii_lowercase();
    LISTINGS
        .iter()
        .find(|(address, _)| *address == token)
        .map(|(_, listing)| *listing)
}

/// USD value of `amount` base units of `token`, in micro-dollars.
///
/// `None` for an unlisted token or an amount too large to price.
pub fn usd_value_micros(token: &str, amount: u128) -> Option<u128> {
    let listing = listing(token)?;
    amount
        .checked_mul(listing.price_micros)
        .map(|v| v / 10u128.pow(listing.decimals))
}

/// Base units of `token_out` bought with `usd_micros`.
pub fn quote_amount_out(token_out: &str, usd_micros: u128) -> Option<u128> {
    let listing = listing(token_out)?;
    usd_micros
        .checked_mul(10u128.pow(listing.decimals))
        .map(|v| v / listing.price_micros)
}

/// Whole USD expressed in micro-dollars. For fixed amounts only; caller
/// input goes through `checked_usd`.
pub fn usd(whole: u128) -> u128 {
    whole * MICROS_PER_USD
}

/// Whole USD in micro-dollars, or `None` when that does not fit in a `u128`.
pub fn checked_usd(whole: u128) -> Option<u128> {
    whole.checked_mul(MICROS_PER_USD)
}

/// Render micro-dollars as a two-decimal USD string, e.g. `"250.00"`.
pub fn format_usd(micros: u128) -> String {
    format!(
        "{}.{:02}",
        micros / MICROS_PER_USD,
        (micros % MICROS_PER_USD) / 10_000
    )
}

/// A deterministic fake transaction hash for a swap.
pub fn tx_hash(invocation_id: &str, token_in: &str, amount_in: u128) -> String {
    let mut hasher = Sha256::new();
    hasher.update(invocation_id.as_bytes());
    hasher.update(token_in.to_ascii_lowercase().as_bytes());
    hasher.update(amount_in.to_le_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}
