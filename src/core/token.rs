//! Raw provider token records and their canonical normalized form.

use crate::core::valuation::{finite_or_zero, value_usd};
use serde::{Deserialize, Serialize};

/// A provider token record after adapter-level field mapping.
///
/// Every field is optional: providers omit fields freely and nothing here
/// is assumed complete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawToken {
    pub id: Option<String>,
    pub optimized_symbol: Option<String>,
    pub display_symbol: Option<String>,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub decimals: Option<u32>,
    pub price: Option<f64>,
    pub amount: Option<f64>,
    pub logo_url: Option<String>,
    pub is_core: Option<bool>,
    pub is_verified: Option<bool>,
}

/// The canonical holding of one token by one wallet on one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedHolding {
    pub wallet: String,
    pub chain: String,
    pub token_id: String,
    pub symbol: String,
    pub name: String,
    pub decimals: Option<u32>,
    pub price_usd: f64,
    pub amount: f64,
    pub value_usd: f64,
    pub logo_url: Option<String>,
    pub is_core: bool,
    pub is_verified: bool,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl RawToken {
    /// Best available ticker: optimized, then display, then raw symbol.
    pub fn preferred_symbol(&self) -> &str {
        non_empty(&self.optimized_symbol)
            .or_else(|| non_empty(&self.display_symbol))
            .or_else(|| non_empty(&self.symbol))
            .unwrap_or_default()
    }
}

/// Converts a raw token seen in `wallet` on `chain` into a holding.
pub fn normalize(raw: &RawToken, wallet: &str, chain: &str) -> NormalizedHolding {
    let price_usd = raw.price.map(finite_or_zero).unwrap_or(0.0).max(0.0);
    let amount = raw.amount.map(finite_or_zero).unwrap_or(0.0);

    NormalizedHolding {
        wallet: wallet.to_string(),
        chain: chain.to_string(),
        token_id: raw.id.clone().unwrap_or_default(),
        symbol: raw.preferred_symbol().to_string(),
        name: non_empty(&raw.name).unwrap_or_default().to_string(),
        decimals: raw.decimals,
        price_usd,
        amount,
        value_usd: value_usd(price_usd, amount),
        logo_url: non_empty(&raw.logo_url).map(str::to_string),
        is_core: raw.is_core.unwrap_or(false),
        is_verified: raw.is_verified.unwrap_or(false),
    }
}
