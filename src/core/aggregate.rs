//! Chain, wallet and cross-wallet aggregation of normalized holdings.
//!
//! Everything here is synchronous and pure: inputs are borrowed or consumed,
//! merged records are always new values.
use crate::core::token::NormalizedHolding;
use crate::core::valuation::{finite_sum, saturating_add};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Identity used when merging holdings of the same token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeKey {
    /// Token id alone; the same id on two chains collapses into one row.
    #[default]
    TokenId,
    /// Token id scoped by chain.
    ChainAndTokenId,
}

impl MergeKey {
    pub(crate) fn key_of(&self, holding: &NormalizedHolding) -> (String, String) {
        match self {
            MergeKey::TokenId => (String::new(), holding.token_id.clone()),
            MergeKey::ChainAndTokenId => (holding.chain.clone(), holding.token_id.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSummary {
    pub chain: String,
    pub token_count: usize,
    pub usd_value: f64,
    pub tokens: Vec<NormalizedHolding>,
    /// Why the fetch for this chain failed, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChainSummary {
    /// A zero-valued summary for a chain whose tokens could not be fetched.
    pub fn failed(chain: &str, reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..aggregate_chain(chain, Vec::new())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub wallet: String,
    pub total_usd_value: f64,
    pub chains: Vec<ChainSummary>,
    pub tokens_flat: Vec<NormalizedHolding>,
}

impl WalletSnapshot {
    /// Chains whose holdings were merged into `flat`, in chain order.
    pub fn chains_of(&self, flat: &NormalizedHolding, merge_key: MergeKey) -> Vec<&str> {
        let key = merge_key.key_of(flat);
        self.chains
            .iter()
            .filter(|c| c.tokens.iter().any(|t| merge_key.key_of(t) == key))
            .map(|c| c.chain.as_str())
            .collect()
    }
}

/// One token's combined exposure across every tracked wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToplineRow {
    pub token_id: String,
    pub symbol: String,
    pub name: String,
    pub decimals: Option<u32>,
    pub logo_url: Option<String>,
    pub price_usd: f64,
    pub amount: f64,
    pub value_usd: f64,
    pub occurrences: usize,
    pub wallets: Vec<String>,
    pub chains: Vec<String>,
}

/// Stable sort, highest value first.
fn sort_by_value_desc<T>(rows: &mut [T], value: impl Fn(&T) -> f64) {
    rows.sort_by(|a, b| value(b).total_cmp(&value(a)));
}

fn push_distinct(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

/// Sums value and counts tokens for one (wallet, chain) pair.
///
/// Zero-value holdings are counted and kept.
pub fn aggregate_chain(chain: &str, holdings: Vec<NormalizedHolding>) -> ChainSummary {
    let usd_value = finite_sum(holdings.iter().map(|h| h.value_usd));
    ChainSummary {
        chain: chain.to_string(),
        token_count: holdings.len(),
        usd_value,
        tokens: holdings,
        error: None,
    }
}

/// Merges holdings sharing a key. The first holding seen seeds the row;
/// later ones only add their amount and value. Sorted by value, descending.
pub fn merge_flat(holdings: &[NormalizedHolding], merge_key: MergeKey) -> Vec<NormalizedHolding> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut merged: Vec<NormalizedHolding> = Vec::new();

    for holding in holdings {
        match index.entry(merge_key.key_of(holding)) {
            Entry::Occupied(slot) => {
                let row = &mut merged[*slot.get()];
                row.amount = saturating_add(row.amount, holding.amount);
                row.value_usd = saturating_add(row.value_usd, holding.value_usd);
            }
            Entry::Vacant(slot) => {
                slot.insert(merged.len());
                merged.push(holding.clone());
            }
        }
    }

    sort_by_value_desc(&mut merged, |h| h.value_usd);
    merged
}

/// Combines chain summaries of one wallet into its snapshot.
///
/// The wallet total is the sum of the chain totals, so the two always agree.
pub fn aggregate_wallet(
    wallet: &str,
    chains: Vec<ChainSummary>,
    merge_key: MergeKey,
) -> WalletSnapshot {
    let total_usd_value = finite_sum(chains.iter().map(|c| c.usd_value));
    let holdings: Vec<NormalizedHolding> = chains
        .iter()
        .flat_map(|c| c.tokens.iter().cloned())
        .collect();

    WalletSnapshot {
        wallet: wallet.to_string(),
        total_usd_value,
        tokens_flat: merge_flat(&holdings, merge_key),
        chains,
    }
}

/// Builds the cross-wallet topline from every wallet's flat list.
pub fn merge_portfolio(wallets: &[WalletSnapshot], merge_key: MergeKey) -> Vec<ToplineRow> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut rows: Vec<ToplineRow> = Vec::new();

    for holding in wallets.iter().flat_map(|w| w.tokens_flat.iter()) {
        let position = *index
            .entry(merge_key.key_of(holding))
            .or_insert_with(|| {
                rows.push(ToplineRow {
                    token_id: holding.token_id.clone(),
                    symbol: holding.symbol.clone(),
                    name: holding.name.clone(),
                    decimals: holding.decimals,
                    logo_url: holding.logo_url.clone(),
                    price_usd: holding.price_usd,
                    amount: 0.0,
                    value_usd: 0.0,
                    occurrences: 0,
                    wallets: Vec::new(),
                    chains: Vec::new(),
                });
                rows.len() - 1
            });

        let row = &mut rows[position];
        row.amount = saturating_add(row.amount, holding.amount);
        row.value_usd = saturating_add(row.value_usd, holding.value_usd);
        row.occurrences += 1;
        push_distinct(&mut row.wallets, &holding.wallet);
        push_distinct(&mut row.chains, &holding.chain);
    }

    sort_by_value_desc(&mut rows, |r| r.value_usd);
    rows
}
