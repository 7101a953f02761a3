//! Builds the holdings report for a set of tracked wallets and chains.
use crate::core::aggregate::{
    ChainSummary, MergeKey, ToplineRow, WalletSnapshot, aggregate_chain, aggregate_wallet,
    merge_portfolio,
};
use crate::core::provider::TokenProvider;
use crate::core::token::{RawToken, normalize};
use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// The wallets and chains one report covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub wallets: Vec<String>,
    pub chains: Vec<String>,
    #[serde(default)]
    pub merge_key: MergeKey,
}

impl TrackingConfig {
    /// Rejects repeated wallets or chains. Empty lists are valid and yield
    /// an empty report.
    pub fn validate(&self) -> Result<()> {
        if let Some(wallet) = first_duplicate(&self.wallets) {
            bail!("Wallet {wallet} is listed more than once");
        }
        if let Some(chain) = first_duplicate(&self.chains) {
            bail!("Chain {chain} is listed more than once");
        }
        Ok(())
    }

    /// Every (wallet, chain) pair, wallet-major.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.wallets.iter().flat_map(move |wallet| {
            self.chains
                .iter()
                .map(move |chain| (wallet.as_str(), chain.as_str()))
        })
    }
}

fn first_duplicate(values: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    values
        .iter()
        .find(|v| !seen.insert(v.as_str()))
        .map(String::as_str)
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched(Vec<RawToken>),
    Failed(String),
}

/// The raw result of fetching one (wallet, chain) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairFetch {
    pub wallet: String,
    pub chain: String,
    pub outcome: FetchOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingsReport {
    pub updated_at: DateTime<Utc>,
    pub wallets: Vec<WalletSnapshot>,
    pub portfolio_topline: Vec<ToplineRow>,
}

impl HoldingsReport {
    pub fn total_usd_value(&self) -> f64 {
        self.wallets.iter().map(|w| w.total_usd_value).sum()
    }

    /// Chains whose fetch failed, as (wallet, chain, reason).
    pub fn failures(&self) -> Vec<(&str, &str, &str)> {
        self.wallets
            .iter()
            .flat_map(|w| {
                w.chains.iter().filter_map(move |c| {
                    c.error
                        .as_deref()
                        .map(|e| (w.wallet.as_str(), c.chain.as_str(), e))
                })
            })
            .collect()
    }
}

/// Fetches one pair. Provider errors are logged and recorded, never returned.
pub async fn fetch_pair(provider: &dyn TokenProvider, wallet: &str, chain: &str) -> PairFetch {
    let outcome = match provider.fetch_raw_tokens(wallet, chain).await {
        Ok(tokens) => {
            debug!(wallet = %wallet, chain = %chain, count = tokens.len(), "Fetched token list");
            FetchOutcome::Fetched(tokens)
        }
        Err(e) => {
            let reason = format!("{e:#}");
            warn!(wallet = %wallet, chain = %chain, error = %reason, "Token list fetch failed");
            FetchOutcome::Failed(reason)
        }
    };

    PairFetch {
        wallet: wallet.to_string(),
        chain: chain.to_string(),
        outcome,
    }
}

/// Reduces fetched pairs into a report, in configuration order.
///
/// Exactly one fetch per tracked pair is expected; anything else is an
/// internal inconsistency and fails the whole report.
pub fn assemble_report(
    tracking: &TrackingConfig,
    fetches: Vec<PairFetch>,
    updated_at: DateTime<Utc>,
) -> Result<HoldingsReport> {
    let mut outcomes: HashMap<(String, String), FetchOutcome> = HashMap::new();
    for fetch in fetches {
        let key = (fetch.wallet, fetch.chain);
        if outcomes.contains_key(&key) {
            bail!("Duplicate fetch result for wallet {} on chain {}", key.0, key.1);
        }
        outcomes.insert(key, fetch.outcome);
    }

    let mut wallets = Vec::with_capacity(tracking.wallets.len());
    for wallet in &tracking.wallets {
        let mut chains = Vec::with_capacity(tracking.chains.len());
        for chain in &tracking.chains {
            let Some(outcome) = outcomes.remove(&(wallet.clone(), chain.clone())) else {
                bail!("No fetch result for wallet {wallet} on chain {chain}");
            };
            let summary = match outcome {
                FetchOutcome::Fetched(tokens) => aggregate_chain(
                    chain,
                    tokens.iter().map(|t| normalize(t, wallet, chain)).collect(),
                ),
                FetchOutcome::Failed(reason) => ChainSummary::failed(chain, reason),
            };
            chains.push(summary);
        }
        wallets.push(aggregate_wallet(wallet, chains, tracking.merge_key));
    }

    if let Some((wallet, chain)) = outcomes.keys().next() {
        bail!("Fetch result for untracked wallet {wallet} on chain {chain}");
    }

    let portfolio_topline = merge_portfolio(&wallets, tracking.merge_key);
    Ok(HoldingsReport {
        updated_at,
        wallets,
        portfolio_topline,
    })
}

/// Fetches every tracked pair concurrently and aggregates the results.
///
/// `on_fetched` is called once per completed pair.
pub async fn build_holdings(
    tracking: &TrackingConfig,
    provider: &dyn TokenProvider,
    on_fetched: &(dyn Fn() + Send + Sync),
) -> Result<HoldingsReport> {
    tracking.validate()?;

    let fetches = join_all(tracking.pairs().map(|(wallet, chain)| async move {
        let fetch = fetch_pair(provider, wallet, chain).await;
        on_fetched();
        fetch
    }))
    .await;

    let failed = fetches
        .iter()
        .filter(|f| matches!(f.outcome, FetchOutcome::Failed(_)))
        .count();
    info!(pairs = fetches.len(), failed, "Fetched all token lists");

    assemble_report(tracking, fetches, Utc::now())
}
