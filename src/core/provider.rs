//! Token balance provider abstraction

use crate::core::token::RawToken;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Lists the tokens `wallet` holds on `chain`, as reported upstream.
    async fn fetch_raw_tokens(&self, wallet: &str, chain: &str) -> Result<Vec<RawToken>>;
}
