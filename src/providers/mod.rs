pub mod birdeye;
pub mod debank;
pub mod util;

use crate::core::config::{AppConfig, ProviderKind};
use crate::core::provider::TokenProvider;
use crate::core::token::RawToken;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use birdeye::{BirdeyeProvider, BirdeyeTokenList};
use debank::{DebankProvider, DebankTokenList};
use std::collections::HashMap;
use std::sync::Arc;

/// A decoded token list in the shape its provider sent it.
#[derive(Debug)]
pub enum TokenListResponse {
    Debank(DebankTokenList),
    Birdeye(BirdeyeTokenList),
}

impl TokenListResponse {
    /// Maps the provider's records into the shared raw token shape.
    pub fn into_raw_tokens(self) -> Result<Vec<RawToken>> {
        let tokens = match self {
            TokenListResponse::Debank(list) => {
                list.into_tokens().into_iter().map(RawToken::from).collect()
            }
            TokenListResponse::Birdeye(list) => list
                .into_tokens()?
                .into_iter()
                .map(RawToken::from)
                .collect(),
        };
        Ok(tokens)
    }
}

/// Dispatches each chain to the provider that indexes it.
#[derive(Default)]
pub struct ProviderRouter {
    routes: HashMap<String, Arc<dyn TokenProvider>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, chain: &str, provider: Arc<dyn TokenProvider>) -> Self {
        self.routes.insert(chain.to_string(), provider);
        self
    }

    /// Builds one provider per kind in use and routes every configured chain.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut providers: HashMap<ProviderKind, Arc<dyn TokenProvider>> = HashMap::new();
        let mut router = Self::new();

        for chain in &config.chains {
            let kind = chain.provider();
            let provider = match providers.get(&kind) {
                Some(provider) => Arc::clone(provider),
                None => {
                    let provider = Self::create_provider(config, kind)
                        .with_context(|| format!("Cannot route chain {}", chain.id()))?;
                    providers.insert(kind, Arc::clone(&provider));
                    provider
                }
            };
            router = router.route(chain.id(), provider);
        }
        Ok(router)
    }

    fn create_provider(config: &AppConfig, kind: ProviderKind) -> Result<Arc<dyn TokenProvider>> {
        let provider: Arc<dyn TokenProvider> = match kind {
            ProviderKind::Debank => {
                let debank = config
                    .providers
                    .debank
                    .as_ref()
                    .context("Debank provider is not configured")?;
                Arc::new(DebankProvider::new(
                    &debank.base_url,
                    debank.resolved_access_key(),
                )?)
            }
            ProviderKind::Birdeye => {
                let birdeye = config
                    .providers
                    .birdeye
                    .as_ref()
                    .context("Birdeye provider is not configured")?;
                Arc::new(BirdeyeProvider::new(
                    &birdeye.base_url,
                    birdeye.resolved_api_key(),
                )?)
            }
        };
        Ok(provider)
    }
}

#[async_trait]
impl TokenProvider for ProviderRouter {
    async fn fetch_raw_tokens(&self, wallet: &str, chain: &str) -> Result<Vec<RawToken>> {
        let provider = self
            .routes
            .get(chain)
            .ok_or_else(|| anyhow!("No provider configured for chain {chain}"))?;
        provider.fetch_raw_tokens(wallet, chain).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider(&'static str);

    #[async_trait]
    impl TokenProvider for FixedProvider {
        async fn fetch_raw_tokens(&self, _wallet: &str, _chain: &str) -> Result<Vec<RawToken>> {
            Ok(vec![RawToken {
                id: Some(self.0.to_string()),
                ..Default::default()
            }])
        }
    }

    #[test]
    fn test_token_list_response_mapping() {
        let debank: DebankTokenList =
            serde_json::from_str(r#"[{"id": "eth", "symbol": "ETH", "price": 1, "amount": 2}]"#)
                .unwrap();
        let birdeye: BirdeyeTokenList = serde_json::from_str(
            r#"{"success": true, "data": {"items": [{"address": "So1", "uiAmount": 3}]}}"#,
        )
        .unwrap();

        let from_debank = TokenListResponse::Debank(debank).into_raw_tokens().unwrap();
        let from_birdeye = TokenListResponse::Birdeye(birdeye).into_raw_tokens().unwrap();

        assert_eq!(from_debank[0].id.as_deref(), Some("eth"));
        assert_eq!(from_birdeye[0].id.as_deref(), Some("So1"));
        assert_eq!(from_birdeye[0].amount, Some(3.0));
    }

    #[tokio::test]
    async fn test_router_dispatches_by_chain() {
        let router = ProviderRouter::new()
            .route("eth", Arc::new(FixedProvider("from-debank")))
            .route("solana", Arc::new(FixedProvider("from-birdeye")));

        let eth = router.fetch_raw_tokens("w", "eth").await.unwrap();
        let sol = router.fetch_raw_tokens("w", "solana").await.unwrap();

        assert_eq!(eth[0].id.as_deref(), Some("from-debank"));
        assert_eq!(sol[0].id.as_deref(), Some("from-birdeye"));
    }

    #[tokio::test]
    async fn test_unrouted_chain_is_an_error() {
        let router = ProviderRouter::new();
        let err = router.fetch_raw_tokens("w", "ftm").await.unwrap_err();
        assert!(err.to_string().contains("ftm"));
    }

    #[test]
    fn test_from_config_requires_provider_settings() {
        let config: AppConfig = serde_yaml::from_str(
            r#"
wallets: ["0xabc"]
chains:
  - eth
  - id: solana
    provider: birdeye
providers:
  debank:
    base_url: "http://localhost:1"
"#,
        )
        .unwrap();

        let err = ProviderRouter::from_config(&config).err().unwrap();
        assert!(format!("{err:#}").contains("Birdeye provider is not configured"));
    }

    #[test]
    fn test_from_config_routes_all_chains() {
        let yaml = "wallets: [\"0xabc\"]\nchains: [eth, arb, {id: sol, provider: birdeye}]\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();

        let router = ProviderRouter::from_config(&config).unwrap();
        assert_eq!(router.routes.len(), 3);
        assert!(Arc::ptr_eq(&router.routes["eth"], &router.routes["arb"]));
    }
}
