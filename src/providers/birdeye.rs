use super::TokenListResponse;
use super::util::{lenient_f64, lenient_u32, send_with_retry};
use crate::core::provider::TokenProvider;
use crate::core::token::RawToken;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Birdeye names chains in full; short ids used elsewhere are translated.
fn birdeye_chain(chain: &str) -> &str {
    match chain {
        "sol" => "solana",
        "eth" => "ethereum",
        "arb" => "arbitrum",
        "op" => "optimism",
        "matic" => "polygon",
        "avax" => "avalanche",
        other => other,
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirdeyeToken {
    pub address: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub decimals: Option<u32>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ui_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price_usd: Option<f64>,
    #[serde(rename = "logoURI")]
    pub logo_uri: Option<String>,
}

impl From<BirdeyeToken> for RawToken {
    fn from(token: BirdeyeToken) -> Self {
        RawToken {
            id: token.address,
            symbol: token.symbol,
            name: token.name,
            decimals: token.decimals,
            price: token.price_usd,
            amount: token.ui_amount,
            logo_url: token.logo_uri,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct BirdeyeWallet {
    #[serde(default)]
    items: Vec<BirdeyeToken>,
}

#[derive(Debug, Deserialize)]
pub struct BirdeyeTokenList {
    success: bool,
    data: Option<BirdeyeWallet>,
    message: Option<String>,
}

impl BirdeyeTokenList {
    pub fn into_tokens(self) -> Result<Vec<BirdeyeToken>> {
        if !self.success {
            bail!(
                "Birdeye reported failure: {}",
                self.message.as_deref().unwrap_or("no message")
            );
        }
        Ok(self.data.map(|d| d.items).unwrap_or_default())
    }
}

pub struct BirdeyeProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl BirdeyeProvider {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("chainfolio/1.0")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    pub async fn fetch_token_list(&self, wallet: &str, chain: &str) -> Result<BirdeyeTokenList> {
        let url = format!("{}/v1/wallet/token_list?wallet={}", self.base_url, wallet);
        let x_chain = birdeye_chain(chain);
        debug!("Requesting {} token list from {}", x_chain, url);

        let response = send_with_retry(
            || {
                let mut request = self
                    .client
                    .get(&url)
                    .header("accept", "application/json")
                    .header("x-chain", x_chain);
                if let Some(key) = &self.api_key {
                    request = request.header("X-API-KEY", key);
                }
                request.send()
            },
            1,
            500,
        )
        .await
        .with_context(|| format!("Birdeye token_list request failed for chain {chain}"))?;

        let response_text = response
            .text()
            .await
            .context("Failed to get response text")?;

        serde_json::from_str(&response_text).map_err(|e| {
            anyhow!("Failed to parse Birdeye token list: {e}. Response: '{response_text}'")
        })
    }
}

#[async_trait]
impl TokenProvider for BirdeyeProvider {
    #[instrument(name = "BirdeyeTokenList", skip(self), fields(wallet = %wallet, chain = %chain))]
    async fn fetch_raw_tokens(&self, wallet: &str, chain: &str) -> Result<Vec<RawToken>> {
        TokenListResponse::Birdeye(self.fetch_token_list(wallet, chain).await?).into_raw_tokens()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WALLET: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

    const MOCK_JSON: &str = r#"{
        "success": true,
        "data": {
            "wallet": "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU",
            "totalUsd": 999999,
            "items": [
                {
                    "address": "So11111111111111111111111111111111111111112",
                    "decimals": 9,
                    "balance": 2500000000,
                    "uiAmount": 2.5,
                    "chainId": "solana",
                    "name": "Wrapped SOL",
                    "symbol": "SOL",
                    "logoURI": "https://img/sol.png",
                    "priceUsd": 150.0,
                    "valueUsd": 999999
                },
                {
                    "address": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                    "uiAmount": "10",
                    "symbol": "USDC"
                }
            ]
        }
    }"#;

    async fn create_mock_server(x_chain: &str, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/wallet/token_list"))
            .and(query_param("wallet", WALLET))
            .and(header("x-chain", x_chain))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        mock_server
    }

    #[tokio::test]
    async fn test_fetch_token_list() {
        let mock_server = create_mock_server("solana", MOCK_JSON).await;
        let provider = BirdeyeProvider::new(&mock_server.uri(), None).unwrap();

        let tokens = provider.fetch_raw_tokens(WALLET, "sol").await.unwrap();

        assert_eq!(tokens.len(), 2);
        assert_eq!(
            tokens[0].id.as_deref(),
            Some("So11111111111111111111111111111111111111112")
        );
        assert_eq!(tokens[0].symbol.as_deref(), Some("SOL"));
        assert_eq!(tokens[0].decimals, Some(9));
        assert_eq!(tokens[0].amount, Some(2.5));
        assert_eq!(tokens[0].price, Some(150.0));
        assert_eq!(tokens[0].logo_url.as_deref(), Some("https://img/sol.png"));
        assert_eq!(tokens[1].amount, Some(10.0));
        assert!(tokens[1].price.is_none());
    }

    #[tokio::test]
    async fn test_upstream_value_is_not_trusted() {
        let mock_server = create_mock_server("solana", MOCK_JSON).await;
        let provider = BirdeyeProvider::new(&mock_server.uri(), None).unwrap();

        let tokens = provider.fetch_raw_tokens(WALLET, "solana").await.unwrap();
        let holding = crate::core::token::normalize(&tokens[0], WALLET, "solana");

        assert_eq!(holding.value_usd, 375.0);
    }

    #[tokio::test]
    async fn test_unsuccessful_response_is_an_error() {
        let body = r#"{"success": false, "message": "Unauthorized"}"#;
        let mock_server = create_mock_server("solana", body).await;
        let provider = BirdeyeProvider::new(&mock_server.uri(), None).unwrap();

        let err = provider.fetch_raw_tokens(WALLET, "sol").await.unwrap_err();
        assert!(err.to_string().contains("Unauthorized"));
    }

    #[tokio::test]
    async fn test_api_key_header_sent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/wallet/token_list"))
            .and(header("X-API-KEY", "be-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"success": true, "data": {}}"#),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
        let provider =
            BirdeyeProvider::new(&mock_server.uri(), Some("be-key".to_string())).unwrap();

        let tokens = provider.fetch_raw_tokens(WALLET, "solana").await.unwrap();
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_chain_names() {
        assert_eq!(birdeye_chain("sol"), "solana");
        assert_eq!(birdeye_chain("base"), "base");
    }
}
