use super::TokenListResponse;
use super::util::{lenient_f64, lenient_u32, send_with_retry};
use crate::core::provider::TokenProvider;
use crate::core::token::RawToken;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, instrument};

/// One token entry of a Debank `token_list` response.
#[derive(Debug, Clone, Deserialize)]
pub struct DebankToken {
    pub id: Option<String>,
    pub chain: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub display_symbol: Option<String>,
    pub optimized_symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub decimals: Option<u32>,
    pub logo_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: Option<f64>,
    pub is_core: Option<bool>,
    pub is_verified: Option<bool>,
}

impl From<DebankToken> for RawToken {
    fn from(token: DebankToken) -> Self {
        RawToken {
            id: token.id,
            optimized_symbol: token.optimized_symbol,
            display_symbol: token.display_symbol,
            symbol: token.symbol,
            name: token.name,
            decimals: token.decimals,
            price: token.price,
            amount: token.amount,
            logo_url: token.logo_url,
            is_core: token.is_core,
            is_verified: token.is_verified,
        }
    }
}

/// The open API wraps the list in `data`; the pro API returns it bare.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DebankTokenList {
    Wrapped { data: Vec<DebankToken> },
    Bare(Vec<DebankToken>),
}

impl DebankTokenList {
    pub fn into_tokens(self) -> Vec<DebankToken> {
        match self {
            DebankTokenList::Wrapped { data } => data,
            DebankTokenList::Bare(tokens) => tokens,
        }
    }
}

pub struct DebankProvider {
    base_url: String,
    access_key: Option<String>,
    client: reqwest::Client,
}

impl DebankProvider {
    pub fn new(base_url: &str, access_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("chainfolio/1.0")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_key,
            client,
        })
    }

    /// Fetches and decodes the provider-shaped token list.
    pub async fn fetch_token_list(&self, wallet: &str, chain: &str) -> Result<DebankTokenList> {
        let url = format!(
            "{}/v1/user/token_list?id={}&chain_id={}",
            self.base_url, wallet, chain
        );
        debug!("Requesting token list from {}", url);

        let response = send_with_retry(
            || {
                let mut request = self
                    .client
                    .get(&url)
                    .header("accept", "application/json");
                if let Some(key) = &self.access_key {
                    request = request.header("AccessKey", key);
                }
                request.send()
            },
            1,
            500,
        )
        .await
        .with_context(|| format!("Debank token_list request failed for chain {chain}"))?;

        let response_text = response
            .text()
            .await
            .context("Failed to get response text")?;

        if response_text.trim().is_empty() {
            return Err(anyhow!("Received empty token list response"));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            error!(
                error = ?e,
                response = %response_text,
                "Failed to parse token list response"
            );
            anyhow!("Failed to parse Debank token list: {e}")
        })
    }
}

#[async_trait]
impl TokenProvider for DebankProvider {
    #[instrument(name = "DebankTokenList", skip(self), fields(wallet = %wallet, chain = %chain))]
    async fn fetch_raw_tokens(&self, wallet: &str, chain: &str) -> Result<Vec<RawToken>> {
        TokenListResponse::Debank(self.fetch_token_list(wallet, chain).await?).into_raw_tokens()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WALLET: &str = "0x47C7c4E3b59D2C03E98bf54C104e7481474842E5";

    const MOCK_JSON: &str = r#"{
        "data": [
            {
                "id": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
                "chain": "eth",
                "name": "USD Coin",
                "symbol": "USDC",
                "display_symbol": null,
                "optimized_symbol": "USDC",
                "decimals": 6,
                "logo_url": "https://static.debank.com/usdc.png",
                "price": 1.0,
                "amount": 1250.5,
                "is_core": true,
                "is_verified": true
            },
            {
                "id": "eth",
                "symbol": "ETH",
                "price": "3000.5",
                "amount": 0.5
            },
            {
                "id": "0xdust",
                "symbol": "DUST",
                "price": null,
                "amount": 99999
            }
        ]
    }"#;

    async fn create_mock_server(chain: &str, status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/user/token_list"))
            .and(query_param("id", WALLET))
            .and(query_param("chain_id", chain))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;

        mock_server
    }

    #[tokio::test]
    async fn test_fetch_wrapped_token_list() {
        let mock_server = create_mock_server("eth", 200, MOCK_JSON).await;
        let provider = DebankProvider::new(&mock_server.uri(), None).unwrap();

        let tokens = provider.fetch_raw_tokens(WALLET, "eth").await.unwrap();

        assert_eq!(tokens.len(), 3);
        assert_eq!(
            tokens[0].id.as_deref(),
            Some("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48")
        );
        assert_eq!(tokens[0].optimized_symbol.as_deref(), Some("USDC"));
        assert_eq!(tokens[0].decimals, Some(6));
        assert_eq!(tokens[0].amount, Some(1250.5));
        assert_eq!(tokens[0].is_core, Some(true));
        assert_eq!(tokens[1].price, Some(3000.5));
        assert!(tokens[1].name.is_none());
        assert!(tokens[2].price.is_none());
    }

    #[tokio::test]
    async fn test_fetch_bare_token_list() {
        let body = r#"[{"id": "bsc", "symbol": "BNB", "price": 600, "amount": 2}]"#;
        let mock_server = create_mock_server("bsc", 200, body).await;
        let provider = DebankProvider::new(&mock_server.uri(), None).unwrap();

        let tokens = provider.fetch_raw_tokens(WALLET, "bsc").await.unwrap();

        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].symbol.as_deref(), Some("BNB"));
        assert_eq!(tokens[0].price, Some(600.0));
    }

    #[tokio::test]
    async fn test_access_key_header_sent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/user/token_list"))
            .and(header("AccessKey", "pro-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&mock_server)
            .await;
        let provider =
            DebankProvider::new(&mock_server.uri(), Some("pro-key".to_string())).unwrap();

        let tokens = provider.fetch_raw_tokens(WALLET, "eth").await.unwrap();
        assert!(tokens.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_an_error() {
        let mock_server = create_mock_server("arb", 401, "unauthorized").await;
        let provider = DebankProvider::new(&mock_server.uri(), None).unwrap();

        let err = provider.fetch_raw_tokens(WALLET, "arb").await.unwrap_err();
        assert!(format!("{err:#}").contains("HTTP 401 unauthorized"));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_an_error() {
        let mock_server = create_mock_server("op", 200, r#"{"error": "nope"}"#).await;
        let provider = DebankProvider::new(&mock_server.uri(), None).unwrap();

        assert!(provider.fetch_raw_tokens(WALLET, "op").await.is_err());
    }
}
