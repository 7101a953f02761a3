use crate::core::aggregate::MergeKey;
use crate::core::holdings::TrackingConfig;
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_DEBANK_URL: &str = "https://openapi.debank.com";
pub const DEFAULT_BIRDEYE_URL: &str = "https://public-api.birdeye.so";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Debank,
    Birdeye,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RoutedChain {
    pub id: String,
    pub provider: ProviderKind,
}

/// A tracked chain: a bare id uses the default provider.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ChainEntry {
    Id(String),
    Routed(RoutedChain),
}

impl ChainEntry {
    pub fn id(&self) -> &str {
        match self {
            ChainEntry::Id(id) => id,
            ChainEntry::Routed(routed) => &routed.id,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        match self {
            ChainEntry::Id(_) => ProviderKind::default(),
            ChainEntry::Routed(routed) => routed.provider,
        }
    }
}

/// Where a chain's balances come from.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ChainSource {
    pub chain: String,
    pub provider: ProviderKind,
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DebankProviderConfig {
    pub base_url: String,
    pub access_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BirdeyeProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

fn key_or_env(key: &Option<String>, var: &str) -> Option<String> {
    key.clone()
        .or_else(|| std::env::var(var).ok())
        .filter(|k| !k.trim().is_empty())
}

impl DebankProviderConfig {
    /// Configured key, else `DEBANK_ACCESS_KEY`.
    pub fn resolved_access_key(&self) -> Option<String> {
        key_or_env(&self.access_key, "DEBANK_ACCESS_KEY")
    }
}

impl BirdeyeProviderConfig {
    /// Configured key, else `BIRDEYE_API_KEY`.
    pub fn resolved_api_key(&self) -> Option<String> {
        key_or_env(&self.api_key, "BIRDEYE_API_KEY")
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub debank: Option<DebankProviderConfig>,
    pub birdeye: Option<BirdeyeProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            debank: Some(DebankProviderConfig {
                base_url: DEFAULT_DEBANK_URL.to_string(),
                access_key: None,
            }),
            birdeye: Some(BirdeyeProviderConfig {
                base_url: DEFAULT_BIRDEYE_URL.to_string(),
                api_key: None,
            }),
        }
    }
}

fn default_ttl_secs() -> u64 {
    60
}

fn default_persist() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_persist")]
    pub persist: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            persist: default_persist(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub wallets: Vec<String>,
    pub chains: Vec<ChainEntry>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub merge_key: MergeKey,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("in", "codito", "chainfolio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("in", "codito", "chainfolio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Checks that there is something to track.
    pub fn validate(&self) -> Result<()> {
        if self.wallets.is_empty() {
            bail!("No wallets configured");
        }
        if self.chains.is_empty() {
            bail!("No chains configured");
        }
        Ok(())
    }

    /// The provider and endpoint serving each configured chain.
    pub fn chain_sources(&self) -> Vec<ChainSource> {
        self.chains
            .iter()
            .map(|entry| {
                let provider = entry.provider();
                let base_url = match provider {
                    ProviderKind::Debank => self.providers.debank.as_ref().map(|p| &p.base_url),
                    ProviderKind::Birdeye => self.providers.birdeye.as_ref().map(|p| &p.base_url),
                };
                ChainSource {
                    chain: entry.id().to_string(),
                    provider,
                    base_url: base_url.cloned(),
                }
            })
            .collect()
    }

    /// The wallets and chains a holdings report covers.
    pub fn tracking(&self) -> TrackingConfig {
        TrackingConfig {
            wallets: self.wallets.clone(),
            chains: self.chains.iter().map(|c| c.id().to_string()).collect(),
            merge_key: self.merge_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
wallets:
  - "0x47C7c4E3b59D2C03E98bf54C104e7481474842E5"
  - "0x980F71B0D813d6cC81a248e39964c8D1a7BE01E5"
chains:
  - eth
  - arb
  - id: solana
    provider: birdeye
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.wallets.len(), 2);
        assert_eq!(config.chains.len(), 3);
        assert_eq!(config.chains[0], ChainEntry::Id("eth".to_string()));
        assert_eq!(config.chains[1].provider(), ProviderKind::Debank);
        assert_eq!(config.chains[2].id(), "solana");
        assert_eq!(config.chains[2].provider(), ProviderKind::Birdeye);

        assert_eq!(config.merge_key, MergeKey::TokenId);
        assert_eq!(config.cache.ttl_secs, 60);
        assert!(config.cache.persist);
        assert_eq!(
            config.providers.debank.unwrap().base_url,
            DEFAULT_DEBANK_URL.to_string()
        );
        assert!(config.data_path.is_none());

        let yaml_str_with_providers = r#"
wallets: ["0xabc"]
chains: [eth]
providers:
  debank:
    base_url: "http://example.com/debank"
    access_key: "secret"
merge_key: chain_and_token_id
cache:
  ttl_secs: 5
  persist: false
        "#;
        let config_with_providers: AppConfig =
            serde_yaml::from_str(yaml_str_with_providers).unwrap();
        let debank = config_with_providers.providers.debank.clone().unwrap();
        assert_eq!(debank.base_url, "http://example.com/debank");
        assert_eq!(debank.resolved_access_key().as_deref(), Some("secret"));
        assert!(config_with_providers.providers.birdeye.is_none());
        assert_eq!(config_with_providers.merge_key, MergeKey::ChainAndTokenId);
        assert_eq!(config_with_providers.cache.ttl(), Duration::from_secs(5));
        assert!(!config_with_providers.cache.persist);
    }

    #[test]
    fn test_tracking_config_from_app_config() {
        let yaml_str = r#"
wallets: ["0xa", "0xb"]
chains:
  - eth
  - id: solana
    provider: birdeye
merge_key: chain_and_token_id
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        let tracking = config.tracking();

        assert_eq!(tracking.wallets, vec!["0xa", "0xb"]);
        assert_eq!(tracking.chains, vec!["eth", "solana"]);
        assert_eq!(tracking.merge_key, MergeKey::ChainAndTokenId);
    }

    #[test]
    fn test_validate_requires_wallets_and_chains() {
        let no_wallets: AppConfig = serde_yaml::from_str("wallets: []\nchains: [eth]\n").unwrap();
        let err = no_wallets.validate().unwrap_err();
        assert!(err.to_string().contains("No wallets configured"));

        let no_chains: AppConfig =
            serde_yaml::from_str("wallets: [\"0xa\"]\nchains: []\n").unwrap();
        let err = no_chains.validate().unwrap_err();
        assert!(err.to_string().contains("No chains configured"));

        let ok: AppConfig = serde_yaml::from_str("wallets: [\"0xa\"]\nchains: [eth]\n").unwrap();
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_chain_sources_follow_routing() {
        let yaml_str = r#"
wallets: ["0xa"]
chains:
  - eth
  - id: solana
    provider: birdeye
providers:
  debank:
    base_url: "http://debank.local"
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();

        assert_eq!(
            config.chain_sources(),
            vec![
                ChainSource {
                    chain: "eth".to_string(),
                    provider: ProviderKind::Debank,
                    base_url: Some("http://debank.local".to_string()),
                },
                ChainSource {
                    chain: "solana".to_string(),
                    provider: ProviderKind::Birdeye,
                    base_url: None,
                },
            ]
        );
    }

    #[test]
    fn test_custom_data_path() {
        let config: AppConfig =
            serde_yaml::from_str("wallets: []\nchains: []\ndata_path: /tmp/chainfolio-data\n")
                .unwrap();
        assert_eq!(
            config.default_data_path().unwrap(),
            PathBuf::from("/tmp/chainfolio-data")
        );
    }
}
