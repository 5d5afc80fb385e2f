use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::chain::ens::DEFAULT_REVERSE_NAMESPACE;
use crate::chain::Network;

/// Placeholder substituted with `ALCHEMY_API_KEY` in every endpoint URL.
const KEY_PLACEHOLDER: &str = "{key}";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required env var: {0}")]
    MissingEnv(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub networks: NetworksConfig,
    #[serde(default)]
    pub recap: RecapConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworksConfig {
    #[serde(default = "default_primary")]
    pub primary: NetworkConfig,
    #[serde(default = "default_secondary")]
    pub secondary: NetworkConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Human-readable network name used in reports.
    pub label: String,
    /// JSON-RPC endpoint for block and `eth_call` lookups.
    pub rpc_url: String,
    /// Alchemy JSON-RPC endpoint (`alchemy_getAssetTransfers`).
    pub alchemy_url: String,
    /// Alchemy NFT API v3 base URL.
    pub nft_api_url: String,
    /// Name registry contract. Networks without one skip name lookups.
    #[serde(default)]
    pub name_registry: Option<String>,
    /// Reverse-record namespace under `name_registry`.
    #[serde(default = "default_reverse_namespace")]
    pub reverse_namespace: String,
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecapConfig {
    /// Trailing calendar months in the activity history.
    #[serde(default = "default_history_months")]
    pub history_months: u32,
    /// Counterparties kept in the ranking.
    #[serde(default = "default_top_counterparties")]
    pub top_counterparties: usize,
    /// Transfers fetched per network, at most.
    #[serde(default = "default_max_transfers")]
    pub max_transfers: usize,
    /// Start of the secondary network's launch window.
    #[serde(default = "default_secondary_launch")]
    pub secondary_launch: DateTime<Utc>,
    #[serde(default = "default_launch_grace_days")]
    pub launch_grace_days: i64,
    /// Concurrent block timestamp lookups per request.
    #[serde(default = "default_lookup_concurrency")]
    pub lookup_concurrency: usize,
    /// Timeout applied to each external call, including each transfer page.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Overall budget for fetching one network's transfers, all pages.
    #[serde(default = "default_collect_timeout_secs")]
    pub collect_timeout_secs: u64,
    /// Assumed cost of one transaction, in native units.
    #[serde(default = "default_fee_per_transaction")]
    pub fee_per_transaction: Decimal,
    #[serde(default = "default_notable_asset_fallback")]
    pub notable_asset_fallback: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_primary() -> NetworkConfig {
    NetworkConfig {
        label: "Ethereum".to_string(),
        rpc_url: "https://eth-mainnet.g.alchemy.com/v2/{key}".to_string(),
        alchemy_url: "https://eth-mainnet.g.alchemy.com/v2/{key}".to_string(),
        nft_api_url: "https://eth-mainnet.g.alchemy.com/nft/v3/{key}".to_string(),
        name_registry: Some("0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e".to_string()),
        reverse_namespace: default_reverse_namespace(),
        native_symbol: default_native_symbol(),
    }
}
fn default_secondary() -> NetworkConfig {
    NetworkConfig {
        label: "Base".to_string(),
        rpc_url: "https://base-mainnet.g.alchemy.com/v2/{key}".to_string(),
        alchemy_url: "https://base-mainnet.g.alchemy.com/v2/{key}".to_string(),
        nft_api_url: "https://base-mainnet.g.alchemy.com/nft/v3/{key}".to_string(),
        // Basenames registry; reverse records use the ENSIP-11 coin type
        // for chain 8453.
        name_registry: Some("0xB94704422c2a1E396835A571837Aa5AE53285a95".to_string()),
        reverse_namespace: "80002105.reverse".to_string(),
        native_symbol: default_native_symbol(),
    }
}
fn default_reverse_namespace() -> String {
    DEFAULT_REVERSE_NAMESPACE.to_string()
}
fn default_native_symbol() -> String {
    "ETH".to_string()
}
fn default_history_months() -> u32 {
    12
}
fn default_top_counterparties() -> usize {
    5
}
fn default_max_transfers() -> usize {
    10_000
}
fn default_secondary_launch() -> DateTime<Utc> {
    // Base mainnet opened to the public on 2023-08-09.
    Utc.timestamp_opt(1_691_539_200, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
fn default_launch_grace_days() -> i64 {
    30
}
fn default_lookup_concurrency() -> usize {
    16
}
fn default_request_timeout_secs() -> u64 {
    15
}
fn default_collect_timeout_secs() -> u64 {
    180
}
fn default_fee_per_transaction() -> Decimal {
    // 0.0005
    Decimal::new(5, 4)
}
fn default_notable_asset_fallback() -> String {
    "None found".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NetworksConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            secondary: default_secondary(),
        }
    }
}

impl Default for RecapConfig {
    fn default() -> Self {
        Self {
            history_months: default_history_months(),
            top_counterparties: default_top_counterparties(),
            max_transfers: default_max_transfers(),
            secondary_launch: default_secondary_launch(),
            launch_grace_days: default_launch_grace_days(),
            lookup_concurrency: default_lookup_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
            collect_timeout_secs: default_collect_timeout_secs(),
            fee_per_transaction: default_fee_per_transaction(),
            notable_asset_fallback: default_notable_asset_fallback(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl NetworksConfig {
    pub fn get(&self, network: Network) -> &NetworkConfig {
        match network {
            Network::Primary => &self.primary,
            Network::Secondary => &self.secondary,
        }
    }

    fn all_mut(&mut self) -> [&mut NetworkConfig; 2] {
        [&mut self.primary, &mut self.secondary]
    }
}

impl NetworkConfig {
    fn urls_mut(&mut self) -> [&mut String; 3] {
        [&mut self.rpc_url, &mut self.alchemy_url, &mut self.nft_api_url]
    }

    fn needs_key(&self) -> bool {
        [&self.rpc_url, &self.alchemy_url, &self.nft_api_url]
            .iter()
            .any(|u| u.contains(KEY_PLACEHOLDER))
    }
}

impl RecapConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn collect_timeout(&self) -> Duration {
        Duration::from_secs(self.collect_timeout_secs)
    }

    pub fn launch_grace(&self) -> chrono::Duration {
        chrono::Duration::days(self.launch_grace_days)
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables for secrets.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.apply_env();
        Ok(config)
    }

    /// Default config with env-only secrets (no file needed).
    pub fn from_env() -> Self {
        let mut config = Config {
            networks: NetworksConfig::default(),
            recap: RecapConfig::default(),
            logging: LoggingConfig::default(),
        };
        config.apply_env();
        config
    }

    /// Substitute the API key and any RPC overrides from the environment.
    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("PRIMARY_RPC_URL") {
            self.networks.primary.rpc_url = url;
        }
        if let Ok(url) = std::env::var("SECONDARY_RPC_URL") {
            self.networks.secondary.rpc_url = url;
        }
        if let Ok(key) = std::env::var("ALCHEMY_API_KEY") {
            self.fill_api_key(&key);
        }
    }

    fn fill_api_key(&mut self, key: &str) {
        for network in self.networks.all_mut() {
            for url in network.urls_mut() {
                if url.contains(KEY_PLACEHOLDER) {
                    *url = url.replace(KEY_PLACEHOLDER, key);
                }
            }
        }
    }

    /// Fail if any endpoint still carries an unfilled key placeholder.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.networks.primary.needs_key() || self.networks.secondary.needs_key() {
            return Err(ConfigError::MissingEnv("ALCHEMY_API_KEY".to_string()));
        }
        Ok(())
    }
}
