//! Configuration file support.
//!
//! Loaded from TOML with environment overrides:
//!
//! ```toml
//! [ledger]
//! graphql_url = "https://arweave.net/graphql"
//! page_size = 100
//! query_mode = "single-page"
//!
//! [chain]
//! rpc_url = "https://arb1.arbitrum.io/rpc"
//! lookback_blocks = 10
//!
//! [protocol]
//! name = "FairAI"
//! version = "2.0-test"
//! ```

use crate::constants::{
    DEFAULT_LOOKBACK_BLOCKS, DEFAULT_PAGE_SIZE, LIVENESS_WINDOW_SECS, MARKETPLACE_EVM_ADDRESS,
    MAX_PAYLOAD_BYTES, NATIVE_USDC_ARB, PROTOCOL_NAME, PROTOCOL_VERSION,
};
use crate::ledger::QueryMode;
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ledger: LedgerSection,
    pub chain: ChainSection,
    pub protocol: ProtocolSection,
    pub upload: UploadSection,
    pub logging: LoggingSection,
}

/// Indexed-ledger query service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    /// GraphQL endpoint (env: FAIRAI_GRAPHQL_URL)
    pub graphql_url: String,
    /// Gateway serving raw transaction data (env: FAIRAI_GATEWAY_URL)
    pub gateway_url: String,
    pub page_size: u32,
    /// "single-page" or "paginated"
    pub query_mode: String,
    /// Page cap when paginating
    pub max_pages: u32,
    pub request_timeout_secs: u64,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            graphql_url: "https://arweave.net/graphql".to_string(),
            gateway_url: "https://arweave.net/".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            query_mode: "single-page".to_string(),
            max_pages: 10,
            request_timeout_secs: 30,
        }
    }
}

impl LedgerSection {
    pub fn query_mode(&self) -> QueryMode {
        match self.query_mode.as_str() {
            "paginated" => QueryMode::Paginated {
                max_pages: self.max_pages.max(1),
            },
            _ => QueryMode::SinglePage,
        }
    }
}

/// EVM chain settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSection {
    /// JSON-RPC endpoint (env: RPC_URL)
    pub rpc_url: String,
    /// Hex private key for the paying wallet (env: PRIVATE_KEY)
    #[serde(skip_serializing)]
    pub private_key: Option<String>,
    /// Stablecoin contract (env: FAIRAI_TOKEN_ADDRESS)
    pub token_address: String,
    /// Treasury (env: FAIRAI_MARKETPLACE_ADDRESS)
    pub marketplace_address: String,
    /// Timestamp-to-block lookup, the timestamp is appended
    pub block_lookup_url: String,
    pub lookback_blocks: u64,
    /// Blocks scanned after the anchor; unset scans to the chain head
    pub block_limit: Option<u64>,
}

impl Default for ChainSection {
    fn default() -> Self {
        Self {
            rpc_url: "https://arb1.arbitrum.io/rpc".to_string(),
            private_key: None,
            token_address: NATIVE_USDC_ARB.to_string(),
            marketplace_address: MARKETPLACE_EVM_ADDRESS.to_string(),
            block_lookup_url: "https://coins.llama.fi/block/arbitrum/".to_string(),
            lookback_blocks: DEFAULT_LOOKBACK_BLOCKS,
            block_limit: None,
        }
    }
}

impl ChainSection {
    pub fn token(&self) -> anyhow::Result<Address> {
        Ok(self.token_address.parse()?)
    }

    pub fn marketplace(&self) -> anyhow::Result<Address> {
        Ok(self.marketplace_address.parse()?)
    }
}

/// Protocol tags and windows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolSection {
    pub name: String,
    pub version: String,
    pub liveness_window_secs: u64,
}

impl Default for ProtocolSection {
    fn default() -> Self {
        Self {
            name: PROTOCOL_NAME.to_string(),
            version: PROTOCOL_VERSION.to_string(),
            liveness_window_secs: LIVENESS_WINDOW_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSection {
    pub max_payload_bytes: usize,
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            max_payload_bytes: MAX_PAYLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// trace, debug, info, warn, error
    pub level: String,
    /// text, json
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Config {
    /// Load from a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env_overrides();

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from `path`, or the first default location that exists, or defaults
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        for candidate in ["fairai.toml", "config/fairai.toml"] {
            if Path::new(candidate).exists() {
                match Self::from_file(candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => warn!("Failed to load {}: {}", candidate, e),
                }
            }
        }

        let mut config = Config::default();
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("FAIRAI_GRAPHQL_URL") {
            self.ledger.graphql_url = url;
        }
        if let Ok(url) = std::env::var("FAIRAI_GATEWAY_URL") {
            self.ledger.gateway_url = url;
        }
        if let Ok(url) = std::env::var("RPC_URL") {
            self.chain.rpc_url = url;
        }
        if let Ok(key) = std::env::var("PRIVATE_KEY") {
            self.chain.private_key = Some(key);
        }
        if let Ok(addr) = std::env::var("FAIRAI_TOKEN_ADDRESS") {
            self.chain.token_address = addr;
        }
        if let Ok(addr) = std::env::var("FAIRAI_MARKETPLACE_ADDRESS") {
            self.chain.marketplace_address = addr;
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, url) in [
            ("ledger.graphql_url", &self.ledger.graphql_url),
            ("ledger.gateway_url", &self.ledger.gateway_url),
            ("chain.block_lookup_url", &self.chain.block_lookup_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        let rpc = &self.chain.rpc_url;
        if !["http://", "https://", "ws://", "wss://"]
            .iter()
            .any(|scheme| rpc.starts_with(scheme))
        {
            anyhow::bail!("Invalid provider url. Must be a valid http or ws url");
        }

        self.chain
            .token()
            .map_err(|e| anyhow::anyhow!("Invalid token address: {}", e))?;
        self.chain
            .marketplace()
            .map_err(|e| anyhow::anyhow!("Invalid marketplace address: {}", e))?;

        if self.ledger.page_size == 0 {
            anyhow::bail!("ledger.page_size must be greater than zero");
        }

        let valid_modes = ["single-page", "paginated"];
        if !valid_modes.contains(&self.ledger.query_mode.as_str()) {
            anyhow::bail!(
                "Invalid query mode: {}. Must be one of: {:?}",
                self.ledger.query_mode,
                valid_modes
            );
        }

        Ok(())
    }

    pub fn sample() -> anyhow::Result<String> {
        let body = toml::to_string_pretty(&Config::default())?;
        let header = r#"# FairAI marketplace client configuration
#
# Environment variables take precedence over file values:
# FAIRAI_GRAPHQL_URL, FAIRAI_GATEWAY_URL, RPC_URL, PRIVATE_KEY,
# FAIRAI_TOKEN_ADDRESS, FAIRAI_MARKETPLACE_ADDRESS, RUST_LOG

"#;
        Ok(format!("{}{}", header, body))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
