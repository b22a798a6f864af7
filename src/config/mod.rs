use alloy::primitives::Address;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required env var: {0}")]
    MissingEnv(String),
    #[error("duplicate source key: {0}")]
    DuplicateKey(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub social: SocialConfig,
    #[serde(default)]
    pub links: LinksConfig,
    #[serde(default)]
    pub payload: PayloadConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Watched curated registries, one bot each.
    #[serde(default)]
    pub registry: Vec<RegistrySourceConfig>,
    /// Watched oracle proxies, one bot each.
    #[serde(default)]
    pub oracle: Vec<OracleSourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Reporter key for answer-report transactions - loaded from env PRIVATE_KEY
    #[serde(default)]
    pub private_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_url")]
    pub url: String,
    /// Key namespace, so deployments can share one Valkey.
    #[serde(default = "default_store_prefix")]
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SocialConfig {
    #[serde(default = "default_social_api_base")]
    pub api_base: String,
    #[serde(default = "default_social_upload_base")]
    pub upload_base: String,
    /// Bearer token - loaded from env SOCIAL_BEARER_TOKEN
    #[serde(default)]
    pub bearer_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinksConfig {
    #[serde(default = "default_links_api_base")]
    pub api_base: String,
    /// Shortener token - loaded from env LINKS_TOKEN. Empty means links
    /// are posted unshortened.
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadConfig {
    /// Content-addressed gateway for evidence documents and item media.
    #[serde(default = "default_gateway")]
    pub gateway: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Seconds between poll windows.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Base restart delay after a bot dies.
    #[serde(default = "default_restart_base_secs")]
    pub restart_base_secs: u64,
    /// Restart delay cap.
    #[serde(default = "default_restart_max_secs")]
    pub restart_max_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySourceConfig {
    /// Checkpoint namespace, must be unique across all sources.
    pub key: String,
    pub registry: Address,
    pub arbitrator: Address,
    /// Listing UI base URL, item ID appended.
    pub item_base_url: String,
    /// Block explorer base URL, item address appended.
    pub explorer_base_url: String,
    /// Replay history on first run instead of starting at the head.
    #[serde(default)]
    pub backfill: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleSourceConfig {
    /// Checkpoint namespace, must be unique across all sources.
    pub key: String,
    pub oracle: Address,
    pub proxy: Address,
    #[serde(default)]
    pub backfill: bool,
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}
fn default_store_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_store_prefix() -> String {
    "herald".to_string()
}
fn default_social_api_base() -> String {
    "https://api.twitter.com/1.1".to_string()
}
fn default_social_upload_base() -> String {
    "https://upload.twitter.com/1.1".to_string()
}
fn default_links_api_base() -> String {
    "https://api-ssl.bitly.com/v4".to_string()
}
fn default_gateway() -> String {
    "https://ipfs.kleros.io".to_string()
}
fn default_interval_secs() -> u64 {
    60
}
fn default_restart_base_secs() -> u64 {
    10
}
fn default_restart_max_secs() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            private_key: String::new(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            prefix: default_store_prefix(),
        }
    }
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            api_base: default_social_api_base(),
            upload_base: default_social_upload_base(),
            bearer_token: String::new(),
        }
    }
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            api_base: default_links_api_base(),
            token: String::new(),
        }
    }
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            gateway: default_gateway(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            restart_base_secs: default_restart_base_secs(),
            restart_max_secs: default_restart_max_secs(),
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

impl Config {
    /// Load config from a TOML file, then overlay environment variables
    /// for secrets.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        // Secrets come from the environment, never the config file.
        if let Ok(key) = std::env::var("PRIVATE_KEY") {
            config.chain.private_key = key;
        }
        if let Ok(token) = std::env::var("SOCIAL_BEARER_TOKEN") {
            config.social.bearer_token = token;
        }
        if let Ok(token) = std::env::var("LINKS_TOKEN") {
            config.links.token = token;
        }

        config.validate()?;
        Ok(config)
    }

    /// Defaults plus env-only secrets, when no config file exists. No
    /// sources are configured in this mode.
    pub fn from_env() -> Self {
        Config {
            chain: ChainConfig {
                rpc_url: std::env::var("RPC_URL").unwrap_or_else(|_| default_rpc_url()),
                private_key: std::env::var("PRIVATE_KEY").unwrap_or_default(),
            },
            store: StoreConfig {
                url: std::env::var("VALKEY_URL").unwrap_or_else(|_| default_store_url()),
                prefix: default_store_prefix(),
            },
            social: SocialConfig {
                bearer_token: std::env::var("SOCIAL_BEARER_TOKEN").unwrap_or_default(),
                ..SocialConfig::default()
            },
            links: LinksConfig {
                token: std::env::var("LINKS_TOKEN").unwrap_or_default(),
                ..LinksConfig::default()
            },
            payload: PayloadConfig::default(),
            poll: PollConfig::default(),
            logging: LoggingConfig::default(),
            registry: Vec::new(),
            oracle: Vec::new(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut keys = HashSet::new();
        for key in self
            .registry
            .iter()
            .map(|s| &s.key)
            .chain(self.oracle.iter().map(|s| &s.key))
        {
            if !keys.insert(key.clone()) {
                return Err(ConfigError::DuplicateKey(key.clone()));
            }
        }
        if !self.registry.is_empty() && self.social.bearer_token.is_empty() {
            return Err(ConfigError::MissingEnv("SOCIAL_BEARER_TOKEN".to_string()));
        }
        if !self.oracle.is_empty() && self.chain.private_key.is_empty() {
            return Err(ConfigError::MissingEnv("PRIVATE_KEY".to_string()));
        }
        Ok(())
    }
}
