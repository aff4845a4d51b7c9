//! Relayer configuration loaded from `RELAYER_*` environment variables.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use ethers::utils::parse_units;
use secrecy::{ExposeSecret, SecretString};
use validator::Validate;

use crate::app::{ListenerConfig, RetryPolicy};
use crate::domain::ConfigError;
use crate::infra::logging::{LogConfig, LogFormat};
use crate::infra::store::DEFAULT_MAX_ENTRIES;

/// Decimals of the reward token
pub const TOKEN_DECIMALS: u32 = 18;

const DEFAULT_REWARD_PER_WIN: &str = "10";

/// Relayer configuration
#[derive(Debug, Validate)]
pub struct RelayerConfig {
    #[validate(length(min = 1, message = "RPC URL is required"))]
    pub rpc_url: String,
    pub private_key: SecretString,
    pub registry_address: Address,
    pub token_address: Address,
    /// Reward in the token's smallest unit
    pub reward_per_win: U256,
    #[validate(range(min = 1, message = "At least one attempt is required"))]
    pub max_retries: u32,
    pub backoff_ms: u64,
    #[validate(range(min = 1, message = "Backoff multiplier must be at least 1"))]
    pub backoff_multiplier: u32,
    /// Processed-event store file; `.cache/processed-events.json` when unset
    pub cache_path: Option<PathBuf>,
    /// `0` keeps every record
    pub cache_max_entries: usize,
    pub health_path: Option<PathBuf>,
    pub health_enabled: bool,
    pub health_host: String,
    pub health_port: u16,
    #[validate(range(min = 1, message = "Poll interval must be positive"))]
    pub poll_interval_ms: u64,
    pub start_block: Option<u64>,
    #[validate(range(min = 1, message = "Block range must be positive"))]
    pub max_block_range: u64,
    pub confirmations: usize,
    #[validate(range(min = 1, message = "Confirmation timeout must be positive"))]
    pub confirmation_timeout_secs: u64,
    pub log: LogConfig,
}

impl RelayerConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| get(key).ok_or_else(|| ConfigError::Missing(key.to_string()));

        let rpc_url = require("RELAYER_RPC_URL")?;
        let private_key = SecretString::from(require("RELAYER_PRIVATE_KEY")?);
        let registry_address = require("RELAYER_REGISTRY_ADDRESS")?;
        let token_address = require("RELAYER_TOKEN_ADDRESS")?;
        let registry_address = parse_address("RELAYER_REGISTRY_ADDRESS", &registry_address)?;
        let token_address = parse_address("RELAYER_TOKEN_ADDRESS", &token_address)?;

        let reward_per_win = parse_token_amount(
            "RELAYER_REWARD_PER_WIN",
            get("RELAYER_REWARD_PER_WIN")
                .as_deref()
                .unwrap_or(DEFAULT_REWARD_PER_WIN),
        )?;

        let log = LogConfig {
            format: match get("RELAYER_LOG_FORMAT") {
                Some(raw) => raw
                    .parse::<LogFormat>()
                    .map_err(|message| invalid("RELAYER_LOG_FORMAT", message))?,
                None => LogFormat::default(),
            },
            file: get("RELAYER_LOG_FILE").map(PathBuf::from),
            max_bytes: parse_or(&get, "RELAYER_LOG_MAX_BYTES", LogConfig::DEFAULT_MAX_BYTES)?,
            backups: parse_or(&get, "RELAYER_LOG_BACKUPS", LogConfig::DEFAULT_BACKUPS)?,
        };

        let config = Self {
            rpc_url,
            private_key,
            registry_address,
            token_address,
            reward_per_win,
            max_retries: parse_or(&get, "RELAYER_MAX_RETRIES", 3)?,
            backoff_ms: parse_or(&get, "RELAYER_BACKOFF_MS", 1_000)?,
            backoff_multiplier: parse_or(&get, "RELAYER_BACKOFF_MULTIPLIER", 3)?,
            cache_path: get("RELAYER_CACHE_PATH").map(PathBuf::from),
            cache_max_entries: parse_or(&get, "RELAYER_CACHE_MAX_ENTRIES", DEFAULT_MAX_ENTRIES)?,
            health_path: get("RELAYER_HEALTH_PATH").map(PathBuf::from),
            health_enabled: get("RELAYER_HEALTH_ENABLED")
                .map(|raw| parse_flag("RELAYER_HEALTH_ENABLED", &raw))
                .transpose()?
                .unwrap_or(true),
            health_host: get("RELAYER_HEALTH_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            health_port: parse_or(&get, "RELAYER_HEALTH_PORT", 8787)?,
            poll_interval_ms: parse_or(&get, "RELAYER_POLL_INTERVAL_MS", 4_000)?,
            start_block: get("RELAYER_START_BLOCK")
                .map(|raw| parse_value("RELAYER_START_BLOCK", &raw))
                .transpose()?,
            max_block_range: parse_or(&get, "RELAYER_MAX_BLOCK_RANGE", 2_000)?,
            confirmations: parse_or(&get, "RELAYER_CONFIRMATIONS", 1)?,
            confirmation_timeout_secs: parse_or(&get, "RELAYER_CONFIRMATION_TIMEOUT_SECS", 120)?,
            log,
        };

        config
            .validate()
            .map_err(|e| invalid("configuration", e.to_string()))?;
        Ok(config)
    }

    /// Signing wallet for the reward token, bound to `chain_id`.
    pub fn wallet(&self, chain_id: u64) -> Result<LocalWallet, ConfigError> {
        LocalWallet::from_str(self.private_key.expose_secret())
            .map(|wallet| wallet.with_chain_id(chain_id))
            .map_err(|e| invalid("RELAYER_PRIVATE_KEY", e.to_string()))
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.backoff_ms))
            .with_multiplier(self.backoff_multiplier)
    }

    #[must_use]
    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_block_range: self.max_block_range,
            start_block: self.start_block,
        }
    }

    #[must_use]
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    #[must_use]
    pub fn health_addr(&self) -> String {
        format!("{}:{}", self.health_host, self.health_port)
    }

    /// Load from a map of variables
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }
}

fn invalid(var: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var: var.to_string(),
        message: message.into(),
    }
}

fn parse_value<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| invalid(var, e.to_string()))
}

fn parse_or<T, G>(get: &G, var: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => parse_value(var, &raw),
        None => Ok(default),
    }
}

fn parse_flag(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(var, format!("expected a boolean, got {:?}", raw))),
    }
}

fn parse_address(var: &str, raw: &str) -> Result<Address, ConfigError> {
    raw.parse::<Address>()
        .map_err(|e| invalid(var, format!("not an address ({})", e)))
}

/// Parse a decimal token amount such as `42.5` into base units.
pub fn parse_token_amount(var: &str, raw: &str) -> Result<U256, ConfigError> {
    if raw.starts_with('-') {
        return Err(invalid(var, "amount must not be negative"));
    }
    parse_units(raw, TOKEN_DECIMALS)
        .map(U256::from)
        .map_err(|e| invalid(var, e.to_string()))
}
