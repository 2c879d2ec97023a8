//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::address::{Address, Network};
use crate::rpc::TransferPriority;
use crate::units;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub transfers: TransfersConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Transfer authorization policy as written by the operator. Amounts are
/// decimal display strings here; they turn into atomic units when the
/// policy is built.
#[derive(Debug, Clone, Deserialize)]
pub struct TransfersConfig {
    /// Master switch. Ships disabled.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_network")]
    pub network: Network,

    /// Per-transfer ceiling as a decimal amount, e.g. "0.5".
    #[serde(default)]
    pub max_transfer: Option<String>,

    /// Rolling 24-hour cumulative ceiling as a decimal amount.
    #[serde(default)]
    pub daily_limit: Option<String>,

    /// Minimum seconds between successful transfers.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Exact destination addresses allowed to receive funds. Empty means
    /// unrestricted.
    #[serde(default)]
    pub allowlist: Vec<String>,

    /// Two-step confirm-then-execute flow. Ships enabled.
    #[serde(default = "default_true")]
    pub require_confirmation: bool,

    /// Priority used when the command line does not pass one.
    #[serde(default)]
    pub default_priority: TransferPriority,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Append-only JSON-lines decision log. None disables the file sink;
    /// decisions still reach the diagnostic log stream.
    #[serde(default)]
    pub log_path: Option<String>,
}

fn default_rpc_endpoint() -> String {
    "http://127.0.0.1:18083/json_rpc".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_network() -> Network {
    Network::Mainnet
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for TransfersConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            network: default_network(),
            max_transfer: None,
            daily_limit: None,
            cooldown_secs: default_cooldown_secs(),
            allowlist: vec![],
            require_confirmation: true,
            default_priority: TransferPriority::Default,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { log_path: None }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            transfers: TransfersConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("rpc.endpoint", default_rpc_endpoint())?
            .set_default("rpc.timeout_ms", default_timeout_ms() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix WARDEN_)
            .add_source(
                config::Environment::with_prefix("WARDEN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.rpc.endpoint.is_empty() {
            anyhow::bail!("rpc.endpoint must not be empty");
        }

        if self.rpc.timeout_ms == 0 {
            anyhow::bail!("rpc.timeout_ms must be positive");
        }

        // Ceilings must parse as exact atomic amounts
        if let Some(max) = &self.transfers.max_transfer {
            units::to_atomic(max)
                .with_context(|| format!("Invalid max_transfer amount: {}", max))?;
        }

        if let Some(limit) = &self.transfers.daily_limit {
            units::to_atomic(limit)
                .with_context(|| format!("Invalid daily_limit amount: {}", limit))?;
        }

        // A misconfigured allowlist entry can never match, so reject it
        // outright instead of silently blocking the destination it meant
        // to allow
        for entry in &self.transfers.allowlist {
            Address::parse(entry, self.transfers.network)
                .with_context(|| format!("Invalid allowlist entry: {}", entry))?;
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
    timeout: {}ms
  Transfers:
    enabled: {}
    network: {}
    max_transfer: {}
    daily_limit: {}
    cooldown: {}s
    allowlist: {} entries
    require_confirmation: {}
  Audit:
    log_path: {}
"#,
            mask_url(&self.rpc.endpoint),
            self.rpc.timeout_ms,
            self.transfers.enabled,
            self.transfers.network,
            self.transfers.max_transfer.as_deref().unwrap_or("(none)"),
            self.transfers.daily_limit.as_deref().unwrap_or("(none)"),
            self.transfers.cooldown_secs,
            self.transfers.allowlist.len(),
            self.transfers.require_confirmation,
            self.audit.log_path.as_deref().unwrap_or("(disabled)"),
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}
