//! Configuration schema and loader for auction replicas and bidders.
//!
//! Both processes read an optional YAML file and then apply environment
//! overrides (`PORT`, `AUCTION_DURATION_SECS`, `SERVERS`, `BIDDER_NAME`).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Replica listen port override.
pub const ENV_PORT: &str = "PORT";
/// Auction duration override, in seconds.
pub const ENV_AUCTION_DURATION: &str = "AUCTION_DURATION_SECS";
/// Number of replicas a bidder should derive addresses for.
pub const ENV_SERVERS: &str = "SERVERS";
/// This bidder's identity.
pub const ENV_BIDDER_NAME: &str = "BIDDER_NAME";

// ---------------------------------------------------------------------------
// Replica
// ---------------------------------------------------------------------------

/// Configuration for one auction replica process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// gRPC listen address.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Seconds after boot at which the auction closes.
    #[serde(default = "default_auction_duration_secs")]
    pub auction_duration_secs: u64,

    /// Optional Prometheus metrics HTTP port.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            auction_duration_secs: default_auction_duration_secs(),
            metrics_port: None,
        }
    }
}

impl ReplicaConfig {
    pub fn auction_duration(&self) -> Duration {
        Duration::from_secs(self.auction_duration_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auction_duration_secs == 0 {
            return Err(ConfigError::Invalid(
                "auction_duration_secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Apply `PORT` and `AUCTION_DURATION_SECS` from a variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(ENV_PORT) {
            let port: u16 = parse_var(ENV_PORT, &port)?;
            self.listen.set_port(port);
        }
        if let Some(secs) = lookup(ENV_AUCTION_DURATION) {
            self.auction_duration_secs = parse_var(ENV_AUCTION_DURATION, &secs)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bidder
// ---------------------------------------------------------------------------

/// Configuration for one bidder process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidderConfig {
    /// Identity this bidder writes into its bids.
    #[serde(default)]
    pub bidder_id: String,

    /// Which replicas to talk to.
    #[serde(default)]
    pub replicas: ReplicaSetConfig,

    /// Per-RPC deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub rpc_timeout_ms: u64,

    /// Connection establishment deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Pause between bidding rounds in milliseconds (0 = tight loop).
    #[serde(default)]
    pub round_interval_ms: u64,

    /// Ceiling for the backoff applied while no replica answers.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Optional Prometheus metrics HTTP port.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for BidderConfig {
    fn default() -> Self {
        Self {
            bidder_id: String::new(),
            replicas: ReplicaSetConfig::default(),
            rpc_timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_timeout_ms(),
            round_interval_ms: 0,
            max_backoff_ms: default_max_backoff_ms(),
            metrics_port: None,
        }
    }
}

/// The replica set, given either explicitly or as a count to derive
/// `<host_prefix><i>:<port>` addresses from (1-indexed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaSetConfig {
    /// Explicit replica addresses. Takes precedence over `count`.
    #[serde(default)]
    pub addresses: Vec<String>,

    /// Number of replicas to derive addresses for.
    #[serde(default = "default_count")]
    pub count: usize,

    #[serde(default = "default_host_prefix")]
    pub host_prefix: String,

    #[serde(default = "default_replica_port")]
    pub port: u16,
}

impl Default for ReplicaSetConfig {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            count: default_count(),
            host_prefix: default_host_prefix(),
            port: default_replica_port(),
        }
    }
}

impl ReplicaSetConfig {
    /// The full configured address set, in a stable order.
    pub fn resolve_addresses(&self) -> Vec<String> {
        if !self.addresses.is_empty() {
            return self.addresses.clone();
        }
        (1..=self.count)
            .map(|i| format!("{}{}:{}", self.host_prefix, i, self.port))
            .collect()
    }
}

impl BidderConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn round_interval(&self) -> Duration {
        Duration::from_millis(self.round_interval_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bidder_id.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "bidder_id must be set (or provide {})",
                ENV_BIDDER_NAME
            )));
        }
        if self.replicas.resolve_addresses().is_empty() {
            return Err(ConfigError::Invalid(
                "replicas.count must be > 0 when no addresses are listed".into(),
            ));
        }
        if self.rpc_timeout_ms == 0 {
            return Err(ConfigError::Invalid("rpc_timeout_ms must be > 0".into()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "connect_timeout_ms must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Apply `BIDDER_NAME` and `SERVERS` from a variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(ENV_BIDDER_NAME) {
            self.bidder_id = name;
        }
        if let Some(servers) = lookup(ENV_SERVERS) {
            self.replicas.count = parse_var(ENV_SERVERS, &servers)?;
            self.replicas.addresses.clear();
        }
        Ok(())
    }
}

// --- Defaults ---

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], default_replica_port()))
}
fn default_auction_duration_secs() -> u64 {
    60
}
fn default_timeout_ms() -> u64 {
    2000
}
fn default_max_backoff_ms() -> u64 {
    1000
}
fn default_count() -> usize {
    3
}
fn default_host_prefix() -> String {
    "auctionserver".to_string()
}
fn default_replica_port() -> u16 {
    5000
}

// --- Loading ---

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid environment variable {name}={value:?}")]
    Env { name: &'static str, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        name,
        value: value.to_string(),
    })
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Load a `ReplicaConfig` from a YAML string.
pub fn load_replica_from_str(yaml: &str) -> Result<ReplicaConfig, ConfigError> {
    let config: ReplicaConfig = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}

/// Load a `ReplicaConfig` from a YAML file path.
pub fn load_replica_from_file(path: &std::path::Path) -> Result<ReplicaConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    load_replica_from_str(&contents)
}

/// Build a `ReplicaConfig` from an optional file plus the process environment.
pub fn replica_from_env(path: Option<&std::path::Path>) -> Result<ReplicaConfig, ConfigError> {
    let mut config = match path {
        Some(p) => load_replica_from_file(p)?,
        None => ReplicaConfig::default(),
    };
    config.apply_env(process_env)?;
    config.validate()?;
    Ok(config)
}

/// Load a `BidderConfig` from a YAML string.
///
/// The identity may still be missing here, so only the file's own
/// structure is checked; call `validate` once overrides are applied.
pub fn load_bidder_from_str(yaml: &str) -> Result<BidderConfig, ConfigError> {
    let config: BidderConfig = serde_yaml::from_str(yaml)?;
    Ok(config)
}

/// Load a `BidderConfig` from a YAML file path.
pub fn load_bidder_from_file(path: &std::path::Path) -> Result<BidderConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    load_bidder_from_str(&contents)
}

/// Build a `BidderConfig` from an optional file plus the process environment.
pub fn bidder_from_env(path: Option<&std::path::Path>) -> Result<BidderConfig, ConfigError> {
    let mut config = match path {
        Some(p) => load_bidder_from_file(p)?,
        None => BidderConfig::default(),
    };
    config.apply_env(process_env)?;
    config.validate()?;
    Ok(config)
}
