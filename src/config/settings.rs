use crate::error::{BlockchainError, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

static DEFAULT_NODE_ADDR: &str = "127.0.0.1:2001";
static DEFAULT_DATA_DIR: &str = "./chainlog-data";
const DEFAULT_MINING_INTERVAL_SECS: u64 = 1;

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const DATA_DIR_KEY: &str = "CHAINLOG_DATA_DIR";
const MINING_ADDRESS_KEY: &str = "MINING_ADDRESS";
const STAKE_GATED_KEY: &str = "CHAINLOG_STAKE_GATED";
const MINING_INTERVAL_KEY: &str = "CHAINLOG_MINING_INTERVAL_SECS";

/// Node settings, built once at startup and handed to the chain context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    node_addr: String,
    data_dir: PathBuf,
    mining_addr: Option<String>,
    stake_gated: bool,
    mining_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node_addr: DEFAULT_NODE_ADDR.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            mining_addr: None,
            stake_gated: false,
            mining_interval: Duration::from_secs(DEFAULT_MINING_INTERVAL_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Config> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        if let Some(addr) = lookup(NODE_ADDRESS_KEY) {
            config.node_addr = addr;
        }
        if let Some(dir) = lookup(DATA_DIR_KEY) {
            config.data_dir = PathBuf::from(dir);
        }
        config.mining_addr = lookup(MINING_ADDRESS_KEY).filter(|addr| !addr.is_empty());
        if let Some(flag) = lookup(STAKE_GATED_KEY) {
            config.stake_gated = parse_flag(STAKE_GATED_KEY, &flag)?;
        }
        if let Some(secs) = lookup(MINING_INTERVAL_KEY) {
            let secs = secs.trim().parse::<u64>().map_err(|e| {
                BlockchainError::Precondition(format!("Invalid {MINING_INTERVAL_KEY}: {e}"))
            })?;
            config.mining_interval = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn get_node_addr(&self) -> &str {
        self.node_addr.as_str()
    }

    pub fn set_node_addr(&mut self, addr: &str) {
        self.node_addr = addr.to_string();
    }

    pub fn get_data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn set_data_dir(&mut self, dir: PathBuf) {
        self.data_dir = dir;
    }

    pub fn get_mining_addr(&self) -> Option<&str> {
        self.mining_addr.as_deref()
    }

    pub fn set_mining_addr(&mut self, addr: &str) {
        self.mining_addr = Some(addr.to_string());
    }

    pub fn is_miner(&self) -> bool {
        self.mining_addr.is_some()
    }

    pub fn is_stake_gated(&self) -> bool {
        self.stake_gated
    }

    pub fn set_stake_gated(&mut self, gated: bool) {
        self.stake_gated = gated;
    }

    pub fn get_mining_interval(&self) -> Duration {
        self.mining_interval
    }

    pub fn set_mining_interval(&mut self, interval: Duration) {
        self.mining_interval = interval;
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(BlockchainError::Precondition(format!(
            "Invalid {key}: {other}"
        ))),
    }
}
