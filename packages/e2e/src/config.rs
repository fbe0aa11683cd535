//! Configuration for E2E tests
//!
//! Typed configuration built from environment variables (optionally loaded
//! from `.env.e2e`), with defaults that match the chain table in
//! [`crate::chain_config`].

use crate::types::TxEncoding;
use eyre::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Root configuration for E2E tests
#[derive(Debug, Clone)]
pub struct E2eConfig {
    /// ICA controller chain (wasmd)
    pub controller: ChainEndpoints,
    /// ICA host chain (canined)
    pub host: ChainEndpoints,
    pub docker: DockerConfig,
    pub relayer: RelayerConfig,
    pub contract: ContractConfig,
    pub funding: FundingConfig,
    pub timing: TimingConfig,
    /// Values produced by `setup` and consumed by `run`
    pub deployment: Deployment,
    pub log_file: Option<PathBuf>,
}

impl Default for E2eConfig {
    fn default() -> Self {
        Self {
            controller: ChainEndpoints::wasmd_default(),
            host: ChainEndpoints::canined_default(),
            docker: DockerConfig::default(),
            relayer: RelayerConfig::default(),
            contract: ContractConfig::default(),
            funding: FundingConfig::default(),
            timing: TimingConfig::default(),
            deployment: Deployment::default(),
            log_file: None,
        }
    }
}

impl E2eConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            controller: ChainEndpoints::from_env_with_prefix(
                "WASMD",
                ChainEndpoints::wasmd_default(),
            )?,
            host: ChainEndpoints::from_env_with_prefix(
                "CANINED",
                ChainEndpoints::canined_default(),
            )?,
            docker: DockerConfig::from_env(),
            relayer: RelayerConfig::from_env(),
            contract: ContractConfig::from_env()?,
            funding: FundingConfig::from_env(),
            timing: TimingConfig::from_env(),
            deployment: Deployment::from_env(),
            log_file: std::env::var("E2E_LOG_FILE").ok().map(PathBuf::from),
        })
    }
}

/// Where one chain node is reachable, inside and outside docker
#[derive(Debug, Clone)]
pub struct ChainEndpoints {
    pub container_name: String,
    /// Node home directory inside the container
    pub home: String,
    pub rpc_url: Url,
    pub lcd_url: Url,
    pub grpc_port: u16,
}

impl ChainEndpoints {
    pub fn wasmd_default() -> Self {
        Self::local("outpost-e2e-wasmd", "/var/cosmos-chain/wasmd", 26657, 1317, 9090)
    }

    pub fn canined_default() -> Self {
        Self::local("outpost-e2e-canined", "/var/cosmos-chain/canined", 26667, 1327, 9100)
    }

    fn local(container_name: &str, home: &str, rpc_port: u16, lcd_port: u16, grpc_port: u16) -> Self {
        Self {
            container_name: container_name.to_string(),
            home: home.to_string(),
            rpc_url: Url::parse(&format!("http://localhost:{}", rpc_port))
                .expect("valid default URL"),
            lcd_url: Url::parse(&format!("http://localhost:{}", lcd_port))
                .expect("valid default URL"),
            grpc_port,
        }
    }

    /// Load with a prefix, e.g. `WASMD_RPC_URL`, `CANINED_CONTAINER`
    pub fn from_env_with_prefix(prefix: &str, defaults: Self) -> Result<Self> {
        let rpc_url = match std::env::var(format!("{}_RPC_URL", prefix)) {
            Ok(url) => Url::parse(&url)?,
            Err(_) => defaults.rpc_url,
        };
        let lcd_url = match std::env::var(format!("{}_LCD_URL", prefix)) {
            Ok(url) => Url::parse(&url)?,
            Err(_) => defaults.lcd_url,
        };

        Ok(Self {
            container_name: std::env::var(format!("{}_CONTAINER", prefix))
                .unwrap_or(defaults.container_name),
            home: std::env::var(format!("{}_HOME", prefix)).unwrap_or(defaults.home),
            rpc_url,
            lcd_url,
            grpc_port: env_parse(&format!("{}_GRPC_PORT", prefix), defaults.grpc_port),
        })
    }

    /// Host port published for the node's RPC (26657 inside the container)
    pub fn rpc_port(&self) -> u16 {
        self.rpc_url.port_or_known_default().unwrap_or(26657)
    }

    /// Host port published for the node's LCD (1317 inside the container)
    pub fn lcd_port(&self) -> u16 {
        self.lcd_url.port_or_known_default().unwrap_or(1317)
    }
}

/// Docker configuration for E2E infrastructure
#[derive(Debug, Clone)]
pub struct DockerConfig {
    pub network: String,
    /// Label put on every container the harness starts
    pub label: String,
    /// Docker CLI binary used for `run`, `exec` and `cp`
    pub cli: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            network: "outpost-e2e".to_string(),
            label: "outpost-e2e".to_string(),
            cli: "docker".to_string(),
        }
    }
}

impl DockerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            network: std::env::var("E2E_DOCKER_NETWORK").unwrap_or(defaults.network),
            label: std::env::var("E2E_DOCKER_LABEL").unwrap_or(defaults.label),
            cli: std::env::var("E2E_DOCKER_CLI").unwrap_or(defaults.cli),
        }
    }
}

/// Go relayer (`rly`) configuration
#[derive(Debug, Clone)]
pub struct RelayerConfig {
    pub image: String,
    pub version: String,
    pub container_name: String,
    pub home: String,
    pub path_name: String,
    pub key_name: String,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            image: "ghcr.io/cosmos/relayer".to_string(),
            version: "v2.5.2".to_string(),
            container_name: "outpost-e2e-relayer".to_string(),
            home: "/home/relayer".to_string(),
            path_name: "wasmd-canined".to_string(),
            key_name: "relayer".to_string(),
        }
    }
}

impl RelayerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            image: std::env::var("RELAYER_IMAGE").unwrap_or(defaults.image),
            version: std::env::var("RELAYER_VERSION").unwrap_or(defaults.version),
            container_name: std::env::var("RELAYER_CONTAINER").unwrap_or(defaults.container_name),
            home: defaults.home,
            path_name: std::env::var("RELAYER_PATH").unwrap_or(defaults.path_name),
            key_name: defaults.key_name,
        }
    }

    pub fn image_reference(&self) -> String {
        format!("{}:{}", self.image, self.version)
    }
}

/// Outpost contract artifact and instantiation settings
#[derive(Debug, Clone)]
pub struct ContractConfig {
    /// Pre-built wasm on the host filesystem
    pub wasm_path: PathBuf,
    pub label: String,
    pub encoding: TxEncoding,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            wasm_path: PathBuf::from("artifacts/storage_outpost.wasm"),
            label: "storage-outpost".to_string(),
            encoding: TxEncoding::Protobuf,
        }
    }
}

impl ContractConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let encoding = match std::env::var("ICA_TX_ENCODING") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.encoding,
        };

        Ok(Self {
            wasm_path: std::env::var("CONTRACT_WASM_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.wasm_path),
            label: std::env::var("CONTRACT_LABEL").unwrap_or(defaults.label),
            encoding,
        })
    }
}

/// Token amounts handed out at genesis and during setup (in base denom)
#[derive(Debug, Clone)]
pub struct FundingConfig {
    pub genesis_amount: u128,
    pub validator_stake: u128,
    pub user_amount: u128,
    pub ica_amount: u128,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            genesis_amount: 100_000_000_000_000,
            validator_stake: 1_000_000_000_000,
            user_amount: 10_000_000_000,
            ica_amount: 10_000_000_000,
        }
    }
}

impl FundingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            genesis_amount: env_parse("E2E_GENESIS_AMOUNT", defaults.genesis_amount),
            validator_stake: env_parse("E2E_VALIDATOR_STAKE", defaults.validator_stake),
            user_amount: env_parse("E2E_USER_AMOUNT", defaults.user_amount),
            ica_amount: env_parse("E2E_ICA_AMOUNT", defaults.ica_amount),
        }
    }
}

/// Fixed waits and polling limits
#[derive(Debug, Clone)]
pub struct TimingConfig {
    /// Settle time for the ICA handshake before the first packet
    pub handshake_settle: Duration,
    /// Settle time for the transfer channel to reach OPEN
    pub transfer_settle: Duration,
    /// How long chains stay up after a scenario for manual inspection
    pub hold: Duration,
    pub poll_interval: Duration,
    pub tx_timeout: Duration,
    pub channel_timeout: Duration,
    pub ack_timeout: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            handshake_settle: Duration::from_secs(30),
            transfer_settle: Duration::from_secs(60),
            hold: Duration::from_secs(10 * 60 * 60),
            poll_interval: Duration::from_secs(2),
            tx_timeout: Duration::from_secs(60),
            channel_timeout: Duration::from_secs(300),
            ack_timeout: Duration::from_secs(180),
        }
    }
}

impl TimingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            handshake_settle: env_secs("E2E_HANDSHAKE_SETTLE_SECS", defaults.handshake_settle),
            transfer_settle: env_secs("E2E_TRANSFER_SETTLE_SECS", defaults.transfer_settle),
            hold: env_secs("E2E_HOLD_SECS", defaults.hold),
            poll_interval: env_secs("E2E_POLL_INTERVAL_SECS", defaults.poll_interval),
            tx_timeout: env_secs("E2E_TX_TIMEOUT_SECS", defaults.tx_timeout),
            channel_timeout: env_secs("E2E_CHANNEL_TIMEOUT_SECS", defaults.channel_timeout),
            ack_timeout: env_secs("E2E_ACK_TIMEOUT_SECS", defaults.ack_timeout),
        }
    }
}

/// A key in a chain's test keyring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    pub key_name: String,
    pub address: String,
}

/// Everything `setup` learns that the scenarios need
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deployment {
    pub controller_connection_id: Option<String>,
    pub host_connection_id: Option<String>,
    pub code_id: Option<u64>,
    pub contract_address: Option<String>,
    pub ica_address: Option<String>,
    pub ica_channel_id: Option<String>,
    pub controller_user: Option<Wallet>,
    pub host_user: Option<Wallet>,
}

impl Deployment {
    pub fn from_env() -> Self {
        Self::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let get = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();
        let wallet = |key: &str, address: &str| match (get(key), get(address)) {
            (Some(key_name), Some(address)) => Some(Wallet { key_name, address }),
            _ => None,
        };

        Self {
            controller_connection_id: get("CONTROLLER_CONNECTION_ID"),
            host_connection_id: get("HOST_CONNECTION_ID"),
            code_id: get("CONTRACT_CODE_ID").and_then(|s| s.parse().ok()),
            contract_address: get("CONTRACT_ADDRESS"),
            ica_address: get("ICA_ADDRESS"),
            ica_channel_id: get("ICA_CHANNEL_ID"),
            controller_user: wallet("WASMD_USER_KEY", "WASMD_USER_ADDRESS"),
            host_user: wallet("CANINED_USER_KEY", "CANINED_USER_ADDRESS"),
        }
    }

    /// Variables written to `.env.e2e`
    pub fn to_env_vars(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                vars.insert(key.to_string(), value);
            }
        };

        put("CONTROLLER_CONNECTION_ID", self.controller_connection_id.clone());
        put("HOST_CONNECTION_ID", self.host_connection_id.clone());
        put("CONTRACT_CODE_ID", self.code_id.map(|id| id.to_string()));
        put("CONTRACT_ADDRESS", self.contract_address.clone());
        put("ICA_ADDRESS", self.ica_address.clone());
        put("ICA_CHANNEL_ID", self.ica_channel_id.clone());
        if let Some(user) = &self.controller_user {
            put("WASMD_USER_KEY", Some(user.key_name.clone()));
            put("WASMD_USER_ADDRESS", Some(user.address.clone()));
        }
        if let Some(user) = &self.host_user {
            put("CANINED_USER_KEY", Some(user.key_name.clone()));
            put("CANINED_USER_ADDRESS", Some(user.address.clone()));
        }

        vars
    }

    /// Whether `run` has what it needs
    pub fn is_complete(&self) -> bool {
        self.controller_connection_id.is_some()
            && self.host_connection_id.is_some()
            && self.contract_address.is_some()
            && self.ica_address.is_some()
            && self.controller_user.is_some()
            && self.host_user.is_some()
    }
}

// --- Helper functions ---

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints_do_not_collide() {
        let config = E2eConfig::default();
        assert_eq!(config.controller.rpc_port(), 26657);
        assert_eq!(config.controller.lcd_port(), 1317);
        assert_eq!(config.host.rpc_port(), 26667);
        assert_eq!(config.host.lcd_port(), 1327);
        assert_ne!(config.controller.container_name, config.host.container_name);
        assert_ne!(config.controller.grpc_port, config.host.grpc_port);
    }

    #[test]
    fn test_default_timings() {
        let timing = TimingConfig::default();
        assert_eq!(timing.handshake_settle, Duration::from_secs(30));
        assert_eq!(timing.transfer_settle, Duration::from_secs(60));
        assert_eq!(timing.hold, Duration::from_secs(36_000));
    }

    #[test]
    fn test_relayer_image_reference() {
        assert_eq!(
            RelayerConfig::default().image_reference(),
            "ghcr.io/cosmos/relayer:v2.5.2"
        );
    }

    #[test]
    fn test_deployment_env_round_trip() {
        let deployment = Deployment {
            controller_connection_id: Some("connection-0".to_string()),
            host_connection_id: Some("connection-0".to_string()),
            code_id: Some(1),
            contract_address: Some("wasm1contract".to_string()),
            ica_address: Some("jkl1ica".to_string()),
            ica_channel_id: Some("channel-0".to_string()),
            controller_user: Some(Wallet {
                key_name: "user".to_string(),
                address: "wasm1user".to_string(),
            }),
            host_user: Some(Wallet {
                key_name: "user".to_string(),
                address: "jkl1user".to_string(),
            }),
        };

        let vars = deployment.to_env_vars();
        assert_eq!(vars.get("CONTRACT_CODE_ID").map(String::as_str), Some("1"));
        assert_eq!(Deployment::from_vars(&vars), deployment);
        assert!(deployment.is_complete());
    }

    #[test]
    fn test_partial_deployment() {
        let mut vars = HashMap::new();
        vars.insert("CONTRACT_ADDRESS".to_string(), "wasm1contract".to_string());
        vars.insert("WASMD_USER_KEY".to_string(), "user".to_string());
        vars.insert("ICA_ADDRESS".to_string(), String::new());

        let deployment = Deployment::from_vars(&vars);
        assert_eq!(deployment.contract_address.as_deref(), Some("wasm1contract"));
        // wallet needs both key and address
        assert!(deployment.controller_user.is_none());
        assert!(deployment.ica_address.is_none());
        assert!(!deployment.is_complete());
    }
}
