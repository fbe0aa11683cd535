//! Chain specifications for the E2E networks
//!
//! Two chains are started: `wasmd` acts as the ICA controller and hosts the
//! outpost contract, `canined` (Jackal) is the ICA host that executes the
//! relayed storage and filetree messages.

use crate::genesis::modify_genesis_at_path;
use crate::types::jackal;
use eyre::{eyre, Result};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;

/// Rewrites a chain's genesis file before the chain starts
pub type GenesisModifier = Arc<dyn Fn(&ChainConfig, &[u8]) -> Result<Vec<u8>> + Send + Sync>;

/// Docker image a chain node runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerImage {
    pub repository: String,
    pub version: String,
}

impl DockerImage {
    pub fn new(repository: &str, version: &str) -> Self {
        Self {
            repository: repository.to_string(),
            version: version.to_string(),
        }
    }

    /// `repository:version` reference for `docker run`
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.version)
    }
}

/// Message types a chain binary can decode beyond the SDK defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingConfig {
    /// wasmd: CosmWasm messages
    Wasm,
    /// canined: Jackal storage and filetree messages
    Jackal,
}

impl EncodingConfig {
    pub fn registered_type_urls(&self) -> &'static [&'static str] {
        match self {
            Self::Wasm => &[
                "/cosmwasm.wasm.v1.MsgStoreCode",
                "/cosmwasm.wasm.v1.MsgInstantiateContract",
                "/cosmwasm.wasm.v1.MsgExecuteContract",
                "/cosmwasm.wasm.v1.MsgMigrateContract",
            ],
            Self::Jackal => &[
                jackal::MSG_BUY_STORAGE_TYPE_URL,
                jackal::MSG_POST_KEY_TYPE_URL,
                jackal::MSG_PROVISION_FILE_TREE_TYPE_URL,
            ],
        }
    }

    /// Fail when `type_url` is neither an SDK message nor one of this chain's
    pub fn ensure_registered(&self, type_url: &str) -> Result<()> {
        if type_url.starts_with("/cosmos.") || type_url.starts_with("/ibc.") {
            return Ok(());
        }
        if self.registered_type_urls().contains(&type_url) {
            return Ok(());
        }
        Err(eyre!(
            "message type {} is not registered in the {:?} encoding",
            type_url,
            self
        ))
    }
}

/// Static configuration for one chain
#[derive(Clone)]
pub struct ChainConfig {
    pub chain_type: String,
    pub name: String,
    pub chain_id: String,
    pub images: Vec<DockerImage>,
    pub bin: String,
    pub bech32_prefix: String,
    pub denom: String,
    pub gas_prices: String,
    pub gas_adjustment: f64,
    pub encoding: EncodingConfig,
    pub trusting_period: String,
    pub no_host_mount: bool,
    /// SDK 0.47+ nests `add-genesis-account`, `gentx` and `collect-gentxs` under `genesis`
    pub uses_genesis_subcommand: bool,
    pub modify_genesis: Option<GenesisModifier>,
}

impl ChainConfig {
    /// First configured image
    pub fn image(&self) -> Result<&DockerImage> {
        self.images
            .first()
            .ok_or_else(|| eyre!("chain {} has no docker image configured", self.name))
    }

    /// Genesis subcommand prefix for this chain's binary
    pub fn genesis_command<'a>(&self, command: &'a str) -> Vec<&'a str> {
        if self.uses_genesis_subcommand {
            vec!["genesis", command]
        } else {
            vec![command]
        }
    }
}

impl fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConfig")
            .field("chain_type", &self.chain_type)
            .field("name", &self.name)
            .field("chain_id", &self.chain_id)
            .field("images", &self.images)
            .field("bin", &self.bin)
            .field("bech32_prefix", &self.bech32_prefix)
            .field("denom", &self.denom)
            .field("gas_prices", &self.gas_prices)
            .field("gas_adjustment", &self.gas_adjustment)
            .field("encoding", &self.encoding)
            .field("trusting_period", &self.trusting_period)
            .field("no_host_mount", &self.no_host_mount)
            .field("uses_genesis_subcommand", &self.uses_genesis_subcommand)
            .field("modify_genesis", &self.modify_genesis.is_some())
            .finish()
    }
}

/// One entry of the chain table
#[derive(Debug, Clone)]
pub struct ChainSpec {
    pub chain_config: ChainConfig,
}

/// The controller (`wasmd`) and host (`canined`) chains, in that order
pub fn chain_specs() -> Vec<ChainSpec> {
    vec![
        // -- WASMD --
        ChainSpec {
            chain_config: ChainConfig {
                chain_type: "cosmos".to_string(),
                name: "wasmd".to_string(),
                chain_id: "localwasm-1".to_string(),
                images: vec![DockerImage::new("cosmwasm/wasmd", "v0.45.0")],
                bin: "wasmd".to_string(),
                bech32_prefix: "wasm".to_string(),
                denom: "uwsm".to_string(),
                gas_prices: "0.00uwsm".to_string(),
                gas_adjustment: 1.3,
                encoding: EncodingConfig::Wasm,
                trusting_period: "508h".to_string(),
                no_host_mount: false,
                uses_genesis_subcommand: true,
                modify_genesis: None,
            },
        },
        // -- CANINED --
        ChainSpec {
            chain_config: ChainConfig {
                chain_type: "cosmos".to_string(),
                name: "canined".to_string(),
                chain_id: "puppy-1".to_string(),
                images: vec![DockerImage::new("jackallabs/canined", "canary")],
                bin: "canined".to_string(),
                bech32_prefix: "jkl".to_string(),
                denom: "ujkl".to_string(),
                gas_prices: "0.00ujkl".to_string(),
                gas_adjustment: 1.3,
                encoding: EncodingConfig::Jackal,
                trusting_period: "508h".to_string(),
                no_host_mount: false,
                uses_genesis_subcommand: false,
                modify_genesis: Some(modify_genesis_at_path(genesis_allow_ica(), "app_state")),
            },
        },
    ]
}

/// `app_state` overrides enabling ICA host/controller and seeding storage params
pub fn genesis_allow_ica() -> Map<String, Value> {
    let block = json!({
        "interchainaccounts": {
            "controller_genesis_state": {
                "active_channels": [],
                "interchain_accounts": [],
                "params": {
                    "controller_enabled": true
                },
                "ports": []
            },
            "host_genesis_state": {
                "active_channels": [],
                "interchain_accounts": [],
                "params": {
                    "allow_messages": ["*"],
                    "host_enabled": true
                },
                "port": "icahost"
            }
        },
        "storage": {
            "active_providers_list": [],
            "attest_forms": [],
            "collateral_list": [],
            "file_list": [],
            "params": {
                "attestFormSize": "5",
                "attestMinToPass": "3",
                "check_window": "100",
                "chunk_size": "1024",
                "collateralPrice": "10000000000",
                // storage payments land on the Danny user
                "deposit_account": "jkl12g4qwenvpzqeakavx5adqkw203s629tf6k8vdg",
                "max_contract_age_in_blocks": "100",
                "misses_to_burn": "3",
                "price_feed": "jklprice",
                "price_per_tb_per_month": "8",
                "proof_window": "50"
            },
            "payment_info_list": [],
            "providers_list": [],
            "report_forms": []
        }
    });

    match block {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_specs_order_and_identity() {
        let specs = chain_specs();
        assert_eq!(specs.len(), 2);

        let wasmd = &specs[0].chain_config;
        assert_eq!(wasmd.name, "wasmd");
        assert_eq!(wasmd.chain_id, "localwasm-1");
        assert_eq!(wasmd.bech32_prefix, "wasm");
        assert_eq!(wasmd.denom, "uwsm");
        assert_eq!(wasmd.image().unwrap().reference(), "cosmwasm/wasmd:v0.45.0");
        assert!(wasmd.modify_genesis.is_none());

        let canined = &specs[1].chain_config;
        assert_eq!(canined.name, "canined");
        assert_eq!(canined.chain_id, "puppy-1");
        assert_eq!(canined.bech32_prefix, "jkl");
        assert_eq!(canined.denom, "ujkl");
        assert_eq!(canined.gas_prices, "0.00ujkl");
        assert_eq!(canined.image().unwrap().reference(), "jackallabs/canined:canary");
        assert!(canined.modify_genesis.is_some());
    }

    #[test]
    fn test_common_chain_settings() {
        for spec in chain_specs() {
            let config = spec.chain_config;
            assert_eq!(config.chain_type, "cosmos");
            assert_eq!(config.trusting_period, "508h");
            assert!((config.gas_adjustment - 1.3).abs() < f64::EPSILON);
            assert!(!config.no_host_mount);
            assert!(config.gas_prices.ends_with(&config.denom));
        }
    }

    #[test]
    fn test_genesis_allow_ica_params() {
        let block = Value::Object(genesis_allow_ica());
        let ica = &block["interchainaccounts"];

        assert_eq!(ica["controller_genesis_state"]["params"]["controller_enabled"], true);
        assert_eq!(ica["host_genesis_state"]["params"]["host_enabled"], true);
        assert_eq!(ica["host_genesis_state"]["params"]["allow_messages"], json!(["*"]));
        assert_eq!(ica["host_genesis_state"]["port"], "icahost");

        let storage = &block["storage"]["params"];
        assert_eq!(storage["price_per_tb_per_month"], "8");
        assert_eq!(storage["chunk_size"], "1024");
        assert_eq!(
            storage["deposit_account"],
            "jkl12g4qwenvpzqeakavx5adqkw203s629tf6k8vdg"
        );
    }

    #[test]
    fn test_genesis_command_prefix() {
        let specs = chain_specs();
        assert_eq!(
            specs[0].chain_config.genesis_command("gentx"),
            vec!["genesis", "gentx"]
        );
        assert_eq!(specs[1].chain_config.genesis_command("gentx"), vec!["gentx"]);
    }

    #[test]
    fn test_encoding_registry() {
        let jackal = EncodingConfig::Jackal;
        assert!(jackal.ensure_registered(jackal::MSG_POST_KEY_TYPE_URL).is_ok());
        assert!(jackal.ensure_registered("/cosmos.bank.v1beta1.MsgSend").is_ok());
        assert!(jackal
            .ensure_registered("/cosmwasm.wasm.v1.MsgExecuteContract")
            .is_err());

        let wasm = EncodingConfig::Wasm;
        assert!(wasm.ensure_registered(jackal::MSG_BUY_STORAGE_TYPE_URL).is_err());
    }

    #[test]
    fn test_debug_hides_modifier() {
        let specs = chain_specs();
        let debug = format!("{:?}", specs[1]);
        assert!(debug.contains("modify_genesis: true"));
    }
}
