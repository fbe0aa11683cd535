//! Go relayer (`rly`) running in its own container
//!
//! The relayer reaches the chain nodes over the docker network by container
//! name; its keys are restored from mnemonics generated on the nodes.

use crate::chain_config::ChainConfig;
use crate::config::{ChainEndpoints, RelayerConfig};
use crate::docker::{ContainerSpec, DockerHost};
use crate::node::CONTAINER_RPC_PORT;
use eyre::{eyre, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Connection end as printed by `rly q connections`
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionInfo {
    pub id: String,
    pub client_id: String,
    pub state: String,
    pub counterparty: ConnectionCounterparty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionCounterparty {
    pub client_id: String,
    #[serde(default)]
    pub connection_id: String,
}

/// Channel end as printed by `rly q channels`
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelInfo {
    pub state: String,
    pub ordering: String,
    pub port_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub connection_hops: Vec<String>,
    #[serde(default)]
    pub version: String,
    pub counterparty: ChannelCounterparty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelCounterparty {
    pub port_id: String,
    #[serde(default)]
    pub channel_id: String,
}

pub const STATE_OPEN: &str = "STATE_OPEN";

impl ConnectionInfo {
    pub fn is_open(&self) -> bool {
        self.state == STATE_OPEN
    }
}

impl ChannelInfo {
    pub fn is_open(&self) -> bool {
        self.state == STATE_OPEN
    }
}

/// Parse `rly` query output: one JSON object per line
///
/// Lines that are not JSON objects (log noise) are skipped.
pub fn parse_json_lines<T: DeserializeOwned>(output: &str) -> Result<Vec<T>> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .map(|line| {
            serde_json::from_str(line).map_err(|e| eyre!("Failed to parse rly output line: {}", e))
        })
        .collect()
}

/// `rly` chain configuration for `rly chains add --file`
pub fn chain_file(chain: &ChainConfig, endpoints: &ChainEndpoints, key_name: &str) -> serde_json::Value {
    json!({
        "type": chain.chain_type,
        "value": {
            "key": key_name,
            "chain-id": chain.chain_id,
            "rpc-addr": format!("http://{}:{}", endpoints.container_name, CONTAINER_RPC_PORT),
            "account-prefix": chain.bech32_prefix,
            "keyring-backend": "test",
            "gas-adjustment": chain.gas_adjustment,
            "gas-prices": chain.gas_prices,
            "min-gas-amount": 0,
            "debug": true,
            "timeout": "20s",
            "output-format": "json",
            "sign-mode": "direct",
            "trusting-period": chain.trusting_period,
        }
    })
}

/// Relayer container linking the controller and host chains
pub struct Relayer {
    docker: Arc<DockerHost>,
    config: RelayerConfig,
}

impl Relayer {
    pub fn new(docker: Arc<DockerHost>, config: RelayerConfig) -> Self {
        Self { docker, config }
    }

    pub fn config(&self) -> &RelayerConfig {
        &self.config
    }

    async fn rly(&self, args: &[&str]) -> Result<String> {
        let mut cmd = vec!["rly"];
        cmd.extend_from_slice(args);
        cmd.extend_from_slice(&["--home", &self.config.home]);

        self.docker
            .exec_in_container(&self.config.container_name, &cmd)
            .await
    }

    /// Start the container and write an empty `rly` config
    pub async fn launch(&self) -> Result<()> {
        let spec = ContainerSpec {
            name: self.config.container_name.clone(),
            image: self.config.image_reference(),
            entrypoint: Some("sleep".to_string()),
            cmd: vec!["infinity".to_string()],
            user: Some("root".to_string()),
            ..Default::default()
        };
        self.docker.run_container(&spec).await?;

        self.rly(&["config", "init"]).await?;
        Ok(())
    }

    /// Register a chain and restore the relayer key for it
    pub async fn add_chain(
        &self,
        chain: &ChainConfig,
        endpoints: &ChainEndpoints,
        mnemonic: &str,
    ) -> Result<()> {
        info!("Adding {} to the relayer", chain.name);

        let file = chain_file(chain, endpoints, &self.config.key_name);
        let path = format!("{}/{}.json", self.config.home, chain.name);
        self.docker
            .write_file(
                &self.config.container_name,
                &path,
                serde_json::to_string_pretty(&file)?.as_bytes(),
            )
            .await?;

        self.rly(&["chains", "add", "--file", &path, &chain.name])
            .await?;

        let address = self
            .rly(&["keys", "restore", &chain.name, &self.config.key_name, mnemonic])
            .await?;
        debug!("Restored relayer key on {}: {}", chain.name, address.trim());
        Ok(())
    }

    /// Create a path, IBC clients and a connection between the two chains
    pub async fn link(&self, controller: &ChainConfig, host: &ChainConfig) -> Result<()> {
        let path = self.config.path_name.as_str();
        info!(
            "Linking {} and {} over path '{}'",
            controller.chain_id, host.chain_id, path
        );

        self.rly(&["paths", "new", &controller.chain_id, &host.chain_id, path])
            .await?;
        self.rly(&["tx", "clients", path]).await?;
        self.rly(&["tx", "connection", path]).await?;
        Ok(())
    }

    pub async fn query_connections(&self, chain: &ChainConfig) -> Result<Vec<ConnectionInfo>> {
        let output = self.rly(&["q", "connections", &chain.name]).await?;
        parse_json_lines(&output)
    }

    pub async fn query_channels(&self, chain: &ChainConfig) -> Result<Vec<ChannelInfo>> {
        let output = self.rly(&["q", "channels", &chain.name]).await?;
        parse_json_lines(&output)
    }

    /// First open connection of `chain`
    pub async fn open_connection(&self, chain: &ChainConfig) -> Result<ConnectionInfo> {
        self.query_connections(chain)
            .await?
            .into_iter()
            .find(ConnectionInfo::is_open)
            .ok_or_else(|| eyre!("No open connection on {}", chain.name))
    }

    /// Relay packets in the background, logging to `<home>/rly.log`
    pub async fn start(&self) -> Result<()> {
        info!("Starting relayer on path '{}'", self.config.path_name);

        let start = format!(
            "rly start {path} --home {home} > {home}/rly.log 2>&1",
            path = self.config.path_name,
            home = self.config.home
        );
        self.docker
            .exec_detached(&self.config.container_name, &["sh", "-c", &start])
            .await
    }

    pub async fn is_running(&self) -> bool {
        if !self.docker.is_running(&self.config.container_name).await {
            return false;
        }
        match self
            .docker
            .exec(&self.config.container_name, &["pgrep", "-f", "rly start"])
            .await
        {
            Ok(output) => output.success,
            Err(e) => {
                warn!("Failed to check relayer process: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain_config::chain_specs;

    const CONNECTIONS: &str = r#"{"id":"connection-0","client_id":"07-tendermint-0","versions":[{"identifier":"1","features":["ORDER_ORDERED","ORDER_UNORDERED"]}],"state":"STATE_OPEN","counterparty":{"client_id":"07-tendermint-0","connection_id":"connection-0","prefix":{"key_prefix":"aWJj"}},"delay_period":"0"}
{"id":"connection-1","client_id":"07-tendermint-1","versions":[],"state":"STATE_INIT","counterparty":{"client_id":"07-tendermint-1","prefix":{"key_prefix":"aWJj"}},"delay_period":"0"}
"#;

    #[test]
    fn test_parse_connections() {
        let connections: Vec<ConnectionInfo> = parse_json_lines(CONNECTIONS).unwrap();
        assert_eq!(connections.len(), 2);
        assert_eq!(connections[0].id, "connection-0");
        assert!(connections[0].is_open());
        assert_eq!(connections[0].counterparty.connection_id, "connection-0");
        assert!(!connections[1].is_open());
        assert_eq!(connections[1].counterparty.connection_id, "");
    }

    #[test]
    fn test_parse_channels_skips_log_lines() {
        let output = "2024-01-01T00:00:00Z info querying\n{\"state\":\"STATE_OPEN\",\"ordering\":\"ORDER_ORDERED\",\"counterparty\":{\"port_id\":\"icahost\",\"channel_id\":\"channel-0\"},\"connection_hops\":[\"connection-0\"],\"version\":\"ics27-1\",\"port_id\":\"wasm.wasm1contract\",\"channel_id\":\"channel-0\"}\n";
        let channels: Vec<ChannelInfo> = parse_json_lines(output).unwrap();
        assert_eq!(channels.len(), 1);
        assert!(channels[0].is_open());
        assert_eq!(channels[0].counterparty.port_id, "icahost");
        assert_eq!(channels[0].connection_hops, vec!["connection-0"]);
    }

    #[test]
    fn test_parse_json_lines_empty() {
        let connections: Vec<ConnectionInfo> = parse_json_lines("").unwrap();
        assert!(connections.is_empty());
    }

    #[test]
    fn test_chain_file() {
        let specs = chain_specs();
        let host = &specs[1].chain_config;
        let file = chain_file(host, &ChainEndpoints::canined_default(), "relayer");

        assert_eq!(file["type"], "cosmos");
        assert_eq!(file["value"]["chain-id"], "puppy-1");
        assert_eq!(file["value"]["rpc-addr"], "http://outpost-e2e-canined:26657");
        assert_eq!(file["value"]["account-prefix"], "jkl");
        assert_eq!(file["value"]["gas-prices"], "0.00ujkl");
        assert_eq!(file["value"]["trusting-period"], "508h");
    }
}
