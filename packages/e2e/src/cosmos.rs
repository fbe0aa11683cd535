//! Cosmos chain interactions for E2E testing
//!
//! Reads go through the LCD API and tendermint RPC; transactions are signed
//! by the chain binary inside the node container with the `test` keyring.

use crate::chain_config::ChainConfig;
use crate::config::{ChainEndpoints, TimingConfig};
use crate::docker::DockerHost;
use base64::Engine;
use cosmrs::AccountId;
use eyre::{eyre, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tendermint_rpc::{Client as _, HttpClient};
use tracing::{debug, info, warn};

/// Cosmos coin
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

impl Coin {
    pub fn new(amount: u128, denom: &str) -> Self {
        Self {
            denom: denom.to_string(),
            amount: amount.to_string(),
        }
    }
}

impl std::fmt::Display for Coin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Transaction response as printed by `<bin> tx ... -o json` and `<bin> q tx`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxResponse {
    pub txhash: String,
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub codespace: String,
    #[serde(default)]
    pub raw_log: String,
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub logs: Option<Vec<TxLog>>,
    #[serde(default)]
    pub events: Option<Vec<TxEvent>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxLog {
    #[serde(default)]
    pub events: Vec<TxEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxEvent {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub attributes: Vec<TxAttribute>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxAttribute {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl TxResponse {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Fail with the raw log when the chain rejected the transaction
    pub fn ensure_success(self, what: &str) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(eyre!(
            "{} failed (tx {}, codespace '{}', code {}): {}",
            what,
            self.txhash,
            self.codespace,
            self.code,
            self.raw_log
        ))
    }
}

/// Find the first `key` attribute of an `event_type` event
///
/// Looks at the ABCI message logs first, then at the flat event list.
pub fn find_event_attr(tx: &TxResponse, event_type: &str, key: &str) -> Option<String> {
    let from_logs = tx
        .logs
        .iter()
        .flatten()
        .flat_map(|log| log.events.iter());
    let flat = tx.events.iter().flatten();

    from_logs
        .chain(flat)
        .filter(|event| event.type_ == event_type)
        .flat_map(|event| event.attributes.iter())
        .find(|attr| attr.key == key)
        .map(|attr| attr.value.clone())
}

/// Extract the JSON document from CLI output that may carry a leading
/// `gas estimate: N` line
pub fn parse_tx_output(output: &str) -> Result<TxResponse> {
    let json = output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with('{'))
        .ok_or_else(|| eyre!("No JSON found in tx output: {}", output.trim()))?;

    serde_json::from_str(json).map_err(|e| eyre!("Failed to parse tx response: {}", e))
}

/// Client for one chain node
pub struct CosmosClient {
    chain: ChainConfig,
    endpoints: ChainEndpoints,
    docker: Arc<DockerHost>,
    tx_timeout: Duration,
    poll_interval: Duration,
}

impl CosmosClient {
    pub fn new(
        chain: ChainConfig,
        endpoints: ChainEndpoints,
        docker: Arc<DockerHost>,
        timing: &TimingConfig,
    ) -> Self {
        Self {
            chain,
            endpoints,
            docker,
            tx_timeout: timing.tx_timeout,
            poll_interval: timing.poll_interval,
        }
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    pub fn endpoints(&self) -> &ChainEndpoints {
        &self.endpoints
    }

    pub fn docker(&self) -> &Arc<DockerHost> {
        &self.docker
    }

    pub fn name(&self) -> &str {
        &self.chain.name
    }

    pub fn denom(&self) -> &str {
        &self.chain.denom
    }

    /// Check if the LCD answers `node_info`
    pub async fn is_healthy(&self) -> Result<bool> {
        let client = Client::new();
        let url = self
            .endpoints
            .lcd_url
            .join("cosmos/base/tendermint/v1beta1/node_info")?;

        match tokio::time::timeout(Duration::from_secs(5), client.get(url).send()).await {
            Ok(Ok(response)) => {
                if response.status().is_success() {
                    debug!("{} LCD is healthy", self.chain.name);
                    Ok(true)
                } else {
                    warn!(
                        "{} LCD returned non-OK status: {}",
                        self.chain.name,
                        response.status()
                    );
                    Ok(false)
                }
            }
            Ok(Err(e)) => {
                debug!("{} LCD request failed: {}", self.chain.name, e);
                Ok(false)
            }
            Err(_) => {
                warn!("{} LCD request timeout", self.chain.name);
                Ok(false)
            }
        }
    }

    /// Latest block height from tendermint RPC
    pub async fn get_block_height(&self) -> Result<u64> {
        let client = HttpClient::new(self.endpoints.rpc_url.as_str())
            .map_err(|e| eyre!("Invalid RPC url {}: {}", self.endpoints.rpc_url, e))?;

        let status = tokio::time::timeout(Duration::from_secs(5), client.status())
            .await
            .map_err(|_| eyre!("Timeout getting block height"))??;

        Ok(status.sync_info.latest_block_height.value())
    }

    /// Wait until the chain has produced `blocks` more blocks
    pub async fn wait_for_blocks(&self, blocks: u64, timeout: Duration) -> Result<u64> {
        let start_height = crate::utils::retry_with_backoff(
            &format!("{} block height", self.chain.name),
            || self.get_block_height(),
            10,
            Duration::from_secs(1),
        )
        .await?;
        let target = start_height + blocks;

        crate::utils::poll_for(
            &format!("{} block {}", self.chain.name, target),
            || async move {
                let height = self.get_block_height().await?;
                Ok((height >= target).then_some(height))
            },
            timeout,
            self.poll_interval,
        )
        .await
    }

    /// Smart-query a CosmWasm contract
    ///
    /// Returns the whole LCD body, i.e. the `{"data": ...}` envelope.
    pub async fn query_contract<T: DeserializeOwned>(
        &self,
        contract_address: &str,
        query: &impl Serialize,
    ) -> Result<T> {
        let client = Client::new();
        let url = self.endpoints.lcd_url.join(&format!(
            "cosmwasm/wasm/v1/contract/{}/smart",
            contract_address
        ))?;

        let query_b64 =
            base64::engine::general_purpose::STANDARD.encode(serde_json::to_vec(query)?);

        let response = tokio::time::timeout(
            Duration::from_secs(10),
            client
                .get(url.as_str())
                .query(&[("query", &query_b64)])
                .send(),
        )
        .await
        .map_err(|_| eyre!("Timeout querying contract"))??;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(eyre!("Failed to query contract: {} {}", status, body));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| eyre!("Failed to read response: {}", e))?;
        serde_json::from_str(&response_text)
            .map_err(|e| eyre!("Failed to parse query response: {}", e))
    }

    /// Get all balances for an address
    pub async fn get_all_balances(&self, address: &str) -> Result<Vec<Coin>> {
        let client = Client::new();
        let url = self
            .endpoints
            .lcd_url
            .join(&format!("cosmos/bank/v1beta1/balances/{}", address))?;

        let response = tokio::time::timeout(Duration::from_secs(5), client.get(url).send())
            .await
            .map_err(|_| eyre!("Timeout getting balances"))??;

        if !response.status().is_success() {
            return Err(eyre!("Failed to get balances: {}", response.status()));
        }

        let balances: BankBalancesResponse = response
            .json()
            .await
            .map_err(|e| eyre!("Failed to parse balances response: {}", e))?;

        Ok(balances.balances)
    }

    /// Get account balance for a denom
    pub async fn get_balance(&self, address: &str, denom: &str) -> Result<u128> {
        self.get_all_balances(address)
            .await?
            .into_iter()
            .find(|coin| coin.denom == denom)
            .map(|coin| {
                coin.amount
                    .parse()
                    .map_err(|e| eyre!("Invalid amount: {}", e))
            })
            .unwrap_or(Ok(0))
    }

    /// Parse `address` and check it carries this chain's bech32 prefix
    pub fn validate_address(&self, address: &str) -> Result<AccountId> {
        let account = AccountId::from_str(address)
            .map_err(|e| eyre!("Invalid address '{}': {}", address, e))?;
        if account.prefix() != self.chain.bech32_prefix {
            return Err(eyre!(
                "Address '{}' does not belong to {} (expected prefix '{}')",
                address,
                self.chain.name,
                self.chain.bech32_prefix
            ));
        }
        Ok(account)
    }

    /// Run the chain binary in the node container with the node home
    pub async fn exec_bin(&self, args: &[&str]) -> Result<String> {
        let mut cmd = vec![self.chain.bin.as_str()];
        cmd.extend_from_slice(args);
        cmd.extend_from_slice(&["--home", &self.endpoints.home]);

        self.docker
            .exec_in_container(&self.endpoints.container_name, &cmd)
            .await
    }

    /// Copy a host file into the node home, returning its path in the container
    pub async fn copy_to_home(&self, local_path: &Path) -> Result<String> {
        let file_name = local_path
            .file_name()
            .ok_or_else(|| eyre!("Not a file path: {}", local_path.display()))?
            .to_string_lossy();
        let container_path = format!("{}/{}", self.endpoints.home, file_name);

        self.docker
            .copy_to_container(&self.endpoints.container_name, local_path, &container_path)
            .await?;
        Ok(container_path)
    }

    /// Bech32 address of a key in the node's test keyring
    pub async fn key_address(&self, key_name: &str) -> Result<String> {
        let output = self
            .exec_bin(&["keys", "show", key_name, "-a", "--keyring-backend", "test"])
            .await?;
        Ok(output.trim().to_string())
    }

    /// Sign and broadcast a transaction, then wait for it to be included
    ///
    /// `args` are the `tx` subcommand arguments, e.g. `["bank", "send", ...]`.
    pub async fn tx(&self, from: &str, args: &[&str]) -> Result<TxResponse> {
        let gas_adjustment = self.chain.gas_adjustment.to_string();
        let mut cmd = vec!["tx"];
        cmd.extend_from_slice(args);
        cmd.extend_from_slice(&[
            "--from",
            from,
            "--keyring-backend",
            "test",
            "--chain-id",
            &self.chain.chain_id,
            "--gas",
            "auto",
            "--gas-adjustment",
            &gas_adjustment,
            "--gas-prices",
            &self.chain.gas_prices,
            "--broadcast-mode",
            "sync",
            "-y",
            "-o",
            "json",
        ]);

        info!("Submitting {} tx on {}: {:?}", args.first().unwrap_or(&""), self.chain.name, args);
        let output = self.exec_bin(&cmd).await?;

        let submitted = parse_tx_output(&output)?.ensure_success("Broadcast")?;
        debug!("Transaction submitted with hash: {}", submitted.txhash);

        self.wait_for_tx(&submitted.txhash).await
    }

    /// Poll until the transaction is included and check its result
    pub async fn wait_for_tx(&self, tx_hash: &str) -> Result<TxResponse> {
        let tx = crate::utils::poll_for(
            &format!("{} tx {}", self.chain.name, tx_hash),
            || async move {
                match self.exec_bin(&["q", "tx", tx_hash, "-o", "json"]).await {
                    Ok(output) => Ok(Some(parse_tx_output(&output)?)),
                    // not indexed yet
                    Err(_) => Ok(None),
                }
            },
            self.tx_timeout,
            self.poll_interval,
        )
        .await?;

        tx.ensure_success("Transaction")
    }

    /// Store a wasm file already present in the container; returns the code id
    pub async fn store_code(&self, from: &str, container_wasm_path: &str) -> Result<u64> {
        info!("Storing wasm code {} on {}", container_wasm_path, self.chain.name);

        let tx = self
            .tx(from, &["wasm", "store", container_wasm_path])
            .await?;

        let code_id = match find_event_attr(&tx, "store_code", "code_id") {
            Some(code_id) => code_id
                .parse()
                .map_err(|e| eyre!("Invalid code_id '{}': {}", code_id, e))?,
            None => self.get_latest_code_id().await?,
        };

        info!("Wasm code stored with code_id: {}", code_id);
        Ok(code_id)
    }

    async fn get_latest_code_id(&self) -> Result<u64> {
        let output = self
            .exec_bin(&["query", "wasm", "list-code", "-o", "json"])
            .await?;
        let json: serde_json::Value = serde_json::from_str(&output)
            .map_err(|e| eyre!("Failed to parse list-code response: {}", e))?;

        json["code_infos"]
            .as_array()
            .and_then(|arr| arr.last())
            .and_then(|info| {
                info["code_id"]
                    .as_str()
                    .and_then(|s| s.parse::<u64>().ok())
                    .or_else(|| info["code_id"].as_u64())
            })
            .ok_or_else(|| eyre!("No code_id found in list-code response"))
    }

    /// Instantiate a stored code; returns the contract address
    pub async fn instantiate_contract(
        &self,
        from: &str,
        code_id: u64,
        init_msg: &str,
        label: &str,
        admin: Option<&str>,
    ) -> Result<String> {
        info!(
            "Instantiating code {} on {} with label '{}'",
            code_id, self.chain.name, label
        );

        let code_id_str = code_id.to_string();
        let mut args = vec![
            "wasm",
            "instantiate",
            code_id_str.as_str(),
            init_msg,
            "--label",
            label,
        ];
        match admin {
            Some(admin) => args.extend(["--admin", admin]),
            None => args.push("--no-admin"),
        }

        let tx = self.tx(from, &args).await?;
        let address = match find_event_attr(&tx, "instantiate", "_contract_address") {
            Some(address) => address,
            None => self.get_contract_by_code_id(code_id).await?,
        };

        info!("Contract instantiated at: {}", address);
        Ok(address)
    }

    async fn get_contract_by_code_id(&self, code_id: u64) -> Result<String> {
        let output = self
            .exec_bin(&[
                "query",
                "wasm",
                "list-contract-by-code",
                &code_id.to_string(),
                "-o",
                "json",
            ])
            .await?;
        let json: serde_json::Value = serde_json::from_str(&output)
            .map_err(|e| eyre!("Failed to parse list-contract-by-code response: {}", e))?;

        json["contracts"]
            .as_array()
            .and_then(|arr| arr.last())
            .and_then(|addr| addr.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| eyre!("No contract found for code_id {}", code_id))
    }

    /// Execute a contract message
    pub async fn execute_contract(
        &self,
        from: &str,
        contract_address: &str,
        msg: &str,
        extra_args: &[&str],
    ) -> Result<TxResponse> {
        info!("Executing contract message on: {}", contract_address);
        debug!("Execute msg: {}", msg);

        let mut args = vec!["wasm", "execute", contract_address, msg];
        args.extend_from_slice(extra_args);
        self.tx(from, &args).await
    }

    /// Bank send from a keyring key
    pub async fn bank_send(&self, from: &str, to: &str, amount: &Coin) -> Result<TxResponse> {
        info!("Sending {} to {} on {}", amount, to, self.chain.name);
        let from_address = self.key_address(from).await?;
        let amount = amount.to_string();
        self.tx(from, &["bank", "send", &from_address, to, &amount])
            .await
    }

    /// ICS-20 transfer over `port`/`channel`
    pub async fn ibc_transfer(
        &self,
        from: &str,
        port: &str,
        channel: &str,
        receiver: &str,
        amount: &Coin,
    ) -> Result<TxResponse> {
        info!(
            "IBC transfer of {} from {} over {}/{} to {}",
            amount, self.chain.name, port, channel, receiver
        );
        let amount = amount.to_string();
        self.tx(
            from,
            &["ibc-transfer", "transfer", port, channel, receiver, &amount],
        )
        .await
    }
}

// --- Response Types ---

#[derive(Debug, Clone, serde::Deserialize)]
struct BankBalancesResponse {
    balances: Vec<Coin>,
}
