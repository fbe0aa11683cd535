//! Chain node lifecycle
//!
//! A node is a container started with a `sleep` entrypoint; the chain binary
//! is then initialised, its genesis assembled and patched, and the daemon
//! started in the background with `docker exec -d`.

use crate::config::{FundingConfig, Wallet};
use crate::cosmos::{Coin, CosmosClient};
use crate::docker::ContainerSpec;
use eyre::{eyre, Result};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Ports the daemon listens on inside the container
pub const CONTAINER_RPC_PORT: u16 = 26657;
pub const CONTAINER_LCD_PORT: u16 = 1317;
pub const CONTAINER_GRPC_PORT: u16 = 9090;

pub const VALIDATOR_KEY: &str = "validator";
pub const FAUCET_KEY: &str = "faucet";

/// Denom `init` writes into a fresh genesis
const DEFAULT_GENESIS_DENOM: &str = "stake";

/// Output of `keys add --output json`
#[derive(Debug, Clone, Deserialize)]
pub struct KeyInfo {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub mnemonic: String,
}

/// Parse `keys add` output
///
/// SDK 0.45 binaries print the JSON on stderr, newer ones on stdout.
pub fn parse_key_output(stdout: &str, stderr: &str) -> Result<KeyInfo> {
    [stdout, stderr]
        .iter()
        .flat_map(|out| out.lines())
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str::<KeyInfo>(line).ok())
        .ok_or_else(|| eyre!("No key JSON in keys add output: {} {}", stdout.trim(), stderr.trim()))
}

/// Keys funded in a node's genesis
#[derive(Debug, Clone)]
pub struct GenesisWallets {
    pub validator: KeyInfo,
    pub faucet: KeyInfo,
    pub relayer: KeyInfo,
}

/// Replace every string value equal to `from` with `to`
pub fn replace_denom(value: &mut Value, from: &str, to: &str) {
    match value {
        Value::String(s) if s.as_str() == from => *s = to.to_string(),
        Value::Array(items) => items.iter_mut().for_each(|v| replace_denom(v, from, to)),
        Value::Object(map) => map.values_mut().for_each(|v| replace_denom(v, from, to)),
        _ => {}
    }
}

/// `sed` scripts applied to `config/config.toml`
pub fn config_toml_patches() -> Vec<String> {
    vec![
        format!(
            r#"s|laddr = "tcp://127.0.0.1:{0}"|laddr = "tcp://0.0.0.0:{0}"|"#,
            CONTAINER_RPC_PORT
        ),
        r#"s|timeout_commit = "5s"|timeout_commit = "1s"|"#.to_string(),
        r#"s|timeout_propose = "3s"|timeout_propose = "1s"|"#.to_string(),
        r#"s|allow_duplicate_ip = false|allow_duplicate_ip = true|"#.to_string(),
    ]
}

/// `sed` scripts applied to `config/app.toml`
pub fn app_toml_patches(denom: &str) -> Vec<String> {
    vec![
        r#"/\[api\]/,/\[/ s|^enable = false|enable = true|"#.to_string(),
        format!(
            r#"s|address = "tcp://localhost:{0}"|address = "tcp://0.0.0.0:{0}"|"#,
            CONTAINER_LCD_PORT
        ),
        format!(
            r#"s|address = "localhost:{0}"|address = "0.0.0.0:{0}"|"#,
            CONTAINER_GRPC_PORT
        ),
        format!(r#"s|minimum-gas-prices = ""|minimum-gas-prices = "0{}"|"#, denom),
    ]
}

/// One chain node running in its own container
pub struct ChainNode {
    client: Arc<CosmosClient>,
}

impl ChainNode {
    pub fn new(client: Arc<CosmosClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<CosmosClient> {
        &self.client
    }

    fn container(&self) -> &str {
        &self.client.endpoints().container_name
    }

    fn home(&self) -> &str {
        &self.client.endpoints().home
    }

    /// Start the container without the daemon
    pub async fn launch(&self) -> Result<()> {
        let chain = self.client.chain();
        let endpoints = self.client.endpoints();

        let spec = ContainerSpec {
            name: endpoints.container_name.clone(),
            image: chain.image()?.reference(),
            entrypoint: Some("sleep".to_string()),
            cmd: vec!["infinity".to_string()],
            ports: vec![
                (endpoints.rpc_port(), CONTAINER_RPC_PORT),
                (endpoints.lcd_port(), CONTAINER_LCD_PORT),
                (endpoints.grpc_port, CONTAINER_GRPC_PORT),
            ],
            env: vec![],
            user: Some("root".to_string()),
        };

        self.client.docker().run_container(&spec).await?;
        Ok(())
    }

    /// `<bin> init` with the chain id
    pub async fn init(&self) -> Result<()> {
        let chain = self.client.chain();
        info!("Initialising {} ({})", chain.name, chain.chain_id);

        let moniker = format!("{}-val", chain.name);
        self.client
            .exec_bin(&["init", &moniker, "--chain-id", &chain.chain_id])
            .await?;
        Ok(())
    }

    /// Create a key in the node's test keyring
    pub async fn create_key(&self, key_name: &str) -> Result<KeyInfo> {
        let bin = self.client.chain().bin.as_str();
        let output = self
            .client
            .docker()
            .exec(
                self.container(),
                &[
                    bin,
                    "keys",
                    "add",
                    key_name,
                    "--keyring-backend",
                    "test",
                    "--output",
                    "json",
                    "--home",
                    self.home(),
                ],
            )
            .await?;

        if !output.success {
            return Err(eyre!(
                "Failed to create key '{}' on {}: {}",
                key_name,
                self.client.name(),
                output.stderr.trim()
            ));
        }

        let key = parse_key_output(&output.stdout, &output.stderr)?;
        self.client.validate_address(&key.address)?;
        debug!("Created key '{}' with address {}", key.name, key.address);
        Ok(key)
    }

    pub async fn add_genesis_account(&self, address: &str, amount: &Coin) -> Result<()> {
        let chain = self.client.chain();
        let amount = amount.to_string();

        let mut args = chain.genesis_command("add-genesis-account");
        args.extend([address, amount.as_str()]);
        self.client.exec_bin(&args).await?;
        Ok(())
    }

    /// Swap the default denom and apply the chain's genesis modifier
    pub async fn modify_genesis(&self) -> Result<()> {
        let chain = self.client.chain();
        let path = format!("{}/config/genesis.json", self.home());
        let docker = self.client.docker();

        let genesis = docker.read_file(self.container(), &path).await?;
        let mut doc: Value = serde_json::from_slice(&genesis)
            .map_err(|e| eyre!("failed to unmarshal genesis file: {}", e))?;
        replace_denom(&mut doc, DEFAULT_GENESIS_DENOM, &chain.denom);
        let mut genesis = serde_json::to_vec_pretty(&doc)?;

        if let Some(modify) = &chain.modify_genesis {
            info!("Applying genesis modifications for {}", chain.name);
            genesis = modify(chain, &genesis)?;
        }

        docker.write_file(self.container(), &path, &genesis).await
    }

    pub async fn gentx(&self, key_name: &str, stake: &Coin) -> Result<()> {
        let chain = self.client.chain();
        let stake = stake.to_string();

        let mut args = chain.genesis_command("gentx");
        args.extend([
            key_name,
            stake.as_str(),
            "--chain-id",
            chain.chain_id.as_str(),
            "--keyring-backend",
            "test",
        ]);
        self.client.exec_bin(&args).await?;
        Ok(())
    }

    pub async fn collect_gentxs(&self) -> Result<()> {
        let args = self.client.chain().genesis_command("collect-gentxs");
        self.client.exec_bin(&args).await?;
        Ok(())
    }

    /// Open RPC/API/gRPC to the network, shorten block times, set gas prices
    pub async fn configure(&self) -> Result<()> {
        let config_dir = format!("{}/config", self.home());
        self.sed(&format!("{}/config.toml", config_dir), &config_toml_patches())
            .await?;
        self.sed(
            &format!("{}/app.toml", config_dir),
            &app_toml_patches(&self.client.chain().denom),
        )
        .await
    }

    async fn sed(&self, file: &str, scripts: &[String]) -> Result<()> {
        let mut cmd = vec!["sed", "-i"];
        for script in scripts {
            cmd.extend(["-e", script.as_str()]);
        }
        cmd.push(file);

        self.client
            .docker()
            .exec_in_container(self.container(), &cmd)
            .await?;
        Ok(())
    }

    /// Start the daemon in the background, logging to `<home>/node.log`
    pub async fn start(&self) -> Result<()> {
        let chain = self.client.chain();
        info!("Starting {} daemon", chain.name);

        let start = format!(
            "{bin} start --home {home} > {home}/node.log 2>&1",
            bin = chain.bin,
            home = self.home()
        );
        self.client
            .docker()
            .exec_detached(self.container(), &["sh", "-c", &start])
            .await
    }

    /// Build a single-validator genesis and start the daemon
    ///
    /// The validator, the faucet and the relayer key each get
    /// `genesis_amount` at genesis.
    pub async fn bootstrap(
        &self,
        funding: &FundingConfig,
        relayer_key: &str,
    ) -> Result<GenesisWallets> {
        let denom = self.client.denom().to_string();

        self.launch().await?;
        self.init().await?;
        self.modify_genesis().await?;

        let validator = self.create_key(VALIDATOR_KEY).await?;
        let faucet = self.create_key(FAUCET_KEY).await?;
        let relayer = self.create_key(relayer_key).await?;

        let genesis_coin = Coin::new(funding.genesis_amount, &denom);
        for key in [&validator, &faucet, &relayer] {
            self.add_genesis_account(&key.address, &genesis_coin).await?;
        }

        self.gentx(VALIDATOR_KEY, &Coin::new(funding.validator_stake, &denom))
            .await?;
        self.collect_gentxs().await?;
        self.configure().await?;
        self.start().await?;

        Ok(GenesisWallets {
            validator,
            faucet,
            relayer,
        })
    }

    /// New keyring user funded from the faucet
    pub async fn create_funded_user(&self, key_name: &str, amount: u128) -> Result<Wallet> {
        let key = self.create_key(key_name).await?;
        self.client
            .bank_send(FAUCET_KEY, &key.address, &Coin::new(amount, self.client.denom()))
            .await?;

        info!(
            "Funded {} user '{}' at {} with {}{}",
            self.client.name(),
            key.name,
            key.address,
            amount,
            self.client.denom()
        );
        Ok(Wallet {
            key_name: key.name,
            address: key.address,
        })
    }

    /// Wait for the LCD to answer and two blocks to be produced
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<u64> {
        let client = self.client.clone();
        crate::utils::poll_until(
            &format!("{} LCD", client.name()),
            || {
                let client = client.clone();
                async move { client.is_healthy().await }
            },
            timeout,
            Duration::from_secs(2),
        )
        .await?;

        self.client.wait_for_blocks(2, timeout).await
    }

    /// Last lines of the daemon log
    pub async fn tail_logs(&self, lines: usize) -> Result<String> {
        let log = format!("{}/node.log", self.home());
        let lines = lines.to_string();
        self.client
            .docker()
            .exec_in_container(self.container(), &["tail", "-n", &lines, &log])
            .await
    }

    /// One-line description for logs
    pub fn describe(&self) -> String {
        let chain = self.client.chain();
        let endpoints = self.client.endpoints();
        format!(
            "{} ({}) container={} rpc={} lcd={}",
            chain.name, chain.chain_id, endpoints.container_name, endpoints.rpc_url, endpoints.lcd_url
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_key_output_from_stdout() {
        let stdout = r#"{"name":"user","type":"local","address":"wasm1abc","pubkey":"{}","mnemonic":"word word"}"#;
        let key = parse_key_output(stdout, "").unwrap();
        assert_eq!(key.name, "user");
        assert_eq!(key.address, "wasm1abc");
        assert_eq!(key.mnemonic, "word word");
    }

    #[test]
    fn test_parse_key_output_from_stderr() {
        let stderr = "\n{\"name\":\"relayer\",\"type\":\"local\",\"address\":\"jkl1abc\",\"pubkey\":\"{}\",\"mnemonic\":\"a b c\"}\n";
        let key = parse_key_output("", stderr).unwrap();
        assert_eq!(key.address, "jkl1abc");
        assert_eq!(key.mnemonic, "a b c");
    }

    #[test]
    fn test_parse_key_output_missing() {
        assert!(parse_key_output("", "Error: aborted").is_err());
    }

    #[test]
    fn test_replace_denom() {
        let mut genesis = json!({
            "app_state": {
                "staking": { "params": { "bond_denom": "stake" } },
                "gov": { "deposit_params": { "min_deposit": [ { "denom": "stake", "amount": "10000000" } ] } },
                "bank": { "denom_metadata": [], "note": "stakeholder" }
            }
        });

        replace_denom(&mut genesis, "stake", "ujkl");

        assert_eq!(genesis["app_state"]["staking"]["params"]["bond_denom"], "ujkl");
        assert_eq!(
            genesis["app_state"]["gov"]["deposit_params"]["min_deposit"][0]["denom"],
            "ujkl"
        );
        // only exact matches are replaced
        assert_eq!(genesis["app_state"]["bank"]["note"], "stakeholder");
    }

    #[test]
    fn test_config_patches() {
        let config = config_toml_patches();
        assert!(config[0].contains(r#"laddr = "tcp://0.0.0.0:26657""#));

        let app = app_toml_patches("uwsm");
        assert!(app[0].contains("enable = true"));
        assert!(app.iter().any(|s| s.contains(r#"address = "tcp://0.0.0.0:1317""#)));
        assert!(app.last().unwrap().ends_with(r#"minimum-gas-prices = "0uwsm"|"#));
    }
}
