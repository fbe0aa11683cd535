//! Test helper functions for E2E tests
//!
//! Shared context for the scenarios (network handles, the deployed outpost
//! and the funded users) plus packet send/acknowledgement helpers.

use crate::chain_config::EncodingConfig;
use crate::config::{E2eConfig, Wallet};
use crate::ibc::TRANSFER_PORT;
use crate::network::Network;
use crate::types::jackal::HostMsg;
use crate::types::{Contract, ExecuteMsg, IcaContract, IcaContractCallbackCounter};
use crate::utils::poll_for;
use eyre::{eyre, Result};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Transfer channel id used when the relayer cannot report it
pub const DEFAULT_TRANSFER_CHANNEL: &str = "channel-1";

/// Everything a scenario needs from a completed setup
pub struct TestContext {
    pub config: E2eConfig,
    pub network: Network,
    pub outpost: IcaContract,
    pub controller_user: Wallet,
    pub host_user: Wallet,
    pub controller_connection_id: String,
    pub host_connection_id: String,
}

/// Both ends of the ICS-20 channel between the chains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferChannels {
    pub controller: String,
    pub host: String,
}

impl Default for TransferChannels {
    fn default() -> Self {
        Self {
            controller: DEFAULT_TRANSFER_CHANNEL.to_string(),
            host: DEFAULT_TRANSFER_CHANNEL.to_string(),
        }
    }
}

impl TestContext {
    /// Build the context from the deployment exported by `setup`
    pub fn from_config(config: &E2eConfig) -> Result<Self> {
        let deployment = &config.deployment;
        let missing = |what: &str| eyre!("{} missing, run setup first", what);

        let contract_address = deployment
            .contract_address
            .clone()
            .ok_or_else(|| missing("CONTRACT_ADDRESS"))?;
        let ica_address = deployment
            .ica_address
            .clone()
            .ok_or_else(|| missing("ICA_ADDRESS"))?;
        let controller_user = deployment
            .controller_user
            .clone()
            .ok_or_else(|| missing("WASMD_USER_ADDRESS"))?;
        let host_user = deployment
            .host_user
            .clone()
            .ok_or_else(|| missing("CANINED_USER_ADDRESS"))?;
        let controller_connection_id = deployment
            .controller_connection_id
            .clone()
            .ok_or_else(|| missing("CONTROLLER_CONNECTION_ID"))?;
        let host_connection_id = deployment
            .host_connection_id
            .clone()
            .ok_or_else(|| missing("HOST_CONNECTION_ID"))?;

        let network = Network::from_config(config)?;
        let contract = Contract::new(
            contract_address,
            deployment.code_id.unwrap_or_default(),
            network.controller.clone(),
        );
        let mut outpost = IcaContract::new(contract);
        outpost.set_ica_address(ica_address);

        Ok(Self {
            config: config.clone(),
            network,
            outpost,
            controller_user,
            host_user,
            controller_connection_id,
            host_connection_id,
        })
    }

    pub fn ica_address(&self) -> &str {
        &self.outpost.ica_address
    }

    /// Look up the open transfer channel through the relayer
    pub async fn transfer_channels(&self) -> TransferChannels {
        let channels = match self
            .network
            .relayer
            .query_channels(self.network.host.chain())
            .await
        {
            Ok(channels) => channels,
            Err(e) => {
                warn!("Could not list host channels, assuming defaults: {}", e);
                return TransferChannels::default();
            }
        };

        channels
            .into_iter()
            .find(|c| c.port_id == TRANSFER_PORT && c.is_open())
            .map(|c| TransferChannels {
                controller: c.counterparty.channel_id,
                host: c.channel_id,
            })
            .unwrap_or_else(|| {
                warn!("No open transfer channel on the host, assuming defaults");
                TransferChannels::default()
            })
    }
}

/// Wrap `msg` for the outpost, refusing types the host chain cannot decode
pub fn host_msg_for<M: HostMsg>(encoding: &EncodingConfig, msg: &M) -> Result<ExecuteMsg> {
    encoding.ensure_registered(M::TYPE_URL)?;
    Ok(ExecuteMsg::send_host_msg(msg))
}

/// Send one host message through the outpost and wait for its acknowledgement
pub async fn send_and_confirm<M: HostMsg>(
    ctx: &TestContext,
    msg: &M,
    what: &str,
) -> Result<IcaContractCallbackCounter> {
    let execute = host_msg_for(&ctx.network.host.chain().encoding, msg)?;

    let before = ctx.outpost.query_callback_counter().await?;
    debug!("Callback counter before {}: {:?}", what, before);

    let tx = ctx
        .outpost
        .execute(&ctx.controller_user.key_name, &execute, &[])
        .await?
        .ensure_success(what)?;
    info!("{} sent in tx {}", what, tx.txhash);

    wait_for_ack(ctx, before, what).await
}

/// Poll the callback counter until the packet was acknowledged
pub async fn wait_for_ack(
    ctx: &TestContext,
    before: IcaContractCallbackCounter,
    what: &str,
) -> Result<IcaContractCallbackCounter> {
    let outpost = &ctx.outpost;
    let after = poll_for(
        &format!("acknowledgement of {}", what),
        || async move {
            let counter = outpost.query_callback_counter().await?;
            Ok((counter.total() > before.total()).then_some(counter))
        },
        ctx.config.timing.ack_timeout,
        ctx.config.timing.poll_interval,
    )
    .await?;

    check_ack(&before, &after, what)?;
    info!("{} acknowledged by the host", what);
    Ok(after)
}

/// Classify the callback that moved the counter
pub fn check_ack(
    before: &IcaContractCallbackCounter,
    after: &IcaContractCallbackCounter,
    what: &str,
) -> Result<()> {
    if after.error > before.error {
        return Err(eyre!("{} was rejected by the host (error acknowledgement)", what));
    }
    if after.timeout > before.timeout {
        return Err(eyre!("{} timed out before reaching the host", what));
    }
    Ok(())
}

/// Keep the network up for manual inspection
pub async fn hold_network(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    info!(
        "Holding the network for {:?}; interrupt to stop early",
        duration
    );
    tokio::time::sleep(duration).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Deployment;
    use crate::types::jackal::{MsgPostKey, MSG_POST_KEY_TYPE_URL};

    fn counter(success: u64, error: u64, timeout: u64) -> IcaContractCallbackCounter {
        IcaContractCallbackCounter {
            success,
            error,
            timeout,
        }
    }

    #[test]
    fn test_check_ack() {
        let before = counter(1, 0, 0);
        assert!(check_ack(&before, &counter(2, 0, 0), "MsgPostKey").is_ok());

        let err = check_ack(&before, &counter(1, 1, 0), "MsgPostKey").unwrap_err();
        assert!(err.to_string().contains("rejected"));

        let err = check_ack(&before, &counter(1, 0, 1), "MsgPostKey").unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_host_msg_for_checks_host_encoding() {
        let post_key = MsgPostKey {
            creator: "jkl1ica".to_string(),
            key: "key".to_string(),
        };

        let msg = host_msg_for(&EncodingConfig::Jackal, &post_key).unwrap();
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json["send_cosmos_msgs"]["messages"][0]["stargate"]["type_url"],
            MSG_POST_KEY_TYPE_URL
        );

        let err = host_msg_for(&EncodingConfig::Wasm, &post_key).unwrap_err();
        assert!(err.to_string().contains("not registered"));
    }

    #[test]
    fn test_context_requires_deployment() {
        let config = E2eConfig {
            deployment: Deployment {
                contract_address: Some("wasm1outpost".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = TestContext::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("ICA_ADDRESS"));
    }

    #[test]
    fn test_default_transfer_channels() {
        let channels = TransferChannels::default();
        assert_eq!(channels.controller, DEFAULT_TRANSFER_CHANNEL);
        assert_eq!(channels.host, DEFAULT_TRANSFER_CHANNEL);
    }

    #[tokio::test]
    async fn test_hold_zero_returns_immediately() {
        let start = std::time::Instant::now();
        hold_network(Duration::ZERO).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
