//! Outpost contract deployment and ICA channel handshake

use super::E2eSetup;
use crate::config::Deployment;
use crate::types::{ChannelOpenInitOptions, IcaContract, IcaInfo, InstantiateMsg};
use crate::utils::poll_for;
use eyre::{eyre, Result};
use tracing::info;

/// Instantiate message that makes the contract open its ICA channel
pub fn outpost_instantiate_msg(
    deployment: &Deployment,
    encoding: crate::types::TxEncoding,
) -> Result<InstantiateMsg> {
    let connection_id = deployment
        .controller_connection_id
        .clone()
        .ok_or_else(|| eyre!("controller connection not established"))?;
    let counterparty_connection_id = deployment
        .host_connection_id
        .clone()
        .ok_or_else(|| eyre!("host connection not established"))?;

    Ok(InstantiateMsg {
        owner: None,
        channel_open_init_options: Some(ChannelOpenInitOptions {
            connection_id,
            counterparty_connection_id,
            counterparty_port_id: None,
            tx_encoding: Some(encoding),
        }),
        send_callbacks_to: None,
    })
}

impl E2eSetup {
    /// Store and instantiate the outpost as the controller user
    pub async fn deploy_contract(&self, deployment: &Deployment) -> Result<IcaContract> {
        let user = deployment
            .controller_user
            .as_ref()
            .ok_or_else(|| eyre!("controller user not funded"))?;
        let msg = outpost_instantiate_msg(deployment, self.config.contract.encoding)?;

        let outpost = IcaContract::store_and_instantiate(
            self.network.controller.clone(),
            &user.key_name,
            &self.wasm_path(),
            &msg,
            &self.config.contract.label,
        )
        .await?;

        info!(
            "Outpost deployed at {} (code {})",
            outpost.address(),
            outpost.contract.code_id
        );
        Ok(outpost)
    }

    /// Poll the contract state until the handshake assigned an ICA address
    pub async fn wait_for_ica_channel(&self, outpost: &mut IcaContract) -> Result<IcaInfo> {
        let ica_info = {
            let contract = &*outpost;
            poll_for(
                "ICA channel handshake",
                || async move { Ok(contract.query_contract_state().await?.ica_info) },
                self.config.timing.channel_timeout,
                self.config.timing.poll_interval,
            )
            .await?
        };

        self.network.host.validate_address(&ica_info.ica_address)?;
        outpost.set_ica_address(ica_info.ica_address.clone());

        info!(
            "ICA channel {} open, interchain account {}",
            ica_info.channel_id, ica_info.ica_address
        );
        Ok(ica_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxEncoding;

    #[test]
    fn test_instantiate_msg_uses_both_connections() {
        let deployment = Deployment {
            controller_connection_id: Some("connection-0".to_string()),
            host_connection_id: Some("connection-1".to_string()),
            ..Default::default()
        };

        let msg = outpost_instantiate_msg(&deployment, TxEncoding::Protobuf).unwrap();
        let options = msg.channel_open_init_options.unwrap();
        assert_eq!(options.connection_id, "connection-0");
        assert_eq!(options.counterparty_connection_id, "connection-1");
        assert_eq!(options.tx_encoding, Some(TxEncoding::Protobuf));
        assert!(msg.owner.is_none());
    }

    #[test]
    fn test_instantiate_msg_requires_connections() {
        assert!(outpost_instantiate_msg(&Deployment::default(), TxEncoding::Protobuf).is_err());
    }
}
