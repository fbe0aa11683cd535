//! Chain bring-up, IBC linking and user funding

use super::{ChainWallets, E2eSetup};
use crate::config::Wallet;
use crate::node::GenesisWallets;
use eyre::{eyre, Result};
use std::time::Duration;
use tracing::info;

/// Key name of the test user created on each chain
pub const USER_KEY: &str = "user";

impl E2eSetup {
    /// Bootstrap both nodes concurrently
    pub async fn start_chains(&self) -> Result<ChainWallets> {
        let controller = self.network.controller_node();
        let host = self.network.host_node();
        let funding = &self.config.funding;
        let relayer_key = &self.config.relayer.key_name;

        info!("Starting {} and {}", controller.describe(), host.describe());
        tokio::try_join!(
            controller.bootstrap(funding, relayer_key),
            host.bootstrap(funding, relayer_key),
        )
    }

    pub async fn wait_for_chains(&self, timeout: Duration) -> Result<()> {
        let controller = self.network.controller_node();
        let host = self.network.host_node();

        let (controller_height, host_height) = tokio::try_join!(
            controller.wait_until_ready(timeout),
            host.wait_until_ready(timeout),
        )?;

        info!(
            "Chains producing blocks: {} at {}, {} at {}",
            self.network.controller.name(),
            controller_height,
            self.network.host.name(),
            host_height
        );
        Ok(())
    }

    /// Create clients and a connection; returns `(controller, host)` connection ids
    pub async fn link_chains(
        &self,
        controller_wallets: &GenesisWallets,
        host_wallets: &GenesisWallets,
    ) -> Result<(String, String)> {
        let relayer = &self.network.relayer;
        let controller = &self.network.controller;
        let host = &self.network.host;

        relayer.launch().await?;
        relayer
            .add_chain(
                controller.chain(),
                controller.endpoints(),
                &controller_wallets.relayer.mnemonic,
            )
            .await?;
        relayer
            .add_chain(host.chain(), host.endpoints(), &host_wallets.relayer.mnemonic)
            .await?;

        relayer.link(controller.chain(), host.chain()).await?;

        let connection = relayer.open_connection(controller.chain()).await?;
        if connection.counterparty.connection_id.is_empty() {
            return Err(eyre!(
                "Connection {} on {} has no counterparty connection",
                connection.id,
                controller.name()
            ));
        }

        info!(
            "Connection open: {} ({}) <-> {} ({})",
            connection.id,
            controller.name(),
            connection.counterparty.connection_id,
            host.name()
        );
        Ok((connection.id, connection.counterparty.connection_id))
    }

    /// One funded user per chain
    pub async fn fund_users(&self) -> Result<(Wallet, Wallet)> {
        let amount = self.config.funding.user_amount;
        let controller = self.network.controller_node();
        let host = self.network.host_node();

        let controller_user = controller.create_funded_user(USER_KEY, amount).await?;
        let host_user = host.create_funded_user(USER_KEY, amount).await?;
        Ok((controller_user, host_user))
    }
}
