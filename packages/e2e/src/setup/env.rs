//! Environment export and setup verification methods
//!
//! Writes the deployment to `.env.e2e` and checks the network's health.

use super::{E2eSetup, SetupVerification};
use crate::config::Deployment;
use crate::types::IcaContract;
use crate::utils::write_env_file;
use eyre::Result;
use std::path::PathBuf;
use tracing::{info, warn};

/// File the deployment is exported to, relative to the project root
pub const ENV_FILE_NAME: &str = ".env.e2e";

impl E2eSetup {
    /// Export the deployment and endpoints to .env.e2e
    pub async fn export_environment(&self, deployment: &Deployment) -> Result<PathBuf> {
        info!("Exporting environment variables to {}", ENV_FILE_NAME);

        let env_path = self.project_root.join(ENV_FILE_NAME);

        let mut vars = deployment.to_env_vars();
        for (prefix, endpoints) in [("WASMD", &self.config.controller), ("CANINED", &self.config.host)] {
            vars.insert(format!("{}_RPC_URL", prefix), endpoints.rpc_url.to_string());
            vars.insert(format!("{}_LCD_URL", prefix), endpoints.lcd_url.to_string());
            vars.insert(format!("{}_CONTAINER", prefix), endpoints.container_name.clone());
        }
        vars.insert(
            "WASMD_CHAIN_ID".to_string(),
            self.network.controller.chain().chain_id.clone(),
        );
        vars.insert(
            "CANINED_CHAIN_ID".to_string(),
            self.network.host.chain().chain_id.clone(),
        );

        write_env_file(&env_path, &vars)?;

        info!("Environment exported to: {:?}", env_path);
        Ok(env_path)
    }

    /// Verify setup is complete and working
    pub async fn verify_setup(&self, outpost: &IcaContract) -> Result<SetupVerification> {
        info!("Verifying setup");

        let controller_ok = self.network.controller.is_healthy().await?;
        let host_ok = self.network.host.is_healthy().await?;
        let relayer_ok = self.network.relayer.is_running().await;

        let ica_channel_ok = match outpost.query_channel_state().await {
            Ok(state) => state.is_open(),
            Err(e) => {
                warn!("Could not query ICA channel state: {}", e);
                false
            }
        };

        let env_file_exists = self.project_root.join(ENV_FILE_NAME).exists();

        Ok(SetupVerification {
            controller_ok,
            host_ok,
            relayer_ok,
            ica_channel_ok,
            env_file_exists,
        })
    }
}
