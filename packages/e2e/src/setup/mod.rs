//! E2E setup orchestration module
//!
//! Brings up the whole interchain-account test network:
//! 1. Docker network and the two chain nodes (`wasmd` controller, `canined` host)
//! 2. IBC clients and a connection through the Go relayer
//! 3. Funded test users on both chains
//! 4. The storage outpost contract, which opens the ICA channel itself
//! 5. `.env.e2e` with everything the scenarios need

mod chains;
mod contract;
mod env;

use crate::config::{Deployment, E2eConfig};
use crate::network::Network;
use crate::node::GenesisWallets;
use eyre::{eyre, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub use env::ENV_FILE_NAME;

/// E2E Setup orchestrator
pub struct E2eSetup {
    pub(crate) project_root: PathBuf,
    pub(crate) config: E2eConfig,
    pub(crate) network: Network,
}

impl E2eSetup {
    /// Create a new E2eSetup orchestrator
    pub async fn new(project_root: PathBuf) -> Result<Self> {
        info!("Initializing E2E setup orchestrator");

        let config = E2eConfig::from_env()?;
        let network = Network::from_config(&config)?;

        Ok(Self {
            project_root,
            config,
            network,
        })
    }

    /// Check all prerequisites are met
    /// Returns list of missing prerequisites
    pub async fn check_prerequisites(&self) -> Result<Vec<String>> {
        let mut missing = Vec::new();

        if !self.check_command_exists("docker").await {
            missing.push("docker".to_string());
        }

        if !self.network.docker.is_available().await {
            missing.push("Docker daemon".to_string());
        }

        let wasm = self.wasm_path();
        if !wasm.exists() {
            missing.push(format!("contract wasm at {}", wasm.display()));
        }

        Ok(missing)
    }

    /// Check if a command exists on the system
    async fn check_command_exists(&self, cmd: &str) -> bool {
        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(format!("command -v {} >/dev/null 2>&1", cmd))
            .output();

        output.is_ok_and(|o| o.status.success())
    }

    /// Contract artifact, relative paths resolved against the project root
    pub fn wasm_path(&self) -> PathBuf {
        let path = &self.config.contract.wasm_path;
        if path.is_absolute() {
            path.clone()
        } else {
            self.project_root.join(path)
        }
    }

    /// Remove containers, the network and the env file of a previous run
    pub async fn cleanup_existing(&self) -> Result<()> {
        info!("Cleaning up existing E2E containers and files");

        let removed = self.network.docker.remove_containers(true).await?;
        if !removed.is_empty() {
            info!("Removed containers: {:?}", removed);
        }
        self.network.docker.remove_network().await?;

        let env_path = self.project_root.join(ENV_FILE_NAME);
        if env_path.exists() {
            std::fs::remove_file(&env_path)?;
            info!("Removed {} file", ENV_FILE_NAME);
        }

        info!("Cleanup completed");
        Ok(())
    }

    /// Get the current configuration
    pub fn config(&self) -> &E2eConfig {
        &self.config
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Run complete setup with progress callback
    pub async fn run_full_setup<F>(&mut self, mut on_step: F) -> Result<SetupResult>
    where
        F: FnMut(SetupStep, bool),
    {
        info!("Starting full E2E setup");

        let start = std::time::Instant::now();
        let mut deployment = Deployment::default();

        // Check Prerequisites
        on_step(SetupStep::CheckPrerequisites, true);
        let missing = self.check_prerequisites().await?;
        if !missing.is_empty() {
            on_step(SetupStep::CheckPrerequisites, false);
            return Err(eyre!("Missing prerequisites: {:?}", missing));
        }

        // Cleanup Existing
        on_step(SetupStep::CleanupExisting, true);
        self.cleanup_existing().await?;
        on_step(SetupStep::CleanupExisting, true);

        // Create Network
        on_step(SetupStep::CreateNetwork, true);
        self.network.docker.create_network().await?;
        on_step(SetupStep::CreateNetwork, true);

        // Start Chains
        on_step(SetupStep::StartChains, true);
        let (controller_wallets, host_wallets) = self.start_chains().await?;
        on_step(SetupStep::StartChains, true);

        // Wait for Chains
        on_step(SetupStep::WaitForChains, true);
        self.wait_for_chains(Duration::from_secs(120)).await?;
        on_step(SetupStep::WaitForChains, true);

        // Link Chains
        on_step(SetupStep::LinkChains, true);
        let (controller_connection, host_connection) = self
            .link_chains(&controller_wallets, &host_wallets)
            .await?;
        deployment.controller_connection_id = Some(controller_connection);
        deployment.host_connection_id = Some(host_connection);
        on_step(SetupStep::LinkChains, true);

        // Fund Users
        on_step(SetupStep::FundUsers, true);
        let (controller_user, host_user) = self.fund_users().await?;
        deployment.controller_user = Some(controller_user);
        deployment.host_user = Some(host_user);
        on_step(SetupStep::FundUsers, true);

        // Start Relayer
        on_step(SetupStep::StartRelayer, true);
        self.network.relayer.start().await?;
        on_step(SetupStep::StartRelayer, true);

        // Deploy Contract
        on_step(SetupStep::DeployContract, true);
        let mut outpost = self.deploy_contract(&deployment).await?;
        deployment.code_id = Some(outpost.contract.code_id);
        deployment.contract_address = Some(outpost.address().to_string());
        on_step(SetupStep::DeployContract, true);

        // Wait for ICA Channel
        on_step(SetupStep::WaitForIcaChannel, true);
        let ica_info = self.wait_for_ica_channel(&mut outpost).await?;
        deployment.ica_address = Some(ica_info.ica_address);
        deployment.ica_channel_id = Some(ica_info.channel_id);
        on_step(SetupStep::WaitForIcaChannel, true);

        // Export Environment
        on_step(SetupStep::ExportEnvironment, true);
        let env_file = self.export_environment(&deployment).await?;
        self.config.deployment = deployment.clone();
        on_step(SetupStep::ExportEnvironment, true);

        // Verify Setup
        on_step(SetupStep::VerifySetup, true);
        let verification = self.verify_setup(&outpost).await?;
        on_step(SetupStep::VerifySetup, verification.all_ok());

        let duration = start.elapsed();

        info!("Full E2E setup completed in {:?}", duration);

        Ok(SetupResult {
            deployment,
            verification,
            env_file,
            duration,
        })
    }
}

/// Individual setup steps for progress tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    CheckPrerequisites,
    CleanupExisting,
    CreateNetwork,
    StartChains,
    WaitForChains,
    LinkChains,
    FundUsers,
    StartRelayer,
    DeployContract,
    WaitForIcaChannel,
    ExportEnvironment,
    VerifySetup,
}

impl SetupStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CheckPrerequisites => "Check Prerequisites",
            Self::CleanupExisting => "Cleanup Existing",
            Self::CreateNetwork => "Create Docker Network",
            Self::StartChains => "Start Chains",
            Self::WaitForChains => "Wait for Chains",
            Self::LinkChains => "Link Chains (clients + connection)",
            Self::FundUsers => "Fund Users",
            Self::StartRelayer => "Start Relayer",
            Self::DeployContract => "Deploy Outpost Contract",
            Self::WaitForIcaChannel => "Wait for ICA Channel",
            Self::ExportEnvironment => "Export Environment",
            Self::VerifySetup => "Verify Setup",
        }
    }
}

/// Genesis keys of both chains
pub type ChainWallets = (GenesisWallets, GenesisWallets);

/// Setup verification result
#[derive(Debug)]
pub struct SetupVerification {
    pub controller_ok: bool,
    pub host_ok: bool,
    pub relayer_ok: bool,
    pub ica_channel_ok: bool,
    pub env_file_exists: bool,
}

impl SetupVerification {
    pub fn all_ok(&self) -> bool {
        self.controller_ok
            && self.host_ok
            && self.relayer_ok
            && self.ica_channel_ok
            && self.env_file_exists
    }
}

/// Complete setup result
#[derive(Debug)]
pub struct SetupResult {
    pub deployment: Deployment,
    pub verification: SetupVerification,
    pub env_file: PathBuf,
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_names_are_unique() {
        let steps = [
            SetupStep::CheckPrerequisites,
            SetupStep::CleanupExisting,
            SetupStep::CreateNetwork,
            SetupStep::StartChains,
            SetupStep::WaitForChains,
            SetupStep::LinkChains,
            SetupStep::FundUsers,
            SetupStep::StartRelayer,
            SetupStep::DeployContract,
            SetupStep::WaitForIcaChannel,
            SetupStep::ExportEnvironment,
            SetupStep::VerifySetup,
        ];
        let names: std::collections::HashSet<_> = steps.iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), steps.len());
    }

    #[test]
    fn test_verification_requires_everything() {
        let mut verification = SetupVerification {
            controller_ok: true,
            host_ok: true,
            relayer_ok: true,
            ica_channel_ok: true,
            env_file_exists: true,
        };
        assert!(verification.all_ok());

        verification.ica_channel_ok = false;
        assert!(!verification.all_ok());
    }
}
