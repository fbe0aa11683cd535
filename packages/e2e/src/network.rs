//! Handles on the running E2E network
//!
//! Built from [`E2eConfig`] and shared by setup, the scenarios and `status`.

use crate::chain_config::{chain_specs, ChainConfig};
use crate::config::E2eConfig;
use crate::cosmos::CosmosClient;
use crate::docker::DockerHost;
use crate::node::ChainNode;
use crate::relayer::Relayer;
use eyre::{eyre, Result};
use std::sync::Arc;

/// Docker host, both chain clients and the relayer
pub struct Network {
    pub docker: Arc<DockerHost>,
    pub controller: Arc<CosmosClient>,
    pub host: Arc<CosmosClient>,
    pub relayer: Relayer,
}

impl Network {
    pub fn from_config(config: &E2eConfig) -> Result<Self> {
        let docker = Arc::new(DockerHost::new(&config.docker)?);
        let (controller_chain, host_chain) = controller_and_host()?;

        let controller = Arc::new(CosmosClient::new(
            controller_chain,
            config.controller.clone(),
            docker.clone(),
            &config.timing,
        ));
        let host = Arc::new(CosmosClient::new(
            host_chain,
            config.host.clone(),
            docker.clone(),
            &config.timing,
        ));
        let relayer = Relayer::new(docker.clone(), config.relayer.clone());

        Ok(Self {
            docker,
            controller,
            host,
            relayer,
        })
    }

    pub fn controller_node(&self) -> ChainNode {
        ChainNode::new(self.controller.clone())
    }

    pub fn host_node(&self) -> ChainNode {
        ChainNode::new(self.host.clone())
    }
}

/// Split the chain table into controller and host
pub fn controller_and_host() -> Result<(ChainConfig, ChainConfig)> {
    let mut specs = chain_specs().into_iter().map(|spec| spec.chain_config);
    let controller = specs
        .next()
        .ok_or_else(|| eyre!("chain table has no controller chain"))?;
    let host = specs
        .next()
        .ok_or_else(|| eyre!("chain table has no host chain"))?;
    Ok((controller, host))
}
