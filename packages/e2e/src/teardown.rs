//! E2E test environment teardown module
//!
//! Removes the harness containers and network and the files a run leaves
//! behind, then checks that the published ports are free again.

use crate::config::E2eConfig;
use crate::docker::DockerHost;
use crate::setup::ENV_FILE_NAME;
use eyre::Result;
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// E2E Teardown orchestrator
pub struct E2eTeardown {
    project_root: PathBuf,
    config: E2eConfig,
    docker: DockerHost,
}

impl E2eTeardown {
    /// Create a new E2eTeardown orchestrator
    pub async fn new(project_root: PathBuf) -> Result<Self> {
        info!("Creating E2E teardown orchestrator");

        let config = E2eConfig::from_env()?;
        let docker = DockerHost::new(&config.docker)?;

        Ok(Self {
            project_root,
            config,
            docker,
        })
    }

    /// Stop and remove every harness container
    ///
    /// Without `force` the containers get ten seconds to stop before removal.
    pub async fn remove_containers(&self, options: &TeardownOptions) -> Result<Vec<String>> {
        info!(
            "Removing harness containers (keep_volumes={}, force={})",
            options.keep_volumes, options.force
        );

        if !options.force {
            let stopped = self.docker.stop_containers(10).await?;
            info!("Stopped {} container(s)", stopped);
        }

        self.docker.remove_containers(!options.keep_volumes).await
    }

    /// Remove temporary files (.env.e2e, log file)
    pub async fn cleanup_files(&self) -> Result<Vec<PathBuf>> {
        info!("Cleaning up temporary files");

        let mut candidates = vec![self.project_root.join(ENV_FILE_NAME)];
        if let Some(log_file) = &self.config.log_file {
            if log_file.is_absolute() {
                candidates.push(log_file.clone());
            } else {
                candidates.push(self.project_root.join(log_file));
            }
        }

        let mut removed = Vec::new();
        for path in candidates {
            if !path.exists() {
                continue;
            }
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Failed to remove {}: {}", path.display(), e);
                continue;
            }
            info!("Removed: {}", path.display());
            removed.push(path);
        }

        Ok(removed)
    }

    /// Host ports the chain containers publish
    pub fn e2e_ports(&self) -> Vec<(u16, String)> {
        let mut ports = Vec::new();
        for (name, endpoints) in [("wasmd", &self.config.controller), ("canined", &self.config.host)] {
            ports.push((endpoints.rpc_port(), format!("{} RPC", name)));
            ports.push((endpoints.lcd_port(), format!("{} LCD", name)));
            ports.push((endpoints.grpc_port, format!("{} gRPC", name)));
        }
        ports
    }

    /// Check whether anything still listens on the E2E ports
    pub async fn check_ports(&self) -> Vec<PortStatus> {
        self.e2e_ports()
            .into_iter()
            .map(|(port, service)| PortStatus {
                port,
                in_use: is_port_in_use(port),
                service,
            })
            .collect()
    }

    /// Wait for all E2E ports to be free
    pub async fn wait_for_ports_free(&self, timeout: Duration) -> Result<()> {
        crate::utils::poll_until(
            "E2E ports released",
            || async { Ok(self.check_ports().await.iter().all(|p| !p.in_use)) },
            timeout,
            Duration::from_millis(500),
        )
        .await
    }

    /// Run full teardown
    pub async fn run(&mut self, options: TeardownOptions) -> Result<TeardownResult> {
        let start = std::time::Instant::now();

        let containers_removed = self.remove_containers(&options).await?;
        let network_removed = self.docker.remove_network().await?;
        let files_removed = self.cleanup_files().await?;

        if let Err(e) = self.wait_for_ports_free(Duration::from_secs(10)).await {
            warn!("{}", e);
        }
        let ports_in_use: Vec<u16> = self
            .check_ports()
            .await
            .into_iter()
            .filter(|p| p.in_use)
            .map(|p| p.port)
            .collect();

        let remaining = self.docker.list_containers().await?.len();
        let duration = start.elapsed();

        info!(
            "Teardown completed in {:?} - containers_removed: {}, network_removed: {}, ports_in_use: {:?}",
            duration,
            containers_removed.len(),
            network_removed,
            ports_in_use
        );

        Ok(TeardownResult {
            containers_removed,
            containers_remaining: remaining,
            network_removed,
            files_removed,
            ports_in_use,
            duration,
        })
    }
}

fn is_port_in_use(port: u16) -> bool {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    TcpStream::connect_timeout(&addr, Duration::from_millis(200)).is_ok()
}

/// Port status
#[derive(Debug, Clone)]
pub struct PortStatus {
    pub port: u16,
    pub service: String,
    pub in_use: bool,
}

/// Teardown result
#[derive(Debug)]
pub struct TeardownResult {
    pub containers_removed: Vec<String>,
    pub containers_remaining: usize,
    pub network_removed: bool,
    pub files_removed: Vec<PathBuf>,
    pub ports_in_use: Vec<u16>,
    pub duration: Duration,
}

impl TeardownResult {
    pub fn is_clean(&self) -> bool {
        self.containers_remaining == 0 && self.ports_in_use.is_empty()
    }
}

/// Teardown options
#[derive(Debug, Clone, Default)]
pub struct TeardownOptions {
    /// Keep the containers' anonymous volumes
    pub keep_volumes: bool,

    /// Remove containers without stopping them first
    pub force: bool,
}
