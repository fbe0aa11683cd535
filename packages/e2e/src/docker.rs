//! Docker plumbing for the chain and relayer containers
//!
//! Networks and container cleanup go through the Docker API (bollard);
//! `run`, `exec` and `cp` shell out to the docker CLI.

use crate::config::DockerConfig;
use bollard::container::{
    InspectContainerOptions, ListContainersOptions, RemoveContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::network::CreateNetworkOptions;
use bollard::Docker;
use eyre::{eyre, Result};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Label key put on every container and network the harness creates
pub const LABEL_KEY: &str = "outpost-e2e.harness";

/// A container to launch with `docker run -d`
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub entrypoint: Option<String>,
    pub cmd: Vec<String>,
    /// `(host, container)` port pairs
    pub ports: Vec<(u16, u16)>,
    pub env: Vec<(String, String)>,
    pub user: Option<String>,
}

impl ContainerSpec {
    /// Arguments for `docker run`
    pub fn run_args(&self, network: &str, label: &str) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "--network".to_string(),
            network.to_string(),
            "--label".to_string(),
            format!("{}={}", LABEL_KEY, label),
        ];

        for (host, container) in &self.ports {
            args.push("-p".to_string());
            args.push(format!("{}:{}", host, container));
        }
        for (key, value) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        if let Some(user) = &self.user {
            args.push("--user".to_string());
            args.push(user.clone());
        }
        if let Some(entrypoint) = &self.entrypoint {
            args.push("--entrypoint".to_string());
            args.push(entrypoint.clone());
        }

        args.push(self.image.clone());
        args.extend(self.cmd.iter().cloned());
        args
    }
}

/// Captured output of a `docker exec`
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Summary of a harness container
#[derive(Debug, Clone)]
pub struct HarnessContainer {
    pub id: String,
    pub name: String,
    pub state: String,
}

/// Docker host the harness runs its containers on
pub struct DockerHost {
    docker: Docker,
    network: String,
    label: String,
    cli: String,
}

impl DockerHost {
    /// Connect to the local Docker daemon
    pub fn new(config: &DockerConfig) -> Result<Self> {
        info!("Connecting to Docker daemon");
        let docker = Docker::connect_with_local_defaults()?;

        Ok(Self {
            docker,
            network: config.network.clone(),
            label: config.label.clone(),
            cli: config.cli.clone(),
        })
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Whether the daemon answers a ping
    pub async fn is_available(&self) -> bool {
        match self.docker.ping().await {
            Ok(_) => true,
            Err(e) => {
                warn!("Docker daemon not reachable: {}", e);
                false
            }
        }
    }

    /// Create the harness bridge network if it does not exist yet
    pub async fn create_network(&self) -> Result<()> {
        if self
            .docker
            .inspect_network::<String>(&self.network, None)
            .await
            .is_ok()
        {
            debug!("Docker network '{}' already exists", self.network);
            return Ok(());
        }

        info!("Creating docker network '{}'", self.network);
        let mut labels = HashMap::new();
        labels.insert(LABEL_KEY.to_string(), self.label.clone());

        self.docker
            .create_network(CreateNetworkOptions {
                name: self.network.clone(),
                driver: "bridge".to_string(),
                labels,
                ..Default::default()
            })
            .await
            .map_err(|e| eyre!("Failed to create network '{}': {}", self.network, e))?;

        Ok(())
    }

    /// Remove the harness network; a missing network is not an error
    pub async fn remove_network(&self) -> Result<bool> {
        match self.docker.remove_network(&self.network).await {
            Ok(()) => {
                info!("Removed docker network '{}'", self.network);
                Ok(true)
            }
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                debug!("Docker network '{}' not found", self.network);
                Ok(false)
            }
            Err(e) => Err(eyre!("Failed to remove network '{}': {}", self.network, e)),
        }
    }

    /// Start a detached container on the harness network
    ///
    /// Returns the container id.
    pub async fn run_container(&self, spec: &ContainerSpec) -> Result<String> {
        info!("Starting container '{}' from {}", spec.name, spec.image);

        let output = Command::new(&self.cli)
            .args(spec.run_args(&self.network, &self.label))
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(eyre!(
                "Failed to start container '{}': {}",
                spec.name,
                stderr
            ));
        }

        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("Container '{}' started with id {}", spec.name, id);
        Ok(id)
    }

    /// Run a command in a container and capture its output, whatever its exit code
    pub async fn exec(&self, container_name: &str, cmd: &[&str]) -> Result<ExecOutput> {
        debug!(
            "Executing command in container '{}': {:?}",
            container_name, cmd
        );

        let output = Command::new(&self.cli)
            .args(["exec", container_name])
            .args(cmd)
            .output()
            .await?;

        Ok(ExecOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run a command in a container and return stdout, failing on a non-zero exit
    pub async fn exec_in_container(&self, container_name: &str, cmd: &[&str]) -> Result<String> {
        let output = self.exec(container_name, cmd).await?;

        if !output.success {
            return Err(eyre!(
                "Command {:?} failed in container '{}': {}",
                cmd,
                container_name,
                output.stderr.trim()
            ));
        }

        debug!("Command output: {}", output.stdout.trim());
        Ok(output.stdout)
    }

    /// Start a long-running command in the background (`docker exec -d`)
    pub async fn exec_detached(&self, container_name: &str, cmd: &[&str]) -> Result<()> {
        info!(
            "Starting background command in container '{}': {:?}",
            container_name, cmd
        );

        let output = Command::new(&self.cli)
            .args(["exec", "-d", container_name])
            .args(cmd)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(eyre!(
                "Background command failed in container '{}': {}",
                container_name,
                stderr
            ));
        }

        Ok(())
    }

    /// Run a command with `input` piped to its stdin
    pub async fn exec_with_stdin(
        &self,
        container_name: &str,
        cmd: &[&str],
        input: &[u8],
    ) -> Result<String> {
        debug!(
            "Executing command with stdin in container '{}': {:?}",
            container_name, cmd
        );

        let mut child = Command::new(&self.cli)
            .args(["exec", "-i", container_name])
            .args(cmd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| eyre!("Failed to open stdin of docker exec"))?;
        stdin.write_all(input).await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(eyre!(
                "Command {:?} failed in container '{}': {}",
                cmd,
                container_name,
                stderr
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Write `contents` to `path` inside the container
    pub async fn write_file(&self, container_name: &str, path: &str, contents: &[u8]) -> Result<()> {
        let target = format!("cat > {}", path);
        self.exec_with_stdin(container_name, &["sh", "-c", &target], contents)
            .await?;
        Ok(())
    }

    /// Read a file from inside the container
    pub async fn read_file(&self, container_name: &str, path: &str) -> Result<Vec<u8>> {
        let output = Command::new(&self.cli)
            .args(["exec", container_name, "cat", path])
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(eyre!(
                "Failed to read '{}' in container '{}': {}",
                path,
                container_name,
                stderr
            ));
        }

        Ok(output.stdout)
    }

    /// Copy a file from the host into a container
    pub async fn copy_to_container(
        &self,
        container_name: &str,
        local_path: &Path,
        container_path: &str,
    ) -> Result<()> {
        info!(
            "Copying file '{}' to container '{}' at '{}'",
            local_path.display(),
            container_name,
            container_path
        );

        let source = local_path.to_string_lossy().into_owned();
        let target = format!("{}:{}", container_name, container_path);
        let output = Command::new(&self.cli)
            .args(["cp", source.as_str(), target.as_str()])
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(eyre!(
                "Failed to copy file to container '{}': {}",
                container_name,
                stderr
            ));
        }

        Ok(())
    }

    /// Whether the named container exists and is running
    pub async fn is_running(&self, container_name: &str) -> bool {
        match self
            .docker
            .inspect_container(container_name, None::<InspectContainerOptions>)
            .await
        {
            Ok(info) => info
                .state
                .and_then(|state| state.running)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// All containers carrying the harness label, running or not
    pub async fn list_containers(&self) -> Result<Vec<HarnessContainer>> {
        let mut filters = HashMap::new();
        filters.insert(
            "label".to_string(),
            vec![format!("{}={}", LABEL_KEY, self.label)],
        );

        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                filters,
                ..Default::default()
            }))
            .await?;

        Ok(containers
            .into_iter()
            .map(|c| HarnessContainer {
                id: c.id.unwrap_or_default(),
                name: c
                    .names
                    .and_then(|names| names.into_iter().next())
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default(),
                state: c.state.unwrap_or_default(),
            })
            .collect())
    }

    /// Stop every running harness container, waiting up to `timeout_secs` each
    pub async fn stop_containers(&self, timeout_secs: i64) -> Result<usize> {
        let mut stopped = 0;

        for container in self.list_containers().await? {
            if container.state != "running" {
                continue;
            }
            info!("Stopping container '{}'", container.name);
            match self
                .docker
                .stop_container(&container.id, Some(StopContainerOptions { t: timeout_secs }))
                .await
            {
                Ok(()) => stopped += 1,
                Err(e) => warn!("Failed to stop container '{}': {}", container.name, e),
            }
        }

        Ok(stopped)
    }

    /// Force-remove every harness container
    ///
    /// Returns the names of the removed containers.
    pub async fn remove_containers(&self, remove_volumes: bool) -> Result<Vec<String>> {
        let mut removed = Vec::new();

        for container in self.list_containers().await? {
            info!("Removing container '{}'", container.name);
            match self
                .docker
                .remove_container(
                    &container.id,
                    Some(RemoveContainerOptions {
                        force: true,
                        v: remove_volumes,
                        ..Default::default()
                    }),
                )
                .await
            {
                Ok(()) => removed.push(container.name),
                Err(e) => warn!("Failed to remove container '{}': {}", container.name, e),
            }
        }

        Ok(removed)
    }
}
