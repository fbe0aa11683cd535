//! Connectivity tests for E2E test suite
//!
//! Tests that verify both chains, the relayer and the IBC connection.

use crate::cosmos::CosmosClient;
use crate::network::Network;
use crate::relayer::ConnectionInfo;
use crate::{E2eConfig, TestResult};
use std::time::Instant;

async fn check_chain(name: &str, client: &CosmosClient) -> TestResult {
    let start = Instant::now();

    match client.is_healthy().await {
        Ok(true) => {}
        Ok(false) => {
            return TestResult::fail(
                name,
                format!("{} LCD is not responding", client.name()),
                start.elapsed(),
            )
        }
        Err(e) => return TestResult::fail(name, format!("Failed to connect: {}", e), start.elapsed()),
    }

    match client.get_block_height().await {
        Ok(height) if height > 0 => {
            tracing::info!("{} connected, block: {}", client.name(), height);
            TestResult::pass(name, start.elapsed())
        }
        Ok(_) => TestResult::fail(
            name,
            format!("{} has not produced a block yet", client.name()),
            start.elapsed(),
        ),
        Err(e) => TestResult::fail(name, format!("Failed to query RPC: {}", e), start.elapsed()),
    }
}

/// Test the controller chain (wasmd) answers on LCD and RPC
pub async fn test_controller_connectivity(config: &E2eConfig) -> TestResult {
    let name = "controller_connectivity";
    match Network::from_config(config) {
        Ok(network) => check_chain(name, &network.controller).await,
        Err(e) => TestResult::fail(name, e.to_string(), Default::default()),
    }
}

/// Test the host chain (canined) answers on LCD and RPC
pub async fn test_host_connectivity(config: &E2eConfig) -> TestResult {
    let name = "host_connectivity";
    match Network::from_config(config) {
        Ok(network) => check_chain(name, &network.host).await,
        Err(e) => TestResult::fail(name, e.to_string(), Default::default()),
    }
}

/// Test the relayer process is running inside its container
pub async fn test_relayer_running(config: &E2eConfig) -> TestResult {
    let start = Instant::now();
    let name = "relayer_running";

    let network = match Network::from_config(config) {
        Ok(network) => network,
        Err(e) => return TestResult::fail(name, e.to_string(), start.elapsed()),
    };

    if network.relayer.is_running().await {
        TestResult::pass(name, start.elapsed())
    } else {
        TestResult::fail(
            name,
            format!(
                "rly is not running in {}",
                network.relayer.config().container_name
            ),
            start.elapsed(),
        )
    }
}

/// Test the connection created during setup is open on both ends
pub async fn test_ibc_connection_open(config: &E2eConfig) -> TestResult {
    let start = Instant::now();
    let name = "ibc_connection_open";

    let (Some(controller_conn), Some(host_conn)) = (
        config.deployment.controller_connection_id.as_deref(),
        config.deployment.host_connection_id.as_deref(),
    ) else {
        return TestResult::skip(name, "connection ids not exported, run setup first");
    };

    let network = match Network::from_config(config) {
        Ok(network) => network,
        Err(e) => return TestResult::fail(name, e.to_string(), start.elapsed()),
    };

    let ends = [
        (&network.controller, controller_conn, host_conn),
        (&network.host, host_conn, controller_conn),
    ];
    for (client, conn_id, counterparty_id) in ends {
        let connections = match network.relayer.query_connections(client.chain()).await {
            Ok(connections) => connections,
            Err(e) => {
                return TestResult::fail(
                    name,
                    format!("Failed to query connections on {}: {}", client.name(), e),
                    start.elapsed(),
                )
            }
        };

        if let Err(reason) =
            check_connection_end(&connections, conn_id, counterparty_id, client.name())
        {
            return TestResult::fail(name, reason, start.elapsed());
        }
    }

    TestResult::pass(name, start.elapsed())
}

/// One end of the connection must be open and point at the other end
fn check_connection_end(
    connections: &[ConnectionInfo],
    conn_id: &str,
    counterparty_id: &str,
    chain: &str,
) -> Result<(), String> {
    match connections.iter().find(|c| c.id == conn_id) {
        Some(conn) if !conn.is_open() => {
            Err(format!("{} on {} is in state {}", conn.id, chain, conn.state))
        }
        Some(conn) if conn.counterparty.connection_id != counterparty_id => Err(format!(
            "{} on {} points at {}, expected {}",
            conn.id, chain, conn.counterparty.connection_id, counterparty_id
        )),
        Some(_) => Ok(()),
        None => Err(format!("{} not found on {}", conn_id, chain)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relayer::ConnectionCounterparty;

    fn connection(id: &str, state: &str, counterparty: &str) -> ConnectionInfo {
        ConnectionInfo {
            id: id.to_string(),
            client_id: "07-tendermint-0".to_string(),
            state: state.to_string(),
            counterparty: ConnectionCounterparty {
                client_id: "07-tendermint-0".to_string(),
                connection_id: counterparty.to_string(),
            },
        }
    }

    #[test]
    fn test_check_connection_end() {
        let host = vec![
            connection("connection-0", "STATE_OPEN", "connection-0"),
            connection("connection-1", "STATE_TRYOPEN", "connection-1"),
        ];

        assert!(check_connection_end(&host, "connection-0", "connection-0", "canined").is_ok());

        let err = check_connection_end(&host, "connection-1", "connection-1", "canined")
            .unwrap_err();
        assert!(err.contains("STATE_TRYOPEN"));

        let err = check_connection_end(&host, "connection-0", "connection-2", "canined")
            .unwrap_err();
        assert!(err.contains("expected connection-2"));

        let err = check_connection_end(&host, "connection-5", "connection-0", "canined")
            .unwrap_err();
        assert_eq!(err, "connection-5 not found on canined");
    }
}
