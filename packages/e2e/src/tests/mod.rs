//! E2E test cases for the storage outpost
//!
//! This module provides test functions organized by category:
//!
//! - **connectivity**: Both chains answer, the relayer runs, the IBC connection is open
//! - **contract_state**: The outpost reports the ICA, an open channel and its owner
//! - **buy_storage**: Transfer channel, `ujkl` funding and `MsgBuyStorage` through the ICA
//! - **filetree**: `MsgPostKey` and `MsgProvisionFileTree` through the ICA

mod connectivity;
pub mod helpers;

// Re-export all public tests
pub use buy_storage::*;
pub use connectivity::*;
pub use contract_state::*;
pub use filetree::*;

use crate::{E2eConfig, TestResult};
use std::time::Duration;

/// How a test run behaves once the tests finished
#[derive(Debug, Clone, Default)]
pub struct TestOptions {
    /// Keep the network up after the packet scenarios for manual inspection
    pub hold: Duration,
}

/// Tests selectable with `run --test`
pub const TEST_NAMES: &[&str] = &[
    "controller_connectivity",
    "host_connectivity",
    "relayer_running",
    "ibc_connection_open",
    "ica_account_registered",
    "ica_channel_open",
    "contract_ownership",
    "buy_storage",
    "filetree_post_key",
];

/// Run quick connectivity tests only
pub async fn run_quick_tests(config: &E2eConfig) -> Vec<TestResult> {
    vec![
        test_controller_connectivity(config).await,
        test_host_connectivity(config).await,
        test_relayer_running(config).await,
        test_ibc_connection_open(config).await,
    ]
}

/// Run all E2E tests
///
/// The packet scenarios run after the state checks; the network is held
/// once at the end.
pub async fn run_all_tests(config: &E2eConfig, options: &TestOptions) -> Vec<TestResult> {
    let mut results = run_quick_tests(config).await;

    // Contract state
    results.push(test_ica_account_registered(config).await);
    results.push(test_ica_channel_open(config).await);
    results.push(test_contract_ownership(config).await);

    // Packet scenarios
    results.push(test_buy_storage(config).await);
    results.push(test_filetree_post_key(config).await);

    helpers::hold_network(options.hold).await;
    results
}

/// Run one test by name
pub async fn run_single_test(
    config: &E2eConfig,
    name: &str,
    options: &TestOptions,
) -> Vec<TestResult> {
    let result = match name {
        "controller_connectivity" => test_controller_connectivity(config).await,
        "host_connectivity" => test_host_connectivity(config).await,
        "relayer_running" => test_relayer_running(config).await,
        "ibc_connection_open" => test_ibc_connection_open(config).await,
        "ica_account_registered" => test_ica_account_registered(config).await,
        "ica_channel_open" => test_ica_channel_open(config).await,
        "contract_ownership" => test_contract_ownership(config).await,
        "buy_storage" => test_buy_storage(config).await,
        "filetree_post_key" => test_filetree_post_key(config).await,
        other => {
            return vec![TestResult::fail(
                other,
                format!("Unknown test, expected one of: {}", TEST_NAMES.join(", ")),
                Duration::ZERO,
            )]
        }
    };

    if is_packet_scenario(name) {
        helpers::hold_network(options.hold).await;
    }
    vec![result]
}

fn is_packet_scenario(name: &str) -> bool {
    matches!(name, "buy_storage" | "filetree_post_key")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_test_name_fails() {
        let results =
            run_single_test(&E2eConfig::default(), "no_such_test", &TestOptions::default()).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_fail());
        assert_eq!(results[0].name(), "no_such_test");
    }

    #[tokio::test]
    async fn test_scenarios_skip_without_deployment() {
        let options = TestOptions::default();
        for name in ["buy_storage", "filetree_post_key", "ica_channel_open"] {
            let results = run_single_test(&E2eConfig::default(), name, &options).await;
            assert!(matches!(results[0], TestResult::Skip { .. }), "{}", name);
        }
    }

    #[test]
    fn test_packet_scenarios() {
        assert!(is_packet_scenario("buy_storage"));
        assert!(is_packet_scenario("filetree_post_key"));
        assert!(!is_packet_scenario("relayer_running"));
        assert!(TEST_NAMES.contains(&"buy_storage"));
    }
}
