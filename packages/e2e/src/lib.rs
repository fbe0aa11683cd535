use std::fmt;
use std::time::Duration;

pub mod chain_config;
pub mod config;
pub mod cosmos;
pub mod docker;
pub mod genesis;
pub mod ibc;
pub mod logging;
pub mod network;
pub mod node;
pub mod relayer;
pub mod setup;
pub mod teardown;
pub mod tests;
pub mod types;
pub mod utils;

pub use chain_config::{chain_specs, ChainConfig, ChainSpec};
pub use config::{Deployment, E2eConfig};
pub use cosmos::CosmosClient;
pub use docker::DockerHost;
pub use network::Network;
pub use relayer::Relayer;
pub use setup::{E2eSetup, SetupResult, SetupStep, ENV_FILE_NAME};
pub use teardown::{E2eTeardown, TeardownOptions, TeardownResult};
pub use tests::{run_all_tests, run_quick_tests, run_single_test, TestOptions, TEST_NAMES};
pub use types::IcaContract;

/// Represents the outcome of a single test
#[derive(Debug, Clone)]
pub enum TestResult {
    Pass {
        name: String,
        duration: Duration,
    },
    Fail {
        name: String,
        error: String,
        duration: Duration,
    },
    Skip {
        name: String,
        reason: String,
    },
}

impl TestResult {
    pub fn pass(name: impl Into<String>, duration: Duration) -> Self {
        Self::Pass {
            name: name.into(),
            duration,
        }
    }

    pub fn fail(name: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self::Fail {
            name: name.into(),
            error: error.into(),
            duration,
        }
    }

    pub fn skip(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Skip {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass { .. })
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail { .. })
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip { .. })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Pass { name, .. } | Self::Fail { name, .. } | Self::Skip { name, .. } => name,
        }
    }
}

/// Scenarios run for minutes, so durations are shown in seconds
fn secs(duration: &Duration) -> f64 {
    duration.as_secs_f64()
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass { name, duration } => {
                write!(f, "\x1b[32mPASS\x1b[0m: {} ({:.2}s)", name, secs(duration))
            }
            Self::Fail {
                name,
                error,
                duration,
            } => {
                write!(
                    f,
                    "\x1b[31mFAIL\x1b[0m: {} - {}\n    ({:.2}s)",
                    name,
                    error,
                    secs(duration)
                )
            }
            Self::Skip { name, reason } => {
                write!(f, "\x1b[33mSKIP\x1b[0m: {} - {}", name, reason)
            }
        }
    }
}

/// Aggregates test results and provides summary
#[derive(Debug, Clone)]
pub struct TestSuite {
    name: String,
    results: Vec<TestResult>,
    start_time: std::time::Instant,
}

impl TestSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            results: Vec::new(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn add_result(&mut self, result: TestResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.is_pass()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_fail()).count()
    }

    pub fn skipped(&self) -> usize {
        self.results.iter().filter(|r| r.is_skip()).count()
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// No failures; skipped tests do not count against the suite
    pub fn succeeded(&self) -> bool {
        self.failed() == 0
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Print every result followed by the totals
    pub fn print_summary(&self) {
        println!();
        println!("Test Suite: {}", self.name);
        println!("----------------------------------------");
        for result in &self.results {
            println!("  {}", result);
        }
        println!("----------------------------------------");
        println!("Total:   {}", self.total());
        println!("Passed:  \x1b[32m{}\x1b[0m", self.passed());
        println!("Failed:  \x1b[31m{}\x1b[0m", self.failed());
        println!("Skipped: \x1b[33m{}\x1b[0m", self.skipped());
        println!("Elapsed: {:.2}s", secs(&self.elapsed()));
        println!("----------------------------------------");
    }
}

impl Extend<TestResult> for TestSuite {
    fn extend<I: IntoIterator<Item = TestResult>>(&mut self, iter: I) {
        self.results.extend(iter);
    }
}

impl fmt::Display for TestSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TestSuite({} - {} passed, {} failed, {} skipped)",
            self.name,
            self.passed(),
            self.failed(),
            self.skipped()
        )
    }
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_suite_counts() {
        let mut suite = TestSuite::new("E2E Tests");
        suite.add_result(TestResult::pass("host_connectivity", Duration::from_secs(1)));
        suite.extend([
            TestResult::fail("buy_storage", "error acknowledgement", Duration::from_secs(90)),
            TestResult::skip("filetree_post_key", "ICA_ADDRESS missing"),
        ]);

        assert_eq!(suite.total(), 3);
        assert_eq!(suite.passed(), 1);
        assert_eq!(suite.failed(), 1);
        assert_eq!(suite.skipped(), 1);
        assert!(!suite.succeeded());
        assert_eq!(
            suite.to_string(),
            "TestSuite(E2E Tests - 1 passed, 1 failed, 1 skipped)"
        );
    }

    #[test]
    fn test_skips_do_not_fail_the_suite() {
        let mut suite = TestSuite::new("quick");
        suite.add_result(TestResult::skip("ibc_connection_open", "no deployment"));
        assert!(suite.succeeded());
        assert_eq!(suite.results()[0].name(), "ibc_connection_open");
    }

    #[test]
    fn test_result_display() {
        let pass = TestResult::pass("relayer_running", Duration::from_millis(1500));
        assert!(pass.to_string().contains("relayer_running (1.50s)"));

        let skip = TestResult::skip("buy_storage", "no deployment");
        assert!(skip.to_string().ends_with("buy_storage - no deployment"));
    }
}
