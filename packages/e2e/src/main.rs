//! Storage Outpost E2E Test CLI
//!
//! - outpost-e2e setup     -> chains, relayer, contract, ICA channel, .env.e2e
//! - outpost-e2e run       -> connectivity, contract state and packet scenarios
//! - outpost-e2e teardown  -> containers, network, temporary files

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

use outpost_e2e::logging::init_logging;
use outpost_e2e::utils::load_env_file;
use outpost_e2e::{
    run_all_tests, run_quick_tests, run_single_test, E2eConfig, E2eSetup, E2eTeardown, Network,
    SetupResult, TeardownOptions, TestOptions, TestResult, TestSuite, ENV_FILE_NAME,
};

#[derive(Parser)]
#[command(name = "outpost-e2e")]
#[command(about = "E2E test suite for the Storage Outpost contract", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start both chains, link them and deploy the outpost
    Setup,

    /// Run E2E tests against a network created by `setup`
    Run {
        /// Run only a specific test
        #[arg(short, long)]
        test: Option<String>,

        /// Quick mode (connectivity tests only)
        #[arg(long)]
        quick: bool,

        /// Keep the network up this long after the packet scenarios
        /// (defaults to E2E_HOLD_SECS)
        #[arg(long)]
        hold_secs: Option<u64>,
    },

    /// Tear down E2E test infrastructure
    Teardown {
        /// Keep the containers' volumes
        #[arg(long)]
        keep_volumes: bool,

        /// Remove containers without stopping them first
        #[arg(long)]
        force: bool,
    },

    /// Show status of E2E infrastructure
    Status,

    /// Full E2E cycle: setup -> run -> teardown (for CI)
    ///
    /// Teardown is ALWAYS run, even if setup or tests fail.
    Full {
        /// Quick mode (connectivity tests only)
        #[arg(long)]
        quick: bool,

        /// Hold the network before teardown (no hold by default)
        #[arg(long, default_value_t = 0)]
        hold_secs: u64,

        /// Keep the containers' volumes
        #[arg(long)]
        keep_volumes: bool,
    },
}

/// Find the project root by looking for the env file or the contract artifacts
fn find_project_root(start: &Path) -> PathBuf {
    let mut current = start.to_path_buf();
    for _ in 0..5 {
        if current.join(ENV_FILE_NAME).exists() || current.join("artifacts").is_dir() {
            return current;
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }
    start.to_path_buf()
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn print_step(step: outpost_e2e::SetupStep, success: bool) {
    if success {
        tracing::info!("  [OK] {}", step.name());
    } else {
        tracing::error!("  [FAIL] {}", step.name());
    }
}

fn report_setup(result: &SetupResult) {
    tracing::info!("Setup complete in {:?}", result.duration);
    tracing::info!("Environment file: {:?}", result.env_file);
    if let Some(address) = &result.deployment.contract_address {
        tracing::info!("Outpost:           {}", address);
    }
    if let Some(ica) = &result.deployment.ica_address {
        tracing::info!("Interchain account: {}", ica);
    }

    let verification = &result.verification;
    if !verification.all_ok() {
        tracing::warn!("Some verification checks failed:");
        if !verification.controller_ok {
            tracing::warn!("  - wasmd not responding");
        }
        if !verification.host_ok {
            tracing::warn!("  - canined not responding");
        }
        if !verification.relayer_ok {
            tracing::warn!("  - relayer not running");
        }
        if !verification.ica_channel_ok {
            tracing::warn!("  - ICA channel not open");
        }
        if !verification.env_file_exists {
            tracing::warn!("  - {} missing", ENV_FILE_NAME);
        }
    }
}

async fn run_tests(
    config: &E2eConfig,
    test: Option<&str>,
    quick: bool,
    options: &TestOptions,
) -> TestSuite {
    let results: Vec<TestResult> = if quick {
        tracing::info!("Quick mode: connectivity tests only");
        run_quick_tests(config).await
    } else if let Some(test_name) = test {
        tracing::info!("Running single test: {}", test_name);
        run_single_test(config, test_name, options).await
    } else {
        run_all_tests(config, options).await
    };

    let mut suite = TestSuite::new("Storage Outpost E2E");
    suite.extend(results);
    suite.print_summary();
    suite
}

async fn print_status(config: &E2eConfig) -> Result<()> {
    println!();
    println!("Configuration:");
    println!("  wasmd RPC:    {}", config.controller.rpc_url);
    println!("  wasmd LCD:    {}", config.controller.lcd_url);
    println!("  canined RPC:  {}", config.host.rpc_url);
    println!("  canined LCD:  {}", config.host.lcd_url);
    println!("  Contract:     {}", config.contract.wasm_path.display());
    println!();

    let network = Network::from_config(config)?;

    println!("Services:");
    for client in [&network.controller, &network.host] {
        let healthy = client.is_healthy().await.unwrap_or(false);
        if healthy {
            let height = client
                .get_block_height()
                .await
                .map(|h| h.to_string())
                .unwrap_or_else(|_| "?".to_string());
            println!("  \x1b[32m●\x1b[0m {}: healthy (height {})", client.name(), height);
        } else {
            println!("  \x1b[31m●\x1b[0m {}: not responding", client.name());
        }
    }
    if network.relayer.is_running().await {
        println!("  \x1b[32m●\x1b[0m relayer: running");
    } else {
        println!("  \x1b[33m●\x1b[0m relayer: not running");
    }
    println!();

    if network.docker.is_available().await {
        let containers = network.docker.list_containers().await?;
        if !containers.is_empty() {
            println!("Containers:");
            for container in containers {
                println!("  {:<28} {}", container.name, container.state);
            }
            println!();
        }
    }

    let deployment = &config.deployment;
    if deployment.contract_address.is_some() {
        println!("Deployment:");
        let show = |label: &str, value: &Option<String>| {
            println!("  {:<20} {}", label, value.as_deref().unwrap_or("-"));
        };
        show("Controller conn:", &deployment.controller_connection_id);
        show("Host conn:", &deployment.host_connection_id);
        show("Outpost:", &deployment.contract_address);
        show("ICA address:", &deployment.ica_address);
        show("ICA channel:", &deployment.ica_channel_id);
        println!();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let project_root = find_project_root(&std::env::current_dir()?);
    let env_file = project_root.join(ENV_FILE_NAME);
    if env_file.exists() {
        // Explicit environment variables win over the exported file
        dotenvy::from_path(&env_file)?;
    }

    let log_file = std::env::var("E2E_LOG_FILE")
        .ok()
        .map(|p| resolve(&project_root, Path::new(&p)));
    init_logging(cli.verbose, log_file.as_deref())?;

    let config = E2eConfig::from_env()?;

    match cli.command {
        Commands::Setup => {
            tracing::info!("Setting up E2E infrastructure...");
            let mut setup = E2eSetup::new(project_root).await?;
            let result = setup.run_full_setup(print_step).await?;
            report_setup(&result);
        }

        Commands::Run {
            test,
            quick,
            hold_secs,
        } => {
            tracing::info!("Running E2E tests...");
            if !config.deployment.is_complete() {
                tracing::warn!(
                    "Deployment incomplete; scenarios will be skipped. Run `setup` first."
                );
            }

            let options = TestOptions {
                hold: hold_secs
                    .map(Duration::from_secs)
                    .unwrap_or(config.timing.hold),
            };
            let suite = run_tests(&config, test.as_deref(), quick, &options).await;

            if !suite.succeeded() {
                std::process::exit(1);
            }
        }

        Commands::Teardown {
            keep_volumes,
            force,
        } => {
            tracing::info!("Tearing down E2E infrastructure...");
            let mut teardown = E2eTeardown::new(project_root).await?;
            let result = teardown
                .run(TeardownOptions {
                    keep_volumes,
                    force,
                })
                .await?;

            tracing::info!("Teardown complete in {:?}", result.duration);
            if !result.files_removed.is_empty() {
                tracing::info!("Removed {} temporary files", result.files_removed.len());
            }
            if !result.is_clean() {
                tracing::warn!(
                    "{} container(s) left, ports still in use: {:?}",
                    result.containers_remaining,
                    result.ports_in_use
                );
            }
        }

        Commands::Status => {
            tracing::info!("E2E Infrastructure Status");
            print_status(&config).await?;
        }

        Commands::Full {
            quick,
            hold_secs,
            keep_volumes,
        } => {
            tracing::info!("========================================");
            tracing::info!("  Storage Outpost Full E2E Test Cycle");
            tracing::info!("========================================");
            tracing::info!("Running: setup -> tests -> teardown");

            let mut failed = false;

            // PHASE 1: SETUP
            tracing::info!("PHASE 1: Setting up E2E infrastructure...");
            let setup_result = async {
                let mut setup = E2eSetup::new(project_root.clone()).await?;
                setup.run_full_setup(print_step).await
            }
            .await;

            let setup_result = record_phase("Setup", setup_result, &mut failed);
            if let Some(result) = &setup_result {
                report_setup(result);
            }

            // PHASE 2: RUN TESTS (only if setup succeeded)
            if let Some(result) = &setup_result {
                tracing::info!("PHASE 2: Running E2E tests...");

                if let Err(e) = load_env_file(&result.env_file) {
                    tracing::warn!("Failed to load {}: {}", ENV_FILE_NAME, e);
                }
                let fresh_config = E2eConfig::from_env().map(|mut config| {
                    config.deployment = result.deployment.clone();
                    config
                });

                if let Some(fresh_config) =
                    record_phase("Loading test configuration", fresh_config, &mut failed)
                {
                    let options = TestOptions {
                        hold: Duration::from_secs(hold_secs),
                    };
                    let suite = run_tests(&fresh_config, None, quick, &options).await;
                    failed |= !suite.succeeded();
                }
            } else {
                tracing::warn!("Skipping tests due to setup failure");
            }

            // PHASE 3: TEARDOWN (ALWAYS runs, even on failure)
            tracing::info!("PHASE 3: Tearing down E2E infrastructure...");
            let teardown_result = async {
                let mut teardown = E2eTeardown::new(project_root).await?;
                teardown
                    .run(TeardownOptions {
                        keep_volumes,
                        force: false,
                    })
                    .await
            }
            .await;

            if let Some(result) = record_phase("Teardown", teardown_result, &mut failed) {
                tracing::info!("Teardown complete in {:?}", result.duration);
            }

            if failed {
                tracing::error!("Full E2E cycle FAILED");
                std::process::exit(1);
            }
            tracing::info!("Full E2E cycle PASSED");
        }
    }

    Ok(())
}

/// Log a failed phase of `full` and mark the cycle failed, keeping later phases running
fn record_phase<T>(phase: &str, result: Result<T>, failed: &mut bool) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!("{} failed: {:#}", phase, e);
            *failed = true;
            None
        }
    }
}
