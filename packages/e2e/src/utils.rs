//! Utility functions for E2E testing
//!
//! Polling, retry, fixed settle waits and `.env` file handling.

use chrono::Utc;
use eyre::Result;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Poll a check function until it returns true or timeout
///
/// # Arguments
/// * `description` - Human-readable description of what is awaited
/// * `check` - Async function that returns `Result<bool>`
/// * `timeout` - Maximum time to wait for the check to succeed
/// * `interval` - Time to wait between check attempts
pub async fn poll_until<F, Fut>(
    description: &str,
    check: F,
    timeout: Duration,
    interval: Duration,
) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    poll_for(
        description,
        || {
            let fut = check();
            async move { fut.await.map(|ready| ready.then_some(())) }
        },
        timeout,
        interval,
    )
    .await
}

/// Poll until `check` yields a value, returning it
pub async fn poll_for<F, Fut, T>(
    description: &str,
    check: F,
    timeout: Duration,
    interval: Duration,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        match check().await {
            Ok(Some(value)) => {
                info!("{} ready", description);
                return Ok(value);
            }
            Ok(None) => {
                debug!("{} not ready, retrying...", description);
            }
            Err(e) => {
                debug!("{} check failed: {}, retrying...", description, e);
            }
        }
        sleep(interval).await;
    }
    eyre::bail!("{} did not become ready within {:?}", description, timeout)
}

/// Retry an operation with exponential backoff
///
/// # Arguments
/// * `operation` - Human-readable description of the operation being retried
/// * `f` - Async function that returns `Result<T>`
/// * `max_attempts` - Maximum number of attempts
/// * `initial_delay` - Initial delay between attempts
pub async fn retry_with_backoff<F, Fut, T>(
    operation: &str,
    f: F,
    max_attempts: u32,
    initial_delay: Duration,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = initial_delay;
    let mut attempt = 1u32;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt >= max_attempts {
                    eyre::bail!(
                        "Operation '{}' failed after {} attempts: {}",
                        operation,
                        max_attempts,
                        e
                    );
                }

                warn!(
                    "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}...",
                    operation, attempt, max_attempts, e, delay
                );

                sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
        }
    }
}

/// Fixed wait for something the harness cannot observe directly
pub async fn settle(description: &str, duration: Duration) {
    if duration.is_zero() {
        return;
    }
    info!("Waiting {:?} for {}", duration, description);
    sleep(duration).await;
}

/// Write environment variables to a .env file
///
/// Keys are written in sorted order.
pub fn write_env_file(path: &Path, vars: &HashMap<String, String>) -> Result<()> {
    let mut content = String::from("# Storage Outpost E2E Environment\n");
    content.push_str(&format!("# Generated at {}\n\n", Utc::now()));

    let sorted: BTreeMap<_, _> = vars.iter().collect();
    for (key, value) in sorted {
        content.push_str(&format!("{}={}\n", key, value));
    }

    std::fs::write(path, content)?;
    Ok(())
}

/// Read environment variables from a .env file
///
/// Lines starting with `#` are comments. Empty lines are ignored.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    for item in dotenvy::from_path_iter(path)? {
        let (key, value) = item?;
        vars.insert(key, value);
    }
    Ok(vars)
}

/// Load a .env file into the process environment, overriding existing values
pub fn load_env_file(path: &Path) -> Result<()> {
    dotenvy::from_path_override(path)?;
    Ok(())
}
