//! Generation rollout: install with retries, then activate.

use std::time::Duration;

use offgrid_core::{AppConfig, CacheStore, InstallReport, NetworkFetcher, OfflineCacheProxy};

use crate::error::HostError;

/// How often and how patiently the host retries a failed install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_app(config: &AppConfig) -> Self {
        Self { attempts: config.install_attempts.max(1), initial_backoff: config.install_backoff() }
    }

    /// Delay after the given failed attempt (1-based), doubling each time.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.initial_backoff.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Install the generation, retrying per `policy`, then activate it.
///
/// Returns the namespaces activate deleted.
pub async fn bring_up<F, S>(proxy: &OfflineCacheProxy<F, S>, policy: &RetryPolicy) -> Result<Vec<String>, HostError>
where
    F: NetworkFetcher,
    S: CacheStore,
{
    let report = install_with_retry(proxy, policy).await?;

    if report.skip_waiting {
        tracing::info!(namespace = %report.namespace, "new generation takes over immediately");
    } else {
        tracing::info!(namespace = %report.namespace, "new generation installed");
    }

    let deleted = proxy.on_activate().await?;
    Ok(deleted)
}

async fn install_with_retry<F, S>(
    proxy: &OfflineCacheProxy<F, S>, policy: &RetryPolicy,
) -> Result<InstallReport, HostError>
where
    F: NetworkFetcher,
    S: CacheStore,
{
    let mut attempt = 1;
    loop {
        match proxy.on_install().await {
            Ok(report) => return Ok(report),
            Err(e) if attempt < policy.attempts => {
                let delay = policy.delay(attempt);
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "install failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(HostError::InstallExhausted { attempts: attempt, source: e }),
        }
    }
}
