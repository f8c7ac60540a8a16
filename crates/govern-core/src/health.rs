//! Health probing with bounded retries

use std::time::Duration;

use govern_db::ServiceStatus;
use reqwest::Client;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Probes a health-check URL with retries and exponential backoff.
///
/// Probes run inline on the event worker; the worst-case stall is bounded by
/// `timeout * (max_retries + 1)` plus the backoff sleeps.
pub struct HealthChecker {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl HealthChecker {
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            client: Client::new(),
            timeout,
            max_retries,
        }
    }

    /// Probe the URL. Any 2xx response counts as healthy; any other status,
    /// transport error, or timeout counts as a failed attempt. Between
    /// attempts sleeps 1s, 2s, 4s, ... Returns false once all attempts are
    /// exhausted.
    pub async fn check_health(&self, health_check_url: &str) -> bool {
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_secs(1u64 << (attempt - 1));
                debug!(
                    "Health check retry {}/{} for {} after {:?}",
                    attempt, self.max_retries, health_check_url, backoff
                );
                sleep(backoff).await;
            }

            match self
                .client
                .get(health_check_url)
                .timeout(self.timeout)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    debug!(
                        "Health check passed for {} (status {})",
                        health_check_url,
                        response.status()
                    );
                    metrics::counter!("govern_health_probes_total", "result" => "healthy")
                        .increment(1);
                    return true;
                }
                Ok(response) => {
                    warn!(
                        "Health check for {} returned status {} (attempt {}/{})",
                        health_check_url,
                        response.status(),
                        attempt + 1,
                        self.max_retries + 1
                    );
                }
                Err(e) => {
                    warn!(
                        "Health check request to {} failed (attempt {}/{}): {}",
                        health_check_url,
                        attempt + 1,
                        self.max_retries + 1,
                        e
                    );
                }
            }
        }

        warn!(
            "Health check for {} failed after {} attempts",
            health_check_url,
            self.max_retries + 1
        );
        metrics::counter!("govern_health_probes_total", "result" => "unhealthy").increment(1);
        false
    }

    /// Probe the URL and map the outcome to a service status
    pub async fn get_health_status(&self, health_check_url: &str) -> ServiceStatus {
        if self.check_health(health_check_url).await {
            ServiceStatus::Healthy
        } else {
            ServiceStatus::Unhealthy
        }
    }
}
