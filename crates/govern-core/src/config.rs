//! Runtime configuration for the governance manager

use std::time::Duration;

/// Tunables for the manager and every component it wires together
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Port the HTTP front end listens on
    pub server_port: u16,
    /// How often the health-check scheduler probes all registered pods
    pub health_check_interval: Duration,
    /// Per-attempt timeout of a single health probe
    pub health_check_timeout: Duration,
    /// Retries after the first failed probe attempt
    pub health_check_retry: u32,
    /// How often the reconcile scheduler broadcasts the full state
    pub notification_interval: Duration,
    /// Per-request timeout of an outbound subscriber notification
    pub notification_timeout: Duration,
    /// Capacity of the event queue buffer
    pub event_queue_size: usize,
    /// Deadline the HTTP layer is willing to wait for a free queue slot
    pub enqueue_timeout: Duration,
    /// Deadline for a single database mirror operation
    pub database_op_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            server_port: 8080,
            health_check_interval: Duration::from_secs(30),
            health_check_timeout: Duration::from_secs(5),
            health_check_retry: 3,
            notification_interval: Duration::from_secs(60),
            notification_timeout: Duration::from_secs(5),
            event_queue_size: 1000,
            enqueue_timeout: Duration::from_secs(5),
            database_op_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.health_check_interval, Duration::from_secs(30));
        assert_eq!(config.health_check_timeout, Duration::from_secs(5));
        assert_eq!(config.health_check_retry, 3);
        assert_eq!(config.notification_interval, Duration::from_secs(60));
        assert_eq!(config.notification_timeout, Duration::from_secs(5));
        assert_eq!(config.event_queue_size, 1000);
    }
}
