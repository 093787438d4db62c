//! HTTP connection pool settings and request accounting for HuaweiCloud endpoints

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const USER_AGENT: &str = concat!("terraform-provider-huaweicloud/", env!("CARGO_PKG_VERSION"));

pub struct ConnectionPoolConfig {
    pub max_idle_per_host: usize,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub tcp_keepalive: Option<Duration>,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 10,
            idle_timeout: Duration::from_secs(90),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            tcp_keepalive: Some(Duration::from_secs(30)),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub retried_requests: u64,
    pub last_request: Option<Instant>,
}

pub struct ConnectionPoolManager {
    stats: Arc<RwLock<ConnectionStats>>,
    config: ConnectionPoolConfig,
}

impl ConnectionPoolManager {
    pub fn new(config: ConnectionPoolConfig) -> Self {
        Self {
            stats: Arc::new(RwLock::new(ConnectionStats::default())),
            config,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout
    }

    pub async fn record_request(&self, success: bool) {
        let mut stats = self.stats.write().await;
        stats.total_requests += 1;
        if !success {
            stats.failed_requests += 1;
        }
        stats.last_request = Some(Instant::now());
    }

    pub async fn record_retry(&self) {
        self.stats.write().await.retried_requests += 1;
    }

    pub async fn get_stats(&self) -> ConnectionStats {
        self.stats.read().await.clone()
    }

    pub fn build_client(&self, insecure: bool) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(insecure)
            .timeout(self.config.request_timeout)
            .connect_timeout(self.config.connect_timeout)
            .pool_idle_timeout(self.config.idle_timeout)
            .pool_max_idle_per_host(self.config.max_idle_per_host);

        if let Some(keepalive) = self.config.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stats_count_failures_and_retries() {
        let manager = ConnectionPoolManager::new(ConnectionPoolConfig::default());
        manager.record_request(true).await;
        manager.record_request(false).await;
        manager.record_retry().await;

        let stats = manager.get_stats().await;
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.failed_requests, 1);
        assert_eq!(stats.retried_requests, 1);
        assert!(stats.last_request.is_some());
    }

    #[test]
    fn builds_insecure_client() {
        let manager = ConnectionPoolManager::new(ConnectionPoolConfig::default());
        assert!(manager.build_client(true).is_ok());
        assert_eq!(manager.request_timeout(), Duration::from_secs(60));
    }
}
