//! CLI config for the ScyllaDB connection and the write retry policy.

use std::time::Duration;

/// How to reach the cluster and how hard to try.
#[derive(Debug, Clone, clap::Parser)]
pub struct ScyllaConfig {
    /// Cluster contact points, comma separated.
    #[clap(
        long = "scylla-hosts",
        env = "SCYLLAPROM_SCYLLA_HOSTS",
        default_value = "127.0.0.1:9042",
        value_delimiter = ','
    )]
    pub hosts: Vec<String>,

    /// Keyspace holding the metric tables.
    #[clap(
        long = "scylla-keyspace",
        env = "SCYLLAPROM_SCYLLA_KEYSPACE",
        default_value = "metrics"
    )]
    pub keyspace: String,

    /// Attempts per sample batch, including the first.
    #[clap(
        long = "write-max-retries",
        env = "SCYLLAPROM_WRITE_MAX_RETRIES",
        default_value = "3"
    )]
    pub max_retries: usize,

    /// Sleep between write attempts, in milliseconds.
    #[clap(
        long = "write-retry-delay-ms",
        env = "SCYLLAPROM_WRITE_RETRY_DELAY_MS",
        default_value = "2000"
    )]
    pub retry_delay_ms: u64,

    /// Per-operation database timeout, in milliseconds.
    #[clap(
        long = "session-timeout-ms",
        env = "SCYLLAPROM_SESSION_TIMEOUT_MS",
        default_value = "10000"
    )]
    pub session_timeout_ms: u64,
}

impl ScyllaConfig {
    /// The write retry delay as a [`Duration`].
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// The per-operation timeout as a [`Duration`].
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults() {
        let config = ScyllaConfig::try_parse_from(["scylla"]).unwrap();
        assert_eq!(config.hosts, vec!["127.0.0.1:9042".to_string()]);
        assert_eq!(config.keyspace, "metrics");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay(), Duration::from_millis(2000));
        assert_eq!(config.session_timeout(), Duration::from_millis(10000));
    }

    #[test]
    fn test_host_list() {
        let config = ScyllaConfig::try_parse_from([
            "scylla",
            "--scylla-hosts",
            "db-1:9042,db-2:9042,db-3:9042",
        ])
        .unwrap();
        assert_eq!(config.hosts.len(), 3);
        assert_eq!(config.hosts[2], "db-3:9042");
    }
}
