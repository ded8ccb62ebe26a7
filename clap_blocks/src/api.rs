//! CLI config for the HTTP API.

use std::net::SocketAddr;

/// Where the remote read/write endpoints listen.
#[derive(Debug, Clone, Copy, clap::Parser)]
pub struct ApiConfig {
    /// Address for the HTTP API server to bind.
    #[clap(
        long = "api-bind",
        env = "SCYLLAPROM_API_BIND",
        default_value = "0.0.0.0:7337"
    )]
    pub bind_address: SocketAddr,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_bind() {
        let config = ApiConfig::try_parse_from(["api"]).unwrap();
        assert_eq!(config.bind_address.port(), 7337);
    }

    #[test]
    fn test_override_bind() {
        let config =
            ApiConfig::try_parse_from(["api", "--api-bind", "127.0.0.1:9000"]).unwrap();
        assert_eq!(config.bind_address.to_string(), "127.0.0.1:9000");
    }
}
