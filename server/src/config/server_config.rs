use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

/// Push server for Matatena rooms.
#[derive(Parser, Debug, Clone)]
#[command(name = "matatena-server", version, about)]
pub struct ServerConfig {
    #[arg(long, env = "MATATENA_WS_ADDR", default_value = "127.0.0.1:9003")]
    pub addr: SocketAddr,

    #[arg(long, env = "MONGO_URI", default_value = "mongodb://localhost:27017")]
    pub mongo_uri: String,

    #[arg(long, env = "MATATENA_DB", default_value = "matatena")]
    pub database: String,

    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(long, env = "MATATENA_STRICT_RULES")]
    pub strict_rules: bool,

    /// Seconds a new connection has to send its `authenticate` message.
    #[arg(long, env = "MATATENA_HANDSHAKE_TIMEOUT_SECS", default_value_t = 10)]
    pub handshake_timeout_secs: u64,
}

impl ServerConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config =
            ServerConfig::try_parse_from(["matatena-server", "--jwt-secret", "k"]).unwrap();
        assert_eq!(config.addr.port(), 9003);
        assert_eq!(config.handshake_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn addr_must_parse() {
        assert!(ServerConfig::try_parse_from([
            "matatena-server",
            "--jwt-secret",
            "k",
            "--addr",
            "not-an-addr"
        ])
        .is_err());
    }
}
