//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) server, which also carries the
    /// WebSocket endpoint.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Filesystem path of the SQLite message database.
    /// Env: `DB_PATH`
    /// Default: `./palaver.db`
    pub db_path: PathBuf,

    /// HMAC secret used to verify connection tokens. The token issuer is
    /// an external service sharing this secret.
    /// Env: `JWT_SECRET`
    /// Default: `dev-secret` (development only).
    pub jwt_secret: String,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Palaver Node"`
    pub instance_name: String,

    /// How long a call may stay ringing before the server force-ends it.
    /// Env: `RING_TIMEOUT_SECS`
    /// Default: `45`
    pub ring_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            db_path: PathBuf::from("./palaver.db"),
            jwt_secret: "dev-secret".to_string(),
            instance_name: "Palaver Node".to_string(),
            ring_timeout: Duration::from_secs(45),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Ok(secret) = std::env::var("JWT_SECRET") {
            if !secret.is_empty() {
                config.jwt_secret = secret;
            }
        } else {
            tracing::warn!("JWT_SECRET not set, using development default");
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Ok(val) = std::env::var("RING_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.ring_timeout = Duration::from_secs(secs);
            } else {
                tracing::warn!(value = %val, "Invalid RING_TIMEOUT_SECS, using default");
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.ring_timeout, Duration::from_secs(45));
    }
}
