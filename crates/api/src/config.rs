//! Application configuration loaded from environment variables.

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `DATABASE_URL` — Postgres DSN; in-memory store when unset
/// - `PAYMENT_REDIRECT_URL` — where the gateway sends the customer back
/// - `OUTBOX_INTERVAL_SECS` / `TRACKING_INTERVAL_SECS` /
///   `PICKUP_INTERVAL_SECS` — background loop cadences
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub payment_redirect_url: String,
    pub outbox_interval_secs: u64,
    pub tracking_interval_secs: u64,
    pub pickup_interval_secs: u64,
    pub log_level: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            database_url: std::env::var("DATABASE_URL").ok(),
            payment_redirect_url: std::env::var("PAYMENT_REDIRECT_URL")
                .unwrap_or_else(|_| "http://localhost:3000/payment/done".to_string()),
            outbox_interval_secs: env_parse("OUTBOX_INTERVAL_SECS", 5),
            tracking_interval_secs: env_parse("TRACKING_INTERVAL_SECS", 1800),
            pickup_interval_secs: env_parse("PICKUP_INTERVAL_SECS", 86400),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: None,
            payment_redirect_url: "http://localhost:3000/payment/done".to_string(),
            outbox_interval_secs: 5,
            tracking_interval_secs: 1800,
            pickup_interval_secs: 86400,
            log_level: "info".to_string(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_url, None);
        assert_eq!(config.outbox_interval_secs, 5);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
