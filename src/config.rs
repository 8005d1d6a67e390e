use std::env;
use std::time::Duration;

/// Longest retention whose millisecond span still fits in an `i64`
pub const MAX_RETENTION_SECONDS: i64 = i64::MAX / 1000;

/// Relay configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind address (0.0.0.0 for LAN, 127.0.0.1 for localhost)
    pub bind_addr: String,
    /// PostgreSQL database URL; the durable store is disabled when unset
    pub database_url: Option<String>,
    /// How far back raw samples are retained, in seconds
    pub retention_seconds: i64,
    /// In-memory detection events kept before compaction
    pub ledger_capacity: usize,
    /// Events kept after the ledger compacts
    pub ledger_compact_to: usize,
    /// Upper bound for any single durable-store call
    pub store_timeout_ms: u64,
    /// Pending durable writes before new ones are dropped
    pub mirror_queue_capacity: usize,
    /// Per-subscriber outbound queue depth
    pub subscriber_buffer: usize,
    /// Maximum accepted request body in bytes
    pub max_body_bytes: usize,
    /// CORS allowed origins; a single "*" allows any
    pub cors_origins: Vec<String>,
    /// Interval between background eviction sweeps
    pub sweep_interval_seconds: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: 3100,
            bind_addr: "0.0.0.0".to_string(),
            database_url: None,
            retention_seconds: 3600,
            ledger_capacity: 2000,
            ledger_compact_to: 1500,
            store_timeout_ms: 3000,
            mirror_queue_capacity: 1024,
            subscriber_buffer: 256,
            max_body_bytes: 256 * 1024,
            cors_origins: vec!["*".to_string()],
            sweep_interval_seconds: 60,
        }
    }
}

impl RelayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let port = match env::var("RELAY_PORT").or_else(|_| env::var("PORT")) {
            Ok(v) => v.parse().map_err(|_| ConfigError::InvalidPort)?,
            Err(_) => defaults.port,
        };

        let config = Self {
            port,
            bind_addr: env::var("RELAY_BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty()),
            retention_seconds: parse_var("SIGNAL_RETENTION_SECONDS", defaults.retention_seconds)?,
            ledger_capacity: parse_var("LEDGER_CAPACITY", defaults.ledger_capacity)?,
            ledger_compact_to: parse_var("LEDGER_COMPACT_TO", defaults.ledger_compact_to)?,
            store_timeout_ms: parse_var("STORE_TIMEOUT_MS", defaults.store_timeout_ms)?,
            mirror_queue_capacity: parse_var(
                "MIRROR_QUEUE_CAPACITY",
                defaults.mirror_queue_capacity,
            )?,
            subscriber_buffer: parse_var("SUBSCRIBER_BUFFER", defaults.subscriber_buffer)?,
            max_body_bytes: parse_var("MAX_BODY_BYTES", defaults.max_body_bytes)?,
            cors_origins: env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            sweep_interval_seconds: parse_var(
                "SWEEP_INTERVAL_SECONDS",
                defaults.sweep_interval_seconds,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_seconds <= 0 || self.retention_seconds > MAX_RETENTION_SECONDS {
            return Err(ConfigError::InvalidValue(format!(
                "SIGNAL_RETENTION_SECONDS must be between 1 and {MAX_RETENTION_SECONDS}"
            )));
        }
        if self.ledger_capacity == 0 || self.ledger_compact_to >= self.ledger_capacity {
            return Err(ConfigError::InvalidValue(
                "LEDGER_COMPACT_TO must be smaller than a non-zero LEDGER_CAPACITY".to_string(),
            ));
        }
        if self.mirror_queue_capacity == 0 || self.subscriber_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "queue capacities must be non-zero".to_string(),
            ));
        }
        if self.store_timeout_ms == 0 || self.sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "timeouts and intervals must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the full bind address (addr:port)
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn retention_ms(&self) -> i64 {
        self.retention_seconds.saturating_mul(1000)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{name}={raw}"))),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
