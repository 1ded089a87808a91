//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{DaemonError, DaemonResult};
use std::env;
use vantage_domain::Symbol;

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Exchange credentials and endpoints
    pub exchange: ExchangeConfig,

    /// Symbols to track mark prices for
    pub symbols: Vec<Symbol>,

    /// Snapshot poll interval in seconds
    pub poll_interval_secs: u64,

    /// Row limit for the order view
    pub order_limit: usize,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// Exchange configuration.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// API key
    pub api_key: String,
    /// API secret
    pub api_secret: String,
    /// Use the futures testnet
    pub testnet: bool,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (uses stubs)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let environment = Self::load_environment()?;
        let exchange = Self::load_exchange_config();
        let symbols = Self::load_symbols()?;
        let poll_interval_secs = Self::load_u64_env("VANTAGE_POLL_INTERVAL_SECS", 30)?;
        let order_limit = Self::load_u64_env("VANTAGE_ORDER_LIMIT", 50)? as usize;

        Ok(Self {
            exchange,
            symbols,
            poll_interval_secs,
            order_limit,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            exchange: ExchangeConfig {
                api_key: "test-key".to_string(),
                api_secret: "test-secret".to_string(),
                testnet: true,
            },
            symbols: vec![Symbol::new("BTCUSDT").unwrap()],
            poll_interval_secs: 1,
            order_limit: 50,
            environment: Environment::Test,
        }
    }

    fn load_environment() -> DaemonResult<Environment> {
        let env_str = env::var("VANTAGE_ENV").unwrap_or_else(|_| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid VANTAGE_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_exchange_config() -> ExchangeConfig {
        let api_key = env::var("VANTAGE_API_KEY").unwrap_or_default();
        let api_secret = env::var("VANTAGE_API_SECRET").unwrap_or_default();
        let testnet = env::var("VANTAGE_TESTNET")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        ExchangeConfig { api_key, api_secret, testnet }
    }

    fn load_symbols() -> DaemonResult<Vec<Symbol>> {
        let raw = env::var("VANTAGE_SYMBOLS").unwrap_or_else(|_| "BTCUSDT".to_string());

        raw.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                Symbol::new(part)
                    .map_err(|e| DaemonError::Config(format!("Invalid VANTAGE_SYMBOLS: {}", e)))
            })
            .collect()
    }

    fn load_u64_env(key: &str, default: u64) -> DaemonResult<u64> {
        match env::var(key) {
            Ok(val) => val
                .parse::<u64>()
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig {
                api_key: String::new(),
                api_secret: String::new(),
                testnet: false,
            },
            symbols: vec![Symbol::new("BTCUSDT").unwrap()],
            poll_interval_secs: 30,
            order_limit: 50,
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.order_limit, 50);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.symbols.len(), 1);
    }

    #[test]
    fn test_test_config() {
        let config = Config::test();

        assert!(config.exchange.testnet);
        assert_eq!(config.environment, Environment::Test);
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(Environment::Test.to_string(), "test");
        assert_eq!(Environment::Development.to_string(), "development");
        assert_eq!(Environment::Production.to_string(), "production");
    }
}
