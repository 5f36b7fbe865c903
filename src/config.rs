//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::jobs::DispatchConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Apply pending migrations at startup
    pub run_migrations: bool,

    /// Base URL placed in verification links
    pub frontend_base_url: String,

    pub email_sender_name: String,
    pub email_sender_address: String,

    /// Bound on one verification email attempt
    pub email_dispatch_timeout: Duration,

    pub email_dispatch_max_attempts: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10)?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = parse_or("PORT", 3000)?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let run_migrations = parse_or("RUN_MIGRATIONS", false)?;

        let frontend_base_url = env::var("FRONTEND_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let email_sender_name =
            env::var("EMAIL_SENDER_NAME").unwrap_or_else(|_| "Simple Bank".to_string());
        let email_sender_address = env::var("EMAIL_SENDER_ADDRESS")
            .unwrap_or_else(|_| "no-reply@simplebank.local".to_string());

        let email_dispatch_timeout =
            Duration::from_secs(parse_or("EMAIL_DISPATCH_TIMEOUT_SECS", 10)?);

        let email_dispatch_max_attempts = parse_or("EMAIL_DISPATCH_MAX_ATTEMPTS", 3)?;
        if email_dispatch_max_attempts == 0 {
            return Err(ConfigError::InvalidValue("EMAIL_DISPATCH_MAX_ATTEMPTS"));
        }

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            run_migrations,
            frontend_base_url,
            email_sender_name,
            email_sender_address,
            email_dispatch_timeout,
            email_dispatch_max_attempts,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Settings for the post-commit task dispatcher
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            timeout: self.email_dispatch_timeout,
            max_attempts: self.email_dispatch_max_attempts,
            frontend_base_url: self.frontend_base_url.clone(),
            ..DispatchConfig::default()
        }
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_default_when_unset() {
        let value: u32 = parse_or("SIMPLEBANK_TEST_SURELY_UNSET", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_dispatch_config_from_config() {
        let config = Config {
            database_url: "postgres://localhost/simple_bank".to_string(),
            database_max_connections: 10,
            host: "127.0.0.1".to_string(),
            port: 3000,
            environment: "production".to_string(),
            run_migrations: false,
            frontend_base_url: "https://bank.example".to_string(),
            email_sender_name: "Simple Bank".to_string(),
            email_sender_address: "no-reply@bank.example".to_string(),
            email_dispatch_timeout: Duration::from_secs(5),
            email_dispatch_max_attempts: 2,
        };

        assert!(config.is_production());
        let dispatch = config.dispatch_config();
        assert_eq!(dispatch.timeout, Duration::from_secs(5));
        assert_eq!(dispatch.max_attempts, 2);
        assert_eq!(dispatch.frontend_base_url, "https://bank.example");
        assert_eq!(dispatch.backoff, Duration::from_millis(200));
    }
}
