//! Configuration management

use anyhow::{self, Context, Result};

use crate::defaults::{DEFAULT_IMPORT_BATCH_SIZE, DEFAULT_IMPORT_MAX_FILE_BYTES, DEFAULT_NATS_URL};

/// Which lead store backs the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Process-local store, lost on restart (development only)
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mock" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("Unknown LEAD_STORE '{}' (expected 'postgres' or 'memory')", other),
        }
    }
}

/// Limits applied to every import run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSettings {
    pub max_file_bytes: u64,
    pub batch_size: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_IMPORT_MAX_FILE_BYTES,
            batch_size: DEFAULT_IMPORT_BATCH_SIZE,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// PostgreSQL connection string (required for the postgres backend)
    pub database_url: Option<String>,

    pub store_backend: StoreBackend,

    /// JWT secret key for token validation
    pub jwt_secret: String,

    pub import: ImportSettings,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url = std::env::var("NATS_URL")
            .unwrap_or_else(|_| DEFAULT_NATS_URL.to_string());

        let store_backend = match std::env::var("LEAD_STORE") {
            Ok(value) => StoreBackend::parse(&value)?,
            Err(_) => StoreBackend::Postgres,
        };

        let database_url = std::env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when LEAD_STORE is postgres");
        }

        let jwt_secret = std::env::var("JWT_SECRET")
            .context("JWT_SECRET must be set. Generate one with: openssl rand -base64 48")?;

        if jwt_secret.len() < 32 {
            anyhow::bail!(
                "JWT_SECRET must be at least 32 bytes (current: {} bytes). Generate one with: openssl rand -base64 48",
                jwt_secret.len()
            );
        }

        let import = ImportSettings {
            max_file_bytes: parse_env_or("IMPORT_MAX_FILE_BYTES", DEFAULT_IMPORT_MAX_FILE_BYTES)?,
            batch_size: parse_env_or("IMPORT_BATCH_SIZE", DEFAULT_IMPORT_BATCH_SIZE)?,
        };

        if import.batch_size == 0 {
            anyhow::bail!("IMPORT_BATCH_SIZE must be greater than zero");
        }

        Ok(Self {
            nats_url,
            database_url,
            store_backend,
            jwt_secret,
            import,
        })
    }
}

fn parse_env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_parses_known_values() {
        assert_eq!(StoreBackend::parse("postgres").unwrap(), StoreBackend::Postgres);
        assert_eq!(StoreBackend::parse(" Memory ").unwrap(), StoreBackend::Memory);
        assert!(StoreBackend::parse("sqlite").is_err());
    }

    #[test]
    fn test_import_settings_defaults() {
        let settings = ImportSettings::default();
        assert_eq!(settings.max_file_bytes, 10 * 1024 * 1024);
        assert_eq!(settings.batch_size, 100);
    }

    #[test]
    fn test_parse_env_or_falls_back_when_unset() {
        std::env::remove_var("LEADBOOK_TEST_UNSET_NUMBER");
        let value: usize = parse_env_or("LEADBOOK_TEST_UNSET_NUMBER", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_env_or_rejects_garbage() {
        std::env::set_var("LEADBOOK_TEST_BAD_NUMBER", "ten");
        let value: Result<usize> = parse_env_or("LEADBOOK_TEST_BAD_NUMBER", 1);
        assert!(value.is_err());
        std::env::remove_var("LEADBOOK_TEST_BAD_NUMBER");
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_memory_backend_needs_no_database_url() {
        std::env::set_var("LEAD_STORE", "memory");
        std::env::remove_var("DATABASE_URL");
        std::env::set_var("JWT_SECRET", "test-secret-key-for-jwt-at-least-32-bytes-long");

        let config = Config::from_env().unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert!(config.database_url.is_none());

        std::env::remove_var("LEAD_STORE");
    }
}
