//! Configuration management for the Mill Roll Tracking Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with MRT_ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

use shared::{validate_roll_length, DEFAULT_ROLL_LENGTH, DELIVERED_LOCATION};

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Roll generation and fulfillment settings
    #[serde(default)]
    pub production: ProductionConfig,

    /// Traceability tag settings
    pub traceability: TraceabilityConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProductionConfig {
    /// Length of a full roll in meters
    pub standard_roll_length: Decimal,

    /// Location written on rolls once delivered
    pub delivered_location: String,
}

/// Which tag form new rolls receive
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    Direct,
    Legacy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TraceabilityConfig {
    /// Base URL of the external lookup endpoint
    pub lookup_base_url: String,

    /// Secret used to sign direct lookup references
    pub signing_secret: String,

    /// Tag form for newly generated rolls
    pub payload_format: PayloadFormat,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `pretty` or `json`
    pub format: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("MRT_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("production.standard_roll_length", DEFAULT_ROLL_LENGTH)?
            .set_default("production.delivered_location", DELIVERED_LOCATION)?
            .set_default("traceability.lookup_base_url", "http://localhost:3000/trace")?
            .set_default("traceability.payload_format", "direct")?
            .set_default("logging.format", "pretty")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (MRT_ prefix)
            .add_source(
                Environment::with_prefix("MRT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(e) = validate_roll_length(self.production.standard_roll_length) {
            return Err(ConfigError::Message(format!(
                "production.standard_roll_length: {}",
                e
            )));
        }
        if self.traceability.payload_format == PayloadFormat::Direct
            && self.traceability.signing_secret.trim().is_empty()
        {
            return Err(ConfigError::Message(
                "traceability.signing_secret is required for direct payloads".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            standard_roll_length: Decimal::from(DEFAULT_ROLL_LENGTH),
            delivered_location: DELIVERED_LOCATION.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            environment: "test".to_string(),
            database: DatabaseConfig {
                url: "postgres://localhost/mill".to_string(),
                max_connections: 5,
                min_connections: 1,
            },
            production: ProductionConfig::default(),
            traceability: TraceabilityConfig {
                lookup_base_url: "https://trace.example.test".to_string(),
                signing_secret: "secret".to_string(),
                payload_format: PayloadFormat::Direct,
            },
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_defaults() {
        let production = ProductionConfig::default();
        assert_eq!(production.standard_roll_length, Decimal::from(50));
        assert_eq!(production.delivered_location, "DELIVERED");
    }

    #[test]
    fn test_validate_rejects_zero_roll_length() {
        let mut config = sample();
        config.production.standard_roll_length = Decimal::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_roll_length_beyond_centimeters() {
        let mut config = sample();
        config.production.standard_roll_length = Decimal::new(50_005, 3);
        assert!(config.validate().is_err());

        config.production.standard_roll_length = Decimal::new(5_025, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_secret_for_direct_tags() {
        let mut config = sample();
        config.traceability.signing_secret = " ".to_string();
        assert!(config.validate().is_err());

        config.traceability.payload_format = PayloadFormat::Legacy;
        assert!(config.validate().is_ok());
    }
}
