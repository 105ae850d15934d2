//! Resolver configuration.
//!
//! Supports configuration via environment variables:
//!
//! ```bash
//! # Withhold project listings from location-level principals until they
//! # pick a location (disabled by default)
//! FIELDSCOPE_LOCATION_FIRST=true
//! ```

use std::env;
use thiserror::Error;

pub const LOCATION_FIRST_VAR: &str = "FIELDSCOPE_LOCATION_FIRST";

/// Resolver policy switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Location-level principals must choose a location before a project
    /// listing returns anything.
    pub location_first: bool,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid boolean for {var}: {value}. Expected 'true', 'false', '1' or '0'")]
    InvalidBool { var: String, value: String },
}

impl ResolverConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let location_first = match env::var(LOCATION_FIRST_VAR) {
            Ok(value) => parse_bool(LOCATION_FIRST_VAR, &value)?,
            Err(_) => false,
        };

        Ok(Self { location_first })
    }

    pub fn with_location_first(mut self, enabled: bool) -> Self {
        self.location_first = enabled;
        self
    }
}

fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}
