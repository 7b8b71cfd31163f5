//! Configuration for the Milvus mapper layer
//!
//! Connection settings are consumed by the host when it constructs the
//! actual backend client; the mapper itself only reads `max_retries`.

use crate::error::{MapperError, Result};
use config::{Environment, File};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Connection and behavior settings for a Milvus deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilvusConfig {
    /// Server URI, e.g. `http://localhost:19530`
    pub uri: String,

    /// API token (secured)
    #[serde(
        default,
        serialize_with = "serialize_optional_secret",
        deserialize_with = "deserialize_optional_secret"
    )]
    pub token: Option<Secret<String>>,

    /// Username for basic auth
    #[serde(default)]
    pub username: Option<String>,

    /// Password for basic auth (secured)
    #[serde(
        default,
        serialize_with = "serialize_optional_secret",
        deserialize_with = "deserialize_optional_secret"
    )]
    pub password: Option<Secret<String>>,

    /// Database name
    #[serde(default)]
    pub database: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Attempt bound for the collection-reload retry loop
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

fn default_timeout() -> u64 {
    30
}
fn default_max_retries() -> usize {
    2
}

impl Default for MilvusConfig {
    fn default() -> Self {
        Self {
            uri: "http://localhost:19530".to_string(),
            token: None,
            username: None,
            password: None,
            database: None,
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl MilvusConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?;

        let cfg: MilvusConfig = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from a TOML file with environment variable overrides
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("MILVUS_MAPPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: MilvusConfig = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.uri.is_empty() {
            return Err(MapperError::Configuration(
                "Milvus server URI is required".to_string(),
            ));
        }

        if self.max_retries == 0 {
            return Err(MapperError::Configuration(
                "max_retries must be at least 1".to_string(),
            ));
        }

        if let Some(token) = &self.token {
            if token.expose_secret().is_empty() {
                return Err(MapperError::Configuration(
                    "Token must not be empty when set".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Custom serializer for Option<Secret<String>>
fn serialize_optional_secret<S>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

/// Custom deserializer for Option<Secret<String>>
fn deserialize_optional_secret<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Secret<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.map(Secret::new))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = MilvusConfig::default();
        assert_eq!(cfg.max_retries, 2);
        assert_eq!(cfg.timeout_secs, 30);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_empty_uri() {
        let cfg = MilvusConfig {
            uri: String::new(),
            ..MilvusConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(MapperError::Configuration(_))
        ));
    }

    #[test]
    fn test_validation_rejects_zero_retries() {
        let cfg = MilvusConfig {
            max_retries: 0,
            ..MilvusConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
