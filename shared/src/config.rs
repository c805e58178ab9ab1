//! Configuration management for Lambda functions.

use std::env;

use crate::{Error, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database host
    pub db_host: String,
    /// Database name
    pub db_name: String,
    /// ARN of the secret containing database credentials
    pub db_secret_arn: String,
    /// AWS region
    pub aws_region: String,
    /// Upper bound on pooled database connections per Lambda instance
    pub db_max_connections: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| Error::Config(format!("{} not set", key)))
        };

        let db_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.parse().map_err(|_| {
                Error::Config(format!("DATABASE_MAX_CONNECTIONS is not a number: {}", raw))
            })?,
            None => 5,
        };

        Ok(Self {
            db_host: required("DATABASE_HOST")?,
            db_name: lookup("DATABASE_NAME").unwrap_or_else(|| "clubhouse".to_string()),
            db_secret_arn: required("DATABASE_URL_SECRET_ARN")?,
            aws_region: lookup("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            db_max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_HOST", "db.internal"),
            ("DATABASE_URL_SECRET_ARN", "arn:aws:secretsmanager:db"),
        ]))
        .unwrap();

        assert_eq!(config.db_name, "clubhouse");
        assert_eq!(config.aws_region, "us-east-1");
        assert_eq!(config.db_max_connections, 5);
    }

    #[test]
    fn test_missing_host_is_config_error() {
        let err = Config::from_lookup(lookup_from(&[(
            "DATABASE_URL_SECRET_ARN",
            "arn:aws:secretsmanager:db",
        )]))
        .unwrap_err();

        assert!(matches!(err, Error::Config(msg) if msg.contains("DATABASE_HOST")));
    }

    #[test]
    fn test_bad_pool_size_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_HOST", "db.internal"),
            ("DATABASE_URL_SECRET_ARN", "arn"),
            ("DATABASE_MAX_CONNECTIONS", "lots"),
        ]))
        .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
    }
}
