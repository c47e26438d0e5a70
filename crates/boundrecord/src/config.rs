use std::env;

use boundrecord_core::store::KeySchema;

pub const DEFAULT_TABLE_NAME: &str = "boundrecord";
pub const DEFAULT_HASH_KEY: &str = "PK";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Store configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Table name (default: "boundrecord")
    pub table_name: String,
    /// Hash key attribute name (default: "PK")
    pub hash_key: String,
    /// Range key attribute name, for composite-key tables
    pub range_key: Option<String>,
    /// TTL attribute enabled by `update_ttl`
    pub ttl_attribute: Option<String>,
    /// Endpoint override, e.g. a local DynamoDB
    pub endpoint_url: Option<String>,
    /// AWS region (default: "us-east-1")
    pub region: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DYNAMODB_TABLE_NAME` - Table name (default: "boundrecord")
    /// - `BOUNDRECORD_HASH_KEY` - Hash key attribute (default: "PK")
    /// - `BOUNDRECORD_RANGE_KEY` - Range key attribute (optional)
    /// - `BOUNDRECORD_TTL_ATTRIBUTE` - TTL attribute (optional)
    /// - `AWS_ENDPOINT_URL` - Endpoint override (optional)
    /// - `AWS_REGION` - AWS region (default: "us-east-1")
    pub fn from_env() -> Self {
        Self {
            table_name: env::var("DYNAMODB_TABLE_NAME")
                .unwrap_or_else(|_| DEFAULT_TABLE_NAME.to_string()),
            hash_key: env::var("BOUNDRECORD_HASH_KEY")
                .unwrap_or_else(|_| DEFAULT_HASH_KEY.to_string()),
            range_key: non_empty_var("BOUNDRECORD_RANGE_KEY"),
            ttl_attribute: non_empty_var("BOUNDRECORD_TTL_ATTRIBUTE"),
            endpoint_url: non_empty_var("AWS_ENDPOINT_URL"),
            region: env::var("AWS_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string()),
        }
    }

    /// Primary key layout described by this configuration.
    pub fn key_schema(&self) -> KeySchema {
        let schema = KeySchema::new(&self.hash_key);
        match &self.range_key {
            Some(range_key) => schema.with_range_key(range_key),
            None => schema,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            table_name: "orders".to_string(),
            hash_key: "customer".to_string(),
            range_key: None,
            ttl_attribute: None,
            endpoint_url: None,
            region: "us-east-1".to_string(),
        }
    }

    #[test]
    fn test_key_schema_hash_only() {
        let schema = config().key_schema();
        assert_eq!(schema.hash_key, "customer");
        assert_eq!(schema.range_key, None);
    }

    #[test]
    fn test_key_schema_composite() {
        let config = Config {
            range_key: Some("order_id".to_string()),
            ..config()
        };
        assert_eq!(config.key_schema().range_key.as_deref(), Some("order_id"));
    }

    #[test]
    fn test_default_values() {
        // Clear environment variables to test defaults
        env::remove_var("DYNAMODB_TABLE_NAME");
        env::remove_var("BOUNDRECORD_HASH_KEY");
        env::remove_var("BOUNDRECORD_RANGE_KEY");
        env::remove_var("BOUNDRECORD_TTL_ATTRIBUTE");
        env::remove_var("AWS_ENDPOINT_URL");
        env::remove_var("AWS_REGION");

        let config = Config::from_env();

        assert_eq!(config.table_name, "boundrecord");
        assert_eq!(config.hash_key, "PK");
        assert_eq!(config.range_key, None);
        assert_eq!(config.ttl_attribute, None);
        assert_eq!(config.endpoint_url, None);
        assert_eq!(config.region, "us-east-1");
    }
}
