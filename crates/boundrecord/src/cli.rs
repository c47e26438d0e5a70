//! Command-line front end.
//!
//! [`Cli`] parses flags (falling back to the environment), and [`run`]
//! executes one subcommand against a schemaless [`Table`], returning the JSON
//! document to print.

use anyhow::{bail, Context, Result};
use boundrecord_core::record::{BoundRecord, ExportOptions, Table};
use boundrecord_core::store::{
    Condition, CountOptions, GetOptions, QueryOptions, ScanOptions, StoreItem,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::config::{Config, DEFAULT_HASH_KEY, DEFAULT_REGION, DEFAULT_TABLE_NAME};

/// Schemaless record: every top-level attribute is a field.
pub type Document = Map<String, Value>;

/// boundrecord - Inspect and edit items through bound records
#[derive(Debug, Parser)]
#[command(name = "boundrecord")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Table name
    #[arg(long, env = "DYNAMODB_TABLE_NAME", default_value = DEFAULT_TABLE_NAME)]
    pub table: String,

    /// Hash key attribute
    #[arg(long, env = "BOUNDRECORD_HASH_KEY", default_value = DEFAULT_HASH_KEY)]
    pub hash_key_attribute: String,

    /// Range key attribute, for composite-key tables
    #[arg(long, env = "BOUNDRECORD_RANGE_KEY")]
    pub range_key_attribute: Option<String>,

    /// TTL attribute enabled by `update-ttl`
    #[arg(long, env = "BOUNDRECORD_TTL_ATTRIBUTE")]
    pub ttl_attribute: Option<String>,

    /// Endpoint override, e.g. http://localhost:8000
    #[arg(long, env = "AWS_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// AWS region
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    pub region: String,

    /// JSON file with an array of items to load into the in-memory store
    #[arg(long)]
    pub seed: Option<std::path::PathBuf>,

    /// Output format
    #[arg(long, default_value = "pretty")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON output.
    Json,
    /// Indented JSON output.
    #[default]
    Pretty,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check whether the table exists.
    Exists,
    /// Count items in one partition, or in the whole table.
    Count {
        /// Only count items under this hash key.
        #[arg(long)]
        hash_key: Option<String>,
        /// Secondary index to count through.
        #[arg(long)]
        index: Option<String>,
        /// Stop counting after this many matches.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Get one item by key.
    Get {
        hash_key: String,
        #[arg(long)]
        range_key: Option<String>,
        /// Use a strongly consistent read.
        #[arg(long)]
        consistent: bool,
    },
    /// Query the items sharing a hash key.
    Query {
        hash_key: String,
        /// Only range keys starting with this prefix.
        #[arg(long)]
        begins_with: Option<String>,
        /// Secondary index to query.
        #[arg(long)]
        index: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        page_size: Option<usize>,
        /// Consumed capacity units per second.
        #[arg(long)]
        rate_limit: Option<f64>,
        /// Return items in descending range key order.
        #[arg(long)]
        reverse: bool,
    },
    /// Scan the table.
    Scan {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        page_size: Option<usize>,
        #[arg(long, requires = "total_segments")]
        segment: Option<u32>,
        #[arg(long, requires = "segment")]
        total_segments: Option<u32>,
        /// Consumed capacity units per second.
        #[arg(long)]
        rate_limit: Option<f64>,
    },
    /// Write a JSON document as an item, replacing any item with the same key.
    Put {
        /// JSON object carrying at least the key attributes.
        document: String,
        /// Fail instead of overwriting an existing item.
        #[arg(long)]
        create_only: bool,
    },
    /// Set one attribute of an existing item.
    Set {
        hash_key: String,
        field: String,
        /// JSON value; anything that does not parse as JSON is taken as a string.
        value: String,
        #[arg(long)]
        range_key: Option<String>,
    },
    /// Delete one item by key.
    Delete {
        hash_key: String,
        #[arg(long)]
        range_key: Option<String>,
    },
    /// Enable TTL on the configured TTL attribute.
    UpdateTtl {
        /// Log failures instead of returning them.
        #[arg(long)]
        ignore_errors: bool,
    },
}

impl Cli {
    /// Store configuration described by the parsed flags.
    pub fn config(&self) -> Config {
        Config {
            table_name: self.table.clone(),
            hash_key: self.hash_key_attribute.clone(),
            range_key: non_empty(&self.range_key_attribute),
            ttl_attribute: non_empty(&self.ttl_attribute),
            endpoint_url: non_empty(&self.endpoint_url),
            region: self.region.clone(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.is_empty())
}

/// Runs one subcommand and returns its output document.
pub async fn run(command: Commands, table: &Table<Document>, config: &Config) -> Result<Value> {
    let output = match command {
        Commands::Exists => {
            let exists = table.exists().await?;
            json!({ "table": table.table_name(), "exists": exists })
        }
        Commands::Count {
            hash_key,
            index,
            limit,
        } => {
            let options = CountOptions {
                index_name: index,
                limit,
                ..Default::default()
            };
            let count = table
                .count(hash_key.as_deref().map(parse_value), &options)
                .await?;
            json!({ "count": count })
        }
        Commands::Get {
            hash_key,
            range_key,
            consistent,
        } => {
            let options = GetOptions {
                consistent_read: consistent,
                attributes_to_get: None,
            };
            let record = table
                .get(parse_value(&hash_key), range_key.as_deref().map(parse_value), &options)
                .await?;
            Value::Object(export(&record)?)
        }
        Commands::Query {
            hash_key,
            begins_with,
            index,
            limit,
            page_size,
            rate_limit,
            reverse,
        } => {
            let range_key_condition = match (begins_with, &config.range_key) {
                (None, _) => None,
                (Some(prefix), Some(range_key)) => Some(Condition::begins_with(range_key, prefix)),
                (Some(_), None) => bail!("--begins-with needs a range key attribute"),
            };
            let options = QueryOptions {
                range_key_condition,
                index_name: index,
                scan_index_forward: Some(!reverse),
                limit,
                page_size,
                rate_limit,
                ..Default::default()
            };
            let records = table.query(parse_value(&hash_key), &options).await?;
            documents(&records)?
        }
        Commands::Scan {
            limit,
            page_size,
            segment,
            total_segments,
            rate_limit,
        } => {
            let options = ScanOptions {
                limit,
                page_size,
                segment,
                total_segments,
                rate_limit,
                ..Default::default()
            };
            let records = table.scan(&options).await?;
            documents(&records)?
        }
        Commands::Put {
            document,
            create_only,
        } => {
            let document: Document =
                serde_json::from_str(&document).context("Document must be a JSON object")?;
            let store = table.store();
            let item = StoreItem::from_attributes(store.key_schema(), document)?;
            let condition =
                create_only.then(|| Condition::not_exists(store.key_schema().hash_key.as_str()));
            store.put_item(&item, condition.as_ref()).await?;
            let record = table.from_store(item)?;
            tracing::info!(record = %record, "Saved item");
            Value::Object(saved_attributes(&record))
        }
        Commands::Set {
            hash_key,
            field,
            value,
            range_key,
        } => {
            let mut record = table
                .get(
                    parse_value(&hash_key),
                    range_key.as_deref().map(parse_value),
                    &GetOptions::default(),
                )
                .await?;
            record.set_field(&field, parse_value(&value)).await?;
            record.save(None).await?;
            tracing::info!(record = %record, field = %field, "Updated item");
            Value::Object(saved_attributes(&record))
        }
        Commands::Delete {
            hash_key,
            range_key,
        } => {
            let mut record = table
                .get(
                    parse_value(&hash_key),
                    range_key.as_deref().map(parse_value),
                    &GetOptions::default(),
                )
                .await?;
            record.delete(None).await?;
            tracing::info!(record = %record, "Deleted item");
            Value::Object(export(&record)?)
        }
        Commands::UpdateTtl { ignore_errors } => {
            if config.ttl_attribute.is_none() {
                tracing::warn!("BOUNDRECORD_TTL_ATTRIBUTE is not set, nothing to enable");
            }
            table.update_ttl(ignore_errors).await?;
            json!({ "table": table.table_name(), "ttl_attribute": config.ttl_attribute })
        }
    };

    Ok(output)
}

/// Parses a command-line value as JSON, falling back to a plain string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Formats a value for output.
pub fn format_output<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    let output = match format {
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
    };
    Ok(output)
}

fn export(record: &BoundRecord<Document>) -> Result<Document> {
    Ok(record.export(&ExportOptions::default())?)
}

fn documents(records: &[BoundRecord<Document>]) -> Result<Value> {
    let documents = records
        .iter()
        .map(|record| export(record).map(Value::Object))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(documents))
}

/// The written item's attributes, falling back to the record's fields.
fn saved_attributes(record: &BoundRecord<Document>) -> Document {
    record
        .cached_item()
        .map(|item| item.attributes().clone())
        .unwrap_or_else(|| record.fields().clone())
}

#[cfg(all(test, feature = "inmemory"))]
mod tests {
    use std::sync::Arc;

    use boundrecord_core::record::Binding;
    use boundrecord_core::store::{ItemKey, KeySchema, StoreError};

    use super::*;
    use crate::storage::InMemoryStore;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("boundrecord").chain(args.iter().copied())).unwrap()
    }

    fn config() -> Config {
        Config {
            table_name: "items".to_string(),
            hash_key: "PK".to_string(),
            range_key: None,
            ttl_attribute: None,
            endpoint_url: None,
            region: DEFAULT_REGION.to_string(),
        }
    }

    async fn seeded(items: Value) -> (InMemoryStore, Table<Document>) {
        let store = InMemoryStore::new("items", KeySchema::new("PK"));
        for item in items.as_array().cloned().unwrap_or_default() {
            store
                .insert(item.as_object().cloned().unwrap_or_default())
                .await
                .unwrap();
        }
        let table = Table::new(Arc::new(store.clone()), Binding::new("PK"));
        (store, table)
    }

    async fn stored(store: &InMemoryStore, hash_key: &str) -> Option<Value> {
        store
            .item(&ItemKey::new(hash_key))
            .await
            .map(|item| Value::Object(item.into_attributes()))
    }

    #[test]
    fn test_flags_build_config() {
        let cli = parse(&[
            "--table",
            "orders",
            "--hash-key-attribute",
            "customer",
            "--range-key-attribute",
            "order_id",
            "--region",
            "eu-west-1",
            "exists",
        ]);
        let config = cli.config();

        assert_eq!(config.table_name, "orders");
        assert_eq!(config.hash_key, "customer");
        assert_eq!(config.range_key.as_deref(), Some("order_id"));
        assert_eq!(config.region, "eu-west-1");
        assert!(matches!(cli.command, Commands::Exists));
    }

    #[test]
    fn test_parse_value_falls_back_to_string() {
        assert_eq!(parse_value("5"), json!(5));
        assert_eq!(parse_value("{\"a\": true}"), json!({"a": true}));
        assert_eq!(parse_value("abc"), json!("abc"));
    }

    #[test]
    fn test_format_output() {
        let value = json!({"a": 1});
        assert_eq!(format_output(&value, OutputFormat::Json).unwrap(), "{\"a\":1}");
        assert_eq!(
            format_output(&value, OutputFormat::Pretty).unwrap(),
            "{\n  \"a\": 1\n}"
        );
    }

    #[tokio::test]
    async fn test_put_new_item() {
        let (store, table) = seeded(json!([])).await;
        let command = parse(&["put", r#"{"PK": "a", "x": 1}"#]).command;

        let output = run(command, &table, &config()).await.unwrap();

        assert_eq!(output, json!({"PK": "a", "x": 1}));
        assert_eq!(stored(&store, "a").await, Some(json!({"PK": "a", "x": 1})));
        assert_eq!(store.puts(), 1);
    }

    #[tokio::test]
    async fn test_put_replaces_existing_item() {
        let (store, table) = seeded(json!([{"PK": "a", "x": 1, "old": true}])).await;
        let command = parse(&["put", r#"{"PK": "a", "x": 2}"#]).command;

        let output = run(command, &table, &config()).await.unwrap();

        assert_eq!(output, json!({"PK": "a", "x": 2}));
        assert_eq!(stored(&store, "a").await, Some(json!({"PK": "a", "x": 2})));
    }

    #[tokio::test]
    async fn test_put_create_only_keeps_existing_item() {
        let (store, table) = seeded(json!([{"PK": "a", "x": 1}])).await;
        let command = parse(&["put", "--create-only", r#"{"PK": "a", "x": 2}"#]).command;

        let err = run(command, &table, &config()).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::ConditionFailed(_))
        ));
        assert_eq!(stored(&store, "a").await, Some(json!({"PK": "a", "x": 1})));
    }

    #[tokio::test]
    async fn test_put_without_key_fails() {
        let (store, table) = seeded(json!([])).await;
        let command = parse(&["put", r#"{"x": 2}"#]).command;

        assert!(run(command, &table, &config()).await.is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_updates_one_attribute() {
        let (store, table) = seeded(json!([{"PK": "a", "x": 1, "y": "keep"}])).await;
        let command = parse(&["set", "a", "x", "5"]).command;

        let output = run(command, &table, &config()).await.unwrap();

        let expected = json!({"PK": "a", "x": 5, "y": "keep"});
        assert_eq!(output, expected);
        assert_eq!(stored(&store, "a").await, Some(expected));
        assert_eq!(store.puts(), 1);
    }

    #[tokio::test]
    async fn test_set_on_missing_item_fails() {
        let (store, table) = seeded(json!([])).await;
        let command = parse(&["set", "a", "x", "5"]).command;

        assert!(run(command, &table, &config()).await.is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_removes_item() {
        let (store, table) = seeded(json!([{"PK": "a", "x": 1}, {"PK": "b"}])).await;
        let command = parse(&["delete", "a"]).command;

        let output = run(command, &table, &config()).await.unwrap();

        assert_eq!(output, json!({"PK": "a", "x": 1}));
        assert_eq!(stored(&store, "a").await, None);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_and_count() {
        let (_store, table) = seeded(json!([{"PK": "a", "x": 1}, {"PK": "b"}])).await;

        let output = run(parse(&["get", "a"]).command, &table, &config())
            .await
            .unwrap();
        assert_eq!(output, json!({"PK": "a", "x": 1}));

        let output = run(parse(&["count"]).command, &table, &config())
            .await
            .unwrap();
        assert_eq!(output, json!({"count": 2}));
    }

    #[tokio::test]
    async fn test_begins_with_needs_range_key() {
        let (_store, table) = seeded(json!([])).await;
        let command = parse(&["query", "a", "--begins-with", "x"]).command;

        assert!(run(command, &table, &config()).await.is_err());
    }
}
