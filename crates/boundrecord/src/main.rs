use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use boundrecord::cli::{self, Cli, Document};
use boundrecord::config::Config;
use boundrecord_core::record::{Binding, Table};
use boundrecord_core::store::ItemStore;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber; stdout is reserved for command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boundrecord=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.config();
    let store = create_store(&config, cli.seed.as_deref()).await?;

    let mut binding: Binding<Document> = Binding::new(config.hash_key.as_str());
    if let Some(range_key) = &config.range_key {
        binding = binding.with_range_key(range_key.as_str());
    }
    let table = Table::new(store, binding);

    let output = cli::run(cli.command, &table, &config).await?;
    println!("{}", cli::format_output(&output, cli.format)?);
    Ok(())
}

#[cfg(feature = "dynamodb")]
async fn create_store(config: &Config, seed: Option<&Path>) -> Result<Arc<dyn ItemStore>> {
    use boundrecord::storage::DynamoDbStore;

    if seed.is_some() {
        tracing::warn!("--seed only applies to the in-memory store, ignoring it");
    }
    tracing::info!(
        table = %config.table_name,
        region = %config.region,
        endpoint = ?config.endpoint_url,
        "Using DynamoDB store"
    );
    Ok(Arc::new(DynamoDbStore::from_config(config).await))
}

#[cfg(not(feature = "dynamodb"))]
async fn create_store(config: &Config, seed: Option<&Path>) -> Result<Arc<dyn ItemStore>> {
    use anyhow::Context;
    use boundrecord::storage::InMemoryStore;

    let mut store = InMemoryStore::new(config.table_name.clone(), config.key_schema());
    if let Some(attribute) = &config.ttl_attribute {
        store = store.with_ttl_attribute(attribute);
    }

    if let Some(path) = seed {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        let items: Vec<Document> = serde_json::from_str(&raw).with_context(|| {
            format!("Seed file {} must hold a JSON array of objects", path.display())
        })?;
        let count = items.len();
        for item in items {
            store.insert(item).await?;
        }
        tracing::info!(table = %config.table_name, count, "Seeded in-memory store");
    }

    Ok(Arc::new(store))
}
