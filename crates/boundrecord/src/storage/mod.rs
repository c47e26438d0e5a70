//! Storage backend implementations.
//!
//! This module provides concrete implementations of the
//! [`ItemStore`](boundrecord_core::store::ItemStore) trait. The implementations
//! are selected at compile time via feature flags.
//!
//! # Feature Flags
//!
//! - `inmemory` (default): process-local store, used by tests and local runs
//! - `dynamodb`: AWS DynamoDB store using `aws-sdk-dynamodb`
//!
//! Both can be enabled at once; the binary prefers DynamoDB when it is.
//!
//! # Examples
//!
//! Build with DynamoDB:
//! ```bash
//! cargo build -p boundrecord --features dynamodb
//! ```

#[cfg(not(any(feature = "inmemory", feature = "dynamodb")))]
compile_error!(
    "No storage backend selected. Enable 'inmemory' or 'dynamodb' feature. \
    Example: cargo build -p boundrecord --features dynamodb"
);

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

#[cfg(feature = "inmemory")]
pub use inmemory::{InMemoryStore, Operation};

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbStore;
