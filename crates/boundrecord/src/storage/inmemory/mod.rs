//! In-memory storage backend for testing.
//!
//! Items live in a `HashMap` wrapped in `Arc<RwLock<_>>`. Clones share the
//! same table, so a test can keep a handle to inspect what a record wrote.
//! Data is not persisted and will be lost when the last handle is dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! use boundrecord::storage::inmemory::InMemoryStore;
//! use boundrecord_core::store::KeySchema;
//!
//! let store = InMemoryStore::new("products", KeySchema::new("id"));
//! // Use store for testing...
//! ```

mod store;

pub use store::{InMemoryStore, Operation};
