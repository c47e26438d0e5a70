use async_trait::async_trait;
use serde_json::Value;

use super::{
    Attributes, Condition, CountOptions, GetOptions, ItemKey, KeySchema, Page, PageRequest,
    QueryOptions, Result, ScanOptions, StoreItem, UpdateAction,
};

/// A keyed item store (one table).
///
/// Implementations are thin adapters: they perform exactly one remote
/// round trip per call and add no retries of their own.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Name of the backing table.
    fn table_name(&self) -> &str;

    /// Primary key layout of the backing table.
    fn key_schema(&self) -> &KeySchema;

    /// Point lookup. Fails with `StoreError::NotFound` when the item is absent.
    async fn get_item(&self, key: &ItemKey, options: &GetOptions) -> Result<StoreItem>;

    /// Fetches one page of items sharing `hash_key`.
    async fn query_page(
        &self,
        hash_key: &Value,
        options: &QueryOptions,
        request: PageRequest,
    ) -> Result<Page>;

    /// Fetches one page of a table scan.
    async fn scan_page(&self, options: &ScanOptions, request: PageRequest) -> Result<Page>;

    /// Counts one page of matches; a query when `hash_key` is set, otherwise a scan.
    async fn count_page(
        &self,
        hash_key: Option<&Value>,
        options: &CountOptions,
        request: PageRequest,
    ) -> Result<Page>;

    /// Returns true if the table exists.
    async fn exists(&self) -> Result<bool>;

    /// Enables TTL on the table's configured TTL attribute, if any.
    async fn update_ttl(&self, ignore_errors: bool) -> Result<()>;

    /// Writes the whole item, replacing any existing item with the same key.
    async fn put_item(&self, item: &StoreItem, condition: Option<&Condition>) -> Result<()>;

    /// Deletes the item with `key`.
    async fn delete_item(&self, key: &ItemKey, condition: Option<&Condition>) -> Result<()>;

    /// Applies `actions` to the item with `key` and returns its new attributes.
    async fn update_item(
        &self,
        key: &ItemKey,
        actions: &[UpdateAction],
        condition: Option<&Condition>,
    ) -> Result<Attributes>;
}
