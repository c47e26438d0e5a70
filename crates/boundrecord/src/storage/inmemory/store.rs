//! In-memory item store implementation.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use boundrecord_core::store::{
    compare_values, Attributes, Condition, CountOptions, GetOptions, ItemKey, ItemStore,
    KeySchema, Page, PageRequest, QueryOptions, Result, ScanOptions, StoreError, StoreItem,
    UpdateAction,
};

/// Store operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Put,
    Delete,
    Update,
    Query,
    Scan,
    Count,
    Exists,
    UpdateTtl,
}

#[derive(Debug, Default)]
struct Counters {
    gets: AtomicUsize,
    puts: AtomicUsize,
    deletes: AtomicUsize,
    updates: AtomicUsize,
    queries: AtomicUsize,
    scans: AtomicUsize,
}

/// In-memory storage backend for testing.
///
/// Behaves like a single DynamoDB table: point lookups fail with
/// `StoreError::NotFound`, writes honor conditions, and queries and scans
/// return pages with a `last_evaluated_key` when more items remain. Each
/// evaluated item costs one capacity unit.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    table_name: String,
    key_schema: KeySchema,
    indexes: HashMap<String, KeySchema>,
    ttl_attribute: Option<String>,
    items: Arc<RwLock<HashMap<String, StoreItem>>>,
    ttl_enabled: Arc<AtomicBool>,
    counters: Arc<Counters>,
    failures: Arc<Mutex<HashMap<Operation, StoreError>>>,
}

impl InMemoryStore {
    /// Creates a new empty table.
    pub fn new(table_name: impl Into<String>, key_schema: KeySchema) -> Self {
        Self {
            table_name: table_name.into(),
            key_schema,
            indexes: HashMap::new(),
            ttl_attribute: None,
            items: Arc::new(RwLock::new(HashMap::new())),
            ttl_enabled: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            failures: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Declares a secondary index usable through `index_name`.
    pub fn with_index(mut self, name: impl Into<String>, key_schema: KeySchema) -> Self {
        self.indexes.insert(name.into(), key_schema);
        self
    }

    pub fn with_ttl_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.ttl_attribute = Some(attribute.into());
        self
    }

    /// Seeds an item without touching the counters.
    pub async fn insert(&self, attributes: Attributes) -> Result<()> {
        let item = StoreItem::from_attributes(&self.key_schema, attributes)?;
        self.items
            .write()
            .await
            .insert(storage_key(item.key()), item);
        Ok(())
    }

    /// Reads an item without touching the counters.
    pub async fn item(&self, key: &ItemKey) -> Option<StoreItem> {
        self.items.read().await.get(&storage_key(key)).cloned()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Makes the next call of `operation` fail with `error`.
    pub async fn fail_next(&self, operation: Operation, error: StoreError) {
        self.failures.lock().await.insert(operation, error);
    }

    pub fn gets(&self) -> usize {
        self.counters.gets.load(AtomicOrdering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.counters.puts.load(AtomicOrdering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.counters.deletes.load(AtomicOrdering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.counters.updates.load(AtomicOrdering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.counters.queries.load(AtomicOrdering::SeqCst)
    }

    pub fn scans(&self) -> usize {
        self.counters.scans.load(AtomicOrdering::SeqCst)
    }

    pub fn ttl_enabled(&self) -> bool {
        self.ttl_enabled.load(AtomicOrdering::SeqCst)
    }

    async fn take_failure(&self, operation: Operation) -> Result<()> {
        match self.failures.lock().await.remove(&operation) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn index_schema(&self, index_name: Option<&str>) -> Result<&KeySchema> {
        match index_name {
            None => Ok(&self.key_schema),
            Some(name) => self
                .indexes
                .get(name)
                .ok_or_else(|| StoreError::QueryFailed(format!("Index not found: {}", name))),
        }
    }

    /// Items whose `index` hash key equals `hash_key`.
    async fn partition(&self, index: &KeySchema, hash_key: &Value) -> Vec<StoreItem> {
        self.items
            .read()
            .await
            .values()
            .filter(|item| item.get(&index.hash_key) == Some(hash_key))
            .cloned()
            .collect()
    }

    /// Every item carrying the `index` hash key.
    async fn all_items(&self, index: &KeySchema) -> Vec<StoreItem> {
        self.items
            .read()
            .await
            .values()
            .filter(|item| item.get(&index.hash_key).is_some())
            .cloned()
            .collect()
    }

    /// Orders, resumes and cuts one page out of `items`.
    fn page(&self, items: Vec<StoreItem>, scope: &PageScope<'_>, request: PageRequest) -> Result<Page> {
        let order_attribute = scope.index.range_key.as_deref();
        let mut candidates: Vec<Candidate> = items
            .into_iter()
            .map(|item| Candidate::new(item, order_attribute))
            .collect();
        candidates.sort_by(|a, b| a.cmp_to(&b.order, &b.position));
        if !scope.forward {
            candidates.reverse();
        }

        if let Some((segment, total_segments)) = scope.segment {
            candidates = candidates
                .into_iter()
                .enumerate()
                .filter(|(i, _)| i % total_segments == segment)
                .map(|(_, candidate)| candidate)
                .collect();
        }

        if let Some(start) = request.exclusive_start_key {
            let key = self.key_schema.key_of(&start)?;
            let order = order_attribute.and_then(|name| start.get(name).cloned());
            let position = storage_key(&key);
            let wanted = if scope.forward {
                Ordering::Greater
            } else {
                Ordering::Less
            };
            candidates.retain(|c| c.cmp_to(&order, &position) == wanted);
        }

        let limit = request.limit.unwrap_or(usize::MAX);
        let more = candidates.len() > limit;
        candidates.truncate(limit);

        let consumed = candidates.len() as f64;
        let last_evaluated_key = if more {
            candidates
                .last()
                .map(|c| self.resume_key(&c.item, scope.index))
        } else {
            None
        };

        let items = candidates
            .into_iter()
            .map(|c| c.item)
            .filter(|item| scope.filter.is_none_or(|f| f.evaluate(item.attributes())))
            .map(|item| project(item, scope.projection))
            .collect();

        let mut page = Page::of_items(items, last_evaluated_key);
        page.consumed_capacity = consumed;
        Ok(page)
    }

    /// Table key plus index key attributes of `item`.
    fn resume_key(&self, item: &StoreItem, index: &KeySchema) -> Attributes {
        let mut key = self.key_schema.key_attributes(item.key());
        let index_keys = std::iter::once(&index.hash_key).chain(index.range_key.as_ref());
        for name in index_keys {
            if let Some(value) = item.get(name) {
                key.insert(name.clone(), value.clone());
            }
        }
        key
    }
}

/// How one query or scan picks and shapes its page.
struct PageScope<'a> {
    index: &'a KeySchema,
    forward: bool,
    segment: Option<(usize, usize)>,
    filter: Option<&'a Condition>,
    projection: Option<&'a [String]>,
}

struct Candidate {
    order: Option<Value>,
    position: String,
    item: StoreItem,
}

impl Candidate {
    fn new(item: StoreItem, order_attribute: Option<&str>) -> Self {
        Self {
            order: order_attribute.and_then(|name| item.get(name).cloned()),
            position: storage_key(item.key()),
            item,
        }
    }

    fn cmp_to(&self, order: &Option<Value>, position: &str) -> Ordering {
        let by_order = match (&self.order, order) {
            (Some(a), Some(b)) => compare_values(a, b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        };
        by_order.then_with(|| self.position.as_str().cmp(position))
    }
}

fn storage_key(key: &ItemKey) -> String {
    json!([key.hash, key.range]).to_string()
}

fn project(item: StoreItem, attributes: Option<&[String]>) -> StoreItem {
    match attributes {
        None => item,
        Some(names) => {
            let key = item.key().clone();
            let projected = item
                .into_attributes()
                .into_iter()
                .filter(|(name, _)| names.contains(name))
                .collect();
            StoreItem::new(key, projected)
        }
    }
}

fn check_condition(condition: Option<&Condition>, current: Option<&StoreItem>) -> Result<()> {
    let Some(condition) = condition else {
        return Ok(());
    };
    let empty = Attributes::new();
    let attributes = current.map(StoreItem::attributes).unwrap_or(&empty);
    if condition.evaluate(attributes) {
        Ok(())
    } else {
        Err(StoreError::ConditionFailed(
            "The conditional request failed".to_string(),
        ))
    }
}

fn segment_of(segment: Option<u32>, total_segments: Option<u32>) -> Result<Option<(usize, usize)>> {
    match (segment, total_segments) {
        (None, None) => Ok(None),
        (Some(segment), Some(total)) if segment < total => {
            Ok(Some((segment as usize, total as usize)))
        }
        _ => Err(StoreError::InvalidData(
            "Segment and total_segments must be given together, with segment < total_segments"
                .to_string(),
        )),
    }
}

#[async_trait]
impl ItemStore for InMemoryStore {
    fn table_name(&self) -> &str {
        &self.table_name
    }

    fn key_schema(&self) -> &KeySchema {
        &self.key_schema
    }

    async fn get_item(&self, key: &ItemKey, options: &GetOptions) -> Result<StoreItem> {
        self.counters.gets.fetch_add(1, AtomicOrdering::SeqCst);
        self.take_failure(Operation::Get).await?;

        let items = self.items.read().await;
        let item = items
            .get(&storage_key(key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                table: self.table_name.clone(),
                key: key.to_string(),
            })?;
        Ok(project(item, options.attributes_to_get.as_deref()))
    }

    async fn query_page(
        &self,
        hash_key: &Value,
        options: &QueryOptions,
        request: PageRequest,
    ) -> Result<Page> {
        self.counters.queries.fetch_add(1, AtomicOrdering::SeqCst);
        self.take_failure(Operation::Query).await?;

        let index = self.index_schema(options.index_name.as_deref())?;
        let mut items = self.partition(index, hash_key).await;
        if let Some(condition) = &options.range_key_condition {
            items.retain(|item| condition.evaluate(item.attributes()));
        }
        let scope = PageScope {
            index,
            forward: options.scan_index_forward.unwrap_or(true),
            segment: None,
            filter: options.filter_condition.as_ref(),
            projection: options.attributes_to_get.as_deref(),
        };
        self.page(items, &scope, request)
    }

    async fn scan_page(&self, options: &ScanOptions, request: PageRequest) -> Result<Page> {
        self.counters.scans.fetch_add(1, AtomicOrdering::SeqCst);
        self.take_failure(Operation::Scan).await?;

        let index = self.index_schema(options.index_name.as_deref())?;
        let items = self.all_items(index).await;
        let scope = PageScope {
            index,
            forward: true,
            segment: segment_of(options.segment, options.total_segments)?,
            filter: options.filter_condition.as_ref(),
            projection: options.attributes_to_get.as_deref(),
        };
        self.page(items, &scope, request)
    }

    async fn count_page(
        &self,
        hash_key: Option<&Value>,
        options: &CountOptions,
        request: PageRequest,
    ) -> Result<Page> {
        self.take_failure(Operation::Count).await?;

        let index = self.index_schema(options.index_name.as_deref())?;
        let mut items = match hash_key {
            Some(hash_key) => self.partition(index, hash_key).await,
            None => self.all_items(index).await,
        };
        if let Some(condition) = &options.range_key_condition {
            items.retain(|item| condition.evaluate(item.attributes()));
        }
        let scope = PageScope {
            index,
            forward: true,
            segment: None,
            filter: options.filter_condition.as_ref(),
            projection: None,
        };
        let page = self.page(items, &scope, request)?;
        Ok(Page {
            items: Vec::new(),
            ..page
        })
    }

    async fn exists(&self) -> Result<bool> {
        self.take_failure(Operation::Exists).await?;
        Ok(true)
    }

    async fn update_ttl(&self, ignore_errors: bool) -> Result<()> {
        let Some(attribute) = &self.ttl_attribute else {
            debug!(table = %self.table_name, "No TTL attribute configured");
            return Ok(());
        };
        if let Err(err) = self.take_failure(Operation::UpdateTtl).await {
            if ignore_errors {
                warn!(table = %self.table_name, error = %err, "Ignoring TTL update failure");
                return Ok(());
            }
            return Err(err);
        }
        self.ttl_enabled.store(true, AtomicOrdering::SeqCst);
        debug!(table = %self.table_name, attribute = %attribute, "TTL enabled");
        Ok(())
    }

    async fn put_item(&self, item: &StoreItem, condition: Option<&Condition>) -> Result<()> {
        self.counters.puts.fetch_add(1, AtomicOrdering::SeqCst);
        self.take_failure(Operation::Put).await?;

        let key = storage_key(item.key());
        let mut items = self.items.write().await;
        check_condition(condition, items.get(&key))?;
        let stored = StoreItem::new(item.key().clone(), item.to_persisted(&self.key_schema));
        items.insert(key, stored);
        Ok(())
    }

    async fn delete_item(&self, key: &ItemKey, condition: Option<&Condition>) -> Result<()> {
        self.counters.deletes.fetch_add(1, AtomicOrdering::SeqCst);
        self.take_failure(Operation::Delete).await?;

        let storage_key = storage_key(key);
        let mut items = self.items.write().await;
        check_condition(condition, items.get(&storage_key))?;
        items.remove(&storage_key);
        Ok(())
    }

    async fn update_item(
        &self,
        key: &ItemKey,
        actions: &[UpdateAction],
        condition: Option<&Condition>,
    ) -> Result<Attributes> {
        self.counters.updates.fetch_add(1, AtomicOrdering::SeqCst);
        self.take_failure(Operation::Update).await?;

        if let Some(action) = actions
            .iter()
            .find(|action| self.key_schema.is_key_attribute(action.path()))
        {
            return Err(StoreError::InvalidData(format!(
                "Cannot update key attribute: {}",
                action.path()
            )));
        }

        let storage_key = storage_key(key);
        let mut items = self.items.write().await;
        let current = items.get(&storage_key);
        check_condition(condition, current)?;

        let mut attributes = match current {
            Some(item) => item.attributes().clone(),
            None => self.key_schema.key_attributes(key),
        };
        for action in actions {
            action.apply(&mut attributes)?;
        }
        items.insert(storage_key, StoreItem::new(key.clone(), attributes.clone()));
        Ok(attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap_or_default()
    }

    fn orders() -> InMemoryStore {
        InMemoryStore::new("orders", KeySchema::new("customer").with_range_key("order_id"))
    }

    async fn seeded_orders() -> InMemoryStore {
        let store = orders();
        for (order_id, total) in [(3, 30), (1, 10), (2, 20), (4, 40)] {
            let status = if total > 20 { "open" } else { "closed" };
            store
                .insert(attrs(json!({
                    "customer": "c-1",
                    "order_id": order_id,
                    "total": total,
                    "status": status,
                })))
                .await
                .unwrap();
        }
        store
            .insert(attrs(json!({"customer": "c-2", "order_id": 1, "total": 99})))
            .await
            .unwrap();
        store
    }

    fn ids(page: &Page) -> Vec<i64> {
        page.items
            .iter()
            .filter_map(|item| item.get("order_id").and_then(Value::as_i64))
            .collect()
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = InMemoryStore::new("products", KeySchema::new("id"));
        let item = StoreItem::new(ItemKey::new("abc"), attrs(json!({"name": "x"})));
        store.put_item(&item, None).await.unwrap();

        let fetched = store
            .get_item(&ItemKey::new("abc"), &GetOptions::default())
            .await
            .unwrap();
        assert_eq!(fetched.attributes(), &attrs(json!({"id": "abc", "name": "x"})));
        assert_eq!(store.puts(), 1);
        assert_eq!(store.gets(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = InMemoryStore::new("products", KeySchema::new("id"));
        let err = store
            .get_item(&ItemKey::new("missing"), &GetOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::NotFound {
                table: "products".to_string(),
                key: "missing".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_get_projection() {
        let store = InMemoryStore::new("products", KeySchema::new("id"));
        store
            .insert(attrs(json!({"id": "abc", "name": "x", "price": 100})))
            .await
            .unwrap();
        let options = GetOptions {
            consistent_read: true,
            attributes_to_get: Some(vec!["price".to_string()]),
        };
        let item = store.get_item(&ItemKey::new("abc"), &options).await.unwrap();
        assert_eq!(item.attributes(), &attrs(json!({"price": 100})));
        assert_eq!(item.key(), &ItemKey::new("abc"));
    }

    #[tokio::test]
    async fn test_conditional_put() {
        let store = InMemoryStore::new("products", KeySchema::new("id"));
        let item = StoreItem::new(ItemKey::new("abc"), Attributes::new());
        let create_only = Condition::not_exists("id");

        store.put_item(&item, Some(&create_only)).await.unwrap();
        let err = store.put_item(&item, Some(&create_only)).await.unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed(_)));
    }

    #[tokio::test]
    async fn test_query_orders_by_range_key() {
        let store = seeded_orders().await;
        let page = store
            .query_page(&json!("c-1"), &QueryOptions::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(ids(&page), vec![1, 2, 3, 4]);
        assert_eq!(page.last_evaluated_key, None);

        let options = QueryOptions {
            scan_index_forward: Some(false),
            ..Default::default()
        };
        let page = store
            .query_page(&json!("c-1"), &options, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(ids(&page), vec![4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_query_range_and_filter_conditions() {
        let store = seeded_orders().await;
        let options = QueryOptions {
            range_key_condition: Some(Condition::ge("order_id", 2)),
            filter_condition: Some(Condition::eq("status", "open")),
            ..Default::default()
        };
        let page = store
            .query_page(&json!("c-1"), &options, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(ids(&page), vec![3, 4]);
        // Filtered items still cost capacity.
        assert_eq!(page.consumed_capacity, 3.0);
    }

    #[tokio::test]
    async fn test_query_pages_resume_after_last_key() {
        let store = seeded_orders().await;
        let first = store
            .query_page(
                &json!("c-1"),
                &QueryOptions::default(),
                PageRequest {
                    exclusive_start_key: None,
                    limit: Some(3),
                },
            )
            .await
            .unwrap();
        assert_eq!(ids(&first), vec![1, 2, 3]);
        let last_key = first.last_evaluated_key.clone().unwrap();
        assert_eq!(last_key, attrs(json!({"customer": "c-1", "order_id": 3})));

        let second = store
            .query_page(
                &json!("c-1"),
                &QueryOptions::default(),
                PageRequest {
                    exclusive_start_key: Some(last_key),
                    limit: Some(3),
                },
            )
            .await
            .unwrap();
        assert_eq!(ids(&second), vec![4]);
        assert_eq!(second.last_evaluated_key, None);
    }

    #[tokio::test]
    async fn test_query_secondary_index() {
        let store = orders().with_index("by_status", KeySchema::new("status").with_range_key("total"));
        for (order_id, status, total) in [(1, "open", 50), (2, "open", 5), (3, "closed", 7)] {
            store
                .insert(attrs(json!({
                    "customer": "c-1",
                    "order_id": order_id,
                    "status": status,
                    "total": total,
                })))
                .await
                .unwrap();
        }
        let options = QueryOptions {
            index_name: Some("by_status".to_string()),
            ..Default::default()
        };
        let page = store
            .query_page(&json!("open"), &options, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(ids(&page), vec![2, 1]);

        let options = QueryOptions {
            index_name: Some("missing".to_string()),
            ..Default::default()
        };
        let err = store
            .query_page(&json!("open"), &options, PageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::QueryFailed(_)));
    }

    #[tokio::test]
    async fn test_scan_segments_partition_the_table() {
        let store = seeded_orders().await;
        let mut seen = 0;
        for segment in 0..2 {
            let options = ScanOptions {
                segment: Some(segment),
                total_segments: Some(2),
                ..Default::default()
            };
            seen += store
                .scan_page(&options, PageRequest::default())
                .await
                .unwrap()
                .items
                .len();
        }
        assert_eq!(seen, 5);

        let options = ScanOptions {
            segment: Some(2),
            total_segments: Some(2),
            ..Default::default()
        };
        assert!(store
            .scan_page(&options, PageRequest::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_count_page() {
        let store = seeded_orders().await;
        let options = CountOptions {
            filter_condition: Some(Condition::gt("total", 15)),
            ..Default::default()
        };
        let page = store
            .count_page(Some(&json!("c-1")), &options, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.count, 3);
        assert!(page.items.is_empty());

        let page = store
            .count_page(None, &CountOptions::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.count, 5);
    }

    #[tokio::test]
    async fn test_update_item_returns_new_attributes() {
        let store = seeded_orders().await;
        let key = ItemKey::new("c-1").with_range(1);
        let attributes = store
            .update_item(
                &key,
                &[
                    UpdateAction::add("total", 5),
                    UpdateAction::set("status", "paid"),
                    UpdateAction::append("notes", vec![json!("rush")]),
                ],
                Some(&Condition::exists("total")),
            )
            .await
            .unwrap();
        assert_eq!(attributes.get("total"), Some(&json!(15)));
        assert_eq!(attributes.get("status"), Some(&json!("paid")));
        assert_eq!(attributes.get("notes"), Some(&json!(["rush"])));
        assert_eq!(store.item(&key).await.unwrap().attributes(), &attributes);
    }

    #[tokio::test]
    async fn test_update_item_rejects_key_attributes() {
        let store = seeded_orders().await;
        let err = store
            .update_item(
                &ItemKey::new("c-1").with_range(1),
                &[UpdateAction::set("customer", "c-9")],
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_update_item_creates_missing_item() {
        let store = orders();
        let key = ItemKey::new("c-3").with_range(7);
        let attributes = store
            .update_item(&key, &[UpdateAction::add("visits", 1)], None)
            .await
            .unwrap();
        assert_eq!(
            attributes,
            attrs(json!({"customer": "c-3", "order_id": 7, "visits": 1}))
        );
    }

    #[tokio::test]
    async fn test_conditional_delete() {
        let store = seeded_orders().await;
        let key = ItemKey::new("c-1").with_range(1);

        let err = store
            .delete_item(&key, Some(&Condition::eq("status", "open")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed(_)));

        store.delete_item(&key, None).await.unwrap();
        assert!(store.item(&key).await.is_none());
        assert_eq!(store.len().await, 4);
    }

    #[tokio::test]
    async fn test_update_ttl() {
        let store = orders();
        store.update_ttl(false).await.unwrap();
        assert!(!store.ttl_enabled());

        let store = orders().with_ttl_attribute("expires_at");
        store
            .fail_next(Operation::UpdateTtl, StoreError::QueryFailed("boom".to_string()))
            .await;
        store.update_ttl(true).await.unwrap();
        assert!(!store.ttl_enabled());

        store.update_ttl(false).await.unwrap();
        assert!(store.ttl_enabled());
    }

    #[tokio::test]
    async fn test_fail_next_fires_once() {
        let store = seeded_orders().await;
        store
            .fail_next(
                Operation::Get,
                StoreError::ConnectionFailed("connection reset".to_string()),
            )
            .await;
        let key = ItemKey::new("c-1").with_range(1);

        let err = store
            .get_item(&key, &GetOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::ConnectionFailed("connection reset".to_string())
        );
        assert!(store.get_item(&key, &GetOptions::default()).await.is_ok());
        assert_eq!(store.gets(), 2);
    }
}
