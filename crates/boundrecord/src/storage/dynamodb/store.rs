//! DynamoDB item store implementation.
//!
//! Implements `ItemStore` from `boundrecord_core::store` on a single table.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    ConsumedCapacity, ReturnConsumedCapacity, ReturnValue, Select, TimeToLiveSpecification,
};
use aws_sdk_dynamodb::Client;
use serde_json::Value;
use tracing::{debug, warn};

use boundrecord_core::store::{
    Attributes, Condition, CountOptions, GetOptions, ItemKey, ItemStore, KeySchema, Page,
    PageRequest, QueryOptions, Result, ScanOptions, StoreError, StoreItem, UpdateAction,
};

use super::conversions::{attributes_to_item, item_to_attributes, key_to_item, Item};
use super::error::{
    map_delete_item_error, map_describe_table_error, map_get_item_error, map_put_item_error,
    map_query_error, map_scan_error, map_update_item_error, map_update_ttl_error,
};
use super::expressions::ExpressionBuilder;
use crate::config::Config;

/// DynamoDB-based item store.
///
/// Each trait call is one DynamoDB request. Query and scan projections always
/// include the table's key attributes so returned items keep their key.
#[derive(Debug, Clone)]
pub struct DynamoDbStore {
    client: Client,
    table_name: String,
    key_schema: KeySchema,
    indexes: HashMap<String, KeySchema>,
    ttl_attribute: Option<String>,
}

impl DynamoDbStore {
    /// Creates a new store with the given DynamoDB client and table layout.
    pub fn new(client: Client, table_name: impl Into<String>, key_schema: KeySchema) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            key_schema,
            indexes: HashMap::new(),
            ttl_attribute: None,
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

    /// Creates a store from configuration.
    ///
    /// Uses the AWS SDK default credential chain, with the configured region
    /// and optional endpoint override (e.g. a local DynamoDB).
    pub async fn from_config(config: &Config) -> Self {
        let mut sdk_config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint_url {
            sdk_config_loader = sdk_config_loader.endpoint_url(endpoint);
        }

        let sdk_config = sdk_config_loader.load().await;
        let store = Self::new(
            Client::new(&sdk_config),
            config.table_name.clone(),
            config.key_schema(),
        );
        match &config.ttl_attribute {
            Some(attribute) => store.with_ttl_attribute(attribute),
            None => store,
        }
    }

    /// Hash key attribute of the table or of the named index.
    fn hash_attribute(&self, index_name: Option<&str>) -> Result<&str> {
        match index_name {
            None => Ok(&self.key_schema.hash_key),
            Some(name) => self
                .indexes
                .get(name)
                .map(|index| index.hash_key.as_str())
                .ok_or_else(|| StoreError::QueryFailed(format!("Index not found: {}", name))),
        }
    }

    /// Projection that always carries the table key attributes.
    fn keyed_projection(&self, attributes: &[String]) -> Vec<String> {
        let mut projection = attributes.to_vec();
        let keys = std::iter::once(&self.key_schema.hash_key).chain(self.key_schema.range_key.as_ref());
        for key in keys {
            if !projection.contains(key) {
                projection.push(key.clone());
            }
        }
        projection
    }

    fn to_page(
        &self,
        items: Option<Vec<Item>>,
        count: i32,
        last_evaluated_key: Option<Item>,
        consumed_capacity: Option<&ConsumedCapacity>,
    ) -> Result<Page> {
        let items = items
            .unwrap_or_default()
            .iter()
            .map(|item| StoreItem::from_attributes(&self.key_schema, item_to_attributes(item)?))
            .collect::<Result<Vec<_>>>()?;
        let last_evaluated_key = last_evaluated_key
            .as_ref()
            .map(item_to_attributes)
            .transpose()?;
        Ok(Page {
            items,
            count: usize::try_from(count).unwrap_or_default(),
            last_evaluated_key,
            consumed_capacity: consumed_capacity
                .and_then(|c| c.capacity_units())
                .unwrap_or_default(),
        })
    }
}

fn page_limit(request: &PageRequest) -> Option<i32> {
    request
        .limit
        .map(|limit| i32::try_from(limit).unwrap_or(i32::MAX))
}

fn segment(value: Option<u32>) -> Option<i32> {
    value.map(|v| i32::try_from(v).unwrap_or(i32::MAX))
}

#[async_trait]
impl ItemStore for DynamoDbStore {
    fn table_name(&self) -> &str {
        &self.table_name
    }

    fn key_schema(&self) -> &KeySchema {
        &self.key_schema
    }

    async fn get_item(&self, key: &ItemKey, options: &GetOptions) -> Result<StoreItem> {
        let mut expressions = ExpressionBuilder::new();
        let projection = options
            .attributes_to_get
            .as_deref()
            .map(|attributes| expressions.projection(attributes));

        debug!(table = %self.table_name, key = %key, "GetItem");
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_item(&self.key_schema, key)))
            .consistent_read(options.consistent_read)
            .set_projection_expression(projection)
            .set_expression_attribute_names(expressions.names())
            .send()
            .await
            .map_err(|e| map_get_item_error(e, &self.table_name))?;

        match result.item {
            Some(item) => Ok(StoreItem::new(key.clone(), item_to_attributes(&item)?)),
            None => Err(StoreError::NotFound {
                table: self.table_name.clone(),
                key: key.to_string(),
            }),
        }
    }

    async fn query_page(
        &self,
        hash_key: &Value,
        options: &QueryOptions,
        request: PageRequest,
    ) -> Result<Page> {
        let mut expressions = ExpressionBuilder::new();
        let hash_attribute = self.hash_attribute(options.index_name.as_deref())?;
        let key_condition = expressions.key_condition(
            hash_attribute,
            hash_key,
            options.range_key_condition.as_ref(),
        );
        let filter = options
            .filter_condition
            .as_ref()
            .map(|condition| expressions.condition(condition));
        let projection = options
            .attributes_to_get
            .as_deref()
            .map(|attributes| expressions.projection(&self.keyed_projection(attributes)));

        debug!(table = %self.table_name, hash_key = %hash_key, "Query");
        let result = self
            .client
            .query()
            .table_name(&self.table_name)
            .set_index_name(options.index_name.clone())
            .key_condition_expression(key_condition)
            .set_filter_expression(filter)
            .set_projection_expression(projection)
            .consistent_read(options.consistent_read)
            .set_scan_index_forward(options.scan_index_forward)
            .set_limit(page_limit(&request))
            .set_exclusive_start_key(request.exclusive_start_key.as_ref().map(attributes_to_item))
            .set_expression_attribute_names(expressions.names())
            .set_expression_attribute_values(expressions.values())
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await
            .map_err(|e| map_query_error(e, &self.table_name))?;

        self.to_page(
            result.items,
            result.count,
            result.last_evaluated_key,
            result.consumed_capacity.as_ref(),
        )
    }

    async fn scan_page(&self, options: &ScanOptions, request: PageRequest) -> Result<Page> {
        let mut expressions = ExpressionBuilder::new();
        let filter = options
            .filter_condition
            .as_ref()
            .map(|condition| expressions.condition(condition));
        let projection = options
            .attributes_to_get
            .as_deref()
            .map(|attributes| expressions.projection(&self.keyed_projection(attributes)));

        debug!(table = %self.table_name, segment = ?options.segment, "Scan");
        let result = self
            .client
            .scan()
            .table_name(&self.table_name)
            .set_index_name(options.index_name.clone())
            .set_filter_expression(filter)
            .set_projection_expression(projection)
            .consistent_read(options.consistent_read)
            .set_segment(segment(options.segment))
            .set_total_segments(segment(options.total_segments))
            .set_limit(page_limit(&request))
            .set_exclusive_start_key(request.exclusive_start_key.as_ref().map(attributes_to_item))
            .set_expression_attribute_names(expressions.names())
            .set_expression_attribute_values(expressions.values())
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await
            .map_err(|e| map_scan_error(e, &self.table_name))?;

        self.to_page(
            result.items,
            result.count,
            result.last_evaluated_key,
            result.consumed_capacity.as_ref(),
        )
    }

    async fn count_page(
        &self,
        hash_key: Option<&Value>,
        options: &CountOptions,
        request: PageRequest,
    ) -> Result<Page> {
        let mut expressions = ExpressionBuilder::new();
        let filter = options
            .filter_condition
            .as_ref()
            .map(|condition| expressions.condition(condition));
        let exclusive_start_key = request.exclusive_start_key.as_ref().map(attributes_to_item);

        let Some(hash_key) = hash_key else {
            let result = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_index_name(options.index_name.clone())
                .set_filter_expression(filter)
                .consistent_read(options.consistent_read)
                .select(Select::Count)
                .set_limit(page_limit(&request))
                .set_exclusive_start_key(exclusive_start_key)
                .set_expression_attribute_names(expressions.names())
                .set_expression_attribute_values(expressions.values())
                .return_consumed_capacity(ReturnConsumedCapacity::Total)
                .send()
                .await
                .map_err(|e| map_scan_error(e, &self.table_name))?;
            return self.to_page(
                None,
                result.count,
                result.last_evaluated_key,
                result.consumed_capacity.as_ref(),
            );
        };

        let hash_attribute = self.hash_attribute(options.index_name.as_deref())?;
        let key_condition = expressions.key_condition(
            hash_attribute,
            hash_key,
            options.range_key_condition.as_ref(),
        );
        let result = self
            .client
            .query()
            .table_name(&self.table_name)
            .set_index_name(options.index_name.clone())
            .key_condition_expression(key_condition)
            .set_filter_expression(filter)
            .consistent_read(options.consistent_read)
            .select(Select::Count)
            .set_limit(page_limit(&request))
            .set_exclusive_start_key(exclusive_start_key)
            .set_expression_attribute_names(expressions.names())
            .set_expression_attribute_values(expressions.values())
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await
            .map_err(|e| map_query_error(e, &self.table_name))?;
        self.to_page(
            None,
            result.count,
            result.last_evaluated_key,
            result.consumed_capacity.as_ref(),
        )
    }

    async fn exists(&self) -> Result<bool> {
        match self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => map_describe_table_error(err),
        }
    }

    async fn update_ttl(&self, ignore_errors: bool) -> Result<()> {
        let Some(attribute) = &self.ttl_attribute else {
            debug!(table = %self.table_name, "No TTL attribute configured");
            return Ok(());
        };

        let specification = TimeToLiveSpecification::builder()
            .enabled(true)
            .attribute_name(attribute)
            .build()
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;

        let result = self
            .client
            .update_time_to_live()
            .table_name(&self.table_name)
            .time_to_live_specification(specification)
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!(table = %self.table_name, attribute = %attribute, "TTL enabled");
                Ok(())
            }
            Err(err) => {
                let err = map_update_ttl_error(err, &self.table_name);
                if ignore_errors {
                    warn!(table = %self.table_name, error = %err, "Ignoring TTL update failure");
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn put_item(&self, item: &StoreItem, condition: Option<&Condition>) -> Result<()> {
        let mut expressions = ExpressionBuilder::new();
        let condition = condition.map(|condition| expressions.condition(condition));

        debug!(table = %self.table_name, key = %item.key(), "PutItem");
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(attributes_to_item(&item.to_persisted(&self.key_schema))))
            .set_condition_expression(condition)
            .set_expression_attribute_names(expressions.names())
            .set_expression_attribute_values(expressions.values())
            .send()
            .await
            .map_err(|e| map_put_item_error(e, &self.table_name))?;

        Ok(())
    }

    async fn delete_item(&self, key: &ItemKey, condition: Option<&Condition>) -> Result<()> {
        let mut expressions = ExpressionBuilder::new();
        let condition = condition.map(|condition| expressions.condition(condition));

        debug!(table = %self.table_name, key = %key, "DeleteItem");
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_item(&self.key_schema, key)))
            .set_condition_expression(condition)
            .set_expression_attribute_names(expressions.names())
            .set_expression_attribute_values(expressions.values())
            .send()
            .await
            .map_err(|e| map_delete_item_error(e, &self.table_name))?;

        Ok(())
    }

    async fn update_item(
        &self,
        key: &ItemKey,
        actions: &[UpdateAction],
        condition: Option<&Condition>,
    ) -> Result<Attributes> {
        let mut expressions = ExpressionBuilder::new();
        let update = expressions.update(actions);
        let condition = condition.map(|condition| expressions.condition(condition));

        debug!(table = %self.table_name, key = %key, actions = actions.len(), "UpdateItem");
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_item(&self.key_schema, key)))
            .update_expression(update)
            .set_condition_expression(condition)
            .set_expression_attribute_names(expressions.names())
            .set_expression_attribute_values(expressions.values())
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| map_update_item_error(e, &self.table_name))?;

        result
            .attributes
            .as_ref()
            .map(item_to_attributes)
            .transpose()
            .map(Option::unwrap_or_default)
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_dynamodb::config::{BehaviorVersion, Region};
    use aws_sdk_dynamodb::types::AttributeValue;

    use super::*;

    fn store() -> DynamoDbStore {
        let config = aws_sdk_dynamodb::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        DynamoDbStore::new(
            Client::from_conf(config),
            "orders",
            KeySchema::new("PK").with_range_key("SK"),
        )
        .with_index("GSI1", KeySchema::new("GSI1PK").with_range_key("GSI1SK"))
    }

    #[test]
    fn test_keyed_projection_adds_key_attributes() {
        let projection = store().keyed_projection(&["total".to_string(), "SK".to_string()]);
        assert_eq!(projection, vec!["total", "SK", "PK"]);
    }

    #[test]
    fn test_hash_attribute_for_index() {
        let store = store();
        assert_eq!(store.hash_attribute(None).unwrap(), "PK");
        assert_eq!(store.hash_attribute(Some("GSI1")).unwrap(), "GSI1PK");
        assert!(matches!(
            store.hash_attribute(Some("GSI9")),
            Err(StoreError::QueryFailed(_))
        ));
    }

    #[test]
    fn test_to_page() {
        let item: Item = [
            ("PK".to_string(), AttributeValue::S("USER#1".to_string())),
            ("SK".to_string(), AttributeValue::S("ORDER#1".to_string())),
            ("total".to_string(), AttributeValue::N("12".to_string())),
        ]
        .into_iter()
        .collect();
        let last_key: Item = item
            .iter()
            .filter(|(name, _)| name.as_str() != "total")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let capacity = ConsumedCapacity::builder().capacity_units(0.5).build();

        let page = store()
            .to_page(Some(vec![item]), 1, Some(last_key), Some(&capacity))
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(
            page.items[0].key(),
            &ItemKey::new("USER#1").with_range("ORDER#1")
        );
        assert_eq!(page.count, 1);
        assert_eq!(page.consumed_capacity, 0.5);
        assert_eq!(page.last_evaluated_key.unwrap().len(), 2);
    }

    #[test]
    fn test_to_page_rejects_items_without_key() {
        let item: Item = [("total".to_string(), AttributeValue::N("12".to_string()))]
            .into_iter()
            .collect();
        assert!(matches!(
            store().to_page(Some(vec![item]), 1, None, None),
            Err(StoreError::InvalidData(_))
        ));
    }
}
