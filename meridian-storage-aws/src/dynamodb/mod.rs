//! DynamoDB implementation of the key-value capability trait.
//!
//! Provides `DynamoKvStore`, mapping the narrow [`KeyValueStore`] surface
//! onto one DynamoDB table (partition key `dataset`, sort key `id`):
//!
//! - [`Condition`] guards become condition expressions
//! - [`UpdateAction::Add`] becomes an `ADD` action
//! - [`UpdateAction::Min`]/[`Max`] each become a conditional `SET` whose
//!   rejected guard is absorbed as a no-op — a rejected floor/ceiling
//!   write is indistinguishable from an already-wide value, and either
//!   way the attribute only ever moves in the widening direction under
//!   concurrent writers
//! - `ConditionalCheckFailedException` maps to the core conditional-failure
//!   error kind; everything else surfaces as a storage error

pub mod schema;

use crate::error::{AwsStorageError, Result};
use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
    KeysAndAttributes, ScalarAttributeType,
};
use aws_sdk_dynamodb::Client;
use aws_smithy_types::timeout::TimeoutConfig;
use meridian_core::{AttrValue, Condition, Item, KeyValueStore, UpdateAction, Updates};
use schema::{ATTR_DATASET, ATTR_ID, BATCH_GET_LIMIT};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// DynamoDB key-value store configuration
#[derive(Debug, Clone)]
pub struct DynamoConfig {
    /// DynamoDB table name
    pub table_name: String,
    /// AWS region (optional, uses SDK default if not specified)
    pub region: Option<String>,
    /// Optional endpoint override (e.g. LocalStack)
    pub endpoint: Option<String>,
    /// Timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

/// DynamoDB-backed key-value store
#[derive(Clone)]
pub struct DynamoKvStore {
    client: Client,
    table_name: String,
}

impl std::fmt::Debug for DynamoKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoKvStore")
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl DynamoKvStore {
    /// Create a new DynamoDB key-value store
    pub async fn new(sdk_config: &aws_config::SdkConfig, config: DynamoConfig) -> Result<Self> {
        if config.table_name.is_empty() {
            return Err(AwsStorageError::invalid_config("table_name is required"));
        }

        // Build DynamoDB config by inheriting from SdkConfig (preserves
        // HTTP client, retry config, sleep impl) then apply our overrides
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);

        if let Some(region) = config.region {
            builder = builder.region(aws_sdk_dynamodb::config::Region::new(region));
        }
        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if let Some(timeout_ms) = config.timeout_ms {
            let timeout_config = TimeoutConfig::builder()
                .operation_timeout(Duration::from_millis(timeout_ms))
                .build();
            builder = builder.timeout_config(timeout_config);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            table_name: config.table_name,
        })
    }

    /// Create from a pre-built client (for testing)
    pub fn from_client(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }

    /// Provision the table (pay-per-request, dataset/id key schema).
    /// Intended for tooling and local stacks; no-ops are the caller's
    /// concern.
    pub async fn create_table(&self) -> Result<()> {
        self.client
            .create_table()
            .table_name(&self.table_name)
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(ATTR_DATASET)
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .map_err(|e| AwsStorageError::dynamodb(e.to_string()))?,
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(ATTR_ID)
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .map_err(|e| AwsStorageError::dynamodb(e.to_string()))?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(ATTR_DATASET)
                    .key_type(KeyType::Hash)
                    .build()
                    .map_err(|e| AwsStorageError::dynamodb(e.to_string()))?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(ATTR_ID)
                    .key_type(KeyType::Range)
                    .build()
                    .map_err(|e| AwsStorageError::dynamodb(e.to_string()))?,
            )
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| AwsStorageError::dynamodb(format!("CreateTable failed: {e}")))?;
        debug!(table = %self.table_name, "created table");
        Ok(())
    }

    fn key(dataset: &str, key: &str) -> HashMap<String, AttributeValue> {
        HashMap::from([
            (ATTR_DATASET.to_string(), AttributeValue::S(dataset.to_string())),
            (ATTR_ID.to_string(), AttributeValue::S(key.to_string())),
        ])
    }

    fn is_put_conditional_check_failed(err: &SdkError<PutItemError>) -> bool {
        match err {
            SdkError::ServiceError(service_err) => matches!(
                service_err.err(),
                PutItemError::ConditionalCheckFailedException(_)
            ),
            _ => false,
        }
    }

    fn is_update_conditional_check_failed(err: &SdkError<UpdateItemError>) -> bool {
        match err {
            SdkError::ServiceError(service_err) => matches!(
                service_err.err(),
                UpdateItemError::ConditionalCheckFailedException(_)
            ),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Attribute and expression mapping
// ---------------------------------------------------------------------------

fn to_attribute_value(value: &AttrValue) -> AttributeValue {
    match value {
        AttrValue::S(s) => AttributeValue::S(s.clone()),
        AttrValue::N(n) => AttributeValue::N(format!("{n}")),
        AttrValue::B(b) => AttributeValue::B(Blob::new(b.clone())),
    }
}

fn from_attribute_value(value: &AttributeValue) -> Option<AttrValue> {
    match value {
        AttributeValue::S(s) => Some(AttrValue::S(s.clone())),
        AttributeValue::N(n) => n.parse::<f64>().ok().map(AttrValue::N),
        AttributeValue::B(b) => Some(AttrValue::B(b.as_ref().to_vec())),
        _ => None,
    }
}

fn to_dynamo_item(item: &Item) -> HashMap<String, AttributeValue> {
    item.iter()
        .map(|(name, value)| (name.clone(), to_attribute_value(value)))
        .collect()
}

fn from_dynamo_item(attrs: &HashMap<String, AttributeValue>) -> Item {
    attrs
        .iter()
        .filter_map(|(name, value)| {
            from_attribute_value(value).map(|value| (name.clone(), value))
        })
        .collect()
}

/// A condition rendered to expression pieces.
struct RenderedCondition {
    expression: String,
    names: Vec<(String, String)>,
    values: Vec<(String, AttributeValue)>,
}

fn render_condition(condition: &Condition) -> RenderedCondition {
    match condition {
        Condition::AttributeNotExists(name) => RenderedCondition {
            expression: "attribute_not_exists(#cond)".to_string(),
            names: vec![("#cond".to_string(), name.clone())],
            values: vec![],
        },
        Condition::AttributeExists(name) => RenderedCondition {
            expression: "attribute_exists(#cond)".to_string(),
            names: vec![("#cond".to_string(), name.clone())],
            values: vec![],
        },
        Condition::AttributeEquals(name, expected) => RenderedCondition {
            expression: "#cond = :cond".to_string(),
            names: vec![("#cond".to_string(), name.clone())],
            values: vec![(":cond".to_string(), to_attribute_value(expected))],
        },
    }
}

#[async_trait]
impl KeyValueStore for DynamoKvStore {
    async fn get_item(&self, dataset: &str, key: &str) -> meridian_core::Result<Option<Item>> {
        let response = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(dataset, key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| AwsStorageError::dynamodb(format!("GetItem failed: {e}")))?;

        Ok(response.item().map(from_dynamo_item))
    }

    async fn put_item(
        &self,
        item: Item,
        condition: Option<Condition>,
    ) -> meridian_core::Result<()> {
        let mut request = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(to_dynamo_item(&item)));

        if let Some(condition) = &condition {
            let rendered = render_condition(condition);
            request = request.condition_expression(rendered.expression);
            for (placeholder, name) in rendered.names {
                request = request.expression_attribute_names(placeholder, name);
            }
            for (placeholder, value) in rendered.values {
                request = request.expression_attribute_values(placeholder, value);
            }
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(e) if Self::is_put_conditional_check_failed(&e) => {
                Err(AwsStorageError::ConditionalCheckFailed.into())
            }
            Err(e) => {
                Err(AwsStorageError::dynamodb(format!("PutItem failed: {e}")).into())
            }
        }
    }

    async fn update_item(
        &self,
        dataset: &str,
        key: &str,
        updates: Updates,
        condition: Option<Condition>,
    ) -> meridian_core::Result<()> {
        // Straight mutations (SET/ADD/REMOVE) go in one atomic UpdateItem;
        // each Min/Max becomes its own conditional SET below.
        let mut set_parts: Vec<String> = Vec::new();
        let mut add_parts: Vec<String> = Vec::new();
        let mut remove_parts: Vec<String> = Vec::new();
        let mut names: Vec<(String, String)> = Vec::new();
        let mut values: Vec<(String, AttributeValue)> = Vec::new();
        let mut floors: Vec<(String, f64, bool)> = Vec::new(); // (name, value, is_min)

        for (i, (name, action)) in updates.iter().enumerate() {
            let name_ph = format!("#u{i}");
            let value_ph = format!(":u{i}");
            match action {
                UpdateAction::Put(value) => {
                    set_parts.push(format!("{name_ph} = {value_ph}"));
                    names.push((name_ph, name.clone()));
                    values.push((value_ph, to_attribute_value(value)));
                }
                UpdateAction::Add(delta) => {
                    add_parts.push(format!("{name_ph} {value_ph}"));
                    names.push((name_ph, name.clone()));
                    values.push((value_ph, AttributeValue::N(format!("{delta}"))));
                }
                UpdateAction::Remove => {
                    remove_parts.push(name_ph.clone());
                    names.push((name_ph, name.clone()));
                }
                UpdateAction::Min(value) => floors.push((name.clone(), *value, true)),
                UpdateAction::Max(value) => floors.push((name.clone(), *value, false)),
            }
        }

        if !set_parts.is_empty() || !add_parts.is_empty() || !remove_parts.is_empty() {
            let mut expression = String::new();
            if !set_parts.is_empty() {
                expression.push_str(&format!("SET {}", set_parts.join(", ")));
            }
            if !add_parts.is_empty() {
                if !expression.is_empty() {
                    expression.push(' ');
                }
                expression.push_str(&format!("ADD {}", add_parts.join(", ")));
            }
            if !remove_parts.is_empty() {
                if !expression.is_empty() {
                    expression.push(' ');
                }
                expression.push_str(&format!("REMOVE {}", remove_parts.join(", ")));
            }

            let mut request = self
                .client
                .update_item()
                .table_name(&self.table_name)
                .set_key(Some(Self::key(dataset, key)))
                .update_expression(expression);

            for (placeholder, name) in names {
                request = request.expression_attribute_names(placeholder, name);
            }
            for (placeholder, value) in values {
                request = request.expression_attribute_values(placeholder, value);
            }
            if let Some(condition) = &condition {
                let rendered = render_condition(condition);
                request = request.condition_expression(rendered.expression);
                for (placeholder, name) in rendered.names {
                    request = request.expression_attribute_names(placeholder, name);
                }
                for (placeholder, value) in rendered.values {
                    request = request.expression_attribute_values(placeholder, value);
                }
            }

            match request.send().await {
                Ok(_) => {}
                Err(e) if Self::is_update_conditional_check_failed(&e) => {
                    return Err(AwsStorageError::ConditionalCheckFailed.into());
                }
                Err(e) => {
                    return Err(
                        AwsStorageError::dynamodb(format!("UpdateItem failed: {e}")).into()
                    );
                }
            }
        }

        for (name, value, is_min) in floors {
            let comparison = if is_min { ">" } else { "<" };
            let mut expression =
                format!("(attribute_not_exists(#a) OR #a {comparison} :v)");
            let mut request = self
                .client
                .update_item()
                .table_name(&self.table_name)
                .set_key(Some(Self::key(dataset, key)))
                .update_expression("SET #a = :v")
                .expression_attribute_names("#a", name)
                .expression_attribute_values(":v", AttributeValue::N(format!("{value}")));

            if let Some(condition) = &condition {
                let rendered = render_condition(condition);
                expression = format!("({}) AND {}", rendered.expression, expression);
                for (placeholder, cond_name) in rendered.names {
                    request = request.expression_attribute_names(placeholder, cond_name);
                }
                for (placeholder, cond_value) in rendered.values {
                    request = request.expression_attribute_values(placeholder, cond_value);
                }
            }

            match request.condition_expression(expression).send().await {
                Ok(_) => {}
                // Existing value is already at least as wide (or the
                // caller's guard did not hold); either way this write is a
                // no-op, which is the contract for floor/ceiling moves.
                Err(e) if Self::is_update_conditional_check_failed(&e) => {}
                Err(e) => {
                    return Err(
                        AwsStorageError::dynamodb(format!("UpdateItem failed: {e}")).into()
                    );
                }
            }
        }

        Ok(())
    }

    async fn query_prefix(
        &self,
        dataset: &str,
        key_prefix: &str,
    ) -> meridian_core::Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut last_evaluated_key = None;

        loop {
            let mut request = self
                .client
                .query()
                .table_name(&self.table_name)
                .expression_attribute_names("#ds", ATTR_DATASET)
                .expression_attribute_values(":ds", AttributeValue::S(dataset.to_string()));

            if key_prefix.is_empty() {
                request = request.key_condition_expression("#ds = :ds");
            } else {
                request = request
                    .key_condition_expression("#ds = :ds AND begins_with(#id, :prefix)")
                    .expression_attribute_names("#id", ATTR_ID)
                    .expression_attribute_values(
                        ":prefix",
                        AttributeValue::S(key_prefix.to_string()),
                    );
            }
            if let Some(key) = last_evaluated_key.take() {
                request = request.set_exclusive_start_key(Some(key));
            }

            let response = request
                .send()
                .await
                .map_err(|e| AwsStorageError::dynamodb(format!("Query failed: {e}")))?;

            for item in response.items() {
                items.push(from_dynamo_item(item));
            }

            match response.last_evaluated_key() {
                Some(key) if !key.is_empty() => {
                    last_evaluated_key = Some(key.clone());
                }
                _ => break,
            }
        }

        Ok(items)
    }

    async fn batch_get(
        &self,
        dataset: &str,
        keys: &[String],
    ) -> meridian_core::Result<Vec<Item>> {
        let mut items = Vec::new();

        for chunk in keys.chunks(BATCH_GET_LIMIT) {
            let mut pending: Vec<HashMap<String, AttributeValue>> =
                chunk.iter().map(|key| Self::key(dataset, key)).collect();

            while !pending.is_empty() {
                let mut request_keys = KeysAndAttributes::builder();
                for key in pending.drain(..) {
                    request_keys = request_keys.keys(key);
                }
                let request_keys = request_keys
                    .build()
                    .map_err(|e| AwsStorageError::dynamodb(e.to_string()))?;

                let response = self
                    .client
                    .batch_get_item()
                    .request_items(&self.table_name, request_keys)
                    .send()
                    .await
                    .map_err(|e| {
                        AwsStorageError::dynamodb(format!("BatchGetItem failed: {e}"))
                    })?;

                if let Some(responses) = response.responses() {
                    if let Some(found) = responses.get(&self.table_name) {
                        for item in found {
                            items.push(from_dynamo_item(item));
                        }
                    }
                }

                // Throttled keys come back unprocessed; keep draining them.
                if let Some(unprocessed) = response.unprocessed_keys() {
                    if let Some(remaining) = unprocessed.get(&self.table_name) {
                        pending.extend(remaining.keys().iter().cloned());
                    }
                }
            }
        }

        Ok(items)
    }

    async fn delete_item(&self, dataset: &str, key: &str) -> meridian_core::Result<()> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(dataset, key)))
            .send()
            .await
            .map_err(|e| AwsStorageError::dynamodb(format!("DeleteItem failed: {e}")))?;
        Ok(())
    }

    async fn scan(&self) -> meridian_core::Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut last_evaluated_key = None;

        loop {
            let mut request = self.client.scan().table_name(&self.table_name);
            if let Some(key) = last_evaluated_key.take() {
                request = request.set_exclusive_start_key(Some(key));
            }

            let response = request
                .send()
                .await
                .map_err(|e| AwsStorageError::dynamodb(format!("Scan failed: {e}")))?;

            for item in response.items() {
                items.push(from_dynamo_item(item));
            }

            match response.last_evaluated_key() {
                Some(key) if !key.is_empty() => {
                    last_evaluated_key = Some(key.clone());
                }
                _ => break,
            }
        }

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_value_mapping_roundtrips() {
        let cases = [
            AttrValue::S("hello".to_string()),
            AttrValue::N(-12.01),
            AttrValue::N(1700000000000.0),
            AttrValue::B(vec![1, 2, 3]),
        ];
        for value in cases {
            let mapped = to_attribute_value(&value);
            assert_eq!(from_attribute_value(&mapped), Some(value));
        }
    }

    #[test]
    fn condition_rendering() {
        let rendered = render_condition(&Condition::AttributeNotExists("id".to_string()));
        assert_eq!(rendered.expression, "attribute_not_exists(#cond)");
        assert_eq!(rendered.names, vec![("#cond".to_string(), "id".to_string())]);
        assert!(rendered.values.is_empty());

        let rendered = render_condition(&Condition::AttributeEquals(
            "version".to_string(),
            AttrValue::N(12.0),
        ));
        assert_eq!(rendered.expression, "#cond = :cond");
        assert_eq!(rendered.values.len(), 1);
    }

    #[test]
    fn dynamo_item_mapping_roundtrips() {
        let mut item = Item::new();
        item.insert("dataset".to_string(), AttrValue::S("default".to_string()));
        item.insert("id".to_string(), AttrValue::S("id!f1".to_string()));
        item.insert("version".to_string(), AttrValue::N(42.0));
        item.insert("val".to_string(), AttrValue::B(b"{}".to_vec()));

        let mapped = to_dynamo_item(&item);
        assert_eq!(from_dynamo_item(&mapped), item);
    }
}
