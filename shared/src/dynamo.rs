//! DynamoDB-backed record store.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client as DynamoClient;
use tracing::debug;

use crate::models::{fields, record_id, FieldValue, Item};
use crate::store::RecordStore;
use crate::{Error, Result};

/// Record store over a single DynamoDB table with a string `id` partition key.
pub struct DynamoRecordStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoRecordStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    fn key(id: &str) -> (String, AttributeValue) {
        (fields::ID.to_string(), AttributeValue::S(id.to_string()))
    }
}

#[async_trait]
impl RecordStore for DynamoRecordStore {
    async fn get(&self, id: &str) -> Result<Option<Item>> {
        let (key_name, key_value) = Self::key(id);
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(key_name, key_value)
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| Error::Store(format!("GetItem failed: {}", DisplayErrorContext(&e))))?;

        output.item.as_ref().map(item_from_attributes).transpose()
    }

    async fn put(&self, item: Item) -> Result<()> {
        let id = record_id(&item)
            .ok_or_else(|| Error::validation("record is missing a string id"))?
            .to_string();

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item_to_attributes(&item)))
            .send()
            .await
            .map_err(|e| Error::Store(format!("PutItem failed: {}", DisplayErrorContext(&e))))?;

        debug!(event_id = %id, table = %self.table_name, "Put record");
        Ok(())
    }

    async fn update_field(&self, id: &str, field: &str, value: FieldValue) -> Result<Item> {
        if field == fields::ID {
            return Err(Error::validation("the id field cannot be updated"));
        }

        let (key_name, key_value) = Self::key(id);
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(key_name, key_value)
            .update_expression("SET #field = :value")
            .condition_expression("attribute_exists(#id)")
            .expression_attribute_names("#field", field)
            .expression_attribute_names("#id", fields::ID)
            .expression_attribute_values(":value", to_attribute(&value))
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                let condition_failed = e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if condition_failed {
                    return Err(Error::NotFound(id.to_string()));
                }
                return Err(Error::Store(format!(
                    "UpdateItem failed: {}",
                    DisplayErrorContext(&e)
                )));
            }
        };

        let attributes = output
            .attributes
            .ok_or_else(|| Error::Store("UpdateItem returned no attributes".to_string()))?;
        item_from_attributes(&attributes)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let (key_name, key_value) = Self::key(id);
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(key_name, key_value)
            .send()
            .await
            .map_err(|e| Error::Store(format!("DeleteItem failed: {}", DisplayErrorContext(&e))))?;

        Ok(())
    }
}

/// Convert a record into DynamoDB attributes.
pub fn item_to_attributes(item: &Item) -> HashMap<String, AttributeValue> {
    item.iter()
        .map(|(name, value)| (name.clone(), to_attribute(value)))
        .collect()
}

/// Convert DynamoDB attributes into a record.
pub fn item_from_attributes(attributes: &HashMap<String, AttributeValue>) -> Result<Item> {
    attributes
        .iter()
        .map(|(name, value)| Ok((name.clone(), from_attribute(value)?)))
        .collect()
}

/// Numbers are written as `N` strings straight from their decimal text.
pub fn to_attribute(value: &FieldValue) -> AttributeValue {
    match value {
        FieldValue::Null => AttributeValue::Null(true),
        FieldValue::Bool(b) => AttributeValue::Bool(*b),
        FieldValue::Number(n) => AttributeValue::N(n.to_string()),
        FieldValue::String(s) => AttributeValue::S(s.clone()),
        FieldValue::List(values) => AttributeValue::L(values.iter().map(to_attribute).collect()),
        FieldValue::Map(entries) => AttributeValue::M(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), to_attribute(v)))
                .collect(),
        ),
    }
}

pub fn from_attribute(value: &AttributeValue) -> Result<FieldValue> {
    let number = |n: &String| {
        n.parse()
            .map(FieldValue::Number)
            .map_err(|e| Error::Store(format!("stored number '{}' is not a decimal: {}", n, e)))
    };

    match value {
        AttributeValue::Null(_) => Ok(FieldValue::Null),
        AttributeValue::Bool(b) => Ok(FieldValue::Bool(*b)),
        AttributeValue::N(n) => number(n),
        AttributeValue::S(s) => Ok(FieldValue::String(s.clone())),
        AttributeValue::L(values) => values
            .iter()
            .map(from_attribute)
            .collect::<Result<Vec<_>>>()
            .map(FieldValue::List),
        AttributeValue::M(entries) => entries
            .iter()
            .map(|(k, v)| Ok((k.clone(), from_attribute(v)?)))
            .collect::<Result<_>>()
            .map(FieldValue::Map),
        AttributeValue::Ss(values) => Ok(FieldValue::List(
            values.iter().cloned().map(FieldValue::String).collect(),
        )),
        AttributeValue::Ns(values) => values
            .iter()
            .map(number)
            .collect::<Result<Vec<_>>>()
            .map(FieldValue::List),
        other => Err(Error::Store(format!(
            "unsupported attribute type: {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_are_written_as_exact_text() {
        let value: FieldValue = serde_json::from_str("3.10").unwrap();
        assert_eq!(to_attribute(&value), AttributeValue::N("3.10".to_string()));
    }

    #[test]
    fn test_attributes_round_trip_preserves_fields() {
        let item: Item = serde_json::from_str(
            r#"{"id":"E1","status":"OnSale","entryCount":3.10,"open":true,"tags":["a"],"venue":{"seats":250},"notes":null}"#,
        )
        .unwrap();

        let attributes = item_to_attributes(&item);
        assert_eq!(attributes["entryCount"], AttributeValue::N("3.10".to_string()));
        assert_eq!(attributes["notes"], AttributeValue::Null(true));

        let restored = item_from_attributes(&attributes).unwrap();
        assert_eq!(restored, item);
        assert_eq!(
            serde_json::to_string(&restored["entryCount"]).unwrap(),
            "3.10"
        );
    }

    #[test]
    fn test_sets_read_back_as_lists() {
        let value = from_attribute(&AttributeValue::Ss(vec!["a".to_string(), "b".to_string()]))
            .unwrap();
        assert_eq!(value, FieldValue::List(vec!["a".into(), "b".into()]));

        let value = from_attribute(&AttributeValue::Ns(vec!["1.50".to_string()])).unwrap();
        assert_eq!(serde_json::to_string(&value).unwrap(), "[1.50]");
    }

    #[test]
    fn test_binary_is_rejected() {
        let value = AttributeValue::B(aws_sdk_dynamodb::primitives::Blob::new(vec![1, 2]));
        assert!(matches!(from_attribute(&value), Err(Error::Store(_))));
    }
}
