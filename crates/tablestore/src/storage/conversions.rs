//! Entity ⇄ attribute map conversions.
//!
//! Pure functions shared by every backend. Typed conversion goes through
//! `serde_dynamo`; key and version attributes are handled explicitly.

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use tablestore_core::entity::{ETAG, PARTITION_KEY, ROW_KEY, TIMESTAMP};
use tablestore_core::{RepositoryError, TableEntity};

use super::Item;

/// Convert an entity to a stored item.
///
/// Key attributes always come from the entity's key accessors. Store-managed
/// attributes (`ETag`, `Timestamp`) are dropped so the store can assign them.
pub fn entity_to_item<T: TableEntity>(entity: &T) -> Result<Item, RepositoryError> {
    let mut item: Item = serde_dynamo::to_item(entity)
        .map_err(|e| RepositoryError::Serialization(format!("{}: {e}", T::entity_type())))?;

    item.insert(
        PARTITION_KEY.to_string(),
        AttributeValue::S(entity.partition_key().to_string()),
    );
    item.insert(
        ROW_KEY.to_string(),
        AttributeValue::S(entity.row_key().to_string()),
    );
    item.remove(ETAG);
    item.remove(TIMESTAMP);

    Ok(item)
}

/// Convert a stored item to an entity.
pub fn item_to_entity<T: TableEntity>(item: Item) -> Result<T, RepositoryError> {
    serde_dynamo::from_item(item)
        .map_err(|e| RepositoryError::Serialization(format!("{}: {e}", T::entity_type())))
}

/// Read the (PartitionKey, RowKey) pair of an item.
pub fn item_keys(item: &Item) -> Result<(String, String), RepositoryError> {
    Ok((get_string(item, PARTITION_KEY)?, get_string(item, ROW_KEY)?))
}

/// Read the version marker of an item.
pub fn item_etag(item: &Item) -> Option<&str> {
    item.get(ETAG).and_then(|v| v.as_s().ok()).map(String::as_str)
}

/// Assign a fresh version marker and timestamp. Returns the new marker.
pub fn stamp_version(item: &mut Item, now: DateTime<Utc>) -> String {
    let etag = Uuid::new_v4().to_string();
    item.insert(ETAG.to_string(), AttributeValue::S(etag.clone()));
    item.insert(TIMESTAMP.to_string(), AttributeValue::S(now.to_rfc3339()));
    etag
}

/// Get a required string attribute.
fn get_string(item: &Item, key: &str) -> Result<String, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| RepositoryError::Serialization(format!("Missing or invalid field: {key}")))
}
