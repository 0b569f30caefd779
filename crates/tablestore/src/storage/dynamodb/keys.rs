//! DynamoDB key and expression builders.
//!
//! Pure functions translating keys, continuation tokens and filter conditions
//! into request fragments. All functions are sync and have no side effects.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;

use tablestore_core::entity::{ETAG, PARTITION_KEY, ROW_KEY};
use tablestore_core::{ContinuationToken, FilterCondition, TableQuery};

use crate::storage::Item;

// ============================================================================
// Placeholders
// ============================================================================

const PK_NAME: &str = "#pk";
const RK_NAME: &str = "#rk";
const ETAG_NAME: &str = "#etag";
const FILTER_NAME: &str = "#k";
const FILTER_VALUE: &str = ":v";
const ETAG_VALUE: &str = ":etag";

/// A condition, key condition or filter expression with its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

impl Expression {
    /// Placeholder values, or `None` when the expression has none.
    ///
    /// DynamoDB rejects an empty `ExpressionAttributeValues` map.
    pub fn values(&self) -> Option<HashMap<String, AttributeValue>> {
        (!self.values.is_empty()).then(|| self.values.clone())
    }
}

// ============================================================================
// Keys
// ============================================================================

/// Generate the primary key map for a row.
pub fn primary_key(partition_key: &str, row_key: &str) -> Item {
    HashMap::from([
        (
            PARTITION_KEY.to_string(),
            AttributeValue::S(partition_key.to_string()),
        ),
        (ROW_KEY.to_string(), AttributeValue::S(row_key.to_string())),
    ])
}

/// Convert a continuation token into an `ExclusiveStartKey`.
pub fn token_to_start_key(token: &ContinuationToken) -> Item {
    primary_key(token.partition_key(), token.row_key())
}

/// Convert a `LastEvaluatedKey` into a continuation token.
///
/// Returns `None` for an empty or malformed key, which ends the query.
pub fn last_key_to_token(key: &Item) -> Option<ContinuationToken> {
    let partition_key = key.get(PARTITION_KEY)?.as_s().ok()?;
    let row_key = key.get(ROW_KEY)?.as_s().ok()?;
    Some(ContinuationToken::new(partition_key.clone(), row_key.clone()))
}

// ============================================================================
// Expressions
// ============================================================================

/// Equality expression for a filter condition.
///
/// Used as a key condition for partition filters and as a filter expression
/// for row-key filters.
pub fn filter_expression(filter: &FilterCondition) -> Expression {
    Expression {
        expression: format!("{FILTER_NAME} = {FILTER_VALUE}"),
        names: HashMap::from([(
            FILTER_NAME.to_string(),
            filter.attribute.attribute_name().to_string(),
        )]),
        values: HashMap::from([(
            FILTER_VALUE.to_string(),
            AttributeValue::S(filter.value.clone()),
        )]),
    }
}

/// Condition for DeleteItem: the row must exist and, when `etag` is given,
/// still carry that version marker.
pub fn delete_condition(etag: Option<&str>) -> Expression {
    let mut names = HashMap::from([
        (PK_NAME.to_string(), PARTITION_KEY.to_string()),
        (RK_NAME.to_string(), ROW_KEY.to_string()),
    ]);
    let mut values = HashMap::new();
    let mut expression = format!("attribute_exists({PK_NAME}) AND attribute_exists({RK_NAME})");

    if let Some(etag) = etag {
        names.insert(ETAG_NAME.to_string(), ETAG.to_string());
        values.insert(ETAG_VALUE.to_string(), AttributeValue::S(etag.to_string()));
        expression.push_str(&format!(" AND {ETAG_NAME} = {ETAG_VALUE}"));
    }

    Expression {
        expression,
        names,
        values,
    }
}

/// Per-request `Limit` for a query, if one can be applied.
pub fn page_limit(query: &TableQuery) -> Option<i32> {
    if !query.cap_is_exact() {
        return None;
    }
    query
        .take
        .map(|take| i32::try_from(take).unwrap_or(i32::MAX).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_key() {
        let key = primary_key("x", "1");
        assert_eq!(key.len(), 2);
        assert_eq!(key.get("PartitionKey").unwrap().as_s().unwrap(), "x");
        assert_eq!(key.get("RowKey").unwrap().as_s().unwrap(), "1");
    }

    #[test]
    fn test_token_round_trip() {
        let token = ContinuationToken::new("x", "2");
        let key = token_to_start_key(&token);
        assert_eq!(last_key_to_token(&key), Some(token));
    }

    #[test]
    fn test_last_key_to_token_malformed() {
        assert_eq!(last_key_to_token(&Item::new()), None);

        let mut key = primary_key("x", "1");
        key.insert("RowKey".to_string(), AttributeValue::N("1".to_string()));
        assert_eq!(last_key_to_token(&key), None);
    }

    #[test]
    fn test_partition_filter_expression() {
        let expr = filter_expression(&FilterCondition::partition_key_equals("x"));

        assert_eq!(expr.expression, "#k = :v");
        assert_eq!(expr.names.get("#k").unwrap(), "PartitionKey");
        assert_eq!(expr.values.get(":v").unwrap().as_s().unwrap(), "x");
    }

    #[test]
    fn test_row_key_filter_expression() {
        let expr = filter_expression(&FilterCondition::row_key_equals("1"));
        assert_eq!(expr.names.get("#k").unwrap(), "RowKey");
    }

    #[test]
    fn test_delete_condition_without_etag() {
        let expr = delete_condition(None);

        assert_eq!(
            expr.expression,
            "attribute_exists(#pk) AND attribute_exists(#rk)"
        );
        assert_eq!(expr.names.len(), 2);
        assert!(expr.values().is_none());
    }

    #[test]
    fn test_delete_condition_with_etag() {
        let expr = delete_condition(Some("abc"));

        assert_eq!(
            expr.expression,
            "attribute_exists(#pk) AND attribute_exists(#rk) AND #etag = :etag"
        );
        assert_eq!(expr.names.get("#etag").unwrap(), "ETag");
        let values = expr.values().unwrap();
        assert_eq!(values.get(":etag").unwrap().as_s().unwrap(), "abc");
    }

    #[test]
    fn test_page_limit() {
        assert_eq!(page_limit(&TableQuery::all()), None);
        assert_eq!(page_limit(&TableQuery::all().take(Some(25))), Some(25));
        assert_eq!(page_limit(&TableQuery::all().take(Some(0))), Some(1));
        assert_eq!(
            page_limit(&TableQuery::all().take(Some(usize::MAX))),
            Some(i32::MAX)
        );
        assert_eq!(
            page_limit(
                &TableQuery::filtered(FilterCondition::partition_key_equals("x")).take(Some(5))
            ),
            Some(5)
        );
        assert_eq!(
            page_limit(&TableQuery::filtered(FilterCondition::row_key_equals("1")).take(Some(1))),
            None
        );
    }
}
