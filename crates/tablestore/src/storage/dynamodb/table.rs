//! DynamoDB table handle.

use async_trait::async_trait;
use aws_sdk_dynamodb::types::ReturnValuesOnConditionCheckFailure;
use aws_sdk_dynamodb::Client;
use chrono::Utc;

use tablestore_core::entity::key_id;
use tablestore_core::{ContinuationToken, KeyAttribute, QuerySegment, Result, TableQuery};

use super::error::{
    map_delete_item_error, map_get_item_error, map_put_item_error, map_query_error,
    map_scan_error,
};
use super::keys;
use crate::storage::conversions::stamp_version;
use crate::storage::{Item, TableClient, TableDefinition};

/// Handle to one DynamoDB table whose primary key is (PartitionKey, RowKey).
#[derive(Debug, Clone)]
pub struct DynamoDbTable {
    client: Client,
    definition: TableDefinition,
}

impl DynamoDbTable {
    pub fn new(client: Client, definition: TableDefinition) -> Self {
        Self { client, definition }
    }

    fn table_name(&self) -> &'static str {
        self.definition.table_name
    }

    async fn query_partition(
        &self,
        query: &TableQuery,
        token: Option<&ContinuationToken>,
    ) -> Result<QuerySegment<Item>> {
        let mut request = self
            .client
            .query()
            .table_name(self.table_name())
            .set_exclusive_start_key(token.map(keys::token_to_start_key))
            .set_limit(keys::page_limit(query));

        if let Some(filter) = &query.filter {
            let expr = keys::filter_expression(filter);
            let values = expr.values();
            request = request
                .key_condition_expression(expr.expression)
                .set_expression_attribute_names(Some(expr.names))
                .set_expression_attribute_values(values);
        }

        let result = request.send().await.map_err(map_query_error)?;

        Ok(QuerySegment {
            items: result.items.unwrap_or_default(),
            continuation_token: result
                .last_evaluated_key
                .as_ref()
                .and_then(keys::last_key_to_token),
        })
    }

    async fn scan(
        &self,
        query: &TableQuery,
        token: Option<&ContinuationToken>,
    ) -> Result<QuerySegment<Item>> {
        let mut request = self
            .client
            .scan()
            .table_name(self.table_name())
            .set_exclusive_start_key(token.map(keys::token_to_start_key))
            .set_limit(keys::page_limit(query));

        if let Some(filter) = &query.filter {
            let expr = keys::filter_expression(filter);
            let values = expr.values();
            request = request
                .filter_expression(expr.expression)
                .set_expression_attribute_names(Some(expr.names))
                .set_expression_attribute_values(values);
        }

        let result = request.send().await.map_err(map_scan_error)?;

        Ok(QuerySegment {
            items: result.items.unwrap_or_default(),
            continuation_token: result
                .last_evaluated_key
                .as_ref()
                .and_then(keys::last_key_to_token),
        })
    }
}

#[async_trait]
impl TableClient for DynamoDbTable {
    fn definition(&self) -> TableDefinition {
        self.definition
    }

    async fn retrieve(&self, partition_key: &str, row_key: &str) -> Result<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(self.table_name())
            .set_key(Some(keys::primary_key(partition_key, row_key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(map_get_item_error)?;

        Ok(result.item)
    }

    async fn insert_or_replace(&self, mut item: Item) -> Result<()> {
        stamp_version(&mut item, Utc::now());

        self.client
            .put_item()
            .table_name(self.table_name())
            .set_item(Some(item))
            .send()
            .await
            .map_err(map_put_item_error)?;

        Ok(())
    }

    async fn delete(&self, partition_key: &str, row_key: &str, etag: Option<&str>) -> Result<()> {
        let condition = keys::delete_condition(etag);
        let values = condition.values();

        self.client
            .delete_item()
            .table_name(self.table_name())
            .set_key(Some(keys::primary_key(partition_key, row_key)))
            .condition_expression(condition.expression)
            .set_expression_attribute_names(Some(condition.names))
            .set_expression_attribute_values(values)
            .return_values_on_condition_check_failure(ReturnValuesOnConditionCheckFailure::AllOld)
            .send()
            .await
            .map_err(|e| {
                map_delete_item_error(
                    e,
                    self.definition.entity_type,
                    key_id(partition_key, row_key),
                )
            })?;

        Ok(())
    }

    async fn query_segment(
        &self,
        query: &TableQuery,
        token: Option<&ContinuationToken>,
    ) -> Result<QuerySegment<Item>> {
        match &query.filter {
            Some(filter) if filter.attribute == KeyAttribute::PartitionKey => {
                self.query_partition(query, token).await
            }
            _ => self.scan(query, token).await,
        }
    }
}
