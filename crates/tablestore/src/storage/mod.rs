//! Storage backends behind the generic repository.
//!
//! A backend provides a [`TableService`], which opens (and creates if absent)
//! a table and hands back a shared [`TableClient`]. Clients work on raw
//! attribute maps; typed conversion happens in [`conversions`].
//!
//! - [`dynamodb`]: Amazon DynamoDB via `aws-sdk-dynamodb`
//! - [`inmemory`]: ordered in-memory tables for tests and local development

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;

use tablestore_core::{ContinuationToken, QuerySegment, Result, TableEntity, TableQuery};

pub mod conversions;
pub mod dynamodb;
pub mod inmemory;

pub use dynamodb::DynamoDbTableService;
pub use inmemory::InMemoryTableService;

/// A stored row as an attribute map.
pub type Item = HashMap<String, AttributeValue>;

/// Identifies the table backing one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDefinition {
    pub table_name: &'static str,
    /// Used in `NotFound` and `PreconditionFailed` errors.
    pub entity_type: &'static str,
}

impl TableDefinition {
    pub fn of<T: TableEntity>() -> Self {
        Self {
            table_name: T::table_name(),
            entity_type: T::entity_type(),
        }
    }
}

/// Opens table handles, creating tables that do not exist yet.
#[async_trait]
pub trait TableService: Send + Sync {
    async fn open_table(&self, definition: TableDefinition) -> Result<Arc<dyn TableClient>>;
}

/// Operations on a single table, keyed by (PartitionKey, RowKey).
#[async_trait]
pub trait TableClient: Send + Sync {
    fn definition(&self) -> TableDefinition;

    /// Point lookup. `None` if no row has these keys.
    async fn retrieve(&self, partition_key: &str, row_key: &str) -> Result<Option<Item>>;

    /// Writes the row, replacing any row with the same keys.
    ///
    /// The store assigns a fresh `ETag` and `Timestamp`.
    async fn insert_or_replace(&self, item: Item) -> Result<()>;

    /// Deletes a row, optionally only if its `ETag` still equals `etag`.
    async fn delete(&self, partition_key: &str, row_key: &str, etag: Option<&str>) -> Result<()>;

    /// Executes one page of `query`, resuming after `token`.
    async fn query_segment(
        &self,
        query: &TableQuery,
        token: Option<&ContinuationToken>,
    ) -> Result<QuerySegment<Item>>;
}
