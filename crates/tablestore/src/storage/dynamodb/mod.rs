//! DynamoDB storage backend implementation.
//!
//! Each entity type gets its own table with a composite primary key:
//! `PartitionKey` (HASH, string) and `RowKey` (RANGE, string). Tables are
//! created on demand with on-demand (pay-per-request) billing.

mod client;
mod error;
mod keys;
mod table;

pub use client::{create_client, create_table_if_not_exists, DynamoDbTableService, DEFAULT_REGION};
pub use table::DynamoDbTable;
