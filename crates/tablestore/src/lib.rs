//! Generic repository over partitioned key-value tables.
//!
//! Entities implement [`TableEntity`] and are stored one table per type,
//! addressed by a (partition key, row key) pair. [`TableRepository`] is the
//! entry point; it runs against DynamoDB by default, or against any
//! [`storage::TableService`] such as the in-memory backend.

pub mod repository;
pub mod storage;

pub use repository::TableRepository;
pub use tablestore_core::{
    ConnectionSettings, ContinuationToken, EntityRepository, FilterCondition, KeyAttribute,
    QuerySegment, RepositoryError, Result, StorageConfig, TableEntity, TableQuery,
};
