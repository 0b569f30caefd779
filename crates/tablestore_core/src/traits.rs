use async_trait::async_trait;

use crate::entity::TableEntity;
use crate::error::Result;

/// Typed CRUD and scan operations over one entity type.
///
/// Empty key strings are treated the same as absent keys.
#[async_trait]
pub trait EntityRepository<T: TableEntity>: Send + Sync {
    /// Returns up to `limit` entities in the store's scan order, or all of them.
    async fn all(&self, limit: Option<usize>) -> Result<Vec<T>>;

    /// Returns every entity in a partition.
    async fn list_by_partition(&self, partition_key: &str) -> Result<Vec<T>>;

    /// Looks up a single entity.
    ///
    /// With both keys this is a point lookup. With only a row key the first
    /// entity with that row key in scan order is returned. With only a
    /// partition key the result is always `None`.
    async fn get(&self, partition_key: Option<&str>, row_key: Option<&str>) -> Result<Option<T>>;

    /// Inserts the entity or replaces the stored one with the same keys.
    async fn upsert(&self, item: &T) -> Result<()>;

    /// Deletes the entity with the item's keys, checking its version marker.
    async fn delete(&self, item: &T) -> Result<()>;

    /// Looks the entity up with [`EntityRepository::get`] and deletes it.
    async fn delete_by_key(&self, partition_key: Option<&str>, row_key: Option<&str>)
        -> Result<()>;
}
