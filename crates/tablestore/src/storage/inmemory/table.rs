//! In-memory table handle.

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use tablestore_core::entity::{key_id, ETAG_WILDCARD};
use tablestore_core::{
    ContinuationToken, FilterCondition, KeyAttribute, QuerySegment, RepositoryError, Result,
    TableQuery,
};

use crate::storage::conversions::{item_etag, item_keys, stamp_version};
use crate::storage::{Item, TableClient, TableDefinition};

type RowKey = (String, String);

/// A table stored in an ordered map keyed by (PartitionKey, RowKey).
///
/// Scan order is key order. Every page reads at most `page_size` rows, so a
/// small page size makes multi-page queries easy to exercise.
#[derive(Debug)]
pub struct InMemoryTable {
    definition: TableDefinition,
    page_size: usize,
    rows: RwLock<BTreeMap<RowKey, Item>>,
}

impl InMemoryTable {
    pub fn new(definition: TableDefinition, page_size: usize) -> Self {
        Self {
            definition,
            page_size: page_size.max(1),
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored rows.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl TableClient for InMemoryTable {
    fn definition(&self) -> TableDefinition {
        self.definition
    }

    async fn retrieve(&self, partition_key: &str, row_key: &str) -> Result<Option<Item>> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(&(partition_key.to_string(), row_key.to_string()))
            .cloned())
    }

    async fn insert_or_replace(&self, mut item: Item) -> Result<()> {
        let key = item_keys(&item)?;
        stamp_version(&mut item, Utc::now());

        let mut rows = self.rows.write().await;
        rows.insert(key, item);
        Ok(())
    }

    async fn delete(&self, partition_key: &str, row_key: &str, etag: Option<&str>) -> Result<()> {
        let key = (partition_key.to_string(), row_key.to_string());
        let mut rows = self.rows.write().await;

        let Some(row) = rows.get(&key) else {
            return Err(RepositoryError::NotFound {
                entity_type: self.definition.entity_type,
                id: key_id(partition_key, row_key),
            });
        };

        if let Some(expected) = etag.filter(|e| *e != ETAG_WILDCARD) {
            if item_etag(row) != Some(expected) {
                return Err(RepositoryError::PreconditionFailed {
                    entity_type: self.definition.entity_type,
                    id: key_id(partition_key, row_key),
                });
            }
        }

        rows.remove(&key);
        Ok(())
    }

    async fn query_segment(
        &self,
        query: &TableQuery,
        token: Option<&ContinuationToken>,
    ) -> Result<QuerySegment<Item>> {
        let partition = match &query.filter {
            Some(FilterCondition {
                attribute: KeyAttribute::PartitionKey,
                value,
            }) => Some(value.as_str()),
            _ => None,
        };

        let lower = match (token, partition) {
            (Some(token), _) => Bound::Excluded((
                token.partition_key().to_string(),
                token.row_key().to_string(),
            )),
            (None, Some(partition_key)) => {
                Bound::Included((partition_key.to_string(), String::new()))
            }
            (None, None) => Bound::Unbounded,
        };

        let page_size = match query.take {
            Some(take) if query.cap_is_exact() => take.clamp(1, self.page_size),
            _ => self.page_size,
        };

        let rows = self.rows.read().await;
        let mut candidates = rows
            .range((lower, Bound::Unbounded))
            .take_while(|((pk, _), _)| partition.map_or(true, |p| pk.as_str() == p))
            .peekable();

        let mut items = Vec::new();
        let mut last_key = None;
        for _ in 0..page_size {
            let Some(((pk, rk), item)) = candidates.next() else {
                break;
            };
            if query.matches(pk, rk) {
                items.push(item.clone());
            }
            last_key = Some(ContinuationToken::new(pk.clone(), rk.clone()));
        }

        let continuation_token = match candidates.peek() {
            Some(_) => last_key,
            None => None,
        };

        Ok(QuerySegment {
            items,
            continuation_token,
        })
    }
}
