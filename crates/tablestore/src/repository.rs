//! Generic table repository.
//!
//! Implements [`EntityRepository`] for any [`TableEntity`] on top of a
//! [`TableService`]. The backing table is resolved on first use and reused
//! for the lifetime of the repository.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use tablestore_core::entity::{key_id, validate_table_name, ETAG_WILDCARD};
use tablestore_core::{
    EntityRepository, FilterCondition, RepositoryError, Result, StorageConfig, TableEntity,
    TableQuery,
};

use crate::storage::conversions::{entity_to_item, item_to_entity};
use crate::storage::{DynamoDbTableService, TableClient, TableDefinition, TableService};

/// Repository over the table backing entity type `T`.
pub struct TableRepository<T: TableEntity> {
    service: Arc<dyn TableService>,
    table: OnceCell<Arc<dyn TableClient>>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: TableEntity> TableRepository<T> {
    /// Creates a DynamoDB-backed repository. No request is sent until the
    /// first operation.
    pub fn new(config: StorageConfig) -> Self {
        Self::with_service(Arc::new(DynamoDbTableService::new(config)))
    }

    /// Creates a repository on top of any storage backend.
    pub fn with_service(service: Arc<dyn TableService>) -> Self {
        Self {
            service,
            table: OnceCell::new(),
            _entity: PhantomData,
        }
    }

    /// Resolved table definition for `T`.
    pub fn definition(&self) -> TableDefinition {
        TableDefinition::of::<T>()
    }

    /// Returns the table handle, resolving it on first use.
    ///
    /// Concurrent first calls share a single resolution. A failed resolution
    /// is not cached.
    async fn table(&self) -> Result<&Arc<dyn TableClient>> {
        self.table
            .get_or_try_init(|| async {
                let definition = self.definition();
                validate_table_name(definition.table_name)?;

                tracing::debug!(
                    table_name = definition.table_name,
                    entity_type = definition.entity_type,
                    "Resolving table"
                );
                self.service.open_table(definition).await
            })
            .await
    }

    /// Runs `query` page by page until the store is exhausted or the row cap
    /// is reached.
    async fn execute_query(&self, query: TableQuery) -> Result<Vec<T>> {
        if query.take == Some(0) {
            return Ok(Vec::new());
        }

        let table = self.table().await?;
        let mut results = Vec::new();
        let mut continuation_token = None;

        loop {
            let segment = table
                .query_segment(&query, continuation_token.as_ref())
                .await?;

            tracing::trace!(
                table_name = table.definition().table_name,
                items = segment.items.len(),
                more = segment.continuation_token.is_some(),
                "Read query segment"
            );

            for item in segment.items {
                results.push(item_to_entity(item)?);
            }

            if let Some(take) = query.take {
                if results.len() >= take {
                    results.truncate(take);
                    break;
                }
            }

            match segment.continuation_token {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        Ok(results)
    }
}

/// Treats empty keys as absent.
fn non_empty(key: Option<&str>) -> Option<&str> {
    key.filter(|k| !k.is_empty())
}

fn validate_keys<T: TableEntity>(item: &T) -> Result<()> {
    if item.partition_key().is_empty() || item.row_key().is_empty() {
        return Err(RepositoryError::InvalidArgument(format!(
            "{} has an empty partition key or row key",
            T::entity_type()
        )));
    }
    Ok(())
}

#[async_trait]
impl<T: TableEntity> EntityRepository<T> for TableRepository<T> {
    async fn all(&self, limit: Option<usize>) -> Result<Vec<T>> {
        self.execute_query(TableQuery::all().take(limit)).await
    }

    async fn list_by_partition(&self, partition_key: &str) -> Result<Vec<T>> {
        if partition_key.is_empty() {
            return Err(RepositoryError::InvalidArgument(
                "partition key is empty".to_string(),
            ));
        }

        self.execute_query(TableQuery::filtered(FilterCondition::partition_key_equals(
            partition_key,
        )))
        .await
    }

    async fn get(&self, partition_key: Option<&str>, row_key: Option<&str>) -> Result<Option<T>> {
        let (partition_key, row_key) = (non_empty(partition_key), non_empty(row_key));
        if partition_key.is_none() && row_key.is_none() {
            return Err(RepositoryError::InvalidArgument(
                "partition key and row key are both empty".to_string(),
            ));
        }

        let table = self.table().await?;

        match (partition_key, row_key) {
            (Some(partition_key), Some(row_key)) => table
                .retrieve(partition_key, row_key)
                .await?
                .map(item_to_entity)
                .transpose(),
            (None, Some(row_key)) => {
                let query =
                    TableQuery::filtered(FilterCondition::row_key_equals(row_key)).take(Some(1));
                Ok(self.execute_query(query).await?.into_iter().next())
            }
            // A partition key alone never selects a single entity.
            _ => Ok(None),
        }
    }

    async fn upsert(&self, item: &T) -> Result<()> {
        validate_keys(item)?;

        let table = self.table().await?;
        table.insert_or_replace(entity_to_item(item)?).await
    }

    async fn delete(&self, item: &T) -> Result<()> {
        validate_keys(item)?;

        let table = self.table().await?;
        let etag = item.etag().filter(|etag| *etag != ETAG_WILDCARD);
        table.delete(item.partition_key(), item.row_key(), etag).await
    }

    async fn delete_by_key(
        &self,
        partition_key: Option<&str>,
        row_key: Option<&str>,
    ) -> Result<()> {
        match self.get(partition_key, row_key).await? {
            Some(item) => self.delete(&item).await,
            None => Err(RepositoryError::NotFound {
                entity_type: T::entity_type(),
                id: key_id(partition_key.unwrap_or_default(), row_key.unwrap_or_default()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::storage::InMemoryTableService;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Customer {
        partition_key: String,
        row_key: String,
        #[serde(rename = "ETag", default, skip_serializing_if = "Option::is_none")]
        etag: Option<String>,
        email: String,
        phone: Option<String>,
    }

    impl TableEntity for Customer {
        const TABLE_NAME: Option<&'static str> = Some("Customers");

        fn partition_key(&self) -> &str {
            &self.partition_key
        }

        fn row_key(&self) -> &str {
            &self.row_key
        }

        fn etag(&self) -> Option<&str> {
            self.etag.as_deref()
        }
    }

    impl Customer {
        fn new(partition_key: &str, row_key: &str) -> Self {
            Self {
                partition_key: partition_key.to_string(),
                row_key: row_key.to_string(),
                etag: None,
                email: format!("{row_key}@{partition_key}.example"),
                phone: None,
            }
        }

        /// Key and payload fields, ignoring the store-assigned version.
        fn data(&self) -> (&str, &str, &str, Option<&str>) {
            (
                &self.partition_key,
                &self.row_key,
                &self.email,
                self.phone.as_deref(),
            )
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct AuditLog {
        partition_key: String,
        row_key: String,
    }

    impl TableEntity for AuditLog {
        fn partition_key(&self) -> &str {
            &self.partition_key
        }

        fn row_key(&self) -> &str {
            &self.row_key
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Misnamed {
        pk: String,
        rk: String,
    }

    impl TableEntity for Misnamed {
        const TABLE_NAME: Option<&'static str> = Some("no spaces allowed");

        fn partition_key(&self) -> &str {
            &self.pk
        }

        fn row_key(&self) -> &str {
            &self.rk
        }
    }

    struct UnavailableService;

    #[async_trait]
    impl TableService for UnavailableService {
        async fn open_table(&self, _definition: TableDefinition) -> Result<Arc<dyn TableClient>> {
            Err(RepositoryError::store(
                "DescribeTable",
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
            ))
        }
    }

    fn repo_with_page_size(page_size: usize) -> (InMemoryTableService, TableRepository<Customer>) {
        let service = InMemoryTableService::with_page_size(page_size);
        let repo = TableRepository::with_service(Arc::new(service.clone()));
        (service, repo)
    }

    fn repo() -> (InMemoryTableService, TableRepository<Customer>) {
        repo_with_page_size(1000)
    }

    /// Inserts A(x,1), B(x,2), C(y,1).
    async fn seed(repo: &TableRepository<Customer>) -> (Customer, Customer, Customer) {
        let a = Customer::new("x", "1");
        let b = Customer::new("x", "2");
        let c = Customer::new("y", "1");
        for customer in [&a, &b, &c] {
            repo.upsert(customer).await.unwrap();
        }
        (a, b, c)
    }

    fn row_keys(customers: &[Customer]) -> HashSet<(String, String)> {
        customers
            .iter()
            .map(|c| (c.partition_key.clone(), c.row_key.clone()))
            .collect()
    }

    // ==================== Table Resolution Tests ====================

    #[tokio::test]
    async fn test_table_name_from_override() {
        let (service, repo) = repo();
        repo.all(None).await.unwrap();

        assert!(service.table("Customers").await.is_some());
        assert_eq!(repo.definition().entity_type, "Customer");
    }

    #[tokio::test]
    async fn test_table_name_falls_back_to_type_name() {
        let service = InMemoryTableService::new();
        let repo: TableRepository<AuditLog> =
            TableRepository::with_service(Arc::new(service.clone()));
        repo.all(None).await.unwrap();

        assert!(service.table("AuditLog").await.is_some());
    }

    #[tokio::test]
    async fn test_table_resolved_once() {
        let (service, repo) = repo();
        seed(&repo).await;
        repo.all(None).await.unwrap();
        repo.get(Some("x"), Some("1")).await.unwrap();

        assert_eq!(service.open_calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_resolve_once() {
        let (service, repo) = repo();
        let repo = Arc::new(repo);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move {
                    repo.upsert(&Customer::new("p", &i.to_string())).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(service.open_calls(), 1);
        assert_eq!(repo.all(None).await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_invalid_table_name_fails_before_store() {
        let service = InMemoryTableService::new();
        let repo: TableRepository<Misnamed> =
            TableRepository::with_service(Arc::new(service.clone()));

        let result = repo.all(None).await;
        assert!(matches!(result, Err(RepositoryError::InvalidConfiguration(_))));
        assert_eq!(service.open_calls(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let repo: TableRepository<Customer> =
            TableRepository::with_service(Arc::new(UnavailableService));

        let result = repo.get(Some("x"), Some("1")).await;
        assert!(matches!(
            result,
            Err(RepositoryError::StoreFailure { operation: "DescribeTable", .. })
        ));

        // Failed resolution is not cached.
        let result = repo.all(None).await;
        assert!(matches!(result, Err(RepositoryError::StoreFailure { .. })));
    }

    // ==================== Read Tests ====================

    #[tokio::test]
    async fn test_all_on_empty_table() {
        let (_, repo) = repo();
        assert!(repo.all(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_drains_every_page() {
        let (_, repo) = repo_with_page_size(3);
        for p in 0..4 {
            for r in 0..5 {
                repo.upsert(&Customer::new(&format!("p{p}"), &format!("r{r}")))
                    .await
                    .unwrap();
            }
        }

        let all = repo.all(None).await.unwrap();
        assert_eq!(all.len(), 20);
        assert_eq!(row_keys(&all).len(), 20);
    }

    #[tokio::test]
    async fn test_all_with_limit() {
        let (_, repo) = repo_with_page_size(2);
        seed(&repo).await;

        assert_eq!(repo.all(Some(2)).await.unwrap().len(), 2);
        assert_eq!(repo.all(Some(10)).await.unwrap().len(), 3);
        assert!(repo.all(Some(0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_by_partition() {
        let (_, repo) = repo_with_page_size(1);
        let (a, b, c) = seed(&repo).await;

        let x = repo.list_by_partition("x").await.unwrap();
        assert_eq!(row_keys(&x), row_keys(&[a, b]));

        let y = repo.list_by_partition("y").await.unwrap();
        assert_eq!(row_keys(&y), row_keys(&[c]));

        assert!(repo.list_by_partition("z").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_by_partition_requires_key() {
        let (service, repo) = repo();
        let result = repo.list_by_partition("").await;

        assert!(matches!(result, Err(RepositoryError::InvalidArgument(_))));
        assert_eq!(service.open_calls(), 0);
    }

    #[tokio::test]
    async fn test_get_by_both_keys() {
        let (_, repo) = repo();
        let (_, b, _) = seed(&repo).await;

        let found = repo.get(Some("x"), Some("2")).await.unwrap().unwrap();
        assert_eq!(found.data(), b.data());
        assert!(found.etag.is_some());
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let (_, repo) = repo();
        seed(&repo).await;

        assert!(repo.get(Some("x"), Some("9")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_by_row_key_only() {
        let (_, repo) = repo_with_page_size(1);
        let (a, _, c) = seed(&repo).await;

        let found = repo.get(None, Some("1")).await.unwrap().unwrap();
        assert!(found.data() == a.data() || found.data() == c.data());

        let found = repo.get(Some(""), Some("2")).await.unwrap().unwrap();
        assert_eq!(found.row_key, "2");

        assert!(repo.get(None, Some("9")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_by_partition_key_only_returns_none() {
        let (_, repo) = repo();
        seed(&repo).await;

        assert!(repo.get(Some("x"), None).await.unwrap().is_none());
        assert!(repo.get(Some("x"), Some("")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_requires_a_key() {
        let (_, repo) = repo();

        assert!(matches!(
            repo.get(None, None).await,
            Err(RepositoryError::InvalidArgument(_))
        ));
        assert!(matches!(
            repo.get(Some(""), Some("")).await,
            Err(RepositoryError::InvalidArgument(_))
        ));
    }

    // ==================== Write Tests ====================

    #[tokio::test]
    async fn test_upsert_round_trip() {
        let (_, repo) = repo();
        let mut customer = Customer::new("x", "1");
        customer.phone = Some("+1 555 0100".to_string());

        repo.upsert(&customer).await.unwrap();

        let found = repo.get(Some("x"), Some("1")).await.unwrap().unwrap();
        assert_eq!(found.data(), customer.data());
    }

    #[tokio::test]
    async fn test_upsert_replaces_whole_entity() {
        let (_, repo) = repo();
        let mut customer = Customer::new("x", "1");
        customer.phone = Some("+1 555 0100".to_string());
        repo.upsert(&customer).await.unwrap();

        let replacement = Customer::new("x", "1");
        repo.upsert(&replacement).await.unwrap();

        let found = repo.get(Some("x"), Some("1")).await.unwrap().unwrap();
        assert_eq!(found.phone, None);
        assert_eq!(repo.all(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let (_, repo) = repo();
        let customer = Customer::new("x", "1");

        repo.upsert(&customer).await.unwrap();
        repo.upsert(&customer).await.unwrap();
        let all = repo.all(None).await.unwrap();

        assert_eq!(all.len(), 1);
        assert_eq!(all[0].data(), customer.data());
    }

    #[tokio::test]
    async fn test_upsert_rejects_empty_keys() {
        let (_, repo) = repo();

        assert!(matches!(
            repo.upsert(&Customer::new("", "1")).await,
            Err(RepositoryError::InvalidArgument(_))
        ));
        assert!(matches!(
            repo.upsert(&Customer::new("x", "")).await,
            Err(RepositoryError::InvalidArgument(_))
        ));
        assert!(repo.all(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let (_, repo) = repo();
        let (a, _, _) = seed(&repo).await;

        repo.delete(&a).await.unwrap();

        assert!(repo.get(Some("x"), Some("1")).await.unwrap().is_none());
        assert_eq!(repo.all(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_with_current_etag() {
        let (_, repo) = repo();
        seed(&repo).await;

        let current = repo.get(Some("x"), Some("1")).await.unwrap().unwrap();
        repo.delete(&current).await.unwrap();

        assert!(repo.get(Some("x"), Some("1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_with_stale_etag() {
        let (_, repo) = repo();
        seed(&repo).await;

        let stale = repo.get(Some("x"), Some("1")).await.unwrap().unwrap();
        repo.upsert(&Customer::new("x", "1")).await.unwrap();

        let result = repo.delete(&stale).await;
        assert!(matches!(
            result,
            Err(RepositoryError::PreconditionFailed { entity_type: "Customer", .. })
        ));
        assert!(repo.get(Some("x"), Some("1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_with_wildcard_etag() {
        let (_, repo) = repo();
        seed(&repo).await;

        let mut customer = Customer::new("x", "1");
        customer.etag = Some("*".to_string());
        repo.delete(&customer).await.unwrap();

        assert!(repo.get(Some("x"), Some("1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_entity() {
        let (_, repo) = repo();

        let result = repo.delete(&Customer::new("x", "1")).await;
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_by_key() {
        let (_, repo) = repo();
        seed(&repo).await;

        repo.delete_by_key(Some("x"), Some("2")).await.unwrap();

        assert!(repo.get(Some("x"), Some("2")).await.unwrap().is_none());
        assert_eq!(repo.all(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_by_row_key_only() {
        let (_, repo) = repo();
        seed(&repo).await;

        repo.delete_by_key(None, Some("2")).await.unwrap();

        assert!(repo.get(Some("x"), Some("2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_by_key_missing_entity() {
        let (_, repo) = repo();
        seed(&repo).await;

        let result = repo.delete_by_key(Some("x"), Some("9")).await;
        match result {
            Err(RepositoryError::NotFound { entity_type, id }) => {
                assert_eq!(entity_type, "Customer");
                assert_eq!(id, "x/9");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_by_key_requires_a_key() {
        let (_, repo) = repo();

        assert!(matches!(
            repo.delete_by_key(None, None).await,
            Err(RepositoryError::InvalidArgument(_))
        ));
    }

    // ==================== Scenario ====================

    #[tokio::test]
    async fn test_partition_scenario() {
        let (_, repo) = repo_with_page_size(2);
        let (a, b, c) = seed(&repo).await;

        let x = repo.list_by_partition("x").await.unwrap();
        assert_eq!(row_keys(&x), row_keys(&[a.clone(), b.clone()]));

        let found = repo.get(Some("x"), Some("2")).await.unwrap().unwrap();
        assert_eq!(found.data(), b.data());

        // First match in scan order; either A or C is acceptable.
        let found = repo.get(None, Some("1")).await.unwrap().unwrap();
        assert!(found.data() == a.data() || found.data() == c.data());

        repo.delete(&a).await.unwrap();
        assert!(repo.get(Some("x"), Some("1")).await.unwrap().is_none());
    }
}
