//! In-memory storage backend.
//!
//! Tables live in ordered maps wrapped in `RwLock`s. Data is not persisted and
//! is lost when the service is dropped. Useful for tests and for development
//! without a DynamoDB endpoint.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tablestore::storage::InMemoryTableService;
//! use tablestore::TableRepository;
//!
//! let service = Arc::new(InMemoryTableService::new());
//! let repo = TableRepository::<Customer>::with_service(service);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use tablestore_core::Result;

use crate::storage::{TableClient, TableDefinition, TableService};

mod table;

pub use table::InMemoryTable;

/// Default number of rows per page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// In-memory implementation of [`TableService`].
///
/// Clones share the same tables.
#[derive(Debug, Clone)]
pub struct InMemoryTableService {
    tables: Arc<RwLock<HashMap<String, Arc<InMemoryTable>>>>,
    page_size: usize,
    open_calls: Arc<AtomicUsize>,
}

impl Default for InMemoryTableService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTableService {
    /// Creates an empty service with the default page size.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates an empty service whose queries return at most `page_size` rows per page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            page_size,
            open_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `open_table` calls received so far.
    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// Returns the table with this name, if it has been opened.
    pub async fn table(&self, table_name: &str) -> Option<Arc<InMemoryTable>> {
        self.tables.read().await.get(table_name).cloned()
    }
}

#[async_trait]
impl TableService for InMemoryTableService {
    async fn open_table(&self, definition: TableDefinition) -> Result<Arc<dyn TableClient>> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        // Let concurrent callers interleave like a remote create call would.
        tokio::task::yield_now().await;

        let mut tables = self.tables.write().await;
        let table: Arc<dyn TableClient> = tables
            .entry(definition.table_name.to_string())
            .or_insert_with(|| Arc::new(InMemoryTable::new(definition, self.page_size)))
            .clone();

        Ok(table)
    }
}
