//! Query model shared by every storage backend.
//!
//! Queries are limited to a single equality condition on one of the two key
//! attributes plus an optional row cap. Backends translate them into their
//! own request shapes.

use crate::entity::{PARTITION_KEY, ROW_KEY};

/// Key attribute a filter can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAttribute {
    PartitionKey,
    RowKey,
}

impl KeyAttribute {
    /// Stored attribute name.
    pub fn attribute_name(&self) -> &'static str {
        match self {
            Self::PartitionKey => PARTITION_KEY,
            Self::RowKey => ROW_KEY,
        }
    }
}

/// An equality condition on a key attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCondition {
    pub attribute: KeyAttribute,
    pub value: String,
}

impl FilterCondition {
    pub fn partition_key_equals(value: impl Into<String>) -> Self {
        Self {
            attribute: KeyAttribute::PartitionKey,
            value: value.into(),
        }
    }

    pub fn row_key_equals(value: impl Into<String>) -> Self {
        Self {
            attribute: KeyAttribute::RowKey,
            value: value.into(),
        }
    }
}

/// A scan or partition query with an optional cap on returned rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableQuery {
    pub filter: Option<FilterCondition>,
    pub take: Option<usize>,
}

impl TableQuery {
    /// Full table scan.
    pub fn all() -> Self {
        Self::default()
    }

    /// Query restricted by `filter`.
    pub fn filtered(filter: FilterCondition) -> Self {
        Self {
            filter: Some(filter),
            take: None,
        }
    }

    /// Caps the number of returned rows.
    pub fn take(mut self, take: Option<usize>) -> Self {
        self.take = take;
        self
    }

    /// Whether the store can apply the row cap per request.
    ///
    /// Filters on the partition key are key conditions, so the store counts
    /// only matching rows. Any other filter is evaluated after the store has
    /// read a page, and a per-request cap would count rows that are later
    /// discarded.
    pub fn cap_is_exact(&self) -> bool {
        match &self.filter {
            None => true,
            Some(filter) => filter.attribute == KeyAttribute::PartitionKey,
        }
    }

    /// Returns `true` if a row with these keys satisfies the filter.
    pub fn matches(&self, partition_key: &str, row_key: &str) -> bool {
        match &self.filter {
            None => true,
            Some(FilterCondition {
                attribute: KeyAttribute::PartitionKey,
                value,
            }) => value == partition_key,
            Some(FilterCondition {
                attribute: KeyAttribute::RowKey,
                value,
            }) => value == row_key,
        }
    }
}

/// Opaque cursor returned by a paged query.
///
/// Holds the key of the last row read; the next page starts after it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContinuationToken {
    partition_key: String,
    row_key: String,
}

impl ContinuationToken {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
        }
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn row_key(&self) -> &str {
        &self.row_key
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySegment<I> {
    pub items: Vec<I>,
    /// `None` once the query is exhausted.
    pub continuation_token: Option<ContinuationToken>,
}

impl<I> QuerySegment<I> {
    pub fn last(items: Vec<I>) -> Self {
        Self {
            items,
            continuation_token: None,
        }
    }
}
