//! Core types for the tablestore repository: the entity contract,
//! configuration, the query model, errors and the repository trait.
//!
//! Everything in this crate is pure; I/O lives in the `tablestore` crate.

pub mod config;
pub mod entity;
pub mod error;
pub mod query;
mod traits;

pub use config::{ConnectionSettings, StorageConfig};
pub use entity::TableEntity;
pub use error::{BoxError, RepositoryError, Result};
pub use query::{ContinuationToken, FilterCondition, KeyAttribute, QuerySegment, TableQuery};
pub use traits::EntityRepository;
