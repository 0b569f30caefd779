//! Entity base contract.
//!
//! Every storable record carries a partition key, a row key and an optional
//! version marker (ETag) assigned by the store. Records are plain serde types
//! that serialize their keys under [`PARTITION_KEY`] and [`ROW_KEY`].

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{RepositoryError, Result};

// ============================================================================
// Attribute names
// ============================================================================

pub const PARTITION_KEY: &str = "PartitionKey";
pub const ROW_KEY: &str = "RowKey";
pub const ETAG: &str = "ETag";
pub const TIMESTAMP: &str = "Timestamp";

/// Version marker that matches any stored version.
pub const ETAG_WILDCARD: &str = "*";

const TABLE_NAME_MIN_LEN: usize = 3;
const TABLE_NAME_MAX_LEN: usize = 255;

/// A record stored in a partitioned table.
///
/// The table name is fixed per type: override [`TableEntity::TABLE_NAME`] to
/// pick one, otherwise the unqualified type name is used.
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use tablestore_core::TableEntity;
///
/// #[derive(Serialize, Deserialize)]
/// #[serde(rename_all = "PascalCase")]
/// struct Customer {
///     partition_key: String,
///     row_key: String,
///     #[serde(rename = "ETag", default, skip_serializing_if = "Option::is_none")]
///     etag: Option<String>,
///     email: String,
/// }
///
/// impl TableEntity for Customer {
///     const TABLE_NAME: Option<&'static str> = Some("Customers");
///
///     fn partition_key(&self) -> &str {
///         &self.partition_key
///     }
///
///     fn row_key(&self) -> &str {
///         &self.row_key
///     }
///
///     fn etag(&self) -> Option<&str> {
///         self.etag.as_deref()
///     }
/// }
///
/// assert_eq!(Customer::table_name(), "Customers");
/// ```
pub trait TableEntity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Physical table name override.
    const TABLE_NAME: Option<&'static str> = None;

    fn partition_key(&self) -> &str;

    fn row_key(&self) -> &str;

    /// Version marker last assigned by the store, if the type keeps it.
    fn etag(&self) -> Option<&str> {
        None
    }

    /// Resolves the physical table name for this type.
    fn table_name() -> &'static str {
        Self::TABLE_NAME.unwrap_or_else(short_type_name::<Self>)
    }

    /// Short human-readable name used in error messages.
    fn entity_type() -> &'static str {
        short_type_name::<Self>()
    }
}

/// Returns the type name without module path or generic arguments.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Checks a resolved table name against the store's naming rules.
pub fn validate_table_name(name: &str) -> Result<()> {
    if !(TABLE_NAME_MIN_LEN..=TABLE_NAME_MAX_LEN).contains(&name.len()) {
        return Err(RepositoryError::InvalidConfiguration(format!(
            "table name '{name}' must be between {TABLE_NAME_MIN_LEN} and {TABLE_NAME_MAX_LEN} characters"
        )));
    }

    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(RepositoryError::InvalidConfiguration(format!(
            "table name '{name}' contains invalid character '{c}'"
        )));
    }

    Ok(())
}

/// Formats a key pair for error messages.
pub fn key_id(partition_key: &str, row_key: &str) -> String {
    format!("{partition_key}/{row_key}")
}
