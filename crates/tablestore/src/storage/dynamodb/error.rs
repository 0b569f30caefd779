//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `RepositoryError` from `tablestore_core`. Service
//! errors are kept intact as the error source; only conditional-check
//! failures on delete are translated.

use std::fmt::Debug;

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use tablestore_core::RepositoryError;

/// Map a DescribeTable SDK error. `Ok(())` means the table does not exist.
pub fn map_describe_table_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DescribeTableError, R>,
) -> Result<(), RepositoryError> {
    match err.into_service_error() {
        DescribeTableError::ResourceNotFoundException(_) => Ok(()),
        err => Err(RepositoryError::store("DescribeTable", err)),
    }
}

/// Map a CreateTable SDK error. A table created concurrently counts as success.
pub fn map_create_table_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<CreateTableError, R>,
) -> Result<(), RepositoryError> {
    match err.into_service_error() {
        CreateTableError::ResourceInUseException(_) => Ok(()),
        err => Err(RepositoryError::store("CreateTable", err)),
    }
}

/// Map a GetItem SDK error to RepositoryError.
pub fn map_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<GetItemError, R>,
) -> RepositoryError {
    RepositoryError::store("GetItem", err.into_service_error())
}

/// Map a PutItem SDK error to RepositoryError.
pub fn map_put_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<PutItemError, R>,
) -> RepositoryError {
    RepositoryError::store("PutItem", err.into_service_error())
}

/// Map a Query SDK error to RepositoryError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<QueryError, R>,
) -> RepositoryError {
    RepositoryError::store("Query", err.into_service_error())
}

/// Map a Scan SDK error to RepositoryError.
pub fn map_scan_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<ScanError, R>,
) -> RepositoryError {
    RepositoryError::store("Scan", err.into_service_error())
}

/// Map a DeleteItem SDK error to RepositoryError.
///
/// A failed condition check reports the old item when the row existed, which
/// tells a stale version marker apart from a missing row.
pub fn map_delete_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DeleteItemError, R>,
    entity_type: &'static str,
    id: impl Into<String>,
) -> RepositoryError {
    let id = id.into();
    match err.into_service_error() {
        DeleteItemError::ConditionalCheckFailedException(e) if e.item().is_some() => {
            RepositoryError::PreconditionFailed { entity_type, id }
        }
        DeleteItemError::ConditionalCheckFailedException(_) => {
            RepositoryError::NotFound { entity_type, id }
        }
        err => RepositoryError::store("DeleteItem", err),
    }
}

/// Map a request builder error (missing required field) to RepositoryError.
pub fn map_build_error(
    operation: &'static str,
    err: aws_sdk_dynamodb::error::BuildError,
) -> RepositoryError {
    RepositoryError::store(operation, err)
}
