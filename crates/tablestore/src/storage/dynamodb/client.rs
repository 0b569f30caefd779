//! AWS SDK client setup and table provisioning.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::config::Credentials;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::Client;
use tokio::sync::OnceCell;

use tablestore_core::entity::{PARTITION_KEY, ROW_KEY};
use tablestore_core::{ConnectionSettings, RepositoryError, Result, StorageConfig};

use super::error::{map_build_error, map_create_table_error, map_describe_table_error};
use super::table::DynamoDbTable;
use crate::storage::{TableClient, TableDefinition, TableService};

pub const DEFAULT_REGION: &str = "us-east-1";
const CREDENTIALS_PROVIDER_NAME: &str = "tablestore-connection-string";

const TABLE_ACTIVE_MAX_ATTEMPTS: u32 = 60;
const TABLE_ACTIVE_POLL_DELAY: Duration = Duration::from_secs(2);

/// DynamoDB implementation of [`TableService`].
///
/// The SDK client is built on the first `open_table` call and shared by every
/// table handle this service returns.
pub struct DynamoDbTableService {
    config: StorageConfig,
    client: OnceCell<Client>,
}

impl DynamoDbTableService {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    /// Creates a service around an already configured client.
    pub fn from_client(config: StorageConfig, client: Client) -> Self {
        Self {
            config,
            client: OnceCell::new_with(Some(client)),
        }
    }

    async fn client(&self) -> &Client {
        self.client
            .get_or_init(|| create_client(self.config.settings()))
            .await
    }
}

#[async_trait]
impl TableService for DynamoDbTableService {
    async fn open_table(&self, definition: TableDefinition) -> Result<Arc<dyn TableClient>> {
        let client = self.client().await.clone();
        create_table_if_not_exists(&client, definition.table_name).await?;

        let table: Arc<dyn TableClient> = Arc::new(DynamoDbTable::new(client, definition));
        Ok(table)
    }
}

/// Creates a DynamoDB client from connection settings.
///
/// Region falls back to the SDK default provider chain, then `us-east-1`.
/// Without static credentials the SDK default credential chain is used.
pub async fn create_client(settings: &ConnectionSettings) -> Client {
    let region = match &settings.region {
        Some(region) => RegionProviderChain::first_try(Region::new(region.clone())),
        None => RegionProviderChain::default_provider(),
    }
    .or_else(Region::new(DEFAULT_REGION));

    let mut sdk_config_loader = aws_config::defaults(BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = &settings.endpoint_url {
        sdk_config_loader = sdk_config_loader.endpoint_url(endpoint);
    }

    if let Some((access_key_id, secret_access_key)) = settings.credentials() {
        sdk_config_loader = sdk_config_loader.credentials_provider(Credentials::new(
            access_key_id,
            secret_access_key,
            settings.session_token.clone(),
            None,
            CREDENTIALS_PROVIDER_NAME,
        ));
    }

    let sdk_config = sdk_config_loader.load().await;
    Client::new(&sdk_config)
}

/// Next action for a table in the given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableStep {
    Ready,
    Create,
    Wait,
}

fn next_step(status: Option<&TableStatus>) -> TableStep {
    match status {
        Some(TableStatus::Active) => TableStep::Ready,
        Some(_) => TableStep::Wait,
        None => TableStep::Create,
    }
}

/// Ensures `table_name` exists and is active, creating it if needed.
///
/// A table that disappears while being waited on (for example one that was
/// `DELETING`) is created again.
pub async fn create_table_if_not_exists(client: &Client, table_name: &str) -> Result<()> {
    for attempt in 0..TABLE_ACTIVE_MAX_ATTEMPTS {
        let status = get_table_status(client, table_name).await?;
        match next_step(status.as_ref()) {
            TableStep::Ready => return Ok(()),
            TableStep::Create => {
                create_table(client, table_name).await?;
                tracing::info!(table_name, "Created table");
            }
            TableStep::Wait => {
                tracing::debug!(
                    table_name,
                    status = ?status.as_ref().map(TableStatus::as_str),
                    attempt,
                    "Table exists but is not active"
                );
            }
        }
        tokio::time::sleep(TABLE_ACTIVE_POLL_DELAY).await;
    }

    Err(RepositoryError::TableActivationTimeout {
        table_name: table_name.to_string(),
    })
}

/// Fetches current table status, returns None if the table doesn't exist.
async fn get_table_status(client: &Client, table_name: &str) -> Result<Option<TableStatus>> {
    match client.describe_table().table_name(table_name).send().await {
        Ok(response) => Ok(Some(
            response
                .table()
                .and_then(|table| table.table_status())
                .cloned()
                .unwrap_or(TableStatus::Active),
        )),
        Err(err) => map_describe_table_error(err).map(|()| None),
    }
}

async fn create_table(client: &Client, table_name: &str) -> Result<()> {
    let key_schema = vec![
        KeySchemaElement::builder()
            .attribute_name(PARTITION_KEY)
            .key_type(KeyType::Hash)
            .build()
            .map_err(|e| map_build_error("CreateTable", e))?,
        KeySchemaElement::builder()
            .attribute_name(ROW_KEY)
            .key_type(KeyType::Range)
            .build()
            .map_err(|e| map_build_error("CreateTable", e))?,
    ];

    let attribute_definitions = vec![
        AttributeDefinition::builder()
            .attribute_name(PARTITION_KEY)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(|e| map_build_error("CreateTable", e))?,
        AttributeDefinition::builder()
            .attribute_name(ROW_KEY)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(|e| map_build_error("CreateTable", e))?,
    ];

    match client
        .create_table()
        .table_name(table_name)
        .set_key_schema(Some(key_schema))
        .set_attribute_definitions(Some(attribute_definitions))
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await
    {
        Ok(_) => Ok(()),
        Err(err) => map_create_table_error(err),
    }
}
