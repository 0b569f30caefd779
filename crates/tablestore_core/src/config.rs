//! Storage account configuration.
//!
//! A configuration is built either from an account name and key or from a
//! single connection string. Both shapes are validated synchronously in the
//! constructor; nothing is deferred to the first repository call.

use std::{env, fmt};

use crate::error::{RepositoryError, Result};

pub const CONNECTION_STRING_ENV: &str = "TABLESTORE_CONNECTION_STRING";
pub const ACCOUNT_NAME_ENV: &str = "TABLESTORE_ACCOUNT_NAME";
pub const ACCOUNT_KEY_ENV: &str = "TABLESTORE_ACCOUNT_KEY";

const ACCOUNT_NAME: &str = "accountname";
const ACCOUNT_KEY: &str = "accountkey";
const SESSION_TOKEN: &str = "sessiontoken";
const REGION: &str = "region";
const ENDPOINT_URL: &str = "endpointurl";

/// Immutable storage configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageConfig {
    source: ConfigSource,
    settings: ConnectionSettings,
}

#[derive(Clone, PartialEq, Eq)]
enum ConfigSource {
    Account { account_name: String, key: String },
    ConnectionString(String),
}

impl StorageConfig {
    /// Creates a configuration from an account name and key.
    pub fn with_account(account_name: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        let account_name = account_name.into();
        let key = key.into();

        if account_name.is_empty() {
            return Err(RepositoryError::InvalidConfiguration(
                "Invalid account".to_string(),
            ));
        }
        if key.is_empty() {
            return Err(RepositoryError::InvalidConfiguration("Invalid key".to_string()));
        }

        let settings = ConnectionSettings {
            account_name: Some(account_name.clone()),
            account_key: Some(key.clone()),
            ..ConnectionSettings::default()
        };

        Ok(Self {
            source: ConfigSource::Account { account_name, key },
            settings,
        })
    }

    /// Creates a configuration from a connection string.
    pub fn with_connection_string(connection_string: impl Into<String>) -> Result<Self> {
        let connection_string = connection_string.into();

        if connection_string.is_empty() {
            return Err(RepositoryError::InvalidConfiguration(
                "Invalid connection string".to_string(),
            ));
        }

        let settings = ConnectionSettings::parse(&connection_string)?;

        Ok(Self {
            source: ConfigSource::ConnectionString(connection_string),
            settings,
        })
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TABLESTORE_CONNECTION_STRING` - Full connection string (takes precedence)
    /// - `TABLESTORE_ACCOUNT_NAME` - Account name, used with `TABLESTORE_ACCOUNT_KEY`
    /// - `TABLESTORE_ACCOUNT_KEY` - Account key
    pub fn from_env() -> Result<Self> {
        if let Ok(connection_string) = env::var(CONNECTION_STRING_ENV) {
            return Self::with_connection_string(connection_string);
        }

        Self::with_account(
            env::var(ACCOUNT_NAME_ENV).unwrap_or_default(),
            env::var(ACCOUNT_KEY_ENV).unwrap_or_default(),
        )
    }

    /// Account name, when the configuration was built from an account/key pair.
    pub fn account_name(&self) -> Option<&str> {
        match &self.source {
            ConfigSource::Account { account_name, .. } => Some(account_name),
            ConfigSource::ConnectionString(_) => None,
        }
    }

    /// Connection string equivalent to this configuration.
    pub fn connection_string(&self) -> String {
        match &self.source {
            ConfigSource::Account { account_name, key } => {
                format!("AccountName={account_name};AccountKey={key}")
            }
            ConfigSource::ConnectionString(s) => s.clone(),
        }
    }

    /// Parsed connection settings.
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self.source {
            ConfigSource::Account { .. } => "account",
            ConfigSource::ConnectionString(_) => "connection_string",
        };
        f.debug_struct("StorageConfig")
            .field("source", &shape)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Settings parsed from a `Key=Value;Key=Value` connection string.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    pub session_token: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
}

impl ConnectionSettings {
    /// Parses a connection string.
    ///
    /// Keys are case-insensitive and empty segments are ignored. Unknown keys,
    /// segments without `=`, empty values and half-specified credentials are
    /// rejected.
    pub fn parse(connection_string: &str) -> Result<Self> {
        let mut settings = Self::default();

        for segment in connection_string.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }

            let (key, value) = segment.split_once('=').ok_or_else(|| {
                RepositoryError::InvalidConfiguration(format!(
                    "malformed connection string segment '{segment}'"
                ))
            })?;
            let (key, value) = (key.trim(), value.trim());

            if value.is_empty() {
                return Err(RepositoryError::InvalidConfiguration(format!(
                    "empty value for '{key}'"
                )));
            }

            let slot = match key.to_ascii_lowercase().as_str() {
                ACCOUNT_NAME => &mut settings.account_name,
                ACCOUNT_KEY => &mut settings.account_key,
                SESSION_TOKEN => &mut settings.session_token,
                REGION => &mut settings.region,
                ENDPOINT_URL => &mut settings.endpoint_url,
                _ => {
                    return Err(RepositoryError::InvalidConfiguration(format!(
                        "unknown connection string key '{key}'"
                    )))
                }
            };
            *slot = Some(value.to_string());
        }

        match (&settings.account_name, &settings.account_key) {
            (Some(_), None) => Err(RepositoryError::InvalidConfiguration(
                "AccountName given without AccountKey".to_string(),
            )),
            (None, Some(_)) => Err(RepositoryError::InvalidConfiguration(
                "AccountKey given without AccountName".to_string(),
            )),
            _ => Ok(settings),
        }
    }

    /// Returns the static credential pair, if one was configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.account_name, &self.account_key) {
            (Some(name), Some(key)) => Some((name, key)),
            _ => None,
        }
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("account_name", &self.account_name)
            .field("account_key", &self.account_key.as_ref().map(|_| "<redacted>"))
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}
