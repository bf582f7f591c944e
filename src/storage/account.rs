//! Storage account connection strings.
//!
//! A connection string is a `;`-separated list of `Key=Value` pairs. Keys are
//! matched case-insensitively; values keep everything after the first `=`
//! (account keys are base64 and end in `=`).

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use url::Url;

use crate::storage::error::{StorageError, StorageResult};

/// Account name used by the local storage emulator.
pub const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";

/// Well-known shared key of the local storage emulator.
pub const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

const DEV_TABLE_ENDPOINT: &str = "http://127.0.0.1:10002/devstoreaccount1";
const DEV_QUEUE_ENDPOINT: &str = "http://127.0.0.1:10001/devstoreaccount1";

/// How requests to the account are authorized.
#[derive(Clone)]
pub enum Credential {
    /// Shared key (decoded account key bytes).
    SharedKey(Vec<u8>),
    /// Shared access signature query string, without the leading `?`.
    Sas(String),
    /// Public access, no authorization.
    Anonymous,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::SharedKey(_) => f.write_str("SharedKey(<redacted>)"),
            Credential::Sas(_) => f.write_str("Sas(<redacted>)"),
            Credential::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// A parsed storage account.
#[derive(Debug, Clone)]
pub struct StorageAccount {
    pub name: String,
    pub credential: Credential,
    table_endpoint: Option<Url>,
    queue_endpoint: Option<Url>,
}

impl StorageAccount {
    /// Parse an account from its connection string.
    pub fn from_connection_string(conn: &str) -> StorageResult<Self> {
        let mut protocol = "https".to_string();
        let mut suffix = "core.windows.net".to_string();
        let mut name = None;
        let mut key = None;
        let mut sas = None;
        let mut table_endpoint = None;
        let mut queue_endpoint = None;
        let mut development = false;

        for part in conn.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (k, v) = part.split_once('=').ok_or_else(|| {
                StorageError::ConnectionString(format!("segment '{}' is not Key=Value", redact(part)))
            })?;
            match k.trim().to_ascii_lowercase().as_str() {
                "defaultendpointsprotocol" => protocol = v.to_string(),
                "endpointsuffix" => suffix = v.to_string(),
                "accountname" => name = Some(v.to_string()),
                "accountkey" => key = Some(v.to_string()),
                "sharedaccesssignature" => sas = Some(v.trim_start_matches('?').to_string()),
                "tableendpoint" => table_endpoint = Some(parse_endpoint("TableEndpoint", v)?),
                "queueendpoint" => queue_endpoint = Some(parse_endpoint("QueueEndpoint", v)?),
                "usedevelopmentstorage" => development = v.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        if development {
            name.get_or_insert_with(|| DEV_ACCOUNT_NAME.to_string());
            key.get_or_insert_with(|| DEV_ACCOUNT_KEY.to_string());
            if table_endpoint.is_none() {
                table_endpoint = Some(parse_endpoint("TableEndpoint", DEV_TABLE_ENDPOINT)?);
            }
            if queue_endpoint.is_none() {
                queue_endpoint = Some(parse_endpoint("QueueEndpoint", DEV_QUEUE_ENDPOINT)?);
            }
        }

        if let Some(account) = &name {
            if table_endpoint.is_none() {
                table_endpoint = Some(parse_endpoint(
                    "TableEndpoint",
                    &format!("{}://{}.table.{}", protocol, account, suffix),
                )?);
            }
            if queue_endpoint.is_none() {
                queue_endpoint = Some(parse_endpoint(
                    "QueueEndpoint",
                    &format!("{}://{}.queue.{}", protocol, account, suffix),
                )?);
            }
        }

        if table_endpoint.is_none() && queue_endpoint.is_none() {
            return Err(StorageError::ConnectionString(
                "AccountName or an explicit endpoint is required".to_string(),
            ));
        }

        let credential = match (key, sas) {
            (Some(key), _) => {
                if name.is_none() {
                    return Err(StorageError::ConnectionString(
                        "AccountKey requires AccountName".to_string(),
                    ));
                }
                let bytes = STANDARD.decode(key.trim()).map_err(|e| {
                    StorageError::ConnectionString(format!("AccountKey is not base64: {}", e))
                })?;
                Credential::SharedKey(bytes)
            }
            (None, Some(sas)) => Credential::Sas(sas),
            (None, None) => Credential::Anonymous,
        };

        Ok(Self {
            name: name.unwrap_or_default(),
            credential,
            table_endpoint,
            queue_endpoint,
        })
    }

    /// Base URL of the table service.
    pub fn table_endpoint(&self) -> StorageResult<&Url> {
        self.table_endpoint.as_ref().ok_or_else(|| {
            StorageError::ConnectionString("no table endpoint configured".to_string())
        })
    }

    /// Base URL of the queue service.
    pub fn queue_endpoint(&self) -> StorageResult<&Url> {
        self.queue_endpoint.as_ref().ok_or_else(|| {
            StorageError::ConnectionString("no queue endpoint configured".to_string())
        })
    }

    /// Build `{endpoint}/{segments...}` with each segment percent-encoded.
    pub(crate) fn resource_url(&self, endpoint: &Url, segments: &[&str]) -> StorageResult<Url> {
        let mut url = endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::Url(format!("'{}' cannot be a base URL", endpoint)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn parse_endpoint(field: &str, value: &str) -> StorageResult<Url> {
    Url::parse(value.trim())
        .map_err(|e| StorageError::ConnectionString(format!("{} '{}': {}", field, value, e)))
}

fn redact(segment: &str) -> String {
    segment.chars().take(16).collect()
}
