//! Table service client.
//!
//! Lists every entity of one table, following continuation headers until the
//! backend stops returning them.

use std::time::Duration;

use serde::Deserialize;

use crate::storage::account::StorageAccount;
use crate::storage::auth::{apply_sas, authorize_table, rfc1123_now};
use crate::storage::error::{StorageError, StorageResult};

pub const TABLE_API_VERSION: &str = "2019-02-02";

const NEXT_PARTITION_KEY: &str = "x-ms-continuation-NextPartitionKey";
const NEXT_ROW_KEY: &str = "x-ms-continuation-NextRowKey";

/// A schemaless table entity as stored by the backend.
pub type TableEntity = serde_json::Map<String, serde_json::Value>;

#[derive(Deserialize)]
struct EntityPage {
    #[serde(default)]
    value: Vec<TableEntity>,
}

/// Short-lived client bound to one table.
pub struct TableClient<'a> {
    http: &'a reqwest::Client,
    account: &'a StorageAccount,
    table_name: &'a str,
    timeout: Duration,
}

impl<'a> TableClient<'a> {
    pub fn new(
        http: &'a reqwest::Client,
        account: &'a StorageAccount,
        table_name: &'a str,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            account,
            table_name,
            timeout,
        }
    }

    /// Fetch all entities in backend order.
    pub async fn query_entities(&self) -> StorageResult<Vec<TableEntity>> {
        let endpoint = self.account.table_endpoint()?;
        let resource = format!("{}()", self.table_name);

        let mut entities = Vec::new();
        let mut continuation: Option<(String, Option<String>)> = None;
        let mut pages = 0u32;

        loop {
            let mut url = self.account.resource_url(endpoint, &[resource.as_str()])?;
            if let Some((partition_key, row_key)) = &continuation {
                let mut query = url.query_pairs_mut();
                query.append_pair("NextPartitionKey", partition_key);
                if let Some(row_key) = row_key {
                    query.append_pair("NextRowKey", row_key);
                }
            }
            apply_sas(self.account, &mut url);

            let date = rfc1123_now();
            let request = self
                .http
                .get(url.clone())
                .timeout(self.timeout)
                .header("x-ms-date", &date)
                .header("x-ms-version", TABLE_API_VERSION)
                .header("DataServiceVersion", "3.0;NetFx")
                .header("MaxDataServiceVersion", "3.0;NetFx")
                .header(reqwest::header::ACCEPT, "application/json;odata=nometadata");
            let request = authorize_table(request, self.account, &url, &date)?;

            let response = request
                .send()
                .await
                .map_err(|e| StorageError::from_transport(e, self.timeout.as_secs()))?;
            if !response.status().is_success() {
                return Err(StorageError::from_response(response).await);
            }

            let header = |name: &str| {
                response
                    .headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            let next = header(NEXT_PARTITION_KEY).map(|pk| (pk, header(NEXT_ROW_KEY)));

            let body = response
                .bytes()
                .await
                .map_err(|e| StorageError::from_transport(e, self.timeout.as_secs()))?;
            let page: EntityPage =
                serde_json::from_slice(&body).map_err(|e| StorageError::Decode(e.to_string()))?;

            pages += 1;
            entities.extend(page.value);

            match next {
                Some(token) if continuation.as_ref() == Some(&token) => {
                    return Err(StorageError::Decode(format!(
                        "table '{}' returned the same continuation token twice (NextPartitionKey={})",
                        self.table_name, token.0
                    )));
                }
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        tracing::debug!(
            table = %self.table_name,
            pages,
            entities = entities.len(),
            "Table query complete"
        );
        Ok(entities)
    }
}
