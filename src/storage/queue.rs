//! Queue service client.
//!
//! Reads message bodies only. Nothing here deletes or updates a message.

use std::time::Duration;

use serde::Deserialize;

use crate::config::QueueReadMode;
use crate::storage::account::StorageAccount;
use crate::storage::auth::{apply_sas, authorize_queue, rfc1123_now};
use crate::storage::error::{StorageError, StorageResult};

pub const QUEUE_API_VERSION: &str = "2019-12-12";

#[derive(Deserialize)]
struct QueueMessagesList {
    #[serde(rename = "QueueMessage", default)]
    messages: Vec<QueueMessage>,
}

#[derive(Deserialize)]
struct QueueMessage {
    #[serde(rename = "MessageText", default)]
    message_text: String,
}

/// Extract message bodies from a `QueueMessagesList` document.
pub fn parse_message_list(xml: &str) -> StorageResult<Vec<String>> {
    let xml = xml.trim_start_matches('\u{feff}').trim();
    let list: QueueMessagesList =
        quick_xml::de::from_str(xml).map_err(|e| StorageError::Decode(e.to_string()))?;
    Ok(list.messages.into_iter().map(|m| m.message_text).collect())
}

/// Short-lived client bound to one queue.
pub struct QueueClient<'a> {
    http: &'a reqwest::Client,
    account: &'a StorageAccount,
    queue_name: &'a str,
    timeout: Duration,
}

impl<'a> QueueClient<'a> {
    pub fn new(
        http: &'a reqwest::Client,
        account: &'a StorageAccount,
        queue_name: &'a str,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            account,
            queue_name,
            timeout,
        }
    }

    /// Read up to `count` message bodies.
    pub async fn read_messages(
        &self,
        count: u32,
        mode: QueueReadMode,
        visibility_timeout_secs: u64,
    ) -> StorageResult<Vec<String>> {
        let endpoint = self.account.queue_endpoint()?;
        let mut url = self
            .account
            .resource_url(endpoint, &[self.queue_name, "messages"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("numofmessages", &count.to_string());
            match mode {
                QueueReadMode::Peek => {
                    query.append_pair("peekonly", "true");
                }
                QueueReadMode::Receive => {
                    query.append_pair("visibilitytimeout", &visibility_timeout_secs.to_string());
                }
            }
        }
        apply_sas(self.account, &mut url);

        let date = rfc1123_now();
        let ms_headers = [("x-ms-date", date.as_str()), ("x-ms-version", QUEUE_API_VERSION)];
        let mut request = self.http.get(url.clone()).timeout(self.timeout);
        for (name, value) in ms_headers {
            request = request.header(name, value);
        }
        let request = authorize_queue(request, self.account, &url, &ms_headers)?;

        let response = request
            .send()
            .await
            .map_err(|e| StorageError::from_transport(e, self.timeout.as_secs()))?;
        if !response.status().is_success() {
            return Err(StorageError::from_response(response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| StorageError::from_transport(e, self.timeout.as_secs()))?;
        let messages = parse_message_list(&body)?;

        tracing::debug!(
            queue = %self.queue_name,
            mode = ?mode,
            messages = messages.len(),
            "Queue read complete"
        );
        Ok(messages)
    }
}
