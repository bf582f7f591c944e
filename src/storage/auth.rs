//! Shared Key request signing for the storage REST API.
//!
//! Table requests use the SharedKeyLite scheme, queue requests the full
//! SharedKey scheme. Both sign with HMAC-SHA256 over the decoded account key.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::RequestBuilder;
use sha2::Sha256;
use url::Url;

use crate::storage::account::{Credential, StorageAccount};
use crate::storage::error::{StorageError, StorageResult};

type HmacSha256 = Hmac<Sha256>;

/// Current time in the RFC 1123 format expected by `x-ms-date`.
pub fn rfc1123_now() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Base64 HMAC-SHA256 signature of `string_to_sign`.
pub fn sign(key: &[u8], string_to_sign: &str) -> StorageResult<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StorageError::ConnectionString(format!("unusable account key: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// `/{account}{encoded path}`, the resource part shared by both schemes.
fn resource_path(account: &str, url: &Url) -> String {
    format!("/{}{}", account, url.path())
}

/// SharedKeyLite string-to-sign for the table service.
pub fn table_string_to_sign(date: &str, account: &str, url: &Url) -> String {
    let mut resource = resource_path(account, url);
    if let Some((_, comp)) = url.query_pairs().find(|(k, _)| k == "comp") {
        resource.push_str("?comp=");
        resource.push_str(&comp);
    }
    format!("{}\n{}", date, resource)
}

/// SharedKey string-to-sign for the queue service (GET requests, no body).
pub fn queue_string_to_sign(method: &str, ms_headers: &[(&str, &str)], account: &str, url: &Url) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(12);
    lines.push(method.to_ascii_uppercase());
    // Content-Encoding through Range are all empty for a bodiless GET.
    lines.extend(std::iter::repeat(String::new()).take(11));

    let mut canonical_headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim()))
        .filter(|(k, _)| k.starts_with("x-ms-"))
        .collect();
    canonical_headers.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = lines.join("\n");
    out.push('\n');
    for (name, value) in canonical_headers {
        out.push_str(&name);
        out.push(':');
        out.push_str(value);
        out.push('\n');
    }

    out.push_str(&resource_path(account, url));
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (k, v) in url.query_pairs() {
        params.entry(k.to_ascii_lowercase()).or_default().push(v.into_owned());
    }
    for (name, mut values) in params {
        values.sort();
        out.push('\n');
        out.push_str(&name);
        out.push(':');
        out.push_str(&values.join(","));
    }
    out
}

/// Append the SAS query when the account is authorized by signature.
pub fn apply_sas(account: &StorageAccount, url: &mut Url) {
    if let Credential::Sas(sas) = &account.credential {
        let query = match url.query() {
            Some(existing) if !existing.is_empty() => format!("{}&{}", existing, sas),
            _ => sas.clone(),
        };
        url.set_query(Some(&query));
    }
}

/// Attach the `Authorization` header for a table request.
pub fn authorize_table(
    builder: RequestBuilder,
    account: &StorageAccount,
    url: &Url,
    date: &str,
) -> StorageResult<RequestBuilder> {
    match &account.credential {
        Credential::SharedKey(key) => {
            let signature = sign(key, &table_string_to_sign(date, &account.name, url))?;
            Ok(builder.header(
                reqwest::header::AUTHORIZATION,
                format!("SharedKeyLite {}:{}", account.name, signature),
            ))
        }
        Credential::Sas(_) | Credential::Anonymous => Ok(builder),
    }
}

/// Attach the `Authorization` header for a queue request.
pub fn authorize_queue(
    builder: RequestBuilder,
    account: &StorageAccount,
    url: &Url,
    ms_headers: &[(&str, &str)],
) -> StorageResult<RequestBuilder> {
    match &account.credential {
        Credential::SharedKey(key) => {
            let string_to_sign = queue_string_to_sign("GET", ms_headers, &account.name, url);
            let signature = sign(key, &string_to_sign)?;
            Ok(builder.header(
                reqwest::header::AUTHORIZATION,
                format!("SharedKey {}:{}", account.name, signature),
            ))
        }
        Credential::Sas(_) | Credential::Anonymous => Ok(builder),
    }
}
