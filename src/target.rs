//! Client side of the key-value service contract.
//!
//! The service exposes a single resource, `/store/{key}`:
//! `POST` with `{"Value": "..."}` creates, `GET` answers `{key: value}` or 404,
//! `DELETE` removes. Replies are parsed into [`ReadReply`] so that every
//! shape the harness can observe is a typed branch.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::trace;

use crate::config::TargetConfig;
use crate::error::ProbeError;

/// Outcome of a `GET /store/{key}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadReply {
    /// 200 with a JSON object of key/value pairs
    Found(BTreeMap<String, String>),
    /// 404
    NotFound,
    /// Any other status
    Status(u16),
}

impl ReadReply {
    /// Interpret a raw status and body. A 200 with a body that is not a
    /// string-to-string JSON object is malformed.
    pub fn from_parts(status: u16, body: &[u8]) -> Result<Self, ProbeError> {
        match status {
            200 => serde_json::from_slice::<BTreeMap<String, String>>(body)
                .map(ReadReply::Found)
                .map_err(|e| ProbeError::MalformedBody(e.to_string())),
            404 => Ok(ReadReply::NotFound),
            other => Ok(ReadReply::Status(other)),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            ReadReply::Found(_) => 200,
            ReadReply::NotFound => 404,
            ReadReply::Status(s) => *s,
        }
    }
}

/// The operations a probe needs from the service under test.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Store `value` under `key`; returns the HTTP status.
    async fn create(&self, key: &str, value: &str) -> Result<u16, ProbeError>;

    async fn read(&self, key: &str) -> Result<ReadReply, ProbeError>;

    /// Remove `key`; returns the HTTP status.
    async fn delete(&self, key: &str) -> Result<u16, ProbeError>;
}

#[derive(Debug, Serialize)]
struct CreateBody<'a> {
    #[serde(rename = "Value")]
    value: &'a str,
}

/// reqwest-backed [`KvStore`]. Clones share one connection pool.
#[derive(Clone, Debug)]
pub struct HttpKvStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpKvStore {
    pub fn new(cfg: &TargetConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("kvprobe/", env!("CARGO_PKG_VERSION"))),
        );
        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = cfg.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: cfg.base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/store/{}", self.base_url, key)
    }
}

#[async_trait]
impl KvStore for HttpKvStore {
    async fn create(&self, key: &str, value: &str) -> Result<u16, ProbeError> {
        let resp = self
            .client
            .post(self.url_for(key))
            .json(&CreateBody { value })
            .send()
            .await?;
        let status = resp.status();
        // Drain so the connection goes back to the pool.
        resp.bytes().await?;
        trace!(%key, %status, "POST");
        Ok(status.as_u16())
    }

    async fn read(&self, key: &str) -> Result<ReadReply, ProbeError> {
        let resp = self.client.get(self.url_for(key)).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        trace!(%key, %status, len = body.len(), "GET");
        ReadReply::from_parts(status.as_u16(), &body)
    }

    async fn delete(&self, key: &str) -> Result<u16, ProbeError> {
        let resp = self.client.delete(self.url_for(key)).send().await?;
        let status = resp.status();
        resp.bytes().await?;
        trace!(%key, %status, "DELETE");
        Ok(status.as_u16())
    }
}
