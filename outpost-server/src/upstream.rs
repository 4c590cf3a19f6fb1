use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use outpost::RegistryClient;
use outpost_core::{NodeIdentity, UpstreamError};
use reqwest::{Client, Response};
use tracing::debug;

/// HTTP client for every outbound Registry call: resource forwarding,
/// registration, and reachability probing.
///
/// One instance per process; reqwest pools connections internally. The
/// client-level timeout bounds calls made outside the fetch pipeline
/// (registration in particular); the pipeline applies its own, tighter
/// budgets on top.
pub struct RegistryHttpClient {
    http: Client,
    base_url: String,
}

impl RegistryHttpClient {
    /// Builds a client for the Registry at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    /// Fetches `path_and_query` from the Registry and returns the raw body.
    ///
    /// Success bodies come back byte-opaque. A 5xx answer counts as an
    /// outage (eligible for stale fallback downstream); any other non-2xx
    /// answer is relayed as [`UpstreamError::Status`].
    pub async fn forward(&self, path_and_query: &str) -> Result<Bytes, UpstreamError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!(%url, "forwarding to registry");
        let response = self.http.get(&url).send().await.map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            response.bytes().await.map_err(transport_error)
        } else if status.is_server_error() {
            Err(UpstreamError::unavailable(format!(
                "registry answered {status}"
            )))
        } else {
            Err(UpstreamError::Status {
                status: status.as_u16(),
            })
        }
    }

    async fn send_registration(&self, identity: &NodeIdentity) -> Result<(), UpstreamError> {
        let url = format!("{}/api/registry/register", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(identity)
            .send()
            .await
            .map_err(transport_error)?;
        ack_only(response)
    }

    async fn send_probe(&self) -> Result<(), UpstreamError> {
        let url = format!("{}/", self.base_url);
        // Any HTTP answer proves the round trip; the status is irrelevant
        // for a latency measurement.
        self.http
            .get(&url)
            .send()
            .await
            .map(|_response| ())
            .map_err(transport_error)
    }
}

#[async_trait]
impl RegistryClient for RegistryHttpClient {
    async fn register(&self, identity: &NodeIdentity) -> Result<(), UpstreamError> {
        self.send_registration(identity).await
    }

    async fn probe(&self) -> Result<(), UpstreamError> {
        self.send_probe().await
    }
}

fn transport_error(error: reqwest::Error) -> UpstreamError {
    if error.is_timeout() {
        UpstreamError::Timeout
    } else {
        UpstreamError::unavailable(error.to_string())
    }
}

fn ack_only(response: Response) -> Result<(), UpstreamError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else if status.is_server_error() {
        Err(UpstreamError::unavailable(format!(
            "registry answered {status}"
        )))
    } else {
        Err(UpstreamError::Status {
            status: status.as_u16(),
        })
    }
}
