//! JSON-over-HTTP RPC client shared by ksck's remote proxies and the client
//! library. Every response stamped with a server timestamp advances the
//! client's latest observed timestamp.

use crate::common::clock::{ObservedTimestamp, Timestamp};
use crate::common::error::ErrorBody;
use crate::common::wire::TIMESTAMP_HEADER;
use crate::common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    observed: Arc<ObservedTimestamp>,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()?;
        Ok(Self {
            http,
            observed: Arc::new(ObservedTimestamp::new()),
            timeout,
        })
    }

    pub fn observed(&self) -> &Arc<ObservedTimestamp> {
        &self.observed
    }

    pub fn latest_observed_timestamp(&self) -> Option<Timestamp> {
        self.observed.latest()
    }

    pub async fn get<T: DeserializeOwned>(&self, node: &str, url: &str) -> Result<T> {
        let request = self.http.get(url).timeout(self.timeout);
        self.send(node, request).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        node: &str,
        url: &str,
        body: &B,
    ) -> Result<T> {
        self.post_with_timeout(node, url, body, self.timeout).await
    }

    pub async fn post_with_timeout<B: Serialize, T: DeserializeOwned>(
        &self,
        node: &str,
        url: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<T> {
        let request = self.http.post(url).json(body).timeout(timeout);
        self.send(node, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        node: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = request.send().await.map_err(|e| transport_error(node, e))?;

        if let Some(ts) = response
            .headers()
            .get(TIMESTAMP_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<Timestamp>().ok())
        {
            self.observed.observe(ts);
        }

        if response.status().is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| transport_error(node, e));
        }

        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) => Err(Error::from_remote(node, body)),
            Err(_) => Err(Error::Http(format!("{} returned {}", node, status))),
        }
    }
}

fn transport_error(node: &str, e: reqwest::Error) -> Error {
    match Error::from(e) {
        Error::ConnectionFailed(reason) => Error::Unavailable {
            node: node.to_string(),
            reason,
        },
        other => other,
    }
}
