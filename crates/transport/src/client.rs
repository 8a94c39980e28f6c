//! Peer replica over HTTP.
//!
//! Talks to another node's `/internal/...` routes. Every failure (connection,
//! unexpected status, undecodable body) becomes a `ReplicationError`, which
//! the coordinator counts as a non-response.

use std::time::Duration;

use async_trait::async_trait;
use corelib::merkle::Digest;
use corelib::node::{Node, NodeId};
use replication::{Entry, Replica, ReplicationError, ReplicationResult};
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use tracing::debug;

use crate::error::TransportResult;

/// Connection timeout for peer requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// A remote node's store, reached through its internal HTTP routes.
#[derive(Debug, Clone)]
pub struct HttpReplica {
    node_id: NodeId,
    endpoint: String,
    client: Client,
}

impl HttpReplica {
    /// Create a replica for `node` with its own client.
    ///
    /// `timeout` bounds each whole request; the coordinator applies its own
    /// deadline on top.
    pub fn new(node: &Node, timeout: Duration) -> TransportResult<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self::with_client(node, client))
    }

    /// Create a replica sharing an existing client (and its pool).
    pub fn with_client(node: &Node, client: Client) -> Self {
        Self {
            node_id: node.id.clone(),
            endpoint: node.endpoint.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn key_url(&self, key: &str) -> String {
        format!("{}/internal/{}", self.endpoint, urlencoding::encode(key))
    }

    fn unreachable(&self, err: reqwest::Error) -> ReplicationError {
        ReplicationError::PeerUnreachable {
            node: self.node_id.clone(),
            reason: err.to_string(),
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> ReplicationError {
        ReplicationError::MalformedResponse {
            node: self.node_id.clone(),
            reason: reason.into(),
        }
    }

    fn expect_success(&self, response: &Response) -> ReplicationResult<()> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.malformed(format!("unexpected status {}", response.status())))
        }
    }
}

#[async_trait]
impl Replica for HttpReplica {
    fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    async fn read(&self, key: &str) -> ReplicationResult<Option<Entry>> {
        let response = self
            .client
            .get(self.key_url(key))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(node = %self.node_id, key, "replica does not hold key");
            return Ok(None);
        }
        self.expect_success(&response)?;

        let entry = response
            .json::<Entry>()
            .await
            .map_err(|e| self.malformed(e.to_string()))?;
        Ok(Some(entry))
    }

    async fn write(&self, key: &str, entry: &Entry) -> ReplicationResult<()> {
        let response = self
            .client
            .put(self.key_url(key))
            .json(entry)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        self.expect_success(&response)
    }

    async fn delete(&self, key: &str) -> ReplicationResult<()> {
        let response = self
            .client
            .delete(self.key_url(key))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        self.expect_success(&response)
    }

    async fn digest(&self) -> ReplicationResult<Digest> {
        let url = format!("{}/internal/digest", self.endpoint);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        self.expect_success(&response)?;

        let text = response.text().await.map_err(|e| self.unreachable(e))?;
        text.parse::<Digest>().map_err(|e| self.malformed(e.to_string()))
    }
}
