//! End-to-end tests over HTTP.
//!
//! # Test Strategy
//!
//! 1. **Router**: a single node driven through `tower::ServiceExt::oneshot`
//! 2. **Cluster**: three real nodes on ephemeral ports, talking to each other
//!    through `HttpReplica`
//! 3. **Failures**: nodes stopped mid-test; quorum still holds or fails as
//!    expected

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use corelib::merkle::Digest;
use corelib::node::{Node, NodeId};
use corelib::ring::{HashRing, RingBuilder};
use replication::{Coordinator, Entry, LocalStore, QuorumConfig, Replica};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use transport::server::Health;
use transport::{router, AppState, HttpReplica, NodeServer};

// ============================================================================
// Helpers
// ============================================================================

fn single_node() -> Arc<Coordinator> {
    let ring = Arc::new(HashRing::new());
    ring.add_node(Node::new("solo", "http://127.0.0.1:0"), 8);
    Arc::new(Coordinator::new(
        NodeId::from("solo"),
        Arc::new(LocalStore::new()),
        ring,
        Vec::<Arc<dyn Replica>>::new(),
        QuorumConfig::new(1, 1, 1),
    ))
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn request(method: &str, uri: &str, json: Option<&str>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match json {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

struct Cluster {
    coordinators: Vec<Arc<Coordinator>>,
    endpoints: Vec<String>,
    stops: Vec<CancellationToken>,
    http: reqwest::Client,
}

impl Cluster {
    /// Start `count` nodes named node1..nodeN, fully replicated when N = count.
    async fn start(count: usize, config: QuorumConfig) -> Self {
        let mut servers = Vec::new();
        let mut members = Vec::new();
        for i in 1..=count {
            let server = NodeServer::bind("127.0.0.1:0").await.unwrap();
            members.push(Node::new(
                format!("node{}", i),
                format!("http://{}", server.local_addr()),
            ));
            servers.push(server);
        }

        let mut coordinators = Vec::new();
        let mut stops = Vec::new();
        for (server, me) in servers.into_iter().zip(&members) {
            let ring = members
                .iter()
                .cloned()
                .fold(RingBuilder::new().with_vnodes(32), |b, n| b.add_node(n))
                .build();
            let peers: Vec<Arc<dyn Replica>> = members
                .iter()
                .filter(|n| n.id != me.id)
                .map(|n| {
                    Arc::new(HttpReplica::new(n, Duration::from_secs(2)).unwrap()) as Arc<dyn Replica>
                })
                .collect();

            let coordinator = Arc::new(Coordinator::new(
                me.id.clone(),
                Arc::new(LocalStore::new()),
                Arc::new(ring),
                peers,
                config.clone(),
            ));
            let stop = CancellationToken::new();
            tokio::spawn(server.serve(Arc::clone(&coordinator), stop.clone()));

            coordinators.push(coordinator);
            stops.push(stop);
        }

        Self {
            coordinators,
            endpoints: members.into_iter().map(|n| n.endpoint).collect(),
            stops,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, node: usize, key: &str) -> String {
        format!("{}/{}", self.endpoints[node], urlencoding::encode(key))
    }

    async fn set(&self, node: usize, key: &str, value: &str) -> reqwest::StatusCode {
        self.http
            .put(self.url(node, key))
            .json(&serde_json::json!({ "value": value }))
            .send()
            .await
            .unwrap()
            .status()
    }

    async fn get(&self, node: usize, key: &str) -> (reqwest::StatusCode, String) {
        let response = self.http.get(self.url(node, key)).send().await.unwrap();
        let status = response.status();
        (status, response.text().await.unwrap())
    }

    async fn delete(&self, node: usize, key: &str) -> reqwest::StatusCode {
        self.http.delete(self.url(node, key)).send().await.unwrap().status()
    }

    /// Stop a node and wait until its port refuses connections.
    async fn stop(&self, node: usize) {
        self.stops[node].cancel();
        let health = format!("{}/internal/health", self.endpoints[node]);
        for _ in 0..50 {
            if self.http.get(&health).send().await.is_err() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        for stop in &self.stops {
            stop.cancel();
        }
    }
}

// ============================================================================
// Router Tests
// ============================================================================

#[tokio::test]
async fn test_router_set_get_delete() {
    let app = router(AppState::new(single_node()));

    let (status, _) = send(app.clone(), request("PUT", "/greeting", Some(r#"{"value":"hi"}"#))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(app.clone(), request("GET", "/greeting", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "hi");

    let (status, _) = send(app.clone(), request("DELETE", "/greeting", None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(app, request("GET", "/greeting", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_router_delete_absent_key_is_no_content() {
    let app = router(AppState::new(single_node()));
    let (status, _) = send(app, request("DELETE", "/never-set", None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_router_internal_routes() {
    let coordinator = single_node();
    let app = router(AppState::new(Arc::clone(&coordinator)));

    let (status, _) = send(
        app.clone(),
        request("PUT", "/internal/user%3A1", Some(r#"{"value":"alice","timestamp":42}"#)),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(coordinator.store().get("user:1"), Some(Entry::new("alice", 42)));

    let (status, body) = send(app.clone(), request("GET", "/internal/user%3A1", None)).await;
    assert_eq!(status, StatusCode::OK);
    let entry: Entry = serde_json::from_str(&body).unwrap();
    assert_eq!(entry, Entry::new("alice", 42));

    let (status, body) = send(app.clone(), request("GET", "/internal/digest", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.parse::<Digest>().unwrap(), coordinator.store().digest());

    let (status, _) = send(app.clone(), request("DELETE", "/internal/user%3A1", None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(app, request("GET", "/internal/user%3A1", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_router_internal_write_is_blind() {
    let coordinator = single_node();
    coordinator.store().set("k", "newer", 200);
    let app = router(AppState::new(Arc::clone(&coordinator)));

    send(app, request("PUT", "/internal/k", Some(r#"{"value":"older","timestamp":100}"#))).await;
    assert_eq!(coordinator.store().get("k"), Some(Entry::new("older", 100)));
}

#[tokio::test]
async fn test_router_health() {
    let coordinator = single_node();
    coordinator.store().set("a", "1", 1);
    let app = router(AppState::new(coordinator));

    let (status, body) = send(app, request("GET", "/internal/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    let health: Health = serde_json::from_str(&body).unwrap();
    assert_eq!(health.node_id, "solo");
    assert_eq!(health.keys, 1);
}

#[tokio::test]
async fn test_router_keys_named_like_routes_are_plain_keys() {
    let app = router(AppState::new(single_node()));

    for key in ["health", "internal"] {
        let uri = format!("/{}", key);
        let (status, _) = send(app.clone(), request("PUT", &uri, Some(r#"{"value":"v"}"#))).await;
        assert_eq!(status, StatusCode::NO_CONTENT, "PUT {}", uri);

        let (status, body) = send(app.clone(), request("GET", &uri, None)).await;
        assert_eq!(status, StatusCode::OK, "GET {}", uri);
        assert_eq!(body, "v");

        let (status, _) = send(app.clone(), request("DELETE", &uri, None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT, "DELETE {}", uri);
    }
}

#[tokio::test]
async fn test_router_rejects_malformed_body() {
    let app = router(AppState::new(single_node()));
    let (status, _) = send(app, request("PUT", "/k", Some(r#"{"nope":1}"#))).await;
    assert!(status.is_client_error());
}

// ============================================================================
// Cluster Tests
// ============================================================================

#[tokio::test]
async fn test_write_on_one_node_read_from_another() {
    let cluster = Cluster::start(3, QuorumConfig::new(3, 2, 2)).await;

    assert_eq!(cluster.set(0, "user:1", "alice").await, reqwest::StatusCode::NO_CONTENT);

    let (status, body) = cluster.get(1, "user:1").await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(body, "alice");
}

#[tokio::test]
async fn test_delete_on_one_node_visible_from_another() {
    let cluster = Cluster::start(3, QuorumConfig::new(3, 2, 2)).await;

    cluster.set(0, "k", "v").await;
    assert_eq!(cluster.delete(1, "k").await, reqwest::StatusCode::NO_CONTENT);

    let (status, _) = cluster.get(2, "k").await;
    assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_overwrite_wins_everywhere() {
    let cluster = Cluster::start(3, QuorumConfig::new(3, 2, 2)).await;

    cluster.set(0, "k", "first").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    cluster.set(2, "k", "second").await;

    for node in 0..3 {
        assert_eq!(cluster.get(node, "k").await.1, "second");
    }
}

#[tokio::test]
async fn test_survives_one_node_down() {
    let cluster = Cluster::start(3, QuorumConfig::new(3, 2, 2)).await;
    cluster.stop(2).await;

    assert_eq!(cluster.set(0, "k", "v").await, reqwest::StatusCode::NO_CONTENT);
    let (status, body) = cluster.get(1, "k").await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(body, "v");
}

#[tokio::test]
async fn test_write_fails_without_quorum() {
    let cluster = Cluster::start(3, QuorumConfig::new(3, 2, 2)).await;
    cluster.stop(1).await;
    cluster.stop(2).await;

    assert_eq!(
        cluster.set(0, "k", "v").await,
        reqwest::StatusCode::INTERNAL_SERVER_ERROR
    );
    // The write is kept where it landed.
    assert_eq!(cluster.coordinators[0].store().get("k").map(|e| e.value), Some("v".into()));

    // A read also lacks quorum and is indistinguishable from a miss.
    assert_eq!(cluster.get(0, "k").await.0, reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_read_repair_over_http() {
    let cluster = Cluster::start(3, QuorumConfig::new(3, 2, 3)).await;

    cluster.coordinators[1].store().set("k", "fresh", 500);
    cluster.coordinators[2].store().set("k", "stale", 100);

    let (_, body) = cluster.get(0, "k").await;
    assert_eq!(body, "fresh");

    cluster.coordinators[0].wait_background().await;
    for coordinator in &cluster.coordinators {
        assert_eq!(coordinator.store().get("k"), Some(Entry::new("fresh", 500)));
    }
}

#[tokio::test]
async fn test_anti_entropy_over_http() {
    let cluster = Cluster::start(3, QuorumConfig::new(3, 3, 1)).await;

    for i in 0..10 {
        cluster.set(i % 3, &format!("key{}", i), &format!("value{}", i)).await;
    }
    let report = cluster.coordinators[0].anti_entropy().await;
    assert!(report.is_consistent());
    assert_eq!(report.in_sync.len(), 2);

    cluster.coordinators[2].store().set("rogue", "x", 1);
    let report = cluster.coordinators[0].anti_entropy().await;
    assert_eq!(report.diverged.len(), 1);
    assert_eq!(report.diverged[0].peer, NodeId::from("node3"));

    cluster.stop(1).await;
    let report = cluster.coordinators[0].anti_entropy().await;
    assert_eq!(report.unreachable, vec![NodeId::from("node2")]);
}
