//! End-to-end scenarios over the in-memory engine: one or two nodes,
//! real clients, the public node API only.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::TestClient;
use common::test_config;

use pulse_core::ClientInfo;
use pulse_core::Engine;
use pulse_core::MemoryEngine;
use pulse_core::Node;
use pulse_core::Publication;
use pulse_core::recv_op;

fn start_node(engine: &Arc<MemoryEngine>) -> Arc<Node> {
    let node = Arc::new(Node::new(test_config()));
    engine.attach(&node);
    node
}

async fn run_node(
    node: &Arc<Node>,
    engine: &Arc<MemoryEngine>,
) {
    node.clone().run(engine.clone()).await.expect("node should start");
}

#[tokio::test]
async fn test_single_node_publish_reaches_subscriber() {
    let engine = Arc::new(MemoryEngine::new());
    let node = start_node(&engine);
    run_node(&node, &engine).await;

    let client = TestClient::new("a", "u1", &node);
    client.connect().unwrap();
    client.subscribe("news").await.unwrap();
    assert_eq!(node.hub().num_subscribers("news"), 1);

    let mut publication = Publication {
        uid: String::new(),
        data: b"x".to_vec(),
        info: None,
    };
    recv_op(node.publish("news", &mut publication, None))
        .await
        .expect("publish should succeed");

    assert!(!publication.uid.is_empty(), "node assigns a uid");
    assert_eq!(client.num_frames(), 1);
    let received = client.publications();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].uid, publication.uid);
    assert_eq!(received[0].data, b"x");
}

#[tokio::test]
async fn test_publish_without_subscribers_is_cheap() {
    let engine = Arc::new(MemoryEngine::new());
    let node = start_node(&engine);
    run_node(&node, &engine).await;

    let mut publication = Publication::default();
    recv_op(node.publish("news", &mut publication, None)).await.unwrap();
}

#[tokio::test]
async fn test_publication_reaches_subscribers_on_both_nodes() {
    let engine = Arc::new(MemoryEngine::new());
    let n1 = start_node(&engine);
    let n2 = start_node(&engine);
    run_node(&n1, &engine).await;
    run_node(&n2, &engine).await;

    let a = TestClient::new("a", "u1", &n1);
    a.connect().unwrap();
    a.subscribe("news").await.unwrap();
    let b = TestClient::new("b", "u2", &n2);
    b.connect().unwrap();
    b.subscribe("news").await.unwrap();

    let mut publication = Publication {
        data: b"hello".to_vec(),
        ..Publication::default()
    };
    recv_op(n1.publish("news", &mut publication, None)).await.unwrap();

    assert_eq!(a.publications().len(), 1);
    assert_eq!(b.publications().len(), 1, "engine fans out to every node");
}

#[tokio::test]
async fn test_nodes_discover_each_other_through_gossip() {
    let engine = Arc::new(MemoryEngine::new());
    let n1 = start_node(&engine);
    let n2 = start_node(&engine);
    run_node(&n1, &engine).await;
    run_node(&n2, &engine).await;

    let info = n1.info().expect("info should be available");
    assert_eq!(info.engine, "in memory");
    let uids: Vec<&str> = info.nodes.iter().map(|n| n.uid.as_str()).collect();
    assert!(uids.contains(&n1.uid()));
    assert!(uids.contains(&n2.uid()));
}

#[tokio::test]
async fn test_cluster_unsubscribe_detaches_user_on_every_node() {
    let engine = Arc::new(MemoryEngine::new());
    let n1 = start_node(&engine);
    let n2 = start_node(&engine);
    run_node(&n1, &engine).await;
    run_node(&n2, &engine).await;

    let a = TestClient::new("a", "u", &n1);
    a.connect().unwrap();
    a.subscribe("room").await.unwrap();
    let b = TestClient::new("b", "u", &n2);
    b.connect().unwrap();
    b.subscribe("room").await.unwrap();

    let controls_before = n2.node().metrics["node_num_control_received"];

    n1.unsubscribe("u", "room").await.expect("cluster unsubscribe");

    assert!(a.channels_empty(), "local node detached");
    assert!(b.channels_empty(), "remote node detached via control command");
    assert_eq!(n1.hub().num_subscribers("room"), 0);
    assert_eq!(n2.hub().num_subscribers("room"), 0);
    assert!(
        engine.channels().await.unwrap().is_empty(),
        "both nodes released their engine subscription"
    );
    assert_eq!(
        n2.node().metrics["node_num_control_received"],
        controls_before + 1,
        "exactly one control command fanned out"
    );
}

#[tokio::test]
async fn test_cluster_disconnect_closes_user_everywhere() {
    let engine = Arc::new(MemoryEngine::new());
    let n1 = start_node(&engine);
    let n2 = start_node(&engine);
    run_node(&n1, &engine).await;
    run_node(&n2, &engine).await;

    let a = TestClient::new("a", "u", &n1);
    a.connect().unwrap();
    a.subscribe("room").await.unwrap();
    let b = TestClient::new("b", "u", &n2);
    b.connect().unwrap();
    b.subscribe("room").await.unwrap();

    n1.disconnect("u", false).await.expect("cluster disconnect");

    // Connection closes run asynchronously.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let advice_a = a.closed().expect("local client closed");
    assert_eq!(advice_a.reason, "disconnect");
    assert!(!advice_a.reconnect);

    let advice_b = b.closed().expect("remote client closed");
    assert_eq!(advice_b.reason, "disconnect");
    assert!(!advice_b.reconnect, "reconnect intent travels on the wire");

    assert_eq!(n1.hub().num_clients(), 0);
    assert_eq!(n2.hub().num_clients(), 0);
}

#[tokio::test]
async fn test_presence_round_trip() {
    let engine = Arc::new(MemoryEngine::new());
    let node = start_node(&engine);
    run_node(&node, &engine).await;

    let info = ClientInfo {
        user: "u1".to_owned(),
        client: "a".to_owned(),
        ..ClientInfo::default()
    };
    node.add_presence("public:chat", "a", info.clone()).await.unwrap();

    let presence = node.presence("public:chat").await.unwrap();
    assert_eq!(presence.len(), 1);
    assert_eq!(presence["a"], info);

    node.remove_presence("public:chat", "a").await.unwrap();
    assert!(node.presence("public:chat").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_history_round_trip() {
    let engine = Arc::new(MemoryEngine::new());
    let node = start_node(&engine);
    run_node(&node, &engine).await;

    for data in [b"one".to_vec(), b"two".to_vec()] {
        let mut publication = Publication {
            data,
            ..Publication::default()
        };
        recv_op(node.publish("public:chat", &mut publication, None)).await.unwrap();
    }

    let history = node.history("public:chat").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].data, b"two", "newest first");

    let last = node.last_message_id("public:chat").await.unwrap();
    assert_eq!(last, history[0].uid);

    node.remove_history("public:chat").await.unwrap();
    assert!(node.history("public:chat").await.unwrap().is_empty());
    assert_eq!(node.last_message_id("public:chat").await.unwrap(), "");
}

#[tokio::test]
async fn test_shutdown_closes_clients_with_reconnect_advice() {
    let engine = Arc::new(MemoryEngine::new());
    let node = start_node(&engine);
    run_node(&node, &engine).await;

    let client = TestClient::new("a", "u1", &node);
    client.connect().unwrap();
    client.subscribe("news").await.unwrap();

    node.shutdown().await.unwrap();

    let advice = client.closed().expect("client closed on shutdown");
    assert_eq!(advice.reason, "shutdown");
    assert!(advice.reconnect, "clients are told to reconnect elsewhere");
    assert_eq!(node.hub().num_clients(), 0);
}
