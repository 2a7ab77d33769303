use crate::config::ChannelOptions;
use crate::engine::Engine;
use crate::engine::MemoryEngine;
use crate::engine::recv_op;
use crate::proto::ClientInfo;
use crate::proto::Publication;

fn history_opts() -> ChannelOptions {
    ChannelOptions {
        presence: false,
        join_leave: false,
        history_size: 2,
        history_lifetime: 60,
    }
}

fn publication(uid: &str) -> Publication {
    Publication {
        uid: uid.to_owned(),
        data: b"data".to_vec(),
        info: None,
    }
}

#[tokio::test]
async fn test_subscribe_tracks_channels() {
    let engine = MemoryEngine::new();
    engine.subscribe("news").await.unwrap();
    engine.subscribe("chat").await.unwrap();
    engine.unsubscribe("chat").await.unwrap();

    let channels = engine.channels().await.unwrap();
    assert_eq!(channels, vec!["news".to_owned()]);
}

#[tokio::test]
async fn test_history_keeps_newest_within_size() {
    let engine = MemoryEngine::new();
    let opts = history_opts();
    for uid in ["p1", "p2", "p3"] {
        recv_op(engine.publish("news", publication(uid), &opts)).await.unwrap();
    }

    let history = engine.history("news", 0).await.unwrap();
    let uids: Vec<&str> = history.iter().map(|p| p.uid.as_str()).collect();
    assert_eq!(uids, vec!["p3", "p2"], "newest first, trimmed to size");

    let limited = engine.history("news", 1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].uid, "p3");
}

#[tokio::test]
async fn test_history_disabled_retains_nothing() {
    let engine = MemoryEngine::new();
    let opts = ChannelOptions::default();
    recv_op(engine.publish("news", publication("p1"), &opts)).await.unwrap();
    assert!(engine.history("news", 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_history() {
    let engine = MemoryEngine::new();
    recv_op(engine.publish("news", publication("p1"), &history_opts())).await.unwrap();
    engine.remove_history("news").await.unwrap();
    assert!(engine.history("news", 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_presence_add_remove() {
    let engine = MemoryEngine::new();
    let info = ClientInfo {
        user: "u1".to_owned(),
        client: "c1".to_owned(),
        ..ClientInfo::default()
    };
    engine.add_presence("news", "c1", info.clone(), 60).await.unwrap();

    let presence = engine.presence("news").await.unwrap();
    assert_eq!(presence.len(), 1);
    assert_eq!(presence["c1"], info);

    engine.remove_presence("news", "c1").await.unwrap();
    assert!(engine.presence("news").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_presence_expiry_is_honored() {
    let engine = MemoryEngine::new();
    engine
        .add_presence("news", "c1", ClientInfo::default(), 0)
        .await
        .unwrap();
    assert!(
        engine.presence("news").await.unwrap().is_empty(),
        "zero ttl entries are already expired"
    );
}

#[tokio::test]
async fn test_presence_on_unknown_channel() {
    let engine = MemoryEngine::new();
    assert!(engine.presence("nowhere").await.unwrap().is_empty());
}
