//! Shared helpers for integration tests: a config with a fully-featured
//! namespace and an in-process client implementation wired to a node the
//! way a real transport would be.

use std::sync::Arc;
use std::sync::Weak;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use pulse_core::ChannelOptions;
use pulse_core::Client;
use pulse_core::Disconnect;
use pulse_core::Message;
use pulse_core::Namespace;
use pulse_core::Node;
use pulse_core::NodeConfig;
use pulse_core::Publication;
use pulse_core::Result;

/// Config with long task intervals (so background gossip stays out of
/// the way) and one namespace with presence, join/leave and history.
pub fn test_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.node_ping_interval_ms = 60_000;
    config.node_info_clean_interval_ms = 60_000;
    config.node_info_max_delay_ms = 120_000;
    config.node_metrics_interval_ms = 60_000;
    config.namespaces.push(Namespace {
        name: "public".to_owned(),
        options: ChannelOptions {
            presence: true,
            join_leave: true,
            history_size: 10,
            history_lifetime: 60,
        },
    });
    config.validate().expect("test config must be valid")
}

#[derive(Default)]
struct ClientState {
    channels: Vec<String>,
    frames: Vec<Bytes>,
    closed: Option<Disconnect>,
}

/// Client that records delivered frames and keeps its node-side
/// bookkeeping in sync, like a transport-backed client would.
pub struct TestClient {
    id: String,
    user: String,
    node: Weak<Node>,
    state: Mutex<ClientState>,
}

impl TestClient {
    pub fn new(
        id: &str,
        user: &str,
        node: &Arc<Node>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_owned(),
            user: user.to_owned(),
            node: Arc::downgrade(node),
            state: Mutex::new(ClientState::default()),
        })
    }

    fn node(&self) -> Arc<Node> {
        self.node.upgrade().expect("node dropped while client alive")
    }

    pub fn connect(self: &Arc<Self>) -> Result<()> {
        self.node().add_client(self.clone())
    }

    pub async fn subscribe(
        self: &Arc<Self>,
        channel: &str,
    ) -> Result<()> {
        self.node().add_subscription(channel, self.clone()).await?;
        self.state.lock().channels.push(channel.to_owned());
        Ok(())
    }

    /// Publications received so far, in delivery order.
    pub fn publications(&self) -> Vec<Publication> {
        self.state
            .lock()
            .frames
            .iter()
            .filter_map(|frame| match Message::decode(frame) {
                Ok(Message::Publication { publication, .. }) => Some(publication),
                _ => None,
            })
            .collect()
    }

    pub fn num_frames(&self) -> usize {
        self.state.lock().frames.len()
    }

    pub fn channels_empty(&self) -> bool {
        self.state.lock().channels.is_empty()
    }

    pub fn closed(&self) -> Option<Disconnect> {
        self.state.lock().closed.clone()
    }
}

#[async_trait]
impl Client for TestClient {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn user_id(&self) -> String {
        self.user.clone()
    }

    fn channels(&self) -> Vec<String> {
        self.state.lock().channels.clone()
    }

    fn send(
        &self,
        frame: Bytes,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed.is_some() {
            return Err(pulse_core::Error::ClientClosed);
        }
        state.frames.push(frame);
        Ok(())
    }

    async fn unsubscribe(
        &self,
        channel: &str,
    ) -> Result<()> {
        if let Some(node) = self.node.upgrade() {
            node.remove_subscription(channel, self).await?;
        }
        self.state.lock().channels.retain(|ch| ch != channel);
        Ok(())
    }

    async fn close(
        &self,
        advice: Disconnect,
    ) -> Result<()> {
        let channels = self.channels();
        if let Some(node) = self.node.upgrade() {
            for channel in &channels {
                node.remove_subscription(channel, self).await?;
            }
            node.remove_client(self)?;
        }
        let mut state = self.state.lock();
        state.channels.clear();
        state.closed = Some(advice);
        Ok(())
    }
}
