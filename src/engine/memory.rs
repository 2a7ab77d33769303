//! In-memory engine for single-process deployments and tests.
//!
//! Several nodes may attach to one instance, which then behaves like the
//! shared transport of a cluster: every publish and control command is
//! delivered to every attached node. Presence and history live in plain
//! maps with advisory expiry.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::Result;
use crate::config::ChannelOptions;
use crate::control::Command;
use crate::engine::Engine;
use crate::engine::OpReceiver;
use crate::engine::completed_op;
use crate::node::Node;
use crate::proto::ClientInfo;
use crate::proto::Join;
use crate::proto::Leave;
use crate::proto::Publication;

struct PresenceEntry {
    info: ClientInfo,
    expires_at: Instant,
}

struct HistoryItem {
    publication: Publication,
    expires_at: Instant,
}

/// Engine keeping all state in process memory.
#[derive(Default)]
pub struct MemoryEngine {
    nodes: RwLock<Vec<Weak<Node>>>,
    /// Channel name to the number of nodes subscribed to it.
    channels: RwLock<HashMap<String, usize>>,
    presence: RwLock<HashMap<String, HashMap<String, PresenceEntry>>>,
    history: RwLock<HashMap<String, VecDeque<HistoryItem>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a node to this engine's delivery fan-out. Attach every
    /// node before calling [`Node::run`].
    pub fn attach(
        &self,
        node: &Arc<Node>,
    ) {
        self.nodes.write().push(Arc::downgrade(node));
    }

    fn attached(&self) -> Vec<Arc<Node>> {
        self.nodes.read().iter().filter_map(Weak::upgrade).collect()
    }

    fn retain_history(
        &self,
        channel: &str,
        publication: &Publication,
        opts: &ChannelOptions,
    ) {
        if !opts.history_enabled() {
            return;
        }
        let mut history = self.history.write();
        let items = history.entry(channel.to_owned()).or_default();
        items.push_front(HistoryItem {
            publication: publication.clone(),
            expires_at: Instant::now() + Duration::from_secs(opts.history_lifetime),
        });
        items.truncate(opts.history_size);
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    fn name(&self) -> String {
        "in memory".to_owned()
    }

    async fn run(&self) -> Result<()> {
        Ok(())
    }

    async fn channels(&self) -> Result<Vec<String>> {
        Ok(self.channels.read().keys().cloned().collect())
    }

    fn publish(
        &self,
        channel: &str,
        publication: Publication,
        opts: &ChannelOptions,
    ) -> OpReceiver {
        self.retain_history(channel, &publication, opts);
        let mut result = Ok(());
        for node in self.attached() {
            if let Err(e) = node.handle_publication(channel, publication.clone()) {
                result = Err(e);
            }
        }
        completed_op(result)
    }

    fn publish_join(
        &self,
        channel: &str,
        join: Join,
        _opts: &ChannelOptions,
    ) -> OpReceiver {
        let mut result = Ok(());
        for node in self.attached() {
            if let Err(e) = node.handle_join(channel, join.clone()) {
                result = Err(e);
            }
        }
        completed_op(result)
    }

    fn publish_leave(
        &self,
        channel: &str,
        leave: Leave,
        _opts: &ChannelOptions,
    ) -> OpReceiver {
        let mut result = Ok(());
        for node in self.attached() {
            if let Err(e) = node.handle_leave(channel, leave.clone()) {
                result = Err(e);
            }
        }
        completed_op(result)
    }

    fn publish_control(
        &self,
        cmd: Command,
    ) -> OpReceiver {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let nodes = self.attached();
        tokio::spawn(async move {
            let mut result = Ok(());
            for node in nodes {
                if let Err(e) = node.handle_control(cmd.clone()).await {
                    result = Err(e);
                }
            }
            let _ = tx.send(result);
        });
        rx
    }

    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<()> {
        *self.channels.write().entry(channel.to_owned()).or_insert(0) += 1;
        Ok(())
    }

    async fn unsubscribe(
        &self,
        channel: &str,
    ) -> Result<()> {
        let mut channels = self.channels.write();
        if let Some(count) = channels.get_mut(channel) {
            *count -= 1;
            if *count == 0 {
                channels.remove(channel);
            }
        }
        Ok(())
    }

    async fn add_presence(
        &self,
        channel: &str,
        uid: &str,
        info: ClientInfo,
        expire_secs: u64,
    ) -> Result<()> {
        let mut presence = self.presence.write();
        presence.entry(channel.to_owned()).or_default().insert(
            uid.to_owned(),
            PresenceEntry {
                info,
                expires_at: Instant::now() + Duration::from_secs(expire_secs),
            },
        );
        Ok(())
    }

    async fn remove_presence(
        &self,
        channel: &str,
        uid: &str,
    ) -> Result<()> {
        let mut presence = self.presence.write();
        if let Some(entries) = presence.get_mut(channel) {
            entries.remove(uid);
            if entries.is_empty() {
                presence.remove(channel);
            }
        }
        Ok(())
    }

    async fn presence(
        &self,
        channel: &str,
    ) -> Result<HashMap<String, ClientInfo>> {
        let now = Instant::now();
        let presence = self.presence.read();
        Ok(presence
            .get(channel)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, entry)| entry.expires_at > now)
                    .map(|(uid, entry)| (uid.clone(), entry.info.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn history(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<Publication>> {
        let now = Instant::now();
        let history = self.history.read();
        let Some(items) = history.get(channel) else {
            return Ok(Vec::new());
        };
        let mut publications: Vec<Publication> = items
            .iter()
            .filter(|item| item.expires_at > now)
            .map(|item| item.publication.clone())
            .collect();
        if limit > 0 {
            publications.truncate(limit);
        }
        Ok(publications)
    }

    async fn remove_history(
        &self,
        channel: &str,
    ) -> Result<()> {
        self.history.write().remove(channel);
        Ok(())
    }
}
