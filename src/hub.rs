//! Local registry of client connections and their subscriptions.
//!
//! Three indices live under one reader-writer lock: connection id to
//! client, channel to subscriber set, user id to connection set. The hub
//! signals empty/non-empty channel transitions to the caller so the node
//! can keep the engine subscription set in sync.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::task::JoinSet;
use tracing::debug;
use tracing::warn;

use crate::Error;
use crate::Result;
use crate::client::Client;
use crate::proto::Disconnect;
use crate::proto::Join;
use crate::proto::Leave;
use crate::proto::Message;
use crate::proto::Publication;

#[derive(Default)]
struct HubInner {
    clients: HashMap<String, Arc<dyn Client>>,
    subs: HashMap<String, HashSet<String>>,
    users: HashMap<String, HashSet<String>>,
}

/// Connection hub of one node.
pub struct Hub {
    inner: RwLock<HubInner>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HubInner::default()),
        }
    }

    /// Registers an authenticated connection. Fails if another connection
    /// already uses the same id.
    pub fn add(
        &self,
        client: Arc<dyn Client>,
    ) -> Result<()> {
        let id = client.id();
        let user = client.user_id();
        let mut inner = self.inner.write();
        if inner.clients.contains_key(&id) {
            return Err(Error::AlreadyExists);
        }
        inner.users.entry(user).or_default().insert(id.clone());
        inner.clients.insert(id, client);
        Ok(())
    }

    /// Unregisters a connection. Removing an unknown connection is a
    /// no-op. Callers unsubscribe the connection's channels first so the
    /// engine side-effects fire.
    pub fn remove(
        &self,
        client: &dyn Client,
    ) -> Result<()> {
        let id = client.id();
        let user = client.user_id();
        let mut inner = self.inner.write();
        inner.clients.remove(&id);
        if let Some(conns) = inner.users.get_mut(&user) {
            conns.remove(&id);
            if conns.is_empty() {
                inner.users.remove(&user);
            }
        }
        Ok(())
    }

    /// Registers a subscription. Returns true iff the channel set
    /// transitioned from empty to non-empty on this node.
    pub fn add_sub(
        &self,
        channel: &str,
        client: Arc<dyn Client>,
    ) -> Result<bool> {
        let id = client.id();
        let user = client.user_id();
        let mut inner = self.inner.write();
        inner.users.entry(user).or_default().insert(id.clone());
        inner.clients.entry(id.clone()).or_insert(client);
        let subscribers = inner.subs.entry(channel.to_owned()).or_default();
        let first = subscribers.is_empty();
        subscribers.insert(id);
        Ok(first)
    }

    /// Unregisters a subscription. Returns true iff the channel set
    /// became empty and was removed.
    pub fn remove_sub(
        &self,
        channel: &str,
        client: &dyn Client,
    ) -> Result<bool> {
        let id = client.id();
        let mut inner = self.inner.write();
        let Some(subscribers) = inner.subs.get_mut(channel) else {
            return Ok(false);
        };
        subscribers.remove(&id);
        if subscribers.is_empty() {
            inner.subs.remove(channel);
            return Ok(true);
        }
        Ok(false)
    }

    pub fn num_subscribers(
        &self,
        channel: &str,
    ) -> usize {
        self.inner.read().subs.get(channel).map_or(0, HashSet::len)
    }

    pub fn num_clients(&self) -> usize {
        self.inner.read().clients.len()
    }

    /// Number of distinct users with at least one connection.
    pub fn num_unique_clients(&self) -> usize {
        self.inner.read().users.len()
    }

    pub fn num_channels(&self) -> usize {
        self.inner.read().subs.len()
    }

    /// Channels with at least one subscriber on this node.
    pub fn channels(&self) -> Vec<String> {
        self.inner.read().subs.keys().cloned().collect()
    }

    /// Snapshot of all connections belonging to one user.
    pub fn user_connections(
        &self,
        user: &str,
    ) -> Vec<Arc<dyn Client>> {
        let inner = self.inner.read();
        let Some(conns) = inner.users.get(user) else {
            return Vec::new();
        };
        conns
            .iter()
            .filter_map(|id| inner.clients.get(id).cloned())
            .collect()
    }

    pub fn broadcast_publication(
        &self,
        channel: &str,
        publication: &Publication,
    ) -> Result<()> {
        let frame = Message::Publication {
            channel: channel.to_owned(),
            publication: publication.clone(),
        }
        .encode()?;
        self.broadcast_frame(channel, frame, "publication");
        Ok(())
    }

    pub fn broadcast_join(
        &self,
        channel: &str,
        join: &Join,
    ) -> Result<()> {
        let frame = Message::Join {
            channel: channel.to_owned(),
            join: join.clone(),
        }
        .encode()?;
        self.broadcast_frame(channel, frame, "join");
        Ok(())
    }

    pub fn broadcast_leave(
        &self,
        channel: &str,
        leave: &Leave,
    ) -> Result<()> {
        let frame = Message::Leave {
            channel: channel.to_owned(),
            leave: leave.clone(),
        }
        .encode()?;
        self.broadcast_frame(channel, frame, "leave");
        Ok(())
    }

    /// Delivers one encoded frame to every subscriber of a channel.
    ///
    /// Delivery is non-blocking per client: a full send buffer drops the
    /// frame for that client only. Failures are aggregated and logged,
    /// never surfaced to the broadcast caller.
    fn broadcast_frame(
        &self,
        channel: &str,
        frame: Bytes,
        kind: &'static str,
    ) {
        let inner = self.inner.read();
        let Some(subscribers) = inner.subs.get(channel) else {
            return;
        };
        let mut failed = 0usize;
        for id in subscribers {
            let Some(client) = inner.clients.get(id) else {
                continue;
            };
            if let Err(e) = client.send(frame.clone()) {
                failed += 1;
                debug!(client = %id, channel, error = %e, "dropping {kind} frame");
            }
        }
        if failed > 0 {
            warn!(channel, kind, failed, "failed to deliver broadcast to some subscribers");
        }
    }

    /// Closes every connection with a shutdown advice and empties all
    /// indices. Returns once every close has completed.
    pub async fn shutdown(&self) {
        let clients: Vec<Arc<dyn Client>> = {
            let mut inner = self.inner.write();
            inner.subs.clear();
            inner.users.clear();
            inner.clients.drain().map(|(_, client)| client).collect()
        };

        let mut closes = JoinSet::new();
        for client in clients {
            let advice = Disconnect {
                reason: "shutdown".to_owned(),
                reconnect: true,
            };
            closes.spawn(async move {
                if let Err(e) = client.close(advice).await {
                    debug!(client = %client.id(), error = %e, "close failed during shutdown");
                }
            });
        }
        while closes.join_next().await.is_some() {}
    }
}
