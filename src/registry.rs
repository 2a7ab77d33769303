//! Registry of known nodes, fed by node-info gossip.

use std::collections::HashMap;
use std::time::Duration;
use std::time::Instant;

use parking_lot::RwLock;

use crate::control::NodeInfo;

struct Entry {
    info: NodeInfo,
    last_heard: Instant,
}

/// Mapping of node uid to the last gossiped [`NodeInfo`].
///
/// The current node's entry is seeded at construction and is never
/// evicted; peers disappear once they stop gossiping for longer than the
/// configured max delay.
pub struct NodeRegistry {
    current_uid: String,
    nodes: RwLock<HashMap<String, Entry>>,
}

impl NodeRegistry {
    pub fn new(seed: NodeInfo) -> Self {
        let current_uid = seed.uid.clone();
        let mut nodes = HashMap::new();
        nodes.insert(
            current_uid.clone(),
            Entry {
                info: seed,
                last_heard: Instant::now(),
            },
        );
        Self {
            current_uid,
            nodes: RwLock::new(nodes),
        }
    }

    /// Upserts a node record and refreshes its liveness timestamp.
    pub fn add(
        &self,
        info: NodeInfo,
    ) {
        self.nodes.write().insert(
            info.uid.clone(),
            Entry {
                info,
                last_heard: Instant::now(),
            },
        );
    }

    pub fn get(
        &self,
        uid: &str,
    ) -> Option<NodeInfo> {
        self.nodes.read().get(uid).map(|e| e.info.clone())
    }

    /// Snapshot of all known node records.
    pub fn list(&self) -> Vec<NodeInfo> {
        self.nodes.read().values().map(|e| e.info.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Evicts peers not heard from within `max_delay`. The current
    /// node's own entry always survives.
    pub fn clean(
        &self,
        max_delay: Duration,
    ) {
        let mut nodes = self.nodes.write();
        let current_uid = self.current_uid.as_str();
        nodes.retain(|uid, entry| uid == current_uid || entry.last_heard.elapsed() <= max_delay);
    }
}
