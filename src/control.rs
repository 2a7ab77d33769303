//! Control-plane messages used for coordination between nodes.
//!
//! Every control command travels as a [`Command`] whose `params` carry a
//! method-specific payload. Payloads are encoded with the same stable
//! binary codec as the data plane; unknown methods are rejected by the
//! receiving node's dispatcher.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use crate::Result;

pub const METHOD_NODE: &str = "node";
pub const METHOD_UNSUBSCRIBE: &str = "unsubscribe";
pub const METHOD_DISCONNECT: &str = "disconnect";

/// A command on the engine's control channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Uid of the originating node. Receivers drop their own commands.
    pub uid: String,
    pub method: String,
    pub params: Vec<u8>,
}

/// Gossiped record describing one node.
///
/// `metrics` is populated at most once per metrics snapshot to keep the
/// steady-state ping small.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub uid: String,
    pub name: String,
    pub version: String,
    pub started_at: i64,
    pub metrics_update_interval: u64,
    pub metrics: HashMap<String, i64>,
}

/// Cluster-wide request to detach a user's subscriptions.
///
/// An empty `channel` means every channel the user is subscribed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unsubscribe {
    pub user: String,
    pub channel: String,
}

/// Cluster-wide request to close a user's connections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disconnect {
    pub user: String,
    pub reconnect: bool,
}

pub fn encode_node(info: &NodeInfo) -> Result<Vec<u8>> {
    Ok(bincode::serialize(info)?)
}

pub fn decode_node(params: &[u8]) -> Result<NodeInfo> {
    Ok(bincode::deserialize(params)?)
}

pub fn encode_unsubscribe(cmd: &Unsubscribe) -> Result<Vec<u8>> {
    Ok(bincode::serialize(cmd)?)
}

pub fn decode_unsubscribe(params: &[u8]) -> Result<Unsubscribe> {
    Ok(bincode::deserialize(params)?)
}

pub fn encode_disconnect(cmd: &Disconnect) -> Result<Vec<u8>> {
    Ok(bincode::serialize(cmd)?)
}

pub fn decode_disconnect(params: &[u8]) -> Result<Disconnect> {
    Ok(bincode::deserialize(params)?)
}
