//! Data-plane types exchanged between the engine, the node and clients.
//!
//! The engine transports [`Message`] envelopes between nodes; the hub
//! encodes an envelope once per broadcast and hands the same frame to
//! every local subscriber.

use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Information about the connection that produced a publication or a
/// presence event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub user: String,
    pub client: String,
    pub conn_info: Vec<u8>,
    pub chan_info: Vec<u8>,
}

/// A message delivered to subscribers of a channel.
///
/// `uid` is globally unique; the node assigns one before handing the
/// publication to the engine if the publisher left it empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub uid: String,
    pub data: Vec<u8>,
    pub info: Option<ClientInfo>,
}

/// Presence notification emitted when a client subscribes to a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    pub info: ClientInfo,
}

/// Presence notification emitted when a client unsubscribes from a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leave {
    pub info: ClientInfo,
}

/// Advice attached to a connection close.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disconnect {
    pub reason: String,
    pub reconnect: bool,
}

/// Envelope for data-plane traffic on the engine's message stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Publication {
        channel: String,
        publication: Publication,
    },
    Join {
        channel: String,
        join: Join,
    },
    Leave {
        channel: String,
        leave: Leave,
    },
}

impl Message {
    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(bincode::serialize(self)?))
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }
}
