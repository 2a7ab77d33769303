use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;

use crate::Result;
use crate::proto::Disconnect;

/// Handle to one client connection registered in the hub.
///
/// The hub owns the registration but never the underlying socket; every
/// transport (WebSocket, SSE, raw TCP) supplies its own implementation.
/// `send` must not block: a full outgoing buffer is reported through the
/// returned error and the frame is dropped for that client only.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Client: Send + Sync + 'static {
    /// Connection id, unique per node.
    fn id(&self) -> String;

    /// Id of the authenticated user owning this connection.
    fn user_id(&self) -> String;

    /// Channels this connection is currently subscribed to.
    fn channels(&self) -> Vec<String>;

    /// Queues an encoded frame for delivery. Non-blocking.
    fn send(
        &self,
        frame: Bytes,
    ) -> Result<()>;

    /// Removes the connection's subscription to `channel`, releasing the
    /// node-side bookkeeping as a side effect.
    async fn unsubscribe(
        &self,
        channel: &str,
    ) -> Result<()>;

    /// Closes the connection, advising the client whether to reconnect.
    /// May block on a network flush.
    async fn close(
        &self,
        advice: Disconnect,
    ) -> Result<()>;
}
