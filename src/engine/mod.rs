//! The engine contract: wire-level publish/subscribe between nodes plus
//! presence and history persistence.
//!
//! Publish operations complete through a single-value error stream: a
//! one-shot channel the engine resolves exactly once with the send
//! outcome. Callers may await it or drop it if they do not care.

mod memory;
pub use memory::*;

#[cfg(test)]
mod memory_test;

use std::collections::HashMap;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::oneshot;

use crate::Error;
use crate::Result;
use crate::config::ChannelOptions;
use crate::control::Command;
use crate::proto::ClientInfo;
use crate::proto::Join;
use crate::proto::Leave;
use crate::proto::Publication;

/// Completion handle for an asynchronous engine send.
///
/// Resolves exactly once. A sender dropped without resolving means the
/// engine died mid-operation; [`recv_op`] maps that to an internal error.
pub type OpReceiver = oneshot::Receiver<Result<()>>;

/// Builds an already-resolved [`OpReceiver`].
pub fn completed_op(result: Result<()>) -> OpReceiver {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(result);
    rx
}

/// Awaits an [`OpReceiver`], surfacing a dropped sender as an internal
/// error and a delivered engine error verbatim.
pub async fn recv_op(rx: OpReceiver) -> Result<()> {
    rx.await.unwrap_or(Err(Error::InternalServerError))
}

/// Pluggable transport connecting nodes.
///
/// A publication accepted by any node is handed to the engine, which
/// delivers it back to every node with interested subscribers via
/// [`Node::handle_publication`]; control commands come back through
/// [`Node::handle_control`].
///
/// [`Node::handle_publication`]: crate::Node::handle_publication
/// [`Node::handle_control`]: crate::Node::handle_control
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    /// Engine name surfaced in aggregated cluster info.
    fn name(&self) -> String;

    /// Starts the engine. Called exactly once from [`Node::run`];
    /// a failure makes the node unusable.
    ///
    /// [`Node::run`]: crate::Node::run
    async fn run(&self) -> Result<()>;

    /// Channels with at least one subscriber across all nodes.
    async fn channels(&self) -> Result<Vec<String>>;

    fn publish(
        &self,
        channel: &str,
        publication: Publication,
        opts: &ChannelOptions,
    ) -> OpReceiver;

    fn publish_join(
        &self,
        channel: &str,
        join: Join,
        opts: &ChannelOptions,
    ) -> OpReceiver;

    fn publish_leave(
        &self,
        channel: &str,
        leave: Leave,
        opts: &ChannelOptions,
    ) -> OpReceiver;

    fn publish_control(
        &self,
        cmd: Command,
    ) -> OpReceiver;

    /// Called when the first local subscriber appears on a channel.
    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<()>;

    /// Called when the last local subscriber leaves a channel.
    async fn unsubscribe(
        &self,
        channel: &str,
    ) -> Result<()>;

    async fn add_presence(
        &self,
        channel: &str,
        uid: &str,
        info: ClientInfo,
        expire_secs: u64,
    ) -> Result<()>;

    async fn remove_presence(
        &self,
        channel: &str,
        uid: &str,
    ) -> Result<()>;

    async fn presence(
        &self,
        channel: &str,
    ) -> Result<HashMap<String, ClientInfo>>;

    /// Last publications on a channel, newest first. `limit` zero means
    /// no limit.
    async fn history(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<Publication>>;

    async fn remove_history(
        &self,
        channel: &str,
    ) -> Result<()>;
}
