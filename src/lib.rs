//! # pulse-core
//!
//! Coordination core of a clustered real-time pub/sub server.
//!
//! Clients hold long-lived connections to a [`Node`], subscribe to named
//! channels and receive publications, presence notifications and
//! historical replay. Nodes cooperate over a shared [`Engine`] so a
//! publication accepted on any node reaches subscribed clients
//! cluster-wide.
//!
//! ## What this crate provides
//!
//! - **Node coordinator** - lifecycle, periodic gossip, public API
//! - **Hub** - local registry routing channels to subscribers
//! - **Node registry** - peer liveness fed by node-info gossip
//! - **Metrics registry** - counters, gauges and histograms with
//!   interval-delta snapshots
//! - **In-memory engine** - single-process transport, also the test bed
//!
//! Client transports (WebSocket, SSE, raw sockets), broker-backed
//! engines and the admin surface are **your responsibility**.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use pulse_core::MemoryEngine;
//! use pulse_core::Node;
//! use pulse_core::NodeConfig;
//!
//! let config = NodeConfig::new()?.validate()?;
//! let node = Arc::new(Node::new(config));
//! let engine = Arc::new(MemoryEngine::new());
//! engine.attach(&node);
//! node.clone().run(engine).await?;
//! ```

mod client;
pub mod config;
/// Control-plane wire types stay namespaced: `control::Disconnect` is a
/// cluster command while [`proto::Disconnect`](Disconnect) is a close
/// advice.
pub mod control;
mod engine;
mod errors;
mod hub;
mod metrics;
mod node;
mod proto;
mod registry;

pub use client::*;
pub use config::ChannelOptions;
pub use config::Namespace;
pub use config::NodeConfig;
pub use engine::*;
pub use errors::*;
pub use hub::*;
pub use metrics::*;
pub use node::*;
pub use proto::*;
pub use registry::*;

#[cfg(test)]
mod control_test;
#[cfg(test)]
mod errors_test;
