//! The node coordinator: the heart of the pub/sub server.
//!
//! A [`Node`] keeps and manages client connections through the hub,
//! maintains information about other nodes in the registry, and owns the
//! engine handle plus the metrics registry. It is created once per
//! process, started with [`Node::run`] and stopped with
//! [`Node::shutdown`].
//!
//! ## Key Responsibilities
//! - Connection and subscription bookkeeping with engine side-effects
//! - Broadcast dispatch for publications and presence notifications
//! - Cluster control plane: node-info gossip, cluster-wide unsubscribe
//!   and disconnect fan-out
//! - Metrics snapshot rotation piggybacking on the gossip


use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use parking_lot::Mutex;
use parking_lot::RwLock;
use sysinfo::Pid;
use sysinfo::System;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::debug;
use tracing::error;
use uuid::Uuid;

use crate::Error;
use crate::Result;
use crate::client::Client;
use crate::config::ChannelOptions;
use crate::config::NodeConfig;
use crate::control;
use crate::control::Command;
use crate::control::NodeInfo;
use crate::engine::Engine;
use crate::engine::OpReceiver;
use crate::engine::completed_op;
use crate::engine::recv_op;
use crate::hub::Hub;
use crate::metrics::MetricsRegistry;
use crate::proto;
use crate::proto::ClientInfo;
use crate::proto::Join;
use crate::proto::Leave;
use crate::proto::Message;
use crate::proto::Publication;
use crate::registry::NodeRegistry;

const COUNTERS: &[&str] = &[
    "node_num_publication_sent",
    "node_num_join_sent",
    "node_num_leave_sent",
    "node_num_control_sent",
    "node_num_publication_received",
    "node_num_join_received",
    "node_num_leave_received",
    "node_num_control_received",
    "node_num_add_client_conn",
    "node_num_remove_client_conn",
    "node_num_add_client_sub",
    "node_num_remove_client_sub",
    "node_num_presence",
    "node_num_add_presence",
    "node_num_remove_presence",
    "node_num_history",
    "node_num_remove_history",
    "node_num_last_message_id",
];

const GAUGES: &[&str] = &[
    "node_memory_resident",
    "node_memory_virtual",
    "node_cpu_usage",
    "node_num_tasks",
    "node_num_clients",
    "node_num_unique_clients",
    "node_num_channels",
    "node_uptime_seconds",
];

const HISTOGRAMS: &[&str] = &["node_broadcast_duration_us"];

/// Handler for application-defined RPC calls. The node only stores and
/// returns it; invocation belongs to the client-facing layer.
#[async_trait]
pub trait RpcHandler: Send + Sync + 'static {
    async fn handle(
        &self,
        method: &str,
        params: Vec<u8>,
    ) -> Result<Vec<u8>>;
}

/// Aggregated cluster state returned by [`Node::info`].
#[derive(Debug, Clone)]
pub struct InfoResult {
    pub engine: String,
    pub nodes: Vec<NodeInfo>,
}

struct State {
    config: NodeConfig,
    engine: Option<Arc<dyn Engine>>,
    shutdown: bool,
    rpc_handler: Option<Arc<dyn RpcHandler>>,
}

struct MetricsState {
    /// Interval metrics captured at the last rotation, gossiped at most
    /// once until the next rotation.
    snapshot: HashMap<String, i64>,
    /// One-shot latch: set after a node-info broadcast carried the
    /// snapshot, reset on each rotation.
    sent: bool,
    system: System,
}

/// Coordinator of one pub/sub node.
pub struct Node {
    uid: String,
    version: String,
    started_at: i64,

    state: RwLock<State>,
    hub: Hub,
    registry: NodeRegistry,
    metrics: MetricsRegistry,
    metrics_state: Mutex<MetricsState>,

    shutdown_tx: watch::Sender<()>,
    /// Keeps the shutdown channel open so late subscribers still observe
    /// the signal.
    _shutdown_rx: watch::Receiver<()>,
}

impl Node {
    /// Creates a node from config. Does not spawn tasks and does not
    /// touch the engine.
    pub fn new(config: NodeConfig) -> Self {
        let uid = Uuid::new_v4().to_string();
        let version = env!("CARGO_PKG_VERSION").to_owned();
        let started_at = unix_now();

        let mut metrics = MetricsRegistry::new();
        for name in COUNTERS {
            metrics.register_counter(name);
        }
        for name in GAUGES {
            metrics.register_gauge(name);
        }
        for name in HISTOGRAMS {
            metrics.register_histogram(name);
        }

        let seed = NodeInfo {
            uid: uid.clone(),
            name: config.name.clone(),
            version: version.clone(),
            started_at,
            metrics_update_interval: config.node_metrics_interval_ms / 1000,
            metrics: HashMap::new(),
        };
        let snapshot = metrics.load_interval_values();

        let (shutdown_tx, shutdown_rx) = watch::channel(());

        Self {
            uid,
            version,
            started_at,
            state: RwLock::new(State {
                config,
                engine: None,
                shutdown: false,
                rpc_handler: None,
            }),
            hub: Hub::new(),
            registry: NodeRegistry::new(seed),
            metrics,
            metrics_state: Mutex::new(MetricsState {
                snapshot,
                sent: false,
                system: System::new(),
            }),
            shutdown_tx,
            _shutdown_rx: shutdown_rx,
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Copy of the current config.
    pub fn config(&self) -> NodeConfig {
        self.state.read().config.clone()
    }

    /// Validates and swaps the config. Periodic tasks pick up new
    /// intervals on their next iteration.
    pub fn reload(
        &self,
        config: NodeConfig,
    ) -> Result<()> {
        let config = config.validate()?;
        self.state.write().config = config;
        Ok(())
    }

    pub fn set_rpc_handler(
        &self,
        handler: Arc<dyn RpcHandler>,
    ) {
        self.state.write().rpc_handler = Some(handler);
    }

    pub fn rpc_handler(&self) -> Option<Arc<dyn RpcHandler>> {
        self.state.read().rpc_handler.clone()
    }

    /// A receiver resolving once node shutdown is initiated.
    pub fn notify_shutdown(&self) -> watch::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Performs all startup actions: attaches and starts the engine,
    /// broadcasts the first node-info message and spawns the periodic
    /// tasks. Must be called exactly once.
    pub async fn run(
        self: Arc<Self>,
        engine: Arc<dyn Engine>,
    ) -> Result<()> {
        self.state.write().engine = Some(engine.clone());

        engine.run().await?;

        // The periodic ping retries, so a failed first broadcast does
        // not fail startup.
        if let Err(e) = self.pub_node().await {
            error!(error = %e, "initial node info broadcast failed");
        }

        Self::spawn_node_ping(self.clone());
        Self::spawn_clean_node_info(self.clone());
        Self::spawn_update_metrics(self);

        Ok(())
    }

    /// Initiates shutdown and closes every client connection with a
    /// shutdown advice. Safe to call more than once; only the first call
    /// does the work.
    pub async fn shutdown(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            if state.shutdown {
                return Ok(());
            }
            state.shutdown = true;
        }
        let _ = self.shutdown_tx.send(());
        self.hub.shutdown().await;
        Ok(())
    }

    fn engine(&self) -> Result<Arc<dyn Engine>> {
        self.state.read().engine.clone().ok_or(Error::NotRunning)
    }

    fn spawn_node_ping(node: Arc<Self>) {
        let mut shutdown = node.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                let interval = node.state.read().config.node_ping_interval();
                tokio::select! {
                    _ = shutdown.changed() => return,
                    _ = sleep(interval) => {
                        if let Err(e) = node.pub_node().await {
                            error!(error = %e, "node info broadcast failed");
                        }
                    }
                }
            }
        });
    }

    fn spawn_clean_node_info(node: Arc<Self>) {
        let mut shutdown = node.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                let interval = node.state.read().config.node_info_clean_interval();
                tokio::select! {
                    _ = shutdown.changed() => return,
                    _ = sleep(interval) => {
                        let max_delay = node.state.read().config.node_info_max_delay();
                        node.registry.clean(max_delay);
                    }
                }
            }
        });
    }

    fn spawn_update_metrics(node: Arc<Self>) {
        let mut shutdown = node.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                let interval = node.state.read().config.node_metrics_interval();
                tokio::select! {
                    _ = shutdown.changed() => return,
                    _ = sleep(interval) => node.update_metrics_once(),
                }
            }
        });
    }

    /// Rotates the metrics snapshot: refreshes process gauges, rotates
    /// counter deltas, rebuilds the interval snapshot, re-arms the
    /// gossip latch and rotates histograms.
    pub(crate) fn update_metrics_once(&self) {
        // Gauge inputs come before the metrics lock, which is a leaf in
        // the lock order.
        let num_clients = self.hub.num_clients() as i64;
        let num_unique_clients = self.hub.num_unique_clients() as i64;
        let num_channels = self.hub.num_channels() as i64;
        let num_tasks = alive_tasks();
        let uptime = unix_now() - self.started_at;
        let pid = Pid::from_u32(std::process::id());

        let mut metrics_state = self.metrics_state.lock();
        if metrics_state.system.refresh_process(pid) {
            if let Some(process) = metrics_state.system.process(pid) {
                self.metrics.set_gauge("node_memory_resident", process.memory() as i64);
                self.metrics.set_gauge("node_memory_virtual", process.virtual_memory() as i64);
                self.metrics.set_gauge("node_cpu_usage", process.cpu_usage() as i64);
            }
        }
        self.metrics.set_gauge("node_num_clients", num_clients);
        self.metrics.set_gauge("node_num_unique_clients", num_unique_clients);
        self.metrics.set_gauge("node_num_channels", num_channels);
        self.metrics.set_gauge("node_num_tasks", num_tasks);
        self.metrics.set_gauge("node_uptime_seconds", uptime);

        self.metrics.update_delta();
        metrics_state.snapshot = self.metrics.load_interval_values();
        metrics_state.sent = false;
        self.metrics.rotate_histograms();
    }

    /// Broadcasts this node's info to the cluster and applies it to the
    /// local registry so single-node deployments see themselves.
    ///
    /// The metrics snapshot rides along at most once per rotation.
    pub(crate) async fn pub_node(&self) -> Result<()> {
        let mut info = {
            let state = self.state.read();
            NodeInfo {
                uid: self.uid.clone(),
                name: state.config.name.clone(),
                version: self.version.clone(),
                started_at: self.started_at,
                metrics_update_interval: state.config.node_metrics_interval_ms / 1000,
                metrics: HashMap::new(),
            }
        };

        // Gauge inputs are gathered before taking the metrics lock: the
        // metrics lock is a leaf in the lock order.
        let num_clients = self.hub.num_clients() as i64;
        let num_unique_clients = self.hub.num_unique_clients() as i64;
        let num_channels = self.hub.num_channels() as i64;
        let num_tasks = alive_tasks();
        let uptime = unix_now() - self.started_at;

        {
            let mut metrics_state = self.metrics_state.lock();
            if !metrics_state.sent {
                self.metrics.set_gauge("node_num_clients", num_clients);
                self.metrics.set_gauge("node_num_unique_clients", num_unique_clients);
                self.metrics.set_gauge("node_num_channels", num_channels);
                self.metrics.set_gauge("node_num_tasks", num_tasks);
                self.metrics.set_gauge("node_uptime_seconds", uptime);

                info.metrics = metrics_state.snapshot.clone();
                metrics_state.sent = true;
            }
        }

        self.registry.add(info.clone());

        let params = control::encode_node(&info)?;
        let cmd = Command {
            uid: self.uid.clone(),
            method: control::METHOD_NODE.to_owned(),
            params,
        };
        self.publish_control(cmd).await
    }

    async fn publish_control(
        &self,
        cmd: Command,
    ) -> Result<()> {
        self.metrics.inc_counter("node_num_control_sent");
        let engine = self.engine()?;
        recv_op(engine.publish_control(cmd)).await
    }

    /// Sends a publication into a channel. Every node with interested
    /// subscribers delivers it locally.
    ///
    /// Assigns `publication.uid` when the publisher left it empty. The
    /// returned handle resolves with the engine's send outcome.
    pub fn publish(
        &self,
        channel: &str,
        publication: &mut Publication,
        opts: Option<&ChannelOptions>,
    ) -> OpReceiver {
        let opts = match opts {
            Some(opts) => opts.clone(),
            None => match self.channel_opts(channel) {
                Some(opts) => opts,
                None => return completed_op(Err(Error::NamespaceNotFound)),
            },
        };

        self.metrics.inc_counter("node_num_publication_sent");

        if publication.uid.is_empty() {
            publication.uid = Uuid::new_v4().to_string();
        }

        let engine = match self.engine() {
            Ok(engine) => engine,
            Err(e) => return completed_op(Err(e)),
        };
        engine.publish(channel, publication.clone(), &opts)
    }

    /// Publishes a join message into a channel.
    pub fn publish_join(
        &self,
        channel: &str,
        join: Join,
        opts: Option<&ChannelOptions>,
    ) -> OpReceiver {
        let opts = match opts {
            Some(opts) => opts.clone(),
            None => match self.channel_opts(channel) {
                Some(opts) => opts,
                None => return completed_op(Err(Error::NamespaceNotFound)),
            },
        };
        self.metrics.inc_counter("node_num_join_sent");
        let engine = match self.engine() {
            Ok(engine) => engine,
            Err(e) => return completed_op(Err(e)),
        };
        engine.publish_join(channel, join, &opts)
    }

    /// Publishes a leave message into a channel.
    pub fn publish_leave(
        &self,
        channel: &str,
        leave: Leave,
        opts: Option<&ChannelOptions>,
    ) -> OpReceiver {
        let opts = match opts {
            Some(opts) => opts.clone(),
            None => match self.channel_opts(channel) {
                Some(opts) => opts,
                None => return completed_op(Err(Error::NamespaceNotFound)),
            },
        };
        self.metrics.inc_counter("node_num_leave_sent");
        let engine = match self.engine() {
            Ok(engine) => engine,
            Err(e) => return completed_op(Err(e)),
        };
        engine.publish_leave(channel, leave, &opts)
    }

    /// Ingress from the engine's decoded message stream.
    pub fn handle_client_message(
        &self,
        message: Message,
    ) -> Result<()> {
        match message {
            Message::Publication {
                channel,
                publication,
            } => self.handle_publication(&channel, publication),
            Message::Join { channel, join } => self.handle_join(&channel, join),
            Message::Leave { channel, leave } => self.handle_leave(&channel, leave),
        }
    }

    /// Delivers a publication to every local subscriber of the channel.
    pub fn handle_publication(
        &self,
        channel: &str,
        publication: Publication,
    ) -> Result<()> {
        self.metrics.inc_counter("node_num_publication_received");
        if self.hub.num_subscribers(channel) == 0 {
            return Ok(());
        }
        let started = Instant::now();
        self.hub.broadcast_publication(channel, &publication)?;
        self.metrics
            .observe_histogram("node_broadcast_duration_us", started.elapsed().as_micros() as i64);
        Ok(())
    }

    /// Delivers a join message to every local subscriber of the channel.
    pub fn handle_join(
        &self,
        channel: &str,
        join: Join,
    ) -> Result<()> {
        self.metrics.inc_counter("node_num_join_received");
        if self.hub.num_subscribers(channel) == 0 {
            return Ok(());
        }
        self.hub.broadcast_join(channel, &join)
    }

    /// Delivers a leave message to every local subscriber of the channel.
    pub fn handle_leave(
        &self,
        channel: &str,
        leave: Leave,
    ) -> Result<()> {
        self.metrics.inc_counter("node_num_leave_received");
        if self.hub.num_subscribers(channel) == 0 {
            return Ok(());
        }
        self.hub.broadcast_leave(channel, &leave)
    }

    /// Handles a command from the control channel. Commands originated
    /// by this node were already applied locally and are dropped.
    pub async fn handle_control(
        &self,
        cmd: Command,
    ) -> Result<()> {
        self.metrics.inc_counter("node_num_control_received");

        if cmd.uid == self.uid {
            return Ok(());
        }

        match cmd.method.as_str() {
            control::METHOD_NODE => match control::decode_node(&cmd.params) {
                Ok(info) => {
                    self.registry.add(info);
                    Ok(())
                }
                Err(e) => {
                    error!(error = %e, "error decoding node control params");
                    Err(Error::BadRequest)
                }
            },
            control::METHOD_UNSUBSCRIBE => match control::decode_unsubscribe(&cmd.params) {
                Ok(unsubscribe) => {
                    self.unsubscribe_user(&unsubscribe.user, &unsubscribe.channel).await
                }
                Err(e) => {
                    error!(error = %e, "error decoding unsubscribe control params");
                    Err(Error::BadRequest)
                }
            },
            control::METHOD_DISCONNECT => match control::decode_disconnect(&cmd.params) {
                Ok(disconnect) => self.disconnect_user(&disconnect.user, disconnect.reconnect),
                Err(e) => {
                    error!(error = %e, "error decoding disconnect control params");
                    Err(Error::BadRequest)
                }
            },
            method => {
                error!(method, "unknown control message method");
                Err(Error::BadRequest)
            }
        }
    }

    /// Registers an authenticated connection so it can be operated on
    /// on demand.
    pub fn add_client(
        &self,
        client: Arc<dyn Client>,
    ) -> Result<()> {
        self.metrics.inc_counter("node_num_add_client_conn");
        self.hub.add(client)
    }

    /// Removes a connection from the registry.
    pub fn remove_client(
        &self,
        client: &dyn Client,
    ) -> Result<()> {
        self.metrics.inc_counter("node_num_remove_client_conn");
        self.hub.remove(client)
    }

    /// Registers a channel subscription in both the hub and, for the
    /// first local subscriber, the engine.
    pub async fn add_subscription(
        &self,
        channel: &str,
        client: Arc<dyn Client>,
    ) -> Result<()> {
        self.metrics.inc_counter("node_num_add_client_sub");
        let first = self.hub.add_sub(channel, client)?;
        if first {
            return self.engine()?.subscribe(channel).await;
        }
        Ok(())
    }

    /// Removes a channel subscription from both the hub and, when the
    /// channel becomes empty on this node, the engine.
    pub async fn remove_subscription(
        &self,
        channel: &str,
        client: &dyn Client,
    ) -> Result<()> {
        self.metrics.inc_counter("node_num_remove_client_sub");
        let empty = self.hub.remove_sub(channel, client)?;
        if empty {
            return self.engine()?.unsubscribe(channel).await;
        }
        Ok(())
    }

    /// Unsubscribes a user everywhere in the cluster. An empty channel
    /// means every channel. The local node is detached first, then one
    /// best-effort control command fans out to the other nodes.
    pub async fn unsubscribe(
        &self,
        user: &str,
        channel: &str,
    ) -> Result<()> {
        if user.is_empty() {
            return Err(Error::BadRequest);
        }
        if !channel.is_empty() && self.channel_opts(channel).is_none() {
            return Err(Error::NamespaceNotFound);
        }

        if let Err(e) = self.unsubscribe_user(user, channel).await {
            error!(user, channel, error = %e, "local unsubscribe failed");
            return Err(Error::InternalServerError);
        }
        if let Err(e) = self.pub_unsubscribe(user, channel).await {
            error!(user, channel, error = %e, "unsubscribe control publish failed");
            return Err(Error::InternalServerError);
        }
        Ok(())
    }

    async fn unsubscribe_user(
        &self,
        user: &str,
        channel: &str,
    ) -> Result<()> {
        for client in self.hub.user_connections(user) {
            let channels = if channel.is_empty() {
                client.channels()
            } else {
                vec![channel.to_owned()]
            };
            for ch in channels {
                client.unsubscribe(&ch).await?;
            }
        }
        Ok(())
    }

    async fn pub_unsubscribe(
        &self,
        user: &str,
        channel: &str,
    ) -> Result<()> {
        let params = control::encode_unsubscribe(&control::Unsubscribe {
            user: user.to_owned(),
            channel: channel.to_owned(),
        })?;
        self.publish_control(Command {
            uid: self.uid.clone(),
            method: control::METHOD_UNSUBSCRIBE.to_owned(),
            params,
        })
        .await
    }

    /// Closes all of a user's connections across the cluster. The local
    /// node disconnects first, then one best-effort control command fans
    /// out to the other nodes.
    pub async fn disconnect(
        &self,
        user: &str,
        reconnect: bool,
    ) -> Result<()> {
        if user.is_empty() {
            return Err(Error::BadRequest);
        }

        if let Err(e) = self.disconnect_user(user, reconnect) {
            error!(user, error = %e, "local disconnect failed");
            return Err(Error::InternalServerError);
        }
        if let Err(e) = self.pub_disconnect(user, reconnect).await {
            error!(user, error = %e, "disconnect control publish failed");
            return Err(Error::InternalServerError);
        }
        Ok(())
    }

    /// Closes connections asynchronously: close may block on a network
    /// flush, so this returns before the closes complete.
    fn disconnect_user(
        &self,
        user: &str,
        reconnect: bool,
    ) -> Result<()> {
        for client in self.hub.user_connections(user) {
            let advice = proto::Disconnect {
                reason: "disconnect".to_owned(),
                reconnect,
            };
            tokio::spawn(async move {
                if let Err(e) = client.close(advice).await {
                    debug!(client = %client.id(), error = %e, "close failed");
                }
            });
        }
        Ok(())
    }

    async fn pub_disconnect(
        &self,
        user: &str,
        reconnect: bool,
    ) -> Result<()> {
        let params = control::encode_disconnect(&control::Disconnect {
            user: user.to_owned(),
            reconnect,
        })?;
        self.publish_control(Command {
            uid: self.uid.clone(),
            method: control::METHOD_DISCONNECT.to_owned(),
            params,
        })
        .await
    }

    /// Channels with subscribers across all nodes.
    pub async fn channels(&self) -> Result<Vec<String>> {
        self.engine()?.channels().await
    }

    /// Aggregated state of all known nodes.
    pub fn info(&self) -> Result<InfoResult> {
        Ok(InfoResult {
            engine: self.engine()?.name(),
            nodes: self.registry.list(),
        })
    }

    /// This node's info with raw (not interval-delta) metrics.
    pub fn node(&self) -> NodeInfo {
        let mut info = self.registry.get(&self.uid).unwrap_or_else(|| NodeInfo {
            uid: self.uid.clone(),
            name: self.state.read().config.name.clone(),
            version: self.version.clone(),
            started_at: self.started_at,
            metrics_update_interval: self.state.read().config.node_metrics_interval_ms / 1000,
            metrics: HashMap::new(),
        });
        info.metrics = self.metrics.load_raw_values();
        info
    }

    /// Forwards presence registration to the engine with the configured
    /// expiration.
    pub async fn add_presence(
        &self,
        channel: &str,
        uid: &str,
        info: ClientInfo,
    ) -> Result<()> {
        let expire_secs = self.state.read().config.presence_expire_interval_secs;
        self.metrics.inc_counter("node_num_add_presence");
        self.engine()?.add_presence(channel, uid, info, expire_secs).await
    }

    pub async fn remove_presence(
        &self,
        channel: &str,
        uid: &str,
    ) -> Result<()> {
        self.metrics.inc_counter("node_num_remove_presence");
        self.engine()?.remove_presence(channel, uid).await
    }

    /// Active clients in a channel, keyed by connection uid.
    pub async fn presence(
        &self,
        channel: &str,
    ) -> Result<HashMap<String, ClientInfo>> {
        self.metrics.inc_counter("node_num_presence");
        match self.engine()?.presence(channel).await {
            Ok(presence) => Ok(presence),
            Err(e) => {
                error!(channel, error = %e, "error getting presence");
                Err(Error::InternalServerError)
            }
        }
    }

    /// Retained publications on a channel, newest first.
    pub async fn history(
        &self,
        channel: &str,
    ) -> Result<Vec<Publication>> {
        self.metrics.inc_counter("node_num_history");
        self.engine()?.history(channel, 0).await
    }

    pub async fn remove_history(
        &self,
        channel: &str,
    ) -> Result<()> {
        self.metrics.inc_counter("node_num_remove_history");
        self.engine()?.remove_history(channel).await
    }

    /// Uid of the newest retained publication, empty if none.
    pub async fn last_message_id(
        &self,
        channel: &str,
    ) -> Result<String> {
        self.metrics.inc_counter("node_num_last_message_id");
        let publications = self.engine()?.history(channel, 1).await?;
        Ok(publications.first().map(|p| p.uid.clone()).unwrap_or_default())
    }

    /// Resolves channel options from the channel's namespace.
    pub fn channel_opts(
        &self,
        channel: &str,
    ) -> Option<ChannelOptions> {
        let state = self.state.read();
        let namespace = state.config.namespace_name(channel);
        state.config.channel_opts(&namespace)
    }

    /// Namespace name of a channel, empty if none.
    pub fn namespace_name(
        &self,
        channel: &str,
    ) -> String {
        self.state.read().config.namespace_name(channel)
    }

    /// True iff subscription requests on this channel must be signed by
    /// the application backend.
    pub fn private_channel(
        &self,
        channel: &str,
    ) -> bool {
        self.state.read().config.private_channel(channel)
    }

    /// True iff the channel's allow-list suffix admits the user.
    pub fn user_allowed(
        &self,
        channel: &str,
        user: &str,
    ) -> bool {
        self.state.read().config.user_allowed(channel, user)
    }

    /// True iff the channel's client-pin suffix admits the client.
    pub fn client_allowed(
        &self,
        channel: &str,
        client: &str,
    ) -> bool {
        self.state.read().config.client_allowed(channel, client)
    }

    #[cfg(test)]
    pub(crate) fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &NodeRegistry {
        &self.registry
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn alive_tasks() -> i64 {
    tokio::runtime::Handle::try_current()
        .map(|handle| handle.metrics().num_alive_tasks() as i64)
        .unwrap_or_default()
}
