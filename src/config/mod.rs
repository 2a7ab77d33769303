//! Node configuration: loading, validation and channel-name resolution.
//!
//! Configuration sources merge in the usual order (later overrides
//! earlier): type defaults, a file named by `CONFIG_PATH`, then
//! environment variables with the `PULSE__` prefix. Validation is
//! deferred so overrides can be stacked before `validate()`.

mod channel;
pub use channel::*;

#[cfg(test)]
mod config_test;

use std::env;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Runtime configuration for one node.
///
/// Interval fields are milliseconds; expirations are seconds. Periodic
/// tasks re-read their interval on every iteration, so a `reload` takes
/// effect without a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Human-readable node name surfaced in cluster info. Not required
    /// to be unique.
    #[serde(default = "default_name")]
    pub name: String,

    /// Period of node-info broadcasts to other nodes.
    #[serde(default = "default_node_ping_interval_ms")]
    pub node_ping_interval_ms: u64,

    /// Period of stale peer eviction.
    #[serde(default = "default_node_info_clean_interval_ms")]
    pub node_info_clean_interval_ms: u64,

    /// Peer TTL: registry entries older than this are evicted.
    #[serde(default = "default_node_info_max_delay_ms")]
    pub node_info_max_delay_ms: u64,

    /// Period of metrics snapshot rotation.
    #[serde(default = "default_node_metrics_interval_ms")]
    pub node_metrics_interval_ms: u64,

    /// TTL passed to the engine when adding presence entries.
    #[serde(default = "default_presence_expire_interval_secs")]
    pub presence_expire_interval_secs: u64,

    /// Channels starting with this prefix require a signed subscription
    /// request. The prefix is not part of the namespace name.
    #[serde(default = "default_private_channel_prefix")]
    pub private_channel_prefix: String,

    /// Separator between namespace name and the rest of a channel name.
    #[serde(default = "default_namespace_channel_boundary")]
    pub namespace_channel_boundary: String,

    /// Channel suffix boundary introducing a user allow-list.
    #[serde(default = "default_user_channel_boundary")]
    pub user_channel_boundary: String,

    /// Separator between user ids inside the allow-list suffix.
    #[serde(default = "default_user_channel_separator")]
    pub user_channel_separator: String,

    /// Channel suffix boundary pinning a channel to a single client id.
    #[serde(default = "default_client_channel_boundary")]
    pub client_channel_boundary: String,

    /// Options for channels outside any configured namespace.
    #[serde(default)]
    pub options: ChannelOptions,

    /// Configured namespaces. A channel whose namespace is not listed
    /// here (and is non-empty) has no resolvable options.
    #[serde(default)]
    pub namespaces: Vec<Namespace>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            node_ping_interval_ms: default_node_ping_interval_ms(),
            node_info_clean_interval_ms: default_node_info_clean_interval_ms(),
            node_info_max_delay_ms: default_node_info_max_delay_ms(),
            node_metrics_interval_ms: default_node_metrics_interval_ms(),
            presence_expire_interval_secs: default_presence_expire_interval_secs(),
            private_channel_prefix: default_private_channel_prefix(),
            namespace_channel_boundary: default_namespace_channel_boundary(),
            user_channel_boundary: default_user_channel_boundary(),
            user_channel_separator: default_user_channel_separator(),
            client_channel_boundary: default_client_channel_boundary(),
            options: ChannelOptions::default(),
            namespaces: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Callers must call [`validate`](Self::validate) after all overrides
    /// are applied.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("PULSE")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional overrides from a file without validation.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("PULSE")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration consistency and returns the validated
    /// instance.
    pub fn validate(self) -> Result<Self> {
        if self.node_ping_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "node_ping_interval_ms must be positive".into(),
            )));
        }
        if self.node_info_clean_interval_ms == 0 || self.node_metrics_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "periodic task intervals must be positive".into(),
            )));
        }
        if self.node_info_max_delay_ms <= self.node_ping_interval_ms {
            return Err(Error::Config(ConfigError::Message(
                "node_info_max_delay_ms must exceed node_ping_interval_ms".into(),
            )));
        }
        if self.namespace_channel_boundary.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "namespace_channel_boundary cannot be empty".into(),
            )));
        }

        let mut names = std::collections::HashSet::new();
        for ns in &self.namespaces {
            if ns.name.is_empty() {
                return Err(Error::Config(ConfigError::Message(
                    "namespace name cannot be empty".into(),
                )));
            }
            if ns.name.contains(&self.namespace_channel_boundary) {
                return Err(Error::Config(ConfigError::Message(format!(
                    "namespace name {:?} contains the namespace boundary",
                    ns.name
                ))));
            }
            if !names.insert(ns.name.as_str()) {
                return Err(Error::Config(ConfigError::Message(format!(
                    "duplicate namespace {:?}",
                    ns.name
                ))));
            }
        }

        Ok(self)
    }

    /// Resolves options for a namespace name. The empty namespace maps to
    /// the top-level options; an unknown namespace has no options.
    pub fn channel_opts(
        &self,
        namespace: &str,
    ) -> Option<ChannelOptions> {
        if namespace.is_empty() {
            return Some(self.options.clone());
        }
        self.namespaces
            .iter()
            .find(|ns| ns.name == namespace)
            .map(|ns| ns.options.clone())
    }

    /// Extracts the namespace name from a channel, stripping the private
    /// prefix first. Empty if the channel contains no namespace boundary.
    pub fn namespace_name(
        &self,
        channel: &str,
    ) -> String {
        let trimmed = if self.private_channel_prefix.is_empty() {
            channel
        } else {
            channel.strip_prefix(&self.private_channel_prefix).unwrap_or(channel)
        };
        match trimmed.split_once(&self.namespace_channel_boundary) {
            Some((namespace, _)) => namespace.to_owned(),
            None => String::new(),
        }
    }

    /// True iff subscription requests on the channel must be signed.
    pub fn private_channel(
        &self,
        channel: &str,
    ) -> bool {
        !self.private_channel_prefix.is_empty() && channel.starts_with(&self.private_channel_prefix)
    }

    /// Checks the user allow-list a channel may carry in its suffix.
    /// Channels without a user boundary are open to every user.
    pub fn user_allowed(
        &self,
        channel: &str,
        user: &str,
    ) -> bool {
        if self.user_channel_boundary.is_empty() || !channel.contains(&self.user_channel_boundary) {
            return true;
        }
        let allowed = channel
            .rsplit(&self.user_channel_boundary)
            .next()
            .unwrap_or_default();
        allowed.split(&self.user_channel_separator).any(|u| u == user)
    }

    /// Checks the single-client pin a channel may carry in its suffix.
    pub fn client_allowed(
        &self,
        channel: &str,
        client: &str,
    ) -> bool {
        if self.client_channel_boundary.is_empty() || !channel.contains(&self.client_channel_boundary)
        {
            return true;
        }
        let allowed = channel
            .rsplit(&self.client_channel_boundary)
            .next()
            .unwrap_or_default();
        allowed == client
    }

    pub fn node_ping_interval(&self) -> Duration {
        Duration::from_millis(self.node_ping_interval_ms)
    }

    pub fn node_info_clean_interval(&self) -> Duration {
        Duration::from_millis(self.node_info_clean_interval_ms)
    }

    pub fn node_info_max_delay(&self) -> Duration {
        Duration::from_millis(self.node_info_max_delay_ms)
    }

    pub fn node_metrics_interval(&self) -> Duration {
        Duration::from_millis(self.node_metrics_interval_ms)
    }
}

fn default_name() -> String {
    "pulse".to_owned()
}
fn default_node_ping_interval_ms() -> u64 {
    3_000
}
fn default_node_info_clean_interval_ms() -> u64 {
    9_000
}
fn default_node_info_max_delay_ms() -> u64 {
    15_000
}
fn default_node_metrics_interval_ms() -> u64 {
    60_000
}
fn default_presence_expire_interval_secs() -> u64 {
    25
}
fn default_private_channel_prefix() -> String {
    "$".to_owned()
}
fn default_namespace_channel_boundary() -> String {
    ":".to_owned()
}
fn default_user_channel_boundary() -> String {
    "#".to_owned()
}
fn default_user_channel_separator() -> String {
    ",".to_owned()
}
fn default_client_channel_boundary() -> String {
    "&".to_owned()
}
