use serde::Deserialize;
use serde::Serialize;

/// Per-namespace channel behavior.
///
/// Resolved defaults come from the top-level options in [`NodeConfig`];
/// a namespace overrides the whole set.
///
/// [`NodeConfig`]: super::NodeConfig
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOptions {
    /// Track presence information for channels in this namespace.
    #[serde(default)]
    pub presence: bool,

    /// Broadcast join/leave messages when clients (un)subscribe.
    #[serde(default)]
    pub join_leave: bool,

    /// Number of publications retained per channel. Zero disables history.
    #[serde(default)]
    pub history_size: usize,

    /// Seconds a retained publication stays replayable.
    #[serde(default)]
    pub history_lifetime: u64,
}

impl ChannelOptions {
    pub fn history_enabled(&self) -> bool {
        self.history_size > 0 && self.history_lifetime > 0
    }
}

/// A named group of channels sharing one [`ChannelOptions`] set.
///
/// The namespace of a channel is the part of its name before the first
/// namespace boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,

    #[serde(flatten)]
    pub options: ChannelOptions,
}
