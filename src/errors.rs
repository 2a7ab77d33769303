use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the node core.
///
/// The first five variants form the stable taxonomy returned to admin
/// callers; everything else wraps a collaborator failure at the node
/// boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input: empty user id, unknown control method, decode failure.
    #[error("bad request")]
    BadRequest,

    /// Channel options could not be resolved for the channel's namespace.
    #[error("namespace not found")]
    NamespaceNotFound,

    /// Another client with the same id is already registered in the hub.
    #[error("already exists")]
    AlreadyExists,

    /// Engine failure during an admin-initiated operation.
    #[error("internal server error")]
    InternalServerError,

    /// Reserved for hub capacity policies.
    #[error("limit exceeded")]
    LimitExceeded,

    /// An engine operation was requested before `run` attached an engine.
    #[error("node is not running")]
    NotRunning,

    /// A client's outgoing queue is full; the frame was dropped.
    #[error("client send buffer full")]
    SendBufferFull,

    /// The client connection is closed.
    #[error("client connection closed")]
    ClientClosed,

    /// Engine/transport failure outside the admin taxonomy.
    #[error("engine error: {0}")]
    Engine(String),

    #[error(transparent)]
    Codec(#[from] bincode::Error),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}
