use thiserror::Error;

/// Failures surfaced by configuration, codec and transport plumbing.
///
/// Protocol handlers never produce these: stale or duplicate messages are
/// dropped or answered, and a lost datagram is just a lost datagram.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bincode codec error: {0}")]
    Decode(#[from] bincode::Error),

    #[error("malformed roster: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("replica {0} is not in the roster")]
    UnknownReplica(usize),
}
