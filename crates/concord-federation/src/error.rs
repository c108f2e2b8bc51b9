//! Error types for concord-federation.

use thiserror::Error;

/// Result type for concord-federation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading federation configuration.
///
/// All of these are fatal at startup: a process with a broken server list
/// must not participate in reconciliation at all.
#[derive(Debug, Error)]
pub enum Error {
    /// The known-servers list resolved to zero servers.
    #[error("known server list is empty")]
    EmptyServerList,

    /// The same server name appeared more than once in the list.
    #[error("duplicate server in known server list: {0}")]
    DuplicateServer(String),

    /// A server's base address is not a usable http(s) URL.
    #[error("invalid base address for server {server}: {address}")]
    InvalidAddress { server: String, address: String },

    /// The operator's own server does not appear in the known-servers
    /// list, so this process cannot know its place in the federation.
    #[error("own server {0} is not in the known server list")]
    UnknownOwnServer(String),

    /// A room alias string did not have the `#localpart:server` shape.
    #[error("invalid room alias: {0}")]
    InvalidAlias(String),

    /// Reading the known-servers file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The known-servers file was not valid JSON.
    #[error("malformed known-servers file: {0}")]
    Json(#[from] serde_json::Error),
}
