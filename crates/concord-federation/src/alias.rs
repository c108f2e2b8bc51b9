//! Room naming scheme.
//!
//! A room is selected by a `(namespace, purpose)` pair. Both map to a
//! canonical alias prefix, and each server carries its own server-local
//! alias `#<prefix>:<server>` for the one federated room behind it. The
//! prefix is the shared part; the server suffix is what reconciliation
//! keeps pointing at the same underlying room everywhere.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::server::ServerName;

/// Network (chain) identifier namespacing a room set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(pub u64);

impl Namespace {
    /// The integration test network.
    pub const INTEGRATION: Namespace = Namespace(4321);
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a federated room is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPurpose {
    /// Global peer discovery and presence.
    Discovery,
    /// Monitoring service broadcasts.
    Monitoring,
    /// Path-finding service broadcasts.
    PathFinding,
}

impl RoomPurpose {
    /// Every purpose a deployment ensures, in a stable order.
    pub const ALL: [RoomPurpose; 3] = [
        RoomPurpose::Discovery,
        RoomPurpose::Monitoring,
        RoomPurpose::PathFinding,
    ];

    /// Stable alias fragment for this purpose.
    pub fn fragment(&self) -> &'static str {
        match self {
            RoomPurpose::Discovery => "discovery",
            RoomPurpose::Monitoring => "monitoring",
            RoomPurpose::PathFinding => "path_finding",
        }
    }
}

impl std::fmt::Display for RoomPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.fragment())
    }
}

/// Canonical alias prefix for a `(namespace, purpose)` pair.
///
/// Deterministic: every process computes the same prefix for the same
/// pair, which is what makes the server-local aliases comparable at all.
pub fn alias_prefix(namespace: Namespace, purpose: RoomPurpose) -> String {
    format!("concord_{}_{}", namespace, purpose.fragment())
}

/// A server-local room alias: `#<prefix>:<server>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomAlias {
    prefix: String,
    server: ServerName,
}

impl RoomAlias {
    /// Build the server-local alias for a prefix on a server.
    pub fn new(prefix: impl Into<String>, server: ServerName) -> Self {
        Self {
            prefix: prefix.into(),
            server,
        }
    }

    /// The alias localpart (the canonical prefix).
    pub fn localpart(&self) -> &str {
        &self.prefix
    }

    /// The server the alias is scoped to.
    pub fn server(&self) -> &ServerName {
        &self.server
    }
}

impl std::fmt::Display for RoomAlias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}:{}", self.prefix, self.server)
    }
}

impl FromStr for RoomAlias {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('#')
            .ok_or_else(|| Error::InvalidAlias(s.to_string()))?;
        let (prefix, server) = rest
            .split_once(':')
            .ok_or_else(|| Error::InvalidAlias(s.to_string()))?;
        if prefix.is_empty() || server.is_empty() {
            return Err(Error::InvalidAlias(s.to_string()));
        }
        Ok(Self::new(prefix, ServerName::new(server)))
    }
}
