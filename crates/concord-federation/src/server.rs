//! Known servers and the deterministic leader rule.
//!
//! Every Concord process is configured with the same set of federated
//! servers. The registry sorts that set lexicographically by name and
//! designates the first entry as the *leader* - the only server that may
//! ever originate a room. Because the order is a pure function of the
//! name set, every process derives the same leader without any election
//! traffic, regardless of the order servers were listed in.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable pointing at a known-servers JSON file.
pub const ENV_KNOWN_SERVERS: &str = "CONCORD_KNOWN_SERVERS";

/// Host identity of a federated server (e.g. `chat-a.example.org`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerName(String);

impl ServerName {
    /// Create a server name from its host string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The host string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServerName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A federated server: name plus the base address its API is reached at.
///
/// Immutable once loaded. Identity is the name; the address is only used
/// to open sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    /// The server's host identity.
    pub name: ServerName,
    /// Base http(s) URL of the server's client API.
    pub base_address: String,
}

impl Server {
    /// Create a server entry, validating the base address scheme.
    pub fn new(name: impl Into<ServerName>, base_address: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let base_address = base_address.into();
        if !base_address.starts_with("http://") && !base_address.starts_with("https://") {
            return Err(Error::InvalidAddress {
                server: name.to_string(),
                address: base_address,
            });
        }
        Ok(Self { name, base_address })
    }
}

/// The ordered set of known federation servers.
///
/// Order is total and deterministic (lexicographic by name), so the
/// derived leader is identical in every process given the same set.
#[derive(Debug, Clone)]
pub struct ServerRegistry {
    servers: Vec<Server>,
}

impl ServerRegistry {
    /// Build a registry from an unordered server list.
    ///
    /// Sorts by name and rejects empty or ambiguous (duplicate-name)
    /// input - both would break the leader-uniqueness guarantee.
    pub fn new(mut servers: Vec<Server>) -> Result<Self> {
        if servers.is_empty() {
            return Err(Error::EmptyServerList);
        }
        servers.sort_by(|a, b| a.name.cmp(&b.name));
        for pair in servers.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(Error::DuplicateServer(pair[0].name.to_string()));
            }
        }
        Ok(Self { servers })
    }

    /// Load a registry from a JSON file mapping server name to base address.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let entries: BTreeMap<String, String> = serde_json::from_str(&raw)?;
        let servers = entries
            .into_iter()
            .map(|(name, address)| Server::new(name.as_str(), address))
            .collect::<Result<Vec<_>>>()?;
        Self::new(servers)
    }

    /// Load a registry from the `CONCORD_KNOWN_SERVERS` file if set,
    /// otherwise fall back to a single-server registry for `own_server`
    /// with the conventional `http://{name}:80` address.
    pub fn from_env_or_default(own_server: &ServerName) -> Result<Self> {
        match std::env::var(ENV_KNOWN_SERVERS) {
            Ok(path) => Self::from_json_file(path),
            Err(_) => Self::new(vec![Server::new(
                own_server.clone(),
                format!("http://{own_server}:80"),
            )?]),
        }
    }

    /// The leader: first server in name order. Only the leader ever
    /// originates a room.
    pub fn leader(&self) -> &Server {
        // Non-empty by construction.
        &self.servers[0]
    }

    /// Whether the given server is the leader.
    pub fn is_leader(&self, name: &ServerName) -> bool {
        &self.leader().name == name
    }

    /// Look up a server by name.
    pub fn get(&self, name: &ServerName) -> Option<&Server> {
        self.servers.iter().find(|s| &s.name == name)
    }

    /// Whether the registry contains the given server.
    pub fn contains(&self, name: &ServerName) -> bool {
        self.get(name).is_some()
    }

    /// Iterate servers in leader-first order.
    pub fn iter(&self) -> impl Iterator<Item = &Server> {
        self.servers.iter()
    }

    /// Number of known servers.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Always false: construction rejects empty lists.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn server(name: &str) -> Server {
        Server::new(name, format!("https://{name}")).unwrap()
    }

    #[test]
    fn leader_is_first_in_name_order() {
        let registry =
            ServerRegistry::new(vec![server("c.example"), server("a.example"), server("b.example")])
                .unwrap();
        assert_eq!(registry.leader().name.as_str(), "a.example");
        assert!(registry.is_leader(&ServerName::new("a.example")));
        assert!(!registry.is_leader(&ServerName::new("b.example")));
    }

    #[test]
    fn leader_invariant_under_permutation() {
        let names = ["b.example", "c.example", "a.example"];
        // Every rotation of the input yields the same leader.
        for start in 0..names.len() {
            let servers: Vec<_> = (0..names.len())
                .map(|i| server(names[(start + i) % names.len()]))
                .collect();
            let registry = ServerRegistry::new(servers).unwrap();
            assert_eq!(registry.leader().name.as_str(), "a.example");
        }
    }

    #[test]
    fn empty_list_rejected() {
        assert!(matches!(
            ServerRegistry::new(vec![]),
            Err(Error::EmptyServerList)
        ));
    }

    #[test]
    fn duplicate_name_rejected() {
        let result = ServerRegistry::new(vec![server("a.example"), server("a.example")]);
        assert!(matches!(result, Err(Error::DuplicateServer(_))));
    }

    #[test]
    fn bad_address_scheme_rejected() {
        assert!(matches!(
            Server::new("a.example", "a.example:8008"),
            Err(Error::InvalidAddress { .. })
        ));
    }

    #[test]
    fn loads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"b.example": "https://b.example", "a.example": "https://a.example"}}"#
        )
        .unwrap();

        let registry = ServerRegistry::from_json_file(file.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.leader().name.as_str(), "a.example");
        assert_eq!(
            registry.get(&ServerName::new("b.example")).unwrap().base_address,
            "https://b.example"
        );
    }
}
