//! Session establishment across the federation.
//!
//! Connections to all known servers are attempted in parallel and the
//! whole operation fails if any single one fails. Reconciliation must
//! never run against a partial view: a reachable subset cannot be
//! trusted to see every copy of a room.

use std::collections::HashMap;

use concord_federation::{ServerName, ServerRegistry};
use concord_matrix::{Credentials, MatrixClient, PeerIdentity, RoomDirectory, Session};
use futures::future::try_join_all;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// The process-local server -> session map.
///
/// Exclusively owned by the scheduler and rebuilt on every reconnect;
/// reconciliation passes only ever borrow it.
#[derive(Debug)]
pub struct Sessions<D: RoomDirectory> {
    inner: HashMap<ServerName, D>,
}

impl<D: RoomDirectory> Sessions<D> {
    /// Build a session map directly. Production code goes through
    /// [`connect_all`]; this is the seam tests use to inject an
    /// in-memory federation.
    pub fn new(sessions: impl IntoIterator<Item = (ServerName, D)>) -> Self {
        Self {
            inner: sessions.into_iter().collect(),
        }
    }

    /// The session for a server, if one was established.
    pub fn get(&self, server: &ServerName) -> Option<&D> {
        self.inner.get(server)
    }

    /// Number of established sessions.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no sessions are held.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Open an authenticated session to every known server concurrently.
///
/// The own server is logged into with the operator's credentials. Every
/// other server gets a fresh derived identity - peers only need
/// measurement access, never the privileged account. The first failed
/// login fails the whole call with [`Error::Connection`].
pub async fn connect_all(
    registry: &ServerRegistry,
    own_server: &ServerName,
    credentials: &Credentials,
) -> Result<Sessions<Session>> {
    let logins = registry.iter().map(|server| {
        let client = MatrixClient::new(server);
        async move {
            debug!("Connecting to {}", server.name);
            let login = if &server.name == own_server {
                client
                    .login(&credentials.username, &credentials.password)
                    .await
            } else {
                let identity = PeerIdentity::generate();
                client
                    .login(&identity.username(), &identity.proof_for(&server.name))
                    .await
            };
            let session = login.map_err(|source| Error::Connection {
                server: server.name.clone(),
                source,
            })?;
            debug!("Connected to {}", server.name);
            Ok::<_, Error>((server.name.clone(), session))
        }
    });

    let sessions = try_join_all(logins).await?;
    info!("All {} servers connected", sessions.len());
    Ok(Sessions::new(sessions))
}
