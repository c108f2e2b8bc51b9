//! Corrective writes against the local server.
//!
//! Each operation is a single remote call with no internal retry -
//! retry belongs to the scheduler at its next interval. These are the
//! only state mutations in the whole system, and they are only ever
//! applied to the own server's view, never to a remote server.

use std::collections::HashSet;

use concord_federation::RoomAlias;
use concord_matrix::{CreateRoomOptions, RoomDirectory, RoomId};
use tracing::debug;

use crate::error::{Error, Result};
use crate::locator::RoomInfo;

/// Executes corrective actions through one server's session.
#[derive(Debug)]
pub struct AliasMutator<'a, D: RoomDirectory> {
    directory: &'a D,
}

impl<'a, D: RoomDirectory> AliasMutator<'a, D> {
    /// Wrap a session for mutation.
    pub fn new(directory: &'a D) -> Self {
        Self { directory }
    }

    /// Create a public room carrying the server-local alias for
    /// `alias_prefix`. The sole room-creation path in the system.
    pub async fn create_room(
        &self,
        alias_prefix: &str,
        options: &CreateRoomOptions,
    ) -> Result<RoomInfo> {
        let room_id = self
            .directory
            .create_room(alias_prefix, options)
            .await
            .map_err(|source| Error::Mutation {
                operation: "create_room",
                source,
            })?;
        let server_name = self.directory.server_name().clone();
        let alias = RoomAlias::new(alias_prefix, server_name.clone());

        debug!("Created room {} with alias {}", room_id, alias);
        Ok(RoomInfo {
            room_id,
            aliases: HashSet::from([alias.to_string()]),
            server_name,
        })
    }

    /// Join the room behind `leader_alias` via federation, then point
    /// `own_alias` at it. Returns the joined room's id.
    pub async fn join_and_alias(
        &self,
        leader_alias: &RoomAlias,
        own_alias: &RoomAlias,
    ) -> Result<RoomId> {
        let room_id = self
            .directory
            .join_room(leader_alias)
            .await
            .map_err(|source| Error::Mutation {
                operation: "join_room",
                source,
            })?;
        debug!("Joined {} as room {}", leader_alias, room_id);

        self.directory
            .set_alias(&room_id, own_alias)
            .await
            .map_err(|source| Error::Mutation {
                operation: "set_alias",
                source,
            })?;
        debug!("Alias {} now points at {}", own_alias, room_id);
        Ok(room_id)
    }

    /// Drop a server-local alias from whatever room it points at.
    pub async fn remove_alias(&self, alias: &RoomAlias) -> Result<()> {
        self.directory
            .remove_alias(alias)
            .await
            .map_err(|source| Error::Mutation {
                operation: "remove_alias",
                source,
            })?;
        debug!("Removed alias {}", alias);
        Ok(())
    }
}
