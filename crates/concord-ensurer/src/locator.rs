//! Per-server room discovery.

use std::collections::HashSet;

use concord_federation::{RoomAlias, ServerName};
use concord_matrix::{RoomDirectory, RoomId};
use tracing::debug;

/// A server's view of one federated room, read fresh on every pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    /// The server-assigned room identity.
    pub room_id: RoomId,
    /// All aliases the server knows for the room.
    pub aliases: HashSet<String>,
    /// Which server this view came from.
    pub server_name: ServerName,
}

/// Discover whether a server carries a room under its server-local alias
/// `#<alias_prefix>:<server>`.
///
/// Three outcomes, and the distinction is load-bearing:
/// - `Ok(Some(info))` - the alias resolved; `info.aliases` holds the
///   room's full alias state.
/// - `Ok(None)` - the server reports the alias as unknown. A normal,
///   expected state (e.g. a freshly joined server), not an error.
/// - `Err(_)` - the query failed for any other reason. Propagated so the
///   reconciler never treats a network hiccup as "room absent".
pub async fn locate<D: RoomDirectory>(
    directory: &D,
    alias_prefix: &str,
) -> concord_matrix::Result<Option<RoomInfo>> {
    let server_name = directory.server_name().clone();
    let alias = RoomAlias::new(alias_prefix, server_name.clone());

    let Some(room_id) = directory.resolve_alias(&alias).await? else {
        debug!("No room behind {} on {}", alias, server_name);
        return Ok(None);
    };
    let aliases = directory.room_aliases(&room_id).await?;

    debug!(
        "Found room {} behind {} on {} ({} aliases)",
        room_id,
        alias,
        server_name,
        aliases.len()
    );
    Ok(Some(RoomInfo {
        room_id,
        aliases,
        server_name,
    }))
}
