//! The room directory operation contract.
//!
//! The reconciler only ever touches a server through this trait, which
//! keeps the decision engine independent of the HTTP client and lets
//! tests drive it against an in-memory federation.

use std::collections::HashSet;

use async_trait::async_trait;
use concord_federation::{RoomAlias, ServerName};

use crate::error::Result;
use crate::power_levels::PowerLevelOverride;
use crate::types::RoomId;

/// Options for creating a public room.
#[derive(Debug, Clone, Default)]
pub struct CreateRoomOptions {
    /// Moderation permissions to apply at creation. `None` leaves the
    /// server's defaults untouched; whether to restrict is operator
    /// policy, not something this crate decides.
    pub power_level_override: Option<PowerLevelOverride>,
}

impl CreateRoomOptions {
    /// Options with a moderation override applied.
    #[must_use]
    pub fn with_power_levels(mut self, levels: PowerLevelOverride) -> Self {
        self.power_level_override = Some(levels);
        self
    }
}

/// Operations an authenticated session offers against one server's room
/// directory.
///
/// Every method is a single remote operation. None of them retry; the
/// caller decides what a failure means for the current pass.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// The server this session is bound to.
    fn server_name(&self) -> &ServerName;

    /// Resolve an alias to a room id. `Ok(None)` iff the server reports
    /// the alias as unknown - any other failure is an error, so a network
    /// hiccup is never mistaken for "room absent".
    async fn resolve_alias(&self, alias: &RoomAlias) -> Result<Option<RoomId>>;

    /// All aliases attached to a room, extracted from its state.
    async fn room_aliases(&self, room_id: &RoomId) -> Result<HashSet<String>>;

    /// Create a public room carrying the given server-local alias
    /// localpart. Returns the server-assigned room id.
    async fn create_room(&self, alias_localpart: &str, options: &CreateRoomOptions)
        -> Result<RoomId>;

    /// Join a room via an alias (federation join when the alias belongs
    /// to another server).
    async fn join_room(&self, alias: &RoomAlias) -> Result<RoomId>;

    /// Point a server-local alias at a room.
    async fn set_alias(&self, room_id: &RoomId, alias: &RoomAlias) -> Result<()>;

    /// Drop a server-local alias.
    async fn remove_alias(&self, alias: &RoomAlias) -> Result<()>;
}
