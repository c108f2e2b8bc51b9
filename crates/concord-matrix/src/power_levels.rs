//! Moderation permission overrides for created rooms.
//!
//! Whether a freshly created federation room should restrict moderation
//! is operator policy. When enabled, the override grants each known
//! server's admin account moderator rights and the creating operator
//! administrator rights, and locks the sensitive state events down to
//! administrators.

use std::collections::BTreeMap;

use concord_federation::{ServerName, ServerRegistry};
use serde::Serialize;

/// Standard power levels.
pub mod level {
    /// Ordinary user.
    pub const USER: i64 = 0;
    /// Moderator: ban/kick/redact/invite and state changes.
    pub const MODERATOR: i64 = 50;
    /// Administrator: full control.
    pub const ADMINISTRATOR: i64 = 100;
}

/// `power_level_content_override` body for room creation.
#[derive(Debug, Clone, Serialize)]
pub struct PowerLevelOverride {
    users: BTreeMap<String, i64>,
    users_default: i64,
    events: BTreeMap<String, i64>,
    events_default: i64,
    state_default: i64,
    ban: i64,
    kick: i64,
    redact: i64,
    invite: i64,
}

impl PowerLevelOverride {
    /// Build the server-admin override for a federation.
    ///
    /// `operator` is the local account that creates the room and becomes
    /// administrator; every known server's `admin-<server>` account gets
    /// moderator rights so each operator can moderate from their side.
    pub fn server_admins(
        registry: &ServerRegistry,
        operator: &str,
        own_server: &ServerName,
    ) -> Self {
        let mut users = BTreeMap::new();
        for server in registry.iter() {
            let username = format!("admin-{}", server.name).replace(':', "-");
            users.insert(
                format!("@{}:{}", username, server.name),
                level::MODERATOR,
            );
        }
        users.insert(
            format!("@{}:{}", operator, own_server),
            level::ADMINISTRATOR,
        );

        let mut events = BTreeMap::new();
        events.insert("m.room.power_levels".to_string(), level::ADMINISTRATOR);
        events.insert(
            "m.room.history_visibility".to_string(),
            level::ADMINISTRATOR,
        );

        Self {
            users,
            users_default: level::USER,
            events,
            events_default: level::USER,
            state_default: level::MODERATOR,
            ban: level::MODERATOR,
            kick: level::MODERATOR,
            redact: level::MODERATOR,
            invite: level::MODERATOR,
        }
    }
}
