//! Matrix client surface for Concord
//!
//! A thin, typed client for the slice of the Matrix client-server API
//! the room ensurer consumes: password login, alias directory reads and
//! writes, room state, room creation and federation joins.
//!
//! The reconciliation engine never uses [`Session`] directly - it goes
//! through the [`RoomDirectory`] trait, so the whole decision logic can
//! be exercised against an in-memory federation in tests.

mod auth;
mod client;
mod directory;
mod error;
mod power_levels;
mod types;

pub use auth::{Credentials, PeerIdentity};
pub use client::{MatrixClient, Session};
pub use directory::{CreateRoomOptions, RoomDirectory};
pub use error::{Error, Result};
pub use power_levels::{level, PowerLevelOverride};
pub use types::RoomId;
