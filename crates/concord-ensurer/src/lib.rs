//! Concord room ensurer
//!
//! Keeps a named set of public rooms identical across a federation of
//! independently administered servers. Rooms are created on one server
//! and federate outwards; each server then needs a server-local alias
//! pointing at the same underlying room. Nothing coordinates those
//! aliases centrally, so this daemon runs next to each server and
//! converges them:
//!
//! - Sort the known servers lexicographically; the first is the leader.
//! - Connect to all known servers; if any is unreachable, back off and
//!   retry later rather than reconcile a partial view.
//! - Resolve `#<prefix>:<server>` on every server and compare room ids.
//! - If the leader has no room: the leader's ensurer creates it, every
//!   other ensurer waits.
//! - If the own server's alias is missing or points at the wrong room:
//!   join the leader's room and point the local alias at it.
//! - Remote servers' divergences are theirs to repair on their own pass.
//!
//! Races between concurrently running ensurers are self-healing: only
//! the leader creates, and each process mutates only its own server.

mod config;
mod error;
mod locator;
mod mutator;
mod reconciler;
mod scheduler;
mod sessions;

pub use config::{EnsurerConfig, DEFAULT_INTERVAL};
pub use error::{Error, MultipleErrors, Result};
pub use locator::{locate, RoomInfo};
pub use mutator::AliasMutator;
pub use reconciler::{Reconciler, Reconciliation, RoomKey};
pub use scheduler::{Scheduler, SchedulerState, RECONNECT_BACKOFF};
pub use sessions::{connect_all, Sessions};
