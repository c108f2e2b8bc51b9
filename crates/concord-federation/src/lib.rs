//! Concord federation model
//!
//! The static picture of a Concord deployment: which servers exist, how
//! they are ordered, and how rooms are named across them.
//!
//! # Leader rule
//!
//! Servers are sorted lexicographically by name and the first one is the
//! leader. Leadership is a pure function of the name set - never of
//! timing - so independently started processes always agree on who may
//! create a room. This replaces an election protocol at the cost of
//! requiring a pre-agreed, operator-curated server list.
//!
//! # Naming
//!
//! Each `(namespace, purpose)` pair selects a canonical alias prefix.
//! Every server then carries a server-local alias `#<prefix>:<server>`
//! which should resolve to the same underlying room everywhere once the
//! federation has converged.

mod alias;
mod error;
mod server;

pub use alias::{alias_prefix, Namespace, RoomAlias, RoomPurpose};
pub use error::{Error, Result};
pub use server::{Server, ServerName, ServerRegistry, ENV_KNOWN_SERVERS};
