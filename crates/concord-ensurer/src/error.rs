//! Error types for concord-ensurer.
//!
//! A closed taxonomy, not an open hierarchy. The variants map onto how
//! the scheduler reacts: configuration errors are fatal at startup,
//! connection errors abort the whole tick, lookup/mutation/leader errors
//! abort a single `(namespace, purpose)` pass and are aggregated into
//! [`MultipleErrors`] for the operator.

use concord_federation::{RoomAlias, ServerName};
use thiserror::Error;

use crate::reconciler::RoomKey;

/// Result type for concord-ensurer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while ensuring rooms.
#[derive(Debug, Error)]
pub enum Error {
    /// Broken federation configuration. Fatal, never retried.
    #[error("configuration error: {0}")]
    Config(#[from] concord_federation::Error),

    /// A server was unreachable during session establishment. The whole
    /// tick is abandoned - a reachable-subset view cannot be trusted to
    /// see every copy of a room.
    #[error("connecting to {server} failed: {source}")]
    Connection {
        server: ServerName,
        source: concord_matrix::Error,
    },

    /// The session map was missing a known server. Connection-family
    /// invariant violation; cannot happen when sessions come from
    /// `connect_all`.
    #[error("no session for server {0}")]
    SessionMissing(ServerName),

    /// A room lookup failed for reasons other than "alias unknown".
    /// Aborts only the affected pass - never mistaken for absence.
    #[error("room lookup on {server} failed: {source}")]
    Lookup {
        server: ServerName,
        source: concord_matrix::Error,
    },

    /// The leader's room does not exist and this process is not the
    /// leader. Creating it here would race another non-leader into two
    /// irreconcilable rooms, so we wait for the leader instead.
    #[error("leader room {0} missing, waiting for the leader to create it")]
    LeaderRoomMissing(RoomAlias),

    /// A corrective write failed. Not retried within the pass; the
    /// scheduler retries on its next interval.
    #[error("{operation} failed: {source}")]
    Mutation {
        operation: &'static str,
        source: concord_matrix::Error,
    },

    /// One or more `(namespace, purpose)` passes failed during a sweep.
    #[error(transparent)]
    Multiple(#[from] MultipleErrors),
}

/// Aggregate of per-pass failures from one reconciliation sweep.
///
/// Sibling passes never abort each other; everything that went wrong is
/// collected here and surfaced at once.
#[derive(Debug, Default)]
pub struct MultipleErrors {
    /// The failed passes with their individual causes.
    pub failures: Vec<(RoomKey, Error)>,
}

impl MultipleErrors {
    /// Record a failed pass.
    pub fn push(&mut self, key: RoomKey, error: Error) {
        self.failures.push((key, error));
    }

    /// Whether any pass failed.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of failed passes.
    pub fn len(&self) -> usize {
        self.failures.len()
    }
}

impl std::fmt::Display for MultipleErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} reconciliation pass(es) failed:", self.failures.len())?;
        for (key, error) in &self.failures {
            write!(f, " [{key}: {error}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultipleErrors {}
