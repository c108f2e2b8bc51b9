//! The reconciliation decision engine.
//!
//! For one `(namespace, purpose)` pair the reconciler reads every
//! server's view of the room, compares the room ids against the
//! leader's, and computes at most one corrective action - applied only
//! to the own server's alias state.
//!
//! # Why this converges without locks
//!
//! Any number of these processes may run concurrently, one per server.
//! Two rules make the races self-healing instead of requiring
//! coordination:
//!
//! 1. Only the leader (first server in name order) ever creates a room,
//!    so a given `(namespace, purpose)` can never fork into two
//!    independent rooms.
//! 2. Each process only mutates its own server's aliases, so concurrent
//!    passes on different servers cannot write over each other.
//!
//! A non-leader that finds the leader's room missing does nothing but
//! report: waiting is correct, creating is not.

use std::collections::HashMap;

use concord_federation::{
    alias_prefix, Namespace, RoomAlias, RoomPurpose, ServerName, ServerRegistry,
};
use concord_matrix::{CreateRoomOptions, RoomDirectory, RoomId};
use tracing::{debug, info, warn};

use crate::error::{Error, MultipleErrors, Result};
use crate::locator::{locate, RoomInfo};
use crate::mutator::AliasMutator;
use crate::sessions::Sessions;

/// Selects one federated room: a namespace plus what the room is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoomKey {
    pub namespace: Namespace,
    pub purpose: RoomPurpose,
}

impl RoomKey {
    /// Create a room key.
    pub fn new(namespace: Namespace, purpose: RoomPurpose) -> Self {
        Self { namespace, purpose }
    }

    /// The canonical alias prefix shared by every server's local alias.
    pub fn alias_prefix(&self) -> String {
        alias_prefix(self.namespace, self.purpose)
    }
}

impl std::fmt::Display for RoomKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.alias_prefix())
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Every resolved view already pointed at the leader's room; the
    /// pass was a no-op.
    Consistent { room_id: RoomId },
    /// The leader's room did not exist and this process (the leader)
    /// created it.
    Created { room_id: RoomId },
    /// The own server's alias was missing or pointed at the wrong room
    /// and has been corrected.
    Repaired { room_id: RoomId },
    /// The own server agrees with the leader but some remote server does
    /// not. That server repairs itself on its own pass; we only report.
    RemoteDivergence {
        room_id: RoomId,
        diverged: Vec<ServerName>,
    },
}

impl Reconciliation {
    /// The room id the federation converges on.
    pub fn room_id(&self) -> &RoomId {
        match self {
            Reconciliation::Consistent { room_id }
            | Reconciliation::Created { room_id }
            | Reconciliation::Repaired { room_id }
            | Reconciliation::RemoteDivergence { room_id, .. } => room_id,
        }
    }
}

/// The per-process reconciliation engine.
///
/// Borrows the registry and session map for one run; reads room state
/// fresh on every pass and never caches it across passes.
pub struct Reconciler<'a, D: RoomDirectory> {
    registry: &'a ServerRegistry,
    own_server: &'a ServerName,
    sessions: &'a Sessions<D>,
    create_options: CreateRoomOptions,
}

impl<'a, D: RoomDirectory> Reconciler<'a, D> {
    /// Create a reconciler for one run.
    pub fn new(
        registry: &'a ServerRegistry,
        own_server: &'a ServerName,
        sessions: &'a Sessions<D>,
        create_options: CreateRoomOptions,
    ) -> Self {
        Self {
            registry,
            own_server,
            sessions,
            create_options,
        }
    }

    fn own_directory(&self) -> Result<&'a D> {
        self.sessions
            .get(self.own_server)
            .ok_or_else(|| Error::SessionMissing(self.own_server.clone()))
    }

    /// Read every server's view of the room behind `prefix`.
    ///
    /// A transient lookup failure against the leader or the own server
    /// aborts the pass: corrective action based on incomplete knowledge
    /// of either is unsafe. A failure against any other server only
    /// degrades that server's entry to "not found" for this pass.
    async fn collect_room_infos(
        &self,
        prefix: &str,
    ) -> Result<HashMap<ServerName, Option<RoomInfo>>> {
        let mut room_infos = HashMap::new();
        for server in self.registry.iter() {
            let directory = self
                .sessions
                .get(&server.name)
                .ok_or_else(|| Error::SessionMissing(server.name.clone()))?;
            let info = match locate(directory, prefix).await {
                Ok(info) => info,
                Err(source) => {
                    let critical = server.name == *self.own_server
                        || self.registry.is_leader(&server.name);
                    if critical {
                        return Err(Error::Lookup {
                            server: server.name.clone(),
                            source,
                        });
                    }
                    warn!(
                        "Lookup on {} failed, treating as missing for this pass: {}",
                        server.name, source
                    );
                    None
                }
            };
            room_infos.insert(server.name.clone(), info);
        }
        Ok(room_infos)
    }

    /// Reconcile one `(namespace, purpose)` room across the federation.
    pub async fn ensure_room(&self, key: &RoomKey) -> Result<Reconciliation> {
        let prefix = key.alias_prefix();
        info!("Ensuring room {} for {}", prefix, self.own_server);

        let mut room_infos = self.collect_room_infos(&prefix).await?;

        let leader_name = self.registry.leader().name.clone();
        let leader_alias = RoomAlias::new(prefix.clone(), leader_name.clone());
        let own_alias = RoomAlias::new(prefix.clone(), self.own_server.clone());

        // Leader-missing case. Creation is reachable only when this
        // process IS the leader - the single-origin guarantee.
        let mut created = false;
        let leader_info = match room_infos.get(&leader_name).cloned().flatten() {
            Some(info) => info,
            None => {
                warn!("Leader room {} missing", leader_alias);
                if !self.registry.is_leader(self.own_server) {
                    return Err(Error::LeaderRoomMissing(leader_alias));
                }
                info!("Creating room {} on {}", prefix, self.own_server);
                let mutator = AliasMutator::new(self.own_directory()?);
                let info = mutator.create_room(&prefix, &self.create_options).await?;
                created = true;
                room_infos.insert(leader_name.clone(), Some(info.clone()));
                info
            }
        };

        // Convergence check: every resolved view must carry the leader's
        // room id. Not-found entries on remote servers are just
        // federation delay, not divergence.
        let diverged: Vec<ServerName> = room_infos
            .iter()
            .filter_map(|(name, info)| match info {
                Some(info) if info.room_id != leader_info.room_id => Some(name.clone()),
                _ => None,
            })
            .collect();

        if created {
            if !diverged.is_empty() {
                warn!(
                    "Rooms diverged on {:?} for freshly created {}, theirs to repair",
                    diverged, prefix
                );
            }
            return Ok(Reconciliation::Created {
                room_id: leader_info.room_id,
            });
        }

        let own_info = room_infos.get(self.own_server).cloned().flatten();
        match own_info {
            None => {
                // Bootstrap path: a newly joined server has no local
                // alias yet.
                warn!(
                    "Room missing on {}, joining {} and adding {}",
                    self.own_server, leader_alias, own_alias
                );
                let mutator = AliasMutator::new(self.own_directory()?);
                let room_id = mutator.join_and_alias(&leader_alias, &own_alias).await?;
                info!("Alias {} set on {}", own_alias, room_id);
                Ok(Reconciliation::Repaired { room_id })
            }
            Some(info) if info.room_id != leader_info.room_id => {
                // Self-healing path: the local alias drifted onto a
                // different room (e.g. after a local recreate).
                warn!(
                    "Alias {} points at {} but the leader room is {}, reassigning",
                    own_alias, info.room_id, leader_info.room_id
                );
                let mutator = AliasMutator::new(self.own_directory()?);
                mutator.remove_alias(&own_alias).await?;
                let room_id = mutator.join_and_alias(&leader_alias, &own_alias).await?;
                info!("Alias {} reassigned to {}", own_alias, room_id);
                Ok(Reconciliation::Repaired { room_id })
            }
            Some(_) if !diverged.is_empty() => {
                // Someone else's alias is wrong. Their pass repairs it;
                // mutating a remote server from here is never allowed.
                warn!(
                    "Rooms diverged on {:?} for {}, nothing to do locally",
                    diverged, prefix
                );
                Ok(Reconciliation::RemoteDivergence {
                    room_id: leader_info.room_id,
                    diverged,
                })
            }
            Some(_) => {
                debug!("Room state ok for {}", prefix);
                Ok(Reconciliation::Consistent {
                    room_id: leader_info.room_id,
                })
            }
        }
    }

    /// Run one pass for every `(namespace, purpose)` pair, sequentially.
    ///
    /// Pairs are serialized to keep room-creation decisions ordered and
    /// to bound the blast radius of any one repair. Per-pair failures
    /// are collected rather than aborting the sweep; if any pair failed
    /// the aggregate is returned after all pairs ran.
    pub async fn ensure_all(
        &self,
        namespaces: &[Namespace],
        purposes: &[RoomPurpose],
    ) -> Result<Vec<(RoomKey, Reconciliation)>> {
        let mut outcomes = Vec::new();
        let mut failures = MultipleErrors::default();

        for &namespace in namespaces {
            for &purpose in purposes {
                let key = RoomKey::new(namespace, purpose);
                match self.ensure_room(&key).await {
                    Ok(outcome) => {
                        debug!("Pass {} finished: {:?}", key, outcome);
                        outcomes.push((key, outcome));
                    }
                    Err(error) => {
                        warn!("Pass {} failed: {}", key, error);
                        failures.push(key, error);
                    }
                }
            }
        }

        if failures.is_empty() {
            Ok(outcomes)
        } else {
            Err(Error::Multiple(failures))
        }
    }
}
