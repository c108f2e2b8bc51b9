//! Reconciliation scenarios against an in-memory federation.
//!
//! The mock keeps one shared alias directory (the "federation") and a
//! per-server mutation log, so every test can assert both the outcome
//! and exactly which corrective writes happened on which server.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use concord_ensurer::{Error, Reconciler, Reconciliation, RoomKey, Sessions};
use concord_federation::{Namespace, RoomAlias, RoomPurpose, Server, ServerName, ServerRegistry};
use concord_matrix::{CreateRoomOptions, RoomDirectory, RoomId};

#[derive(Default)]
struct FederationState {
    aliases: HashMap<String, RoomId>,
    next_room: usize,
}

impl FederationState {
    fn allocate_room(&mut self, server: &ServerName) -> RoomId {
        self.next_room += 1;
        RoomId::new(format!("!r{}:{}", self.next_room, server))
    }
}

struct MockServer {
    name: ServerName,
    federation: Arc<Mutex<FederationState>>,
    unreachable: bool,
    mutations: Mutex<Vec<String>>,
}

impl MockServer {
    fn log(&self, entry: String) {
        self.mutations.lock().unwrap().push(entry);
    }

    fn check_reachable(&self) -> concord_matrix::Result<()> {
        if self.unreachable {
            Err(concord_matrix::Error::Api {
                status: 502,
                errcode: "M_UNKNOWN".to_string(),
                message: "gateway timeout".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RoomDirectory for MockServer {
    fn server_name(&self) -> &ServerName {
        &self.name
    }

    async fn resolve_alias(&self, alias: &RoomAlias) -> concord_matrix::Result<Option<RoomId>> {
        self.check_reachable()?;
        let federation = self.federation.lock().unwrap();
        Ok(federation.aliases.get(&alias.to_string()).cloned())
    }

    async fn room_aliases(&self, room_id: &RoomId) -> concord_matrix::Result<HashSet<String>> {
        self.check_reachable()?;
        let federation = self.federation.lock().unwrap();
        Ok(federation
            .aliases
            .iter()
            .filter(|(_, id)| *id == room_id)
            .map(|(alias, _)| alias.clone())
            .collect())
    }

    async fn create_room(
        &self,
        alias_localpart: &str,
        _options: &CreateRoomOptions,
    ) -> concord_matrix::Result<RoomId> {
        self.check_reachable()?;
        self.log(format!("create_room {alias_localpart}"));
        let mut federation = self.federation.lock().unwrap();
        let room_id = federation.allocate_room(&self.name);
        let alias = RoomAlias::new(alias_localpart, self.name.clone());
        federation.aliases.insert(alias.to_string(), room_id.clone());
        Ok(room_id)
    }

    async fn join_room(&self, alias: &RoomAlias) -> concord_matrix::Result<RoomId> {
        self.check_reachable()?;
        self.log(format!("join_room {alias}"));
        let federation = self.federation.lock().unwrap();
        federation
            .aliases
            .get(&alias.to_string())
            .cloned()
            .ok_or(concord_matrix::Error::Api {
                status: 404,
                errcode: "M_NOT_FOUND".to_string(),
                message: format!("No known room for {alias}"),
            })
    }

    async fn set_alias(&self, room_id: &RoomId, alias: &RoomAlias) -> concord_matrix::Result<()> {
        self.check_reachable()?;
        self.log(format!("set_alias {alias} {room_id}"));
        let mut federation = self.federation.lock().unwrap();
        federation
            .aliases
            .insert(alias.to_string(), room_id.clone());
        Ok(())
    }

    async fn remove_alias(&self, alias: &RoomAlias) -> concord_matrix::Result<()> {
        self.check_reachable()?;
        self.log(format!("remove_alias {alias}"));
        let mut federation = self.federation.lock().unwrap();
        federation.aliases.remove(&alias.to_string());
        Ok(())
    }
}

struct TestFederation {
    state: Arc<Mutex<FederationState>>,
    registry: ServerRegistry,
    names: Vec<ServerName>,
}

impl TestFederation {
    fn new(names: &[&str]) -> Self {
        let servers = names
            .iter()
            .map(|name| Server::new(*name, format!("https://{name}")).unwrap())
            .collect();
        Self {
            state: Arc::new(Mutex::new(FederationState::default())),
            registry: ServerRegistry::new(servers).unwrap(),
            names: names.iter().map(|n| ServerName::new(*n)).collect(),
        }
    }

    /// Fresh sessions against the shared federation state, with the
    /// given servers marked unreachable.
    fn sessions(&self, unreachable: &[&str]) -> Sessions<MockServer> {
        Sessions::new(self.names.iter().map(|name| {
            (
                name.clone(),
                MockServer {
                    name: name.clone(),
                    federation: Arc::clone(&self.state),
                    unreachable: unreachable.contains(&name.as_str()),
                    mutations: Mutex::new(Vec::new()),
                },
            )
        }))
    }

    /// Seed a room on a server: the server-local alias points at a new
    /// room id, as if that server had created (or drifted onto) it.
    fn seed_room(&self, server: &str, prefix: &str) -> RoomId {
        let server = ServerName::new(server);
        let mut state = self.state.lock().unwrap();
        let room_id = state.allocate_room(&server);
        let alias = RoomAlias::new(prefix, server);
        state.aliases.insert(alias.to_string(), room_id.clone());
        room_id
    }

    /// Point a server-local alias at an existing room.
    fn seed_alias(&self, server: &str, prefix: &str, room_id: &RoomId) {
        let alias = RoomAlias::new(prefix, ServerName::new(server));
        self.state
            .lock()
            .unwrap()
            .aliases
            .insert(alias.to_string(), room_id.clone());
    }

    fn alias_target(&self, server: &str, prefix: &str) -> Option<RoomId> {
        let alias = RoomAlias::new(prefix, ServerName::new(server));
        self.state
            .lock()
            .unwrap()
            .aliases
            .get(&alias.to_string())
            .cloned()
    }
}

fn discovery_key() -> RoomKey {
    RoomKey::new(Namespace::INTEGRATION, RoomPurpose::Discovery)
}

fn mutations_of(sessions: &Sessions<MockServer>, server: &str) -> Vec<String> {
    sessions
        .get(&ServerName::new(server))
        .unwrap()
        .mutations
        .lock()
        .unwrap()
        .clone()
}

fn reconciler<'a>(
    federation: &'a TestFederation,
    own: &'a ServerName,
    sessions: &'a Sessions<MockServer>,
) -> Reconciler<'a, MockServer> {
    Reconciler::new(
        &federation.registry,
        own,
        sessions,
        CreateRoomOptions::default(),
    )
}

#[tokio::test]
async fn leader_creates_when_federation_is_empty() {
    let federation = TestFederation::new(&["a.example", "b.example", "c.example"]);
    let own = ServerName::new("a.example");
    let sessions = federation.sessions(&[]);

    let outcome = reconciler(&federation, &own, &sessions)
        .ensure_room(&discovery_key())
        .await
        .unwrap();

    let prefix = discovery_key().alias_prefix();
    assert!(matches!(outcome, Reconciliation::Created { .. }));
    assert_eq!(
        mutations_of(&sessions, "a.example"),
        vec![format!("create_room {prefix}")]
    );
    assert!(mutations_of(&sessions, "b.example").is_empty());
    assert_eq!(
        federation.alias_target("a.example", &prefix).as_ref(),
        Some(outcome.room_id())
    );
}

#[tokio::test]
async fn new_server_joins_the_leader_room() {
    let federation = TestFederation::new(&["a.example", "b.example", "c.example"]);
    let prefix = discovery_key().alias_prefix();
    let r1 = federation.seed_room("a.example", &prefix);

    let own = ServerName::new("b.example");
    let sessions = federation.sessions(&[]);
    let outcome = reconciler(&federation, &own, &sessions)
        .ensure_room(&discovery_key())
        .await
        .unwrap();

    assert_eq!(outcome, Reconciliation::Repaired { room_id: r1.clone() });
    assert_eq!(
        mutations_of(&sessions, "b.example"),
        vec![
            format!("join_room #{prefix}:a.example"),
            format!("set_alias #{prefix}:b.example {r1}"),
        ]
    );
    assert_eq!(federation.alias_target("b.example", &prefix), Some(r1));
}

#[tokio::test]
async fn drifted_alias_is_reassigned_to_the_leader_room() {
    let federation = TestFederation::new(&["a.example", "b.example", "c.example"]);
    let prefix = discovery_key().alias_prefix();
    let r1 = federation.seed_room("a.example", &prefix);
    // c's alias drifted onto an unrelated local room.
    let r2 = federation.seed_room("c.example", &prefix);
    assert_ne!(r1, r2);

    let own = ServerName::new("c.example");
    let sessions = federation.sessions(&[]);
    let outcome = reconciler(&federation, &own, &sessions)
        .ensure_room(&discovery_key())
        .await
        .unwrap();

    assert_eq!(outcome, Reconciliation::Repaired { room_id: r1.clone() });
    assert_eq!(
        mutations_of(&sessions, "c.example"),
        vec![
            format!("remove_alias #{prefix}:c.example"),
            format!("join_room #{prefix}:a.example"),
            format!("set_alias #{prefix}:c.example {r1}"),
        ]
    );
    assert_eq!(federation.alias_target("c.example", &prefix), Some(r1));
}

#[tokio::test]
async fn unreachable_leader_aborts_the_pass_without_mutation() {
    let federation = TestFederation::new(&["a.example", "b.example", "c.example"]);
    let prefix = discovery_key().alias_prefix();
    federation.seed_room("a.example", &prefix);

    let own = ServerName::new("b.example");
    let sessions = federation.sessions(&["a.example"]);
    let result = reconciler(&federation, &own, &sessions)
        .ensure_room(&discovery_key())
        .await;

    assert!(matches!(
        result,
        Err(Error::Lookup { ref server, .. }) if server.as_str() == "a.example"
    ));
    assert!(mutations_of(&sessions, "b.example").is_empty());
}

#[tokio::test]
async fn aligned_federation_is_a_noop() {
    let federation = TestFederation::new(&["a.example", "b.example", "c.example"]);
    let prefix = discovery_key().alias_prefix();
    let r1 = federation.seed_room("a.example", &prefix);
    federation.seed_alias("b.example", &prefix, &r1);
    federation.seed_alias("c.example", &prefix, &r1);

    let own = ServerName::new("b.example");
    let sessions = federation.sessions(&[]);
    let outcome = reconciler(&federation, &own, &sessions)
        .ensure_room(&discovery_key())
        .await
        .unwrap();

    assert_eq!(outcome, Reconciliation::Consistent { room_id: r1 });
    for server in ["a.example", "b.example", "c.example"] {
        assert!(mutations_of(&sessions, server).is_empty());
    }
}

#[tokio::test]
async fn second_pass_performs_no_mutations() {
    let federation = TestFederation::new(&["a.example", "b.example", "c.example"]);
    let prefix = discovery_key().alias_prefix();
    federation.seed_room("a.example", &prefix);

    let own = ServerName::new("b.example");

    let sessions = federation.sessions(&[]);
    let first = reconciler(&federation, &own, &sessions)
        .ensure_room(&discovery_key())
        .await
        .unwrap();
    assert!(matches!(first, Reconciliation::Repaired { .. }));

    // Fresh sessions, no external change: the pass must be a no-op.
    let sessions = federation.sessions(&[]);
    let second = reconciler(&federation, &own, &sessions)
        .ensure_room(&discovery_key())
        .await
        .unwrap();
    assert!(matches!(second, Reconciliation::Consistent { .. }));
    assert!(mutations_of(&sessions, "b.example").is_empty());
}

#[tokio::test]
async fn non_leader_never_creates() {
    let federation = TestFederation::new(&["a.example", "b.example", "c.example"]);

    let own = ServerName::new("b.example");
    let sessions = federation.sessions(&[]);
    let result = reconciler(&federation, &own, &sessions)
        .ensure_room(&discovery_key())
        .await;

    assert!(matches!(result, Err(Error::LeaderRoomMissing(_))));
    for server in ["a.example", "b.example", "c.example"] {
        assert!(mutations_of(&sessions, server).is_empty());
    }
}

#[tokio::test]
async fn remote_divergence_is_reported_but_not_repaired() {
    let federation = TestFederation::new(&["a.example", "b.example", "c.example"]);
    let prefix = discovery_key().alias_prefix();
    let r1 = federation.seed_room("a.example", &prefix);
    federation.seed_alias("b.example", &prefix, &r1);
    federation.seed_room("c.example", &prefix);

    let own = ServerName::new("b.example");
    let sessions = federation.sessions(&[]);
    let outcome = reconciler(&federation, &own, &sessions)
        .ensure_room(&discovery_key())
        .await
        .unwrap();

    match outcome {
        Reconciliation::RemoteDivergence { room_id, diverged } => {
            assert_eq!(room_id, r1);
            assert_eq!(diverged, vec![ServerName::new("c.example")]);
        }
        other => panic!("expected RemoteDivergence, got {other:?}"),
    }
    for server in ["a.example", "b.example", "c.example"] {
        assert!(mutations_of(&sessions, server).is_empty());
    }
}

#[tokio::test]
async fn unreachable_follower_degrades_to_missing() {
    let federation = TestFederation::new(&["a.example", "b.example", "c.example"]);
    let prefix = discovery_key().alias_prefix();
    let r1 = federation.seed_room("a.example", &prefix);
    federation.seed_alias("b.example", &prefix, &r1);

    // c is down, but c is neither the leader nor the local server.
    let own = ServerName::new("a.example");
    let sessions = federation.sessions(&["c.example"]);
    let outcome = reconciler(&federation, &own, &sessions)
        .ensure_room(&discovery_key())
        .await
        .unwrap();

    assert_eq!(outcome, Reconciliation::Consistent { room_id: r1 });
    assert!(mutations_of(&sessions, "a.example").is_empty());
}

#[tokio::test]
async fn sweep_collects_per_pair_failures_without_aborting_siblings() {
    let federation = TestFederation::new(&["a.example", "b.example"]);

    // Leader unreachable: every pair fails, but every pair still runs.
    let own = ServerName::new("b.example");
    let sessions = federation.sessions(&["a.example"]);
    let result = reconciler(&federation, &own, &sessions)
        .ensure_all(&[Namespace::INTEGRATION], &RoomPurpose::ALL)
        .await;

    match result {
        Err(Error::Multiple(errors)) => {
            assert_eq!(errors.len(), RoomPurpose::ALL.len());
            for (_, error) in &errors.failures {
                assert!(matches!(error, Error::Lookup { .. }));
            }
        }
        other => panic!("expected aggregated failures, got {other:?}"),
    }
}

#[tokio::test]
async fn federation_converges_as_each_server_runs_its_pass() {
    let federation = TestFederation::new(&["a.example", "b.example", "c.example"]);
    let prefix = discovery_key().alias_prefix();

    // One ensurer runs next to each server, leader first.
    for name in ["a.example", "b.example", "c.example"] {
        let own = ServerName::new(name);
        let sessions = federation.sessions(&[]);
        reconciler(&federation, &own, &sessions)
            .ensure_room(&discovery_key())
            .await
            .unwrap();
    }

    // Every server-local alias now points at the same room.
    let target = federation.alias_target("a.example", &prefix).unwrap();
    for name in ["b.example", "c.example"] {
        assert_eq!(federation.alias_target(name, &prefix), Some(target.clone()));
    }

    // And a second round everywhere is all no-ops.
    for name in ["a.example", "b.example", "c.example"] {
        let own = ServerName::new(name);
        let sessions = federation.sessions(&[]);
        let outcome = reconciler(&federation, &own, &sessions)
            .ensure_room(&discovery_key())
            .await
            .unwrap();
        assert!(matches!(outcome, Reconciliation::Consistent { .. }));
        assert!(mutations_of(&sessions, name).is_empty());
    }
}
