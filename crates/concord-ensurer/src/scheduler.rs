//! The outer reconciliation loop.
//!
//! Drives connect-all and the reconciliation sweep on a fixed interval:
//!
//! ```text
//! Idle -> Connecting -> Reconciling -> Sleeping -> Connecting -> ...
//!                                  \-> Done        (interval == 0)
//! ```
//!
//! A failed connect never attempts partial reconciliation - the
//! scheduler sleeps a fixed backoff and reconnects from scratch.
//! Sessions are not retained across ticks; every cycle re-establishes
//! them so a server that bounced gets a fresh login.

use std::time::Duration;

use concord_matrix::{CreateRoomOptions, Credentials, PowerLevelOverride};
use concord_federation::ServerRegistry;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::config::EnsurerConfig;
use crate::error::{Error, Result};
use crate::reconciler::Reconciler;
use crate::sessions::connect_all;

/// Fixed delay before reconnecting after a failed session establishment.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(60);

/// Where the scheduler currently is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not started yet.
    Idle,
    /// Establishing sessions to every known server.
    Connecting,
    /// Sweeping all (namespace, purpose) pairs.
    Reconciling,
    /// Waiting for the interval or the reconnect backoff to elapse.
    Sleeping,
    /// Finished (single-pass mode only).
    Done,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Reconciling => write!(f, "Reconciling"),
            Self::Sleeping => write!(f, "Sleeping"),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// Long-running driver for the room ensurer.
pub struct Scheduler {
    config: EnsurerConfig,
    registry: ServerRegistry,
    credentials: Credentials,
    state: SchedulerState,
}

impl Scheduler {
    /// Create a scheduler, validating that the own server is part of the
    /// known federation.
    pub fn new(
        config: EnsurerConfig,
        registry: ServerRegistry,
        credentials: Credentials,
    ) -> Result<Self> {
        if !registry.contains(&config.own_server) {
            return Err(Error::Config(
                concord_federation::Error::UnknownOwnServer(config.own_server.to_string()),
            ));
        }

        debug!(
            "Scheduler initialized: own_server={}, leader={}, servers={}, interval={:?}",
            config.own_server,
            registry.leader().name,
            registry.len(),
            config.interval
        );
        Ok(Self {
            config,
            registry,
            credentials,
            state: SchedulerState::Idle,
        })
    }

    /// Current loop state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    fn transition(&mut self, next: SchedulerState) {
        debug!("Scheduler state {} -> {}", self.state, next);
        self.state = next;
    }

    /// Room-creation policy for this deployment.
    fn create_options(&self) -> CreateRoomOptions {
        if self.config.restrict_moderation {
            CreateRoomOptions::default().with_power_levels(PowerLevelOverride::server_admins(
                &self.registry,
                &self.credentials.username,
                &self.config.own_server,
            ))
        } else {
            CreateRoomOptions::default()
        }
    }

    /// Run the loop. Returns only in single-pass mode (interval zero),
    /// with the aggregate error if that pass collected failures.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.transition(SchedulerState::Connecting);
            let sessions = match connect_all(
                &self.registry,
                &self.config.own_server,
                &self.credentials,
            )
            .await
            {
                Ok(sessions) => sessions,
                Err(error) => {
                    error!(
                        "Session establishment failed: {}. Retrying in {:?}",
                        error, RECONNECT_BACKOFF
                    );
                    self.transition(SchedulerState::Sleeping);
                    sleep(RECONNECT_BACKOFF).await;
                    continue;
                }
            };

            self.transition(SchedulerState::Reconciling);
            let reconciler = Reconciler::new(
                &self.registry,
                &self.config.own_server,
                &sessions,
                self.create_options(),
            );
            let sweep = reconciler
                .ensure_all(&self.config.namespaces, &self.config.purposes)
                .await;
            match &sweep {
                Ok(outcomes) => {
                    for (key, outcome) in outcomes {
                        info!("{}: {:?}", key, outcome);
                    }
                }
                // Per-pair failures were already collected across the
                // whole sweep; surface the aggregate before sleeping.
                Err(error) => error!("Sweep finished with failures: {}", error),
            }

            if self.config.is_single_pass() {
                self.transition(SchedulerState::Done);
                return sweep.map(|_| ());
            }

            self.transition(SchedulerState::Sleeping);
            info!("Run finished, sleeping for {:?}", self.config.interval);
            sleep(self.config.interval).await;
        }
    }
}
