//! Ensurer configuration.
//!
//! An explicitly constructed, immutable value passed into the scheduler.
//! Nothing here is global or mutated after startup.

use std::time::Duration;

use concord_federation::{Namespace, RoomPurpose, ServerName};

/// Default time between reconciliation runs.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3600);

/// Configuration for the room ensurer.
#[derive(Debug, Clone)]
pub struct EnsurerConfig {
    /// The server this process is responsible for. The only server whose
    /// alias state this process will ever mutate.
    pub own_server: ServerName,

    /// Time between runs. Zero means run a single pass and exit.
    pub interval: Duration,

    /// Namespaces (networks) whose rooms are ensured.
    pub namespaces: Vec<Namespace>,

    /// Room purposes ensured per namespace.
    pub purposes: Vec<RoomPurpose>,

    /// Whether rooms created by this process get the restricted
    /// moderation power levels instead of the server defaults.
    pub restrict_moderation: bool,
}

impl EnsurerConfig {
    /// Configuration with defaults: hourly interval, the integration
    /// namespace, every room purpose, server-default moderation.
    pub fn new(own_server: ServerName) -> Self {
        Self {
            own_server,
            interval: DEFAULT_INTERVAL,
            namespaces: vec![Namespace::INTEGRATION],
            purposes: RoomPurpose::ALL.to_vec(),
            restrict_moderation: false,
        }
    }

    /// Set the run interval. Zero selects single-pass mode.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the ensured namespaces.
    #[must_use]
    pub fn with_namespaces(mut self, namespaces: Vec<Namespace>) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Set the ensured room purposes.
    #[must_use]
    pub fn with_purposes(mut self, purposes: Vec<RoomPurpose>) -> Self {
        self.purposes = purposes;
        self
    }

    /// Enable or disable the restricted-moderation creation policy.
    #[must_use]
    pub fn with_restrict_moderation(mut self, restrict: bool) -> Self {
        self.restrict_moderation = restrict;
        self
    }

    /// Whether the scheduler should exit after one pass.
    pub fn is_single_pass(&self) -> bool {
        self.interval.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_purposes() {
        let config = EnsurerConfig::new(ServerName::new("a.example"));
        assert_eq!(config.interval, DEFAULT_INTERVAL);
        assert_eq!(config.namespaces, vec![Namespace::INTEGRATION]);
        assert_eq!(config.purposes.len(), 3);
        assert!(!config.restrict_moderation);
        assert!(!config.is_single_pass());
    }

    #[test]
    fn zero_interval_selects_single_pass() {
        let config =
            EnsurerConfig::new(ServerName::new("a.example")).with_interval(Duration::ZERO);
        assert!(config.is_single_pass());
    }
}
