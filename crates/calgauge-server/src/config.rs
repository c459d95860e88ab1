//! Engine and HTTP configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Refresh scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Time between timer-triggered refreshes.
    pub interval: Duration,
    /// How far ahead of `now` each build looks.
    pub lookahead: chrono::Duration,
    /// Manual triggers that may wait before further ones are dropped.
    pub manual_queue_capacity: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            lookahead: chrono::Duration::days(7),
            manual_queue_capacity: 100,
        }
    }
}

impl RefreshConfig {
    /// Creates a refresh configuration with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Builder: set the lookahead window.
    pub fn with_lookahead(mut self, lookahead: chrono::Duration) -> Self {
        self.lookahead = lookahead;
        self
    }

    /// Builder: set the manual trigger queue capacity (at least 1).
    pub fn with_manual_queue_capacity(mut self, capacity: usize) -> Self {
        self.manual_queue_capacity = capacity.max(1);
        self
    }
}

/// Gauge derivation configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeriveConfig {
    /// Time between derivation passes.
    pub interval: Duration,
    /// How long after its start an event is still reported.
    pub grace: chrono::Duration,
}

impl Default for DeriveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            grace: chrono::Duration::minutes(3),
        }
    }
}

impl DeriveConfig {
    /// Creates a derivation configuration with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Builder: set the grace window. Negative values collapse to zero.
    pub fn with_grace(mut self, grace: chrono::Duration) -> Self {
        self.grace = grace.max(chrono::Duration::zero());
        self
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the HTTP surface listens on.
    pub listen: SocketAddr,
    /// Refresh scheduler settings.
    pub refresh: RefreshConfig,
    /// Gauge derivation settings.
    pub derive: DeriveConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            refresh: RefreshConfig::default(),
            derive: DeriveConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a server configuration listening on `listen`.
    pub fn new(listen: SocketAddr) -> Self {
        Self {
            listen,
            ..Default::default()
        }
    }

    /// Builder: set refresh settings.
    pub fn with_refresh(mut self, refresh: RefreshConfig) -> Self {
        self.refresh = refresh;
        self
    }

    /// Builder: set derivation settings.
    pub fn with_derive(mut self, derive: DeriveConfig) -> Self {
        self.derive = derive;
        self
    }
}
