//! Client configuration.

use std::time::Duration;

use combat_net::subjects::DEFAULT_LOBBY;

/// Configuration for a player process.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Lobby to join; scopes every NATS subject.
    pub lobby: String,
    /// Platform account used to claim a combat identity.
    pub account_id: u64,
    /// Name shown to other players.
    pub display_name: String,
    /// Optional NATS URL override (defaults to `NATS_URL` env or localhost).
    pub nats_url: Option<String>,
    /// Local death-screen countdown. Should match the host's respawn delay.
    pub respawn_delay: Duration,
    /// How often a heartbeat is sent to the host.
    pub heartbeat_interval: Duration,
    /// Local ticks per second.
    pub tick_rate: f64,
}

impl ClientConfig {
    /// Create a config for `account_id` in `lobby`.
    #[must_use]
    pub fn new(lobby: impl Into<String>, account_id: u64, display_name: impl Into<String>) -> Self {
        Self {
            lobby: lobby.into(),
            account_id,
            display_name: display_name.into(),
            nats_url: None,
            respawn_delay: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(1),
            tick_rate: 30.0,
        }
    }

    /// Override the NATS URL.
    #[must_use]
    pub fn with_nats_url(mut self, url: impl Into<String>) -> Self {
        self.nats_url = Some(url.into());
        self
    }

    /// Override the death-screen countdown.
    #[must_use]
    pub fn with_respawn_delay(mut self, delay: Duration) -> Self {
        self.respawn_delay = delay;
        self
    }

    /// Override the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Override the tick rate. Non-positive rates are ignored.
    #[must_use]
    pub fn with_tick_rate(mut self, tick_rate: f64) -> Self {
        if tick_rate.is_finite() && tick_rate > 0.0 {
            self.tick_rate = tick_rate;
        }
        self
    }

    /// Duration of one local tick.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LOBBY, 0, "player")
    }
}
