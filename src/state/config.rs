//! Session configuration.
//!
//! Holds the user-chosen identity and the protocol deadlines. The config is
//! the only thing that survives a session reset.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::lobby::DEFAULT_CHAT_HISTORY_LIMIT;
use super::player::ClientType;

/// Default time to receive the host id after connecting (30 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time to get an auth verdict (60 seconds).
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(60);

/// Default time to get a join answer (30 seconds).
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of join re-sends before giving up.
pub const DEFAULT_JOIN_RETRIES: u32 = 2;

/// Default wait between the start signal and game start (120 seconds).
pub const DEFAULT_GAME_START_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name sent with join and auth requests
    pub player_name: String,

    pub client_type: ClientType,

    /// Whether the server is expected to challenge for credentials
    pub expect_auth: bool,

    pub connect_timeout_secs: u64,
    pub auth_timeout_secs: u64,
    pub join_timeout_secs: u64,
    pub join_retries: u32,
    pub game_start_timeout_secs: u64,

    /// Client-side turn deadline; `None` leaves turn timing to the server
    pub turn_timeout_secs: Option<u64>,

    pub chat_history_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            player_name: String::new(),
            client_type: ClientType::Player,
            expect_auth: false,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            auth_timeout_secs: DEFAULT_AUTH_TIMEOUT.as_secs(),
            join_timeout_secs: DEFAULT_JOIN_TIMEOUT.as_secs(),
            join_retries: DEFAULT_JOIN_RETRIES,
            game_start_timeout_secs: DEFAULT_GAME_START_TIMEOUT.as_secs(),
            turn_timeout_secs: None,
            chat_history_limit: DEFAULT_CHAT_HISTORY_LIMIT,
        }
    }
}

impl SessionConfig {
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            ..Self::default()
        }
    }

    pub fn with_auth(mut self, expect_auth: bool) -> Self {
        self.expect_auth = expect_auth;
        self
    }

    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn with_join_retries(mut self, retries: u32) -> Self {
        self.join_retries = retries;
        self
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.player_name.trim().is_empty() {
            return Err(ConfigError::Invalid("player_name must not be empty".into()));
        }

        let timeouts = [
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("auth_timeout_secs", self.auth_timeout_secs),
            ("join_timeout_secs", self.join_timeout_secs),
            ("game_start_timeout_secs", self.game_start_timeout_secs),
            ("turn_timeout_secs", self.turn_timeout_secs.unwrap_or(1)),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::Invalid(format!("{} must be positive", name)));
        }

        if self.chat_history_limit == 0 {
            return Err(ConfigError::Invalid(
                "chat_history_limit must be positive".into(),
            ));
        }

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }

    pub fn game_start_timeout(&self) -> Duration {
        Duration::from_secs(self.game_start_timeout_secs)
    }

    pub fn turn_timeout(&self) -> Option<Duration> {
        self.turn_timeout_secs.map(Duration::from_secs)
    }
}
