//! Session phase.
//!
//! # State Diagram
//!
//! ```text
//! ┌─────────────┐ connect ┌────────────┐ host id (auth) ┌────────────────┐
//! │ Unconnected │────────▶│ Connecting │───────────────▶│ Authenticating │
//! └─────────────┘         └─────┬──────┘                └───────┬────────┘
//!                               │ host id (no auth)             │ auth accepted
//!                               ▼                               │
//!                        ┌─────────────┐◀───────────────────────┘
//!                        │ JoiningGame │
//!                        └──────┬──────┘
//!                               │ join accepted
//!                               ▼
//!                         ┌─────────┐ save completed ┌───────────────────┐
//!                         │ InLobby │───────────────▶│ AwaitingGameStart │
//!                         └────┬────┘                └─────────┬─────────┘
//!                              │ game started                  │ game started
//!                              ▼                               │
//!                       ┌─────────────┐◀───────────────────────┘
//!          turn update  │ PlayingTurn │◀─────┐
//!              ┌───────▶│             │      │ turn update / turn revoked
//!              └────────┴──────┬──────┘      │
//!                              │ orders acknowledged
//!                              ▼             │
//!                       ┌────────────┐       │
//!                       │ TurnLocked │───────┘
//!                       └─────┬──────┘
//!                             │ game ended (also from lobby and playing)
//!                             ▼
//!                       ┌───────────┐          ┌──────────────┐
//!                       │ GameEnded │          │ Disconnected │◀── any phase on
//!                       └───────────┘          └──────────────┘    disconnect or
//!                                                                  fatal error
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No socket, no lobby info
    #[default]
    Unconnected,
    /// Transport handshake outstanding
    Connecting,
    /// Answering an auth challenge
    Authenticating,
    /// Join request sent
    JoiningGame,
    /// Accepted into a multiplayer lobby
    InLobby,
    /// Host signalled an imminent start; lobby is frozen
    AwaitingGameStart,
    /// Steady-state turn loop
    PlayingTurn,
    /// Orders acknowledged; no edits until the next turn update
    TurnLocked,
    /// End-game received
    GameEnded,
    /// Connection lost or fatal error
    Disconnected,
}

impl SessionPhase {
    pub const ALL: [SessionPhase; 10] = [
        Self::Unconnected,
        Self::Connecting,
        Self::Authenticating,
        Self::JoiningGame,
        Self::InLobby,
        Self::AwaitingGameStart,
        Self::PlayingTurn,
        Self::TurnLocked,
        Self::GameEnded,
        Self::Disconnected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unconnected => "unconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::JoiningGame => "joining_game",
            Self::InLobby => "in_lobby",
            Self::AwaitingGameStart => "awaiting_game_start",
            Self::PlayingTurn => "playing_turn",
            Self::TurnLocked => "turn_locked",
            Self::GameEnded => "game_ended",
            Self::Disconnected => "disconnected",
        }
    }

    /// No further events are accepted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::GameEnded | Self::Disconnected)
    }

    /// Connected to a server (handshake started and not yet terminal).
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Unconnected) && !self.is_terminal()
    }

    /// Accepted by the server: lobby or game.
    pub fn is_joined(&self) -> bool {
        matches!(
            self,
            Self::InLobby | Self::AwaitingGameStart | Self::PlayingTurn | Self::TurnLocked
        )
    }

    /// A game is running.
    pub fn is_in_game(&self) -> bool {
        matches!(self, Self::PlayingTurn | Self::TurnLocked)
    }

    /// Still negotiating with the server, before any lobby.
    pub fn is_handshaking(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Authenticating | Self::JoiningGame
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
