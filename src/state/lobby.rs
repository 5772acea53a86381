//! Lobby snapshot and chat log.
//!
//! The lobby configuration itself (galaxy setup, rules, empire picks) is
//! opaque here: it is stored as received and replaced wholesale on each
//! lobby update. Only the player list and host are read out of it.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::event::{ChatMessage, PlayerEntry, PlayerId};

/// Default number of chat lines retained.
pub const DEFAULT_CHAT_HISTORY_LIMIT: usize = 200;

/// Last lobby state received from the server.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LobbySnapshot {
    /// Opaque lobby configuration
    #[serde(default)]
    pub config: serde_json::Value,

    /// Players currently in the lobby
    #[serde(default)]
    pub players: Vec<PlayerEntry>,

    /// Host according to this update
    #[serde(default)]
    pub host_player_id: Option<PlayerId>,
}

impl LobbySnapshot {
    pub fn new(config: serde_json::Value, players: Vec<PlayerEntry>) -> Self {
        Self {
            config,
            players,
            host_player_id: None,
        }
    }

    pub fn with_host(mut self, host_player_id: PlayerId) -> Self {
        self.host_player_id = Some(host_player_id);
        self
    }

    pub fn has_player(&self, player_id: PlayerId) -> bool {
        self.players.iter().any(|p| p.player_id == player_id)
    }

    /// Convert to JSON for the presentation layer.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "config": self.config,
            "player_count": self.players.len(),
            "host_id": self.host_player_id
        })
    }
}

/// Where a chat line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatChannel {
    Lobby,
    Game,
    History,
}

/// A chat line as kept in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub channel: ChatChannel,
    pub message: ChatMessage,
}

/// Bounded chat log; oldest lines are dropped first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLog {
    lines: VecDeque<ChatLine>,
    limit: usize,
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::with_limit(DEFAULT_CHAT_HISTORY_LIMIT)
    }
}

impl ChatLog {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn push(&mut self, channel: ChatChannel, message: ChatMessage) {
        if self.lines.len() == self.limit {
            self.lines.pop_front();
        }
        self.lines.push_back(ChatLine { channel, message });
    }

    pub fn lines(&self) -> impl Iterator<Item = &ChatLine> {
        self.lines.iter()
    }

    pub fn last(&self) -> Option<&ChatLine> {
        self.lines.back()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
