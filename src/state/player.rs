//! Player roster.
//!
//! The client's view of who is in the session. Entries come from the server
//! (join accept, lobby updates, game start, player status/info messages);
//! the client never invents players.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::RosterError;
use super::event::{PlayerEntry, PlayerId};

/// What kind of client a player connected as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    #[default]
    Player,
    Observer,
    Moderator,
    Ai,
}

impl ClientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Observer => "observer",
            Self::Moderator => "moderator",
            Self::Ai => "ai",
        }
    }
}

/// A player's status as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    /// Connected, no game running yet
    #[default]
    InLobby,
    /// Editing orders for the current turn
    PlayingTurn,
    /// Orders submitted, waiting on others
    Waiting,
    /// Server is resolving the turn
    ResolvingTurn,
    /// Lost connection to the server
    Disconnected,
}

impl PlayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InLobby => "in_lobby",
            Self::PlayingTurn => "playing_turn",
            Self::Waiting => "waiting",
            Self::ResolvingTurn => "resolving_turn",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One known player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub name: String,
    pub client_type: ClientType,
    pub status: PlayerStatus,
    pub is_host: bool,
}

impl PlayerRecord {
    fn from_entry(entry: &PlayerEntry, is_host: bool) -> Self {
        Self {
            name: entry.name.clone(),
            client_type: entry.client_type,
            status: entry.status,
            is_host,
        }
    }
}

/// Players keyed by id. At most one player is flagged as host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerRoster {
    players: HashMap<PlayerId, PlayerRecord>,
    host_id: Option<PlayerId>,
}

impl PlayerRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole roster. `host_id` is kept even when that player is
    /// not listed; the flag attaches once the player shows up.
    pub fn replace_all(&mut self, entries: &[PlayerEntry], host_id: Option<PlayerId>) {
        self.players = entries
            .iter()
            .map(|e| (e.player_id, PlayerRecord::from_entry(e, host_id == Some(e.player_id))))
            .collect();
        self.host_id = host_id;
    }

    /// Insert or overwrite a single player.
    pub fn upsert(&mut self, entry: &PlayerEntry) {
        let is_host = self.host_id == Some(entry.player_id);
        self.players
            .insert(entry.player_id, PlayerRecord::from_entry(entry, is_host));
    }

    /// Update name and client type, keeping status and host flag.
    pub fn update_info(
        &mut self,
        player_id: PlayerId,
        name: &str,
        client_type: ClientType,
    ) -> Result<(), RosterError> {
        let record = self
            .players
            .get_mut(&player_id)
            .ok_or(RosterError::UnknownPlayer(player_id))?;
        record.name = name.to_string();
        record.client_type = client_type;
        Ok(())
    }

    pub fn set_status(
        &mut self,
        player_id: PlayerId,
        status: PlayerStatus,
    ) -> Result<(), RosterError> {
        let record = self
            .players
            .get_mut(&player_id)
            .ok_or(RosterError::UnknownPlayer(player_id))?;
        record.status = status;
        Ok(())
    }

    /// Move the host flag. Unknown ids are still remembered so a later
    /// roster replacement can attach the flag.
    pub fn set_host(&mut self, player_id: PlayerId) {
        if let Some(old) = self.host_id.and_then(|id| self.players.get_mut(&id)) {
            old.is_host = false;
        }
        if let Some(new) = self.players.get_mut(&player_id) {
            new.is_host = true;
        }
        self.host_id = Some(player_id);
    }

    /// Set every player's status at once (e.g. on game start).
    pub fn set_all_status(&mut self, status: PlayerStatus) {
        for record in self.players.values_mut() {
            record.status = status;
        }
    }

    pub fn host_id(&self) -> Option<PlayerId> {
        self.host_id
    }

    pub fn is_host(&self, player_id: PlayerId) -> bool {
        self.host_id == Some(player_id)
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&PlayerRecord> {
        self.players.get(&player_id)
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.players.contains_key(&player_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &PlayerRecord)> {
        self.players.iter().map(|(id, r)| (*id, r))
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Convert to JSON for the presentation layer, sorted by player id.
    pub fn to_json(&self) -> serde_json::Value {
        let mut ids: Vec<PlayerId> = self.players.keys().copied().collect();
        ids.sort_unstable();

        let players: Vec<serde_json::Value> = ids
            .iter()
            .filter_map(|id| self.players.get(id).map(|p| (id, p)))
            .map(|(id, p)| {
                serde_json::json!({
                    "player_id": id,
                    "name": p.name,
                    "client_type": p.client_type.as_str(),
                    "status": p.status.as_str(),
                    "is_host": p.is_host
                })
            })
            .collect();

        serde_json::json!({
            "host_id": self.host_id,
            "players": players
        })
    }
}
