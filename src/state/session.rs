//! Session state aggregate.
//!
//! One [`SessionState`] lives for one connection attempt. Anyone may read it;
//! only the transition engine writes it.

use std::collections::HashMap;

use super::effect::DisconnectReason;
use super::event::{
    ChecksumReport, DiplomaticStatus, GameEndReason, PlayerId, Standing,
};
use super::lobby::{ChatLog, LobbySnapshot};
use super::phase::SessionPhase;
use super::player::PlayerRoster;
use super::timer::TimeoutSupervisor;

/// A turn update that skipped ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnGap {
    pub expected: u32,
    pub received: u32,
}

impl TurnGap {
    /// Number of turn updates that never arrived.
    pub fn missed(&self) -> u32 {
        self.received.saturating_sub(self.expected)
    }
}

/// Server and local checksums disagreed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesyncWarning {
    pub turn_number: u32,
    pub server_checksum: u32,
    pub local_checksum: u32,
}

/// Everything the client knows about its session with the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub(super) phase: SessionPhase,

    /// Current turn; only moves forward except on game start
    pub(super) turn_number: u32,

    pub(super) players: PlayerRoster,

    /// Id the server assigned to this client
    pub(super) local_player_id: Option<PlayerId>,

    /// Server checksum waiting for the local one
    pub(super) pending_checksum: Option<ChecksumReport>,

    /// Local checksum waiting for the server one
    pub(super) local_checksum: Option<ChecksumReport>,

    pub(super) lobby_snapshot: Option<LobbySnapshot>,

    pub(super) armed_timers: TimeoutSupervisor,

    /// Orders for the current turn were sent
    pub(super) turn_submitted: bool,

    /// Turn deadline passed before the next turn update
    pub(super) turn_forfeited: bool,

    /// Set when the last turn update skipped turns
    pub(super) turn_gap: Option<TurnGap>,

    pub(super) desync_warning: Option<DesyncWarning>,

    /// Join requests sent during this attempt
    pub(super) join_attempts: u32,

    /// A join request is waiting for its answer
    pub(super) join_outstanding: bool,

    pub(super) single_player: bool,

    pub(super) chat: ChatLog,

    /// Latest status per empire pair, keyed with the lower id first
    pub(super) diplomatic_statuses: HashMap<(PlayerId, PlayerId), DiplomaticStatus>,

    pub(super) end_reason: Option<GameEndReason>,
    pub(super) final_standings: Vec<Standing>,

    pub(super) disconnect_reason: Option<DisconnectReason>,
}

impl SessionState {
    /// Fresh state for a new connection attempt.
    pub fn new(chat_history_limit: usize) -> Self {
        Self {
            chat: ChatLog::with_limit(chat_history_limit),
            ..Self::default()
        }
    }

    /// Get the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Get the current turn number (0 before the game starts).
    pub fn turn_number(&self) -> u32 {
        self.turn_number
    }

    /// Get the known players.
    pub fn players(&self) -> &PlayerRoster {
        &self.players
    }

    /// Get the id the server assigned to this client, once joined or hosting.
    pub fn local_player_id(&self) -> Option<PlayerId> {
        self.local_player_id
    }

    /// Get the current host, if announced.
    pub fn host_id(&self) -> Option<PlayerId> {
        self.players.host_id()
    }

    /// True if this client is the host.
    pub fn is_local_host(&self) -> bool {
        self.local_player_id
            .is_some_and(|id| self.players.is_host(id))
    }

    /// Get the server checksum still waiting for the local value.
    pub fn pending_checksum(&self) -> Option<&ChecksumReport> {
        self.pending_checksum.as_ref()
    }

    /// Get the last lobby update.
    pub fn lobby_snapshot(&self) -> Option<&LobbySnapshot> {
        self.lobby_snapshot.as_ref()
    }

    /// Get the timers armed for the current phase and turn.
    pub fn armed_timers(&self) -> &TimeoutSupervisor {
        &self.armed_timers
    }

    /// Check if orders for the current turn were sent.
    pub fn is_turn_submitted(&self) -> bool {
        self.turn_submitted
    }

    /// Check if the turn deadline passed before the next turn update.
    pub fn is_turn_forfeited(&self) -> bool {
        self.turn_forfeited
    }

    /// Local turn edits are currently allowed.
    pub fn can_edit_turn(&self) -> bool {
        self.phase == SessionPhase::PlayingTurn && !self.turn_submitted
    }

    /// Get the skip flagged by the most recent turn update.
    pub fn turn_gap(&self) -> Option<&TurnGap> {
        self.turn_gap.as_ref()
    }

    /// Get the standing desync warning, cleared on game start.
    pub fn desync_warning(&self) -> Option<&DesyncWarning> {
        self.desync_warning.as_ref()
    }

    /// Number of join requests sent during this connection attempt.
    pub fn join_attempts(&self) -> u32 {
        self.join_attempts
    }

    /// Check if the running game is single-player.
    pub fn is_single_player(&self) -> bool {
        self.single_player
    }

    /// Get the received chat lines.
    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    /// Get the latest status between two empires, in either order.
    pub fn diplomatic_status(&self, a: PlayerId, b: PlayerId) -> Option<DiplomaticStatus> {
        self.diplomatic_statuses.get(&pair_key(a, b)).copied()
    }

    /// Get why the game ended, once it has.
    pub fn end_reason(&self) -> Option<GameEndReason> {
        self.end_reason
    }

    /// Get the standings sent with the end of the game.
    pub fn final_standings(&self) -> &[Standing] {
        &self.final_standings
    }

    /// Get why the session disconnected.
    pub fn disconnect_reason(&self) -> Option<&DisconnectReason> {
        self.disconnect_reason.as_ref()
    }

    /// Convert to JSON for the presentation layer.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "phase": self.phase.as_str(),
            "turn_number": self.turn_number,
            "local_player_id": self.local_player_id,
            "roster": self.players.to_json(),
            "lobby": self.lobby_snapshot.as_ref().map(|l| l.to_json()),
            "turn_submitted": self.turn_submitted,
            "turn_forfeited": self.turn_forfeited,
            "turn_gap": self.turn_gap.map(|g| serde_json::json!({
                "expected": g.expected,
                "received": g.received
            })),
            "desync": self.desync_warning.map(|d| serde_json::json!({
                "turn_number": d.turn_number,
                "server_checksum": d.server_checksum,
                "local_checksum": d.local_checksum
            })),
            "chat_lines": self.chat.len(),
            "armed_timers": self.armed_timers.len()
        })
    }
}

pub(super) fn pair_key(a: PlayerId, b: PlayerId) -> (PlayerId, PlayerId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
