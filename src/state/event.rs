//! Session events.
//!
//! Every occurrence the session reacts to is one variant of [`SessionEvent`]:
//! decoded server messages carry their payload struct, local events carry
//! only what the local side knows (or nothing at all).
//!
//! The set is closed so that the transition table can match it exhaustively.

use serde::{Deserialize, Serialize};

use super::lobby::LobbySnapshot;
use super::player::{ClientType, PlayerStatus};
use super::timer::TimerId;

/// Server-assigned player identifier.
pub type PlayerId = i32;

/// A player as described by the server in join, lobby and game-start messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub player_id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub client_type: ClientType,
    #[serde(default)]
    pub status: PlayerStatus,
}

impl PlayerEntry {
    pub fn new(player_id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            player_id,
            name: name.into(),
            client_type: ClientType::default(),
            status: PlayerStatus::default(),
        }
    }
}

/// Connection established; the server names the current host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostId {
    pub host_player_id: PlayerId,
}

/// The server accepted this client as host of a new game. The id is the one
/// assigned to this client, which is also the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAccepted {
    pub host_player_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinAccepted {
    /// Id assigned to this client.
    pub player_id: PlayerId,
    pub players: Vec<PlayerEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRejected {
    pub reason: String,
}

/// Server asks for credentials before admitting the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChallenge {
    pub player_name: String,
    #[serde(default)]
    pub auth_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRejected {
    pub reason: String,
}

/// A chat line as it arrives from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Option<PlayerId>,
    pub sender_name: String,
    pub text: String,
    pub sent_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistory {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveCompleted {
    pub save_name: String,
    pub bytes_written: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStarted {
    pub turn_number: u32,
    #[serde(default)]
    pub single_player: bool,
    #[serde(default)]
    pub loaded_game: bool,
    pub players: Vec<PlayerEntry>,
}

/// Full turn data. The universe payload is opaque to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnUpdate {
    pub turn_number: u32,
    pub data: serde_json::Value,
}

/// Incremental turn data for the current turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnPartialUpdate {
    pub data: serde_json::Value,
}

/// Server-side turn processing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnProgressStatus {
    /// Orders from this client were received and accepted.
    OrdersReceived,
    WaitingForPlayers,
    ProcessingOrders,
    ResolvingCombat,
    GeneratingUniverse,
    DownloadingTurn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnProgress {
    pub status: TurnProgressStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRevoked {
    pub turn_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatusChanged {
    pub player_id: PlayerId,
    pub status: PlayerStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfoUpdate {
    pub player_id: PlayerId,
    pub name: String,
    pub client_type: ClientType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiplomacyKind {
    ProposeWar,
    ProposePeace,
    ProposeAlliance,
    AcceptProposal,
    RejectProposal,
    CancelProposal,
}

/// A diplomatic proposal or reply between two empires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiplomacyChange {
    pub sender: PlayerId,
    pub recipient: PlayerId,
    pub kind: DiplomacyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiplomaticStatus {
    War,
    Peace,
    Allied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiplomaticStatusUpdate {
    pub empire1: PlayerId,
    pub empire2: PlayerId,
    pub status: DiplomaticStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameEndReason {
    Victory,
    PlayerEliminated,
    HostDisconnected,
    ServerShutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub player_id: PlayerId,
    pub name: String,
    pub rank: u32,
    #[serde(default)]
    pub eliminated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEnded {
    pub reason: GameEndReason,
    pub standings: Vec<Standing>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumReport {
    pub turn_number: u32,
    pub checksum: u32,
}

/// Server says how long the current turn has left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnTimeoutNotice {
    pub remaining_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Recoverable,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericError {
    pub message: String,
    pub severity: ErrorSeverity,
    #[serde(default)]
    pub player_id: Option<PlayerId>,
}

impl GenericError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: ErrorSeverity::Fatal,
            player_id: None,
        }
    }

    pub fn recoverable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: ErrorSeverity::Recoverable,
            player_id: None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == ErrorSeverity::Fatal
    }
}

/// Everything the session reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    // Server messages
    HostId(HostId),
    /// Hosting a multiplayer game was acknowledged.
    HostMpAccepted(HostAccepted),
    /// Hosting a single-player game was acknowledged.
    HostSpAccepted(HostAccepted),
    JoinAccepted(JoinAccepted),
    JoinRejected(JoinRejected),
    AuthChallenge(AuthChallenge),
    AuthAccepted,
    AuthRejected(AuthRejected),
    LobbyUpdate(LobbySnapshot),
    LobbyChat(ChatMessage),
    SaveCompleted(SaveCompleted),
    GameStarted(GameStarted),
    TurnUpdate(TurnUpdate),
    TurnPartialUpdate(TurnPartialUpdate),
    TurnProgress(TurnProgress),
    TurnRevoked(TurnRevoked),
    PlayerStatusChanged(PlayerStatusChanged),
    PlayerChat(ChatMessage),
    DiplomacyChange(DiplomacyChange),
    DiplomaticStatusUpdate(DiplomaticStatusUpdate),
    GameEnded(GameEnded),
    ChecksumReport(ChecksumReport),
    ChatHistory(ChatHistory),
    TurnTimeoutNotice(TurnTimeoutNotice),
    PlayerInfoUpdate(PlayerInfoUpdate),
    GenericError(GenericError),

    // Local user actions
    ConnectRequested,
    AuthResponseReady { password: String },
    TurnSubmitted { orders: serde_json::Value },
    TurnRevokeRequested,
    ChatSubmitted { recipients: Vec<PlayerId>, text: String },
    LobbyEditRequested { config: serde_json::Value },
    DiplomacySubmitted(DiplomacyChange),
    LocalChecksumComputed { turn_number: u32, checksum: u32 },

    // Local transport and timer signals
    DisconnectionDetected,
    LocalTimeoutFired(TimerId),
}

impl SessionEvent {
    /// Stable name for logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HostId(_) => "host_id",
            Self::HostMpAccepted(_) => "host_mp_accepted",
            Self::HostSpAccepted(_) => "host_sp_accepted",
            Self::JoinAccepted(_) => "join_accepted",
            Self::JoinRejected(_) => "join_rejected",
            Self::AuthChallenge(_) => "auth_challenge",
            Self::AuthAccepted => "auth_accepted",
            Self::AuthRejected(_) => "auth_rejected",
            Self::LobbyUpdate(_) => "lobby_update",
            Self::LobbyChat(_) => "lobby_chat",
            Self::SaveCompleted(_) => "save_completed",
            Self::GameStarted(_) => "game_started",
            Self::TurnUpdate(_) => "turn_update",
            Self::TurnPartialUpdate(_) => "turn_partial_update",
            Self::TurnProgress(_) => "turn_progress",
            Self::TurnRevoked(_) => "turn_revoked",
            Self::PlayerStatusChanged(_) => "player_status_changed",
            Self::PlayerChat(_) => "player_chat",
            Self::DiplomacyChange(_) => "diplomacy_change",
            Self::DiplomaticStatusUpdate(_) => "diplomatic_status_update",
            Self::GameEnded(_) => "game_ended",
            Self::ChecksumReport(_) => "checksum_report",
            Self::ChatHistory(_) => "chat_history",
            Self::TurnTimeoutNotice(_) => "turn_timeout_notice",
            Self::PlayerInfoUpdate(_) => "player_info_update",
            Self::GenericError(_) => "generic_error",
            Self::ConnectRequested => "connect_requested",
            Self::AuthResponseReady { .. } => "auth_response_ready",
            Self::TurnSubmitted { .. } => "turn_submitted",
            Self::TurnRevokeRequested => "turn_revoke_requested",
            Self::ChatSubmitted { .. } => "chat_submitted",
            Self::LobbyEditRequested { .. } => "lobby_edit_requested",
            Self::DiplomacySubmitted(_) => "diplomacy_submitted",
            Self::LocalChecksumComputed { .. } => "local_checksum_computed",
            Self::DisconnectionDetected => "disconnection_detected",
            Self::LocalTimeoutFired(_) => "local_timeout_fired",
        }
    }

    /// True for events that did not come from the server.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::ConnectRequested
                | Self::AuthResponseReady { .. }
                | Self::TurnSubmitted { .. }
                | Self::TurnRevokeRequested
                | Self::ChatSubmitted { .. }
                | Self::LobbyEditRequested { .. }
                | Self::DiplomacySubmitted(_)
                | Self::LocalChecksumComputed { .. }
                | Self::DisconnectionDetected
                | Self::LocalTimeoutFired(_)
        )
    }
}
