//! Transition output.
//!
//! Transitions never perform I/O. They return an ordered list of
//! [`Effect`]s that the transport, the timer service and the presentation
//! layer carry out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{
    DiplomacyChange, DiplomaticStatusUpdate, GameEndReason, PlayerId, TurnProgressStatus,
};
use super::lobby::ChatChannel;
use super::phase::SessionPhase;
use super::player::{ClientType, PlayerStatus};
use super::session::{DesyncWarning, TurnGap};
use super::timer::{TimerId, TimerKind};

/// A side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Hand a message to the transport.
    Send(OutboundMessage),
    /// Ask the timer service to fire `timer` at `deadline`.
    ArmTimer {
        timer: TimerId,
        deadline: DateTime<Utc>,
    },
    /// Ask the timer service to drop the timer of this kind.
    CancelTimer { kind: TimerKind },
    /// Tell the presentation layer something changed.
    Notify(Notification),
}

impl Effect {
    /// Get the notification, if this is one.
    pub fn as_notification(&self) -> Option<&Notification> {
        match self {
            Self::Notify(n) => Some(n),
            _ => None,
        }
    }

    /// Get the outbound message, if this is one.
    pub fn as_message(&self) -> Option<&OutboundMessage> {
        match self {
            Self::Send(m) => Some(m),
            _ => None,
        }
    }
}

/// Messages the client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    JoinGame {
        player_name: String,
        client_type: ClientType,
    },
    AuthResponse {
        player_name: String,
        password: String,
    },
    TurnOrders {
        turn_number: u32,
        orders: serde_json::Value,
    },
    RevokeOrders {
        turn_number: u32,
    },
    LobbyUpdate {
        config: serde_json::Value,
    },
    PlayerChat {
        recipients: Vec<PlayerId>,
        text: String,
    },
    Diplomacy(DiplomacyChange),
}

/// Why a session ended up disconnected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Transport reported the connection gone.
    ConnectionLost,
    /// Server sent a fatal error.
    ServerError(String),
    AuthRejected(String),
    JoinRejected(String),
    /// A phase deadline passed without an answer.
    Timeout(TimerKind),
}

/// Something the presentation layer should know about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    PhaseChanged {
        from: SessionPhase,
        to: SessionPhase,
        turn_number: u32,
    },
    Disconnected(DisconnectReason),
    AuthRequested {
        player_name: String,
    },
    JoinRetry {
        attempt: u32,
    },
    LobbyChanged,
    HostChanged {
        host_id: PlayerId,
    },
    RosterChanged,
    PlayerStatusChanged {
        player_id: PlayerId,
        status: PlayerStatus,
    },
    ChatReceived {
        channel: ChatChannel,
        count: usize,
    },
    SaveCompleted {
        save_name: String,
    },
    TurnStarted {
        turn_number: u32,
    },
    TurnDiscontinuity(TurnGap),
    TurnPartialUpdate,
    TurnProgress(TurnProgressStatus),
    TurnSubmitted {
        turn_number: u32,
    },
    TurnLocked {
        turn_number: u32,
    },
    TurnRevoked {
        turn_number: u32,
    },
    TurnForfeited {
        turn_number: u32,
    },
    TurnDeadline {
        deadline: DateTime<Utc>,
    },
    /// A local edit was refused because the phase does not allow it.
    EditRejected {
        phase: SessionPhase,
        action: &'static str,
    },
    DiplomacyProposal(DiplomacyChange),
    DiplomaticStatusChanged(DiplomaticStatusUpdate),
    DesyncDetected(DesyncWarning),
    ServerError {
        message: String,
        fatal: bool,
    },
    GameEnded {
        reason: GameEndReason,
    },
    /// An event arrived that the current phase does not accept.
    ProtocolViolation {
        phase: SessionPhase,
        event: &'static str,
    },
}
