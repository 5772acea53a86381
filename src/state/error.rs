//! Error types.
//!
//! Protocol problems are reported as notifications in the effect stream,
//! not as errors. These types cover the few calls that can fail outright.

use thiserror::Error;

use super::event::{PlayerId, SessionEvent};
use super::phase::SessionPhase;

/// A submit was refused as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("session is closed ({phase}); start a new session to continue")]
    SessionClosed { phase: SessionPhase },
}

/// The session behind an [`EventSender`](super::dispatch::EventSender) is gone;
/// the event is handed back.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("session queue closed; dropped {} event", .0.kind())]
pub struct QueueClosed(pub SessionEvent);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse session config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid session config: {0}")]
    Invalid(String),
}
