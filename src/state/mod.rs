//! Client session state.
//!
//! This module provides the session types and the transition engine:
//!
//! - `phase` - Session lifecycle phases
//! - `event` - Server messages and local actions fed to the session
//! - `effect` - Messages, timer requests and notifications a transition emits
//! - `transition` - The pure transition function and its engine
//! - `dispatch` - Single-owner session with an ordered event queue
//! - `player` - Player roster and host tracking
//! - `lobby` - Lobby snapshot and chat history
//! - `timer` - Phase deadlines with stale-timer detection
//! - `session` - The session state aggregate
//! - `config` - Player identity and protocol deadlines
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  transport   │   │ user / game  │   │ timer service│
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        │ server events    │ local actions    │ tick
//!        ▼                  ▼                  ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                   ClientSession                      │
//! │   EventSender ──▶ FIFO queue ──▶ TransitionEngine    │
//! │                                     │                │
//! │                 (SessionState, SessionEvent)         │
//! │                                     ▼                │
//! │                 (SessionState, Vec<Effect>)          │
//! └──────────────────────────┬──────────────────────────┘
//!                            │ effects
//!        ┌───────────────────┼───────────────────┐
//!        ▼                   ▼                   ▼
//!   Send(message)      Arm/CancelTimer      Notify(...)
//! ```

pub mod config;
pub mod dispatch;
pub mod effect;
pub mod error;
pub mod event;
pub mod lobby;
pub mod phase;
pub mod player;
pub mod session;
pub mod timer;
pub mod transition;

pub use config::SessionConfig;
pub use dispatch::{ClientSession, EventSender};
pub use effect::{DisconnectReason, Effect, Notification, OutboundMessage};
pub use error::{ConfigError, QueueClosed, RosterError, SubmitError};
pub use event::{PlayerEntry, PlayerId, SessionEvent};
pub use lobby::{ChatChannel, ChatLine, ChatLog, LobbySnapshot};
pub use phase::SessionPhase;
pub use player::{ClientType, PlayerRecord, PlayerRoster, PlayerStatus};
pub use session::{DesyncWarning, SessionState, TurnGap};
pub use timer::{TimeoutSupervisor, TimerId, TimerKind};
pub use transition::{transition, Transition, TransitionContext, TransitionEngine};
