//! Turn Client State Library
//!
//! This crate provides the client-side session protocol for turn-based
//! multiplayer games.
//!
//! # Overview
//!
//! The state module provides:
//!
//! - **Session Phase Machine** - Tracks where the client is (connecting,
//!   authenticating, joining, lobby, playing a turn, locked, ended) with a
//!   pure transition function covering every phase and event.
//!
//! - **Effects** - Transitions return outbound messages, timer requests and
//!   notifications instead of doing I/O themselves.
//!
//! - **Timeout Supervision** - Every waiting phase owns a deadline; stale
//!   timer firings are recognised by generation and ignored.
//!
//! - **Dispatch** - One owner processes events in arrival order; producers
//!   on other threads queue through an `EventSender`.
//!
//! # Design Principles
//!
//! 1. **Unexpected events never panic** - They become no-ops plus a
//!    diagnostic notification.
//!
//! 2. **No networking** - This crate is pure state, no sockets or UI.
//!
//! 3. **Serialization-ready** - Messages and snapshots convert to JSON.
//!
//! # Example
//!
//! ```rust
//! use turnclient_state::state::{
//!     event::{HostId, JoinAccepted},
//!     ClientSession, PlayerEntry, SessionConfig, SessionEvent, SessionPhase,
//! };
//!
//! let mut session = ClientSession::new(SessionConfig::new("Alice"));
//!
//! session.submit(SessionEvent::ConnectRequested).unwrap();
//! session
//!     .submit(SessionEvent::HostId(HostId { host_player_id: 1 }))
//!     .unwrap();
//! assert_eq!(session.phase(), SessionPhase::JoiningGame);
//!
//! session
//!     .submit(SessionEvent::JoinAccepted(JoinAccepted {
//!         player_id: 2,
//!         players: vec![PlayerEntry::new(1, "Host"), PlayerEntry::new(2, "Alice")],
//!     }))
//!     .unwrap();
//! assert_eq!(session.phase(), SessionPhase::InLobby);
//! assert!(session.players().is_host(1));
//! ```

pub mod state;

// Re-export everything from state module at crate root
pub use state::*;
