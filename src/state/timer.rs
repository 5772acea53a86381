//! Per-phase deadlines.
//!
//! The supervisor keeps at most one armed timer per [`TimerKind`]. Arming
//! replaces any timer of the same kind and bumps a generation counter, so a
//! late-delivered timeout for a replaced timer can be told apart from the
//! live one. Expired timers are turned back into ordinary
//! [`SessionEvent::LocalTimeoutFired`](super::event::SessionEvent) events by
//! the dispatch boundary.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::effect::Effect;

/// Which deadline a timer guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Transport handshake until host id arrives
    Connect,
    /// Waiting for the auth verdict
    Auth,
    /// Waiting for join accept/reject
    JoinResponse,
    /// Host signalled start, waiting for game start
    GameStart,
    /// Per-turn deadline
    Turn,
}

impl TimerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Auth => "auth",
            Self::JoinResponse => "join_response",
            Self::GameStart => "game_start",
            Self::Turn => "turn",
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one arming of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId {
    pub kind: TimerKind,
    pub generation: u64,
}

impl TimerId {
    pub fn new(kind: TimerKind, generation: u64) -> Self {
        Self { kind, generation }
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.generation)
    }
}

/// A timer the supervisor is currently waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedTimer {
    pub id: TimerId,
    pub deadline: DateTime<Utc>,
}

/// Armed timers, keyed by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeoutSupervisor {
    armed: HashMap<TimerKind, ArmedTimer>,
    next_generation: u64,
}

impl TimeoutSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `kind` at an absolute deadline, replacing any existing timer of
    /// that kind.
    pub fn arm(&mut self, kind: TimerKind, deadline: DateTime<Utc>) -> Effect {
        self.next_generation += 1;
        let id = TimerId::new(kind, self.next_generation);
        self.armed.insert(kind, ArmedTimer { id, deadline });
        Effect::ArmTimer {
            timer: id,
            deadline,
        }
    }

    /// Arm `kind` to fire `after` from `now`.
    pub fn arm_after(&mut self, kind: TimerKind, now: DateTime<Utc>, after: Duration) -> Effect {
        let after = chrono::Duration::from_std(after).unwrap_or(chrono::Duration::MAX);
        let deadline = now.checked_add_signed(after).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.arm(kind, deadline)
    }

    /// Cancel `kind`. Cancelling an unarmed timer yields no effect.
    pub fn cancel(&mut self, kind: TimerKind) -> Option<Effect> {
        self.armed
            .remove(&kind)
            .map(|_| Effect::CancelTimer { kind })
    }

    /// Cancel every armed timer, in kind order.
    pub fn cancel_all(&mut self) -> Vec<Effect> {
        let mut kinds: Vec<TimerKind> = self.armed.keys().copied().collect();
        kinds.sort_unstable();
        kinds
            .into_iter()
            .filter_map(|kind| self.cancel(kind))
            .collect()
    }

    /// Consume a fired timer. Returns false if `id` is not the live arming
    /// of its kind (already cancelled or replaced).
    pub fn take_fired(&mut self, id: TimerId) -> bool {
        match self.armed.get(&id.kind) {
            Some(armed) if armed.id == id => {
                self.armed.remove(&id.kind);
                true
            }
            _ => false,
        }
    }

    /// Check if a timer of this kind is armed.
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }

    /// Get the live arming of `kind`.
    pub fn get(&self, kind: TimerKind) -> Option<&ArmedTimer> {
        self.armed.get(&kind)
    }

    /// Get the deadline of `kind` if armed.
    pub fn deadline(&self, kind: TimerKind) -> Option<DateTime<Utc>> {
        self.armed.get(&kind).map(|t| t.deadline)
    }

    /// Earliest armed deadline.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.armed.values().map(|t| t.deadline).min()
    }

    /// Timers whose deadline is at or before `now`, earliest first.
    pub fn expired(&self, now: DateTime<Utc>) -> Vec<TimerId> {
        let mut due: Vec<&ArmedTimer> = self
            .armed
            .values()
            .filter(|t| t.deadline <= now)
            .collect();
        due.sort_by_key(|t| (t.deadline, t.id.kind));
        due.into_iter().map(|t| t.id).collect()
    }

    /// Number of armed timers.
    pub fn len(&self) -> usize {
        self.armed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }
}
