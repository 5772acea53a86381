//! Dispatch boundary.
//!
//! [`ClientSession`] is the single entry point for events. Network events,
//! local user actions, disconnect signals and synthesized timeouts all go
//! through [`ClientSession::submit`] (directly, or queued via an
//! [`EventSender`] and processed by [`ClientSession::drain`]).
//!
//! The session has one owner. Producers on other threads only hold an
//! `EventSender`; the queue preserves delivery order.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::config::SessionConfig;
use super::effect::Effect;
use super::error::{QueueClosed, SubmitError};
use super::event::SessionEvent;
use super::phase::SessionPhase;
use super::player::PlayerRoster;
use super::session::{DesyncWarning, SessionState};
use super::transition::TransitionEngine;

/// Cloneable handle for feeding events from another context.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSender {
    /// Queue an event. Events are processed in the order they are sent.
    pub fn send(&self, event: SessionEvent) -> Result<(), QueueClosed> {
        self.tx.send(event).map_err(|err| QueueClosed(err.0))
    }

    /// Convenience for the transport's disconnect side channel.
    pub fn disconnected(&self) -> Result<(), QueueClosed> {
        self.send(SessionEvent::DisconnectionDetected)
    }
}

/// One client session: transition engine, timer supervision and the inbound
/// queue.
#[derive(Debug)]
pub struct ClientSession {
    engine: TransitionEngine,
    queue_tx: mpsc::UnboundedSender<SessionEvent>,
    queue_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl ClientSession {
    /// Start a session in `Unconnected`.
    pub fn new(config: SessionConfig) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Self {
            engine: TransitionEngine::new(config),
            queue_tx,
            queue_rx,
        }
    }

    /// Get a handle for queueing events from another context.
    pub fn event_sender(&self) -> EventSender {
        EventSender {
            tx: self.queue_tx.clone(),
        }
    }

    /// Process one event now.
    pub fn submit(&mut self, event: SessionEvent) -> Result<Vec<Effect>, SubmitError> {
        self.submit_at(event, Utc::now())
    }

    /// Process one event as of `now`.
    ///
    /// Fails only if the session already reached `GameEnded` or
    /// `Disconnected`; the state is left untouched in that case.
    pub fn submit_at(
        &mut self,
        event: SessionEvent,
        now: DateTime<Utc>,
    ) -> Result<Vec<Effect>, SubmitError> {
        let phase = self.phase();
        if phase.is_terminal() {
            tracing::debug!(%phase, event = event.kind(), "rejecting event for closed session");
            return Err(SubmitError::SessionClosed { phase });
        }
        Ok(self.engine.step(event, now))
    }

    /// Process everything queued so far.
    pub fn drain(&mut self) -> Result<Vec<Effect>, SubmitError> {
        self.drain_at(Utc::now())
    }

    /// Process queued events in order. Events still queued when the session
    /// closes are discarded.
    pub fn drain_at(&mut self, now: DateTime<Utc>) -> Result<Vec<Effect>, SubmitError> {
        let mut effects = Vec::new();
        let mut processed = 0usize;

        while let Ok(event) = self.queue_rx.try_recv() {
            match self.submit_at(event, now) {
                Ok(more) => {
                    effects.extend(more);
                    processed += 1;
                }
                Err(err) => {
                    let discarded = 1 + self.discard_queued();
                    tracing::warn!(discarded, "session closed with events still queued");
                    if processed == 0 {
                        return Err(err);
                    }
                    break;
                }
            }
        }

        Ok(effects)
    }

    /// Fire every timer whose deadline passed, earliest first.
    pub fn tick(&mut self) -> Result<Vec<Effect>, SubmitError> {
        self.tick_at(Utc::now())
    }

    /// Fire every timer whose deadline is at or before `now`.
    pub fn tick_at(&mut self, now: DateTime<Utc>) -> Result<Vec<Effect>, SubmitError> {
        let mut effects = Vec::new();
        for timer in self.state().armed_timers().expired(now) {
            if self.phase().is_terminal() {
                break;
            }
            effects.extend(self.submit_at(SessionEvent::LocalTimeoutFired(timer), now)?);
        }
        Ok(effects)
    }

    /// Earliest deadline the timer service should wake us for.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.state().armed_timers().next_deadline()
    }

    /// Hand the simulation's checksum for a turn to the session.
    pub fn set_local_checksum(
        &mut self,
        turn_number: u32,
        checksum: u32,
    ) -> Result<Vec<Effect>, SubmitError> {
        self.submit(SessionEvent::LocalChecksumComputed {
            turn_number,
            checksum,
        })
    }

    /// Throw away the session state for a fresh connection attempt. Only the
    /// config survives; queued events from the old connection are dropped.
    pub fn reset(&mut self) {
        let dropped = self.discard_queued();
        if dropped > 0 {
            tracing::debug!(dropped, "dropped queued events on reset");
        }
        tracing::info!(phase = %self.phase(), "resetting session");
        self.engine.reset();
    }

    fn discard_queued(&mut self) -> usize {
        let mut count = 0;
        while self.queue_rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    // Query surface

    pub fn state(&self) -> &SessionState {
        self.engine.state()
    }

    pub fn config(&self) -> &SessionConfig {
        self.engine.config()
    }

    /// Get the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.state().phase()
    }

    /// Get the current roster.
    pub fn players(&self) -> &PlayerRoster {
        self.state().players()
    }

    /// Get the current turn number.
    pub fn turn_number(&self) -> u32 {
        self.state().turn_number()
    }

    /// Get the last desync warning, if any.
    pub fn desync_warning(&self) -> Option<&DesyncWarning> {
        self.state().desync_warning()
    }

    /// Check if the session reached a terminal phase.
    pub fn is_closed(&self) -> bool {
        self.phase().is_terminal()
    }
}
