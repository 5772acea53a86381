//! Transition engine.
//!
//! [`transition`] is a pure function from (state, event) to (state, effects).
//! It never blocks, never performs I/O and never panics on an unexpected
//! event: anything the current phase does not accept becomes a no-op plus a
//! [`Notification::ProtocolViolation`] (or [`Notification::EditRejected`] for
//! local user actions).
//!
//! Phase rules in short:
//!
//! - disconnection is accepted everywhere and always ends in `Disconnected`
//!   with no armed timers
//! - a fatal server error disconnects from any non-terminal phase
//! - each handshake phase owns one timer, cancelled when the phase is left
//! - turn numbers only move forward; a skipped turn is accepted and flagged
//! - desync and turn forfeits are flags plus notifications, never phases

use chrono::{DateTime, Utc};

use super::config::SessionConfig;
use super::effect::{DisconnectReason, Effect, Notification, OutboundMessage};
use super::event::{
    AuthChallenge, ChatHistory, ChatMessage, ChecksumReport, DiplomacyChange,
    DiplomaticStatusUpdate, GameEnded, GameStarted, GenericError, HostAccepted, HostId,
    JoinAccepted, PlayerEntry, PlayerId, PlayerInfoUpdate, PlayerStatusChanged, SaveCompleted,
    SessionEvent, TurnProgress, TurnProgressStatus, TurnRevoked, TurnTimeoutNotice, TurnUpdate,
};
use super::lobby::{ChatChannel, LobbySnapshot};
use super::phase::SessionPhase;
use super::player::PlayerStatus;
use super::session::{pair_key, DesyncWarning, SessionState, TurnGap};
use super::timer::{TimerId, TimerKind};

/// Inputs a transition needs besides state and event.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub now: DateTime<Utc>,
    pub config: &'a SessionConfig,
}

/// Result of one transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: SessionState,
    pub effects: Vec<Effect>,
}

/// Compute the next state and the effects of `event`.
pub fn transition(
    state: SessionState,
    event: SessionEvent,
    ctx: &TransitionContext<'_>,
) -> Transition {
    tracing::debug!(phase = %state.phase, event = event.kind(), "processing session event");

    let mut step = Step {
        state,
        ctx,
        effects: Vec::new(),
    };
    step.apply(event);

    Transition {
        state: step.state,
        effects: step.effects,
    }
}

struct Step<'a, 'c> {
    state: SessionState,
    ctx: &'a TransitionContext<'c>,
    effects: Vec<Effect>,
}

impl Step<'_, '_> {
    fn apply(&mut self, event: SessionEvent) {
        use SessionEvent as E;

        if let E::DisconnectionDetected = event {
            self.on_disconnection();
            return;
        }

        if self.state.phase.is_terminal() {
            self.violation(event.kind());
            return;
        }

        match event {
            E::HostId(msg) => self.on_host_id(msg),
            E::HostMpAccepted(msg) => self.on_host_accepted(msg, false),
            E::HostSpAccepted(msg) => self.on_host_accepted(msg, true),
            E::JoinAccepted(msg) => self.on_join_accepted(msg),
            E::JoinRejected(msg) => {
                self.on_handshake_refused(DisconnectReason::JoinRejected(msg.reason), "join_rejected")
            }
            E::AuthChallenge(msg) => self.on_auth_challenge(msg),
            E::AuthAccepted => self.on_auth_accepted(),
            E::AuthRejected(msg) => {
                self.on_handshake_refused(DisconnectReason::AuthRejected(msg.reason), "auth_rejected")
            }
            E::LobbyUpdate(snapshot) => self.on_lobby_update(snapshot),
            E::LobbyChat(msg) => self.on_chat(ChatChannel::Lobby, msg, "lobby_chat"),
            E::SaveCompleted(msg) => self.on_save_completed(msg),
            E::GameStarted(msg) => self.on_game_started(msg),
            E::TurnUpdate(msg) => self.on_turn_update(msg),
            E::TurnPartialUpdate(_) => self.on_turn_partial_update(),
            E::TurnProgress(msg) => self.on_turn_progress(msg),
            E::TurnRevoked(msg) => self.on_turn_revoked(msg),
            E::PlayerStatusChanged(msg) => self.on_player_status(msg),
            E::PlayerChat(msg) => self.on_chat(ChatChannel::Game, msg, "player_chat"),
            E::DiplomacyChange(msg) => self.on_diplomacy_change(msg),
            E::DiplomaticStatusUpdate(msg) => self.on_diplomatic_status(msg),
            E::GameEnded(msg) => self.on_game_ended(msg),
            E::ChecksumReport(msg) => self.on_checksum_report(msg),
            E::ChatHistory(msg) => self.on_chat_history(msg),
            E::TurnTimeoutNotice(msg) => self.on_turn_timeout_notice(msg),
            E::PlayerInfoUpdate(msg) => self.on_player_info(msg),
            E::GenericError(msg) => self.on_generic_error(msg),
            E::ConnectRequested => self.on_connect_requested(),
            E::AuthResponseReady { password } => self.on_auth_response_ready(password),
            E::TurnSubmitted { orders } => self.on_turn_submitted(orders),
            E::TurnRevokeRequested => self.on_turn_revoke_requested(),
            E::ChatSubmitted { recipients, text } => self.on_chat_submitted(recipients, text),
            E::LobbyEditRequested { config } => self.on_lobby_edit(config),
            E::DiplomacySubmitted(msg) => self.on_diplomacy_submitted(msg),
            E::LocalChecksumComputed {
                turn_number,
                checksum,
            } => self.on_local_checksum(ChecksumReport {
                turn_number,
                checksum,
            }),
            E::LocalTimeoutFired(timer) => self.on_timeout(timer),
            E::DisconnectionDetected => self.on_disconnection(),
        }
    }

    // Effect helpers

    fn enter(&mut self, to: SessionPhase) {
        let from = self.state.phase;
        if from == to {
            return;
        }
        self.state.phase = to;
        tracing::info!(%from, %to, turn = self.state.turn_number, "session phase changed");
        self.notify(Notification::PhaseChanged {
            from,
            to,
            turn_number: self.state.turn_number,
        });
    }

    fn notify(&mut self, notification: Notification) {
        self.effects.push(Effect::Notify(notification));
    }

    fn send(&mut self, message: OutboundMessage) {
        self.effects.push(Effect::Send(message));
    }

    fn arm(&mut self, kind: TimerKind, after: std::time::Duration) {
        let effect = self.state.armed_timers.arm_after(kind, self.ctx.now, after);
        self.effects.push(effect);
    }

    fn cancel(&mut self, kind: TimerKind) {
        if let Some(effect) = self.state.armed_timers.cancel(kind) {
            self.effects.push(effect);
        }
    }

    fn arm_turn_timer(&mut self) {
        match self.ctx.config.turn_timeout() {
            Some(after) => self.arm(TimerKind::Turn, after),
            None => self.cancel(TimerKind::Turn),
        }
    }

    fn violation(&mut self, event: &'static str) {
        let phase = self.state.phase;
        tracing::warn!(%phase, event, "event not accepted in this phase; ignoring");
        self.notify(Notification::ProtocolViolation { phase, event });
    }

    fn reject_edit(&mut self, action: &'static str) {
        let phase = self.state.phase;
        tracing::debug!(%phase, action, "local action rejected");
        self.notify(Notification::EditRejected { phase, action });
    }

    fn disconnect(&mut self, reason: DisconnectReason) {
        tracing::warn!(phase = %self.state.phase, ?reason, "session disconnected");
        let cancels = self.state.armed_timers.cancel_all();
        self.effects.extend(cancels);
        self.state.disconnect_reason = Some(reason.clone());
        self.enter(SessionPhase::Disconnected);
        self.notify(Notification::Disconnected(reason));
    }

    fn request_join(&mut self) {
        self.state.join_attempts += 1;
        self.state.join_outstanding = true;
        self.enter(SessionPhase::JoiningGame);
        self.send(OutboundMessage::JoinGame {
            player_name: self.ctx.config.player_name.clone(),
            client_type: self.ctx.config.client_type,
        });
        self.arm(TimerKind::JoinResponse, self.ctx.config.join_timeout());
    }

    fn reset_turn_flags(&mut self) {
        self.state.turn_submitted = false;
        self.state.turn_forfeited = false;
        self.state.pending_checksum = None;
        self.state.local_checksum = None;
    }

    // Transport and handshake

    fn on_disconnection(&mut self) {
        if self.state.phase == SessionPhase::Disconnected {
            let cancels = self.state.armed_timers.cancel_all();
            self.effects.extend(cancels);
            return;
        }
        self.disconnect(DisconnectReason::ConnectionLost);
    }

    fn on_connect_requested(&mut self) {
        if self.state.phase != SessionPhase::Unconnected {
            self.reject_edit("connect");
            return;
        }
        self.enter(SessionPhase::Connecting);
        self.arm(TimerKind::Connect, self.ctx.config.connect_timeout());
    }

    fn on_host_id(&mut self, msg: HostId) {
        use SessionPhase as P;

        let host = msg.host_player_id;
        match self.state.phase {
            P::Unconnected | P::Connecting => {
                self.state.players.set_host(host);
                self.cancel(TimerKind::Connect);
                if self.ctx.config.expect_auth {
                    self.enter(P::Authenticating);
                    self.arm(TimerKind::Auth, self.ctx.config.auth_timeout());
                } else {
                    self.request_join();
                }
            }
            P::Authenticating | P::JoiningGame => {
                tracing::debug!(host, "host id repeated during handshake");
                self.state.players.set_host(host);
            }
            P::InLobby | P::AwaitingGameStart | P::PlayingTurn | P::TurnLocked => {
                if self.state.players.host_id() != Some(host) {
                    tracing::info!(host, "host migrated");
                    self.state.players.set_host(host);
                    self.notify(Notification::HostChanged { host_id: host });
                }
            }
            P::GameEnded | P::Disconnected => self.violation("host_id"),
        }
    }

    fn on_auth_challenge(&mut self, msg: AuthChallenge) {
        use SessionPhase as P;

        match self.state.phase {
            P::Unconnected | P::Connecting | P::JoiningGame | P::Authenticating => {
                self.cancel(TimerKind::Connect);
                self.cancel(TimerKind::JoinResponse);
                self.enter(P::Authenticating);
                self.arm(TimerKind::Auth, self.ctx.config.auth_timeout());
                self.notify(Notification::AuthRequested {
                    player_name: msg.player_name,
                });
            }
            _ => self.violation("auth_challenge"),
        }
    }

    fn on_auth_response_ready(&mut self, password: String) {
        if self.state.phase != SessionPhase::Authenticating {
            self.reject_edit("auth_response");
            return;
        }
        self.send(OutboundMessage::AuthResponse {
            player_name: self.ctx.config.player_name.clone(),
            password,
        });
    }

    fn on_auth_accepted(&mut self) {
        if self.state.phase != SessionPhase::Authenticating {
            self.violation("auth_accepted");
            return;
        }
        self.cancel(TimerKind::Auth);
        if self.state.join_outstanding {
            // the join sent before the challenge is still pending server-side
            self.enter(SessionPhase::JoiningGame);
            self.arm(TimerKind::JoinResponse, self.ctx.config.join_timeout());
        } else {
            self.request_join();
        }
    }

    fn on_handshake_refused(&mut self, reason: DisconnectReason, event: &'static str) {
        if self.state.phase.is_handshaking() {
            self.disconnect(reason);
        } else {
            self.violation(event);
        }
    }

    fn on_join_accepted(&mut self, msg: JoinAccepted) {
        use SessionPhase as P;

        if !matches!(self.state.phase, P::Authenticating | P::JoiningGame) {
            self.violation("join_accepted");
            return;
        }
        self.cancel(TimerKind::Auth);
        self.cancel(TimerKind::JoinResponse);
        self.state.join_outstanding = false;

        let host = self.state.players.host_id();
        self.state.players.replace_all(&msg.players, host);
        self.state.local_player_id = Some(msg.player_id);

        self.enter(P::InLobby);
        self.notify(Notification::RosterChanged);
    }

    fn on_host_accepted(&mut self, msg: HostAccepted, single_player: bool) {
        use SessionPhase as P;

        let event = if single_player {
            "host_sp_accepted"
        } else {
            "host_mp_accepted"
        };
        if !matches!(
            self.state.phase,
            P::Unconnected | P::Connecting | P::JoiningGame
        ) {
            self.violation(event);
            return;
        }
        self.cancel(TimerKind::Connect);
        self.cancel(TimerKind::JoinResponse);
        self.state.join_outstanding = false;

        let host = msg.host_player_id;
        let mut entry = PlayerEntry::new(host, self.ctx.config.player_name.clone());
        entry.client_type = self.ctx.config.client_type;
        self.state.players.replace_all(&[entry], Some(host));
        self.state.local_player_id = Some(host);
        self.state.single_player = single_player;

        if single_player {
            self.enter(P::AwaitingGameStart);
            self.arm(TimerKind::GameStart, self.ctx.config.game_start_timeout());
        } else {
            self.enter(P::InLobby);
        }
        self.notify(Notification::HostChanged { host_id: host });
        self.notify(Notification::RosterChanged);
    }

    // Lobby

    fn on_lobby_update(&mut self, snapshot: LobbySnapshot) {
        if self.state.phase != SessionPhase::InLobby {
            self.violation("lobby_update");
            return;
        }

        let previous_host = self.state.players.host_id();
        let host = snapshot.host_player_id.or(previous_host);
        self.state.players.replace_all(&snapshot.players, host);
        self.state.lobby_snapshot = Some(snapshot);

        self.notify(Notification::LobbyChanged);
        if let Some(host) = host.filter(|h| previous_host != Some(*h)) {
            self.notify(Notification::HostChanged { host_id: host });
        }
    }

    fn on_lobby_edit(&mut self, config: serde_json::Value) {
        if self.state.phase != SessionPhase::InLobby {
            self.reject_edit("lobby_edit");
            return;
        }
        self.send(OutboundMessage::LobbyUpdate { config });
    }

    fn on_chat(&mut self, channel: ChatChannel, msg: ChatMessage, event: &'static str) {
        if !self.state.phase.is_joined() {
            self.violation(event);
            return;
        }
        self.state.chat.push(channel, msg);
        self.notify(Notification::ChatReceived { channel, count: 1 });
    }

    fn on_chat_history(&mut self, msg: ChatHistory) {
        if !self.state.phase.is_joined() {
            self.violation("chat_history");
            return;
        }
        let count = msg.messages.len();
        for line in msg.messages {
            self.state.chat.push(ChatChannel::History, line);
        }
        self.notify(Notification::ChatReceived {
            channel: ChatChannel::History,
            count,
        });
    }

    fn on_chat_submitted(&mut self, recipients: Vec<PlayerId>, text: String) {
        if !self.state.phase.is_joined() {
            self.reject_edit("chat");
            return;
        }
        self.send(OutboundMessage::PlayerChat { recipients, text });
    }

    fn on_player_status(&mut self, msg: PlayerStatusChanged) {
        if !self.state.phase.is_joined() {
            self.violation("player_status_changed");
            return;
        }
        match self.state.players.set_status(msg.player_id, msg.status) {
            Ok(()) => self.notify(Notification::PlayerStatusChanged {
                player_id: msg.player_id,
                status: msg.status,
            }),
            Err(err) => {
                tracing::warn!(%err, "status for a player not in the roster");
                self.violation("player_status_changed");
            }
        }
    }

    fn on_player_info(&mut self, msg: PlayerInfoUpdate) {
        if !self.state.phase.is_joined() {
            self.violation("player_info_update");
            return;
        }
        if self
            .state
            .players
            .update_info(msg.player_id, &msg.name, msg.client_type)
            .is_err()
        {
            let mut entry = PlayerEntry::new(msg.player_id, msg.name);
            entry.client_type = msg.client_type;
            self.state.players.upsert(&entry);
        }
        self.notify(Notification::RosterChanged);
    }

    fn on_save_completed(&mut self, msg: SaveCompleted) {
        use SessionPhase as P;

        match self.state.phase {
            P::InLobby => {
                self.enter(P::AwaitingGameStart);
                self.arm(TimerKind::GameStart, self.ctx.config.game_start_timeout());
            }
            P::PlayingTurn | P::TurnLocked => {}
            _ => {
                self.violation("save_completed");
                return;
            }
        }
        self.notify(Notification::SaveCompleted {
            save_name: msg.save_name,
        });
    }

    // Game and turns

    fn on_game_started(&mut self, msg: GameStarted) {
        use SessionPhase as P;

        if !matches!(
            self.state.phase,
            P::JoiningGame | P::InLobby | P::AwaitingGameStart
        ) {
            self.violation("game_started");
            return;
        }
        self.cancel(TimerKind::JoinResponse);
        self.cancel(TimerKind::GameStart);
        self.state.join_outstanding = false;

        self.state.turn_number = msg.turn_number;
        self.state.single_player = msg.single_player;
        self.state.turn_gap = None;
        self.state.desync_warning = None;
        self.reset_turn_flags();
        if !msg.players.is_empty() {
            let host = self.state.players.host_id();
            self.state.players.replace_all(&msg.players, host);
        }
        self.state.players.set_all_status(PlayerStatus::PlayingTurn);

        self.enter(P::PlayingTurn);
        self.notify(Notification::TurnStarted {
            turn_number: msg.turn_number,
        });
        self.arm_turn_timer();
    }

    fn on_turn_update(&mut self, msg: TurnUpdate) {
        if !self.state.phase.is_in_game() {
            self.violation("turn_update");
            return;
        }

        let expected = self.state.turn_number.saturating_add(1);
        if msg.turn_number < expected {
            tracing::warn!(
                current = self.state.turn_number,
                received = msg.turn_number,
                "stale turn update"
            );
            self.violation("turn_update");
            return;
        }

        self.state.turn_gap = (msg.turn_number > expected).then_some(TurnGap {
            expected,
            received: msg.turn_number,
        });
        self.state.turn_number = msg.turn_number;
        self.reset_turn_flags();

        if let Some(gap) = self.state.turn_gap {
            tracing::warn!(
                expected = gap.expected,
                received = gap.received,
                "turn update skipped ahead"
            );
            self.notify(Notification::TurnDiscontinuity(gap));
        }

        self.enter(SessionPhase::PlayingTurn);
        self.notify(Notification::TurnStarted {
            turn_number: msg.turn_number,
        });
        self.arm_turn_timer();
    }

    fn on_turn_partial_update(&mut self) {
        if !self.state.phase.is_in_game() {
            self.violation("turn_partial_update");
            return;
        }
        self.notify(Notification::TurnPartialUpdate);
    }

    fn on_turn_progress(&mut self, msg: TurnProgress) {
        if !self.state.phase.is_in_game() {
            self.violation("turn_progress");
            return;
        }

        let acknowledged = msg.status == TurnProgressStatus::OrdersReceived
            && self.state.phase == SessionPhase::PlayingTurn
            && self.state.turn_submitted;
        if acknowledged {
            self.enter(SessionPhase::TurnLocked);
            self.notify(Notification::TurnLocked {
                turn_number: self.state.turn_number,
            });
        } else {
            self.notify(Notification::TurnProgress(msg.status));
        }
    }

    fn on_turn_revoked(&mut self, msg: TurnRevoked) {
        if !self.state.phase.is_in_game() || msg.turn_number != self.state.turn_number {
            self.violation("turn_revoked");
            return;
        }
        self.state.turn_submitted = false;
        self.enter(SessionPhase::PlayingTurn);
        self.notify(Notification::TurnRevoked {
            turn_number: self.state.turn_number,
        });
    }

    fn on_turn_submitted(&mut self, orders: serde_json::Value) {
        if !self.state.can_edit_turn() {
            self.reject_edit("submit_turn");
            return;
        }
        self.state.turn_submitted = true;
        self.send(OutboundMessage::TurnOrders {
            turn_number: self.state.turn_number,
            orders,
        });
        self.notify(Notification::TurnSubmitted {
            turn_number: self.state.turn_number,
        });
    }

    fn on_turn_revoke_requested(&mut self) {
        let revocable = self.state.phase == SessionPhase::TurnLocked
            || (self.state.phase == SessionPhase::PlayingTurn && self.state.turn_submitted);
        if !revocable {
            self.reject_edit("revoke_turn");
            return;
        }
        self.send(OutboundMessage::RevokeOrders {
            turn_number: self.state.turn_number,
        });
    }

    fn on_turn_timeout_notice(&mut self, msg: TurnTimeoutNotice) {
        if !self.state.phase.is_in_game() {
            self.violation("turn_timeout_notice");
            return;
        }
        let after = std::time::Duration::from_secs(msg.remaining_secs);
        self.arm(TimerKind::Turn, after);
        if let Some(deadline) = self.state.armed_timers.deadline(TimerKind::Turn) {
            self.notify(Notification::TurnDeadline { deadline });
        }
    }

    fn on_diplomacy_change(&mut self, msg: DiplomacyChange) {
        if !self.state.phase.is_in_game() {
            self.violation("diplomacy_change");
            return;
        }
        self.notify(Notification::DiplomacyProposal(msg));
    }

    fn on_diplomatic_status(&mut self, msg: DiplomaticStatusUpdate) {
        if !self.state.phase.is_in_game() {
            self.violation("diplomatic_status_update");
            return;
        }
        self.state
            .diplomatic_statuses
            .insert(pair_key(msg.empire1, msg.empire2), msg.status);
        self.notify(Notification::DiplomaticStatusChanged(msg));
    }

    fn on_diplomacy_submitted(&mut self, msg: DiplomacyChange) {
        if !self.state.phase.is_in_game() {
            self.reject_edit("diplomacy");
            return;
        }
        self.send(OutboundMessage::Diplomacy(msg));
    }

    fn on_game_ended(&mut self, msg: GameEnded) {
        if !self.state.phase.is_joined() {
            self.violation("game_ended");
            return;
        }
        let cancels = self.state.armed_timers.cancel_all();
        self.effects.extend(cancels);
        self.state.end_reason = Some(msg.reason);
        self.state.final_standings = msg.standings;

        self.enter(SessionPhase::GameEnded);
        self.notify(Notification::GameEnded { reason: msg.reason });
    }

    // Checksums

    fn on_checksum_report(&mut self, report: ChecksumReport) {
        if !self.state.phase.is_in_game() {
            self.violation("checksum_report");
            return;
        }
        match self.state.local_checksum.take() {
            Some(local) if local.turn_number == report.turn_number => {
                self.compare_checksums(report, local)
            }
            local => {
                self.state.local_checksum = local;
                self.state.pending_checksum = Some(report);
            }
        }
    }

    fn on_local_checksum(&mut self, local: ChecksumReport) {
        if !self.state.phase.is_in_game() {
            self.violation("local_checksum_computed");
            return;
        }
        match self.state.pending_checksum.take() {
            Some(server) if server.turn_number == local.turn_number => {
                self.compare_checksums(server, local)
            }
            pending => {
                self.state.pending_checksum = pending;
                self.state.local_checksum = Some(local);
            }
        }
    }

    fn compare_checksums(&mut self, server: ChecksumReport, local: ChecksumReport) {
        self.state.pending_checksum = None;
        self.state.local_checksum = None;

        if server.checksum == local.checksum {
            tracing::debug!(turn = server.turn_number, "checksums agree");
            return;
        }

        let warning = DesyncWarning {
            turn_number: server.turn_number,
            server_checksum: server.checksum,
            local_checksum: local.checksum,
        };
        tracing::warn!(
            turn = warning.turn_number,
            server = warning.server_checksum,
            local = warning.local_checksum,
            "checksum mismatch; client may be desynchronized"
        );
        self.state.desync_warning = Some(warning);
        self.notify(Notification::DesyncDetected(warning));
    }

    // Errors and timers

    fn on_generic_error(&mut self, msg: GenericError) {
        let fatal = msg.is_fatal();
        if fatal {
            self.disconnect(DisconnectReason::ServerError(msg.message.clone()));
        } else {
            tracing::debug!(message = %msg.message, "recoverable server error");
        }
        self.notify(Notification::ServerError {
            message: msg.message,
            fatal,
        });
    }

    fn on_timeout(&mut self, timer: TimerId) {
        use SessionPhase as P;

        if !self.state.armed_timers.take_fired(timer) {
            tracing::debug!(%timer, "ignoring timeout for a timer that is no longer armed");
            return;
        }

        match (timer.kind, self.state.phase) {
            (TimerKind::Turn, P::PlayingTurn | P::TurnLocked) => {
                tracing::info!(turn = self.state.turn_number, "turn deadline passed");
                self.state.turn_forfeited = true;
                self.notify(Notification::TurnForfeited {
                    turn_number: self.state.turn_number,
                });
            }
            (TimerKind::JoinResponse, P::JoiningGame) => {
                let sends_allowed = self.ctx.config.join_retries.saturating_add(1);
                if self.state.join_attempts < sends_allowed {
                    self.notify(Notification::JoinRetry {
                        attempt: self.state.join_attempts,
                    });
                    self.request_join();
                } else {
                    self.disconnect(DisconnectReason::Timeout(TimerKind::JoinResponse));
                }
            }
            (TimerKind::Connect, P::Connecting)
            | (TimerKind::Auth, P::Authenticating)
            | (TimerKind::GameStart, P::AwaitingGameStart) => {
                self.disconnect(DisconnectReason::Timeout(timer.kind));
            }
            (kind, phase) => {
                tracing::warn!(%kind, %phase, "timer fired outside its phase");
            }
        }
    }
}

/// Owns the session state and feeds events through [`transition`].
#[derive(Debug, Clone)]
pub struct TransitionEngine {
    state: SessionState,
    config: SessionConfig,
}

impl TransitionEngine {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            state: SessionState::new(config.chat_history_limit),
            config,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Apply one event at time `now`.
    pub fn step(&mut self, event: SessionEvent, now: DateTime<Utc>) -> Vec<Effect> {
        let state = std::mem::take(&mut self.state);
        let ctx = TransitionContext {
            now,
            config: &self.config,
        };
        let Transition { state, effects } = transition(state, event, &ctx);
        self.state = state;
        effects
    }

    /// Drop all state and start over in `Unconnected`.
    pub fn reset(&mut self) {
        self.state = SessionState::new(self.config.chat_history_limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::event::{
        AuthRejected, DiplomacyKind, DiplomaticStatus, GameEndReason, JoinRejected, Standing,
        TurnPartialUpdate,
    };
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn config() -> SessionConfig {
        SessionConfig::new("Alice")
    }

    fn run(state: SessionState, event: SessionEvent, config: &SessionConfig) -> Transition {
        transition(state, event, &TransitionContext { now: t0(), config })
    }

    fn state_in(phase: SessionPhase, turn: u32) -> SessionState {
        SessionState {
            phase,
            turn_number: turn,
            ..SessionState::default()
        }
    }

    fn chat(text: &str) -> ChatMessage {
        ChatMessage {
            sender: Some(2),
            sender_name: "Bob".to_string(),
            text: text.to_string(),
            sent_at: t0(),
        }
    }

    fn turn_update(n: u32) -> SessionEvent {
        SessionEvent::TurnUpdate(TurnUpdate {
            turn_number: n,
            data: serde_json::json!({}),
        })
    }

    fn notifications(effects: &[Effect]) -> Vec<&Notification> {
        effects.iter().filter_map(Effect::as_notification).collect()
    }

    /// One representative of every event variant.
    fn every_event() -> Vec<SessionEvent> {
        vec![
            SessionEvent::HostId(HostId { host_player_id: 1 }),
            SessionEvent::HostMpAccepted(HostAccepted { host_player_id: 1 }),
            SessionEvent::HostSpAccepted(HostAccepted { host_player_id: 1 }),
            SessionEvent::JoinAccepted(JoinAccepted {
                player_id: 2,
                players: vec![PlayerEntry::new(2, "Alice")],
            }),
            SessionEvent::JoinRejected(JoinRejected {
                reason: "full".into(),
            }),
            SessionEvent::AuthChallenge(AuthChallenge {
                player_name: "Alice".into(),
                auth_data: None,
            }),
            SessionEvent::AuthAccepted,
            SessionEvent::AuthRejected(AuthRejected {
                reason: "bad password".into(),
            }),
            SessionEvent::LobbyUpdate(LobbySnapshot::default()),
            SessionEvent::LobbyChat(chat("hi")),
            SessionEvent::SaveCompleted(SaveCompleted {
                save_name: "autosave".into(),
                bytes_written: 10,
            }),
            SessionEvent::GameStarted(GameStarted {
                turn_number: 1,
                single_player: false,
                loaded_game: false,
                players: vec![],
            }),
            turn_update(1),
            SessionEvent::TurnPartialUpdate(TurnPartialUpdate {
                data: serde_json::json!({}),
            }),
            SessionEvent::TurnProgress(TurnProgress {
                status: TurnProgressStatus::ProcessingOrders,
            }),
            SessionEvent::TurnRevoked(TurnRevoked { turn_number: 0 }),
            SessionEvent::PlayerStatusChanged(PlayerStatusChanged {
                player_id: 2,
                status: PlayerStatus::Waiting,
            }),
            SessionEvent::PlayerChat(chat("gg")),
            SessionEvent::DiplomacyChange(DiplomacyChange {
                sender: 2,
                recipient: 3,
                kind: DiplomacyKind::ProposePeace,
            }),
            SessionEvent::DiplomaticStatusUpdate(DiplomaticStatusUpdate {
                empire1: 2,
                empire2: 3,
                status: DiplomaticStatus::Peace,
            }),
            SessionEvent::GameEnded(GameEnded {
                reason: GameEndReason::Victory,
                standings: vec![],
            }),
            SessionEvent::ChecksumReport(ChecksumReport {
                turn_number: 0,
                checksum: 1,
            }),
            SessionEvent::ChatHistory(ChatHistory { messages: vec![] }),
            SessionEvent::TurnTimeoutNotice(TurnTimeoutNotice { remaining_secs: 30 }),
            SessionEvent::PlayerInfoUpdate(PlayerInfoUpdate {
                player_id: 2,
                name: "Al".into(),
                client_type: Default::default(),
            }),
            SessionEvent::GenericError(GenericError::recoverable("oops")),
            SessionEvent::GenericError(GenericError::fatal("version mismatch")),
            SessionEvent::ConnectRequested,
            SessionEvent::AuthResponseReady {
                password: "secret".into(),
            },
            SessionEvent::TurnSubmitted {
                orders: serde_json::json!([]),
            },
            SessionEvent::TurnRevokeRequested,
            SessionEvent::ChatSubmitted {
                recipients: vec![],
                text: "hello".into(),
            },
            SessionEvent::LobbyEditRequested {
                config: serde_json::json!({}),
            },
            SessionEvent::DiplomacySubmitted(DiplomacyChange {
                sender: 2,
                recipient: 3,
                kind: DiplomacyKind::ProposeWar,
            }),
            SessionEvent::LocalChecksumComputed {
                turn_number: 0,
                checksum: 2,
            },
            SessionEvent::DisconnectionDetected,
            SessionEvent::LocalTimeoutFired(TimerId::new(TimerKind::Turn, 99)),
        ]
    }

    #[test]
    fn test_every_state_event_pair_is_handled() {
        let config = config();
        let mut rejected = 0;

        for phase in SessionPhase::ALL {
            for event in every_event() {
                let kind = event.kind();
                let before = state_in(phase, 3);
                let result = run(before.clone(), event, &config);
                let pair = format!("{} + {}", phase, kind);

                let diagnostics = result
                    .effects
                    .iter()
                    .filter(|e| {
                        matches!(
                            e.as_notification(),
                            Some(Notification::ProtocolViolation { .. })
                                | Some(Notification::EditRejected { .. })
                        )
                    })
                    .count();

                if kind == "local_timeout_fired" && !phase.is_terminal() {
                    // nothing is armed, so every firing is stale
                    assert!(result.effects.is_empty(), "{}", pair);
                    assert_eq!(result.state, before, "{}", pair);
                } else if diagnostics > 0 {
                    rejected += 1;
                    assert_eq!(result.effects.len(), 1, "{}", pair);
                    assert_eq!(result.state, before, "{}", pair);
                } else {
                    assert!(
                        result.state != before
                            || !result.effects.is_empty()
                            || (phase == SessionPhase::Disconnected
                                && kind == "disconnection_detected"),
                        "{} was accepted but did nothing",
                        pair
                    );
                }

                if phase.is_terminal() && kind != "disconnection_detected" {
                    assert_eq!(diagnostics, 1, "{}", pair);
                }
                assert!(result.state.turn_number >= 3 || kind == "game_started");
            }
        }

        assert!(rejected > 0);
    }

    #[test]
    fn test_disconnection_from_any_phase() {
        let config = config().with_turn_timeout(Duration::from_secs(60));
        for phase in SessionPhase::ALL {
            let mut state = state_in(phase, 4);
            state.armed_timers.arm(TimerKind::Turn, t0());
            state.armed_timers.arm(TimerKind::Connect, t0());

            let result = run(state, SessionEvent::DisconnectionDetected, &config);
            assert_eq!(result.state.phase, SessionPhase::Disconnected, "from {}", phase);
            assert!(result.state.armed_timers.is_empty(), "from {}", phase);
            assert!(result
                .effects
                .contains(&Effect::CancelTimer { kind: TimerKind::Turn }));
        }
    }

    #[test]
    fn test_connect_without_auth_goes_to_joining() {
        let config = config();
        let t = run(SessionState::default(), SessionEvent::ConnectRequested, &config);
        assert_eq!(t.state.phase, SessionPhase::Connecting);
        assert!(t.state.armed_timers.is_armed(TimerKind::Connect));

        let t = run(
            t.state,
            SessionEvent::HostId(HostId { host_player_id: 42 }),
            &config,
        );
        assert_eq!(t.state.phase, SessionPhase::JoiningGame);
        assert!(!t.state.armed_timers.is_armed(TimerKind::Connect));
        assert!(t.state.armed_timers.is_armed(TimerKind::JoinResponse));
        assert_eq!(t.state.join_attempts, 1);
        assert_eq!(
            t.effects.iter().filter_map(Effect::as_message).collect::<Vec<_>>(),
            vec![&OutboundMessage::JoinGame {
                player_name: "Alice".to_string(),
                client_type: Default::default(),
            }]
        );
    }

    #[test]
    fn test_auth_handshake_to_lobby() {
        let config = config().with_auth(true);
        let mut state = SessionState::default();

        for event in [
            SessionEvent::HostId(HostId { host_player_id: 42 }),
            SessionEvent::AuthChallenge(AuthChallenge {
                player_name: "Alice".into(),
                auth_data: None,
            }),
        ] {
            state = run(state, event, &config).state;
            assert_eq!(state.phase, SessionPhase::Authenticating);
        }

        let t = run(
            state,
            SessionEvent::AuthResponseReady {
                password: "pw".into(),
            },
            &config,
        );
        assert_eq!(
            t.effects,
            vec![Effect::Send(OutboundMessage::AuthResponse {
                player_name: "Alice".into(),
                password: "pw".into(),
            })]
        );

        let t = run(t.state, SessionEvent::AuthAccepted, &config);
        assert_eq!(t.state.phase, SessionPhase::JoiningGame);
        assert!(!t.state.armed_timers.is_armed(TimerKind::Auth));

        let t = run(
            t.state,
            SessionEvent::JoinAccepted(JoinAccepted {
                player_id: 7,
                players: vec![PlayerEntry::new(7, "Alice"), PlayerEntry::new(42, "Host")],
            }),
            &config,
        );
        assert_eq!(t.state.phase, SessionPhase::InLobby);
        assert_eq!(t.state.players.len(), 2);
        assert!(t.state.players.get(42).unwrap().is_host);
        assert_eq!(t.state.local_player_id, Some(7));
        assert!(t.state.armed_timers.is_empty());
    }

    #[test]
    fn test_auth_detour_keeps_single_join() {
        let config = config();
        let mut state = SessionState::default();
        let mut effects = Vec::new();

        for event in [
            SessionEvent::HostId(HostId { host_player_id: 42 }),
            SessionEvent::AuthChallenge(AuthChallenge {
                player_name: "Alice".into(),
                auth_data: None,
            }),
            SessionEvent::AuthAccepted,
        ] {
            let t = run(state, event, &config);
            state = t.state;
            effects.extend(t.effects);
        }

        let join_sends = effects
            .iter()
            .filter(|e| matches!(e.as_message(), Some(OutboundMessage::JoinGame { .. })))
            .count();
        assert_eq!(join_sends, 1);
        assert_eq!(state.join_attempts, 1);
        assert_eq!(state.phase, SessionPhase::JoiningGame);
        assert!(state.armed_timers.is_armed(TimerKind::JoinResponse));
        assert!(!state.armed_timers.is_armed(TimerKind::Auth));
    }

    #[test]
    fn test_join_accepted_keeps_unlisted_host() {
        let config = config();
        let mut state = SessionState::default();
        for event in [
            SessionEvent::HostId(HostId { host_player_id: 42 }),
            SessionEvent::JoinAccepted(JoinAccepted {
                player_id: 7,
                players: vec![PlayerEntry::new(7, "Alice")],
            }),
            SessionEvent::PlayerInfoUpdate(PlayerInfoUpdate {
                player_id: 42,
                name: "Host".into(),
                client_type: Default::default(),
            }),
        ] {
            state = run(state, event, &config).state;
        }

        assert_eq!(state.players.host_id(), Some(42));
        assert!(state.players.get(42).unwrap().is_host);
        assert!(!state.players.get(7).unwrap().is_host);
    }

    #[test]
    fn test_host_mp_accepted_enters_lobby_as_host() {
        let config = config();
        let t = run(
            SessionState::default(),
            SessionEvent::ConnectRequested,
            &config,
        );
        let t = run(
            t.state,
            SessionEvent::HostMpAccepted(HostAccepted { host_player_id: 3 }),
            &config,
        );

        assert_eq!(t.state.phase, SessionPhase::InLobby);
        assert_eq!(t.state.local_player_id, Some(3));
        assert!(t.state.is_local_host());
        assert_eq!(t.state.players.get(3).unwrap().name, "Alice");
        assert!(!t.state.single_player);
        assert!(t.state.armed_timers.is_empty());
        assert!(t.effects.iter().all(|e| e.as_message().is_none()));
    }

    #[test]
    fn test_host_sp_accepted_awaits_start() {
        let config = config();
        let t = run(
            state_in(SessionPhase::Connecting, 0),
            SessionEvent::HostSpAccepted(HostAccepted { host_player_id: 1 }),
            &config,
        );
        assert_eq!(t.state.phase, SessionPhase::AwaitingGameStart);
        assert!(t.state.single_player);
        assert!(t.state.is_local_host());
        assert!(t.state.armed_timers.is_armed(TimerKind::GameStart));

        let t = run(
            t.state,
            SessionEvent::GameStarted(GameStarted {
                turn_number: 1,
                single_player: true,
                loaded_game: false,
                players: vec![],
            }),
            &config,
        );
        assert_eq!(t.state.phase, SessionPhase::PlayingTurn);
        assert!(t.state.armed_timers.is_empty());
    }

    #[test]
    fn test_host_ack_in_lobby_is_violation() {
        let config = config();
        let state = state_in(SessionPhase::InLobby, 0);
        let t = run(
            state.clone(),
            SessionEvent::HostMpAccepted(HostAccepted { host_player_id: 5 }),
            &config,
        );
        assert_eq!(t.state, state);
        assert_eq!(
            notifications(&t.effects),
            vec![&Notification::ProtocolViolation {
                phase: SessionPhase::InLobby,
                event: "host_mp_accepted",
            }]
        );
    }

    #[test]
    fn test_auth_rejected_disconnects() {
        let config = config();
        let t = run(
            state_in(SessionPhase::Authenticating, 0),
            SessionEvent::AuthRejected(AuthRejected {
                reason: "bad password".into(),
            }),
            &config,
        );
        assert_eq!(t.state.phase, SessionPhase::Disconnected);
        assert_eq!(
            t.state.disconnect_reason,
            Some(DisconnectReason::AuthRejected("bad password".into()))
        );
    }

    #[test]
    fn test_lobby_update_replaces_snapshot_and_migrates_host() {
        let config = config();
        let mut state = state_in(SessionPhase::InLobby, 0);
        state.players.set_host(1);

        let first = LobbySnapshot::new(
            serde_json::json!({"seed": 1}),
            vec![PlayerEntry::new(1, "Alice"), PlayerEntry::new(2, "Bob")],
        );
        let t = run(state, SessionEvent::LobbyUpdate(first), &config);
        assert!(t.state.players.get(1).unwrap().is_host);
        assert_eq!(notifications(&t.effects), vec![&Notification::LobbyChanged]);

        let second = LobbySnapshot::new(
            serde_json::json!({"seed": 2}),
            vec![PlayerEntry::new(2, "Bob")],
        )
        .with_host(2);
        let t = run(t.state, SessionEvent::LobbyUpdate(second.clone()), &config);

        assert_eq!(t.state.phase, SessionPhase::InLobby);
        assert_eq!(t.state.lobby_snapshot.as_ref(), Some(&second));
        assert_eq!(t.state.players.len(), 1);
        assert!(t.state.players.is_host(2));
        assert_eq!(
            notifications(&t.effects),
            vec![
                &Notification::LobbyChanged,
                &Notification::HostChanged { host_id: 2 }
            ]
        );
    }

    #[test]
    fn test_lobby_frozen_while_awaiting_start() {
        let config = config();
        let t = run(
            state_in(SessionPhase::InLobby, 0),
            SessionEvent::SaveCompleted(SaveCompleted {
                save_name: "mp_load".into(),
                bytes_written: 100,
            }),
            &config,
        );
        assert_eq!(t.state.phase, SessionPhase::AwaitingGameStart);
        assert!(t.state.armed_timers.is_armed(TimerKind::GameStart));

        let before = t.state.clone();
        let t = run(
            t.state,
            SessionEvent::LobbyUpdate(LobbySnapshot::default()),
            &config,
        );
        assert_eq!(t.state, before);
        assert_eq!(
            notifications(&t.effects),
            vec![&Notification::ProtocolViolation {
                phase: SessionPhase::AwaitingGameStart,
                event: "lobby_update",
            }]
        );

        let t = run(
            t.state,
            SessionEvent::LobbyEditRequested {
                config: serde_json::json!({}),
            },
            &config,
        );
        assert!(t.effects.iter().all(|e| e.as_message().is_none()));
    }

    #[test]
    fn test_game_start_resets_turn_number() {
        let config = config().with_turn_timeout(Duration::from_secs(120));
        let mut state = state_in(SessionPhase::AwaitingGameStart, 0);
        state.armed_timers.arm(TimerKind::GameStart, t0());

        let t = run(
            state,
            SessionEvent::GameStarted(GameStarted {
                turn_number: 12,
                single_player: false,
                loaded_game: true,
                players: vec![PlayerEntry::new(1, "Alice")],
            }),
            &config,
        );
        assert_eq!(t.state.phase, SessionPhase::PlayingTurn);
        assert_eq!(t.state.turn_number, 12);
        assert!(!t.state.armed_timers.is_armed(TimerKind::GameStart));
        assert_eq!(
            t.state.armed_timers.deadline(TimerKind::Turn),
            Some(t0() + chrono::Duration::seconds(120))
        );
    }

    #[test]
    fn test_turn_update_sequential_and_gap() {
        let config = config();

        let t = run(state_in(SessionPhase::PlayingTurn, 4), turn_update(5), &config);
        assert_eq!(t.state.turn_number, 5);
        assert_eq!(t.state.turn_gap, None);

        let t = run(t.state, turn_update(7), &config);
        assert_eq!(t.state.turn_number, 7);
        assert_eq!(
            t.state.turn_gap,
            Some(TurnGap {
                expected: 6,
                received: 7
            })
        );
        assert!(notifications(&t.effects).contains(&&Notification::TurnDiscontinuity(TurnGap {
            expected: 6,
            received: 7
        })));
    }

    #[test]
    fn test_stale_turn_update_ignored() {
        let config = config();
        let state = state_in(SessionPhase::PlayingTurn, 5);
        let t = run(state.clone(), turn_update(5), &config);
        assert_eq!(t.state, state);
        assert_eq!(
            notifications(&t.effects),
            vec![&Notification::ProtocolViolation {
                phase: SessionPhase::PlayingTurn,
                event: "turn_update",
            }]
        );
    }

    #[test]
    fn test_turn_update_in_lobby_is_violation() {
        let config = config();
        let state = state_in(SessionPhase::InLobby, 0);
        let t = run(state.clone(), turn_update(1), &config);
        assert_eq!(t.state, state);
        assert_eq!(t.effects.len(), 1);
    }

    #[test]
    fn test_submit_lock_and_unlock() {
        let config = config();
        let state = state_in(SessionPhase::PlayingTurn, 5);

        let t = run(
            state,
            SessionEvent::TurnSubmitted {
                orders: serde_json::json!(["build"]),
            },
            &config,
        );
        assert!(t.state.turn_submitted);
        assert_eq!(
            t.effects[0],
            Effect::Send(OutboundMessage::TurnOrders {
                turn_number: 5,
                orders: serde_json::json!(["build"]),
            })
        );

        // double submission before the server acknowledged
        let t = run(
            t.state,
            SessionEvent::TurnSubmitted {
                orders: serde_json::json!([]),
            },
            &config,
        );
        assert!(t.effects.iter().all(|e| e.as_message().is_none()));

        let t = run(
            t.state,
            SessionEvent::TurnProgress(TurnProgress {
                status: TurnProgressStatus::OrdersReceived,
            }),
            &config,
        );
        assert_eq!(t.state.phase, SessionPhase::TurnLocked);

        let t = run(t.state, turn_update(6), &config);
        assert_eq!(t.state.phase, SessionPhase::PlayingTurn);
        assert_eq!(t.state.turn_number, 6);
        assert!(!t.state.turn_submitted);
    }

    #[test]
    fn test_turn_revoked_unlocks() {
        let config = config();
        let mut state = state_in(SessionPhase::TurnLocked, 5);
        state.turn_submitted = true;

        let t = run(
            state,
            SessionEvent::TurnRevoked(TurnRevoked { turn_number: 5 }),
            &config,
        );
        assert_eq!(t.state.phase, SessionPhase::PlayingTurn);
        assert_eq!(t.state.turn_number, 5);
        assert!(t.state.can_edit_turn());
    }

    #[test]
    fn test_revoke_request_only_after_submit() {
        let config = config();
        let t = run(
            state_in(SessionPhase::PlayingTurn, 2),
            SessionEvent::TurnRevokeRequested,
            &config,
        );
        assert_eq!(
            notifications(&t.effects),
            vec![&Notification::EditRejected {
                phase: SessionPhase::PlayingTurn,
                action: "revoke_turn",
            }]
        );

        let t = run(
            state_in(SessionPhase::TurnLocked, 2),
            SessionEvent::TurnRevokeRequested,
            &config,
        );
        assert_eq!(
            t.effects,
            vec![Effect::Send(OutboundMessage::RevokeOrders { turn_number: 2 })]
        );
    }

    #[test]
    fn test_checksum_deferred_until_local_value() {
        let config = config();
        let t = run(
            state_in(SessionPhase::PlayingTurn, 3),
            SessionEvent::ChecksumReport(ChecksumReport {
                turn_number: 3,
                checksum: 100,
            }),
            &config,
        );
        assert_eq!(
            t.state.pending_checksum,
            Some(ChecksumReport {
                turn_number: 3,
                checksum: 100
            })
        );
        assert!(t.effects.is_empty());

        let t = run(
            t.state,
            SessionEvent::LocalChecksumComputed {
                turn_number: 3,
                checksum: 100,
            },
            &config,
        );
        assert_eq!(t.state.pending_checksum, None);
        assert_eq!(t.state.desync_warning, None);
    }

    #[test]
    fn test_checksum_mismatch_after_local_value() {
        let config = config();
        let t = run(
            state_in(SessionPhase::TurnLocked, 3),
            SessionEvent::LocalChecksumComputed {
                turn_number: 3,
                checksum: 7,
            },
            &config,
        );
        let t = run(
            t.state,
            SessionEvent::ChecksumReport(ChecksumReport {
                turn_number: 3,
                checksum: 8,
            }),
            &config,
        );
        let warning = DesyncWarning {
            turn_number: 3,
            server_checksum: 8,
            local_checksum: 7,
        };
        assert_eq!(t.state.desync_warning, Some(warning));
        assert_eq!(t.state.phase, SessionPhase::TurnLocked);
        assert_eq!(
            notifications(&t.effects),
            vec![&Notification::DesyncDetected(warning)]
        );
    }

    #[test]
    fn test_generic_errors() {
        let config = config();

        let state = state_in(SessionPhase::PlayingTurn, 3);
        let t = run(
            state.clone(),
            SessionEvent::GenericError(GenericError::recoverable("chat not delivered")),
            &config,
        );
        assert_eq!(t.state, state);
        assert_eq!(
            t.effects,
            vec![Effect::Notify(Notification::ServerError {
                message: "chat not delivered".into(),
                fatal: false,
            })]
        );

        let t = run(
            state,
            SessionEvent::GenericError(GenericError::fatal("incompatible version")),
            &config,
        );
        assert_eq!(t.state.phase, SessionPhase::Disconnected);
        assert_eq!(
            t.state.disconnect_reason,
            Some(DisconnectReason::ServerError("incompatible version".into()))
        );
    }

    #[test]
    fn test_turn_timeout_forfeits() {
        let config = config();
        let mut state = state_in(SessionPhase::PlayingTurn, 5);
        let timer = match state.armed_timers.arm(TimerKind::Turn, t0()) {
            Effect::ArmTimer { timer, .. } => timer,
            other => panic!("unexpected effect: {:?}", other),
        };

        let t = run(state, SessionEvent::LocalTimeoutFired(timer), &config);
        assert_eq!(t.state.phase, SessionPhase::PlayingTurn);
        assert!(t.state.turn_forfeited);
        assert!(t.state.armed_timers.is_empty());
        assert_eq!(
            t.effects,
            vec![Effect::Notify(Notification::TurnForfeited { turn_number: 5 })]
        );

        // the same timer firing twice is ignored
        let before = t.state.clone();
        let t = run(t.state, SessionEvent::LocalTimeoutFired(timer), &config);
        assert_eq!(t.state, before);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_turn_timeout_while_locked_keeps_lock() {
        let config = config();
        let mut state = state_in(SessionPhase::TurnLocked, 8);
        state.turn_submitted = true;
        let timer = match state.armed_timers.arm(TimerKind::Turn, t0()) {
            Effect::ArmTimer { timer, .. } => timer,
            other => panic!("unexpected effect: {:?}", other),
        };

        let t = run(state, SessionEvent::LocalTimeoutFired(timer), &config);
        assert_eq!(t.state.phase, SessionPhase::TurnLocked);
        assert!(t.state.turn_forfeited);
        assert!(t.state.turn_submitted);
        assert_eq!(
            t.effects,
            vec![Effect::Notify(Notification::TurnForfeited { turn_number: 8 })]
        );
    }

    #[test]
    fn test_join_timeout_retries_then_disconnects() {
        let config = config().with_join_retries(1);
        let mut state = SessionState::default();
        state = run(
            state,
            SessionEvent::HostId(HostId { host_player_id: 1 }),
            &config,
        )
        .state;

        let timer = state.armed_timers.get(TimerKind::JoinResponse).unwrap().id;
        let t = run(state, SessionEvent::LocalTimeoutFired(timer), &config);
        assert_eq!(t.state.phase, SessionPhase::JoiningGame);
        assert_eq!(t.state.join_attempts, 2);
        assert!(t.effects.iter().any(|e| e.as_message().is_some()));

        let timer = t.state.armed_timers.get(TimerKind::JoinResponse).unwrap().id;
        let t = run(t.state, SessionEvent::LocalTimeoutFired(timer), &config);
        assert_eq!(t.state.phase, SessionPhase::Disconnected);
        assert_eq!(
            t.state.disconnect_reason,
            Some(DisconnectReason::Timeout(TimerKind::JoinResponse))
        );
    }

    #[test]
    fn test_server_turn_deadline_rearms() {
        let config = config();
        let t = run(
            state_in(SessionPhase::TurnLocked, 9),
            SessionEvent::TurnTimeoutNotice(TurnTimeoutNotice { remaining_secs: 45 }),
            &config,
        );
        let deadline = t0() + chrono::Duration::seconds(45);
        assert_eq!(t.state.armed_timers.deadline(TimerKind::Turn), Some(deadline));
        assert!(notifications(&t.effects).contains(&&Notification::TurnDeadline { deadline }));
    }

    #[test]
    fn test_game_end_keeps_standings() {
        let config = config();
        let mut state = state_in(SessionPhase::PlayingTurn, 40);
        state.armed_timers.arm(TimerKind::Turn, t0());

        let standings = vec![Standing {
            player_id: 1,
            name: "Alice".into(),
            rank: 1,
            eliminated: false,
        }];
        let t = run(
            state,
            SessionEvent::GameEnded(GameEnded {
                reason: GameEndReason::Victory,
                standings: standings.clone(),
            }),
            &config,
        );
        assert_eq!(t.state.phase, SessionPhase::GameEnded);
        assert_eq!(t.state.final_standings, standings);
        assert!(t.state.armed_timers.is_empty());
        assert_eq!(t.state.turn_number, 40);
    }

    #[test]
    fn test_chat_and_diplomacy() {
        let config = config();
        let t = run(
            state_in(SessionPhase::PlayingTurn, 1),
            SessionEvent::PlayerChat(chat("hello")),
            &config,
        );
        assert_eq!(t.state.chat.len(), 1);

        let t = run(
            t.state,
            SessionEvent::DiplomaticStatusUpdate(DiplomaticStatusUpdate {
                empire1: 3,
                empire2: 2,
                status: DiplomaticStatus::War,
            }),
            &config,
        );
        assert_eq!(t.state.diplomatic_status(2, 3), Some(DiplomaticStatus::War));

        let t = run(
            state_in(SessionPhase::Connecting, 0),
            SessionEvent::PlayerChat(chat("too early")),
            &config,
        );
        assert!(t.state.chat.is_empty());
    }

    #[test]
    fn test_engine_step_and_reset() {
        let mut engine = TransitionEngine::new(config());
        engine.step(SessionEvent::ConnectRequested, t0());
        assert_eq!(engine.state().phase(), SessionPhase::Connecting);

        engine.reset();
        assert_eq!(engine.state().phase(), SessionPhase::Unconnected);
        assert!(engine.state().armed_timers().is_empty());
        assert_eq!(engine.config().player_name, "Alice");
    }
}
