//! The tick-driven match lifecycle controller.
//!
//! All state mutation happens inside [`MatchLoop::tick`], which the match
//! actor invokes at a fixed rate with the inputs queued since the previous
//! tick. Sequential processing inside one tick is the only synchronization:
//! there are no locks on match state.
//!
//! Failure semantics: encoding or delivery problems are logged and the tick
//! carries on. One player's malformed input never affects the other's turn.

use crate::games::tictactoe::{Board, Mark, apply_move, check_tie, check_win};
use crate::match_state::{MatchState, PlayerSlot};
use crate::messages::{DoneMessage, MatchLabel, MoveMessage, OpCode, StartMessage, UpdateMessage};
use crate::presence::{AI_USER_ID, HumanPresence, MatchData, Presence};
use derive_more::Display;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Fixed invocations of the loop per second.
pub const TICK_RATE: u32 = 5;

const MAX_EMPTY_SEC: u32 = 30;
const DELAY_BETWEEN_GAMES_SEC: u32 = 5;
const TURN_TIME_FAST_SEC: u32 = 10;
const TURN_TIME_NORMAL_SEC: u32 = 20;

/// Why an admission attempt was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RejectReason {
    /// Both slots are taken or reserved.
    #[display("match full")]
    MatchFull,
    /// The identifier already holds a connected slot or a reservation.
    #[display("already joined")]
    AlreadyJoined,
}

/// An event queued for the next tick of the loop.
#[derive(Debug)]
pub enum MatchInput {
    /// A client asks to be admitted. The decision is sent back on `reply`.
    JoinAttempt {
        /// The candidate presence.
        presence: HumanPresence,
        /// Channel the admission decision is delivered on.
        reply: oneshot::Sender<Result<(), RejectReason>>,
    },
    /// The transport finalized an accepted admission.
    Join(HumanPresence),
    /// The participant's socket went away.
    Leave {
        /// Identifier of the departed participant.
        user_id: String,
    },
    /// A raw inbound message.
    Data(MatchData),
}

/// Whether the match continues after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Schedule another tick.
    Continue,
    /// The match is finished with; release its resources.
    Stop,
}

/// Outbound seam of the loop: reliable broadcasts and label republication.
///
/// `targets` is `None` for a broadcast to every connected participant, or a
/// specific recipient list for a unicast. Implementations log delivery
/// failures; they never surface them into the tick.
pub trait Dispatcher {
    /// Sends an encoded message.
    fn broadcast(&mut self, op: OpCode, payload: Option<Vec<u8>>, targets: Option<&[Presence]>);

    /// Republishes the advertised label to the matchmaking index.
    fn update_label(&mut self, label: &MatchLabel);
}

/// The match lifecycle controller. Owns the authoritative state.
pub struct MatchLoop {
    state: MatchState,
    ai_enabled: bool,
}

impl MatchLoop {
    /// Creates the controller for a fresh match.
    pub fn new(fast: bool, ai: bool) -> Self {
        Self {
            state: MatchState::new(fast, ai),
            ai_enabled: ai,
        }
    }

    /// Read access for the actor and tests.
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// True when the virtual player participates in this match.
    pub fn ai_enabled(&self) -> bool {
        self.ai_enabled
    }

    /// Returns the AI's mark when it is the AI's turn to move.
    pub fn ai_to_move(&self) -> Option<Mark> {
        if !self.ai_enabled || !self.state.playing {
            return None;
        }
        match self.state.marks.get(AI_USER_ID) {
            Some(&mark) if mark == self.state.turn => Some(mark),
            _ => None,
        }
    }

    /// Runs one tick: drains `inputs` in arrival order, advances timers, and
    /// emits broadcasts through `dispatcher`. `now` is the current Unix time
    /// used for the absolute deadline fields in outbound messages.
    pub fn tick(
        &mut self,
        now: i64,
        inputs: Vec<MatchInput>,
        dispatcher: &mut dyn Dispatcher,
    ) -> TickOutcome {
        let mut data = Vec::new();
        for input in inputs {
            match input {
                MatchInput::JoinAttempt { presence, reply } => {
                    let decision = self.join_attempt(&presence);
                    // The attempt may have been abandoned; that is fine.
                    let _ = reply.send(decision);
                }
                MatchInput::Join(presence) => self.join(presence, now, dispatcher),
                MatchInput::Leave { user_id } => self.leave(&user_id),
                MatchInput::Data(message) => data.push(message),
            }
        }

        if self.state.connected_humans() == 0 && self.state.joins_in_progress == 0 {
            self.state.empty_ticks += 1;
            if self.state.empty_ticks >= MAX_EMPTY_SEC * TICK_RATE {
                info!("closing idle match");
                return TickOutcome::Stop;
            }
        }

        if !self.state.playing {
            // Inbound game messages are meaningless between rounds.
            if !data.is_empty() {
                debug!(count = data.len(), "dropping messages outside a round");
            }
            self.between_rounds(now, dispatcher);
            return TickOutcome::Continue;
        }

        for message in data {
            self.process_message(now, message, dispatcher);
        }

        self.tick_deadline(now, dispatcher);
        TickOutcome::Continue
    }

    /// Decides admission for a candidate presence.
    ///
    /// A disconnected participant rejoins unconditionally; a connected or
    /// reserved identifier is turned away; otherwise a free slot is reserved
    /// until the transport finalizes the join.
    fn join_attempt(&mut self, presence: &HumanPresence) -> Result<(), RejectReason> {
        let state = &mut self.state;
        if let Some(index) = state.slot_of(&presence.user_id) {
            return match &state.slots[index] {
                PlayerSlot::Disconnected { .. } => {
                    state.joins_in_progress += 1;
                    Ok(())
                }
                _ => Err(RejectReason::AlreadyJoined),
            };
        }

        if state.bound_count() + usize::from(state.joins_in_progress) >= 2 {
            return Err(RejectReason::MatchFull);
        }

        match state.first_empty() {
            Some(index) => {
                state.slots[index] = PlayerSlot::Reserved {
                    user_id: presence.user_id.clone(),
                };
                state.joins_in_progress += 1;
                Ok(())
            }
            None => Err(RejectReason::MatchFull),
        }
    }

    /// Finalizes an accepted admission and catches the peer up on state.
    fn join(&mut self, presence: HumanPresence, now: i64, dispatcher: &mut dyn Dispatcher) {
        let user_id = presence.user_id.clone();
        let index = match self.state.slot_of(&user_id).or(self.state.first_empty()) {
            Some(index) => index,
            None => {
                // The reservation was lost and no slot is free; the transport
                // will observe the dropped connection.
                warn!(user_id = %user_id, "no slot available at join finalize");
                return;
            }
        };

        self.state.empty_ticks = 0;
        self.state.slots[index] = PlayerSlot::Occupied(Presence::Human(presence.clone()));
        self.state.joins_in_progress = self.state.joins_in_progress.saturating_sub(1);
        info!(user_id = %user_id, slot = index, "player joined");

        let target = [Presence::Human(presence)];
        if self.state.playing {
            // Rejoin during a round: catch the peer up with a full update.
            let update = UpdateMessage {
                board: self.state.board.clone(),
                mark: self.state.turn,
                deadline: self.deadline_unix(now),
            };
            self.send(dispatcher, OpCode::Update, &update, Some(&target));
        } else if self.state.marks.contains_key(&user_id) {
            // No round in progress but the peer was part of the last one;
            // they likely forfeited by staying away. Tell them how it ended.
            let done = DoneMessage {
                board: self.state.board.clone(),
                winner: self.state.winner,
                winner_positions: self.state.winning_line,
                next_game_start: self.next_game_unix(now),
            };
            self.send(dispatcher, OpCode::Done, &done, Some(&target));
        }

        // Stop advertising once both slots are taken.
        if self.state.bound_count() >= 2 && self.state.label.open != 0 {
            self.state.label.open = 0;
            dispatcher.update_label(&self.state.label);
        }
    }

    /// Records a departure. The slot is tombstoned rather than freed so the
    /// participant keeps their mark and can rejoin an in-progress round.
    fn leave(&mut self, user_id: &str) {
        if let Some(index) = self.state.slot_of(user_id) {
            if matches!(&self.state.slots[index], PlayerSlot::Occupied(p) if !p.is_ai()) {
                info!(user_id, slot = index, "player disconnected");
                self.state.slots[index] = PlayerSlot::Disconnected {
                    user_id: user_id.to_owned(),
                };
            }
        }
    }

    /// Housekeeping between rounds: purge tombstones, reopen the label, wait
    /// out the cooldown, and start the next round once two are present.
    fn between_rounds(&mut self, now: i64, dispatcher: &mut dyn Dispatcher) {
        // No in-progress round to return to, so disconnected slots are freed.
        for slot in &mut self.state.slots {
            if matches!(slot, PlayerSlot::Disconnected { .. }) {
                *slot = PlayerSlot::Empty;
            }
        }

        if self.state.occupied_count() < 2 && self.state.label.open != 1 {
            self.state.label.open = 1;
            dispatcher.update_label(&self.state.label);
        }

        if self.state.occupied_count() < 2 {
            return;
        }

        if self.state.next_game_remaining_ticks > 0 {
            self.state.next_game_remaining_ticks -= 1;
            return;
        }

        self.start_round(now, dispatcher);
    }

    /// Resets the board and assigns marks by slot order: the first slot
    /// plays X and opens the round.
    fn start_round(&mut self, now: i64, dispatcher: &mut dyn Dispatcher) {
        let state = &mut self.state;
        state.playing = true;
        state.board = Board::new();
        state.marks.clear();
        let seated: Vec<String> = state
            .occupants()
            .map(|presence| presence.user_id().to_owned())
            .collect();
        for (user_id, mark) in seated.into_iter().zip([Mark::X, Mark::O]) {
            state.marks.insert(user_id, mark);
        }
        state.turn = Mark::X;
        state.winner = None;
        state.winning_line = None;
        state.deadline_remaining_ticks = deadline_ticks(&state.label);
        state.next_game_remaining_ticks = 0;

        info!(marks = ?state.marks, "round started");
        let start = StartMessage {
            board: self.state.board.clone(),
            marks: self.state.marks.clone(),
            mark: self.state.turn,
            deadline: self.deadline_unix(now),
        };
        self.send(dispatcher, OpCode::Start, &start, None);
    }

    /// Handles one inbound message; anything but a well-formed, in-turn,
    /// legal move earns a unicast rejection and no state change.
    fn process_message(&mut self, now: i64, message: MatchData, dispatcher: &mut dyn Dispatcher) {
        match OpCode::from_repr(message.op_code) {
            Some(OpCode::Move) => self.process_move(now, message, dispatcher),
            _ => {
                debug!(op_code = message.op_code, "unexpected opcode");
                self.reject(dispatcher, &message.sender);
            }
        }
    }

    fn process_move(&mut self, now: i64, message: MatchData, dispatcher: &mut dyn Dispatcher) {
        let sender = message.sender;
        let mark = match self.state.marks.get(sender.user_id()) {
            Some(&mark) if mark == self.state.turn => mark,
            _ => {
                // Not a participant of this round, or not their turn.
                self.reject(dispatcher, &sender);
                return;
            }
        };

        let wanted: MoveMessage = match serde_json::from_slice(&message.data) {
            Ok(wanted) => wanted,
            Err(e) => {
                debug!(user_id = sender.user_id(), error = %e, "bad move payload");
                self.reject(dispatcher, &sender);
                return;
            }
        };

        let position = match apply_move(&mut self.state.board, wanted.position, mark) {
            Ok(position) => position,
            Err(e) => {
                debug!(user_id = sender.user_id(), error = %e, "illegal move");
                self.reject(dispatcher, &sender);
                return;
            }
        };

        info!(user_id = sender.user_id(), position, ?mark, "move accepted");
        self.state.turn = mark.opponent();
        self.state.deadline_remaining_ticks = deadline_ticks(&self.state.label);

        // Win before tie: a filled board with a winning line is a win.
        if let Some((winner, line)) = check_win(&self.state.board) {
            self.state.winner = Some(winner);
            self.state.winning_line = Some(line);
            self.end_round();
        } else if check_tie(&self.state.board) {
            self.state.winner = None;
            self.state.winning_line = None;
            self.end_round();
        }

        if self.state.playing {
            let update = UpdateMessage {
                board: self.state.board.clone(),
                mark: self.state.turn,
                deadline: self.deadline_unix(now),
            };
            self.send(dispatcher, OpCode::Update, &update, None);
        } else {
            let done = DoneMessage {
                board: self.state.board.clone(),
                winner: self.state.winner,
                winner_positions: self.state.winning_line,
                next_game_start: self.next_game_unix(now),
            };
            self.send(dispatcher, OpCode::Done, &done, None);
        }
    }

    /// Counts down the move deadline; the player on turn forfeits at zero.
    fn tick_deadline(&mut self, now: i64, dispatcher: &mut dyn Dispatcher) {
        if !self.state.playing {
            return;
        }
        self.state.deadline_remaining_ticks -= 1;
        if self.state.deadline_remaining_ticks > 0 {
            return;
        }

        let forfeited = self.state.turn;
        self.state.winner = Some(forfeited.opponent());
        self.state.winning_line = None;
        self.end_round();
        info!(?forfeited, "player ran out of time");

        let done = DoneMessage {
            board: self.state.board.clone(),
            winner: self.state.winner,
            winner_positions: None,
            next_game_start: self.next_game_unix(now),
        };
        self.send(dispatcher, OpCode::Done, &done, None);
    }

    /// Stops play and arms the inter-game cooldown.
    fn end_round(&mut self) {
        self.state.playing = false;
        self.state.deadline_remaining_ticks = 0;
        self.state.next_game_remaining_ticks = i64::from(DELAY_BETWEEN_GAMES_SEC * TICK_RATE);
    }

    fn deadline_unix(&self, now: i64) -> i64 {
        now + self.state.deadline_remaining_ticks / i64::from(TICK_RATE)
    }

    fn next_game_unix(&self, now: i64) -> i64 {
        now + self.state.next_game_remaining_ticks / i64::from(TICK_RATE)
    }

    fn reject(&self, dispatcher: &mut dyn Dispatcher, sender: &Presence) {
        dispatcher.broadcast(OpCode::Rejected, None, Some(std::slice::from_ref(sender)));
    }

    /// Encodes and sends one message; encoding failures are logged and the
    /// broadcast is skipped.
    fn send<T: Serialize>(
        &self,
        dispatcher: &mut dyn Dispatcher,
        op: OpCode,
        message: &T,
        targets: Option<&[Presence]>,
    ) {
        match serde_json::to_vec(message) {
            Ok(payload) => dispatcher.broadcast(op, Some(payload), targets),
            Err(e) => error!(error = %e, "error encoding message"),
        }
    }
}

/// Ticks allowed per move, from the match speed.
fn deadline_ticks(label: &MatchLabel) -> i64 {
    if label.fast == 1 {
        i64::from(TURN_TIME_FAST_SEC * TICK_RATE)
    } else {
        i64::from(TURN_TIME_NORMAL_SEC * TICK_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullDispatcher;

    impl Dispatcher for NullDispatcher {
        fn broadcast(&mut self, _: OpCode, _: Option<Vec<u8>>, _: Option<&[Presence]>) {}
        fn update_label(&mut self, _: &MatchLabel) {}
    }

    fn human(id: &str) -> HumanPresence {
        HumanPresence {
            user_id: id.to_owned(),
            username: id.to_owned(),
            session_id: format!("session-{id}"),
        }
    }

    #[test]
    fn test_deadline_ticks_by_speed() {
        assert_eq!(deadline_ticks(&MatchLabel::new(true)), 50);
        assert_eq!(deadline_ticks(&MatchLabel::new(false)), 100);
    }

    #[test]
    fn test_admission_reserves_then_fills() {
        let mut game = MatchLoop::new(false, false);
        assert_eq!(game.join_attempt(&human("a")), Ok(()));
        assert_eq!(game.state.joins_in_progress, 1);
        assert_eq!(game.join_attempt(&human("b")), Ok(()));
        assert_eq!(
            game.join_attempt(&human("c")),
            Err(RejectReason::MatchFull)
        );
    }

    #[test]
    fn test_admission_rejects_duplicate_identifier() {
        let mut game = MatchLoop::new(false, false);
        game.join_attempt(&human("a")).unwrap();
        assert_eq!(
            game.join_attempt(&human("a")),
            Err(RejectReason::AlreadyJoined)
        );

        let mut dispatcher = NullDispatcher;
        game.join(human("a"), 0, &mut dispatcher);
        assert_eq!(
            game.join_attempt(&human("a")),
            Err(RejectReason::AlreadyJoined)
        );
    }

    #[test]
    fn test_disconnected_player_rejoins_without_extra_occupancy() {
        let mut game = MatchLoop::new(false, false);
        let mut dispatcher = NullDispatcher;
        game.join_attempt(&human("a")).unwrap();
        game.join(human("a"), 0, &mut dispatcher);
        game.join_attempt(&human("b")).unwrap();
        game.join(human("b"), 0, &mut dispatcher);

        game.leave("a");
        assert_eq!(game.state.connected_humans(), 1);
        assert_eq!(game.join_attempt(&human("a")), Ok(()));
        game.join(human("a"), 0, &mut dispatcher);
        assert_eq!(game.state.connected_humans(), 2);
        assert_eq!(game.state.bound_count(), 2);
    }

    #[test]
    fn test_ai_never_tombstoned_on_leave() {
        let mut game = MatchLoop::new(false, true);
        game.leave(AI_USER_ID);
        assert_eq!(game.state.occupied_count(), 1);
    }

    #[test]
    fn test_ai_to_move_tracks_turn() {
        let mut game = MatchLoop::new(false, true);
        let mut dispatcher = NullDispatcher;
        game.join_attempt(&human("a")).unwrap();
        game.join(human("a"), 0, &mut dispatcher);
        // First tick seats the round; human is slot 0 and plays X.
        game.tick(0, Vec::new(), &mut dispatcher);
        assert!(game.state.playing());
        assert_eq!(game.ai_to_move(), None);
        assert_eq!(game.state.mark_of(AI_USER_ID), Some(Mark::O));
    }
}
