//! Per-client turn gating and reconciliation of the local board against the
//! server's ledger.

use matatena_core::models::{Board, ColumnSlot, DieFace, GameStatus, Move, Side, UserId};
use matatena_core::{ServerEvent, SessionSnapshot};
use tracing::debug;
use uuid::Uuid;

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnPhase {
    /// Not this player's turn, or waiting for a die.
    Idle,
    /// A die is in hand.
    DieReady(DieFace),
    /// A placement is in flight.
    Submitting(PendingMove),
}

/// A placement dispatched to the server and not yet confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
    pub dice: DieFace,
    pub column: ColumnSlot,
    pub client_move_id: String,
}

/// Server-confirmed data from either delivery path.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerUpdate {
    /// A whole ledger, from a poll or a push snapshot.
    Snapshot {
        ledger_len: usize,
        last_move_id: i64,
        last_mover: Option<UserId>,
        columns: Board,
        current_turn: Option<UserId>,
        finished: bool,
        winner_id: Option<UserId>,
    },
    /// One move pushed by the server.
    Move {
        move_id: i64,
        user_id: UserId,
        dice: DieFace,
        column: ColumnSlot,
    },
}

impl From<&SessionSnapshot> for LedgerUpdate {
    fn from(snapshot: &SessionSnapshot) -> Self {
        LedgerUpdate::Snapshot {
            ledger_len: snapshot.ledger_len(),
            last_move_id: snapshot.plays.last().map_or(0, |m| m.move_id),
            last_mover: snapshot.plays.last().map(|m| m.user_id),
            columns: snapshot.columns.clone(),
            current_turn: snapshot.current_turn,
            finished: snapshot.status == GameStatus::Finished,
            winner_id: snapshot.game.winner_id,
        }
    }
}

impl From<&Move> for LedgerUpdate {
    fn from(recorded: &Move) -> Self {
        LedgerUpdate::Move {
            move_id: recorded.move_id,
            user_id: recorded.user_id,
            dice: recorded.dice,
            column: recorded.column,
        }
    }
}

impl LedgerUpdate {
    pub fn from_event(event: &ServerEvent) -> Option<Self> {
        match event {
            ServerEvent::MoveMade {
                move_id,
                user_id,
                dice,
                column,
                ..
            } => Some(LedgerUpdate::Move {
                move_id: *move_id,
                user_id: *user_id,
                dice: *dice,
                column: *column,
            }),
            ServerEvent::GameState { snapshot } | ServerEvent::GameJoined { snapshot, .. } => {
                Some(LedgerUpdate::from(snapshot))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The confirmed view moved forward.
    Applied,
    /// Already seen, or older than what is held.
    Stale,
}

/// The confirmed board as last reported by the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfirmedView {
    pub ledger_len: usize,
    pub last_move_id: i64,
    pub last_mover: Option<UserId>,
    pub columns: Board,
    pub current_turn: Option<UserId>,
    pub finished: bool,
    pub winner_id: Option<UserId>,
}

/// Folds one server update into the confirmed view. A snapshot replaces the
/// view only when its ledger is longer; a pushed move applies only when it is
/// newer than the last move held, and leaves `current_turn` unset for the
/// caller to derive from `last_mover`.
pub fn reconcile(view: &mut ConfirmedView, update: &LedgerUpdate) -> Reconciled {
    match update {
        LedgerUpdate::Snapshot {
            ledger_len,
            last_move_id,
            last_mover,
            columns,
            current_turn,
            finished,
            winner_id,
        } => {
            let mut applied = Reconciled::Stale;
            if *ledger_len > view.ledger_len {
                view.ledger_len = *ledger_len;
                view.last_move_id = *last_move_id;
                view.last_mover = *last_mover;
                view.columns = columns.clone();
                view.current_turn = *current_turn;
                applied = Reconciled::Applied;
            }
            if *finished && !view.finished {
                view.finished = true;
                view.winner_id = *winner_id;
                view.current_turn = None;
                applied = Reconciled::Applied;
            }
            applied
        }
        LedgerUpdate::Move {
            move_id,
            user_id,
            dice,
            column,
        } => {
            if *move_id <= view.last_move_id {
                return Reconciled::Stale;
            }
            view.ledger_len += 1;
            view.last_move_id = *move_id;
            view.last_mover = Some(*user_id);
            view.columns.place(*column, *dice);
            view.current_turn = None;
            Reconciled::Applied
        }
    }
}

/// One player's view of an online game.
#[derive(Debug, Clone)]
pub struct TurnController {
    me: UserId,
    side: Side,
    opponent: Option<UserId>,
    confirmed: ConfirmedView,
    display: Board,
    display_turn: Option<UserId>,
    phase: TurnPhase,
    declared: bool,
}

impl TurnController {
    pub fn new(me: UserId, side: Side, opponent: Option<UserId>) -> Self {
        let first = match side {
            Side::Host => Some(me),
            Side::Guest => opponent,
        };
        TurnController {
            me,
            side,
            opponent,
            confirmed: ConfirmedView {
                current_turn: first,
                ..ConfirmedView::default()
            },
            display: Board::new(),
            display_turn: first,
            phase: TurnPhase::Idle,
            declared: false,
        }
    }

    pub fn me(&self) -> UserId {
        self.me
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn phase(&self) -> &TurnPhase {
        &self.phase
    }

    /// Board to render: the confirmed board plus any optimistic placement.
    pub fn board(&self) -> &Board {
        &self.display
    }

    pub fn confirmed(&self) -> &ConfirmedView {
        &self.confirmed
    }

    pub fn current_turn(&self) -> Option<UserId> {
        self.display_turn
    }

    pub fn is_my_turn(&self) -> bool {
        !self.confirmed.finished && self.display_turn == Some(self.me)
    }

    pub fn set_opponent(&mut self, opponent: UserId) {
        self.opponent = Some(opponent);
        if self.confirmed.ledger_len == 0 && self.side == Side::Guest {
            self.confirmed.current_turn = Some(opponent);
            self.display_turn = Some(opponent);
        }
    }

    /// True when it is this player's turn and no die is in hand yet.
    pub fn wants_die(&self) -> bool {
        self.is_my_turn() && self.phase == TurnPhase::Idle
    }

    pub fn offer_die(&mut self, face: DieFace) -> Result<(), ClientError> {
        if self.confirmed.finished {
            return Err(ClientError::GameOver);
        }
        if !self.is_my_turn() {
            return Err(ClientError::NotYourTurn);
        }
        match self.phase {
            TurnPhase::Idle => {
                self.phase = TurnPhase::DieReady(face);
                Ok(())
            }
            TurnPhase::DieReady(_) | TurnPhase::Submitting(_) => Err(ClientError::Busy),
        }
    }

    /// Places the die in hand. On success the board and turn change
    /// optimistically and the move waits for confirmation.
    pub fn place(&mut self, face: DieFace, column: ColumnSlot) -> Result<PendingMove, ClientError> {
        if self.confirmed.finished {
            return Err(ClientError::GameOver);
        }
        let held = match &self.phase {
            TurnPhase::DieReady(held) => *held,
            TurnPhase::Submitting(_) => return Err(ClientError::Busy),
            TurnPhase::Idle => return Err(ClientError::NoDieHeld),
        };
        if !self.is_my_turn() {
            return Err(ClientError::NotYourTurn);
        }
        if held != face {
            return Err(ClientError::StaleDie {
                held,
                offered: face,
            });
        }
        if column.side() != self.side {
            return Err(ClientError::OpponentColumn(column));
        }
        if self.display.is_full(column) {
            return Err(ClientError::ColumnFull(column));
        }

        self.display.place(column, face);
        self.display_turn = self.opponent;
        let pending = PendingMove {
            dice: face,
            column,
            client_move_id: Uuid::new_v4().to_string(),
        };
        self.phase = TurnPhase::Submitting(pending.clone());
        debug!(column = column.value(), dice = face.value(), "placed optimistically");
        Ok(pending)
    }

    /// The server recorded the pending move.
    pub fn confirm(&mut self, recorded: &Move) {
        if let TurnPhase::Submitting(_) = self.phase {
            self.phase = TurnPhase::Idle;
        }
        self.apply(&LedgerUpdate::from(recorded));
    }

    /// Dispatch failed: the optimistic placement is undone and the same die
    /// stays in hand. If the other path already confirmed the move the turn
    /// has passed and the die is spent.
    pub fn fail(&mut self) {
        if let TurnPhase::Submitting(pending) = &self.phase {
            let still_mine =
                !self.confirmed.finished && self.confirmed.current_turn == Some(self.me);
            self.phase = if still_mine {
                TurnPhase::DieReady(pending.dice)
            } else {
                debug!("dispatch failed after the move was confirmed");
                TurnPhase::Idle
            };
            self.display = self.confirmed.columns.clone();
            self.display_turn = self.confirmed.current_turn;
        }
    }

    /// Feeds server data from either path into the view.
    pub fn apply(&mut self, update: &LedgerUpdate) -> Reconciled {
        let result = reconcile(&mut self.confirmed, update);
        if result == Reconciled::Applied
            && !self.confirmed.finished
            && matches!(update, LedgerUpdate::Move { .. })
        {
            self.confirmed.current_turn = match self.confirmed.last_mover {
                Some(mover) if mover == self.me => self.opponent,
                Some(_) => Some(self.me),
                None => None,
            };
        }
        self.refresh(result);
        result
    }

    fn refresh(&mut self, result: Reconciled) {
        if result == Reconciled::Stale {
            return;
        }
        // server data always wins over the optimistic board
        self.display = self.confirmed.columns.clone();
        self.display_turn = self.confirmed.current_turn;
        // an in-flight placement is settled by its own dispatch result
        if let TurnPhase::DieReady(_) = self.phase {
            if self.confirmed.finished || self.display_turn != Some(self.me) {
                self.phase = TurnPhase::Idle;
            }
        }
    }

    /// Marks the game over with the announced winner.
    pub fn finish(&mut self, winner_id: UserId) {
        self.confirmed.finished = true;
        self.confirmed.winner_id = Some(winner_id);
        self.confirmed.current_turn = None;
        self.display_turn = None;
        self.phase = TurnPhase::Idle;
    }

    pub fn winner(&self) -> Option<UserId> {
        self.confirmed.winner_id
    }

    /// When this player just filled their side of the confirmed board, the
    /// winner they should declare. Returned once.
    pub fn take_declaration(&mut self) -> Option<UserId> {
        if self.declared || self.confirmed.finished || !self.confirmed.columns.side_full(self.side) {
            return None;
        }
        let winner = self.confirmed.columns.finished_winner()?;
        let winner = if winner == self.side { Some(self.me) } else { self.opponent }?;
        self.declared = true;
        Some(winner)
    }

    pub fn score(&self, side: Side) -> u32 {
        self.display.side_score(side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(v: i64) -> DieFace {
        DieFace::new(v).unwrap()
    }

    fn slot(v: i64) -> ColumnSlot {
        ColumnSlot::new(v).unwrap()
    }

    fn pushed(move_id: i64, user_id: UserId, column: i64, dice: i64) -> LedgerUpdate {
        LedgerUpdate::Move {
            move_id,
            user_id,
            dice: face(dice),
            column: slot(column),
        }
    }

    fn host() -> TurnController {
        TurnController::new(1, Side::Host, Some(2))
    }

    #[test]
    fn host_starts_and_guest_waits() {
        let host = host();
        assert!(host.wants_die());
        let guest = TurnController::new(2, Side::Guest, Some(1));
        assert!(!guest.wants_die());
        assert!(!guest.is_my_turn());
    }

    #[test]
    fn dies_are_only_offered_on_my_turn() {
        let mut guest = TurnController::new(2, Side::Guest, Some(1));
        assert!(matches!(guest.offer_die(face(4)), Err(ClientError::NotYourTurn)));

        let mut host = host();
        host.offer_die(face(4)).unwrap();
        assert_eq!(host.phase(), &TurnPhase::DieReady(face(4)));
        assert!(matches!(host.offer_die(face(2)), Err(ClientError::Busy)));
    }

    #[test]
    fn placement_requires_the_die_in_hand() {
        let mut host = host();
        assert!(matches!(host.place(face(3), slot(1)), Err(ClientError::NoDieHeld)));
        host.offer_die(face(3)).unwrap();
        assert!(matches!(
            host.place(face(5), slot(1)),
            Err(ClientError::StaleDie { .. })
        ));
        assert!(matches!(
            host.place(face(3), slot(4)),
            Err(ClientError::OpponentColumn(_))
        ));
        assert_eq!(host.phase(), &TurnPhase::DieReady(face(3)));
    }

    #[test]
    fn full_columns_are_refused() {
        let mut host = host();
        let mut id = 0;
        for dice in [1, 2, 3] {
            id += 1;
            host.apply(&pushed(id, 1, 1, dice));
            id += 1;
            host.apply(&pushed(id, 2, 6, 6));
        }
        assert!(host.is_my_turn());
        host.offer_die(face(4)).unwrap();
        assert!(matches!(host.place(face(4), slot(1)), Err(ClientError::ColumnFull(_))));
        host.place(face(4), slot(2)).unwrap();
    }

    #[test]
    fn optimistic_placement_then_confirmation() {
        let mut host = host();
        host.apply(&pushed(1, 1, 1, 6));
        host.apply(&pushed(2, 2, 4, 2));
        host.offer_die(face(2)).unwrap();

        let pending = host.place(face(2), slot(1)).unwrap();
        assert_eq!(host.board().column(slot(1)), &[face(6), face(2)]);
        // the removal rule applies locally before the server answers
        assert!(host.board().column(slot(4)).is_empty());
        assert_eq!(host.current_turn(), Some(2));
        assert!(matches!(host.phase(), TurnPhase::Submitting(p) if *p == pending));
        assert_eq!(host.confirmed().ledger_len, 2);

        let recorded = Move {
            move_id: 3,
            game_id: "g".into(),
            user_id: 1,
            dice: face(2),
            column: slot(1),
            client_move_id: Some(pending.client_move_id),
            created_at: chrono::Utc::now(),
        };
        host.confirm(&recorded);
        assert_eq!(host.phase(), &TurnPhase::Idle);
        assert_eq!(host.confirmed().ledger_len, 3);
        assert_eq!(host.current_turn(), Some(2));
        assert!(!host.wants_die());
    }

    #[test]
    fn failed_dispatch_keeps_the_die() {
        let mut host = host();
        host.offer_die(face(5)).unwrap();
        host.place(face(5), slot(3)).unwrap();
        host.fail();

        assert_eq!(host.phase(), &TurnPhase::DieReady(face(5)));
        assert!(host.board().column(slot(3)).is_empty());
        assert_eq!(host.current_turn(), Some(1));
        host.place(face(5), slot(3)).unwrap();
    }

    #[test]
    fn failure_after_a_pushed_echo_spends_the_die() {
        let mut host = host();
        host.offer_die(face(3)).unwrap();
        host.place(face(3), slot(1)).unwrap();

        // the push path delivers our own move before the REST call errors
        assert_eq!(host.apply(&pushed(1, 1, 1, 3)), Reconciled::Applied);
        host.fail();

        assert_eq!(host.phase(), &TurnPhase::Idle);
        assert_eq!(host.current_turn(), Some(2));
        assert!(!host.is_my_turn());
        assert_eq!(host.board().column(slot(1)), &[face(3)]);
        assert!(matches!(host.place(face(3), slot(2)), Err(ClientError::NoDieHeld)));
    }

    #[test]
    fn placing_out_of_turn_is_refused() {
        let mut host = host();
        host.offer_die(face(2)).unwrap();
        // a die still in hand while the turn shows the opponent
        host.display_turn = Some(2);
        assert!(matches!(host.place(face(2), slot(1)), Err(ClientError::NotYourTurn)));
        assert_eq!(host.phase(), &TurnPhase::DieReady(face(2)));
        assert!(host.board().column(slot(1)).is_empty());
    }

    #[test]
    fn longer_snapshots_overwrite_optimistic_state() {
        let mut host = host();
        host.offer_die(face(5)).unwrap();
        host.place(face(5), slot(3)).unwrap();

        let mut columns = Board::new();
        columns.place(slot(3), face(5));
        columns.place(slot(5), face(1));
        let update = LedgerUpdate::Snapshot {
            ledger_len: 2,
            last_move_id: 2,
            last_mover: Some(2),
            columns: columns.clone(),
            current_turn: Some(1),
            finished: false,
            winner_id: None,
        };
        assert_eq!(host.apply(&update), Reconciled::Applied);
        assert_eq!(host.board(), &columns);
        assert_eq!(host.current_turn(), Some(1));
        assert!(matches!(host.phase(), TurnPhase::Submitting(_)));

        // an equal-length snapshot from the slower path changes nothing
        let older = LedgerUpdate::Snapshot {
            ledger_len: 2,
            last_move_id: 2,
            last_mover: Some(1),
            columns: Board::new(),
            current_turn: Some(2),
            finished: false,
            winner_id: None,
        };
        assert_eq!(host.apply(&older), Reconciled::Stale);
        assert_eq!(host.board(), &columns);
    }

    #[test]
    fn pushed_moves_already_seen_are_ignored() {
        let mut view = ConfirmedView::default();
        assert_eq!(reconcile(&mut view, &pushed(1, 1, 1, 3)), Reconciled::Applied);
        assert_eq!(reconcile(&mut view, &pushed(1, 1, 1, 3)), Reconciled::Stale);
        assert_eq!(view.ledger_len, 1);
        assert_eq!(view.columns.column(slot(1)), &[face(3)]);
    }

    #[test]
    fn filling_my_side_declares_once() {
        let mut host = host();
        let mut id = 0;
        for column in [1, 2, 3] {
            for _ in 0..3 {
                id += 1;
                host.apply(&pushed(id, 1, column, 6));
                id += 1;
                host.apply(&pushed(id, 2, column + 3, 1));
            }
        }
        // the host's sixes never match the guest's ones, so nothing was removed
        assert!(host.confirmed().columns.side_full(Side::Host));
        assert_eq!(host.take_declaration(), Some(1));
        assert_eq!(host.take_declaration(), None);

        host.finish(1);
        assert_eq!(host.winner(), Some(1));
        assert!(matches!(host.offer_die(face(1)), Err(ClientError::GameOver)));
    }
}
