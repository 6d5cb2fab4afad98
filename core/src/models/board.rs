use serde::{Deserialize, Serialize};

use crate::models::game::{Game, GameStatus, Side, UserId};
use crate::models::play::{ColumnSlot, DieFace, Move};
use crate::scoring::score;

/// Dice a single slot can hold.
pub const COLUMN_CAPACITY: usize = 3;

/// Column projection of a ledger: the dice in each of the six slots, in ledger
/// order, after the opponent-dice-removal rule has been applied for every move.
///
/// Serialized as `{"columns": [[..], [..], [..], [..], [..], [..]]}` where
/// index 0 is slot 1.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    columns: [Vec<DieFace>; 6],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays a ledger. Moves must already be in `move_id` order.
    pub fn from_moves<'a, I>(moves: I) -> Self
    where
        I: IntoIterator<Item = &'a Move>,
    {
        let mut board = Board::new();
        for mv in moves {
            board.place(mv.column, mv.dice);
        }
        board
    }

    /// Places a die and clears that face from the mirrored slot.
    pub fn place(&mut self, slot: ColumnSlot, face: DieFace) {
        self.columns[slot.index()].push(face);
        self.remove_face(slot.mirror(), face);
    }

    /// Removes every die showing `face` from `slot`. Returns how many were removed.
    pub fn remove_face(&mut self, slot: ColumnSlot, face: DieFace) -> usize {
        let column = &mut self.columns[slot.index()];
        let before = column.len();
        column.retain(|&d| d != face);
        before - column.len()
    }

    pub fn column(&self, slot: ColumnSlot) -> &[DieFace] {
        &self.columns[slot.index()]
    }

    pub fn is_full(&self, slot: ColumnSlot) -> bool {
        self.column(slot).len() >= COLUMN_CAPACITY
    }

    /// True once all three slots of `side` hold their full capacity.
    pub fn side_full(&self, side: Side) -> bool {
        ColumnSlot::for_side(side).iter().all(|&slot| self.is_full(slot))
    }

    pub fn column_score(&self, slot: ColumnSlot) -> u32 {
        score(self.column(slot))
    }

    pub fn side_score(&self, side: Side) -> u32 {
        ColumnSlot::for_side(side)
            .iter()
            .map(|&slot| self.column_score(slot))
            .sum()
    }

    pub fn dice_count(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    /// The side that wins a finished board: higher score, or the side that
    /// filled its board on a tie. `None` while neither side is full.
    pub fn finished_winner(&self) -> Option<Side> {
        let filled = [Side::Host, Side::Guest]
            .into_iter()
            .find(|&side| self.side_full(side))?;
        let host = self.side_score(Side::Host);
        let guest = self.side_score(Side::Guest);
        Some(match host.cmp(&guest) {
            std::cmp::Ordering::Greater => Side::Host,
            std::cmp::Ordering::Less => Side::Guest,
            std::cmp::Ordering::Equal => filled,
        })
    }
}

/// Side that moves next: the host on an empty ledger, otherwise whoever did not
/// make the last move.
pub fn next_side(game: &Game, moves: &[Move]) -> Side {
    match moves.last() {
        None => Side::Host,
        Some(last) if last.user_id == game.host_id => Side::Guest,
        Some(_) => Side::Host,
    }
}

/// User whose turn it is, or `None` once the game is finished or when the
/// guest seat is still empty and it is the guest's turn.
pub fn current_turn(game: &Game, moves: &[Move]) -> Option<UserId> {
    if game.status() == GameStatus::Finished {
        return None;
    }
    game.user_on(next_side(game, moves))
}
