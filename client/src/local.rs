//! Hot-seat play: both sides on one client, no server.

use matatena_core::dice::select_face;
use matatena_core::models::{Board, ColumnSlot, DiceWeights, DieFace, Side};
use rand::Rng;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalTurn {
    /// The other side is up with a fresh die.
    Next { side: Side, dice: DieFace },
    Finished {
        winner: Side,
        host_score: u32,
        guest_score: u32,
    },
}

pub struct LocalMatch<R> {
    board: Board,
    turn: Side,
    held: Option<DieFace>,
    weights: DiceWeights,
    winner: Option<Side>,
    rng: R,
}

impl<R: Rng> LocalMatch<R> {
    /// Starts with the host holding a die.
    pub fn new(rng: R) -> Self {
        Self::with_weights(rng, DiceWeights::uniform())
    }

    pub fn with_weights(mut rng: R, weights: DiceWeights) -> Self {
        let first = select_face(&weights, &mut rng);
        LocalMatch {
            board: Board::new(),
            turn: Side::Host,
            held: Some(first),
            weights,
            winner: None,
            rng,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> Side {
        self.turn
    }

    pub fn held(&self) -> Option<DieFace> {
        self.held
    }

    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    pub fn score(&self, side: Side) -> u32 {
        self.board.side_score(side)
    }

    pub fn place(&mut self, face: DieFace, column: ColumnSlot) -> Result<LocalTurn, ClientError> {
        if self.winner.is_some() {
            return Err(ClientError::GameOver);
        }
        let held = self.held.ok_or(ClientError::NoDieHeld)?;
        if held != face {
            return Err(ClientError::StaleDie {
                held,
                offered: face,
            });
        }
        if column.side() != self.turn {
            return Err(ClientError::OpponentColumn(column));
        }
        if self.board.is_full(column) {
            return Err(ClientError::ColumnFull(column));
        }

        self.board.place(column, face);
        self.held = None;

        if let Some(winner) = self.board.finished_winner() {
            self.winner = Some(winner);
            return Ok(LocalTurn::Finished {
                winner,
                host_score: self.score(Side::Host),
                guest_score: self.score(Side::Guest),
            });
        }

        self.turn = self.turn.opponent();
        let dice = select_face(&self.weights, &mut self.rng);
        self.held = Some(dice);
        Ok(LocalTurn::Next {
            side: self.turn,
            dice,
        })
    }
}
