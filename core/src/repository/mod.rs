//! Persistence seams. The session layer only ever talks to these traits.

pub mod game_repository;
pub mod memory;
pub mod profile_repository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{DiceProfile, Game, Move, NewMove, UserId};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<mongodb::error::Error> for RepoError {
    fn from(err: mongodb::error::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for RepoError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        RepoError::Serialization(err.to_string())
    }
}

/// Game records plus the append-only move ledger keyed by game id.
#[async_trait]
pub trait GameStore: Send + Sync {
    async fn insert_game(&self, game: &Game) -> Result<(), RepoError>;
    async fn find_game(&self, game_id: &str) -> Result<Option<Game>, RepoError>;
    /// A `waiting` or `active` game holding `code`.
    async fn find_open_game_by_code(&self, code: &str) -> Result<Option<Game>, RepoError>;
    /// The most recently created game holding `code`, finished or not.
    async fn find_game_by_code(&self, code: &str) -> Result<Option<Game>, RepoError>;
    /// Sets the guest only if the seat is still empty. Returns whether this call won.
    async fn attach_guest(
        &self,
        game_id: &str,
        guest_id: UserId,
        guest_username: &str,
    ) -> Result<bool, RepoError>;
    /// Overwrites winner and end timestamp.
    async fn record_result(
        &self,
        game_id: &str,
        winner_id: UserId,
        ended_at: DateTime<Utc>,
    ) -> Result<(), RepoError>;
    /// Removes the game record; its moves are left in place.
    async fn delete_game(&self, game_id: &str) -> Result<bool, RepoError>;
    /// Appends a move with the next sequence id for its game.
    async fn append_move(&self, new_move: NewMove) -> Result<Move, RepoError>;
    async fn find_move_by_client_id(
        &self,
        game_id: &str,
        client_move_id: &str,
    ) -> Result<Option<Move>, RepoError>;
    /// The ledger, ordered by `move_id` ascending.
    async fn list_moves(&self, game_id: &str) -> Result<Vec<Move>, RepoError>;
}

/// Per-user die weights.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_profile(&self, user_id: UserId) -> Result<Option<DiceProfile>, RepoError>;
    async fn save_profile(&self, profile: &DiceProfile) -> Result<(), RepoError>;
}
