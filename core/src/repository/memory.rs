//! Process-local store used by tests and by single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::models::{DiceProfile, Game, Move, NewMove, UserId};
use crate::repository::{GameStore, ProfileStore, RepoError};

#[derive(Default)]
struct Inner {
    games: Vec<Game>,
    moves: HashMap<String, Vec<Move>>,
    next_move_id: HashMap<String, i64>,
    profiles: HashMap<UserId, DiceProfile>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameStore for InMemoryStore {
    async fn insert_game(&self, game: &Game) -> Result<(), RepoError> {
        self.inner.lock().await.games.push(game.clone());
        Ok(())
    }

    async fn find_game(&self, game_id: &str) -> Result<Option<Game>, RepoError> {
        let inner = self.inner.lock().await;
        Ok(inner.games.iter().find(|g| g.game_id == game_id).cloned())
    }

    async fn find_open_game_by_code(&self, code: &str) -> Result<Option<Game>, RepoError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .games
            .iter()
            .find(|g| g.code == code && g.ended_at.is_none())
            .cloned())
    }

    async fn find_game_by_code(&self, code: &str) -> Result<Option<Game>, RepoError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .games
            .iter()
            .filter(|g| g.code == code)
            .max_by_key(|g| g.created_at)
            .cloned())
    }

    async fn attach_guest(
        &self,
        game_id: &str,
        guest_id: UserId,
        guest_username: &str,
    ) -> Result<bool, RepoError> {
        let mut inner = self.inner.lock().await;
        match inner
            .games
            .iter_mut()
            .find(|g| g.game_id == game_id && g.guest_id.is_none() && g.ended_at.is_none())
        {
            Some(game) => {
                game.guest_id = Some(guest_id);
                game.guest_username = Some(guest_username.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_result(
        &self,
        game_id: &str,
        winner_id: UserId,
        ended_at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().await;
        if let Some(game) = inner.games.iter_mut().find(|g| g.game_id == game_id) {
            game.winner_id = Some(winner_id);
            game.ended_at = Some(ended_at);
        }
        Ok(())
    }

    async fn delete_game(&self, game_id: &str) -> Result<bool, RepoError> {
        let mut inner = self.inner.lock().await;
        let before = inner.games.len();
        inner.games.retain(|g| g.game_id != game_id);
        Ok(inner.games.len() < before)
    }

    async fn append_move(&self, new_move: NewMove) -> Result<Move, RepoError> {
        let mut inner = self.inner.lock().await;

        if let Some(client_move_id) = new_move.client_move_id.as_deref() {
            let existing = inner.moves.get(&new_move.game_id).and_then(|moves| {
                moves
                    .iter()
                    .find(|m| m.client_move_id.as_deref() == Some(client_move_id))
            });
            if let Some(existing) = existing {
                return Ok(existing.clone());
            }
        }

        let seq = inner.next_move_id.entry(new_move.game_id.clone()).or_insert(0);
        *seq += 1;
        let recorded = Move {
            move_id: *seq,
            game_id: new_move.game_id,
            user_id: new_move.user_id,
            dice: new_move.dice,
            column: new_move.column,
            client_move_id: new_move.client_move_id,
            created_at: Utc::now(),
        };
        inner
            .moves
            .entry(recorded.game_id.clone())
            .or_default()
            .push(recorded.clone());
        Ok(recorded)
    }

    async fn find_move_by_client_id(
        &self,
        game_id: &str,
        client_move_id: &str,
    ) -> Result<Option<Move>, RepoError> {
        let inner = self.inner.lock().await;
        Ok(inner.moves.get(game_id).and_then(|moves| {
            moves
                .iter()
                .find(|m| m.client_move_id.as_deref() == Some(client_move_id))
                .cloned()
        }))
    }

    async fn list_moves(&self, game_id: &str) -> Result<Vec<Move>, RepoError> {
        let inner = self.inner.lock().await;
        let mut moves = inner.moves.get(game_id).cloned().unwrap_or_default();
        moves.sort_by_key(|m| m.move_id);
        Ok(moves)
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn find_profile(&self, user_id: UserId) -> Result<Option<DiceProfile>, RepoError> {
        Ok(self.inner.lock().await.profiles.get(&user_id).cloned())
    }

    async fn save_profile(&self, profile: &DiceProfile) -> Result<(), RepoError> {
        self.inner
            .lock()
            .await
            .profiles
            .insert(profile.user_id, profile.clone());
        Ok(())
    }
}
