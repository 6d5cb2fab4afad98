//! Authoritative game session state machine: waiting -> active -> finished.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::SessionError;
use crate::jwt::Identity;
use crate::models::{
    current_turn, next_side, Board, ColumnSlot, DieFace, Game, GameStatus, Move, MoveSubmission,
    NewMove, Side, UserId,
};
use crate::repository::GameStore;

const CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 5;

/// Random five-character join code over `A-Z0-9`.
pub fn generate_game_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_CHARS[rng.gen_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Which advisory client-side gates the server also enforces. The default
/// accepts every move from a participant, matching deployed clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RulesPolicy {
    pub enforce_turn_order: bool,
    pub enforce_column_capacity: bool,
}

impl RulesPolicy {
    pub fn permissive() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        RulesPolicy {
            enforce_turn_order: true,
            enforce_column_capacity: true,
        }
    }
}

/// Everything a client needs to rebuild its view.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub game: Game,
    pub status: GameStatus,
    pub columns: Board,
    pub plays: Vec<Move>,
    pub current_turn: Option<UserId>,
    pub host_score: u32,
    pub guest_score: u32,
    pub winner_username: Option<String>,
}

impl SessionSnapshot {
    pub fn build(game: Game, plays: Vec<Move>) -> Self {
        let columns = Board::from_moves(&plays);
        let current_turn = current_turn(&game, &plays);
        SessionSnapshot {
            status: game.status(),
            host_score: columns.side_score(Side::Host),
            guest_score: columns.side_score(Side::Guest),
            winner_username: game.winner_username().map(str::to_string),
            game,
            columns,
            plays,
            current_turn,
        }
    }

    /// Ledger length, used by clients to tell newer snapshots from older ones.
    pub fn ledger_len(&self) -> usize {
        self.plays.len()
    }
}

/// Result of a move submission.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    #[serde(rename = "move")]
    pub recorded: Move,
    pub columns: Board,
    pub current_turn: Option<UserId>,
    pub ledger_len: usize,
    /// True when the move had already been recorded through the other path.
    pub duplicate: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GameResult {
    pub game_id: String,
    pub winner_id: UserId,
    pub winner_username: Option<String>,
}

type CodeGenerator = Box<dyn Fn() -> String + Send + Sync>;

pub struct SessionService {
    store: Arc<dyn GameStore>,
    rules: RulesPolicy,
    codes: CodeGenerator,
}

impl SessionService {
    pub fn new(store: Arc<dyn GameStore>, rules: RulesPolicy) -> Self {
        SessionService {
            store,
            rules,
            codes: Box::new(generate_game_code),
        }
    }

    #[must_use]
    pub fn with_code_generator<F>(mut self, codes: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.codes = Box::new(codes);
        self
    }

    pub fn rules(&self) -> RulesPolicy {
        self.rules
    }

    pub async fn create_game(&self, host: &Identity) -> Result<Game, SessionError> {
        // read-then-write: two concurrent creates can still race on a code
        let code = loop {
            let candidate = (self.codes)();
            if self.store.find_open_game_by_code(&candidate).await?.is_none() {
                break candidate;
            }
        };

        let game = Game::new(
            Uuid::new_v4().to_string(),
            code,
            host.user_id,
            host.username.clone(),
        );
        self.store.insert_game(&game).await?;
        info!(game_id = %game.game_id, code = %game.code, host = host.user_id, "game created");
        Ok(game)
    }

    pub async fn join_game(&self, code: &str, guest: &Identity) -> Result<Game, SessionError> {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(SessionError::InvalidRequest("a game code is required".to_string()));
        }

        let game = self
            .store
            .find_open_game_by_code(&code)
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("no open game with code {}", code)))?;

        if game.guest_id.is_some() {
            return Err(SessionError::Conflict("the game is already full".to_string()));
        }
        if game.host_id == guest.user_id {
            return Err(SessionError::InvalidRequest(
                "you cannot join your own game".to_string(),
            ));
        }

        if !self
            .store
            .attach_guest(&game.game_id, guest.user_id, &guest.username)
            .await?
        {
            return Err(SessionError::Conflict("the game is already full".to_string()));
        }

        info!(game_id = %game.game_id, guest = guest.user_id, "guest joined");
        self.get_game(&game.game_id).await
    }

    pub async fn get_game(&self, game_id: &str) -> Result<Game, SessionError> {
        self.store
            .find_game(game_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("game {} not found", game_id)))
    }

    pub async fn get_game_by_code(&self, code: &str) -> Result<Game, SessionError> {
        let code = code.trim().to_uppercase();
        self.store
            .find_game_by_code(&code)
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("no game with code {}", code)))
    }

    /// The game, provided `user_id` is its host or guest.
    pub async fn participant_game(
        &self,
        game_id: &str,
        user_id: UserId,
    ) -> Result<Game, SessionError> {
        let game = self.get_game(game_id).await?;
        if game.is_participant(user_id) {
            Ok(game)
        } else {
            Err(SessionError::Forbidden(
                "you are not a player in this game".to_string(),
            ))
        }
    }

    pub async fn get_state(&self, game_id: &str) -> Result<SessionSnapshot, SessionError> {
        let game = self.get_game(game_id).await?;
        let plays = self.store.list_moves(game_id).await?;
        Ok(SessionSnapshot::build(game, plays))
    }

    pub async fn submit_move(
        &self,
        game_id: &str,
        actor: &Identity,
        submission: MoveSubmission,
    ) -> Result<MoveOutcome, SessionError> {
        let game = self.participant_game(game_id, actor.user_id).await?;
        let column = ColumnSlot::new(submission.column)?;
        let dice = DieFace::new(submission.dice)?;

        if let Some(client_move_id) = submission.client_move_id.as_deref() {
            if let Some(existing) = self
                .store
                .find_move_by_client_id(game_id, client_move_id)
                .await?
            {
                return self.outcome(&game, existing, true).await;
            }
        }

        if self.rules != RulesPolicy::permissive() {
            let moves = self.store.list_moves(game_id).await?;
            self.check_rules(&game, &moves, actor.user_id, column)?;
        }

        let recorded = self
            .store
            .append_move(NewMove {
                game_id: game_id.to_string(),
                user_id: actor.user_id,
                dice,
                column,
                client_move_id: submission.client_move_id,
            })
            .await?;
        info!(
            game_id,
            move_id = recorded.move_id,
            user = actor.user_id,
            column = column.value(),
            dice = dice.value(),
            "move recorded"
        );
        self.outcome(&game, recorded, false).await
    }

    fn check_rules(
        &self,
        game: &Game,
        moves: &[Move],
        user_id: UserId,
        column: ColumnSlot,
    ) -> Result<(), SessionError> {
        if game.status() == GameStatus::Finished {
            return Err(SessionError::Conflict("the game has already ended".to_string()));
        }
        if self.rules.enforce_turn_order {
            let side = game.side_of(user_id);
            if game.status() != GameStatus::Active || side != Some(next_side(game, moves)) {
                warn!(game_id = %game.game_id, user_id, "move out of turn rejected");
                return Err(SessionError::Conflict("it is not your turn".to_string()));
            }
            if side != Some(column.side()) {
                return Err(SessionError::InvalidRequest(format!(
                    "column {} belongs to your opponent",
                    column
                )));
            }
        }
        if self.rules.enforce_column_capacity && Board::from_moves(moves).is_full(column) {
            return Err(SessionError::Conflict(format!("column {} is full", column)));
        }
        Ok(())
    }

    async fn outcome(
        &self,
        game: &Game,
        recorded: Move,
        duplicate: bool,
    ) -> Result<MoveOutcome, SessionError> {
        let moves = self.store.list_moves(&game.game_id).await?;
        Ok(MoveOutcome {
            columns: Board::from_moves(&moves),
            current_turn: current_turn(game, &moves),
            ledger_len: moves.len(),
            recorded,
            duplicate,
        })
    }

    /// Records the caller's claim of who won. Repeated calls overwrite.
    pub async fn end_game(
        &self,
        game_id: &str,
        actor: &Identity,
        winner_id: UserId,
    ) -> Result<GameResult, SessionError> {
        self.participant_game(game_id, actor.user_id).await?;
        self.store.record_result(game_id, winner_id, Utc::now()).await?;
        let game = self.get_game(game_id).await?;
        info!(game_id, winner_id, declared_by = actor.user_id, "game finished");
        Ok(GameResult {
            game_id: game.game_id.clone(),
            winner_id,
            winner_username: game.winner_username().map(str::to_string),
        })
    }

    pub async fn delete_game(&self, game_id: &str, actor: &Identity) -> Result<(), SessionError> {
        let game = self.get_game(game_id).await?;
        if game.host_id != actor.user_id {
            return Err(SessionError::Forbidden(
                "only the host can delete the game".to_string(),
            ));
        }
        self.store.delete_game(game_id).await?;
        info!(game_id, "game deleted");
        Ok(())
    }
}
