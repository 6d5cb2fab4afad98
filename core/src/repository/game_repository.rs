use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, to_bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{
    FindOneAndUpdateOptions, FindOneOptions, FindOptions, IndexOptions, ReturnDocument,
};
use mongodb::{Client, Collection, IndexModel};
use tracing::{debug, info};

use crate::models::{Game, Move, NewMove, UserId};
use crate::repository::{GameStore, RepoError};

const DUPLICATE_KEY: i32 = 11000;

/// Games, moves and per-game move counters in MongoDB.
#[derive(Clone)]
pub struct GameRepository {
    games: Collection<Game>,
    moves: Collection<Move>,
    counters: Collection<Document>,
}

impl GameRepository {
    pub fn new(client: &Client, database: &str) -> Self {
        let db = client.database(database);
        GameRepository {
            games: db.collection::<Game>("games"),
            moves: db.collection::<Move>("moves"),
            counters: db.collection::<Document>("move_counters"),
        }
    }

    /// Unique `(game_id, move_id)` and, where present, `(game_id, client_move_id)`.
    pub async fn ensure_indexes(&self) -> Result<(), RepoError> {
        let ledger = IndexModel::builder()
            .keys(doc! { "game_id": 1, "move_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let client_ids = IndexModel::builder()
            .keys(doc! { "game_id": 1, "client_move_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(doc! { "client_move_id": { "$type": "string" } })
                    .build(),
            )
            .build();
        self.moves.create_index(ledger, None).await?;
        self.moves.create_index(client_ids, None).await?;
        self.games
            .create_index(IndexModel::builder().keys(doc! { "code": 1 }).build(), None)
            .await?;
        info!("ensured ledger indexes");
        Ok(())
    }

    async fn next_move_id(&self, game_id: &str) -> Result<i64, RepoError> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let counter = self
            .counters
            .find_one_and_update(
                doc! { "_id": game_id },
                doc! { "$inc": { "seq": 1_i64 } },
                options,
            )
            .await?
            .ok_or_else(|| RepoError::Database("move counter upsert returned nothing".into()))?;
        counter
            .get_i64("seq")
            .map_err(|e| RepoError::Serialization(e.to_string()))
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl GameStore for GameRepository {
    async fn insert_game(&self, game: &Game) -> Result<(), RepoError> {
        self.games.insert_one(game, None).await?;
        Ok(())
    }

    async fn find_game(&self, game_id: &str) -> Result<Option<Game>, RepoError> {
        Ok(self.games.find_one(doc! { "game_id": game_id }, None).await?)
    }

    async fn find_open_game_by_code(&self, code: &str) -> Result<Option<Game>, RepoError> {
        let filter = doc! { "code": code, "ended_at": null };
        Ok(self.games.find_one(filter, None).await?)
    }

    async fn find_game_by_code(&self, code: &str) -> Result<Option<Game>, RepoError> {
        let options = FindOneOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        Ok(self.games.find_one(doc! { "code": code }, options).await?)
    }

    async fn attach_guest(
        &self,
        game_id: &str,
        guest_id: UserId,
        guest_username: &str,
    ) -> Result<bool, RepoError> {
        let filter = doc! { "game_id": game_id, "guest_id": null, "ended_at": null };
        let update = doc! {
            "$set": { "guest_id": guest_id, "guest_username": guest_username }
        };
        let result = self.games.update_one(filter, update, None).await?;
        Ok(result.modified_count == 1)
    }

    async fn record_result(
        &self,
        game_id: &str,
        winner_id: UserId,
        ended_at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        let update = doc! {
            "$set": { "winner_id": winner_id, "ended_at": to_bson(&ended_at)? }
        };
        self.games
            .update_one(doc! { "game_id": game_id }, update, None)
            .await?;
        Ok(())
    }

    async fn delete_game(&self, game_id: &str) -> Result<bool, RepoError> {
        let result = self.games.delete_one(doc! { "game_id": game_id }, None).await?;
        Ok(result.deleted_count == 1)
    }

    async fn append_move(&self, new_move: NewMove) -> Result<Move, RepoError> {
        let move_id = self.next_move_id(&new_move.game_id).await?;
        let recorded = Move {
            move_id,
            game_id: new_move.game_id,
            user_id: new_move.user_id,
            dice: new_move.dice,
            column: new_move.column,
            client_move_id: new_move.client_move_id,
            created_at: Utc::now(),
        };

        match self.moves.insert_one(&recorded, None).await {
            Ok(_) => Ok(recorded),
            Err(err) if is_duplicate_key(&err) => {
                // the other delivery path recorded this client move first
                let client_move_id = recorded.client_move_id.as_deref().unwrap_or_default();
                debug!(game_id = %recorded.game_id, client_move_id, "duplicate move delivery");
                self.find_move_by_client_id(&recorded.game_id, client_move_id)
                    .await?
                    .ok_or_else(|| RepoError::Database(err.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_move_by_client_id(
        &self,
        game_id: &str,
        client_move_id: &str,
    ) -> Result<Option<Move>, RepoError> {
        let filter = doc! { "game_id": game_id, "client_move_id": client_move_id };
        Ok(self.moves.find_one(filter, None).await?)
    }

    async fn list_moves(&self, game_id: &str) -> Result<Vec<Move>, RepoError> {
        let options = FindOptions::builder().sort(doc! { "move_id": 1 }).build();
        let cursor = self.moves.find(doc! { "game_id": game_id }, options).await?;
        let moves: Vec<Move> = cursor.try_collect().await?;
        Ok(moves)
    }
}
