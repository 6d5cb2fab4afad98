use matatena_core::models::{Board, Game, GameStatus, Move, MoveSubmission, UserId};
use matatena_core::{GameResult, MoveOutcome, SessionService, SessionSnapshot};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{delete, get, post, put, State};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::response::{respond, ApiResult};

#[derive(Serialize, Deserialize, Debug)]
pub struct JoinRequest {
    pub code: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct EndRequest {
    pub winner_id: UserId,
}

/// The ledger with its projection, polled by clients between pushes.
#[derive(Serialize, Deserialize, Debug)]
pub struct LedgerView {
    pub game_id: String,
    pub status: GameStatus,
    pub plays: Vec<Move>,
    pub columns: Board,
    pub current_turn: Option<UserId>,
    pub ledger_len: usize,
}

impl From<SessionSnapshot> for LedgerView {
    fn from(snapshot: SessionSnapshot) -> Self {
        LedgerView {
            ledger_len: snapshot.ledger_len(),
            game_id: snapshot.game.game_id,
            status: snapshot.status,
            plays: snapshot.plays,
            columns: snapshot.columns,
            current_turn: snapshot.current_turn,
        }
    }
}

#[post("/games")]
pub async fn create_game(sessions: &State<SessionService>, user: AuthUser) -> ApiResult<Game> {
    respond(Status::Created, sessions.create_game(&user.0).await)
}

#[post("/games/join", format = "json", data = "<request>")]
pub async fn join_game(
    sessions: &State<SessionService>,
    user: AuthUser,
    request: Json<JoinRequest>,
) -> ApiResult<Game> {
    respond(Status::Ok, sessions.join_game(&request.code, &user.0).await)
}

#[get("/games/<game_id>")]
pub async fn get_game(
    sessions: &State<SessionService>,
    _user: AuthUser,
    game_id: &str,
) -> ApiResult<Game> {
    respond(Status::Ok, sessions.get_game(game_id).await)
}

#[get("/games?<code>")]
pub async fn get_game_by_code(
    sessions: &State<SessionService>,
    _user: AuthUser,
    code: &str,
) -> ApiResult<Game> {
    respond(Status::Ok, sessions.get_game_by_code(code).await)
}

#[get("/games/<game_id>/state")]
pub async fn get_state(
    sessions: &State<SessionService>,
    _user: AuthUser,
    game_id: &str,
) -> ApiResult<SessionSnapshot> {
    respond(Status::Ok, sessions.get_state(game_id).await)
}

#[get("/games/<game_id>/plays")]
pub async fn list_plays(
    sessions: &State<SessionService>,
    _user: AuthUser,
    game_id: &str,
) -> ApiResult<LedgerView> {
    respond(
        Status::Ok,
        sessions.get_state(game_id).await.map(LedgerView::from),
    )
}

#[post("/games/<game_id>/play", format = "json", data = "<submission>")]
pub async fn submit_move(
    sessions: &State<SessionService>,
    user: AuthUser,
    game_id: &str,
    submission: Json<MoveSubmission>,
) -> ApiResult<MoveOutcome> {
    match sessions
        .submit_move(game_id, &user.0, submission.into_inner())
        .await
    {
        Ok(outcome) if outcome.duplicate => respond(Status::Ok, Ok(outcome)),
        result => respond(Status::Created, result),
    }
}

#[put("/games/<game_id>/end", format = "json", data = "<request>")]
pub async fn end_game(
    sessions: &State<SessionService>,
    user: AuthUser,
    game_id: &str,
    request: Json<EndRequest>,
) -> ApiResult<GameResult> {
    respond(
        Status::Ok,
        sessions.end_game(game_id, &user.0, request.winner_id).await,
    )
}

#[delete("/games/<game_id>")]
pub async fn delete_game(
    sessions: &State<SessionService>,
    user: AuthUser,
    game_id: &str,
) -> ApiResult<()> {
    respond(Status::Ok, sessions.delete_game(game_id, &user.0).await)
}
