use std::sync::Arc;

use matatena_core::models::{DiceProfile, Game, GameStatus};
use matatena_core::repository::memory::InMemoryStore;
use matatena_core::{
    DiceService, GameResult, JwtIdentityProvider, MoveOutcome, RulesPolicy, SessionService,
    SessionSnapshot,
};
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use serde_json::json;

use crate::response::ApiResponse;
use crate::routes::dice::DiceRoll;
use crate::routes::games::LedgerView;

const SECRET: &[u8] = b"test-secret";

async fn client() -> Client {
    let store = Arc::new(InMemoryStore::new());
    let rocket = crate::build(
        SessionService::new(store.clone(), RulesPolicy::permissive()),
        DiceService::new(store),
        Arc::new(JwtIdentityProvider::new(SECRET)),
    );
    Client::tracked(rocket).await.expect("valid rocket instance")
}

fn bearer(user_id: i64, username: &str) -> Header<'static> {
    let token = JwtIdentityProvider::new(SECRET)
        .create_token(user_id, username)
        .unwrap();
    Header::new("Authorization", format!("Bearer {}", token))
}

async fn create(client: &Client) -> Game {
    let response = client
        .post("/games")
        .header(bearer(1, "host"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    response
        .into_json::<ApiResponse<Game>>()
        .await
        .unwrap()
        .result
        .unwrap()
}

async fn join(client: &Client, code: &str) -> Game {
    let response = client
        .post("/games/join")
        .header(bearer(2, "guest"))
        .header(ContentType::JSON)
        .body(json!({ "code": code }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    response
        .into_json::<ApiResponse<Game>>()
        .await
        .unwrap()
        .result
        .unwrap()
}

#[rocket::async_test]
async fn missing_token_is_unauthorized() {
    let client = client().await;
    let response = client.post("/games").dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);
    let body = response.into_json::<ApiResponse<()>>().await.unwrap();
    assert!(body.message.starts_with("401"));

    let response = client
        .post("/games")
        .header(Header::new("Authorization", "Bearer not-a-token"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);
}

#[rocket::async_test]
async fn create_join_play_and_poll() {
    let client = client().await;
    let game = create(&client).await;
    assert_eq!(game.status(), GameStatus::Waiting);
    assert_eq!(game.host_username, "host");

    let joined = join(&client, &game.code.to_lowercase()).await;
    assert_eq!(joined.game_id, game.game_id);
    assert_eq!(joined.status(), GameStatus::Active);

    let response = client
        .post(format!("/games/{}/play", game.game_id))
        .header(bearer(1, "host"))
        .header(ContentType::JSON)
        .body(json!({ "column": 1, "dice": 3, "client_move_id": "h-1" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    let outcome = response
        .into_json::<ApiResponse<MoveOutcome>>()
        .await
        .unwrap()
        .result
        .unwrap();
    assert_eq!(outcome.current_turn, Some(2));

    // the same move arriving again over the other path is not appended twice
    let response = client
        .post(format!("/games/{}/play", game.game_id))
        .header(bearer(1, "host"))
        .header(ContentType::JSON)
        .body(json!({ "column": 1, "dice": 3, "client_move_id": "h-1" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let response = client
        .get(format!("/games/{}/plays", game.game_id))
        .header(bearer(2, "guest"))
        .dispatch()
        .await;
    let view = response
        .into_json::<ApiResponse<LedgerView>>()
        .await
        .unwrap()
        .result
        .unwrap();
    assert_eq!(view.ledger_len, 1);
    assert_eq!(view.current_turn, Some(2));

    let response = client
        .get(format!("/games/{}/state", game.game_id))
        .header(bearer(2, "guest"))
        .dispatch()
        .await;
    let snapshot = response
        .into_json::<ApiResponse<SessionSnapshot>>()
        .await
        .unwrap()
        .result
        .unwrap();
    assert_eq!(snapshot.host_score, 3);
    assert_eq!(snapshot.status, GameStatus::Active);

    let response = client
        .get(format!("/games?code={}", game.code))
        .header(bearer(2, "guest"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
}

#[rocket::async_test]
async fn errors_map_to_status_codes() {
    let client = client().await;
    let game = create(&client).await;

    let response = client
        .post("/games/join")
        .header(bearer(1, "host"))
        .header(ContentType::JSON)
        .body(json!({ "code": game.code }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);

    let response = client
        .post("/games/join")
        .header(bearer(2, "guest"))
        .header(ContentType::JSON)
        .body(json!({ "code": "NOPE0" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);

    join(&client, &game.code).await;
    let response = client
        .post("/games/join")
        .header(bearer(3, "late"))
        .header(ContentType::JSON)
        .body(json!({ "code": game.code }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Conflict);

    let response = client
        .post(format!("/games/{}/play", game.game_id))
        .header(bearer(3, "late"))
        .header(ContentType::JSON)
        .body(json!({ "column": 1, "dice": 3 }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    let response = client
        .post(format!("/games/{}/play", game.game_id))
        .header(bearer(1, "host"))
        .header(ContentType::JSON)
        .body(json!({ "column": 7, "dice": 3 }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);

    let response = client
        .delete(format!("/games/{}", game.game_id))
        .header(bearer(2, "guest"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);
}

#[rocket::async_test]
async fn end_then_delete() {
    let client = client().await;
    let game = create(&client).await;
    join(&client, &game.code).await;

    let response = client
        .put(format!("/games/{}/end", game.game_id))
        .header(bearer(2, "guest"))
        .header(ContentType::JSON)
        .body(json!({ "winner_id": 2 }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let result = response
        .into_json::<ApiResponse<GameResult>>()
        .await
        .unwrap()
        .result
        .unwrap();
    assert_eq!(result.winner_username.as_deref(), Some("guest"));

    let response = client
        .delete(format!("/games/{}", game.game_id))
        .header(bearer(1, "host"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let response = client
        .get(format!("/games/{}", game.game_id))
        .header(bearer(1, "host"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);
}

#[rocket::async_test]
async fn dice_profile_endpoints() {
    let client = client().await;

    let response = client
        .get("/dice/probabilities")
        .header(bearer(5, "dana"))
        .dispatch()
        .await;
    let profile = response
        .into_json::<ApiResponse<DiceProfile>>()
        .await
        .unwrap()
        .result
        .unwrap();
    assert!((profile.weights.dice_1 - 1.0 / 6.0).abs() < 1e-9);

    let response = client
        .put("/dice/probabilities")
        .header(bearer(5, "dana"))
        .header(ContentType::JSON)
        .body(json!({"dice_1":0,"dice_2":0,"dice_3":0,"dice_4":0,"dice_5":0,"dice_6":1}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let response = client.get("/dice").header(bearer(5, "dana")).dispatch().await;
    let roll = response
        .into_json::<ApiResponse<DiceRoll>>()
        .await
        .unwrap()
        .result
        .unwrap();
    assert_eq!(roll.dice.value(), 6);

    let response = client
        .put("/dice/probabilities")
        .header(bearer(5, "dana"))
        .header(ContentType::JSON)
        .body(json!({"dice_1":-1,"dice_2":0,"dice_3":0,"dice_4":0,"dice_5":0,"dice_6":1}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
}

#[rocket::async_test]
async fn unknown_routes_use_the_envelope() {
    let client = client().await;
    let response = client.get("/nowhere").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
    let body = response.into_json::<ApiResponse<()>>().await.unwrap();
    assert!(body.message.contains("/nowhere"));
}

#[rocket::async_test]
async fn preflight_requests_get_cors_headers() {
    let client = client().await;
    let response = client.options("/games/abc/play").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(
        response.headers().get_one("Access-Control-Allow-Origin"),
        Some("*")
    );
}
