use matatena_core::models::{DiceProfile, DiceWeights, DieFace};
use matatena_core::DiceService;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, put, State};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::response::{respond, ApiResult};

#[derive(Serialize, Deserialize, Debug)]
pub struct DiceRoll {
    pub dice: DieFace,
    pub probabilities: DiceWeights,
}

#[get("/dice")]
pub async fn roll(dice: &State<DiceService>, user: AuthUser) -> ApiResult<DiceRoll> {
    let result = dice
        .draw(user.0.user_id)
        .await
        .map(|(face, probabilities)| DiceRoll { dice: face, probabilities });
    respond(Status::Ok, result)
}

#[get("/dice/probabilities")]
pub async fn get_probabilities(
    dice: &State<DiceService>,
    user: AuthUser,
) -> ApiResult<DiceProfile> {
    respond(Status::Ok, dice.profile(user.0.user_id).await)
}

#[put("/dice/probabilities", format = "json", data = "<weights>")]
pub async fn update_probabilities(
    dice: &State<DiceService>,
    user: AuthUser,
    weights: Json<DiceWeights>,
) -> ApiResult<DiceProfile> {
    respond(
        Status::Ok,
        dice.update_weights(user.0.user_id, weights.into_inner()).await,
    )
}
