mod auth;
mod config;
mod response;
mod routes;
#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use matatena_core::repository::game_repository::GameRepository;
use matatena_core::repository::profile_repository::ProfileRepository;
use matatena_core::repository::{GameStore, ProfileStore};
use matatena_core::{DiceService, IdentityProvider, JwtIdentityProvider, RulesPolicy, SessionService};
use mongodb::Client;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::serde::json::Json;
use rocket::{catch, catchers, options, routes, Build, Request, Response, Rocket};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::auth::{AuthFailure, Identities};
use crate::config::ApiConfig;
use crate::response::ApiResponse;

pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, PUT, DELETE, OPTIONS",
        ));
        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        ));
    }
}

#[options("/<_path..>")]
fn all_options(_path: PathBuf) -> Status {
    Status::Ok
}

#[catch(401)]
fn unauthorized(req: &Request) -> Json<ApiResponse<()>> {
    let reason = req
        .local_cache(|| AuthFailure(None))
        .0
        .clone()
        .unwrap_or_else(|| "authentication required".to_string());
    Json(ApiResponse {
        message: format!("401: {}", reason),
        result: None,
    })
}

#[catch(404)]
fn not_found(req: &Request) -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        message: format!("404: '{}' route not found", req.uri()),
        result: None,
    })
}

#[catch(422)]
fn unprocessable(_req: &Request) -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        message: "422: malformed request body".to_string(),
        result: None,
    })
}

/// Assembles the REST surface around already-built services.
pub fn build(
    sessions: SessionService,
    dice: DiceService,
    identities: Arc<dyn IdentityProvider>,
) -> Rocket<Build> {
    rocket::build()
        .manage(sessions)
        .manage(dice)
        .manage(Identities(identities))
        .attach(Cors)
        .mount(
            "/",
            routes![
                all_options,
                routes::games::create_game,
                routes::games::join_game,
                routes::games::get_game,
                routes::games::get_game_by_code,
                routes::games::get_state,
                routes::games::list_plays,
                routes::games::submit_move,
                routes::games::end_game,
                routes::games::delete_game,
                routes::dice::roll,
                routes::dice::get_probabilities,
                routes::dice::update_probabilities,
            ],
        )
        .register("/", catchers![unauthorized, not_found, unprocessable])
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("matatena_api=debug,rocket=info")),
        )
        .init();

    let config = ApiConfig::parse();
    let client = Client::with_uri_str(&config.mongo_uri)
        .await
        .with_context(|| format!("connecting to {}", config.mongo_uri))?;

    let games = GameRepository::new(&client, &config.database);
    games.ensure_indexes().await.context("creating ledger indexes")?;
    let games: Arc<dyn GameStore> = Arc::new(games);
    let profiles: Arc<dyn ProfileStore> =
        Arc::new(ProfileRepository::new(&client, &config.database));

    let rules = if config.strict_rules {
        RulesPolicy::strict()
    } else {
        RulesPolicy::permissive()
    };
    info!(database = %config.database, ?rules, "starting REST server");

    let identities = Arc::new(JwtIdentityProvider::new(config.jwt_secret.as_bytes()));
    build(
        SessionService::new(games, rules),
        DiceService::new(profiles),
        identities,
    )
    .launch()
    .await
    .map_err(|e| anyhow::anyhow!("rocket failed: {}", e))?;
    Ok(())
}
