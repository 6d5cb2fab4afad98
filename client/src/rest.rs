use matatena_core::models::{DiceProfile, DiceWeights, DieFace, Game, MoveSubmission, UserId};
use matatena_core::{GameResult, MoveOutcome, SessionSnapshot};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ClientError;

#[derive(Deserialize)]
struct Envelope<T> {
    message: String,
    result: Option<T>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct DiceRoll {
    pub dice: DieFace,
    pub probabilities: DiceWeights,
}

/// The pull path: request/response calls against the REST server.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> Self {
        RestClient {
            http: reqwest::Client::new(),
            base_url: config.rest_url.clone(),
            token: config.token.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let envelope: Envelope<T> = response.json().await?;
        debug!(status = status.as_u16(), message = %envelope.message, "rest response");
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: envelope.message,
            });
        }
        Ok(envelope.result)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        self.call(request).await?.ok_or_else(|| ClientError::Api {
            status: 200,
            message: "response carried no result".to_string(),
        })
    }

    pub async fn create_game(&self) -> Result<Game, ClientError> {
        self.fetch(self.request(Method::POST, "/games")).await
    }

    pub async fn join_game(&self, code: &str) -> Result<Game, ClientError> {
        let request = self
            .request(Method::POST, "/games/join")
            .json(&json!({ "code": code }));
        self.fetch(request).await
    }

    pub async fn get_game(&self, game_id: &str) -> Result<Game, ClientError> {
        self.fetch(self.request(Method::GET, &format!("/games/{}", game_id)))
            .await
    }

    pub async fn get_game_by_code(&self, code: &str) -> Result<Game, ClientError> {
        let request = self.request(Method::GET, "/games").query(&[("code", code)]);
        self.fetch(request).await
    }

    pub async fn get_state(&self, game_id: &str) -> Result<SessionSnapshot, ClientError> {
        self.fetch(self.request(Method::GET, &format!("/games/{}/state", game_id)))
            .await
    }

    pub async fn submit_move(
        &self,
        game_id: &str,
        submission: &MoveSubmission,
    ) -> Result<MoveOutcome, ClientError> {
        let request = self
            .request(Method::POST, &format!("/games/{}/play", game_id))
            .json(submission);
        self.fetch(request).await
    }

    pub async fn end_game(&self, game_id: &str, winner_id: UserId) -> Result<GameResult, ClientError> {
        let request = self
            .request(Method::PUT, &format!("/games/{}/end", game_id))
            .json(&json!({ "winner_id": winner_id }));
        self.fetch(request).await
    }

    pub async fn delete_game(&self, game_id: &str) -> Result<(), ClientError> {
        self.call::<serde_json::Value>(self.request(Method::DELETE, &format!("/games/{}", game_id)))
            .await?;
        Ok(())
    }

    pub async fn roll_dice(&self) -> Result<DiceRoll, ClientError> {
        self.fetch(self.request(Method::GET, "/dice")).await
    }

    pub async fn dice_profile(&self) -> Result<DiceProfile, ClientError> {
        self.fetch(self.request(Method::GET, "/dice/probabilities"))
            .await
    }

    pub async fn update_dice_profile(&self, weights: &DiceWeights) -> Result<DiceProfile, ClientError> {
        let request = self
            .request(Method::PUT, "/dice/probabilities")
            .json(weights);
        self.fetch(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers one HTTP request with a canned response and hands back the
    /// request head it saw.
    async fn serve_once(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });
        (url, task)
    }

    fn client(url: &str) -> RestClient {
        RestClient::new(&ClientConfig::new(url, "ws://unused", "tok"))
    }

    #[tokio::test]
    async fn error_envelopes_become_api_errors() {
        let body = json!({ "message": "409: the game is already full", "result": null }).to_string();
        let (url, server) = serve_once("409 Conflict", body).await;

        let err = client(&url).join_game("ABCDE").await.unwrap_err();
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 409);
                assert!(message.contains("already full"));
            }
            other => panic!("unexpected {:?}", other),
        }
        let head = server.await.unwrap();
        assert!(head.starts_with("POST /games/join"));
        assert!(head.to_lowercase().contains("authorization: bearer tok"));
    }

    #[tokio::test]
    async fn success_envelopes_yield_the_result() {
        let body = json!({
            "message": "200: OK",
            "result": { "dice": 4, "probabilities": {
                "dice_1": 1.0, "dice_2": 1.0, "dice_3": 1.0,
                "dice_4": 1.0, "dice_5": 1.0, "dice_6": 1.0
            }}
        })
        .to_string();
        let (url, server) = serve_once("200 OK", body).await;

        let roll = client(&url).roll_dice().await.unwrap();
        assert_eq!(roll.dice.value(), 4);
        assert!(server.await.unwrap().starts_with("GET /dice"));
    }
}
