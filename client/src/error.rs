use matatena_core::models::{ColumnSlot, DieFace};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("server answered {status}: {message}")]
    Api { status: u16, message: String },
    #[error("server rejected the connection: {0}")]
    Rejected(String),
    #[error("no answer within {0:?}")]
    Timeout(std::time::Duration),
    #[error("push connection lost after {attempts} reconnect attempts")]
    Disconnected { attempts: u32 },
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("no die is waiting to be placed")]
    NoDieHeld,
    #[error("a move is already being submitted")]
    Busy,
    #[error("die {offered} is not the die in hand ({held})")]
    StaleDie { held: DieFace, offered: DieFace },
    #[error("column {0} is full")]
    ColumnFull(ColumnSlot),
    #[error("column {0} belongs to the other player")]
    OpponentColumn(ColumnSlot),
    #[error("the game is over")]
    GameOver,
}

impl ClientError {
    /// Failures of the move itself, as opposed to the transport carrying it.
    pub fn is_rule_violation(&self) -> bool {
        matches!(
            self,
            ClientError::NotYourTurn
                | ClientError::NoDieHeld
                | ClientError::Busy
                | ClientError::StaleDie { .. }
                | ClientError::ColumnFull(_)
                | ClientError::OpponentColumn(_)
                | ClientError::GameOver
        )
    }
}
