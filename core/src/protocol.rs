//! Push-channel messages. Every frame is a JSON object tagged by `"action"`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ColumnSlot, DiceWeights, DieFace, Move, UserId};
use crate::session::SessionSnapshot;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    Authenticate {
        token: String,
    },
    JoinGame {
        game_id: String,
    },
    /// `column` and `dice` stay raw so out-of-range values reach validation
    /// instead of failing to parse.
    MakeMove {
        game_id: String,
        column: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dice: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_move_id: Option<String>,
    },
    RequestDice,
    GetState {
        game_id: String,
    },
    EndGame {
        game_id: String,
        winner_id: UserId,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ServerEvent {
    Authenticated {
        user_id: UserId,
        username: String,
    },
    GameJoined {
        game_id: String,
        code: String,
        is_host: bool,
        opponent_name: Option<String>,
        game_started: bool,
        game_ended: bool,
        winner_id: Option<UserId>,
        snapshot: SessionSnapshot,
    },
    GameState {
        snapshot: SessionSnapshot,
    },
    GameStarted {
        game_id: String,
        opponent_name: Option<String>,
    },
    MoveMade {
        user_id: UserId,
        username: Option<String>,
        dice: DieFace,
        column: ColumnSlot,
        game_id: String,
        move_id: i64,
        timestamp: DateTime<Utc>,
    },
    DiceGenerated {
        dice: DieFace,
        user_id: UserId,
        probabilities: DiceWeights,
    },
    GameEnded {
        game_id: String,
        winner_id: UserId,
        winner_username: Option<String>,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn move_made(recorded: &Move, username: Option<String>) -> Self {
        ServerEvent::MoveMade {
            user_id: recorded.user_id,
            username,
            dice: recorded.dice,
            column: recorded.column,
            game_id: recorded.game_id.clone(),
            move_id: recorded.move_id,
            timestamp: recorded.created_at,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn commands_parse_from_tagged_json() {
        let cmd: ClientCommand = serde_json::from_value(json!({
            "action": "make_move",
            "game_id": "g-1",
            "column": 9,
        }))
        .unwrap();
        assert_eq!(
            cmd,
            ClientCommand::MakeMove {
                game_id: "g-1".into(),
                column: 9,
                dice: None,
                client_move_id: None,
            }
        );

        let cmd: ClientCommand = serde_json::from_str(r#"{"action":"request_dice"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::RequestDice);
    }

    #[test]
    fn unknown_actions_are_rejected() {
        assert!(serde_json::from_str::<ClientCommand>(r#"{"action":"roll_dice"}"#).is_err());
    }

    #[test]
    fn events_carry_the_action_tag() {
        let value = serde_json::to_value(ServerEvent::error("it is not your turn")).unwrap();
        assert_eq!(value, json!({"action": "error", "message": "it is not your turn"}));

        let value = serde_json::to_value(ServerEvent::GameEnded {
            game_id: "g".into(),
            winner_id: 4,
            winner_username: Some("ayla".into()),
        })
        .unwrap();
        assert_eq!(value["action"], "game_ended");
        assert_eq!(value["winner_username"], "ayla");
    }

    #[test]
    fn move_made_uses_plain_numbers() {
        let recorded = Move {
            move_id: 7,
            game_id: "g".into(),
            user_id: 2,
            dice: DieFace::new(5).unwrap(),
            column: ColumnSlot::new(4).unwrap(),
            client_move_id: None,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(ServerEvent::move_made(&recorded, None)).unwrap();
        assert_eq!(value["action"], "move_made");
        assert_eq!(value["dice"], 5);
        assert_eq!(value["column"], 4);
        assert_eq!(value["move_id"], 7);
    }
}
