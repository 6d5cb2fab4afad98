use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    Active,
    Finished,
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            GameStatus::Waiting => "waiting",
            GameStatus::Active => "active",
            GameStatus::Finished => "finished",
        };
        write!(f, "{}", status)
    }
}

/// One half of the board. The host owns slots 1-3, the guest slots 4-6.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Host,
    Guest,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Host => Side::Guest,
            Side::Guest => Side::Host,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Game {
    pub game_id: String,
    pub code: String,
    pub host_id: UserId,
    pub host_username: String,
    pub guest_id: Option<UserId>,
    pub guest_username: Option<String>,
    pub winner_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Game {
    pub fn new(game_id: String, code: String, host_id: UserId, host_username: String) -> Self {
        Game {
            game_id,
            code,
            host_id,
            host_username,
            guest_id: None,
            guest_username: None,
            winner_id: None,
            created_at: Utc::now(),
            ended_at: None,
        }
    }

    /// An end timestamp wins over everything else; otherwise the guest decides.
    pub fn status(&self) -> GameStatus {
        if self.ended_at.is_some() {
            GameStatus::Finished
        } else if self.guest_id.is_some() {
            GameStatus::Active
        } else {
            GameStatus::Waiting
        }
    }

    pub fn side_of(&self, user_id: UserId) -> Option<Side> {
        if self.host_id == user_id {
            Some(Side::Host)
        } else if self.guest_id == Some(user_id) {
            Some(Side::Guest)
        } else {
            None
        }
    }

    pub fn is_participant(&self, user_id: UserId) -> bool {
        self.side_of(user_id).is_some()
    }

    pub fn user_on(&self, side: Side) -> Option<UserId> {
        match side {
            Side::Host => Some(self.host_id),
            Side::Guest => self.guest_id,
        }
    }

    pub fn username_of(&self, user_id: UserId) -> Option<&str> {
        match self.side_of(user_id)? {
            Side::Host => Some(self.host_username.as_str()),
            Side::Guest => self.guest_username.as_deref(),
        }
    }

    /// Name of the other participant as seen by `user_id`.
    pub fn opponent_name(&self, user_id: UserId) -> Option<&str> {
        match self.side_of(user_id)? {
            Side::Host => self.guest_username.as_deref(),
            Side::Guest => Some(self.host_username.as_str()),
        }
    }

    pub fn winner_username(&self) -> Option<&str> {
        self.winner_id.and_then(|id| self.username_of(id))
    }
}
