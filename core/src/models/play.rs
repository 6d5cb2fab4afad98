use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::models::game::{Side, UserId};

/// A die face, always 1..=6.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub struct DieFace(u8);

impl DieFace {
    pub const ALL: [DieFace; 6] = [
        DieFace(1),
        DieFace(2),
        DieFace(3),
        DieFace(4),
        DieFace(5),
        DieFace(6),
    ];

    pub fn new(value: i64) -> Result<Self, SessionError> {
        if (1..=6).contains(&value) {
            Ok(DieFace(value as u8))
        } else {
            Err(SessionError::InvalidRequest(format!(
                "die face must be between 1 and 6, got {}",
                value
            )))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for DieFace {
    type Error = SessionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        DieFace::new(i64::from(value))
    }
}

impl From<DieFace> for u8 {
    fn from(face: DieFace) -> u8 {
        face.0
    }
}

impl std::fmt::Display for DieFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the six logical column slots: 1-3 belong to the host, 4-6 to the guest.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub struct ColumnSlot(u8);

impl ColumnSlot {
    pub const ALL: [ColumnSlot; 6] = [
        ColumnSlot(1),
        ColumnSlot(2),
        ColumnSlot(3),
        ColumnSlot(4),
        ColumnSlot(5),
        ColumnSlot(6),
    ];

    pub fn new(value: i64) -> Result<Self, SessionError> {
        if (1..=6).contains(&value) {
            Ok(ColumnSlot(value as u8))
        } else {
            Err(SessionError::InvalidRequest(format!(
                "column must be 1, 2, 3, 4, 5 or 6, got {}",
                value
            )))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Zero-based position in the six-slot board.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub fn side(self) -> Side {
        if self.0 <= 3 {
            Side::Host
        } else {
            Side::Guest
        }
    }

    /// The opposing slot at the same position: 1<->4, 2<->5, 3<->6.
    pub fn mirror(self) -> ColumnSlot {
        if self.0 <= 3 {
            ColumnSlot(self.0 + 3)
        } else {
            ColumnSlot(self.0 - 3)
        }
    }

    pub fn for_side(side: Side) -> [ColumnSlot; 3] {
        match side {
            Side::Host => [ColumnSlot(1), ColumnSlot(2), ColumnSlot(3)],
            Side::Guest => [ColumnSlot(4), ColumnSlot(5), ColumnSlot(6)],
        }
    }
}

impl TryFrom<u8> for ColumnSlot {
    type Error = SessionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ColumnSlot::new(i64::from(value))
    }
}

impl From<ColumnSlot> for u8 {
    fn from(slot: ColumnSlot) -> u8 {
        slot.0
    }
}

impl std::fmt::Display for ColumnSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A recorded ledger entry. `move_id` is the only total order within a game.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Move {
    pub move_id: i64,
    pub game_id: String,
    pub user_id: UserId,
    pub dice: DieFace,
    pub column: ColumnSlot,
    #[serde(default)]
    pub client_move_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A validated move waiting for its sequence id.
#[derive(Debug, Clone)]
pub struct NewMove {
    pub game_id: String,
    pub user_id: UserId,
    pub dice: DieFace,
    pub column: ColumnSlot,
    pub client_move_id: Option<String>,
}

/// Raw move input as it arrives from a caller, validated by the session layer.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MoveSubmission {
    pub column: i64,
    pub dice: i64,
    #[serde(default)]
    pub client_move_id: Option<String>,
}
