use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::models::game::UserId;

/// Relative weight of each face. Need not sum to 1.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct DiceWeights {
    pub dice_1: f64,
    pub dice_2: f64,
    pub dice_3: f64,
    pub dice_4: f64,
    pub dice_5: f64,
    pub dice_6: f64,
}

impl DiceWeights {
    pub fn uniform() -> Self {
        Self::from_array([1.0 / 6.0; 6])
    }

    pub fn from_array(w: [f64; 6]) -> Self {
        DiceWeights {
            dice_1: w[0],
            dice_2: w[1],
            dice_3: w[2],
            dice_4: w[3],
            dice_5: w[4],
            dice_6: w[5],
        }
    }

    pub fn as_array(&self) -> [f64; 6] {
        [
            self.dice_1,
            self.dice_2,
            self.dice_3,
            self.dice_4,
            self.dice_5,
            self.dice_6,
        ]
    }

    /// Every weight must be a finite, non-negative number.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.as_array().iter().all(|w| w.is_finite() && *w >= 0.0) {
            Ok(())
        } else {
            Err(SessionError::InvalidRequest(
                "probabilities must be non-negative numbers".to_string(),
            ))
        }
    }
}

impl Default for DiceWeights {
    fn default() -> Self {
        Self::uniform()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DiceProfile {
    pub user_id: UserId,
    pub weights: DiceWeights,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiceProfile {
    pub fn uniform(user_id: UserId) -> Self {
        let now = Utc::now();
        DiceProfile {
            user_id,
            weights: DiceWeights::uniform(),
            created_at: now,
            updated_at: now,
        }
    }
}
