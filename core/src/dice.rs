//! Weighted die selection and the per-user dice profiles it draws from.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info};

use crate::error::SessionError;
use crate::models::{DiceProfile, DiceWeights, DieFace, UserId};
use crate::repository::ProfileStore;

/// Inverse-CDF draw over six weights. All-zero weights fall back to a uniform
/// draw; face 6 is returned if rounding leaves the sample above every bucket.
pub fn select_face<R: Rng + ?Sized>(weights: &DiceWeights, rng: &mut R) -> DieFace {
    let weights = weights.as_array();
    let total: f64 = weights.iter().sum();

    if total == 0.0 {
        return DieFace::ALL[rng.gen_range(0..6)];
    }

    let sample: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (face, weight) in DieFace::ALL.iter().zip(weights) {
        cumulative += weight / total;
        if sample <= cumulative {
            return *face;
        }
    }
    DieFace::ALL[5]
}

/// Draws faces for users from their persisted weights, creating a uniform
/// profile the first time a user needs one.
#[derive(Clone)]
pub struct DiceService {
    profiles: Arc<dyn ProfileStore>,
}

impl DiceService {
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self { profiles }
    }

    pub async fn profile(&self, user_id: UserId) -> Result<DiceProfile, SessionError> {
        if let Some(profile) = self.profiles.find_profile(user_id).await? {
            return Ok(profile);
        }
        let profile = DiceProfile::uniform(user_id);
        self.profiles.save_profile(&profile).await?;
        info!(user_id, "created uniform dice profile");
        Ok(profile)
    }

    pub async fn update_weights(
        &self,
        user_id: UserId,
        weights: DiceWeights,
    ) -> Result<DiceProfile, SessionError> {
        weights.validate()?;
        let mut profile = self.profile(user_id).await?;
        profile.weights = weights;
        profile.updated_at = Utc::now();
        self.profiles.save_profile(&profile).await?;
        Ok(profile)
    }

    /// One face for `user_id` plus the weights it was drawn from.
    pub async fn draw(&self, user_id: UserId) -> Result<(DieFace, DiceWeights), SessionError> {
        let profile = self.profile(user_id).await?;
        let face = select_face(&profile.weights, &mut rand::thread_rng());
        debug!(user_id, dice = face.value(), "drew die");
        Ok((face, profile.weights))
    }
}
