use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::ReplaceOptions;
use mongodb::{Client, Collection};

use crate::models::{DiceProfile, UserId};
use crate::repository::{ProfileStore, RepoError};

#[derive(Clone)]
pub struct ProfileRepository {
    collection: Collection<DiceProfile>,
}

impl ProfileRepository {
    pub fn new(client: &Client, database: &str) -> Self {
        let collection = client
            .database(database)
            .collection::<DiceProfile>("dice_profiles");
        ProfileRepository { collection }
    }
}

#[async_trait]
impl ProfileStore for ProfileRepository {
    async fn find_profile(&self, user_id: UserId) -> Result<Option<DiceProfile>, RepoError> {
        Ok(self
            .collection
            .find_one(doc! { "user_id": user_id }, None)
            .await?)
    }

    async fn save_profile(&self, profile: &DiceProfile) -> Result<(), RepoError> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.collection
            .replace_one(doc! { "user_id": profile.user_id }, profile, options)
            .await?;
        Ok(())
    }
}
