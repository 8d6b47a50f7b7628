use tracing::instrument;

use crate::db::{DbError, PreferenceRepository, PreferenceUpdate, UserPreference};

#[derive(Clone)]
pub struct PreferenceService {
    preference_repo: PreferenceRepository,
}

impl PreferenceService {
    pub fn new(preference_repo: PreferenceRepository) -> Self {
        Self { preference_repo }
    }

    /// Stored preference, or the defaults (celsius, light) when none is saved
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_or_default(&self, user_id: i32) -> Result<UserPreference, DbError> {
        Ok(self
            .preference_repo
            .find_by_user(user_id)
            .await?
            .unwrap_or_else(|| UserPreference::default_for(user_id)))
    }

    #[instrument(skip(self, update), fields(user_id = %user_id))]
    pub async fn save(
        &self,
        user_id: i32,
        update: &PreferenceUpdate,
    ) -> Result<UserPreference, DbError> {
        self.preference_repo.upsert(user_id, update).await
    }
}
