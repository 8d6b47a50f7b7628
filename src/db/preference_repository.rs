use sqlx::PgPool;
use tracing::{debug, info, instrument};

use crate::db::{DbError, PreferenceUpdate, UserPreference};

#[derive(Clone)]
pub struct PreferenceRepository {
    pool: PgPool,
}

impl PreferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn find_by_user(&self, user_id: i32) -> Result<Option<UserPreference>, DbError> {
        debug!("Querying preference by user_id");

        let preference = sqlx::query_as::<_, UserPreference>(
            r#"
            SELECT user_id, favorite_city, temperature_unit, theme, created_at, updated_at
            FROM user_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        if preference.is_some() {
            debug!("Found preference");
        } else {
            debug!("Preference not found");
        }

        Ok(preference)
    }

    /// Insert or replace the single preference row for a user
    #[instrument(skip(self, update), fields(user_id = %user_id))]
    pub async fn upsert(
        &self,
        user_id: i32,
        update: &PreferenceUpdate,
    ) -> Result<UserPreference, DbError> {
        update.validate()?;

        let favorite_city = update
            .favorite_city
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let preference = sqlx::query_as::<_, UserPreference>(
            r#"
            INSERT INTO user_preferences (user_id, favorite_city, temperature_unit, theme, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                favorite_city = EXCLUDED.favorite_city,
                temperature_unit = EXCLUDED.temperature_unit,
                theme = EXCLUDED.theme,
                updated_at = NOW()
            RETURNING user_id, favorite_city, temperature_unit, theme, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(favorite_city)
        .bind(update.temperature_unit)
        .bind(update.theme)
        .fetch_one(&self.pool)
        .await?;

        info!("Saved preference for user {}", user_id);
        Ok(preference)
    }
}
