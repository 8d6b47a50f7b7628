use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};

use crate::db::{DbError, NewAchievement, UserAchievement};

#[derive(Clone)]
pub struct AchievementRepository {
    pool: PgPool,
}

impl AchievementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record an achievement. Each (user, type) pair can be earned once;
    /// a repeat fails with `DbError::Duplicate`.
    #[instrument(skip(self, achievement), fields(user_id = %achievement.user_id, achievement_type = ?achievement.achievement_type))]
    pub async fn award(&self, achievement: &NewAchievement) -> Result<UserAchievement, DbError> {
        achievement.validate()?;

        let awarded = sqlx::query_as::<_, UserAchievement>(
            r#"
            INSERT INTO user_achievements (user_id, achievement_type, description, points)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, achievement_type, description, points, achieved_at
            "#,
        )
        .bind(achievement.user_id)
        .bind(achievement.achievement_type)
        .bind(achievement.description.trim())
        .bind(achievement.resolved_points())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let err = DbError::from(e);
            if matches!(err, DbError::Duplicate(_)) {
                warn!("Achievement already awarded");
            }
            err
        })?;

        info!("Awarded {} points", awarded.points);
        Ok(awarded)
    }

    /// A user's achievements, newest first
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn find_by_user(&self, user_id: i32) -> Result<Vec<UserAchievement>, DbError> {
        let achievements = sqlx::query_as::<_, UserAchievement>(
            r#"
            SELECT id, user_id, achievement_type, description, points, achieved_at
            FROM user_achievements
            WHERE user_id = $1
            ORDER BY achieved_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        debug!("Found {} achievements", achievements.len());
        Ok(achievements)
    }
}
