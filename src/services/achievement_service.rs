use serde::Serialize;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::db::{AchievementRepository, DbError, NewAchievement, UserAchievement};

/// Ascending point thresholds a user works toward
pub const MILESTONE_LADDER: [i64; 6] = [50, 100, 250, 500, 1000, 1500];

pub const DEFAULT_USER_ID: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Milestone {
    pub points: i64,
    /// Can be zero or negative once the top of the ladder is passed
    pub remaining: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AchievementView {
    #[serde(flatten)]
    pub achievement: UserAchievement,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AchievementSummary {
    pub user_id: i32,
    pub achievements: Vec<AchievementView>,
    pub total_points: i64,
    pub next_milestone: Milestone,
}

/// Smallest ladder value strictly above `total_points`. Past the top rung
/// the milestone stays at 1500 and `remaining` is not clamped.
pub fn next_milestone(total_points: i64) -> Milestone {
    let top = MILESTONE_LADDER[MILESTONE_LADDER.len() - 1];
    let points = MILESTONE_LADDER
        .iter()
        .copied()
        .find(|&m| m > total_points)
        .unwrap_or(top);

    Milestone {
        points,
        remaining: points - total_points,
    }
}

#[derive(Clone)]
pub struct AchievementService {
    achievement_repo: AchievementRepository,
}

impl AchievementService {
    pub fn new(achievement_repo: AchievementRepository) -> Self {
        Self { achievement_repo }
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn summary(&self, user_id: i32) -> Result<AchievementSummary, DbError> {
        let achievements = self.achievement_repo.find_by_user(user_id).await?;
        let total_points: i64 = achievements.iter().map(|a| i64::from(a.points)).sum();
        let next_milestone = next_milestone(total_points);

        debug!(
            "User has {} achievements worth {} points, next milestone {}",
            achievements.len(),
            total_points,
            next_milestone.points
        );

        Ok(AchievementSummary {
            user_id,
            achievements: achievements
                .into_iter()
                .map(|achievement| AchievementView {
                    label: achievement.achievement_type.label().to_string(),
                    achievement,
                })
                .collect(),
            total_points,
            next_milestone,
        })
    }

    #[instrument(skip(self, achievement), fields(user_id = %achievement.user_id))]
    pub async fn award(&self, achievement: &NewAchievement) -> Result<UserAchievement, DbError> {
        self.achievement_repo.award(achievement).await
    }
}
