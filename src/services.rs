pub mod achievement_service;
pub mod analytics_service;
pub mod preference_service;
pub mod search_service;

pub use achievement_service::AchievementService;
pub use analytics_service::AnalyticsService;
pub use preference_service::PreferenceService;
pub use search_service::{SearchError, SearchResult, SearchService};
