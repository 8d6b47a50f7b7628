pub mod achievement_repository;
pub mod error;
pub mod models;
pub mod observation_repository;
pub mod pool;
pub mod preference_repository;
pub mod search_history_repository;

pub use achievement_repository::AchievementRepository;
pub use error::{DbError, ValidationError};
pub use models::*;
pub use observation_repository::ObservationRepository;
pub use pool::{connect, run_migrations};
pub use preference_repository::PreferenceRepository;
pub use search_history_repository::SearchHistoryRepository;
