#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    SqlxError(sqlx::Error),
    #[error("Duplicate record: {0}")]
    Duplicate(String),
    #[error("Invalid record: {0}")]
    Invalid(#[from] ValidationError),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                let constraint = db_err.constraint().unwrap_or("unique constraint");
                DbError::Duplicate(format!("{} violates {}", db_err.message(), constraint))
            }
            _ => DbError::SqlxError(err),
        }
    }
}

/// Field-level validation failure for a record about to be written
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}
