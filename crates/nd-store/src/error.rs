use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("notification not found: {0}")]
    NotFound(uuid::Uuid),

    #[error("duplicate notification id: {0}")]
    Duplicate(uuid::Uuid),
}

pub type Result<T> = std::result::Result<T, StoreError>;
