use thiserror::Error;

use restock_core::cache::CacheError;

pub mod memory;
pub mod plan_cache;

pub use memory::InMemoryPlanCache;
pub use plan_cache::SqlPlanCache;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for CacheError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(error) => CacheError::Backend(error.to_string()),
            RepositoryError::Decode(message) => CacheError::Decode(message),
        }
    }
}
