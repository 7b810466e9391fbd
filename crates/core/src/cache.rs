use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::plan::{CachedPlan, CallerId, Fingerprint};

/// Namespace used when every caller shares one cache.
pub const SHARED_NAMESPACE: &str = "*shared*";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheScope {
    /// Each caller has a private namespace.
    #[default]
    Caller,
    Shared,
}

impl CacheScope {
    pub fn namespace(self, caller: &CallerId) -> CacheNamespace {
        match self {
            Self::Caller => CacheNamespace(caller.0.clone()),
            Self::Shared => CacheNamespace(SHARED_NAMESPACE.to_string()),
        }
    }
}

impl std::str::FromStr for CacheScope {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "caller" => Ok(Self::Caller),
            "shared" => Ok(Self::Shared),
            other => Err(format!("unsupported cache scope `{other}` (expected caller|shared)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheNamespace(pub String);

/// Result of a write-once store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOutcome {
    Stored,
    /// Same content was already present; nothing changed.
    AlreadyPresent,
    /// Different content is already stored under the key. Advisory: the first
    /// write is kept.
    AlreadyExistsButDiffers,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("plan cache backend failure: {0}")]
    Backend(String),
    #[error("plan cache decode failure: {0}")]
    Decode(String),
}

/// Namespaced, write-once plan store. `lookup` has no side effects.
#[async_trait]
pub trait PlanCache: Send + Sync {
    async fn lookup(
        &self,
        namespace: &CacheNamespace,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CachedPlan>, CacheError>;

    async fn store(
        &self,
        namespace: &CacheNamespace,
        plan: &CachedPlan,
    ) -> Result<StoreOutcome, CacheError>;
}
