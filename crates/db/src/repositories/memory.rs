use std::collections::HashMap;

use tokio::sync::RwLock;

use restock_core::cache::{CacheError, CacheNamespace, PlanCache, StoreOutcome};
use restock_core::domain::plan::{CachedPlan, Fingerprint};

type CacheKey = (String, String);

/// Plan cache held in process memory. The write lock makes each store atomic.
#[derive(Default)]
pub struct InMemoryPlanCache {
    plans: RwLock<HashMap<CacheKey, CachedPlan>>,
}

impl InMemoryPlanCache {
    pub async fn len(&self) -> usize {
        self.plans.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.plans.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl PlanCache for InMemoryPlanCache {
    async fn lookup(
        &self,
        namespace: &CacheNamespace,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CachedPlan>, CacheError> {
        let plans = self.plans.read().await;
        Ok(plans.get(&(namespace.0.clone(), fingerprint.0.clone())).cloned())
    }

    async fn store(
        &self,
        namespace: &CacheNamespace,
        plan: &CachedPlan,
    ) -> Result<StoreOutcome, CacheError> {
        let mut plans = self.plans.write().await;
        let key = (namespace.0.clone(), plan.fingerprint.0.clone());

        match plans.get(&key) {
            Some(existing) if existing.response_body == plan.response_body => {
                Ok(StoreOutcome::AlreadyPresent)
            }
            Some(_) => Ok(StoreOutcome::AlreadyExistsButDiffers),
            None => {
                plans.insert(key, plan.clone());
                Ok(StoreOutcome::Stored)
            }
        }
    }
}
