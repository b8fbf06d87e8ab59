use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use crate::error::AppError;
use crate::model::role::Role;
use crate::model::user::UserProfile;
use crate::store::UserDirectory;

/// Location rosters are read on every clock event and every sheet rewrite,
/// so they are kept in memory for a short TTL. Single-user and role lookups
/// pass straight through.
pub struct CachedDirectory {
    inner: Arc<dyn UserDirectory>,
    rosters: Option<Cache<String, Arc<Vec<UserProfile>>>>,
}

impl CachedDirectory {
    /// A zero TTL disables caching.
    pub fn new(inner: Arc<dyn UserDirectory>, ttl: Duration) -> Self {
        let rosters = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(1_000) // one entry per location
                .time_to_live(ttl)
                .build()
        });
        Self { inner, rosters }
    }
}

#[async_trait]
impl UserDirectory for CachedDirectory {
    async fn get(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        self.inner.get(user_id).await
    }

    async fn at_location(&self, location: &str) -> Result<Vec<UserProfile>, AppError> {
        let Some(cache) = &self.rosters else {
            return self.inner.at_location(location).await;
        };

        if let Some(hit) = cache.get(location).await {
            return Ok(hit.as_ref().clone());
        }

        // Errors are not cached
        let roster = Arc::new(self.inner.at_location(location).await?);
        cache.insert(location.to_string(), roster.clone()).await;
        tracing::debug!(location, users = roster.len(), "Roster cached");
        Ok(roster.as_ref().clone())
    }

    async fn with_role(&self, role: Role) -> Result<Vec<UserProfile>, AppError> {
        self.inner.with_role(role).await
    }
}
