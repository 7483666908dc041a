//! Whether a job carries the tenant's freelance employment filter, cached per tenant and employment id.

use std::sync::Arc;
use std::time::Duration;

use jobdup_core::{CacheStore, FilterDirectory, Listing, ListingId, StoreResult, TenantDirectory, TenantId};
use tracing::warn;

pub const FREELANCE_CACHE_PREFIX: &str = "jobdup:is_freelance";

pub fn freelance_cache_key(tenant_id: TenantId, listing_id: ListingId) -> String {
    format!("{FREELANCE_CACHE_PREFIX}:{tenant_id}:{listing_id}")
}

/// Cached check of a listing's employment type against the tenant's freelance filter.
pub struct FreelanceClassifier {
    cache: Arc<dyn CacheStore>,
    filters: Arc<dyn FilterDirectory>,
    tenants: Arc<dyn TenantDirectory>,
    ttl: Duration,
}

impl FreelanceClassifier {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        filters: Arc<dyn FilterDirectory>,
        tenants: Arc<dyn TenantDirectory>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            filters,
            tenants,
            ttl,
        }
    }

    pub async fn is_freelance(&self, listing: &Listing) -> StoreResult<bool> {
        let Some(employment) = listing.employment else {
            return Ok(false);
        };

        let tenant_id = match listing.country_id {
            Some(country_id) => self
                .tenants
                .tenant_for_country(country_id)
                .await?
                .map(|t| t.tenant_id)
                .unwrap_or_default(),
            None => 0,
        };
        let key = freelance_cache_key(tenant_id, listing.id);

        match self.cache.get(&key).await {
            Ok(Some(cached)) => return Ok(cached == "1"),
            Ok(None) => {}
            Err(err) => warn!(%key, error = %err, "freelance cache read failed; recomputing"),
        }

        // No filter configured is not cached: the tenant may add one later.
        let Some(filter_id) = self.filters.freelance_filter_id(tenant_id).await? else {
            return Ok(false);
        };

        let result = employment == filter_id;
        let value = if result { "1" } else { "0" };
        if let Err(err) = self.cache.set(&key, value.to_string(), self.ttl).await {
            warn!(%key, error = %err, "freelance cache write failed");
        }
        Ok(result)
    }
}
