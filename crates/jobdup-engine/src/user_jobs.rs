//! Jobs posted directly by users link to the site's own item page instead of a partner url.

use std::sync::Arc;

use jobdup_core::{Listing, ListingKind, StoreResult, UserJobDirectory};
use tracing::debug;

pub struct UserJobLinks {
    directory: Arc<dyn UserJobDirectory>,
    base_url: String,
    region_alias: String,
}

impl UserJobLinks {
    pub fn new(
        directory: Arc<dyn UserJobDirectory>,
        base_url: impl Into<String>,
        region_alias: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            region_alias: region_alias.into(),
        }
    }

    pub fn item_url(&self, listing: &Listing) -> String {
        format!(
            "{}/search/item?item_id={}&site_id={}&show=job&region={}",
            self.base_url, listing.id, listing.site_id, self.region_alias
        )
    }

    /// Rewrites the presented url of every user-posted job in one directory lookup.
    pub async fn apply<'a, I>(&self, listings: I) -> StoreResult<usize>
    where
        I: IntoIterator<Item = &'a mut Listing>,
    {
        let jobs = listings
            .into_iter()
            .filter(|l| l.kind == ListingKind::Job && l.external_id.is_some())
            .collect::<Vec<_>>();
        if jobs.is_empty() {
            return Ok(0);
        }

        let external_ids = jobs.iter().filter_map(|l| l.external_id).collect::<Vec<_>>();
        let owned = self.directory.user_job_ids(&external_ids).await?;

        let mut rewritten = 0;
        for listing in jobs {
            if listing.external_id.is_some_and(|ext| owned.contains(&ext)) {
                let url = self.item_url(listing);
                listing.url = url;
                rewritten += 1;
            }
        }
        debug!(rewritten, "user job links applied");
        Ok(rewritten)
    }
}
