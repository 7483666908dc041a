//! Query-time assembly of search results with duplicate substitution.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use jobdup_core::{
    ContentHash, DuplicateIndex, DuplicateRecord, Listing, ListingId, ListingKind, ListingStore,
    PartnerSiteDirectory, SiteId, StoreResult, TenantPolicy,
};
use rand::Rng;
use tracing::{debug, info_span, Instrument};

use crate::selector::{Candidate, DuplicateSelector, Selection};
use crate::user_jobs::UserJobLinks;

pub struct SearchResultAssembler {
    listings: Arc<dyn ListingStore>,
    duplicates: Arc<dyn DuplicateIndex>,
    sites: Arc<dyn PartnerSiteDirectory>,
    user_links: Option<UserJobLinks>,
}

struct HashGroup {
    hash: ContentHash,
    members: Vec<ListingId>,
}

impl SearchResultAssembler {
    pub fn new(
        listings: Arc<dyn ListingStore>,
        duplicates: Arc<dyn DuplicateIndex>,
        sites: Arc<dyn PartnerSiteDirectory>,
    ) -> Self {
        Self {
            listings,
            duplicates,
            sites,
            user_links: None,
        }
    }

    /// Fetched user-posted jobs present the site's own item page before substitution runs.
    pub fn with_user_job_links(mut self, links: UserJobLinks) -> Self {
        self.user_links = Some(links);
        self
    }

    /// Listings for `ids` in request order, each presented as its chosen partner copy.
    ///
    /// Repeated ids produce identical clones; ids the store does not know are skipped.
    pub async fn assemble<R: Rng + ?Sized>(
        &self,
        kind: ListingKind,
        policy: &TenantPolicy,
        ids: &[ListingId],
        rng: &mut R,
    ) -> StoreResult<Vec<Listing>> {
        let span = info_span!("assemble", ?kind, tenant_id = policy.tenant_id, requested = ids.len());
        self.assemble_page(kind, policy, ids, rng).instrument(span).await
    }

    async fn assemble_page<R: Rng + ?Sized>(
        &self,
        kind: ListingKind,
        policy: &TenantPolicy,
        ids: &[ListingId],
        rng: &mut R,
    ) -> StoreResult<Vec<Listing>> {
        let mut seen = HashSet::with_capacity(ids.len());
        let unique = ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect::<Vec<_>>();
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let mut fetched = self.listings.fetch_by_ids(kind, &unique).await?;
        if let Some(links) = &self.user_links {
            links.apply(fetched.iter_mut()).await?;
        }
        let mut by_id: HashMap<ListingId, Listing> = fetched.into_iter().map(|l| (l.id, l)).collect();
        debug!(fetched = by_id.len(), "search listings fetched");

        if policy.duplicate_substitution_enabled {
            self.substitute_batch(kind, policy, &unique, &mut by_id, rng).await?;
        }

        Ok(ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
    }

    async fn substitute_batch<R: Rng + ?Sized>(
        &self,
        kind: ListingKind,
        policy: &TenantPolicy,
        order: &[ListingId],
        by_id: &mut HashMap<ListingId, Listing>,
        rng: &mut R,
    ) -> StoreResult<()> {
        let groups = group_by_hash(order, by_id);
        if groups.is_empty() {
            return Ok(());
        }

        let hashes = groups.iter().map(|g| g.hash.clone()).collect::<Vec<_>>();
        let records = self.duplicates.find_current(kind, &hashes).await?;
        if records.is_empty() {
            debug!(hashes = hashes.len(), "no current duplicates for result page");
            return Ok(());
        }

        let mut records_by_hash: HashMap<ContentHash, Vec<DuplicateRecord>> = HashMap::new();
        for record in records {
            records_by_hash.entry(record.hash.clone()).or_default().push(record);
        }

        let mut site_ids: BTreeSet<SiteId> = BTreeSet::new();
        for group in &groups {
            let Some(records) = records_by_hash.get(&group.hash) else {
                continue;
            };
            if let Some(leader) = by_id.get(&group.members[0]) {
                site_ids.insert(leader.site_id);
            }
            site_ids.extend(records.iter().map(|r| r.site_id));
        }
        let site_ids = site_ids.into_iter().collect::<Vec<_>>();
        let sites = self.sites.sites_by_ids(&site_ids).await?;

        let selector = DuplicateSelector::for_policy(policy);
        let mut substituted = 0usize;
        for group in groups {
            let Some(records) = records_by_hash.get(&group.hash) else {
                continue;
            };
            let Some(leader) = by_id.get(&group.members[0]) else {
                continue;
            };
            let choice = match selector.select(leader, records, &sites, rng) {
                Selection::Substitute(candidate) => candidate,
                Selection::Keep => Candidate {
                    site_id: leader.site_id,
                    url: leader.url.clone(),
                },
            };
            debug!(
                hash = %group.hash,
                from_site = leader.site_id,
                to_site = choice.site_id,
                listings = group.members.len(),
                "presenting partner copy for hash group"
            );
            for id in &group.members {
                if let Some(listing) = by_id.get_mut(id) {
                    if listing.site_id != choice.site_id || listing.url != choice.url {
                        listing.present_as(choice.site_id, choice.url.clone());
                        substituted += 1;
                    }
                }
            }
        }
        debug!(substituted, "duplicate substitution applied");
        Ok(())
    }

    /// Presents `listing` as `target_site`'s copy when that site holds one; otherwise a no-op.
    pub async fn substitute_with_duplicate(
        &self,
        policy: &TenantPolicy,
        listing: &mut Listing,
        target_site: SiteId,
    ) -> StoreResult<bool> {
        if !policy.duplicate_substitution_enabled || listing.hash.is_empty() {
            return Ok(false);
        }
        let Some(record) = self
            .duplicates
            .find_one(listing.kind, &listing.hash, target_site)
            .await?
        else {
            return Ok(false);
        };
        listing.present_as(record.site_id, record.url);
        Ok(true)
    }
}

/// Hash groups in first-seen order; the first member's own copy is the group's candidate.
fn group_by_hash(order: &[ListingId], by_id: &HashMap<ListingId, Listing>) -> Vec<HashGroup> {
    let mut groups: Vec<HashGroup> = Vec::new();
    let mut index: HashMap<&ContentHash, usize> = HashMap::new();
    for id in order {
        let Some(listing) = by_id.get(id) else {
            continue;
        };
        if listing.hash.is_empty() {
            continue;
        }
        match index.get(&listing.hash) {
            Some(&pos) => groups[pos].members.push(*id),
            None => {
                index.insert(&listing.hash, groups.len());
                groups.push(HashGroup {
                    hash: listing.hash.clone(),
                    members: vec![*id],
                });
            }
        }
    }
    groups
}
