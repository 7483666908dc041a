//! In-memory port fakes and builders shared by the engine's unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use jobdup_core::{
    CacheStore, ContentHash, CountryId, DuplicateIndex, DuplicateRecord, FilterDirectory, FilterId,
    ImportConfigDirectory, ImportConfigId, ImportContext, JobSegment, Listing, ListingId,
    ListingKind, ListingStore, PartnerSite, PartnerSiteDirectory, RegionId, RegionResolver,
    SegmentDirectory, SiteId, StoreError, StoreResult, TenantDirectory, TenantId, TenantPolicy,
    UserJobDirectory,
};

use crate::hashing::HashComputer;

pub fn listing(id: ListingId, site_id: SiteId, hash: &str) -> Listing {
    let stamp = Utc
        .with_ymd_and_hms(2026, 1, 15, 9, 30, 0)
        .single()
        .expect("valid timestamp");
    Listing {
        id,
        kind: ListingKind::Job,
        title: format!("Listing {id}"),
        name: None,
        description: format!("<p>Description of listing {id}</p>"),
        site_id,
        external_id: Some(id * 100),
        employer: Some("Acme".into()),
        ext_region_names: "Lviv".into(),
        ext_category_names: "Hospitality; Kitchen".into(),
        hash: ContentHash::new(hash),
        url: format!("https://site-{site_id}.example/{id}"),
        salary: None,
        employment: None,
        country_id: None,
        import_config_id: None,
        created_at: stamp,
        updated_at: stamp,
        expires_at: None,
    }
}

pub fn record(hash: &str, site_id: SiteId) -> DuplicateRecord {
    DuplicateRecord {
        hash: ContentHash::new(hash),
        site_id,
        url: format!("https://site-{site_id}.example/{hash}"),
        expires_at: NaiveDate::from_ymd_opt(2099, 12, 31).expect("valid date"),
    }
}

pub fn site(id: SiteId, budget: f64, real_cpc: f64) -> PartnerSite {
    PartnerSite {
        id,
        name: format!("site-{id}"),
        budget,
        real_cpc,
        free: false,
    }
}

#[derive(Default)]
pub struct FakeStores {
    pub listings: Vec<Listing>,
    pub records: Vec<DuplicateRecord>,
    pub sites: Vec<PartnerSite>,
    listing_calls: AtomicUsize,
    duplicate_calls: AtomicUsize,
    site_calls: AtomicUsize,
    requested: Mutex<Vec<ListingId>>,
}

impl FakeStores {
    pub fn new(listings: Vec<Listing>, records: Vec<DuplicateRecord>, sites: Vec<PartnerSite>) -> Self {
        Self {
            listings,
            records,
            sites,
            ..Self::default()
        }
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    pub fn duplicate_calls(&self) -> usize {
        self.duplicate_calls.load(Ordering::SeqCst)
    }

    pub fn site_calls(&self) -> usize {
        self.site_calls.load(Ordering::SeqCst)
    }

    pub fn last_requested_ids(&self) -> Vec<ListingId> {
        self.requested.lock().expect("requested lock").clone()
    }
}

#[async_trait]
impl ListingStore for FakeStores {
    async fn fetch_by_ids(&self, kind: ListingKind, ids: &[ListingId]) -> StoreResult<Vec<Listing>> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        *self.requested.lock().expect("requested lock") = ids.to_vec();
        Ok(self
            .listings
            .iter()
            .filter(|l| l.kind == kind && ids.contains(&l.id))
            .cloned()
            .collect())
    }

    async fn find_by_hash(&self, kind: ListingKind, hash: &ContentHash) -> StoreResult<Option<Listing>> {
        Ok(self
            .listings
            .iter()
            .find(|l| l.kind == kind && &l.hash == hash)
            .cloned())
    }
}

#[async_trait]
impl DuplicateIndex for FakeStores {
    async fn find_current(
        &self,
        _kind: ListingKind,
        hashes: &[ContentHash],
    ) -> StoreResult<Vec<DuplicateRecord>> {
        self.duplicate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .iter()
            .filter(|r| hashes.contains(&r.hash))
            .cloned()
            .collect())
    }

    async fn find_one(
        &self,
        _kind: ListingKind,
        hash: &ContentHash,
        site_id: SiteId,
    ) -> StoreResult<Option<DuplicateRecord>> {
        Ok(self
            .records
            .iter()
            .find(|r| &r.hash == hash && r.site_id == site_id)
            .cloned())
    }
}

#[async_trait]
impl PartnerSiteDirectory for FakeStores {
    async fn sites_by_ids(&self, ids: &[SiteId]) -> StoreResult<HashMap<SiteId, PartnerSite>> {
        self.site_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .sites
            .iter()
            .filter(|s| ids.contains(&s.id))
            .map(|s| (s.id, s.clone()))
            .collect())
    }
}

pub enum ResolverMode {
    Ids(Vec<RegionId>),
    Fail,
}

/// Import configs, a single tenant policy and a region resolver behind one struct.
pub struct HashDeps {
    policy: Option<TenantPolicy>,
    resolver: ResolverMode,
    import_calls: AtomicUsize,
    tenant_calls: AtomicUsize,
    resolver_calls: AtomicUsize,
}

impl HashDeps {
    pub const CONTEXT_IMPORT: ImportConfigId = 1;
    pub const PLAIN_IMPORT: ImportConfigId = 2;
    /// Imports from a country that has no region row.
    pub const UNMAPPED_IMPORT: ImportConfigId = 3;
    pub const COUNTRY: CountryId = 380;
    pub const UNMAPPED_COUNTRY: CountryId = 999;
    pub const REGION_ROOT: RegionId = 1000;

    pub fn new(policy: Option<TenantPolicy>, resolver: ResolverMode) -> Arc<Self> {
        Arc::new(Self {
            policy,
            resolver,
            import_calls: AtomicUsize::new(0),
            tenant_calls: AtomicUsize::new(0),
            resolver_calls: AtomicUsize::new(0),
        })
    }

    pub fn computer(self: &Arc<Self>) -> HashComputer {
        HashComputer::new(self.clone(), self.clone(), self.clone())
    }

    pub fn import_calls(&self) -> usize {
        self.import_calls.load(Ordering::SeqCst)
    }

    pub fn tenant_calls(&self) -> usize {
        self.tenant_calls.load(Ordering::SeqCst)
    }

    pub fn resolver_calls(&self) -> usize {
        self.resolver_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImportConfigDirectory for HashDeps {
    async fn import_context(&self, import_config_id: ImportConfigId) -> StoreResult<Option<ImportContext>> {
        self.import_calls.fetch_add(1, Ordering::SeqCst);
        let (is_context, country_id) = match import_config_id {
            Self::CONTEXT_IMPORT => (true, Self::COUNTRY),
            Self::PLAIN_IMPORT => (false, Self::COUNTRY),
            Self::UNMAPPED_IMPORT => (false, Self::UNMAPPED_COUNTRY),
            _ => return Ok(None),
        };
        Ok(Some(ImportContext {
            is_context,
            country_id: Some(country_id),
        }))
    }
}

#[async_trait]
impl TenantDirectory for HashDeps {
    async fn tenant_for_country(&self, _country_id: CountryId) -> StoreResult<Option<TenantPolicy>> {
        self.tenant_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.policy.clone())
    }
}

#[async_trait]
impl RegionResolver for HashDeps {
    async fn region_root(&self, country_id: CountryId) -> StoreResult<Option<RegionId>> {
        Ok((country_id == Self::COUNTRY).then_some(Self::REGION_ROOT))
    }

    async fn resolve_ids(&self, _names: &[String], _root: RegionId) -> StoreResult<Vec<RegionId>> {
        self.resolver_calls.fetch_add(1, Ordering::SeqCst);
        match &self.resolver {
            ResolverMode::Ids(ids) => Ok(ids.clone()),
            ResolverMode::Fail => Err(StoreError::Message("region mapping unavailable".into())),
        }
    }
}

#[derive(Default)]
pub struct FakeCache {
    entries: Mutex<HashMap<String, String>>,
    last_ttl: Mutex<Option<Duration>>,
    failing: bool,
    get_calls: AtomicUsize,
    set_calls: AtomicUsize,
}

impl FakeCache {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().expect("cache lock").get(key).cloned()
    }

    pub fn last_ttl(&self) -> Option<Duration> {
        *self.last_ttl.lock().expect("ttl lock")
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for FakeCache {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(StoreError::Message("cache offline".into()));
        }
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(StoreError::Message("cache offline".into()));
        }
        self.entries.lock().expect("cache lock").insert(key.to_string(), value);
        *self.last_ttl.lock().expect("ttl lock") = Some(ttl);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeFilters {
    filters: HashMap<TenantId, FilterId>,
    calls: AtomicUsize,
}

impl FakeFilters {
    pub fn with(tenant_id: TenantId, filter_id: FilterId) -> Self {
        Self {
            filters: HashMap::from([(tenant_id, filter_id)]),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FilterDirectory for FakeFilters {
    async fn freelance_filter_id(&self, tenant_id: TenantId) -> StoreResult<Option<FilterId>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.filters.get(&tenant_id).copied())
    }
}

pub struct FakeTenants {
    countries: HashMap<CountryId, TenantPolicy>,
}

impl FakeTenants {
    pub fn single(tenant_id: TenantId, country_id: CountryId) -> Self {
        Self {
            countries: HashMap::from([(country_id, TenantPolicy::disabled(tenant_id))]),
        }
    }
}

#[async_trait]
impl TenantDirectory for FakeTenants {
    async fn tenant_for_country(&self, country_id: CountryId) -> StoreResult<Option<TenantPolicy>> {
        Ok(self.countries.get(&country_id).cloned())
    }
}

pub struct FakeSegments {
    members: HashSet<(JobSegment, ListingId)>,
    calls: AtomicUsize,
}

impl FakeSegments {
    pub fn new(members: &[(JobSegment, ListingId)]) -> Self {
        Self {
            members: members.iter().copied().collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SegmentDirectory for FakeSegments {
    async fn in_segment(&self, segment: JobSegment, listing_id: ListingId) -> StoreResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.members.contains(&(segment, listing_id)))
    }
}

pub struct FakeUserJobs {
    owned: HashSet<i64>,
    calls: AtomicUsize,
    requested: Mutex<Vec<i64>>,
}

impl FakeUserJobs {
    pub fn new(owned: &[i64]) -> Self {
        Self {
            owned: owned.iter().copied().collect(),
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_requested(&self) -> Vec<i64> {
        self.requested.lock().expect("requested lock").clone()
    }
}

#[async_trait]
impl UserJobDirectory for FakeUserJobs {
    async fn user_job_ids(&self, external_ids: &[i64]) -> StoreResult<HashSet<i64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.requested.lock().expect("requested lock") = external_ids.to_vec();
        Ok(external_ids
            .iter()
            .copied()
            .filter(|id| self.owned.contains(id))
            .collect())
    }
}
