//! A JSON snapshot standing in for every store, for demos and tests.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use jobdup_core::{
    normalize_region_names, ContentHash, CountryId, DuplicateIndex, DuplicateRecord, FilterDirectory,
    FilterId, ImportConfigDirectory, ImportConfigId, ImportContext, JobSegment, Listing, ListingId, ListingKind,
    ListingStore, PartnerSite, PartnerSiteDirectory, RegionId, RegionResolver, SegmentDirectory,
    SiteId, StoreResult, TenantId, UserJobDirectory,
};
use serde::{Deserialize, Serialize};

use crate::region_lookup_keys;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureDuplicate {
    #[serde(default = "default_kind")]
    pub kind: ListingKind,
    #[serde(flatten)]
    pub record: DuplicateRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureImportConfig {
    pub id: ImportConfigId,
    #[serde(default)]
    pub is_context: bool,
    #[serde(default)]
    pub country_id: Option<CountryId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureRegion {
    pub id: RegionId,
    pub root: Option<RegionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureRegionMapping {
    pub root_id: RegionId,
    pub ext_name: String,
    pub region_id: RegionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureFilter {
    pub tenant_id: TenantId,
    pub filter_id: FilterId,
}

/// JSON snapshot of every store the engine reads, served from memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureCatalog {
    #[serde(default = "today")]
    pub today: NaiveDate,
    #[serde(default)]
    pub listings: Vec<Listing>,
    #[serde(default)]
    pub sites: Vec<PartnerSite>,
    #[serde(default)]
    pub duplicates: Vec<FixtureDuplicate>,
    #[serde(default)]
    pub import_configs: Vec<FixtureImportConfig>,
    #[serde(default)]
    pub regions: Vec<FixtureRegion>,
    #[serde(default)]
    pub region_mappings: Vec<FixtureRegionMapping>,
    #[serde(default)]
    pub freelance_filters: Vec<FixtureFilter>,
    #[serde(default)]
    pub abroad_jobs: Vec<ListingId>,
    #[serde(default)]
    pub parttime_jobs: Vec<ListingId>,
    /// External ids of jobs posted directly by users.
    #[serde(default)]
    pub user_jobs: Vec<i64>,
}

fn default_kind() -> ListingKind {
    ListingKind::Job
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn load_fixture_catalog(path: impl AsRef<Path>) -> anyhow::Result<FixtureCatalog> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

impl FixtureCatalog {
    fn duplicates_of(&self, kind: ListingKind) -> impl Iterator<Item = &DuplicateRecord> + '_ {
        self.duplicates
            .iter()
            .filter(move |d| d.kind == kind)
            .map(|d| &d.record)
    }
}

#[async_trait]
impl ListingStore for FixtureCatalog {
    async fn fetch_by_ids(&self, kind: ListingKind, ids: &[ListingId]) -> StoreResult<Vec<Listing>> {
        Ok(self
            .listings
            .iter()
            .filter(|l| l.kind == kind && ids.contains(&l.id))
            .cloned()
            .map(|mut l| {
                l.ext_region_names = normalize_region_names(&l.ext_region_names);
                l
            })
            .collect())
    }

    async fn find_by_hash(&self, kind: ListingKind, hash: &ContentHash) -> StoreResult<Option<Listing>> {
        Ok(self
            .listings
            .iter()
            .filter(|l| l.kind == kind && &l.hash == hash)
            .min_by_key(|l| l.id)
            .cloned())
    }
}

#[async_trait]
impl DuplicateIndex for FixtureCatalog {
    async fn find_current(
        &self,
        kind: ListingKind,
        hashes: &[ContentHash],
    ) -> StoreResult<Vec<DuplicateRecord>> {
        Ok(self
            .duplicates_of(kind)
            .filter(|d| hashes.contains(&d.hash) && d.is_current(self.today))
            .cloned()
            .collect())
    }

    async fn find_one(
        &self,
        kind: ListingKind,
        hash: &ContentHash,
        site_id: SiteId,
    ) -> StoreResult<Option<DuplicateRecord>> {
        Ok(self
            .duplicates_of(kind)
            .filter(|d| &d.hash == hash && d.site_id == site_id)
            .max_by_key(|d| d.expires_at)
            .cloned())
    }
}

#[async_trait]
impl PartnerSiteDirectory for FixtureCatalog {
    async fn sites_by_ids(&self, ids: &[SiteId]) -> StoreResult<HashMap<SiteId, PartnerSite>> {
        Ok(self
            .sites
            .iter()
            .filter(|s| ids.contains(&s.id))
            .map(|s| (s.id, s.clone()))
            .collect())
    }
}

#[async_trait]
impl RegionResolver for FixtureCatalog {
    async fn region_root(&self, country_id: CountryId) -> StoreResult<Option<RegionId>> {
        Ok(self
            .regions
            .iter()
            .find(|r| r.id == country_id)
            .and_then(|r| r.root))
    }

    async fn resolve_ids(&self, names: &[String], root: RegionId) -> StoreResult<Vec<RegionId>> {
        let keys = region_lookup_keys(names);
        let mut ids = self
            .region_mappings
            .iter()
            .filter(|m| m.root_id == root && keys.contains(&m.ext_name.trim().to_lowercase()))
            .map(|m| m.region_id)
            .collect::<Vec<_>>();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

#[async_trait]
impl ImportConfigDirectory for FixtureCatalog {
    async fn import_context(&self, import_config_id: ImportConfigId) -> StoreResult<Option<ImportContext>> {
        Ok(self
            .import_configs
            .iter()
            .find(|c| c.id == import_config_id)
            .map(|c| ImportContext {
                is_context: c.is_context,
                country_id: c.country_id,
            }))
    }
}

#[async_trait]
impl FilterDirectory for FixtureCatalog {
    async fn freelance_filter_id(&self, tenant_id: TenantId) -> StoreResult<Option<FilterId>> {
        Ok(self
            .freelance_filters
            .iter()
            .find(|f| f.tenant_id == tenant_id)
            .map(|f| f.filter_id))
    }
}

#[async_trait]
impl SegmentDirectory for FixtureCatalog {
    async fn in_segment(&self, segment: JobSegment, listing_id: ListingId) -> StoreResult<bool> {
        let members = match segment {
            JobSegment::Abroad => &self.abroad_jobs,
            JobSegment::Parttime => &self.parttime_jobs,
        };
        Ok(members.contains(&listing_id))
    }
}

#[async_trait]
impl UserJobDirectory for FixtureCatalog {
    async fn user_job_ids(&self, external_ids: &[i64]) -> StoreResult<HashSet<i64>> {
        Ok(external_ids
            .iter()
            .copied()
            .filter(|id| self.user_jobs.contains(id))
            .collect())
    }
}
