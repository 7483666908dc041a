//! Core domain model and collaborator ports for jobdup.

use std::collections::{HashMap, HashSet};
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "jobdup-core";

pub type ListingId = i64;
pub type SiteId = i64;
pub type RegionId = i64;
pub type CountryId = i64;
pub type TenantId = i64;
pub type FilterId = i64;
pub type ImportConfigId = i64;

/// Pseudo-region some partners attach to every foreign posting.
pub const ABROAD_REGION_NAME: &str = "Abroad";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingKind {
    Job,
    Cv,
}

impl ListingKind {
    pub fn listing_table(self) -> &'static str {
        match self {
            Self::Job => "jobs",
            Self::Cv => "cvs",
        }
    }

    pub fn duplicate_table(self) -> &'static str {
        match self {
            Self::Job => "duplicate_jobs",
            Self::Cv => "duplicate_cvs",
        }
    }

    /// Appended to the digest input for listings imported under a context-scoped config.
    pub fn context_salt(self) -> &'static str {
        match self {
            Self::Job => "jobdup:context-scope:job",
            Self::Cv => "jobdup:context-scope:cv",
        }
    }
}

/// Content fingerprint shared by equivalent listings across partner sites.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A job or résumé record ingested from a partner site.
///
/// `site_id` and `url` are the presented values: query-time substitution rewrites
/// them in memory, everything else is the persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub kind: ListingKind,
    pub title: String,
    #[serde(default)]
    pub name: Option<String>,
    pub description: String,
    pub site_id: SiteId,
    #[serde(default)]
    pub external_id: Option<i64>,
    #[serde(default)]
    pub employer: Option<String>,
    #[serde(default)]
    pub ext_region_names: String,
    #[serde(default)]
    pub ext_category_names: String,
    #[serde(default)]
    pub hash: ContentHash,
    pub url: String,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub employment: Option<FilterId>,
    #[serde(default)]
    pub country_id: Option<CountryId>,
    #[serde(default)]
    pub import_config_id: Option<ImportConfigId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<NaiveDate>,
}

impl Listing {
    /// Category names split on `;` and `,`, trimmed and de-duplicated in first-seen order.
    pub fn categories(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for part in self.ext_category_names.split(';').flat_map(|s| s.split(',')) {
            let part = part.trim();
            if part.is_empty() || out.iter().any(|c| c == part) {
                continue;
            }
            out.push(part.to_string());
        }
        out
    }

    pub fn root_category(&self) -> String {
        self.categories().into_iter().next().unwrap_or_default()
    }

    pub fn leaf_category(&self) -> String {
        self.categories().pop().unwrap_or_default()
    }

    /// Overwrites the presented partner copy. Hash, text and timestamps stay untouched.
    pub fn present_as(&mut self, site_id: SiteId, url: impl Into<String>) {
        self.site_id = site_id;
        self.url = url.into();
    }
}

/// Cleans a raw region list the way listings are shown: trimmed, unique, no "abroad" marker.
pub fn normalize_region_names(raw: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in raw.split(',').map(str::trim) {
        if part.is_empty() || part == ABROAD_REGION_NAME || parts.contains(&part) {
            continue;
        }
        parts.push(part);
    }
    parts.join(", ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerSite {
    pub id: SiteId,
    #[serde(default)]
    pub name: String,
    pub budget: f64,
    pub real_cpc: f64,
    #[serde(default)]
    pub free: bool,
}

impl PartnerSite {
    pub fn is_free(&self) -> bool {
        self.free
    }

    pub fn effective_cpc(&self) -> f64 {
        self.real_cpc
    }

    /// Budget used for weighting; negative balances count as zero.
    pub fn weight(&self) -> f64 {
        self.budget.max(0.0)
    }
}

/// "`site_id` still hosts the content identified by `hash` until `expires_at`."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateRecord {
    pub hash: ContentHash,
    pub site_id: SiteId,
    pub url: String,
    pub expires_at: NaiveDate,
}

impl DuplicateRecord {
    pub fn is_current(&self, today: NaiveDate) -> bool {
        self.expires_at >= today
    }
}

/// Curated job collections maintained outside the listing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSegment {
    Abroad,
    Parttime,
}

impl JobSegment {
    pub fn table(self) -> &'static str {
        match self {
            Self::Abroad => "abroad_jobs",
            Self::Parttime => "parttime_jobs",
        }
    }
}

/// Per-tenant policy surface consumed by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantPolicy {
    pub tenant_id: TenantId,
    #[serde(default)]
    pub duplicate_substitution_enabled: bool,
    #[serde(default)]
    pub minimal_cpc_for_paid_duplicate_substitution: f64,
    #[serde(default)]
    pub improved_job_hashing: bool,
    #[serde(default)]
    pub use_region_ids_for_job_hashing: bool,
}

impl TenantPolicy {
    pub fn disabled(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            duplicate_substitution_enabled: false,
            minimal_cpc_for_paid_duplicate_substitution: 0.0,
            improved_job_hashing: false,
            use_region_ids_for_job_hashing: false,
        }
    }
}

/// What an import configuration tells the hasher about a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportContext {
    pub is_context: bool,
    pub country_id: Option<CountryId>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Read-only fetch; result order is unspecified and unknown ids are absent.
    async fn fetch_by_ids(&self, kind: ListingKind, ids: &[ListingId]) -> StoreResult<Vec<Listing>>;

    async fn find_by_hash(&self, kind: ListingKind, hash: &ContentHash) -> StoreResult<Option<Listing>>;
}

#[async_trait]
pub trait DuplicateIndex: Send + Sync {
    /// All records for `hashes` whose expiry is today or later.
    async fn find_current(
        &self,
        kind: ListingKind,
        hashes: &[ContentHash],
    ) -> StoreResult<Vec<DuplicateRecord>>;

    async fn find_one(
        &self,
        kind: ListingKind,
        hash: &ContentHash,
        site_id: SiteId,
    ) -> StoreResult<Option<DuplicateRecord>>;
}

#[async_trait]
pub trait PartnerSiteDirectory: Send + Sync {
    async fn sites_by_ids(&self, ids: &[SiteId]) -> StoreResult<HashMap<SiteId, PartnerSite>>;
}

#[async_trait]
pub trait RegionResolver: Send + Sync {
    async fn region_root(&self, country_id: CountryId) -> StoreResult<Option<RegionId>>;

    async fn resolve_ids(&self, names: &[String], root: RegionId) -> StoreResult<Vec<RegionId>>;
}

#[async_trait]
pub trait ImportConfigDirectory: Send + Sync {
    async fn import_context(&self, import_config_id: ImportConfigId) -> StoreResult<Option<ImportContext>>;
}

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn tenant_for_country(&self, country_id: CountryId) -> StoreResult<Option<TenantPolicy>>;
}

#[async_trait]
pub trait FilterDirectory: Send + Sync {
    async fn freelance_filter_id(&self, tenant_id: TenantId) -> StoreResult<Option<FilterId>>;
}

#[async_trait]
pub trait SegmentDirectory: Send + Sync {
    async fn in_segment(&self, segment: JobSegment, listing_id: ListingId) -> StoreResult<bool>;
}

#[async_trait]
pub trait UserJobDirectory: Send + Sync {
    /// The subset of `external_ids` that refer to jobs posted directly by users.
    async fn user_job_ids(&self, external_ids: &[i64]) -> StoreResult<HashSet<i64>>;
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: std::time::Duration) -> StoreResult<()>;
}
