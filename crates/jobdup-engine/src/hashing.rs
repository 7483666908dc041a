//! Content hash computation for listings.

use std::sync::Arc;

use jobdup_core::{
    ContentHash, ImportConfigDirectory, ImportConfigId, Listing, ListingKind, RegionId,
    RegionResolver, StoreResult, TenantDirectory,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::markup::{strip_markup, text_fingerprint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashStrategy {
    /// Raw title, markup-stripped description, raw region text.
    Basic,
    /// Normalized text fingerprints of title and description.
    Improved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionSignal {
    Raw,
    RegionIds(Vec<RegionId>),
}

/// Everything the digest needs beyond the listing text itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashPlan {
    pub strategy: HashStrategy,
    pub region_signal: RegionSignal,
    pub salted: bool,
}

impl HashPlan {
    pub fn basic() -> Self {
        Self {
            strategy: HashStrategy::Basic,
            region_signal: RegionSignal::Raw,
            salted: false,
        }
    }
}

/// The hashed fields of a listing, as seen at ingestion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashInput {
    pub kind: ListingKind,
    pub title: String,
    #[serde(default)]
    pub name: Option<String>,
    pub description: String,
    #[serde(default)]
    pub ext_region_names: String,
    #[serde(default)]
    pub import_config_id: Option<ImportConfigId>,
}

impl From<&Listing> for HashInput {
    fn from(listing: &Listing) -> Self {
        Self {
            kind: listing.kind,
            title: listing.title.clone(),
            name: listing.name.clone(),
            description: listing.description.clone(),
            ext_region_names: listing.ext_region_names.clone(),
            import_config_id: listing.import_config_id,
        }
    }
}

fn sha256_hex(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Pure digest of `input` under `plan`.
pub fn digest(input: &HashInput, plan: &HashPlan) -> ContentHash {
    let salt = if plan.salted { input.kind.context_salt() } else { "" };

    if input.kind == ListingKind::Cv {
        let description = strip_markup(&input.description);
        return ContentHash::new(sha256_hex(&[
            input.title.as_str(),
            input.name.as_deref().unwrap_or_default(),
            description.as_str(),
            salt,
        ]));
    }

    let regions = match &plan.region_signal {
        RegionSignal::RegionIds(ids) if !ids.is_empty() => ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(","),
        _ => input.ext_region_names.clone(),
    };

    let hex = match plan.strategy {
        HashStrategy::Basic => {
            let description = strip_markup(&input.description);
            sha256_hex(&[input.title.as_str(), description.as_str(), regions.as_str(), salt])
        }
        HashStrategy::Improved => {
            let title = text_fingerprint(&input.title);
            let description = text_fingerprint(&input.description);
            sha256_hex(&[title.as_str(), description.as_str(), regions.as_str(), salt])
        }
    };
    ContentHash::new(hex)
}

/// Decides the strategy, region signal and salt for a listing, then digests it.
pub struct HashComputer {
    imports: Arc<dyn ImportConfigDirectory>,
    tenants: Arc<dyn TenantDirectory>,
    regions: Arc<dyn RegionResolver>,
}

impl HashComputer {
    pub fn new(
        imports: Arc<dyn ImportConfigDirectory>,
        tenants: Arc<dyn TenantDirectory>,
        regions: Arc<dyn RegionResolver>,
    ) -> Self {
        Self {
            imports,
            tenants,
            regions,
        }
    }

    pub async fn compute(&self, input: &HashInput, force_improved: bool) -> StoreResult<ContentHash> {
        let plan = self.plan(input, force_improved).await?;
        let hash = digest(input, &plan);
        debug!(kind = ?input.kind, strategy = ?plan.strategy, salted = plan.salted, %hash, "content hash computed");
        Ok(hash)
    }

    pub async fn plan(&self, input: &HashInput, force_improved: bool) -> StoreResult<HashPlan> {
        let mut plan = HashPlan::basic();
        if force_improved && input.kind == ListingKind::Job {
            plan.strategy = HashStrategy::Improved;
        }

        let Some(config_id) = input.import_config_id else {
            return Ok(plan);
        };
        let Some(context) = self.imports.import_context(config_id).await? else {
            return Ok(plan);
        };
        plan.salted = context.is_context;

        if input.kind != ListingKind::Job {
            return Ok(plan);
        }
        let Some(country_id) = context.country_id else {
            return Ok(plan);
        };
        // Tenant policy only applies to countries with a region row.
        let root = match self.regions.region_root(country_id).await {
            Ok(Some(root)) => Some(root),
            Ok(None) => return Ok(plan),
            Err(err) => {
                warn!(country_id, error = %err, "region root lookup failed; hashing raw region text");
                None
            }
        };
        let Some(policy) = self.tenants.tenant_for_country(country_id).await? else {
            return Ok(plan);
        };
        if !policy.improved_job_hashing {
            return Ok(plan);
        }

        plan.strategy = HashStrategy::Improved;
        if let Some(root) = root {
            if policy.use_region_ids_for_job_hashing && !input.ext_region_names.trim().is_empty() {
                let ids = self.region_ids(root, &input.ext_region_names).await;
                if !ids.is_empty() {
                    plan.region_signal = RegionSignal::RegionIds(ids);
                }
            }
        }
        Ok(plan)
    }

    /// Never fails: any resolver problem means "no mapping" and the raw text is hashed.
    async fn region_ids(&self, root: RegionId, raw: &str) -> Vec<RegionId> {
        match self.regions.resolve_ids(&[raw.to_string()], root).await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(root, error = %err, "region resolution failed; hashing raw region text");
                Vec::new()
            }
        }
    }
}
