//! Budget-weighted choice of which partner copy of a duplicated listing to present.

use std::collections::{BTreeMap, HashMap};

use jobdup_core::{DuplicateRecord, Listing, PartnerSite, SiteId, TenantPolicy};
use rand::Rng;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Flagged free, or paying less per click than the tenant's paid threshold.
    Free,
    Paid,
}

/// One partner copy that could be presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub site_id: SiteId,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct TieredCandidates {
    /// Paid candidates with their budget weight, in candidate order.
    pub paid: Vec<(Candidate, f64)>,
    pub free: Vec<Candidate>,
}

impl TieredCandidates {
    pub fn is_empty(&self) -> bool {
        self.paid.is_empty() && self.free.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Keep,
    Substitute(Candidate),
}

#[derive(Debug, Clone, Copy)]
pub struct DuplicateSelector {
    enabled: bool,
    minimal_paid_cpc: f64,
}

impl DuplicateSelector {
    pub fn new(enabled: bool, minimal_paid_cpc: f64) -> Self {
        Self {
            enabled,
            minimal_paid_cpc,
        }
    }

    pub fn for_policy(policy: &TenantPolicy) -> Self {
        Self::new(
            policy.duplicate_substitution_enabled,
            policy.minimal_cpc_for_paid_duplicate_substitution,
        )
    }

    pub fn tier(&self, site: &PartnerSite) -> Tier {
        if site.is_free() || site.effective_cpc() < self.minimal_paid_cpc {
            Tier::Free
        } else {
            Tier::Paid
        }
    }

    /// The listing's own copy first, then one record per other site (latest expiry) by site id.
    pub fn candidates(listing: &Listing, records: &[DuplicateRecord]) -> Vec<Candidate> {
        let mut latest: BTreeMap<SiteId, &DuplicateRecord> = BTreeMap::new();
        for record in records
            .iter()
            .filter(|r| r.hash == listing.hash && r.site_id != listing.site_id)
        {
            latest
                .entry(record.site_id)
                .and_modify(|current| {
                    if record.expires_at > current.expires_at {
                        *current = record;
                    }
                })
                .or_insert(record);
        }

        let mut out = Vec::with_capacity(latest.len() + 1);
        out.push(Candidate {
            site_id: listing.site_id,
            url: listing.url.clone(),
        });
        out.extend(latest.into_values().map(|r| Candidate {
            site_id: r.site_id,
            url: r.url.clone(),
        }));
        out
    }

    /// Splits candidates by tier; candidates whose site is unknown are dropped.
    pub fn partition(
        &self,
        candidates: Vec<Candidate>,
        sites: &HashMap<SiteId, PartnerSite>,
    ) -> TieredCandidates {
        let mut tiers = TieredCandidates::default();
        for candidate in candidates {
            let Some(site) = sites.get(&candidate.site_id) else {
                warn!(site_id = candidate.site_id, "dropping duplicate candidate for unknown site");
                continue;
            };
            match self.tier(site) {
                Tier::Paid => tiers.paid.push((candidate, site.weight())),
                Tier::Free => tiers.free.push(candidate),
            }
        }
        tiers
    }

    pub fn pick<R: Rng + ?Sized>(&self, tiers: &TieredCandidates, rng: &mut R) -> Option<Candidate> {
        if tiers.is_empty() {
            return None;
        }
        match tiers.paid.len() {
            0 => {
                let idx = rng.gen_range(0..tiers.free.len());
                Some(tiers.free[idx].clone())
            }
            1 => Some(tiers.paid[0].0.clone()),
            _ => {
                let weights = tiers.paid.iter().map(|(_, w)| *w).collect::<Vec<_>>();
                weighted_pick(&weights, rng).map(|idx| tiers.paid[idx].0.clone())
            }
        }
    }

    /// Chooses the copy of `listing` to present given the current records for its hash.
    pub fn select<R: Rng + ?Sized>(
        &self,
        listing: &Listing,
        records: &[DuplicateRecord],
        sites: &HashMap<SiteId, PartnerSite>,
        rng: &mut R,
    ) -> Selection {
        if !self.enabled || records.is_empty() {
            return Selection::Keep;
        }
        let tiers = self.partition(Self::candidates(listing, records), sites);
        match self.pick(&tiers, rng) {
            Some(c) if c.site_id != listing.site_id || c.url != listing.url => Selection::Substitute(c),
            _ => Selection::Keep,
        }
    }
}

/// Index of the first weight whose cumulative share reaches a uniform draw in `[0, 1)`.
///
/// A zero total falls back to equal shares (`rank / count`).
pub fn weighted_pick<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }
    let total: f64 = weights.iter().map(|w| w.max(0.0)).sum();
    let count = weights.len() as f64;
    let draw: f64 = rng.gen();

    let mut running = 0.0;
    for (idx, weight) in weights.iter().enumerate() {
        running += weight.max(0.0);
        let share = if total > 0.0 {
            running / total
        } else {
            (idx + 1) as f64 / count
        };
        if draw <= share {
            return Some(idx);
        }
    }
    Some(weights.len() - 1)
}
