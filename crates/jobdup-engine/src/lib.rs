//! Duplicate detection and partner-copy substitution for job and résumé listings.

pub mod assembler;
pub mod config;
pub mod freelance;
pub mod hashing;
pub mod markup;
pub mod segments;
pub mod selector;
pub mod user_jobs;

#[cfg(test)]
mod test_support;

pub use assembler::SearchResultAssembler;
pub use config::{EngineConfig, TenantConfig, TenantRegistry};
pub use freelance::{freelance_cache_key, FreelanceClassifier, FREELANCE_CACHE_PREFIX};
pub use hashing::{digest, HashComputer, HashInput, HashPlan, HashStrategy, RegionSignal};
pub use markup::{normalize_text, strip_markup, text_fingerprint};
pub use segments::SegmentClassifier;
pub use selector::{weighted_pick, Candidate, DuplicateSelector, Selection, Tier, TieredCandidates};
pub use user_jobs::UserJobLinks;

pub const CRATE_NAME: &str = "jobdup-engine";
