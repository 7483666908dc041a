//! Port implementations for jobdup: Postgres, in-memory cache and fixture catalog.

mod fixtures;
mod memory;
mod postgres;

pub use fixtures::{
    load_fixture_catalog, FixtureCatalog, FixtureDuplicate, FixtureFilter, FixtureImportConfig,
    FixtureRegion, FixtureRegionMapping,
};
pub use memory::MemoryCache;
pub use postgres::{PgConfig, PgStores};

pub const CRATE_NAME: &str = "jobdup-storage";

/// Lowercased, trimmed, non-empty region names from a comma-separated list.
pub fn region_lookup_keys(names: &[String]) -> Vec<String> {
    let mut keys = Vec::new();
    for name in names.iter().flat_map(|n| n.split(',')) {
        let key = name.trim().to_lowercase();
        if !key.is_empty() && !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}
