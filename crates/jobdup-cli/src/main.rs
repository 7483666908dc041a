use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use jobdup_core::{
    ContentHash, DuplicateIndex, FilterDirectory, ImportConfigDirectory, ListingId, ListingKind,
    ListingStore, PartnerSiteDirectory, RegionResolver, SegmentDirectory, SiteId, TenantId,
    UserJobDirectory,
};
use jobdup_engine::{
    EngineConfig, FreelanceClassifier, HashComputer, HashInput, SearchResultAssembler,
    SegmentClassifier, TenantRegistry, UserJobLinks,
};
use jobdup_storage::{load_fixture_catalog, MemoryCache, PgConfig, PgStores};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "jobdup")]
#[command(about = "Listing duplicate detection and partner substitution")]
struct Cli {
    /// Serve every store from a JSON fixture catalog instead of Postgres.
    #[arg(long, global = true)]
    fixtures: Option<PathBuf>,
    /// Tenant registry YAML; defaults to JOBDUP_TENANTS_FILE.
    #[arg(long, global = true)]
    tenants: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Job,
    Cv,
}

impl From<KindArg> for ListingKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Job => ListingKind::Job,
            KindArg::Cv => ListingKind::Cv,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compute the content hash of a listing read from a JSON file.
    Hash {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        force_improved: bool,
    },
    /// Assemble a result page with duplicate substitution applied.
    Search {
        #[arg(long)]
        tenant: TenantId,
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<ListingId>,
        #[arg(long, value_enum, default_value = "job")]
        kind: KindArg,
        #[arg(long)]
        seed: Option<u64>,
        /// Region alias carried by links to user-posted jobs.
        #[arg(long, default_value = "all")]
        region_alias: String,
    },
    /// Find the listing stored under a content hash.
    Lookup {
        #[arg(long)]
        hash: String,
        #[arg(long, value_enum, default_value = "job")]
        kind: KindArg,
    },
    /// Present one listing as a specific partner site's copy.
    Substitute {
        #[arg(long)]
        tenant: TenantId,
        #[arg(long)]
        id: ListingId,
        #[arg(long)]
        site: SiteId,
        #[arg(long, value_enum, default_value = "job")]
        kind: KindArg,
    },
    /// Report whether a job is freelance, abroad or part-time.
    Classify {
        #[arg(long)]
        id: ListingId,
    },
}

struct Ports {
    listings: Arc<dyn ListingStore>,
    duplicates: Arc<dyn DuplicateIndex>,
    sites: Arc<dyn PartnerSiteDirectory>,
    regions: Arc<dyn RegionResolver>,
    imports: Arc<dyn ImportConfigDirectory>,
    filters: Arc<dyn FilterDirectory>,
    segments: Arc<dyn SegmentDirectory>,
    user_jobs: Arc<dyn UserJobDirectory>,
}

impl Ports {
    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ListingStore
            + DuplicateIndex
            + PartnerSiteDirectory
            + RegionResolver
            + ImportConfigDirectory
            + FilterDirectory
            + SegmentDirectory
            + UserJobDirectory
            + 'static,
    {
        Self {
            listings: store.clone(),
            duplicates: store.clone(),
            sites: store.clone(),
            regions: store.clone(),
            imports: store.clone(),
            filters: store.clone(),
            segments: store.clone(),
            user_jobs: store,
        }
    }

    async fn open(fixtures: Option<&PathBuf>, config: &EngineConfig) -> Result<Self> {
        if let Some(path) = fixtures {
            let catalog = load_fixture_catalog(path)?;
            info!(path = %path.display(), listings = catalog.listings.len(), "using fixture catalog");
            return Ok(Self::from_store(Arc::new(catalog)));
        }
        let stores = PgStores::connect(&PgConfig {
            database_url: config.database_url.clone(),
            replica_url: config.replica_url.clone(),
            max_connections: config.db_max_connections,
            ..PgConfig::default()
        })
        .await?;
        Ok(Self::from_store(Arc::new(stores)))
    }

    async fn listing(&self, kind: ListingKind, id: ListingId) -> Result<jobdup_core::Listing> {
        self.listings
            .fetch_by_ids(kind, &[id])
            .await?
            .into_iter()
            .next()
            .with_context(|| format!("{kind:?} listing {id} not found"))
    }
}

fn init_tracing(config: &EngineConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(env_filter);
    if config.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).json())
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EngineConfig::from_env();
    init_tracing(&config);

    let tenants_file = cli.tenants.clone().unwrap_or_else(|| config.tenants_file.clone());
    let tenants = Arc::new(TenantRegistry::load(&tenants_file)?);
    let ports = Ports::open(cli.fixtures.as_ref(), &config).await?;

    let output = match cli.command {
        Commands::Hash {
            input,
            force_improved,
        } => {
            let text = fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let listing: HashInput = serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", input.display()))?;
            let computer =
                HashComputer::new(ports.imports.clone(), tenants.clone(), ports.regions.clone());
            let hash = computer.compute(&listing, force_improved).await?;
            json!({ "kind": listing.kind, "hash": hash })
        }
        Commands::Search {
            tenant,
            ids,
            kind,
            seed,
            region_alias,
        } => {
            let policy = tenants.policy_or_disabled(tenant);
            let mut rng = seed.map(StdRng::seed_from_u64).unwrap_or_else(StdRng::from_entropy);
            let links = UserJobLinks::new(
                ports.user_jobs.clone(),
                config.site_base_url.clone(),
                region_alias,
            );
            let assembler = SearchResultAssembler::new(
                ports.listings.clone(),
                ports.duplicates.clone(),
                ports.sites.clone(),
            )
            .with_user_job_links(links);
            let listings = assembler
                .assemble(kind.into(), &policy, &ids, &mut rng)
                .await?;
            json!({ "tenant_id": tenant, "listings": listings })
        }
        Commands::Lookup { hash, kind } => {
            let kind: ListingKind = kind.into();
            let listing = ports
                .listings
                .find_by_hash(kind, &ContentHash::new(hash.clone()))
                .await?
                .with_context(|| format!("no {kind:?} listing with hash {hash}"))?;
            json!({
                "categories": listing.categories(),
                "root_category": listing.root_category(),
                "leaf_category": listing.leaf_category(),
                "listing": listing,
            })
        }
        Commands::Substitute {
            tenant,
            id,
            site,
            kind,
        } => {
            let policy = tenants.policy_or_disabled(tenant);
            let mut listing = ports.listing(kind.into(), id).await?;
            let assembler = SearchResultAssembler::new(
                ports.listings.clone(),
                ports.duplicates.clone(),
                ports.sites.clone(),
            );
            let substituted = assembler
                .substitute_with_duplicate(&policy, &mut listing, site)
                .await?;
            json!({ "substituted": substituted, "listing": listing })
        }
        Commands::Classify { id } => {
            let listing = ports.listing(ListingKind::Job, id).await?;
            let classifier = FreelanceClassifier::new(
                Arc::new(MemoryCache::new()),
                ports.filters.clone(),
                tenants.clone(),
                config.cache_long_ttl,
            );
            let segments = SegmentClassifier::new(ports.segments.clone());
            json!({
                "id": id,
                "is_freelance": classifier.is_freelance(&listing).await?,
                "is_abroad": segments.is_abroad(&listing).await?,
                "is_parttime": segments.is_parttime(&listing).await?,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
