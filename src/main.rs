use anyhow::Result;
use clap::Parser;
use sociograph::api::HttpApi;
use sociograph::geo::{geocode_cities, GeocodeCache, HttpGeocoder};
use sociograph::{BatchFetcher, Config, CrawlOptions, Crawler};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sociograph")]
#[command(about = "Crawl a social graph outward from root users into a community document")]
struct Args {
    /// Root user ids to start the traversal from
    #[arg(required = true)]
    roots: Vec<u64>,

    /// Maximum hop distance from the nearest root
    #[arg(short, long, default_value_t = 2)]
    depth: u32,

    /// Where to write the community document
    #[arg(short, long, default_value = "community.json")]
    output: PathBuf,

    /// Skip geocoding of discovered cities
    #[arg(long)]
    skip_geocode: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", "info"),
    )
    .init();

    let args = Args::parse();

    let config = Config::load()?;
    log::info!("Configuration loaded successfully");

    let api = HttpApi::new(
        &config.api.base_url,
        config.access_token()?,
        config.api.version.clone(),
        config.request_timeout(),
    )?;

    let fetcher = BatchFetcher::new(config.crawl.max_in_flight, config.request_timeout());
    let crawler = Crawler::new(
        api,
        fetcher,
        CrawlOptions {
            reference_year: config.crawl.reference_year,
            bulk_chunk_size: config.crawl.bulk_chunk_size,
        },
    );

    log::info!(
        "Crawling {} roots to depth {}",
        args.roots.len(),
        args.depth
    );
    let mut community = crawler.crawl(&args.roots, args.depth).await;

    if config.geocode.enabled && !args.skip_geocode {
        let geocoder = HttpGeocoder::new(
            &config.geocode.base_url,
            &config.geocode.user_agent,
            config.request_timeout(),
        )?;
        let cache = GeocodeCache::new(config.geocode.cache_capacity);
        geocode_cities(&mut community, &geocoder, &cache).await;
    }

    community.save(&args.output)?;
    log::info!(
        "Saved {} users, {} groups and {} directed friend entries to {}",
        community.user_count(),
        community.group_count(),
        community.edge_count(),
        args.output.display()
    );

    Ok(())
}
