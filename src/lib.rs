pub mod config;
pub mod error;
pub mod api;
pub mod fetch;
pub mod normalize;
pub mod crawl;
pub mod store;
pub mod geo;

pub use config::Config;
pub use crawl::{CrawlOptions, Crawler};
pub use error::{Result, SociographError};
pub use fetch::BatchFetcher;
pub use store::{Community, CommunityDocument};
