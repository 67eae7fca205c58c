mod adapter;
mod config;
mod crawler;
mod error;
mod extract;
mod fetch;
mod limiter;
mod listing;
pub mod price;
mod region;
pub mod store;
mod walker;

pub use adapter::{DomainAdapter, ReaAdapter, SourceAdapter, DOMAIN_SEARCH_URL};
pub use config::{CrawlerConfig, Throttle};
pub use crawler::{crawl_site, merge, CrawlOrchestrator, CrawlReport};
pub use error::{ExtractError, FetchError};
pub use extract::{listing_id_from_url, parse_selector, ListingExtractor};
pub use fetch::{Fetch, HttpFetcher};
pub use limiter::{Politeness, RateLimiter};
pub use listing::{
    composite_key, AggregateListings, ListingRecord, PostcodeListings, SeenSet, Source,
};
pub use region::{postcodes, Postcode, State};
pub use store::{CsvStore, DedupeStore, SqliteStore};
pub use walker::{PageWalker, SiteLayout};
