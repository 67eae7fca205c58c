use std::cmp;
use std::sync::Arc;

use futures::{stream, StreamExt};

use crate::adapter::SourceAdapter;
use crate::config::CrawlerConfig;
use crate::listing::{AggregateListings, PostcodeListings, SeenSet, Source};
use crate::region::Postcode;
use crate::store::DedupeStore;

/// Outcome of one crawl over every region and enabled adapter.
#[derive(Debug, Default)]
pub struct CrawlReport {
    /// Size of the seen-set the crawl was deduplicated against
    pub previously_seen: usize,
    pub results: AggregateListings,
    pub total_new: usize,
    /// Walks that failed and contributed nothing
    pub failed: Vec<(Source, Postcode)>,
}

impl CrawlReport {
    pub fn new_in(&self, postcode: &Postcode) -> usize {
        self.results.get(postcode).map_or(0, |l| l.len())
    }
}

/// Adds the listings of one walk to the aggregate.
///
/// Keys of different sources never collide, so merging walks in any order
/// gives the same aggregate.
pub fn merge(results: &mut AggregateListings, postcode: Postcode, listings: PostcodeListings) {
    results.entry(postcode).or_default().extend(listings);
}

pub struct CrawlOrchestrator {
    num_workers: usize,
}

impl CrawlOrchestrator {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            num_workers: cmp::max(1, config.num_workers),
        }
    }

    /// Walks every region with every enabled adapter, at most `num_workers`
    /// walks at a time. A failing walk is logged and left out of the report.
    pub async fn run(
        &self,
        postcodes: &[Postcode],
        seen: Arc<SeenSet>,
        adapters: &[Arc<dyn SourceAdapter>],
    ) -> CrawlReport {
        let jobs = adapters
            .iter()
            .filter(|adapter| {
                if !adapter.enabled() {
                    log::info!("Skipping disabled source {}", adapter.source());
                }
                adapter.enabled()
            })
            .flat_map(|adapter| postcodes.iter().map(move |p| (adapter.clone(), p.clone())))
            .collect::<Vec<_>>();

        log::info!(
            "Crawling {} regions, {} walks, {} at a time",
            postcodes.len(),
            jobs.len(),
            self.num_workers
        );

        // Walks are spawned lazily, as slots of the pool free up
        let mut walks = stream::iter(jobs)
            .map(|(adapter, postcode)| {
                let source = adapter.source();
                let seen = seen.clone();
                let task_postcode = postcode.clone();
                let handle = tokio::spawn(async move {
                    adapter.process_postcode(&task_postcode, &seen).await
                });
                async move { (source, postcode, handle.await) }
            })
            .buffer_unordered(self.num_workers);

        let mut report = CrawlReport {
            previously_seen: seen.len(),
            ..Default::default()
        };
        while let Some((source, postcode, joined)) = walks.next().await {
            match joined {
                Ok(Ok(listings)) => {
                    log::info!(
                        "{source} {postcode}: finished with {} new listings",
                        listings.len()
                    );
                    merge(&mut report.results, postcode, listings);
                }
                Ok(Err(e)) => {
                    log::error!("{source} {postcode}: walk failed: {e:#}");
                    report.failed.push((source, postcode));
                }
                Err(e) => {
                    log::error!("{source} {postcode}: walk aborted: {e}");
                    report.failed.push((source, postcode));
                }
            }
        }

        report.total_new = report.results.values().map(|l| l.len()).sum();
        report
    }
}

/// Loads the seen listings, crawls, then stores what is new.
///
/// Only a failure to load the seen listings fails the crawl. The report is
/// returned even when storing fails, together with the outcome of the write.
pub async fn crawl_site(
    config: &CrawlerConfig,
    store: &dyn DedupeStore,
    postcodes: &[Postcode],
    adapters: &[Arc<dyn SourceAdapter>],
) -> anyhow::Result<(CrawlReport, anyhow::Result<usize>)> {
    let seen = store.load_seen().await?;
    log::info!("Loaded {} seen listings", seen.len());

    let report = CrawlOrchestrator::new(config)
        .run(postcodes, Arc::new(seen), adapters)
        .await;

    let stored = store.upsert_new(&report.results).await;
    match &stored {
        Ok(written) => log::info!("Stored {written} new listings"),
        Err(e) => log::error!("Couldn't store {} new listings: {e:#}", report.total_new),
    }

    Ok((report, stored))
}
