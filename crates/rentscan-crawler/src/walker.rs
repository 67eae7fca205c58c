use std::sync::Arc;

use chrono::Utc;
use scraper::{Html, Selector};

use crate::extract::{parse_selector, ListingExtractor};
use crate::fetch::Fetch;
use crate::limiter::Politeness;
use crate::listing::{ListingRecord, PostcodeListings, SeenSet};
use crate::region::Postcode;

/// How a site lays out its search result pages.
#[derive(Debug, Clone)]
pub struct SiteLayout {
    /// Search URL, `{postcode}` and `{page}` are substituted
    pub url_template: String,
    /// Selects every listing card of a page
    pub card: Selector,
    /// A page matching any of these has no listings to offer
    pub terminal_markers: Vec<Selector>,
    pub extractor: ListingExtractor,
}

impl SiteLayout {
    pub fn new(
        url_template: impl Into<String>,
        card: &str,
        terminal_markers: &[&str],
        extractor: ListingExtractor,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            url_template: url_template.into(),
            card: parse_selector(card)?,
            terminal_markers: terminal_markers
                .iter()
                .map(|css| parse_selector(css))
                .collect::<anyhow::Result<_>>()?,
            extractor,
        })
    }

    pub fn page_url(&self, postcode: &Postcode, page: u32) -> String {
        self.url_template
            .replace("{postcode}", postcode.as_str())
            .replace("{page}", &page.to_string())
    }
}

enum Step {
    Fetching,
    Extracting(String),
    Continue,
    Terminal,
}

/// Walks the search result pages of one region, page after page, until a page
/// brings no listing outside the seen-set.
///
/// The walk has no page limit and only the seen-set decides what is new, so
/// a site that keeps serving unseen ids, even the same ones on every page,
/// is walked until a fetch fails. A listing met again later in the walk
/// replaces the earlier copy.
pub struct PageWalker {
    layout: SiteLayout,
    fetcher: Arc<dyn Fetch>,
    politeness: Politeness,
}

impl PageWalker {
    pub fn new(layout: SiteLayout, fetcher: Arc<dyn Fetch>, politeness: Politeness) -> Self {
        Self {
            layout,
            fetcher,
            politeness,
        }
    }

    pub async fn walk(&self, postcode: &Postcode, seen: &SeenSet) -> PostcodeListings {
        let source = self.layout.extractor.source();
        let mut listings = PostcodeListings::new();
        let mut page = 1;
        let mut step = Step::Fetching;

        loop {
            step = match step {
                Step::Fetching => {
                    let url = self.layout.page_url(postcode, page);
                    log::info!("{source} {postcode}: fetching page {page}");
                    let permit = self.politeness.ready(page).await;
                    let fetched = self.fetcher.fetch(&url).await;
                    drop(permit);
                    match fetched {
                        Ok(body) => Step::Extracting(body),
                        Err(e) => {
                            log::warn!("{source} {postcode}: stopping at page {page}: {e}");
                            Step::Terminal
                        }
                    }
                }
                Step::Extracting(body) => match self.scan(&body, postcode, seen) {
                    None => {
                        log::debug!("{source} {postcode}: page {page} is a terminal page");
                        Step::Terminal
                    }
                    Some(novel) if novel.is_empty() => {
                        log::debug!("{source} {postcode}: nothing new on page {page}");
                        Step::Terminal
                    }
                    Some(novel) => {
                        log::debug!(
                            "{source} {postcode}: {} new listings on page {page}",
                            novel.len()
                        );
                        listings.extend(novel.into_iter().map(|r| (r.key(), r)));
                        Step::Continue
                    }
                },
                Step::Continue => {
                    page += 1;
                    Step::Fetching
                }
                Step::Terminal => return listings,
            };
        }
    }

    /// Returns the new listings of a page, `None` for a terminal page.
    fn scan(&self, body: &str, postcode: &Postcode, seen: &SeenSet) -> Option<Vec<ListingRecord>> {
        let document = Html::parse_document(body);

        if self
            .layout
            .terminal_markers
            .iter()
            .any(|marker| document.select(marker).next().is_some())
        {
            return None;
        }

        let extractor = &self.layout.extractor;
        let scraped_at = Utc::now();
        let mut novel = Vec::new();
        for card in document.select(&self.layout.card) {
            match extractor.extract(card, postcode, seen, scraped_at) {
                Ok(Some(record)) => novel.push(record),
                Ok(None) => (),
                Err(e) => log::warn!(
                    "{} {postcode}: skipping listing card: {e}",
                    extractor.source()
                ),
            }
        }

        Some(novel)
    }
}
