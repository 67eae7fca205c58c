use std::sync::Arc;

use async_trait::async_trait;

use crate::config::CrawlerConfig;
use crate::extract::ListingExtractor;
use crate::fetch::Fetch;
use crate::limiter::Politeness;
use crate::listing::{PostcodeListings, SeenSet, Source};
use crate::region::Postcode;
use crate::walker::{PageWalker, SiteLayout};

/// A listing site the crawler knows how to walk.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;

    /// Disabled adapters are skipped by the crawler.
    fn enabled(&self) -> bool {
        true
    }

    /// Collects the listings of `postcode` that are not in `seen`.
    async fn process_postcode(
        &self,
        postcode: &Postcode,
        seen: &SeenSet,
    ) -> anyhow::Result<PostcodeListings>;
}

pub const DOMAIN_SEARCH_URL: &str = "https://www.domain.com.au/rent/?excludedeposittaken=1&ssubs=0&sort=dateupdated-desc&postcode={postcode}&page={page}";

/// domain.com.au rental search.
pub struct DomainAdapter {
    walker: PageWalker,
}

impl DomainAdapter {
    pub fn layout() -> anyhow::Result<SiteLayout> {
        SiteLayout::new(
            DOMAIN_SEARCH_URL,
            r#"[data-testid^="listing-card-wrapper-"]"#,
            &[
                r#"[data-testid="error-page__message-header"]"#,
                "div.css-18vn4hf",
            ],
            ListingExtractor::new(
                Source::Domain,
                r#"[data-testid="listing-card-price"]"#,
                "a.address.is-two-lines.css-1y2bib4",
                r#"[data-testid="property-features-text-container"]"#,
            )?,
        )
    }

    /// Must be called from within a tokio runtime when throttling per second.
    pub fn new(fetcher: Arc<dyn Fetch>, config: &CrawlerConfig) -> anyhow::Result<Self> {
        Self::with_politeness(fetcher, Politeness::from(config.throttle))
    }

    pub fn with_politeness(
        fetcher: Arc<dyn Fetch>,
        politeness: Politeness,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            walker: PageWalker::new(Self::layout()?, fetcher, politeness),
        })
    }
}

#[async_trait]
impl SourceAdapter for DomainAdapter {
    fn source(&self) -> Source {
        Source::Domain
    }

    async fn process_postcode(
        &self,
        postcode: &Postcode,
        seen: &SeenSet,
    ) -> anyhow::Result<PostcodeListings> {
        Ok(self.walker.walk(postcode, seen).await)
    }
}

/// realestate.com.au, whose listing pages are not supported yet.
#[derive(Debug, Default)]
pub struct ReaAdapter;

#[async_trait]
impl SourceAdapter for ReaAdapter {
    fn source(&self) -> Source {
        Source::Rea
    }

    fn enabled(&self) -> bool {
        false
    }

    async fn process_postcode(
        &self,
        _postcode: &Postcode,
        _seen: &SeenSet,
    ) -> anyhow::Result<PostcodeListings> {
        Ok(PostcodeListings::new())
    }
}
