use anyhow::anyhow;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Selector};

use crate::error::ExtractError;
use crate::listing::{ListingRecord, SeenSet, Source};
use crate::price;
use crate::region::Postcode;

pub fn parse_selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {css:?}: {e:?}"))
}

/// Turns one listing card of a search result page into a [`ListingRecord`].
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    source: Source,
    price: Selector,
    link: Selector,
    features: Selector,
}

impl ListingExtractor {
    pub fn new(source: Source, price: &str, link: &str, features: &str) -> anyhow::Result<Self> {
        Ok(Self {
            source,
            price: parse_selector(price)?,
            link: parse_selector(link)?,
            features: parse_selector(features)?,
        })
    }

    pub fn source(&self) -> Source {
        self.source
    }

    /// Returns `Ok(None)` when the listing is already in `seen`.
    pub fn extract(
        &self,
        card: ElementRef<'_>,
        postcode: &Postcode,
        seen: &SeenSet,
        scraped_at: DateTime<Utc>,
    ) -> Result<Option<ListingRecord>, ExtractError> {
        let url = card
            .select(&self.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .ok_or(ExtractError::MissingUrl)?;

        let listing_id = listing_id_from_url(url)
            .ok_or_else(|| ExtractError::EmptyListingId(url.to_string()))?;

        if seen.contains_listing(self.source, listing_id) {
            return Ok(None);
        }

        let weekly_price = card.select(&self.price).next().and_then(|el| {
            let text = element_text(el);
            let weekly = price::normalize(&text);
            if weekly.is_none() {
                log::debug!("{postcode}: unknown weekly price for {listing_id} from {text:?}");
            }
            weekly
        });

        // Features are positional: beds first, then baths
        let mut features = card
            .select(&self.features)
            .map(|el| leading_count(&element_text(el)));
        let beds = features.next().flatten();
        let bath = features.next().flatten();

        Ok(Some(ListingRecord {
            source: self.source,
            postcode: postcode.clone(),
            listing_id: listing_id.to_string(),
            url: url.to_string(),
            beds,
            bath,
            weekly_price,
            scrape_timestamp: scraped_at,
            raw_html: card.html(),
        }))
    }
}

/// The last hyphen separated token of the last path segment.
pub fn listing_id_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?.trim_end_matches('/');
    let segment = path.rsplit('/').next()?;
    let id = segment.rsplit('-').next()?.trim();
    (!id.is_empty()).then_some(id)
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn leading_count(text: &str) -> Option<u32> {
    text.split_whitespace().next()?.parse().ok()
}
