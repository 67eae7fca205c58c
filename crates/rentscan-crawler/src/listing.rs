use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::region::Postcode;

/// The listing site a record was scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[serde(alias = "domain.com.au")]
    Domain,
    #[serde(alias = "realestate.com.au")]
    Rea,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Domain => "domain",
            Source::Rea => "rea",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "domain" | "domain.com.au" => Ok(Source::Domain),
            "rea" | "realestate.com.au" => Ok(Source::Rea),
            other => Err(anyhow!("Unknown listing source: {other:?}")),
        }
    }
}

/// Identity of a listing across sources: `{source}-{listing_id}`.
pub fn composite_key(source: Source, listing_id: &str) -> String {
    format!("{source}-{listing_id}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub source: Source,
    pub postcode: Postcode,
    pub listing_id: String,
    pub url: String,
    pub beds: Option<u32>,
    pub bath: Option<u32>,
    pub weekly_price: Option<u32>,
    pub scrape_timestamp: DateTime<Utc>,
    /// Markup of the listing card, kept for debugging and never persisted
    #[serde(skip)]
    pub raw_html: String,
}

impl ListingRecord {
    pub fn key(&self) -> String {
        composite_key(self.source, &self.listing_id)
    }
}

/// New listings found for one region, keyed by composite key.
pub type PostcodeListings = BTreeMap<String, ListingRecord>;

/// New listings of a whole run, keyed by region.
pub type AggregateListings = BTreeMap<Postcode, PostcodeListings>;

/// Composite keys already persisted before the run started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet(HashSet<String>);

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    pub fn contains_listing(&self, source: Source, listing_id: &str) -> bool {
        self.contains(&composite_key(source, listing_id))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

impl FromIterator<String> for SeenSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
