use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::listing::{AggregateListings, ListingRecord, SeenSet, Source};
use crate::region::Postcode;
use crate::store::DedupeStore;

pub const CSV_HEADERS: [&str; 8] = [
    "source",
    "postcode",
    "listing_id",
    "url",
    "beds",
    "bath",
    "weekly_price",
    "scrape_timestamp",
];

/// One row of the output file. Every field is kept as text so rows written
/// by older runs go through a rewrite unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRow {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default)]
    pub listing_id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub beds: String,
    #[serde(default)]
    pub bath: String,
    #[serde(default)]
    pub weekly_price: String,
    #[serde(default)]
    pub scrape_timestamp: String,
}

impl StoredRow {
    /// Composite key of the row, `None` when the row has no source or id.
    pub fn key(&self) -> Option<String> {
        let source = self.source.trim();
        let listing_id = self.listing_id.trim();
        if source.is_empty() || listing_id.is_empty() {
            return None;
        }
        let source = source
            .parse::<Source>()
            .map(|s| s.to_string())
            .unwrap_or_else(|_| source.to_string());
        Some(format!("{source}-{listing_id}"))
    }

    fn normalize_postcode(mut self) -> Self {
        // Older files may hold postcodes without their leading zero
        if let Ok(code) = self.postcode.trim().parse::<u16>() {
            if let Ok(postcode) = Postcode::from_number(code) {
                self.postcode = postcode.to_string();
            }
        }
        self
    }
}

impl From<&ListingRecord> for StoredRow {
    fn from(r: &ListingRecord) -> Self {
        fn text(n: Option<u32>) -> String {
            n.map(|n| n.to_string()).unwrap_or_default()
        }

        Self {
            source: r.source.to_string(),
            postcode: r.postcode.to_string(),
            listing_id: r.listing_id.clone(),
            url: r.url.clone(),
            beds: text(r.beds),
            bath: text(r.bath),
            weekly_price: text(r.weekly_price),
            scrape_timestamp: r.scrape_timestamp.to_rfc3339(),
        }
    }
}

/// Listings kept in a single CSV file, rewritten in full on every upsert.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A missing or empty file holds no rows.
pub fn read_rows(path: &Path) -> anyhow::Result<Vec<StoredRow>> {
    match fs::metadata(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(e).with_context(|| format!("Couldn't stat {}", path.display())),
        Ok(meta) if meta.len() == 0 => return Ok(vec![]),
        Ok(_) => (),
    }

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Couldn't open {}", path.display()))?;

    rdr.deserialize::<StoredRow>()
        .map(|row| row.map(StoredRow::normalize_postcode))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Malformed listings file {}", path.display()))
}

pub fn write_rows(path: &Path, rows: &[StoredRow]) -> anyhow::Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&tmp)
            .with_context(|| format!("Couldn't create {}", tmp.display()))?;
        wtr.write_record(CSV_HEADERS)?;
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("Couldn't replace {}", path.display()))?;
    Ok(())
}

/// Existing rows then new rows, the last row of a key wins. Sorted by
/// postcode, then by key.
pub fn merge_rows(existing: Vec<StoredRow>, new: Vec<StoredRow>) -> Vec<StoredRow> {
    let mut keyless = vec![];
    let mut keyed = BTreeMap::new();
    for row in existing.into_iter().chain(new) {
        match row.key() {
            Some(key) => {
                keyed.insert(key, row);
            }
            None => keyless.push(row),
        }
    }

    let mut rows = keyless;
    rows.extend(keyed.into_values());
    rows.sort_by(|a, b| a.postcode.cmp(&b.postcode));
    rows
}

#[async_trait]
impl DedupeStore for CsvStore {
    async fn load_seen(&self) -> anyhow::Result<SeenSet> {
        let path = self.path.clone();
        let rows = tokio::task::spawn_blocking(move || read_rows(&path)).await??;

        let total = rows.len();
        let seen: SeenSet = rows.iter().filter_map(StoredRow::key).collect();
        let keyless = rows.iter().filter(|r| r.key().is_none()).count();
        if keyless > 0 {
            log::warn!(
                "{keyless} of {total} rows in {} have no source or listing id and can't be deduplicated",
                self.path.display()
            );
        }

        Ok(seen)
    }

    async fn upsert_new(&self, results: &AggregateListings) -> anyhow::Result<usize> {
        let new = results
            .values()
            .flat_map(|listings| listings.values())
            .map(StoredRow::from)
            .collect::<Vec<_>>();
        let written = new.len();

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let existing = read_rows(&path)?;
            write_rows(&path, &merge_rows(existing, new))
        })
        .await??;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(source: &str, postcode: &str, id: &str, price: &str) -> StoredRow {
        StoredRow {
            source: source.into(),
            postcode: postcode.into(),
            listing_id: id.into(),
            url: format!("https://site.test/flat-{id}"),
            beds: String::new(),
            bath: String::new(),
            weekly_price: price.into(),
            scrape_timestamp: String::new(),
        }
    }

    #[test]
    fn legacy_source_names_share_keys() {
        assert_eq!(row("domain.com.au", "2000", "1", "").key().unwrap(), "domain-1");
        assert_eq!(row("domain", "2000", "1", "").key().unwrap(), "domain-1");
        assert_eq!(row("", "2000", "1", "").key(), None);
    }

    #[test]
    fn merge_overwrites_same_key_and_sorts() {
        let existing = vec![
            row("domain", "3000", "1", "400"),
            row("domain.com.au", "2000", "2", "500"),
            row("", "2500", "3", ""),
        ];
        let new = vec![row("domain", "3000", "1", "450"), row("rea", "0800", "1", "")];

        let rows = merge_rows(existing, new);
        let keys = rows
            .iter()
            .map(|r| (r.postcode.as_str(), r.listing_id.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec![("0800", "1"), ("2000", "2"), ("2500", "3"), ("3000", "1")]
        );
        assert_eq!(rows[3].weekly_price, "450");
    }

    #[test]
    fn short_postcodes_are_padded() {
        let r = row("domain", "800", "1", "").normalize_postcode();
        assert_eq!(r.postcode, "0800");
        let r = row("domain", "n/a", "1", "").normalize_postcode();
        assert_eq!(r.postcode, "n/a");
    }
}
