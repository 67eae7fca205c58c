use async_trait::async_trait;

use crate::listing::{AggregateListings, SeenSet};

mod document;
mod flat_file;

pub use document::SqliteStore;
pub use flat_file::{CsvStore, StoredRow, CSV_HEADERS};

/// Where listings found by earlier runs are kept.
#[async_trait]
pub trait DedupeStore: Send + Sync {
    /// Composite keys of every stored listing.
    async fn load_seen(&self) -> anyhow::Result<SeenSet>;

    /// Writes the listings of a run, overwriting listings stored under the
    /// same key. Returns the number of listings written.
    ///
    /// Call at most once per run, after every walk has completed.
    async fn upsert_new(&self, results: &AggregateListings) -> anyhow::Result<usize>;
}
