use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::listing::{AggregateListings, ListingRecord, SeenSet};
use crate::store::DedupeStore;

const CREATE_LISTINGS: &str = r#"
CREATE TABLE IF NOT EXISTS listings (
    key TEXT PRIMARY KEY NOT NULL,
    source TEXT NOT NULL,
    postcode TEXT NOT NULL,
    listing_id TEXT NOT NULL,
    document TEXT NOT NULL,
    scrape_timestamp TEXT NOT NULL
)
"#;

const UPSERT_LISTING: &str = r#"
INSERT INTO listings (key, source, postcode, listing_id, document, scrape_timestamp)
VALUES (?, ?, ?, ?, ?, ?)
ON CONFLICT (key) DO UPDATE SET
    source = excluded.source,
    postcode = excluded.postcode,
    listing_id = excluded.listing_id,
    document = excluded.document,
    scrape_timestamp = excluded.scrape_timestamp
"#;

/// One JSON document per listing, keyed by composite key.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    batch_size: usize,
}

impl SqliteStore {
    pub async fn connect(database_url: &str, batch_size: usize) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database url {database_url}"))?
            .create_if_missing(true);

        // A single connection that never expires keeps `sqlite::memory:` alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .with_context(|| format!("Couldn't connect to {database_url}"))?;

        sqlx::query(CREATE_LISTINGS).execute(&pool).await?;

        Ok(Self {
            pool,
            batch_size: batch_size.max(1),
        })
    }

    pub async fn get(&self, key: &str) -> anyhow::Result<Option<ListingRecord>> {
        let document: Option<String> =
            sqlx::query_scalar("SELECT document FROM listings WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        document
            .map(|d| serde_json::from_str(&d).with_context(|| format!("Malformed document {key}")))
            .transpose()
    }

    pub async fn count(&self) -> anyhow::Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM listings")
            .fetch_one(&self.pool)
            .await?)
    }
}

#[async_trait]
impl DedupeStore for SqliteStore {
    async fn load_seen(&self) -> anyhow::Result<SeenSet> {
        let keys: Vec<String> = sqlx::query_scalar("SELECT key FROM listings")
            .fetch_all(&self.pool)
            .await?;
        Ok(keys.into_iter().collect())
    }

    async fn upsert_new(&self, results: &AggregateListings) -> anyhow::Result<usize> {
        let records = results
            .values()
            .flat_map(|listings| listings.values())
            .collect::<Vec<_>>();

        for batch in records.chunks(self.batch_size) {
            let mut tx = self.pool.begin().await?;
            for record in batch {
                sqlx::query(UPSERT_LISTING)
                    .bind(record.key())
                    .bind(record.source.as_str())
                    .bind(record.postcode.as_str())
                    .bind(record.listing_id.as_str())
                    .bind(serde_json::to_string(record)?)
                    .bind(record.scrape_timestamp.to_rfc3339())
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;
            log::debug!("Upserted a batch of {} listings", batch.len());
        }

        Ok(records.len())
    }
}
