//! SQLite-backed article persistence with content fingerprinting.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};

use crate::error::{Result, ScoutError};

/// One saved article. The fingerprint is derived, never supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// A stored row as read back from the database.
#[derive(Debug, Clone, Serialize)]
pub struct StoredArticle {
    pub fingerprint: String,
    pub title: String,
    pub url: String,
    pub summary: Option<String>,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// First time this title+url pair was seen.
    Saved,
    /// Already on record; its `updated_at` was refreshed.
    Duplicate,
}

/// Per-item accounting for a batch save. Individual failures are recorded
/// here instead of aborting the rest of the batch.
#[derive(Debug, Default, Clone)]
pub struct BatchReport {
    pub saved: usize,
    pub updated: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Stable identity for an article: hex SHA-256 over title and URL. Two
/// fetches of the same piece from the same place collapse to one row no
/// matter when they happen.
pub fn fingerprint(title: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

pub struct ArticleStore {
    pool: SqlitePool,
}

impl ArticleStore {
    const INIT_STATEMENT: &'static str = r#"
        CREATE TABLE IF NOT EXISTS articles (
            fingerprint TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            url TEXT NOT NULL,
            summary TEXT,
            source TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
    "#;

    pub async fn connect(connection_url: impl AsRef<str>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(connection_url.as_ref())
            .await
            .map_err(|err| {
                ScoutError::Storage(format!(
                    "failed connecting to `{}`: {err}",
                    connection_url.as_ref()
                ))
            })?;

        sqlx::query(Self::INIT_STATEMENT)
            .execute(&pool)
            .await
            .map_err(|err| ScoutError::Storage(format!("failed initializing schema: {err}")))?;

        Ok(Self { pool })
    }

    /// Insert the article, or refresh `updated_at` if its fingerprint is
    /// already present. A duplicate is an expected outcome, not an error.
    pub async fn save(&self, article: &Article) -> Result<SaveOutcome> {
        let fp = fingerprint(&article.title, &article.url);
        let now = Utc::now();

        let existing = sqlx::query("SELECT fingerprint FROM articles WHERE fingerprint = ?")
            .bind(&fp)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| ScoutError::Storage(format!("lookup failed: {err}")))?;

        if existing.is_some() {
            sqlx::query("UPDATE articles SET updated_at = ? WHERE fingerprint = ?")
                .bind(now.to_rfc3339())
                .bind(&fp)
                .execute(&self.pool)
                .await
                .map_err(|err| ScoutError::Storage(format!("update failed: {err}")))?;
            tracing::debug!(fingerprint = %fp, "duplicate article, timestamp refreshed");
            return Ok(SaveOutcome::Duplicate);
        }

        sqlx::query(
            "INSERT INTO articles (fingerprint, title, url, summary, source, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&fp)
        .bind(&article.title)
        .bind(&article.url)
        .bind(&article.summary)
        .bind(&article.source)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|err| ScoutError::Storage(format!("insert failed: {err}")))?;

        tracing::debug!(fingerprint = %fp, title = %article.title, "article saved");
        Ok(SaveOutcome::Saved)
    }

    /// Save a batch, one item at a time. A failing item is tallied and the
    /// rest of the batch still goes through.
    pub async fn save_batch(&self, articles: &[Article]) -> BatchReport {
        let mut report = BatchReport::default();
        for article in articles {
            match self.save(article).await {
                Ok(SaveOutcome::Saved) => report.saved += 1,
                Ok(SaveOutcome::Duplicate) => report.updated += 1,
                Err(err) => {
                    report.failed += 1;
                    report.errors.push(format!("{}: {err}", article.url));
                }
            }
        }
        report
    }

    pub async fn exists(&self, url: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM articles WHERE url = ? LIMIT 1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| ScoutError::Storage(format!("lookup failed: {err}")))?;
        Ok(row.is_some())
    }

    /// Most recently updated articles, newest first, optionally restricted
    /// to the last `since_days` days.
    pub async fn recent(&self, limit: u32, since_days: Option<u32>) -> Result<Vec<StoredArticle>> {
        let cutoff = since_days
            .map(|days| (Utc::now() - Duration::days(i64::from(days))).to_rfc3339())
            .unwrap_or_default();

        let rows = sqlx::query(
            "SELECT fingerprint, title, url, summary, source, created_at, updated_at \
             FROM articles WHERE updated_at >= ? ORDER BY updated_at DESC LIMIT ?",
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| ScoutError::Storage(format!("query failed: {err}")))?;

        rows.into_iter().map(|row| decode_row(&row)).collect()
    }
}

fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Result<StoredArticle> {
    let created_at: String = row
        .try_get("created_at")
        .map_err(|err| ScoutError::Storage(format!("failed decoding row: {err}")))?;
    let updated_at: String = row
        .try_get("updated_at")
        .map_err(|err| ScoutError::Storage(format!("failed decoding row: {err}")))?;
    Ok(StoredArticle {
        fingerprint: column(row, "fingerprint")?,
        title: column(row, "title")?,
        url: column(row, "url")?,
        summary: row
            .try_get("summary")
            .map_err(|err| ScoutError::Storage(format!("failed decoding row: {err}")))?,
        source: row
            .try_get("source")
            .map_err(|err| ScoutError::Storage(format!("failed decoding row: {err}")))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn column(row: &sqlx::sqlite::SqliteRow, name: &str) -> Result<String> {
    row.try_get(name)
        .map_err(|err| ScoutError::Storage(format!("failed decoding `{name}`: {err}")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| ScoutError::Storage(format!("invalid timestamp `{raw}`: {err}")))
}
