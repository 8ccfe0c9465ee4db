
use serde::{Deserialize, Serialize};
use sqlx::any::install_default_drivers;
use sqlx::{AnyConnection, Connection, Executor, Row};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::{RagChatError, Result};

pub const TEXT_TABLE: &str = "ai_context";

const SQLITE_BACKEND: &str = "SQLite";

/// A line of source text and the id the store assigned to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRecord {
    pub id: i64,
    pub text: String,
}

/// Keyed text store backed by any sqlx-supported database (MySQL in production).
///
/// A fresh connection is opened for every logical operation and closed afterwards.
#[derive(Debug, Clone)]
pub struct TextStore {
    url: String,
}

impl TextStore {
    #[inline]
    pub fn new(url: impl Into<String>) -> Self {
        install_default_drivers();
        Self { url: url.into() }
    }

    async fn connect(&self) -> Result<AnyConnection> {
        AnyConnection::connect(&self.url)
            .await
            .map_err(|e| RagChatError::Store(format!("Failed to connect to text store: {}", e)))
    }

    /// Drop the text table and recreate it from a schema script
    #[inline]
    pub async fn setup_schema(&self, schema_file: &Path) -> Result<()> {
        let schema = tokio::fs::read_to_string(schema_file).await?;

        info!("Recreating {} from {}", TEXT_TABLE, schema_file.display());

        let mut conn = self.connect().await?;

        conn.execute(format!("DROP TABLE IF EXISTS {}", TEXT_TABLE).as_str())
            .await
            .map_err(|e| RagChatError::Store(format!("Failed to drop {}: {}", TEXT_TABLE, e)))?;

        conn.execute(schema.as_str())
            .await
            .map_err(|e| RagChatError::Store(format!("Failed to execute schema: {}", e)))?;

        close(conn).await;
        Ok(())
    }

    /// Insert every non-blank line of `path` as a new row, in file order.
    ///
    /// Rows are committed one by one, so a failure part way through leaves the
    /// earlier rows in place.
    #[inline]
    pub async fn ingest_from_file(&self, path: &Path) -> Result<Vec<TextRecord>> {
        let file = File::open(path).await?;
        let mut lines = BufReader::new(file).lines();

        let mut conn = self.connect().await?;
        let mut records = Vec::new();

        while let Some(line) = lines.next_line().await? {
            let text = line.trim();
            if text.is_empty() {
                continue;
            }

            let id = insert_text(&mut conn, text).await?;
            records.push(TextRecord {
                id,
                text: text.to_string(),
            });
        }

        close(conn).await;

        info!("Inserted {} records from {}", records.len(), path.display());
        Ok(records)
    }

    #[inline]
    pub async fn get_text(&self, id: i64) -> Result<Option<TextRecord>> {
        let mut conn = self.connect().await?;
        let record = fetch_text(&mut conn, id).await;
        close(conn).await;
        record
    }

    /// Look up several ids on one connection, keeping the input order.
    ///
    /// Ids with no row, or whose lookup fails, are skipped.
    #[inline]
    pub async fn get_texts(&self, ids: &[i64]) -> Result<Vec<TextRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.connect().await?;
        let mut records = Vec::with_capacity(ids.len());

        for &id in ids {
            match fetch_text(&mut conn, id).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => debug!("No text stored for id {}", id),
                Err(e) => warn!("Lookup of id {} failed: {}", id, e),
            }
        }

        close(conn).await;
        Ok(records)
    }

    #[inline]
    pub async fn count(&self) -> Result<i64> {
        let mut conn = self.connect().await?;

        let row = sqlx::query(&format!("SELECT COUNT(*) AS total FROM {}", TEXT_TABLE))
            .fetch_one(&mut conn)
            .await
            .map_err(|e| RagChatError::Store(format!("Failed to count records: {}", e)))?;
        let total: i64 = row
            .try_get("total")
            .map_err(|e| RagChatError::Store(format!("Failed to read record count: {}", e)))?;

        close(conn).await;
        Ok(total)
    }
}

async fn insert_text(conn: &mut AnyConnection, text: &str) -> Result<i64> {
    let result = sqlx::query(&format!("INSERT INTO {} (text) VALUES (?)", TEXT_TABLE))
        .bind(text)
        .execute(&mut *conn)
        .await
        .map_err(|e| RagChatError::Store(format!("Failed to insert text: {}", e)))?;

    if let Some(id) = result.last_insert_id() {
        return Ok(id);
    }

    // the SQLite backend of the Any driver never reports the rowid
    if conn.backend_name() == SQLITE_BACKEND {
        return sqlx::query_scalar::<_, i64>("SELECT last_insert_rowid()")
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| RagChatError::Store(format!("Failed to read inserted id: {}", e)));
    }

    Err(RagChatError::Store(
        "Store did not report an inserted id".to_string(),
    ))
}

async fn fetch_text(conn: &mut AnyConnection, id: i64) -> Result<Option<TextRecord>> {
    let row = sqlx::query(&format!("SELECT id, text FROM {} WHERE id = ?", TEXT_TABLE))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| RagChatError::Store(format!("Failed to fetch id {}: {}", id, e)))?;

    let Some(row) = row else {
        return Ok(None);
    };

    let record = TextRecord {
        id: row
            .try_get("id")
            .map_err(|e| RagChatError::Store(format!("Failed to decode id: {}", e)))?,
        text: row
            .try_get("text")
            .map_err(|e| RagChatError::Store(format!("Failed to decode text: {}", e)))?,
    };
    Ok(Some(record))
}

async fn close(conn: AnyConnection) {
    if let Err(e) = conn.close().await {
        debug!("Error while closing store connection: {}", e);
    }
}
