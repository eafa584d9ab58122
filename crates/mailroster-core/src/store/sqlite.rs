//! SQLite-backed blob store

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use super::blob::BlobStore;
use crate::error::StoreError;

/// SQLite database holding named blobs with a content digest
pub struct SqliteBlobStore {
    conn: Connection,
    db_path: PathBuf,
}

/// Lightweight blob description for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobSummary {
    pub name: String,
    pub size: usize,
    pub updated_at: DateTime<Utc>,
}

impl SqliteBlobStore {
    /// Open or create a blob database at the specified path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = path.as_ref().to_path_buf();

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path)?;

        let store = Self { conn, db_path };
        store.initialize_schema()?;

        Ok(store)
    }

    /// In-memory database, gone when dropped
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            db_path: PathBuf::from(":memory:"),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Get the default database path (~/.mailroster/state.db)
    pub fn default_path() -> Result<PathBuf, StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::NoHomeDirectory)?;
        Ok(home.join(".mailroster").join("state.db"))
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn initialize_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS blobs (
                name TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// List stored blobs, most recently updated first
    pub fn list(&self) -> Result<Vec<BlobSummary>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, length(content), updated_at FROM blobs ORDER BY updated_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            let size: i64 = row.get(1)?;
            let updated_at: String = row.get(2)?;
            Ok((name, size, updated_at))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let (name, size, updated_at) = row?;
            let updated_at = DateTime::parse_from_rfc3339(&updated_at)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| StoreError::Timestamp {
                    name: name.clone(),
                    value: updated_at.clone(),
                })?;
            summaries.push(BlobSummary {
                name,
                size: size.max(0) as usize,
                updated_at,
            });
        }
        Ok(summaries)
    }
}

fn digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl BlobStore for SqliteBlobStore {
    fn read(&self, name: &str) -> Result<Option<String>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT content, sha256 FROM blobs WHERE name = ?1",
                params![name],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        match row {
            Some((content, expected)) => {
                if digest(&content) != expected {
                    return Err(StoreError::Integrity {
                        name: name.to_string(),
                    });
                }
                Ok(Some(content))
            }
            None => Ok(None),
        }
    }

    fn write(&self, name: &str, content: &str) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO blobs (name, content, sha256, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![name, content, digest(content), Utc::now().to_rfc3339()],
        )?;

        tracing::debug!("Saved blob {} to {}", name, self.db_path.display());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM blobs WHERE name = ?1", params![name])?;
        Ok(deleted > 0)
    }
}
