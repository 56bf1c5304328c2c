//! Two-tier snapshot cache.
//!
//! Metadata (url, fetch time, size, checksum) lives in a small SQLite table and
//! is read synchronously; the payload is a binary file next to it, written with
//! a write-to-temp-then-rename so a crash never leaves a torn payload behind.
//!
//! An entry is only usable when both tiers are present and agree. Every failure
//! here is a [`CacheError`]; callers treat it as a miss.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CacheError;

const METADATA_DB: &str = "snapshot_cache.db";
const PAYLOAD_DIR: &str = "payloads";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub url: String,
    /// Unix milliseconds when the payload was fetched; doubles as the snapshot version
    pub timestamp: i64,
    pub byte_size: u64,
    pub sha256: String,
}

#[derive(Clone)]
pub struct SnapshotCache {
    key: String,
    conn: Arc<Mutex<Connection>>,
    payload_dir: PathBuf,
}

impl SnapshotCache {
    pub fn open<P: AsRef<Path>>(data_dir: P, key: &str) -> Result<Self, CacheError> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;

        let conn = Connection::open(data_dir.join(METADATA_DB))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshot_meta (
                key TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                fetched_at INTEGER NOT NULL,
                byte_size INTEGER NOT NULL,
                sha256 TEXT NOT NULL
            );
            "#,
        )?;

        let payload_dir = data_dir.join(PAYLOAD_DIR);
        std::fs::create_dir_all(&payload_dir)?;

        Ok(Self {
            key: key.to_string(),
            conn: Arc::new(Mutex::new(conn)),
            payload_dir,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn payload_path(&self) -> PathBuf {
        let file_name: String = self
            .key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.payload_dir.join(format!("{file_name}.bin"))
    }

    pub fn metadata(&self) -> Result<Option<CacheMetadata>, CacheError> {
        let conn = self.conn.lock();
        let meta = conn
            .query_row(
                "SELECT url, fetched_at, byte_size, sha256 FROM snapshot_meta WHERE key = ?1",
                params![self.key],
                |row| {
                    Ok(CacheMetadata {
                        url: row.get(0)?,
                        timestamp: row.get(1)?,
                        byte_size: row.get::<_, i64>(2)?.max(0) as u64,
                        sha256: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(meta)
    }

    /// Whether a complete entry for `url` exists. Never fails; errors read as `false`.
    pub fn check(&self, url: &str) -> bool {
        let meta = match self.metadata() {
            Ok(Some(meta)) => meta,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "cache metadata unreadable");
                return false;
            }
        };

        if meta.url != url {
            tracing::debug!(cached = %meta.url, requested = %url, "cache entry is for another url");
            return false;
        }

        match std::fs::metadata(self.payload_path()) {
            Ok(file) => file.len() == meta.byte_size,
            Err(_) => false,
        }
    }

    /// Load the cached payload, verifying it against its metadata.
    pub async fn read(&self) -> Result<(CacheMetadata, Bytes), CacheError> {
        let meta = self.metadata()?.ok_or_else(|| CacheError::Missing { key: self.key.clone() })?;

        let payload = match tokio::fs::read(self.payload_path()).await {
            Ok(payload) => payload,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::PayloadMissing { key: self.key.clone() });
            }
            Err(e) => return Err(e.into()),
        };

        if payload.len() as u64 != meta.byte_size {
            return Err(CacheError::Inconsistent {
                key: self.key.clone(),
                detail: format!("payload is {} bytes, metadata says {}", payload.len(), meta.byte_size),
            });
        }

        let digest = hex::encode(Sha256::digest(&payload));
        if digest != meta.sha256 {
            return Err(CacheError::Inconsistent {
                key: self.key.clone(),
                detail: "checksum mismatch".to_string(),
            });
        }

        Ok((meta, Bytes::from(payload)))
    }

    /// Store a payload fetched from `url`.
    ///
    /// The old metadata row is removed first and the new one written last, so a
    /// save interrupted halfway leaves no usable (and therefore no torn) entry.
    pub async fn save(&self, url: &str, payload: &Bytes) -> Result<CacheMetadata, CacheError> {
        self.delete_metadata()?;

        let path = self.payload_path();
        let temp_path = path.with_extension("bin.tmp");
        tokio::fs::write(&temp_path, payload).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        let meta = CacheMetadata {
            url: url.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            byte_size: payload.len() as u64,
            sha256: hex::encode(Sha256::digest(payload)),
        };

        {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT OR REPLACE INTO snapshot_meta (key, url, fetched_at, byte_size, sha256)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![self.key, meta.url, meta.timestamp, meta.byte_size as i64, meta.sha256],
            )?;
        }

        tracing::info!(key = %self.key, bytes = meta.byte_size, "snapshot cached");
        Ok(meta)
    }

    /// Evict both tiers. A payload that is already gone is not an error.
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.delete_metadata()?;
        match tokio::fs::remove_file(self.payload_path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_metadata(&self) -> Result<(), CacheError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM snapshot_meta WHERE key = ?1", params![self.key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const URL: &str = "http://example.test/messages.parquet";

    #[tokio::test]
    async fn test_save_then_read_round_trip() {
        let dir = tempdir().unwrap();
        let cache = SnapshotCache::open(dir.path(), "snap").unwrap();
        assert!(!cache.check(URL));

        let payload = Bytes::from_static(b"PAR1 fake payload PAR1");
        let meta = cache.save(URL, &payload).await.unwrap();
        assert_eq!(meta.byte_size, payload.len() as u64);
        assert!(cache.check(URL));

        let (read_meta, bytes) = cache.read().await.unwrap();
        assert_eq!(read_meta, meta);
        assert_eq!(bytes, payload);
    }

    #[tokio::test]
    async fn test_metadata_without_payload_is_unusable() {
        let dir = tempdir().unwrap();
        let cache = SnapshotCache::open(dir.path(), "snap").unwrap();
        cache.save(URL, &Bytes::from_static(b"abc")).await.unwrap();

        std::fs::remove_file(cache.payload_path()).unwrap();

        assert!(!cache.check(URL));
        assert!(matches!(cache.read().await, Err(CacheError::PayloadMissing { .. })));
    }

    #[tokio::test]
    async fn test_tampered_payload_is_inconsistent() {
        let dir = tempdir().unwrap();
        let cache = SnapshotCache::open(dir.path(), "snap").unwrap();
        cache.save(URL, &Bytes::from_static(b"abc")).await.unwrap();

        std::fs::write(cache.payload_path(), b"xyz").unwrap();

        assert!(cache.check(URL), "size still matches, check is the cheap test");
        assert!(matches!(cache.read().await, Err(CacheError::Inconsistent { .. })));
    }

    #[tokio::test]
    async fn test_entry_for_other_url_is_not_used() {
        let dir = tempdir().unwrap();
        let cache = SnapshotCache::open(dir.path(), "snap").unwrap();
        cache.save(URL, &Bytes::from_static(b"abc")).await.unwrap();
        assert!(!cache.check("http://example.test/other.parquet"));
    }

    #[tokio::test]
    async fn test_clear_evicts_both_tiers() {
        let dir = tempdir().unwrap();
        let cache = SnapshotCache::open(dir.path(), "snap").unwrap();
        cache.save(URL, &Bytes::from_static(b"abc")).await.unwrap();

        cache.clear().await.unwrap();
        assert!(cache.metadata().unwrap().is_none());
        assert!(!cache.payload_path().exists());

        // Clearing an empty cache is fine
        cache.clear().await.unwrap();
    }

    #[test]
    fn test_payload_path_is_sanitized() {
        let dir = tempdir().unwrap();
        let cache = SnapshotCache::open(dir.path(), "a/b c").unwrap();
        assert!(cache.payload_path().ends_with("payloads/a_b_c.bin"));
    }
}
