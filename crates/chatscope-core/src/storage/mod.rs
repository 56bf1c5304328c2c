//! Snapshot acquisition: a retrying network fetcher in front of a two-tier
//! local cache (SQLite metadata + binary payload file).

pub mod cache;
pub mod fetcher;

pub use cache::{CacheMetadata, SnapshotCache};
pub use fetcher::{backoff_delay, FetchOptions, FetchProgress, FetchedSnapshot, SnapshotFetcher, SnapshotSource};
