//! Application-wide constants
//!
//! Centralized location for alias families, magic strings and tuning values
//! that are shared across modules.

use std::time::Duration;

/// Default snapshot location used when neither env nor CLI supplies one
pub const DEFAULT_SNAPSHOT_URL: &str = "https://data.chatscope.dev/messages.parquet";

/// Fixed identifier both cache tiers are keyed by
pub const DEFAULT_CACHE_KEY: &str = "chatscope-snapshot";

/// Name of the queryable table built from each snapshot
pub const TABLE_NAME: &str = "messages";

/// Table name for secondary snapshots loaded in full, such as file listings
pub const FILES_TABLE_NAME: &str = "files";

// Fetcher defaults
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Responses at or above this size are read incrementally with progress
pub const STREAMING_THRESHOLD_BYTES: u64 = 1024 * 1024;
/// Minimum spacing between progress updates (10 per second)
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

// Engine defaults
pub const ENGINE_INSTANTIATE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DROP_SETTLE_DELAY: Duration = Duration::from_millis(100);
pub const SEARCH_LIMIT: usize = 10_000;
pub const OVERVIEW_LIMIT: usize = 5_000;

// Visualization defaults
pub const BATCH_SIZE: usize = 1_000;
/// Record counts above this are transformed in batches
pub const STREAMING_RECORD_THRESHOLD: usize = 1_000;

/// Label used for records without any sender-like field
pub const UNKNOWN_SENDER: &str = "unknown";

/// Field alias families. Lookups are case-insensitive, order is preference.
pub mod aliases {
    pub const TIMESTAMP: &[&str] = &["date", "timestamp"];
    pub const SENDER: &[&str] = &["from", "sender", "sender_name"];
    pub const TEXT: &[&str] = &["message", "text", "content", "body", "msg", "data"];
    pub const CHAT: &[&str] = &["chat_title", "group_chat_id", "chat_name"];
}
