pub mod color;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod storage;
pub mod tracing_setup;
pub mod viz;

// Re-export the types hosts touch most at crate root for convenience
pub use error::{CacheError, Error, NetworkError, Result, Stage};
pub use models::{Record, SearchFilters};
pub use pipeline::{LoadReport, SearchReport, SnapshotPipeline};
