use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::color::{ColorScale, Theme};
use crate::constants;

/// How non-matching points are treated when a filter is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterPolicy {
    /// Non-matching points are removed from the surface
    Hide,
    /// Non-matching points stay rendered at reduced opacity
    #[default]
    Dim,
}

impl FilterPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hide" => Some(Self::Hide),
            "dim" => Some(Self::Dim),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub max_retries: u32,
    pub request_timeout: Duration,
    /// Backoff after attempt `n` is `backoff_base * 2^n`
    pub backoff_base: Duration,
    pub streaming_threshold: u64,
    pub progress_interval: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: constants::DEFAULT_MAX_RETRIES,
            request_timeout: constants::REQUEST_TIMEOUT,
            backoff_base: Duration::from_secs(1),
            streaming_threshold: constants::STREAMING_THRESHOLD_BYTES,
            progress_interval: constants::PROGRESS_INTERVAL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub instantiate_timeout: Duration,
    pub drop_settle_delay: Duration,
    pub table_name: String,
    pub search_limit: usize,
    pub overview_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instantiate_timeout: constants::ENGINE_INSTANTIATE_TIMEOUT,
            drop_settle_delay: constants::DROP_SETTLE_DELAY,
            table_name: constants::TABLE_NAME.to_string(),
            search_limit: constants::SEARCH_LIMIT,
            overview_limit: constants::OVERVIEW_LIMIT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VisualizationConfig {
    pub batch_size: usize,
    pub streaming_threshold: usize,
    /// Pause between two streamed batches
    pub batch_delay: Duration,
    /// Half-width of the vertical jitter band
    pub jitter: f32,
    /// Fraction of the time span added on each side of the x domain
    pub x_padding: f64,
    pub filter_policy: FilterPolicy,
    pub theme: Theme,
    pub scale: ColorScale,
    pub point_size: f32,
    pub point_size_selected: f32,
    pub point_size_highlighted: f32,
    pub opacity: f32,
    pub opacity_dimmed: f32,
    /// Seed for the jitter generator, so reloads place points identically
    pub jitter_seed: u64,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            batch_size: constants::BATCH_SIZE,
            streaming_threshold: constants::STREAMING_RECORD_THRESHOLD,
            batch_delay: Duration::from_millis(1),
            jitter: 0.01,
            x_padding: 0.01,
            filter_policy: FilterPolicy::default(),
            theme: Theme::default(),
            scale: ColorScale::default(),
            point_size: 2.0,
            point_size_selected: 5.0,
            point_size_highlighted: 4.0,
            opacity: 0.9,
            opacity_dimmed: 0.3 * 0.9,
            jitter_seed: 0x5eed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
    pub snapshot_url: String,
    pub cache_key: String,
    pub fetch: FetchConfig,
    pub engine: EngineConfig,
    pub viz: VisualizationConfig,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            snapshot_url: constants::DEFAULT_SNAPSHOT_URL.to_string(),
            cache_key: constants::DEFAULT_CACHE_KEY.to_string(),
            fetch: FetchConfig::default(),
            engine: EngineConfig::default(),
            viz: VisualizationConfig::default(),
        }
    }

    pub fn with_snapshot_url(mut self, url: impl Into<String>) -> Self {
        self.snapshot_url = url.into();
        self
    }

    /// Defaults overlaid with `CHATSCOPE_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("CHATSCOPE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("CHATSCOPE_SNAPSHOT_URL") {
            if !url.trim().is_empty() {
                config.snapshot_url = url;
            }
        }
        if let Ok(key) = std::env::var("CHATSCOPE_CACHE_KEY") {
            if !key.trim().is_empty() {
                config.cache_key = key;
            }
        }
        config
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .map(|dir| dir.join("chatscope"))
            .unwrap_or_else(|| PathBuf::from("chatscope_data"));
        Self::new(data_dir)
    }
}
