//! End-to-end facade for hosts: fetch → engine bootstrap → overview rows, and
//! search over the loaded table. Secondary snapshots (file listings) can be
//! loaded in full without touching the main table.
//!
//! Every operation here reports `success` plus a readable `error` instead of
//! returning `Err`, so a host can surface failures without matching on the
//! error taxonomy.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::color::ColorService;
use crate::config::{CoreConfig, EngineConfig};
use crate::constants::FILES_TABLE_NAME;
use crate::engine::{quote_ident, EngineService, TableInfo};
use crate::error::{Error, Result};
use crate::models::{Record, RecordRef, SearchFilters};
use crate::search::{SearchService, SenderSummary};
use crate::storage::{FetchOptions, SnapshotCache, SnapshotFetcher, SnapshotSource};

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub success: bool,
    pub error: Option<String>,
    /// Overview rows ready for the visualization
    pub rows: Vec<RecordRef>,
    pub columns: Vec<String>,
    pub source: Option<SnapshotSource>,
    pub table: Option<TableInfo>,
}

impl LoadReport {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            error: Some(message),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchReport {
    pub success: bool,
    pub error: Option<String>,
    pub matches: Vec<Record>,
    pub searched_columns: Vec<String>,
    pub truncated: bool,
}

pub struct SnapshotPipeline {
    config: CoreConfig,
    fetcher: SnapshotFetcher,
    engines: Arc<EngineService>,
    colors: Arc<ColorService>,
    search: Mutex<Option<Arc<SearchService>>>,
}

impl SnapshotPipeline {
    /// Pipeline with its own engine and color services.
    pub fn new(config: CoreConfig) -> Result<Self> {
        let engines = Arc::new(EngineService::new(config.engine.clone()));
        Self::with_services(config, engines, Arc::new(ColorService::new()))
    }

    /// Pipeline over shared services, e.g. [`EngineService::global`].
    pub fn with_services(config: CoreConfig, engines: Arc<EngineService>, colors: Arc<ColorService>) -> Result<Self> {
        // A cache that cannot be opened only costs us the fast path
        let cache = match SnapshotCache::open(&config.data_dir, &config.cache_key) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(error = %e, dir = %config.data_dir.display(), "snapshot cache unavailable");
                None
            }
        };
        let fetcher = SnapshotFetcher::new(config.snapshot_url.clone(), cache, config.fetch.clone())?;

        Ok(Self {
            config,
            fetcher,
            engines,
            colors,
            search: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &SnapshotFetcher {
        &self.fetcher
    }

    pub fn engines(&self) -> &Arc<EngineService> {
        &self.engines
    }

    pub fn colors(&self) -> &Arc<ColorService> {
        &self.colors
    }

    #[instrument(skip_all, fields(url = %self.config.snapshot_url))]
    pub async fn load(&self, options: FetchOptions) -> LoadReport {
        match self.try_load(options).await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, stage = ?e.stage(), "snapshot load failed");
                LoadReport::failure(e.to_string())
            }
        }
    }

    async fn try_load(&self, options: FetchOptions) -> Result<LoadReport> {
        let snapshot = self.fetcher.fetch(options).await?;
        let engine = self.engines.initialize().await?;
        let table = engine.load_table(snapshot.bytes).await?;

        // New dataset, new color identities
        self.colors.reset();

        let overview = engine.overview().await?;
        info!(
            source = ?snapshot.source,
            rows = table.rows,
            overview_rows = overview.len(),
            "snapshot loaded"
        );

        Ok(LoadReport {
            success: true,
            error: None,
            rows: overview.rows.into_iter().map(Arc::new).collect(),
            columns: overview.columns,
            source: Some(snapshot.source),
            table: Some(table),
        })
    }

    /// Fetch a secondary snapshot and return every row of it.
    ///
    /// Runs through its own short-lived engine and skips the cache, so the
    /// main table and its cached snapshot stay as they are.
    #[instrument(skip(self, options))]
    pub async fn load_files(&self, url: &str, options: FetchOptions) -> LoadReport {
        match self.try_load_files(url, options).await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, stage = ?e.stage(), "files snapshot load failed");
                LoadReport::failure(e.to_string())
            }
        }
    }

    async fn try_load_files(&self, url: &str, options: FetchOptions) -> Result<LoadReport> {
        let fetcher = SnapshotFetcher::new(url, None, self.config.fetch.clone())?;
        let snapshot = fetcher
            .fetch(FetchOptions {
                use_cache: false,
                force_fresh: false,
                ..options
            })
            .await?;

        let engines = EngineService::new(EngineConfig {
            table_name: FILES_TABLE_NAME.to_string(),
            ..self.config.engine.clone()
        });
        let engine = engines.initialize().await?;
        let loaded = async {
            let table = engine.load_table(snapshot.bytes).await?;
            let sql = format!("SELECT * FROM {}", quote_ident(engine.table_name()));
            let rows = engine.query(&sql, Vec::new()).await?;
            Ok::<_, Error>((table, rows))
        }
        .await;
        engines.reset().await;
        let (table, rows) = loaded?;

        if rows.is_empty() {
            warn!(url, "files snapshot has no rows");
        }
        info!(url, rows = rows.len(), "files snapshot loaded");

        Ok(LoadReport {
            success: true,
            error: None,
            rows: rows.rows.into_iter().map(Arc::new).collect(),
            columns: rows.columns,
            source: Some(snapshot.source),
            table: Some(table),
        })
    }

    async fn search_service(&self) -> Result<Arc<SearchService>> {
        let engine = self.engines.initialize().await?;
        let mut slot = self.search.lock().await;
        if let Some(service) = slot.as_ref() {
            if Arc::ptr_eq(service.engine(), &engine) {
                return Ok(Arc::clone(service));
            }
        }
        let service = Arc::new(SearchService::new(engine));
        *slot = Some(Arc::clone(&service));
        Ok(service)
    }

    #[instrument(skip(self, filters))]
    pub async fn search(&self, term: &str, filters: &SearchFilters) -> SearchReport {
        let outcome = match self.search_service().await {
            Ok(service) => service.search(term, filters).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(outcome) => SearchReport {
                success: true,
                error: None,
                matches: outcome.rows,
                searched_columns: outcome.searched_columns,
                truncated: outcome.truncated,
            },
            Err(e) => {
                warn!(error = %e, "search failed");
                SearchReport {
                    success: false,
                    error: Some(e.to_string()),
                    ..SearchReport::default()
                }
            }
        }
    }

    pub async fn senders(&self) -> Result<SenderSummary> {
        self.search_service().await?.senders().await
    }

    /// Release the engine; the next load bootstraps a fresh one.
    pub async fn shutdown(&self) {
        self.search.lock().await.take();
        self.engines.reset().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::telegram_snapshot;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::time::Duration;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config(dir: &tempfile::TempDir, url: String) -> CoreConfig {
        let mut config = CoreConfig::new(dir.path()).with_snapshot_url(url);
        config.fetch.backoff_base = Duration::from_millis(1);
        config.engine.drop_settle_delay = Duration::from_millis(1);
        config
    }

    async fn snapshot_server() -> String {
        let body = telegram_snapshot().to_vec();
        let router = Router::new().route("/snapshot.parquet", get(move || async move { body }));
        format!("{}/snapshot.parquet", serve(router).await)
    }

    async fn wait_for_cache(pipeline: &SnapshotPipeline) {
        for _ in 0..200 {
            if pipeline.fetcher().check_cache() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("snapshot was never cached");
    }

    #[tokio::test]
    async fn test_load_then_search() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = SnapshotPipeline::new(config(&dir, snapshot_server().await)).unwrap();

        let report = pipeline.load(FetchOptions::default()).await;
        assert!(report.success, "{:?}", report.error);
        assert_eq!(report.source, Some(SnapshotSource::Network));
        assert_eq!(report.table.as_ref().map(|t| t.rows), Some(4));
        assert_eq!(report.rows.len(), 4);

        let found = pipeline.search("hello", &SearchFilters::new()).await;
        assert!(found.success, "{:?}", found.error);
        assert_eq!(found.matches.len(), 2);
        assert!(!found.truncated);
    }

    #[tokio::test]
    async fn test_second_load_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = SnapshotPipeline::new(config(&dir, snapshot_server().await)).unwrap();

        assert!(pipeline.load(FetchOptions::default()).await.success);
        wait_for_cache(&pipeline).await;

        let report = pipeline.load(FetchOptions::default()).await;
        assert!(report.success);
        assert_eq!(report.source, Some(SnapshotSource::Cache));
        assert_eq!(pipeline.fetcher().network_attempts(), 1);
        assert_eq!(pipeline.engines().instance_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let router = Router::new().route("/snapshot.parquet", get(|| async { StatusCode::NOT_FOUND }));
        let url = format!("{}/snapshot.parquet", serve(router).await);
        let pipeline = SnapshotPipeline::new(config(&dir, url)).unwrap();

        let report = pipeline
            .load(FetchOptions {
                max_retries: 2,
                ..FetchOptions::default()
            })
            .await;
        assert!(!report.success);
        assert!(report.error.unwrap().contains("404"));
        assert!(report.rows.is_empty());
        assert_eq!(pipeline.fetcher().network_attempts(), 2);
    }

    #[tokio::test]
    async fn test_search_before_load_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = SnapshotPipeline::new(config(&dir, "http://127.0.0.1:9/none".into())).unwrap();

        let report = pipeline.search("anything", &SearchFilters::new()).await;
        assert!(!report.success);
        assert!(report.error.is_some());
    }

    #[tokio::test]
    async fn test_load_resets_colors_and_senders_follow() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = SnapshotPipeline::new(config(&dir, snapshot_server().await)).unwrap();
        pipeline.colors().get_or_init(["stale"], Default::default());

        assert!(pipeline.load(FetchOptions::default()).await.success);
        assert!(pipeline.colors().current().is_none());

        let summary = pipeline.senders().await.unwrap();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.senders[0].name, "alice");
        assert_eq!(summary.senders[0].count, 2);
    }

    #[tokio::test]
    async fn test_files_snapshot_loads_in_full_beside_main_table() {
        let dir = tempfile::tempdir().unwrap();
        let base = snapshot_server().await;
        let pipeline = SnapshotPipeline::new(config(&dir, base.clone())).unwrap();
        assert!(pipeline.load(FetchOptions::default()).await.success);

        let files = pipeline.load_files(&base, FetchOptions::default()).await;
        assert!(files.success, "{:?}", files.error);
        assert_eq!(files.rows.len(), 4);
        assert_eq!(files.columns, vec!["date", "from", "text", "chat_name"]);
        assert_eq!(files.source, Some(SnapshotSource::Network));
        assert_eq!(files.table.as_ref().map(|t| t.name.as_str()), Some("files"));

        // The main table still answers searches
        let found = pipeline.search("hello", &SearchFilters::new()).await;
        assert_eq!(found.matches.len(), 2);
        assert_eq!(pipeline.engines().instance_count(), 1);
    }

    #[tokio::test]
    async fn test_files_snapshot_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let router = Router::new().route("/files.parquet", get(|| async { StatusCode::GONE }));
        let url = format!("{}/files.parquet", serve(router).await);
        let pipeline = SnapshotPipeline::new(config(&dir, url.clone())).unwrap();

        let report = pipeline
            .load_files(
                &url,
                FetchOptions {
                    max_retries: 1,
                    ..FetchOptions::default()
                },
            )
            .await;
        assert!(!report.success);
        assert!(report.error.unwrap().contains("410"));
        assert!(pipeline.engines().current().await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_releases_engine() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = SnapshotPipeline::new(config(&dir, snapshot_server().await)).unwrap();
        assert!(pipeline.load(FetchOptions::default()).await.success);

        pipeline.shutdown().await;
        assert!(pipeline.engines().current().await.is_none());
        assert!(pipeline.load(FetchOptions::default()).await.success);
        assert_eq!(pipeline.engines().instance_count(), 2);
    }
}
