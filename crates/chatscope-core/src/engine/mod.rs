//! Embedded analytical engine.
//!
//! A DataFusion [`SessionContext`] with an in-memory object store acting as its
//! virtual file system. Each snapshot is written into the store, the previous
//! table is dropped, and a fresh table is built through the first
//! [`CreateStrategy`] that works.
//!
//! The table is guarded by a `RwLock`: loading (drop, create, rename) holds the
//! write side for the whole sequence, queries hold the read side. A
//! [`TableReader`] keeps the read side across several statements so they all
//! see the same table.

mod rows;
mod strategy;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use arrow::array::{Array, Int64Array};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use datafusion::prelude::{SessionConfig, SessionContext};
use datafusion::scalar::ScalarValue;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use tokio::sync::{Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, info, instrument, warn};
use url::Url;

pub use rows::{RowSet, RowStrategy};
pub use strategy::{Column, ColumnKind, CreateStrategy, SchemaStrategy};

use crate::config::EngineConfig;
use crate::constants::UNKNOWN_SENDER;
use crate::error::{Error, Result, Stage};
use crate::models::AliasFamily;

const MEMORY_STORE_URL: &str = "memory://";

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub rows: usize,
    pub strategy: CreateStrategy,
    /// Bumped on every successful load
    pub generation: u64,
}

struct EngineState {
    ctx: SessionContext,
    store: Arc<InMemory>,
    file: Option<ObjectPath>,
    generation: u64,
    loaded: bool,
}

fn new_session(store: &Arc<InMemory>) -> Result<SessionContext> {
    let config = SessionConfig::new().with_information_schema(true);
    let ctx = SessionContext::new_with_config(config).enable_url_table();
    let url = Url::parse(MEMORY_STORE_URL).map_err(|e| Error::EngineInit(e.to_string()))?;
    let store: Arc<dyn ObjectStore> = store.clone();
    ctx.register_object_store(&url, store);
    Ok(ctx)
}

pub struct QueryEngine {
    config: EngineConfig,
    state: RwLock<EngineState>,
}

impl QueryEngine {
    fn new(config: EngineConfig) -> Result<Self> {
        let store = Arc::new(InMemory::new());
        let ctx = new_session(&store)?;
        Ok(Self {
            config,
            state: RwLock::new(EngineState {
                ctx,
                store,
                file: None,
                generation: 0,
                loaded: false,
            }),
        })
    }

    /// Build an engine and prove it answers a trivial query, bounded by the
    /// configured instantiation timeout.
    async fn instantiate(config: EngineConfig) -> Result<Self> {
        let timeout = config.instantiate_timeout;
        let bootstrap = async move {
            let engine = Self::new(config)?;
            engine
                .query("SELECT 1 AS probe", Vec::new())
                .await
                .map_err(|e| Error::EngineInit(format!("probe query failed: {e}")))?;
            Ok::<_, Error>(engine)
        };

        tokio::time::timeout(timeout, bootstrap)
            .await
            .map_err(|_| Error::EngineInit(format!("instantiation timed out after {}s", timeout.as_secs())))?
    }

    pub fn table_name(&self) -> &str {
        &self.config.table_name
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Hold the table steady across several statements.
    pub async fn read(&self) -> TableReader<'_> {
        TableReader {
            state: self.state.read().await,
            config: &self.config,
        }
    }

    pub async fn generation(&self) -> u64 {
        self.read().await.generation()
    }

    pub async fn is_loaded(&self) -> bool {
        self.read().await.is_loaded()
    }

    /// Replace the table with the contents of a parquet snapshot.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len(), table = %self.config.table_name))]
    pub async fn load_table(&self, bytes: Bytes) -> Result<TableInfo> {
        if bytes.is_empty() {
            return Err(Error::EngineInit("snapshot buffer is empty".to_string()));
        }

        let table = self.config.table_name.clone();
        let mut state = self.state.write().await;

        // ===== Register the virtual file =====
        if let Some(previous) = state.file.take() {
            if let Err(e) = state.store.delete(&previous).await {
                debug!(file = %previous, error = %e, "previous snapshot file already gone");
            }
        }
        let file = ObjectPath::from(format!(
            "snapshot_{}_{}.parquet",
            chrono::Utc::now().timestamp_millis(),
            state.generation + 1
        ));
        state
            .store
            .put(&file, bytes.clone().into())
            .await
            .map_err(|e| Error::query(Stage::RegisterFile, e))?;
        let location = format!("{MEMORY_STORE_URL}/{file}");
        state.file = Some(file);

        // ===== Drop whatever was there =====
        self.drop_existing(&mut state).await?;

        // ===== Create =====
        let mut used = None;
        let mut last_error = None;
        for strategy in CreateStrategy::ALL {
            match strategy.create(&state.ctx, &table, &location, &bytes).await {
                Ok(()) => {
                    used = Some(strategy);
                    break;
                }
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "table creation strategy failed");
                    let _ = state.ctx.deregister_table(table.as_str());
                    last_error = Some(e.to_string());
                }
            }
        }
        let Some(strategy) = used else {
            state.loaded = false;
            return Err(Error::query(
                Stage::CreateTable,
                last_error.unwrap_or_else(|| "no creation strategy succeeded".to_string()),
            ));
        };

        // ===== Verify =====
        let rows = count_rows(&state.ctx, &table).await?;
        if rows == 0 {
            warn!("table created but contains no rows");
        }

        state.generation += 1;
        state.loaded = true;
        info!(rows, strategy = strategy.name(), generation = state.generation, "snapshot table loaded");

        Ok(TableInfo {
            name: table,
            rows,
            strategy,
            generation: state.generation,
        })
    }

    async fn drop_existing(&self, state: &mut EngineState) -> Result<()> {
        let sql = format!("DROP TABLE IF EXISTS {}", quote_ident(&self.config.table_name));
        let dropped = match state.ctx.sql(&sql).await {
            Ok(df) => df.collect().await.map(|_| ()),
            Err(e) => Err(e),
        };

        if let Err(e) = dropped {
            warn!(error = %e, "drop failed, recreating session");
            state.ctx = new_session(&state.store).map_err(|_| Error::query(Stage::DropTable, e))?;
        }
        state.loaded = false;

        tokio::time::sleep(self.config.drop_settle_delay).await;
        Ok(())
    }

    /// Column names of the loaded table via the first [`SchemaStrategy`] that works.
    pub async fn describe_schema(&self) -> Result<Vec<String>> {
        let columns = self.read().await.describe_columns().await?;
        Ok(columns.into_iter().map(|column| column.name).collect())
    }

    /// Columns with their type class.
    pub async fn describe_columns(&self) -> Result<Vec<Column>> {
        self.read().await.describe_columns().await
    }

    /// Run `sql` with positional `$n` parameters.
    pub async fn query(&self, sql: &str, params: Vec<ScalarValue>) -> Result<RowSet> {
        self.read().await.query(sql, params).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.read().await.count().await
    }

    /// Rows for the initial visualization.
    ///
    /// With timestamp and sender columns present, one row per (timestamp,
    /// sender) with a message count; otherwise the first `overview_limit` rows.
    pub async fn overview(&self) -> Result<RowSet> {
        let reader = self.read().await;
        let table = quote_ident(&self.config.table_name);
        let generic = format!("SELECT * FROM {table} LIMIT {}", self.config.overview_limit);

        let columns: Vec<String> = match reader.describe_columns().await {
            Ok(columns) => columns.into_iter().map(|column| column.name).collect(),
            Err(e) => {
                warn!(error = %e, "schema unavailable, using generic overview");
                return reader.query(&generic, Vec::new()).await;
            }
        };

        let tailored = match (AliasFamily::Timestamp.first_in(&columns), AliasFamily::Sender.first_in(&columns)) {
            (Some(timestamp), Some(sender)) => {
                let timestamp = quote_ident(timestamp);
                let sender = format!("COALESCE(CAST({} AS VARCHAR), '{UNKNOWN_SENDER}')", quote_ident(sender));
                Some(format!(
                    "SELECT {timestamp} AS \"date\", {sender} AS \"sender\", COUNT(*) AS \"count\" \
                     FROM {table} WHERE {timestamp} IS NOT NULL \
                     GROUP BY {timestamp}, {sender} ORDER BY 1 ASC"
                ))
            }
            _ => None,
        };

        if let Some(sql) = tailored {
            match reader.query(&sql, Vec::new()).await {
                Ok(rows) => return Ok(rows),
                Err(e) => warn!(error = %e, "tailored overview failed, using generic query"),
            }
        }
        reader.query(&generic, Vec::new()).await
    }

    /// Drop the table and release the virtual file.
    pub async fn shutdown(&self) {
        let mut state = self.state.write().await;
        let sql = format!("DROP TABLE IF EXISTS {}", quote_ident(&self.config.table_name));
        if let Ok(df) = state.ctx.sql(&sql).await {
            let _ = df.collect().await;
        }
        if let Some(file) = state.file.take() {
            let _ = state.store.delete(&file).await;
        }
        state.loaded = false;
        debug!("engine shut down");
    }
}

/// Read access to the snapshot table. No load can start while one is alive.
pub struct TableReader<'a> {
    state: RwLockReadGuard<'a, EngineState>,
    config: &'a EngineConfig,
}

impl TableReader<'_> {
    pub fn table_name(&self) -> &str {
        &self.config.table_name
    }

    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    pub fn is_loaded(&self) -> bool {
        self.state.loaded
    }

    pub async fn describe_columns(&self) -> Result<Vec<Column>> {
        let mut last_error = None;
        for strategy in SchemaStrategy::ALL {
            match strategy.describe(&self.state.ctx, &self.config.table_name).await {
                Ok(columns) => {
                    debug!(strategy = strategy.name(), columns = columns.len(), "schema described");
                    return Ok(columns);
                }
                Err(e) => {
                    debug!(strategy = strategy.name(), error = %e, "schema strategy failed");
                    last_error = Some(e.to_string());
                }
            }
        }
        Err(Error::query(
            Stage::DescribeSchema,
            last_error.unwrap_or_else(|| "no schema strategy succeeded".to_string()),
        ))
    }

    pub async fn query(&self, sql: &str, params: Vec<ScalarValue>) -> Result<RowSet> {
        let (columns, batches) = execute(&self.state.ctx, sql, params).await?;
        RowSet::from_batches(columns, &batches)
    }

    pub async fn count(&self) -> Result<usize> {
        count_rows(&self.state.ctx, &self.config.table_name).await
    }
}

async fn execute(ctx: &SessionContext, sql: &str, params: Vec<ScalarValue>) -> Result<(Vec<String>, Vec<RecordBatch>)> {
    let mut df = ctx.sql(sql).await.map_err(|e| Error::query(Stage::Query, e))?;
    if !params.is_empty() {
        df = df.with_param_values(params).map_err(|e| Error::query(Stage::Query, e))?;
    }
    let columns = df.schema().fields().iter().map(|f| f.name().clone()).collect();
    let batches = df.collect().await.map_err(|e| Error::query(Stage::Query, e))?;
    Ok((columns, batches))
}

async fn count_rows(ctx: &SessionContext, table: &str) -> Result<usize> {
    let sql = format!("SELECT COUNT(*) AS n FROM {}", quote_ident(table));
    let (_, batches) = execute(ctx, &sql, Vec::new())
        .await
        .map_err(|e| Error::query(Stage::VerifyTable, e))?;

    let count = batches
        .first()
        .filter(|batch| batch.num_rows() > 0)
        .and_then(|batch| batch.column(0).as_any().downcast_ref::<Int64Array>().map(|a| a.value(0)))
        .ok_or_else(|| Error::query(Stage::VerifyTable, "count query returned no value"))?;
    Ok(count.max(0) as usize)
}

/// Owner of the single [`QueryEngine`] instance.
///
/// `initialize` is idempotent and serialized: concurrent callers wait on the
/// same lock and all receive the instance the first caller built.
pub struct EngineService {
    config: EngineConfig,
    instance: Mutex<Option<Arc<QueryEngine>>>,
    created: AtomicU64,
}

impl EngineService {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            instance: Mutex::new(None),
            created: AtomicU64::new(0),
        }
    }

    pub fn global() -> Arc<EngineService> {
        static SERVICE: OnceLock<Arc<EngineService>> = OnceLock::new();
        Arc::clone(SERVICE.get_or_init(|| Arc::new(EngineService::new(EngineConfig::default()))))
    }

    pub async fn initialize(&self) -> Result<Arc<QueryEngine>> {
        let mut guard = self.instance.lock().await;
        if let Some(engine) = guard.as_ref() {
            return Ok(Arc::clone(engine));
        }

        let engine = Arc::new(QueryEngine::instantiate(self.config.clone()).await?);
        self.created.fetch_add(1, Ordering::SeqCst);
        info!(instances = self.instance_count(), "query engine ready");
        *guard = Some(Arc::clone(&engine));
        Ok(engine)
    }

    pub async fn current(&self) -> Option<Arc<QueryEngine>> {
        self.instance.lock().await.clone()
    }

    /// Drop the table and release the instance; the next `initialize` builds a new one.
    pub async fn reset(&self) {
        let engine = self.instance.lock().await.take();
        if let Some(engine) = engine {
            engine.shutdown().await;
        }
    }

    /// Number of engines this service has built.
    pub fn instance_count(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Int64Array, StringArray, TimestampMillisecondArray};
    use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
    use arrow::record_batch::RecordBatch;
    use bytes::Bytes;
    use parquet::arrow::ArrowWriter;

    fn write_parquet(batch: &RecordBatch) -> Bytes {
        let mut buffer = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), None).unwrap();
        writer.write(batch).unwrap();
        writer.close().unwrap();
        Bytes::from(buffer)
    }

    /// Parquet snapshot with string columns named `columns` and the given rows.
    pub(crate) fn parquet_snapshot(columns: &[&str], rows: &[&[&str]]) -> Bytes {
        let schema = Arc::new(Schema::new(
            columns
                .iter()
                .map(|name| Field::new(*name, DataType::Utf8, true))
                .collect::<Vec<_>>(),
        ));
        let arrays: Vec<ArrayRef> = (0..columns.len())
            .map(|i| {
                let values: Vec<Option<&str>> = rows.iter().map(|row| row.get(i).copied()).collect();
                Arc::new(StringArray::from(values)) as ArrayRef
            })
            .collect();
        write_parquet(&RecordBatch::try_new(schema, arrays).unwrap())
    }

    /// `timestamp` as Int64 epoch numbers next to a `text` column.
    pub(crate) fn epoch_snapshot(rows: &[(i64, &str)]) -> Bytes {
        let schema = Arc::new(Schema::new(vec![
            Field::new("timestamp", DataType::Int64, true),
            Field::new("text", DataType::Utf8, true),
        ]));
        let stamps = Int64Array::from(rows.iter().map(|(stamp, _)| *stamp).collect::<Vec<_>>());
        let texts = StringArray::from(rows.iter().map(|(_, text)| *text).collect::<Vec<_>>());
        write_parquet(&RecordBatch::try_new(schema, vec![Arc::new(stamps), Arc::new(texts)]).unwrap())
    }

    /// `date` as a native millisecond timestamp column next to a `text` column.
    pub(crate) fn timestamp_snapshot(rows: &[(i64, &str)]) -> Bytes {
        let schema = Arc::new(Schema::new(vec![
            Field::new("date", DataType::Timestamp(TimeUnit::Millisecond, None), true),
            Field::new("text", DataType::Utf8, true),
        ]));
        let stamps = TimestampMillisecondArray::from(rows.iter().map(|(millis, _)| *millis).collect::<Vec<_>>());
        let texts = StringArray::from(rows.iter().map(|(_, text)| *text).collect::<Vec<_>>());
        write_parquet(&RecordBatch::try_new(schema, vec![Arc::new(stamps), Arc::new(texts)]).unwrap())
    }

    pub(crate) fn telegram_snapshot() -> Bytes {
        parquet_snapshot(
            &["date", "from", "text", "chat_name"],
            &[
                &["2024-03-01T09:00:00", "alice", "Hello world", "general"],
                &["2024-03-02T10:30:00", "bob", "Meeting at noon", "general"],
                &["2024-03-03T18:45:00", "alice", "HELLO again", "random"],
                &["2024-03-04T23:10:00", "carol", "good night", "random"],
            ],
        )
    }
}
