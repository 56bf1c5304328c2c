//! Free-text and structured search over a snapshot table whose column names
//! are not known in advance.
//!
//! Columns are introspected once per loaded table and matched against the
//! alias families. User input is only ever passed as bound parameters.

use std::sync::Arc;

use datafusion::scalar::ScalarValue;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::constants::{aliases, UNKNOWN_SENDER};
use crate::engine::{quote_ident, Column, ColumnKind, QueryEngine, TableReader};
use crate::error::{Error, Result, Stage};
use crate::models::record::value_to_label;
use crate::models::timestamp::{parse_timestamp_str, EPOCH_SECONDS_CUTOFF};
use crate::models::{AliasFamily, Record, SearchFilters};

/// Suffix appended to a bare `YYYY-MM-DD` end date so the whole day is included
const END_OF_DAY: &str = "T23:59:59.999999999";

/// A built statement: SQL with `$n` placeholders and the values bound to them.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub sql: String,
    pub params: Vec<ScalarValue>,
    /// Columns the free-text predicate runs over; empty without a term
    pub text_columns: Vec<String>,
}

impl SearchQuery {
    /// Build the search statement.
    ///
    /// `columns` is the introspected schema, or `None` when introspection
    /// failed; then the alias lists are used as-is and treated as text.
    pub fn build(
        table: &str,
        columns: Option<&[Column]>,
        term: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Self> {
        let mut sql = format!("SELECT * FROM {} WHERE 1=1", quote_ident(table));
        let mut params = Vec::new();
        let mut text_columns = Vec::new();

        let term = term.trim();
        if !term.is_empty() {
            text_columns = text_search_columns(columns);
            params.push(utf8(format!("%{}%", term.to_lowercase())));
            let placeholder = format!("${}", params.len());
            let conditions: Vec<String> = text_columns
                .iter()
                .map(|column| format!("LOWER(COALESCE(CAST({} AS VARCHAR), '')) LIKE {placeholder}", quote_ident(column)))
                .collect();
            sql.push_str(&format!(" AND ({})", conditions.join(" OR ")));
        }

        if let Some(start) = filters.start_date() {
            let predicate = date_predicate(columns, start, ">=", &mut params)?;
            sql.push_str(&format!(" AND {predicate}"));
        }

        if let Some(end) = filters.end_date() {
            let predicate = date_predicate(columns, &extend_end_date(end), "<=", &mut params)?;
            sql.push_str(&format!(" AND {predicate}"));
        }

        if let Some(sender) = filters.sender() {
            let expr = coalesced(columns, AliasFamily::Sender, "sender")?;
            params.push(utf8(sender.to_string()));
            sql.push_str(&format!(" AND {expr} = ${}", params.len()));
        }

        if let Some(chat) = filters.chat() {
            let expr = coalesced(columns, AliasFamily::Chat, "chat")?;
            params.push(utf8(chat.to_string()));
            sql.push_str(&format!(" AND {expr} = ${}", params.len()));
        }

        sql.push_str(&format!(" LIMIT {limit}"));

        Ok(Self {
            sql,
            params,
            text_columns,
        })
    }
}

fn utf8(value: String) -> ScalarValue {
    ScalarValue::Utf8(Some(value))
}

/// Inclusive upper bound for an end date; a bare day covers the whole day.
pub fn extend_end_date(end: &str) -> String {
    let is_bare_date = end.len() == 10
        && end.char_indices().all(|(i, c)| match i {
            4 | 7 => c == '-',
            _ => c.is_ascii_digit(),
        });
    if is_bare_date {
        format!("{end}{END_OF_DAY}")
    } else {
        end.to_string()
    }
}

fn column_names(columns: &[Column]) -> Vec<String> {
    columns.iter().map(|column| column.name.clone()).collect()
}

fn text_search_columns(columns: Option<&[Column]>) -> Vec<String> {
    match columns {
        None => aliases::TEXT.iter().map(|s| s.to_string()).collect(),
        Some(columns) => {
            let names = column_names(columns);
            let matched: Vec<String> = AliasFamily::Text.all_in(&names).into_iter().map(str::to_string).collect();
            if matched.is_empty() {
                // Unrecognized schema: every column is a candidate
                names
            } else {
                matched
            }
        }
    }
}

/// Family members present in the schema, in preference order.
fn present_columns(columns: Option<&[Column]>, family: AliasFamily, concept: &str) -> Result<Vec<Column>> {
    let present: Vec<Column> = match columns {
        Some(columns) => {
            let names = column_names(columns);
            family
                .all_in(&names)
                .into_iter()
                .filter_map(|name| columns.iter().find(|column| column.name == name).cloned())
                .collect()
        }
        None => family.names().iter().map(|name| Column::new(*name, ColumnKind::Text)).collect(),
    };
    if present.is_empty() {
        return Err(Error::Schema(format!(
            "no {concept} column (expected one of: {})",
            family.names().join(", ")
        )));
    }
    Ok(present)
}

fn cast_text(column: &Column) -> String {
    format!("CAST({} AS VARCHAR)", quote_ident(&column.name))
}

/// `COALESCE(CAST(a AS VARCHAR), CAST(b AS VARCHAR), ..)` over the family
/// members present in the schema.
fn coalesced(columns: Option<&[Column]>, family: AliasFamily, concept: &str) -> Result<String> {
    let present = present_columns(columns, family, concept)?;
    Ok(coalesce_text(&present))
}

fn coalesce_text(present: &[Column]) -> String {
    let parts: Vec<String> = present.iter().map(cast_text).collect();
    if parts.len() == 1 {
        parts.concat()
    } else {
        format!("COALESCE({})", parts.join(", "))
    }
}

/// Epoch numbers as milliseconds, with the same seconds cutoff the timestamp
/// parser applies.
fn epoch_millis(column: &str, sql_type: &str) -> String {
    let value = format!("CAST({column} AS {sql_type})");
    format!(
        "CASE WHEN ABS({value}) < {cutoff} THEN {value} * 1000 ELSE {value} END",
        cutoff = EPOCH_SECONDS_CUTOFF as i64
    )
}

/// Compare the timestamp family against `bound` using each column's own type.
///
/// String columns compare as text. Epoch numbers compare in milliseconds and
/// date or timestamp columns compare as timestamps. With several aliases the
/// first non-null one decides, the same way `COALESCE` would.
fn date_predicate(columns: Option<&[Column]>, bound: &str, op: &str, params: &mut Vec<ScalarValue>) -> Result<String> {
    let present = present_columns(columns, AliasFamily::Timestamp, "date")?;

    if present.iter().all(|column| matches!(column.kind, ColumnKind::Text | ColumnKind::Other)) {
        params.push(utf8(bound.to_string()));
        return Ok(format!("{} {op} ${}", coalesce_text(&present), params.len()));
    }

    let at = parse_timestamp_str(bound).ok_or_else(|| Error::Validation(format!("unrecognized date bound {bound:?}")))?;
    let mut branches = Vec::with_capacity(present.len());
    let mut earlier_null = Vec::new();
    for column in &present {
        let ident = quote_ident(&column.name);
        let comparison = match column.kind {
            ColumnKind::Integer => {
                params.push(ScalarValue::Int64(Some(at.timestamp_millis())));
                format!("{} {op} ${}", epoch_millis(&ident, "BIGINT"), params.len())
            }
            ColumnKind::Float => {
                params.push(ScalarValue::Float64(Some(at.timestamp_millis() as f64)));
                format!("{} {op} ${}", epoch_millis(&ident, "DOUBLE"), params.len())
            }
            ColumnKind::Temporal => {
                params.push(ScalarValue::TimestampNanosecond(at.timestamp_nanos_opt(), None));
                format!("CAST({ident} AS TIMESTAMP) {op} ${}", params.len())
            }
            ColumnKind::Text | ColumnKind::Other => {
                params.push(utf8(bound.to_string()));
                format!("{} {op} ${}", cast_text(column), params.len())
            }
        };

        let mut branch = earlier_null.clone();
        branch.push(comparison);
        branches.push(branch.join(" AND "));
        earlier_null.push(format!("{ident} IS NULL"));
    }

    Ok(if branches.len() == 1 {
        branches.concat()
    } else {
        let branches: Vec<String> = branches.iter().map(|branch| format!("({branch})")).collect();
        format!("({})", branches.join(" OR "))
    })
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOutcome {
    pub rows: Vec<Record>,
    pub columns: Vec<String>,
    pub searched_columns: Vec<String>,
    /// The row cap was reached; more rows may match
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderCount {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SenderSummary {
    /// Ordered by message count, most active first
    pub senders: Vec<SenderCount>,
    pub total: usize,
}

pub struct SearchService {
    engine: Arc<QueryEngine>,
    limit: usize,
    /// Introspected columns, tagged with the table generation they belong to
    columns: Mutex<Option<(u64, Vec<Column>)>>,
}

impl SearchService {
    pub fn new(engine: Arc<QueryEngine>) -> Self {
        let limit = engine.config().search_limit;
        Self {
            engine,
            limit,
            columns: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &Arc<QueryEngine> {
        &self.engine
    }

    /// Columns of the current table; `None` when introspection failed.
    pub async fn columns(&self) -> Option<Vec<Column>> {
        let table = self.engine.read().await;
        self.columns_for(&table).await
    }

    async fn columns_for(&self, table: &TableReader<'_>) -> Option<Vec<Column>> {
        let generation = table.generation();
        let mut cached = self.columns.lock().await;
        if let Some((cached_generation, columns)) = cached.as_ref() {
            if *cached_generation == generation {
                return Some(columns.clone());
            }
        }

        match table.describe_columns().await {
            Ok(columns) => {
                debug!(generation, columns = ?columns, "search columns introspected");
                *cached = Some((generation, columns.clone()));
                Some(columns)
            }
            Err(e) => {
                warn!(error = %e, "column introspection failed, using default aliases");
                None
            }
        }
    }

    /// Read the table, failing when nothing is loaded yet.
    async fn loaded_table(&self) -> Result<TableReader<'_>> {
        let table = self.engine.read().await;
        if table.is_loaded() {
            Ok(table)
        } else {
            Err(Error::query(Stage::Query, "no snapshot table is loaded"))
        }
    }

    pub async fn search(&self, term: &str, filters: &SearchFilters) -> Result<SearchOutcome> {
        // Schema and query must see the same table
        let table = self.loaded_table().await?;
        let columns = self.columns_for(&table).await;
        let query = SearchQuery::build(table.table_name(), columns.as_deref(), term, filters, self.limit)?;

        let started = std::time::Instant::now();
        let result = table.query(&query.sql, query.params).await?;
        info!(
            matches = result.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search finished"
        );

        Ok(SearchOutcome {
            truncated: result.len() >= self.limit,
            rows: result.rows,
            columns: result.columns,
            searched_columns: query.text_columns,
        })
    }

    pub async fn senders(&self) -> Result<SenderSummary> {
        let table = self.loaded_table().await?;
        let columns = self.columns_for(&table).await;
        let sender = coalesced(columns.as_deref(), AliasFamily::Sender, "sender")?;
        let sql = format!(
            "SELECT COALESCE({sender}, '{UNKNOWN_SENDER}') AS \"name\", COUNT(*) AS \"count\" \
             FROM {} GROUP BY COALESCE({sender}, '{UNKNOWN_SENDER}') \
             ORDER BY \"count\" DESC, \"name\" ASC",
            quote_ident(table.table_name())
        );

        let result = table.query(&sql, Vec::new()).await?;
        let senders = result
            .rows
            .iter()
            .map(|row| SenderCount {
                name: row
                    .get("name")
                    .and_then(value_to_label)
                    .unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
                count: row.get("count").and_then(count_value).unwrap_or(0),
            })
            .collect();

        Ok(SenderSummary {
            senders,
            total: table.count().await?,
        })
    }
}

fn count_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::fixtures::{epoch_snapshot, parquet_snapshot, telegram_snapshot, timestamp_snapshot};
    use crate::engine::EngineService;
    use std::time::Duration;

    fn cols(names: &[&str]) -> Vec<Column> {
        names.iter().map(|name| Column::new(*name, ColumnKind::Text)).collect()
    }

    async fn loaded_service(snapshot: bytes::Bytes) -> SearchService {
        let config = EngineConfig {
            drop_settle_delay: Duration::from_millis(1),
            ..EngineConfig::default()
        };
        let engine = EngineService::new(config).initialize().await.unwrap();
        engine.load_table(snapshot).await.unwrap();
        SearchService::new(engine)
    }

    fn texts(outcome: &SearchOutcome) -> Vec<String> {
        let mut texts: Vec<String> = outcome.rows.iter().filter_map(|r| r.text()).collect();
        texts.sort();
        texts
    }

    // ===== Query builder =====

    #[test]
    fn test_term_is_bound_not_interpolated() {
        let columns = cols(&["date", "from", "Text"]);
        let query = SearchQuery::build(
            "messages",
            Some(&columns),
            "'; DROP TABLE messages; --",
            &SearchFilters::new(),
            10_000,
        )
        .unwrap();

        assert!(!query.sql.contains("DROP TABLE"));
        assert!(query.sql.contains("LOWER(COALESCE(CAST(\"Text\" AS VARCHAR), '')) LIKE $1"));
        assert!(query.sql.ends_with("LIMIT 10000"));
        assert_eq!(
            query.params,
            vec![ScalarValue::Utf8(Some("%'; drop table messages; --%".to_string()))]
        );
    }

    #[test]
    fn test_text_columns_follow_schema() {
        let columns = cols(&["message", "body", "id"]);
        let query = SearchQuery::build("messages", Some(&columns), "hi", &SearchFilters::new(), 10).unwrap();
        assert_eq!(query.text_columns, vec!["message", "body"]);

        let unknown = cols(&["id", "payload"]);
        let query = SearchQuery::build("messages", Some(&unknown), "hi", &SearchFilters::new(), 10).unwrap();
        assert_eq!(query.text_columns, vec!["id", "payload"]);

        let query = SearchQuery::build("messages", None, "hi", &SearchFilters::new(), 10).unwrap();
        assert_eq!(query.text_columns, vec!["message", "text", "content", "body", "msg", "data"]);
    }

    #[test]
    fn test_structured_filters_coalesce_present_aliases() {
        let columns = cols(&["timestamp", "date", "sender", "from", "chat_name", "text"]);
        let filters = SearchFilters::new()
            .with_date_range("2024-03-01", "2024-03-04")
            .with_sender("alice")
            .with_chat("general");
        let query = SearchQuery::build("messages", Some(&columns), "", &filters, 100).unwrap();

        assert!(query
            .sql
            .contains("COALESCE(CAST(\"date\" AS VARCHAR), CAST(\"timestamp\" AS VARCHAR)) >= $1"));
        assert!(query.sql.contains("<= $2"));
        assert!(query
            .sql
            .contains("COALESCE(CAST(\"from\" AS VARCHAR), CAST(\"sender\" AS VARCHAR)) = $3"));
        assert!(query.sql.contains("CAST(\"chat_name\" AS VARCHAR) = $4"));
        assert_eq!(query.params[1], ScalarValue::Utf8(Some("2024-03-04T23:59:59.999999999".into())));
        assert!(query.text_columns.is_empty());
    }

    #[test]
    fn test_epoch_column_compares_in_milliseconds() {
        let columns = vec![
            Column::new("timestamp", ColumnKind::Integer),
            Column::new("text", ColumnKind::Text),
        ];
        let filters = SearchFilters::new().with_date_range("2024-03-03", "2024-03-10");
        let query = SearchQuery::build("messages", Some(&columns), "", &filters, 100).unwrap();

        let millis = "CASE WHEN ABS(CAST(\"timestamp\" AS BIGINT)) < 10000000000 \
                      THEN CAST(\"timestamp\" AS BIGINT) * 1000 ELSE CAST(\"timestamp\" AS BIGINT) END";
        assert!(query.sql.contains(&format!("{millis} >= $1")), "{}", query.sql);
        assert!(query.sql.contains(&format!("{millis} <= $2")), "{}", query.sql);
        assert_eq!(
            query.params,
            vec![
                ScalarValue::Int64(Some(1_709_424_000_000)),
                ScalarValue::Int64(Some(1_710_115_199_999)),
            ]
        );
    }

    #[test]
    fn test_mixed_timestamp_columns_fall_through_on_null() {
        let columns = vec![
            Column::new("date", ColumnKind::Temporal),
            Column::new("timestamp", ColumnKind::Integer),
        ];
        let filters = SearchFilters::new().with_date_range("2024-03-03", "2024-03-10");
        let query = SearchQuery::build("messages", Some(&columns), "", &filters, 100).unwrap();

        assert!(query.sql.contains("((CAST(\"date\" AS TIMESTAMP) >= $1) OR (\"date\" IS NULL AND CASE"));
        assert_eq!(
            query.params[0],
            ScalarValue::TimestampNanosecond(Some(1_709_424_000_000_000_000), None)
        );
        assert_eq!(query.params[1], ScalarValue::Int64(Some(1_709_424_000_000)));
        assert_eq!(query.params.len(), 4);
    }

    #[test]
    fn test_unparseable_bound_on_typed_column() {
        let columns = vec![Column::new("timestamp", ColumnKind::Integer)];
        let filters = SearchFilters::new().with_date_range("last tuesday", "2024-03-10");
        let err = SearchQuery::build("messages", Some(&columns), "", &filters, 100).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_filter_without_column_is_schema_error() {
        let columns = cols(&["date", "text"]);
        let filters = SearchFilters::new().with_sender("alice");
        let err = SearchQuery::build("messages", Some(&columns), "", &filters, 100).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_extend_end_date() {
        assert_eq!(extend_end_date("2024-03-04"), "2024-03-04T23:59:59.999999999");
        assert_eq!(extend_end_date("2024-03-04T12:00:00"), "2024-03-04T12:00:00");
        assert_eq!(extend_end_date("04.03.2024"), "04.03.2024");
    }

    // ===== Service =====

    #[tokio::test]
    async fn test_search_is_case_insensitive_substring() {
        let service = loaded_service(telegram_snapshot()).await;
        let outcome = service.search("hello", &SearchFilters::new()).await.unwrap();
        assert_eq!(texts(&outcome), vec!["HELLO again", "Hello world"]);
        assert_eq!(outcome.searched_columns, vec!["text"]);
        assert!(!outcome.truncated);
    }

    #[tokio::test]
    async fn test_search_combines_term_and_filters() {
        let service = loaded_service(telegram_snapshot()).await;
        let filters = SearchFilters::new().with_sender("alice").with_chat("random");
        let outcome = service.search("hello", &filters).await.unwrap();
        assert_eq!(texts(&outcome), vec!["HELLO again"]);
    }

    #[tokio::test]
    async fn test_end_date_includes_whole_day() {
        let service = loaded_service(telegram_snapshot()).await;
        let filters = SearchFilters::new().with_date_range("2024-03-03", "2024-03-04");
        let outcome = service.search("", &filters).await.unwrap();
        assert_eq!(texts(&outcome), vec!["HELLO again", "good night"]);
    }

    #[tokio::test]
    async fn test_empty_search_returns_rows_up_to_limit() {
        let service = loaded_service(telegram_snapshot()).await;
        let outcome = service.search("   ", &SearchFilters::new()).await.unwrap();
        assert_eq!(outcome.rows.len(), 4);
    }

    #[tokio::test]
    async fn test_alias_variant_schema() {
        let snapshot = parquet_snapshot(
            &["timestamp", "sender_name", "content"],
            &[
                &["2024-01-01T00:00:00", "dave", "Rust is fun"],
                &["2024-01-02T00:00:00", "erin", "Go is fine"],
            ],
        );
        let service = loaded_service(snapshot).await;
        let filters = SearchFilters::new().with_sender("dave");
        let outcome = service.search("RUST", &filters).await.unwrap();
        assert_eq!(texts(&outcome), vec!["Rust is fun"]);
    }

    #[tokio::test]
    async fn test_schema_without_text_alias_searches_every_column() {
        let snapshot = parquet_snapshot(
            &["stamp", "payload"],
            &[&["2024-01-01", "find the NEEDLE"], &["2024-01-02", "haystack"]],
        );
        let service = loaded_service(snapshot).await;
        let outcome = service.search("needle", &SearchFilters::new()).await.unwrap();
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.searched_columns, vec!["stamp", "payload"]);
    }

    #[tokio::test]
    async fn test_search_before_load_fails() {
        let engine = EngineService::new(EngineConfig::default()).initialize().await.unwrap();
        let service = SearchService::new(engine);
        assert!(service.search("x", &SearchFilters::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_columns_refresh_after_reload() {
        let service = loaded_service(telegram_snapshot()).await;
        assert_eq!(service.columns().await.unwrap().len(), 4);

        let smaller = parquet_snapshot(&["date", "msg"], &[&["2024-01-01", "hi"]]);
        service.engine().load_table(smaller).await.unwrap();
        assert_eq!(service.columns().await.unwrap(), cols(&["date", "msg"]));
    }

    #[tokio::test]
    async fn test_date_range_on_epoch_seconds_and_millis() {
        let service = loaded_service(epoch_snapshot(&[
            (1_709_283_600, "early"),
            (1_709_629_200, "late"),
            (1_709_845_200_000, "millis"),
        ]))
        .await;

        let filters = SearchFilters::new().with_date_range("2024-03-03", "2024-03-10");
        let outcome = service.search("", &filters).await.unwrap();
        assert_eq!(texts(&outcome), vec!["late", "millis"]);

        let filters = SearchFilters::new().with_date_range("2024-02-01", "2024-03-04");
        let outcome = service.search("", &filters).await.unwrap();
        assert_eq!(texts(&outcome), vec!["early"]);
    }

    #[tokio::test]
    async fn test_date_range_on_native_timestamps() {
        let service = loaded_service(timestamp_snapshot(&[
            (1_709_283_600_000, "early"),
            (1_709_593_800_000, "late evening"),
            (1_709_629_200_000, "after"),
        ]))
        .await;

        let filters = SearchFilters::new().with_date_range("2024-03-03", "2024-03-04");
        let outcome = service.search("", &filters).await.unwrap();
        assert_eq!(texts(&outcome), vec!["late evening"]);
    }

    #[tokio::test]
    async fn test_search_waits_for_reload_and_sees_new_schema() {
        let service = Arc::new(loaded_service(telegram_snapshot()).await);
        let held = service.engine().read().await;

        let reload = tokio::spawn({
            let engine = Arc::clone(service.engine());
            async move {
                let snapshot = parquet_snapshot(
                    &["timestamp", "sender_name", "content"],
                    &[&["2024-01-01T00:00:00", "dave", "Rust is fun"]],
                );
                engine.load_table(snapshot).await
            }
        });
        tokio::time::sleep(Duration::from_millis(30)).await;

        let search = tokio::spawn({
            let service = Arc::clone(&service);
            async move {
                let filters = SearchFilters::new().with_sender("dave");
                service.search("rust", &filters).await
            }
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!search.is_finished());
        drop(held);

        reload.await.unwrap().unwrap();
        let outcome = search.await.unwrap().unwrap();
        assert_eq!(texts(&outcome), vec!["Rust is fun"]);
        assert_eq!(outcome.searched_columns, vec!["content"]);
    }

    #[tokio::test]
    async fn test_sender_summary() {
        let service = loaded_service(telegram_snapshot()).await;
        let summary = service.senders().await.unwrap();
        assert_eq!(summary.total, 4);
        assert_eq!(
            summary.senders,
            vec![
                SenderCount { name: "alice".into(), count: 2 },
                SenderCount { name: "bob".into(), count: 1 },
                SenderCount { name: "carol".into(), count: 1 },
            ]
        );
    }
}
