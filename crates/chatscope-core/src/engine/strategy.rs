//! Ordered fallback strategies for building and describing the snapshot table.
//!
//! The engine tries each strategy in declaration order and keeps the first one
//! that succeeds. A failed strategy leaves no table behind.

use std::sync::Arc;

use arrow::array::{Array, StringArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatchReader;
use arrow::util::display::array_value_to_string;
use bytes::Bytes;
use datafusion::datasource::MemTable;
use datafusion::error::{DataFusionError, Result as DfResult};
use datafusion::prelude::SessionContext;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::quote_ident;

/// How the snapshot file becomes the queryable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateStrategy {
    /// `CREATE TABLE .. AS SELECT * FROM '<url>'`
    DirectFile,
    /// Register the file as an external parquet table, then copy it
    ExternalReader,
    /// Decode the parquet bytes ourselves into a staging table, then rename it
    StagedRename,
}

impl CreateStrategy {
    pub const ALL: [CreateStrategy; 3] = [Self::DirectFile, Self::ExternalReader, Self::StagedRename];

    pub fn name(&self) -> &'static str {
        match self {
            Self::DirectFile => "direct-file",
            Self::ExternalReader => "external-reader",
            Self::StagedRename => "staged-rename",
        }
    }

    pub(crate) async fn create(&self, ctx: &SessionContext, table: &str, location: &str, bytes: &Bytes) -> DfResult<()> {
        let target = quote_ident(table);
        match self {
            Self::DirectFile => {
                let sql = format!("CREATE TABLE {target} AS SELECT * FROM '{location}'");
                ctx.sql(&sql).await?.collect().await?;
            }
            Self::ExternalReader => {
                let source_name = format!("{table}_source");
                let source = quote_ident(&source_name);
                let register = format!("CREATE EXTERNAL TABLE {source} STORED AS PARQUET LOCATION '{location}'");
                ctx.sql(&register).await?.collect().await?;

                let copy = format!("CREATE TABLE {target} AS SELECT * FROM {source}");
                let copied = match ctx.sql(&copy).await {
                    Ok(df) => df.collect().await.map(|_| ()),
                    Err(e) => Err(e),
                };
                ctx.deregister_table(source_name.as_str())?;
                copied?;
            }
            Self::StagedRename => {
                let staging = format!("{table}_staging_{}", chrono::Utc::now().timestamp_millis());
                ctx.register_table(staging.as_str(), parquet_to_mem_table(bytes.clone())?)?;

                let provider = ctx
                    .deregister_table(staging.as_str())?
                    .ok_or_else(|| DataFusionError::Plan(format!("staging table {staging} disappeared")))?;
                ctx.register_table(table, provider)?;
            }
        }
        Ok(())
    }
}

fn parquet_to_mem_table(bytes: Bytes) -> DfResult<Arc<MemTable>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)?.build()?;
    let schema = reader.schema();
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(Arc::new(MemTable::try_new(schema, vec![batches])?))
}

/// Type class of a column, as far as filter comparisons care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    /// Dates and timestamps
    Temporal,
    Text,
    Other,
}

impl ColumnKind {
    pub fn of(data_type: &DataType) -> Self {
        match data_type {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => Self::Integer,
            DataType::Float16 | DataType::Float32 | DataType::Float64 | DataType::Decimal128(..) | DataType::Decimal256(..) => {
                Self::Float
            }
            DataType::Timestamp(..) | DataType::Date32 | DataType::Date64 => Self::Temporal,
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Self::Text,
            DataType::Dictionary(_, value) => Self::of(value),
            _ => Self::Other,
        }
    }

    /// Classify a type name as rendered by `information_schema` or `DESCRIBE`,
    /// e.g. `Int64`, `Timestamp(Nanosecond, None)`, `Dictionary(Int32, Utf8)`.
    pub fn from_type_name(name: &str) -> Self {
        let name = name.trim();
        if let Some(inner) = name.strip_prefix("Dictionary(").and_then(|rest| rest.strip_suffix(')')) {
            return inner
                .split_once(',')
                .map(|(_, value)| Self::from_type_name(value))
                .unwrap_or(Self::Other);
        }
        // Interval must be ruled out before the Int prefix
        if name.starts_with("Interval") {
            Self::Other
        } else if name.starts_with("Int") || name.starts_with("UInt") {
            Self::Integer
        } else if name.starts_with("Float") || name.starts_with("Decimal") {
            Self::Float
        } else if name.starts_with("Timestamp") || name.starts_with("Date") {
            Self::Temporal
        } else if matches!(name, "Utf8" | "LargeUtf8" | "Utf8View") {
            Self::Text
        } else {
            Self::Other
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// How columns are read back from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStrategy {
    /// `information_schema.columns`, read through typed string columns
    TypedAccessor,
    /// `DESCRIBE`, reading each row positionally as display text
    Positional,
    /// The table provider's own schema
    StructuredProjection,
}

impl SchemaStrategy {
    pub const ALL: [SchemaStrategy; 3] = [Self::TypedAccessor, Self::Positional, Self::StructuredProjection];

    pub fn name(&self) -> &'static str {
        match self {
            Self::TypedAccessor => "typed-accessor",
            Self::Positional => "positional",
            Self::StructuredProjection => "structured-projection",
        }
    }

    /// Columns in table order. An empty list counts as a failure.
    pub(crate) async fn describe(&self, ctx: &SessionContext, table: &str) -> DfResult<Vec<Column>> {
        let columns = match self {
            Self::TypedAccessor => {
                let sql = format!(
                    "SELECT column_name, data_type FROM information_schema.columns \
                     WHERE table_name = '{}' ORDER BY ordinal_position",
                    table.replace('\'', "''")
                );
                let batches = ctx.sql(&sql).await?.collect().await?;
                let mut columns = Vec::new();
                for batch in &batches {
                    let names = string_column(batch.column(0), "column_name")?;
                    let types = string_column(batch.column(1), "data_type")?;
                    for (name, data_type) in names.iter().zip(types.iter()) {
                        if let Some(name) = name {
                            let kind = data_type.map(ColumnKind::from_type_name).unwrap_or(ColumnKind::Other);
                            columns.push(Column::new(name, kind));
                        }
                    }
                }
                columns
            }
            Self::Positional => {
                let batches = ctx.sql(&format!("DESCRIBE {}", quote_ident(table))).await?.collect().await?;
                let mut columns = Vec::new();
                for batch in &batches {
                    let (names, types) = (batch.column(0), batch.column(1));
                    for row in 0..batch.num_rows() {
                        if names.is_null(row) {
                            continue;
                        }
                        let kind = if types.is_null(row) {
                            ColumnKind::Other
                        } else {
                            ColumnKind::from_type_name(&array_value_to_string(types, row)?)
                        };
                        columns.push(Column::new(array_value_to_string(names, row)?, kind));
                    }
                }
                columns
            }
            Self::StructuredProjection => {
                let df = ctx.table(table).await?;
                df.schema()
                    .fields()
                    .iter()
                    .map(|field| Column::new(field.name().clone(), ColumnKind::of(field.data_type())))
                    .collect()
            }
        };

        if columns.is_empty() {
            return Err(DataFusionError::Execution(format!("no columns reported for {table}")));
        }
        Ok(columns)
    }
}

fn string_column<'a>(array: &'a dyn Array, name: &str) -> DfResult<&'a StringArray> {
    array
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| DataFusionError::Execution(format!("{name} is not a string column")))
}
