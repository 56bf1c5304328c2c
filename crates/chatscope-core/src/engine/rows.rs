//! Conversion of query batches into [`Record`]s.

use arrow::array::Array;
use arrow::json::ArrayWriter;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result, Stage};
use crate::models::Record;

/// Column names plus one [`Record`] per result row.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn from_batches(columns: Vec<String>, batches: &[RecordBatch]) -> Result<Self> {
        let mut last_error = None;
        for strategy in RowStrategy::ALL {
            match strategy.convert(batches) {
                Ok(rows) => return Ok(Self { columns, rows }),
                Err(e) => {
                    tracing::debug!(strategy = strategy.name(), error = %e, "row conversion failed");
                    last_error = Some(e);
                }
            }
        }
        Err(Error::query(
            Stage::ConvertRows,
            last_error.unwrap_or_else(|| "no row strategy available".to_string()),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStrategy {
    /// Arrow's JSON writer; keeps numbers and booleans typed, omits nulls
    JsonProjection,
    /// Every non-null cell rendered with Arrow's display formatter
    DisplayStrings,
}

impl RowStrategy {
    pub const ALL: [RowStrategy; 2] = [Self::JsonProjection, Self::DisplayStrings];

    pub fn name(&self) -> &'static str {
        match self {
            Self::JsonProjection => "json-projection",
            Self::DisplayStrings => "display-strings",
        }
    }

    fn convert(&self, batches: &[RecordBatch]) -> std::result::Result<Vec<Record>, String> {
        match self {
            Self::JsonProjection => {
                let mut writer = ArrayWriter::new(Vec::new());
                let refs: Vec<&RecordBatch> = batches.iter().collect();
                writer.write_batches(&refs).map_err(|e| e.to_string())?;
                writer.finish().map_err(|e| e.to_string())?;
                let buffer = writer.into_inner();
                if buffer.is_empty() {
                    return Ok(Vec::new());
                }
                let rows: Vec<Map<String, Value>> = serde_json::from_slice(&buffer).map_err(|e| e.to_string())?;
                Ok(rows.into_iter().map(Record::new).collect())
            }
            Self::DisplayStrings => {
                let mut rows = Vec::new();
                for batch in batches {
                    let schema = batch.schema();
                    for row in 0..batch.num_rows() {
                        let mut fields = Map::new();
                        for (field, column) in schema.fields().iter().zip(batch.columns()) {
                            let value = if column.is_null(row) {
                                Value::Null
                            } else {
                                Value::String(array_value_to_string(column, row).map_err(|e| e.to_string())?)
                            };
                            fields.insert(field.name().clone(), value);
                        }
                        rows.push(Record::new(fields));
                    }
                }
                Ok(rows)
            }
        }
    }
}
