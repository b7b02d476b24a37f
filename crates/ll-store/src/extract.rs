//! Column-subset extraction and column-type inspection.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::io::{read_parquet_columns, read_parquet_schema, write_parquet_atomic};

/// What an extraction run wrote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractSummary {
    /// Columns written, in output order.
    pub kept: Vec<String>,
    /// Requested names the first shard does not have.
    pub skipped: Vec<String>,
    /// Shards read.
    pub shards: usize,
    /// Rows written.
    pub rows: usize,
}

/// Copy the allow-listed columns of every shard into one table.
///
/// The kept set is the requested names present in the first shard, in that
/// shard's schema order. Requested names it lacks are skipped. Rows are
/// written in shard then row order with values unchanged. A later shard that
/// lacks a kept column, or stores it with another type, is an error; the
/// output is only written once every shard has been read.
pub fn extract_columns(
    inputs: &[PathBuf],
    keep: &[String],
    output: &Path,
) -> Result<ExtractSummary> {
    let Some(first) = inputs.first() else {
        return Err(ll_core::Error::Validation("at least one input shard is required".into()).into());
    };

    let first_schema = read_parquet_schema(first)?;
    let fields: Vec<_> = first_schema
        .fields()
        .iter()
        .filter(|f| keep.iter().any(|k| k == f.name()))
        .cloned()
        .collect();
    let kept: Vec<String> = fields.iter().map(|f| f.name().clone()).collect();
    let skipped: Vec<String> =
        keep.iter().filter(|k| first_schema.index_of(k).is_err()).cloned().collect();
    for name in &skipped {
        tracing::debug!(column = %name, path = %first.display(), "requested column not found, skipped");
    }
    if kept.is_empty() {
        return Err(StoreError::resource(
            first,
            "none of the requested columns exist; a Parquet table needs at least one column to carry its rows",
        ));
    }

    let schema: SchemaRef = Arc::new(Schema::new_with_metadata(fields, first_schema.metadata().clone()));
    let names: Vec<&str> = kept.iter().map(String::as_str).collect();

    let mut out = Vec::new();
    for path in inputs {
        for batch in read_shard(path, &schema, &names)? {
            out.push(batch);
        }
    }
    let rows = out.iter().map(RecordBatch::num_rows).sum();

    write_parquet_atomic(output, schema, &out)?;
    tracing::info!(shards = inputs.len(), columns = kept.len(), rows, output = %output.display(), "extracted columns");
    Ok(ExtractSummary { kept, skipped, shards: inputs.len(), rows })
}

fn read_shard(path: &Path, schema: &SchemaRef, names: &[&str]) -> Result<Vec<RecordBatch>> {
    let shard_schema = read_parquet_schema(path)?;
    for field in schema.fields() {
        match shard_schema.field_with_name(field.name()) {
            Err(_) => {
                return Err(StoreError::resource(
                    path,
                    format!("column '{}' is missing from this shard", field.name()),
                ));
            }
            Ok(f) if f.data_type() != field.data_type() => {
                return Err(StoreError::resource(
                    path,
                    format!(
                        "column '{}' has type {:?} here but {:?} in the first shard",
                        field.name(),
                        f.data_type(),
                        field.data_type()
                    ),
                ));
            }
            Ok(_) => {}
        }
    }

    let (read_schema, batches) = read_parquet_columns(path, names)?;
    let order: Vec<usize> = names
        .iter()
        .map(|n| read_schema.index_of(n))
        .collect::<std::result::Result<_, _>>()?;
    batches
        .iter()
        .map(|b| Ok(RecordBatch::try_new(schema.clone(), b.project(&order)?.columns().to_vec())?))
        .collect()
}

/// Stored type of one requested column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    /// Requested name.
    pub name: String,
    /// Arrow type, `None` when the table has no such column.
    pub data_type: Option<String>,
}

impl fmt::Display for ColumnInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data_type {
            Some(t) => write!(f, "Column: {}, Type: {t}", self.name),
            None => write!(f, "Column: {} not found!", self.name),
        }
    }
}

/// Look up the stored type of each requested column, reading only the schema.
pub fn inspect_columns(path: &Path, names: &[String]) -> Result<Vec<ColumnInfo>> {
    let schema = read_parquet_schema(path)?;
    Ok(names
        .iter()
        .map(|n| ColumnInfo {
            name: n.clone(),
            data_type: schema.field_with_name(n).ok().map(|f| f.data_type().to_string()),
        })
        .collect())
}
