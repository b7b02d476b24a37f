//! Appending the MET projection columns to a stored table.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float32Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use ll_engine::{MetProjection, ProjectionReference};
use serde::Serialize;

use crate::columns::ColumnNames;
use crate::error::Result;
use crate::io::{read_parquet, write_parquet_atomic};
use crate::table::events_from_batch;

/// Names of the appended columns, in output order.
pub const DERIVED_COLUMNS: [&str; 4] =
    ["delta_phi_1", "delta_phi_2", "delta_phi_min", "projected_MET"];

/// What an append run wrote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedSummary {
    /// Rows processed.
    pub rows: usize,
    /// Derived columns that already existed and were replaced.
    pub replaced: Vec<String>,
    /// Rows whose declared object count exceeded what could be read.
    pub truncated: usize,
}

fn output_schema(input: &Schema) -> SchemaRef {
    let mut fields: Vec<Arc<Field>> = input
        .fields()
        .iter()
        .filter(|f| !DERIVED_COLUMNS.contains(&f.name().as_str()))
        .cloned()
        .collect();
    fields.extend(DERIVED_COLUMNS.iter().map(|n| Arc::new(Field::new(*n, DataType::Float32, false))));
    Arc::new(Schema::new_with_metadata(fields, input.metadata().clone()))
}

/// Compute the derived columns for one batch and return the widened batch.
///
/// Existing columns keep their position and values; stale derived columns
/// are dropped and the fresh ones appended at the end.
pub fn derive_batch(
    batch: &RecordBatch,
    schema: &SchemaRef,
    names: &ColumnNames,
    capacity: usize,
    reference: ProjectionReference,
    first_row: usize,
) -> Result<(RecordBatch, usize)> {
    let events = events_from_batch(batch, names, capacity, first_row)?;
    let truncated = events.iter().filter(|e| e.is_truncated()).count();
    let projections: Vec<MetProjection> =
        events.iter().map(|e| MetProjection::for_event(e, reference)).collect();

    let column = |f: fn(&MetProjection) -> f64| -> ArrayRef {
        Arc::new(Float32Array::from_iter_values(projections.iter().map(|p| f(p) as f32)))
    };

    let mut columns: Vec<ArrayRef> = batch
        .schema()
        .fields()
        .iter()
        .zip(batch.columns())
        .filter(|(f, _)| !DERIVED_COLUMNS.contains(&f.name().as_str()))
        .map(|(_, c)| c.clone())
        .collect();
    columns.push(column(|p| p.delta_phi_1));
    columns.push(column(|p| p.delta_phi_2));
    columns.push(column(|p| p.delta_phi_min));
    columns.push(column(|p| p.projected_met));

    Ok((RecordBatch::try_new(schema.clone(), columns)?, truncated))
}

/// Append `delta_phi_1`, `delta_phi_2`, `delta_phi_min` and `projected_MET`.
///
/// Writes to `output`, or back over `input` when `output` is `None`. Every
/// row gets a value (events without objects get zeros). The destination is
/// replaced atomically; on error it is left untouched.
pub fn append_derived_columns(
    input: &Path,
    output: Option<&Path>,
    names: &ColumnNames,
    capacity: usize,
    reference: ProjectionReference,
) -> Result<DerivedSummary> {
    let (in_schema, batches) = read_parquet(input)?;
    let available: Vec<&str> = in_schema.fields().iter().map(|f| f.name().as_str()).collect();
    let missing = names.missing(&available);
    if !missing.is_empty() {
        return Err(ll_core::Error::MissingColumns(missing).into());
    }

    let replaced: Vec<String> = DERIVED_COLUMNS
        .iter()
        .filter(|n| available.contains(*n))
        .map(|n| n.to_string())
        .collect();
    if !replaced.is_empty() {
        tracing::info!(columns = ?replaced, "replacing existing derived columns");
    }

    let schema = output_schema(&in_schema);
    let mut out = Vec::with_capacity(batches.len());
    let mut rows = 0;
    let mut truncated = 0;
    for batch in &batches {
        let (b, t) = derive_batch(batch, &schema, names, capacity, reference, rows)?;
        rows += b.num_rows();
        truncated += t;
        out.push(b);
    }

    let dest = output.unwrap_or(input);
    write_parquet_atomic(dest, schema, &out)?;
    tracing::info!(input = %input.display(), output = %dest.display(), rows, "derived columns written");
    Ok(DerivedSummary { rows, replaced, truncated })
}
