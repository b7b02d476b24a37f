//! Event tables assembled from Parquet columns.

use std::path::{Path, PathBuf};

use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use ll_core::{Event, Met, ObjectSlices};
use rayon::prelude::*;

use crate::columns::ColumnNames;
use crate::error::{Result, StoreError};
use crate::io::{read_parquet_columns, read_parquet_schema};
use crate::jagged::{read_jagged, read_scalar};

fn check_schema(schema: &Schema, names: &ColumnNames) -> Result<()> {
    let available: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    let missing = names.missing(&available);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Core(ll_core::Error::MissingColumns(missing)))
    }
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a arrow::array::ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| StoreError::Core(ll_core::Error::MissingColumns(vec![name.to_string()])))
}

/// Decode every row of a batch into events.
///
/// `first_row` is the global index of the batch's first row, used in
/// truncation warnings. A negative or non-finite declared count is treated as
/// zero objects.
pub fn events_from_batch(
    batch: &RecordBatch,
    names: &ColumnNames,
    capacity: usize,
    first_row: usize,
) -> Result<Vec<Event>> {
    check_schema(&batch.schema(), names)?;

    let count = read_scalar(column(batch, &names.count)?, &names.count)?;
    let pt = read_jagged(column(batch, &names.pt)?, &names.pt)?;
    let eta = read_jagged(column(batch, &names.eta)?, &names.eta)?;
    let phi = read_jagged(column(batch, &names.phi)?, &names.phi)?;
    let code = read_jagged(column(batch, &names.type_code)?, &names.type_code)?;
    let flag = read_jagged(column(batch, &names.id_flag)?, &names.id_flag)?;
    let met_pt = read_scalar(column(batch, &names.met_pt)?, &names.met_pt)?;
    let met_phi = read_scalar(column(batch, &names.met_phi)?, &names.met_phi)?;

    let events = (0..batch.num_rows())
        .map(|i| {
            let declared = if count[i].is_finite() && count[i] > 0.0 { count[i] as usize } else { 0 };
            let slices = ObjectSlices {
                pt: pt.row(i),
                eta: eta.row(i),
                phi: phi.row(i),
                type_code: code.row(i),
                id_pass: flag.row(i),
            };
            let met = Met { pt: met_pt[i], phi: met_phi[i] };
            Event::from_slices(first_row + i, declared, slices, met, capacity)
        })
        .collect();
    Ok(events)
}

/// Events of one or more shards, in shard then row order.
#[derive(Debug, Clone, Default)]
pub struct EventTable {
    events: Vec<Event>,
    sources: Vec<PathBuf>,
}

impl EventTable {
    /// Load the configured columns of every shard.
    ///
    /// Each shard is checked for all required columns before any row is
    /// decoded; the error names every missing column of the first shard that
    /// lacks some. Shards are read in parallel.
    pub fn load(paths: &[PathBuf], names: &ColumnNames, capacity: usize) -> Result<Self> {
        if paths.is_empty() {
            return Err(StoreError::Core(ll_core::Error::Validation(
                "at least one input table is required".into(),
            )));
        }
        for path in paths {
            let schema = read_parquet_schema(path)?;
            check_schema(&schema, names)?;
        }

        let shards = paths
            .par_iter()
            .map(|p| Self::load_shard(p, names, capacity))
            .collect::<Result<Vec<_>>>()?;

        let mut events = Vec::with_capacity(shards.iter().map(Vec::len).sum());
        for shard in shards {
            events.extend(shard);
        }
        let truncated = events.iter().filter(|e| e.is_truncated()).count();
        tracing::info!(shards = paths.len(), events = events.len(), truncated, "loaded event table");
        Ok(Self { events, sources: paths.to_vec() })
    }

    fn load_shard(path: &Path, names: &ColumnNames, capacity: usize) -> Result<Vec<Event>> {
        let (_, batches) = read_parquet_columns(path, &names.required())?;
        let mut events = Vec::new();
        for batch in &batches {
            let first_row = events.len();
            events.extend(events_from_batch(batch, names, capacity, first_row)?);
        }
        tracing::debug!(path = %path.display(), events = events.len(), "decoded shard");
        Ok(events)
    }

    /// Events in input order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Consume the table.
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the table holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Shards the table was read from.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float32Array, Int32Array, ListArray};
    use arrow::datatypes::{Float32Type, Int32Type};
    use std::sync::Arc;

    fn list_f32(rows: Vec<Vec<f32>>) -> ArrayRef {
        Arc::new(ListArray::from_iter_primitive::<Float32Type, _, _>(
            rows.into_iter().map(|r| Some(r.into_iter().map(Some).collect::<Vec<_>>())),
        ))
    }

    fn list_i32(rows: Vec<Vec<i32>>) -> ArrayRef {
        Arc::new(ListArray::from_iter_primitive::<Int32Type, _, _>(
            rows.into_iter().map(|r| Some(r.into_iter().map(Some).collect::<Vec<_>>())),
        ))
    }

    fn batch(count: Vec<i32>, pt: Vec<Vec<f32>>, drop: Option<&str>) -> RecordBatch {
        let n = count.len();
        let codes: Vec<Vec<i32>> = pt.iter().map(|r| r.iter().map(|_| 11).collect()).collect();
        let flags: Vec<Vec<i32>> = pt.iter().map(|r| r.iter().map(|_| 1).collect()).collect();
        let cols: Vec<(&str, ArrayRef)> = vec![
            ("nElectron", Arc::new(Int32Array::from(count))),
            ("Electron_pt", list_f32(pt.clone())),
            ("Electron_eta", list_f32(pt.clone())),
            ("Electron_phi", list_f32(pt)),
            ("Electron_pdgId", list_i32(codes)),
            ("Electron_mvaFall17V2Iso_WP90", list_i32(flags)),
            ("PuppiMET_pt", Arc::new(Float32Array::from(vec![10.0; n]))),
            ("PuppiMET_phi", Arc::new(Float32Array::from(vec![0.5; n]))),
        ];
        RecordBatch::try_from_iter(cols.into_iter().filter(|(name, _)| Some(*name) != drop))
            .unwrap()
    }

    #[test]
    fn decodes_rows() {
        let b = batch(vec![2, 0], vec![vec![30.0, 20.0], vec![]], None);
        let events = events_from_batch(&b, &ColumnNames::default(), 10, 0).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].n_objects(), 2);
        assert_eq!(events[0].objects()[1].pt, 20.0);
        assert!(events[0].objects()[0].id_pass);
        assert_eq!(events[0].met().pt, 10.0);
        assert_eq!(events[1].n_objects(), 0);
    }

    #[test]
    fn over_capacity_is_truncated() {
        let b = batch(vec![4], vec![vec![1.0, 2.0, 3.0, 4.0]], None);
        let events = events_from_batch(&b, &ColumnNames::default(), 3, 0).unwrap();
        assert_eq!(events[0].n_objects(), 3);
        assert!(events[0].is_truncated());
    }

    #[test]
    fn missing_column_is_named() {
        let b = batch(vec![1], vec![vec![1.0]], Some("PuppiMET_phi"));
        let err = events_from_batch(&b, &ColumnNames::default(), 10, 0).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Core(ll_core::Error::MissingColumns(ref c)) if c == &["PuppiMET_phi".to_string()]
        ));
    }

    #[test]
    fn load_requires_input() {
        assert!(EventTable::load(&[], &ColumnNames::default(), 10).is_err());
    }
}
