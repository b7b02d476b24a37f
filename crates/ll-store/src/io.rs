//! Parquet file read/write.
//!
//! Reads return the Arrow schema alongside the batches so that empty tables
//! keep their column layout. Writes to a path are atomic: the file is
//! written next to the destination under a temporary name, synced, then
//! renamed over it.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::datatypes::SchemaRef;
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::{ArrowWriter, ProjectionMask};
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::{Result, StoreError};

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => StoreError::resource(path, "no such file"),
        _ => StoreError::Io(e),
    })
}

fn builder(path: &Path) -> Result<ParquetRecordBatchReaderBuilder<File>> {
    let file = open(path)?;
    ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| StoreError::resource(path, format!("not a readable Parquet table ({e})")))
}

fn collect<T>(builder: ParquetRecordBatchReaderBuilder<T>) -> Result<(SchemaRef, Vec<RecordBatch>)>
where
    T: parquet::file::reader::ChunkReader + 'static,
{
    let reader = builder.build()?;
    let schema = reader.schema();
    let batches: std::result::Result<Vec<_>, _> = reader.collect();
    Ok((schema, batches?))
}

/// Arrow schema of a Parquet file, without reading any rows.
pub fn read_parquet_schema(path: &Path) -> Result<SchemaRef> {
    Ok(builder(path)?.schema().clone())
}

/// Read a Parquet file into Arrow record batches.
pub fn read_parquet(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    tracing::debug!(path = %path.display(), "reading parquet");
    collect(builder(path)?)
}

/// Read only the named top-level columns of a Parquet file.
///
/// Columns come back in file schema order. Names the file lacks are ignored;
/// callers validate against [`read_parquet_schema`] first.
pub fn read_parquet_columns(
    path: &Path,
    names: &[&str],
) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let builder = builder(path)?;
    let roots: Vec<usize> =
        names.iter().filter_map(|n| builder.schema().index_of(n).ok()).collect();
    let mask = ProjectionMask::roots(builder.parquet_schema(), roots);
    tracing::debug!(path = %path.display(), columns = names.len(), "reading parquet columns");
    collect(builder.with_projection(mask))
}

fn writer_props() -> WriterProperties {
    WriterProperties::builder().set_compression(Compression::SNAPPY).build()
}

/// Temporary sibling of `path` used for atomic replacement.
fn temp_path(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let tmp = format!(".{name}.tmp-{}", std::process::id());
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(tmp),
        _ => PathBuf::from(tmp),
    }
}

fn write_to(file: File, schema: SchemaRef, batches: &[RecordBatch]) -> Result<File> {
    let mut writer = ArrowWriter::try_new(file, schema, Some(writer_props()))?;
    for batch in batches {
        writer.write(batch)?;
    }
    Ok(writer.into_inner()?)
}

/// Write record batches to `path`, replacing it atomically.
///
/// An empty batch list still produces a valid file carrying `schema`.
pub fn write_parquet_atomic(path: &Path, schema: SchemaRef, batches: &[RecordBatch]) -> Result<()> {
    let tmp = temp_path(path);
    let result = File::create(&tmp)
        .map_err(StoreError::from)
        .and_then(|file| write_to(file, schema, batches))
        .and_then(|file| Ok(file.sync_all()?))
        .and_then(|()| Ok(std::fs::rename(&tmp, path)?));

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    tracing::info!(path = %path.display(), batches = batches.len(), "wrote parquet");
    Ok(())
}
