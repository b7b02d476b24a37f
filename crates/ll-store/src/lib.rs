//! # ll-store
//!
//! Parquet-backed event tables for llflow.
//!
//! - [`EventTable`] loads the configured columns of one or more shards into
//!   [`ll_core::Event`] records, rejecting tables that lack any of them.
//! - [`append_derived_columns`] writes the four MET projection columns next
//!   to the existing ones.
//! - [`extract_columns`] reduces shards to an allow-listed set of columns.
//! - [`inspect_columns`] reports the stored type of named columns.
//!
//! Every write goes to a temporary file in the destination directory and is
//! renamed into place.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod columns;
pub mod derived;
pub mod error;
pub mod extract;
pub mod io;
pub mod jagged;
pub mod table;

pub use columns::ColumnNames;
pub use derived::{DERIVED_COLUMNS, DerivedSummary, append_derived_columns, derive_batch};
pub use error::{Result, StoreError};
pub use extract::{ColumnInfo, ExtractSummary, extract_columns, inspect_columns};
pub use io::{read_parquet, read_parquet_columns, read_parquet_schema, write_parquet_atomic};
pub use jagged::{JaggedCol, read_jagged, read_scalar};
pub use table::{EventTable, events_from_batch};
