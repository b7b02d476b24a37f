//! Decoding of scalar and per-event array columns to `f64`.
//!
//! Integer, float and boolean values are widened through Arrow's cast
//! kernel. Null values become NaN and null lists become empty rows.

use arrow::array::{Array, ArrayRef, AsArray, GenericListArray, OffsetSizeTrait};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};

use crate::error::{Result, StoreError};

/// Variable-length per-row values, flattened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JaggedCol {
    /// All values of all rows.
    pub flat: Vec<f64>,
    /// Row boundaries: `offsets.len() == n_entries + 1`.
    pub offsets: Vec<usize>,
}

impl JaggedCol {
    /// Values of `row`.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.flat[self.offsets[row]..self.offsets[row + 1]]
    }

    /// Number of rows.
    pub fn n_entries(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }
}

fn is_plain(dt: &DataType) -> bool {
    dt.is_numeric() || *dt == DataType::Boolean
}

fn wrong_type(column: &str, expected: &str, actual: &DataType) -> StoreError {
    StoreError::Core(ll_core::Error::WrongType {
        column: column.to_string(),
        expected: expected.to_string(),
        actual: format!("{actual:?}"),
    })
}

fn to_f64(values: &ArrayRef) -> Result<Vec<f64>> {
    let widened = cast(values, &DataType::Float64)?;
    Ok(widened.as_primitive::<Float64Type>().iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Decode a scalar numeric or boolean column.
pub fn read_scalar(array: &ArrayRef, column: &str) -> Result<Vec<f64>> {
    if !is_plain(array.data_type()) {
        return Err(wrong_type(column, "integer, float or boolean", array.data_type()));
    }
    to_f64(array)
}

fn list_ranges<O: OffsetSizeTrait>(list: &GenericListArray<O>) -> Vec<Option<(usize, usize)>> {
    let offs = list.value_offsets();
    (0..list.len())
        .map(|i| (!list.is_null(i)).then(|| (offs[i].as_usize(), offs[i + 1].as_usize())))
        .collect()
}

fn gather(values: &ArrayRef, ranges: Vec<Option<(usize, usize)>>) -> Result<JaggedCol> {
    let all = to_f64(values)?;
    let mut flat = Vec::with_capacity(all.len());
    let mut offsets = Vec::with_capacity(ranges.len() + 1);
    offsets.push(0);
    for range in ranges {
        if let Some((start, end)) = range {
            flat.extend_from_slice(&all[start..end]);
        }
        offsets.push(flat.len());
    }
    Ok(JaggedCol { flat, offsets })
}

/// Decode a per-event array column (`List`, `LargeList` or `FixedSizeList`).
pub fn read_jagged(array: &ArrayRef, column: &str) -> Result<JaggedCol> {
    const EXPECTED: &str = "list of integer, float or boolean";
    match array.data_type() {
        DataType::List(f) if is_plain(f.data_type()) => {
            let list = array.as_list::<i32>();
            gather(list.values(), list_ranges(list))
        }
        DataType::LargeList(f) if is_plain(f.data_type()) => {
            let list = array.as_list::<i64>();
            gather(list.values(), list_ranges(list))
        }
        DataType::FixedSizeList(f, _) if is_plain(f.data_type()) => {
            let list = array.as_fixed_size_list();
            let n = list.value_length() as usize;
            let ranges = (0..list.len())
                .map(|i| {
                    let start = list.value_offset(i) as usize;
                    (!list.is_null(i)).then_some((start, start + n))
                })
                .collect();
            gather(list.values(), ranges)
        }
        other => Err(wrong_type(column, EXPECTED, other)),
    }
}
