//! Weighted 1D histogram with explicit under/overflow and sum of weights squared.

use serde::{Deserialize, Serialize};

use ll_core::{Error, Result};

/// A fixed-binning weighted histogram.
///
/// Values below the first edge go to `underflow`, values at or above the last
/// edge go to `overflow`; neither is part of [`Hist1D::integral`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist1D {
    /// Histogram name.
    pub name: String,
    /// Bin edges (sorted, length = n_bins + 1).
    pub bin_edges: Vec<f64>,
    /// Bin contents (sum of weights per bin).
    pub bin_content: Vec<f64>,
    /// Sum of weights squared per bin.
    pub sumw2: Vec<f64>,
    /// Underflow sum of weights.
    pub underflow: f64,
    /// Overflow sum of weights.
    pub overflow: f64,
    /// Entries that landed in a bin.
    pub entries: u64,
    /// Fills skipped because the value was NaN.
    pub nan_entries: u64,
    /// Set once [`Hist1D::normalize`] has run.
    pub normalized: bool,
}

impl Hist1D {
    /// Histogram with explicit edges.
    pub fn with_edges(name: impl Into<String>, bin_edges: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if bin_edges.len() < 2 {
            return Err(Error::Validation(format!(
                "histogram '{name}' needs at least two bin edges (got {})",
                bin_edges.len()
            )));
        }
        if bin_edges.iter().any(|e| !e.is_finite()) || bin_edges.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(Error::Validation(format!(
                "histogram '{name}' bin edges must be finite and strictly increasing"
            )));
        }
        let n_bins = bin_edges.len() - 1;
        Ok(Self {
            name,
            bin_edges,
            bin_content: vec![0.0; n_bins],
            sumw2: vec![0.0; n_bins],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
            nan_entries: 0,
            normalized: false,
        })
    }

    /// Histogram with `n_bins` equal-width bins over `[lo, hi)`.
    pub fn uniform(name: impl Into<String>, n_bins: usize, lo: f64, hi: f64) -> Result<Self> {
        let name = name.into();
        if n_bins == 0 || !lo.is_finite() || !hi.is_finite() || lo >= hi {
            return Err(Error::Validation(format!(
                "histogram '{name}' needs n_bins > 0 and lo < hi (got {n_bins}, {lo}, {hi})"
            )));
        }
        let width = (hi - lo) / n_bins as f64;
        let mut edges: Vec<f64> = (0..n_bins).map(|i| lo + width * i as f64).collect();
        edges.push(hi);
        Self::with_edges(name, edges)
    }

    /// Number of bins (excluding under/overflow).
    pub fn n_bins(&self) -> usize {
        self.bin_content.len()
    }

    /// Add `weight` at `value`.
    pub fn fill(&mut self, value: f64, weight: f64) {
        if value.is_nan() {
            self.nan_entries += 1;
            return;
        }
        let w2 = weight * weight;
        match find_bin(&self.bin_edges, value) {
            Some(b) => {
                self.bin_content[b] += weight;
                self.sumw2[b] += w2;
                self.entries += 1;
            }
            None if value < self.bin_edges[0] => self.underflow += weight,
            None => self.overflow += weight,
        }
    }

    /// Sum of in-range bin contents.
    pub fn integral(&self) -> f64 {
        self.bin_content.iter().sum()
    }

    /// Scale bins to unit integral. A zero integral leaves the histogram as is.
    ///
    /// Returns the integral before scaling.
    pub fn normalize(&mut self) -> f64 {
        let total = self.integral();
        if total != 0.0 && total.is_finite() {
            let inv = 1.0 / total;
            let inv2 = inv * inv;
            self.bin_content.iter_mut().for_each(|c| *c *= inv);
            self.sumw2.iter_mut().for_each(|c| *c *= inv2);
            self.underflow *= inv;
            self.overflow *= inv;
        }
        self.normalized = true;
        total
    }

    /// Add another histogram with identical binning.
    pub fn merge(&mut self, other: &Hist1D) -> Result<()> {
        if self.bin_edges != other.bin_edges {
            return Err(Error::Validation(format!(
                "cannot merge '{}' into '{}': bin edges differ",
                other.name, self.name
            )));
        }
        for (a, b) in self.bin_content.iter_mut().zip(&other.bin_content) {
            *a += b;
        }
        for (a, b) in self.sumw2.iter_mut().zip(&other.sumw2) {
            *a += b;
        }
        self.underflow += other.underflow;
        self.overflow += other.overflow;
        self.entries += other.entries;
        self.nan_entries += other.nan_entries;
        Ok(())
    }
}

/// In-range bin of `val`: `edges[i] <= val < edges[i + 1]`.
fn find_bin(edges: &[f64], val: f64) -> Option<usize> {
    let (first, last) = (edges[0], edges[edges.len() - 1]);
    if !(first..last).contains(&val) {
        return None;
    }
    Some(edges.partition_point(|e| *e <= val) - 1)
}
