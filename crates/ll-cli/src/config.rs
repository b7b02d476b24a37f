//! Analysis configuration (YAML).
//!
//! A single file describes input columns, selection thresholds, the MET
//! projection reference and the samples to overlay. Every key is optional;
//! omitted keys take the defaults of the reference electron analysis.
//!
//! ```yaml
//! columns:
//!   met_pt: MET_pt
//!   met_phi: MET_phi
//! cuts:
//!   projected_met_max: 25
//! samples:
//!   - label: DYtoLL_M50
//!     paths: [dy_0.parquet, dy_1.parquet]
//!   - label: TTTo2L2Nu
//!     path: tt.parquet
//!     weight: 0.5
//! binning:
//!   mll: { n_bins: 60, lo: 60, hi: 120 }
//! ```

use anyhow::{Context, Result};
use ll_core::DEFAULT_OBJECT_CAPACITY;
use ll_engine::{CutFlowConfig, HistogramBinning, ProjectionReference, Variable};
use ll_store::ColumnNames;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub columns: ColumnNames,
    pub capacity: usize,
    /// Overrides `cuts.lepton_mass` when set.
    pub lepton_mass: Option<f64>,
    pub cuts: CutFlowConfig,
    pub projection: ProjectionReference,
    pub samples: Vec<SampleSpec>,
    pub binning: BTreeMap<Variable, HistogramBinning>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            capacity: DEFAULT_OBJECT_CAPACITY,
            lepton_mass: None,
            cuts: CutFlowConfig::default(),
            projection: ProjectionReference::default(),
            samples: Vec::new(),
            binning: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SampleSpec {
    pub label: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    #[serde(default = "unit_weight")]
    pub weight: f64,
}

fn unit_weight() -> f64 {
    1.0
}

impl SampleSpec {
    /// `path` followed by `paths`.
    pub fn inputs(&self) -> Vec<PathBuf> {
        self.path.iter().chain(&self.paths).cloned().collect()
    }
}

impl AnalysisConfig {
    /// Read and validate a config file. Relative sample paths are resolved
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut cfg: AnalysisConfig = serde_yaml_ng::from_slice(&bytes)
            .with_context(|| format!("invalid config {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for sample in &mut cfg.samples {
            let resolve = |p: &mut PathBuf| {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            };
            sample.path.iter_mut().for_each(resolve);
            sample.paths.iter_mut().for_each(resolve);
        }

        cfg.validate()?;
        tracing::info!(path = %path.display(), samples = cfg.samples.len(), "config loaded");
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            anyhow::bail!("capacity must be positive");
        }
        if let Some(m) = self.lepton_mass
            && !(m.is_finite() && m >= 0.0)
        {
            anyhow::bail!("lepton_mass must be finite and non-negative (got {m})");
        }
        self.cuts.validate()?;

        let mut labels = HashSet::new();
        for s in &self.samples {
            if s.label.is_empty() {
                anyhow::bail!("sample label must not be empty");
            }
            if !labels.insert(s.label.as_str()) {
                anyhow::bail!("duplicate sample label '{}'", s.label);
            }
            if s.inputs().is_empty() {
                anyhow::bail!("sample '{}' has no input path", s.label);
            }
            if !s.weight.is_finite() {
                anyhow::bail!("sample '{}' weight must be finite", s.label);
            }
        }
        Ok(())
    }

    /// Selection thresholds with the top-level lepton mass applied.
    pub fn effective_cuts(&self) -> CutFlowConfig {
        let mut cuts = self.cuts.clone();
        if let Some(m) = self.lepton_mass {
            cuts.lepton_mass = m;
        }
        cuts
    }
}
