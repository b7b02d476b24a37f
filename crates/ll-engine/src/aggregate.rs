//! Per-sample shape histograms for overlay comparison.
//!
//! Each sample is reduced with the opposite-sign pair requirement only (stage
//! 1 of the cut flow); the later stages are not applied, so the shapes show
//! the discriminating variables before the full selection. Histograms are
//! weighted with the sample weight and normalized to unit area once filling
//! is complete.

use std::collections::BTreeMap;

use ll_core::{Error, Event, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::histogram::Hist1D;
use crate::kinematics::PairKinematics;
use crate::projection::MetProjection;
use crate::selection::select_pair;

/// A histogrammed quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    /// Pair invariant mass.
    Mll,
    /// Pair transverse momentum.
    Ptll,
    /// Projected MET against the pair.
    ProjectedMet,
    /// Pair |dphi|.
    Dphill,
    /// Leading object pt.
    PtLead,
    /// Subleading object pt.
    PtSub,
    /// Leading object eta.
    EtaLead,
    /// Subleading object eta.
    EtaSub,
}

impl Variable {
    /// All variables, in output order.
    pub const ALL: [Variable; 8] = [
        Variable::Mll,
        Variable::Ptll,
        Variable::ProjectedMet,
        Variable::Dphill,
        Variable::PtLead,
        Variable::PtSub,
        Variable::EtaLead,
        Variable::EtaSub,
    ];

    /// Snake-case name, as used in config files and artifacts.
    pub fn name(self) -> &'static str {
        match self {
            Variable::Mll => "mll",
            Variable::Ptll => "ptll",
            Variable::ProjectedMet => "projected_met",
            Variable::Dphill => "dphill",
            Variable::PtLead => "pt_lead",
            Variable::PtSub => "pt_sub",
            Variable::EtaLead => "eta_lead",
            Variable::EtaSub => "eta_sub",
        }
    }

    /// Binning used by the overlay plots.
    pub fn default_binning(self) -> HistogramBinning {
        let b = |n_bins, lo, hi| HistogramBinning { n_bins, lo, hi };
        match self {
            Variable::Mll => b(30, 60.0, 120.0),
            Variable::Ptll | Variable::ProjectedMet | Variable::PtLead | Variable::PtSub => {
                b(25, 0.0, 100.0)
            }
            Variable::Dphill => b(30, 0.0, 3.14),
            Variable::EtaLead | Variable::EtaSub => b(30, -3.0, 3.0),
        }
    }

    /// Default binning for every variable.
    pub fn default_binnings() -> BTreeMap<Variable, HistogramBinning> {
        Self::ALL.iter().map(|&v| (v, v.default_binning())).collect()
    }
}

/// Uniform binning `n_bins` over `[lo, hi)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistogramBinning {
    /// Number of bins.
    pub n_bins: usize,
    /// Lower edge.
    pub lo: f64,
    /// Upper edge.
    pub hi: f64,
}

/// Histograms of one labeled sample.
#[derive(Debug, Clone)]
pub struct SampleHistograms {
    label: String,
    weight: f64,
    lepton_mass: f64,
    total_events: u64,
    selected_events: u64,
    hists: BTreeMap<Variable, Hist1D>,
    normalized: bool,
}

impl SampleHistograms {
    /// Empty histograms for a sample.
    ///
    /// Variables missing from `binning` use their default binning.
    pub fn new(
        label: impl Into<String>,
        weight: f64,
        lepton_mass: f64,
        binning: &BTreeMap<Variable, HistogramBinning>,
    ) -> Result<Self> {
        let label = label.into();
        if !weight.is_finite() {
            return Err(Error::Validation(format!(
                "sample '{label}' weight must be finite (got {weight})"
            )));
        }
        let hists = Variable::ALL
            .iter()
            .map(|&v| {
                let b = binning.get(&v).copied().unwrap_or_else(|| v.default_binning());
                Hist1D::uniform(format!("{}_{}", v.name(), label), b.n_bins, b.lo, b.hi)
                    .map(|h| (v, h))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(Self {
            label,
            weight,
            lepton_mass,
            total_events: 0,
            selected_events: 0,
            hists,
            normalized: false,
        })
    }

    /// Apply the pair selection and fill every variable.
    ///
    /// Returns whether the event was selected. Events arriving after
    /// normalization are rejected with a warning.
    pub fn fill_event(&mut self, event: &Event) -> bool {
        if self.normalized {
            tracing::warn!(sample = %self.label, "fill after normalization ignored");
            return false;
        }
        self.total_events += 1;
        let Some(pair) = select_pair(event).pair() else {
            return false;
        };
        self.selected_events += 1;

        let (p1, p2) = pair.p4s(event, self.lepton_mass);
        let kin = PairKinematics::compute(p1, p2);
        let proj = MetProjection::for_pair(event, pair);
        let w = self.weight;
        let values = [
            (Variable::Mll, kin.mll),
            (Variable::Ptll, kin.ptll),
            (Variable::ProjectedMet, proj.projected_met),
            (Variable::Dphill, kin.dphill),
            (Variable::PtLead, p1.pt),
            (Variable::PtSub, p2.pt),
            (Variable::EtaLead, p1.eta),
            (Variable::EtaSub, p2.eta),
        ];
        for (v, x) in values {
            if let Some(h) = self.hists.get_mut(&v) {
                h.fill(x, w);
            }
        }
        true
    }

    /// Scale every histogram to unit area. Runs once; later calls do nothing.
    pub fn normalize(&mut self) {
        if self.normalized {
            return;
        }
        for h in self.hists.values_mut() {
            let total = h.normalize();
            if total == 0.0 {
                tracing::debug!(sample = %self.label, histogram = %h.name, "empty histogram left unnormalized");
            }
        }
        self.normalized = true;
    }

    /// Add the counts of a partial pass over the same sample.
    ///
    /// Both sides must still be unnormalized and share the binning.
    pub fn merge(&mut self, other: &SampleHistograms) -> Result<()> {
        if self.normalized || other.normalized {
            return Err(Error::Validation(format!(
                "sample '{}': cannot merge normalized histograms",
                self.label
            )));
        }
        for (v, h) in &mut self.hists {
            if let Some(o) = other.hists.get(v) {
                h.merge(o)?;
            }
        }
        self.total_events += other.total_events;
        self.selected_events += other.selected_events;
        Ok(())
    }

    /// Sample label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Events seen.
    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    /// Events passing the pair selection.
    pub fn selected_events(&self) -> u64 {
        self.selected_events
    }

    /// Histogram of one variable.
    pub fn histogram(&self, v: Variable) -> Option<&Hist1D> {
        self.hists.get(&v)
    }

    /// Serializable summary.
    pub fn summary(&self) -> SampleSummary {
        SampleSummary {
            label: self.label.clone(),
            weight: self.weight,
            total_events: self.total_events,
            selected_events: self.selected_events,
            normalized: self.normalized,
            histograms: self
                .hists
                .iter()
                .map(|(&v, h)| {
                    (
                        v,
                        NormalizedHistogram {
                            bin_edges: h.bin_edges.clone(),
                            bin_content: h.bin_content.clone(),
                            sumw2: h.sumw2.clone(),
                            underflow: h.underflow,
                            overflow: h.overflow,
                            entries: h.entries,
                        },
                    )
                })
                .collect(),
        }
    }
}

/// Histogram as written to the overlay artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedHistogram {
    /// Bin edges.
    pub bin_edges: Vec<f64>,
    /// Bin contents (unit area unless the sample had no entries).
    pub bin_content: Vec<f64>,
    /// Sum of squared weights per bin, scaled by the square of the normalization.
    pub sumw2: Vec<f64>,
    /// Underflow, on the same scale.
    pub underflow: f64,
    /// Overflow, on the same scale.
    pub overflow: f64,
    /// Entries that landed in a bin.
    pub entries: u64,
}

/// One sample of the overlay artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    /// Sample label.
    pub label: String,
    /// Per-event weight.
    pub weight: f64,
    /// Events read.
    pub total_events: u64,
    /// Events passing the pair selection.
    pub selected_events: u64,
    /// Whether the histograms were normalized.
    pub normalized: bool,
    /// Histograms keyed by variable.
    pub histograms: BTreeMap<Variable, NormalizedHistogram>,
}

/// Fill and normalize the histograms of one sample.
pub fn aggregate_sample<'a, I>(
    label: &str,
    weight: f64,
    lepton_mass: f64,
    binning: &BTreeMap<Variable, HistogramBinning>,
    events: I,
) -> Result<SampleHistograms>
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut hists = SampleHistograms::new(label, weight, lepton_mass, binning)?;
    for event in events {
        hists.fill_event(event);
    }
    hists.normalize();
    tracing::info!(
        sample = label,
        total = hists.total_events,
        selected = hists.selected_events,
        "sample aggregated"
    );
    Ok(hists)
}

/// [`aggregate_sample`] over a slice, filled in parallel chunks that are
/// merged before normalization.
pub fn aggregate_sample_par(
    label: &str,
    weight: f64,
    lepton_mass: f64,
    binning: &BTreeMap<Variable, HistogramBinning>,
    events: &[Event],
) -> Result<SampleHistograms> {
    let empty = SampleHistograms::new(label, weight, lepton_mass, binning)?;
    let mut hists = events
        .par_iter()
        .fold(
            || empty.clone(),
            |mut h, event| {
                h.fill_event(event);
                h
            },
        )
        .map(Ok::<_, Error>)
        .try_reduce(
            || empty.clone(),
            |mut a, b| {
                a.merge(&b)?;
                Ok(a)
            },
        )?;
    hists.normalize();
    tracing::info!(
        sample = label,
        total = hists.total_events,
        selected = hists.selected_events,
        "sample aggregated"
    );
    Ok(hists)
}
