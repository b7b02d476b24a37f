//! Six-stage dilepton cut flow with per-stage survivor counting.
//!
//! Stages are evaluated in order and stop at the first failure, so an event
//! increments the counters of every stage it passed and no others. Counts are
//! therefore non-increasing from stage to stage.

use std::fmt;

use ll_core::{Error, Event, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::kinematics::{ELECTRON_MASS, PairKinematics};
use crate::projection::MetProjection;
use crate::selection::{SelectedPair, select_pair};

/// Number of selection stages.
pub const N_STAGES: usize = 6;

/// One selection stage, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Exactly two identified objects with opposite-sign codes.
    OppositeSignPair,
    /// Leading/subleading pt thresholds and |eta| acceptance.
    LeptonAcceptance,
    /// Invariant mass window.
    MassWindow,
    /// Projected MET upper bound.
    ProjectedMet,
    /// Pair pt upper bound.
    PairPt,
    /// Pair azimuthal separation lower bound.
    PairDeltaPhi,
}

impl Stage {
    /// All stages in evaluation order.
    pub const ALL: [Stage; N_STAGES] = [
        Stage::OppositeSignPair,
        Stage::LeptonAcceptance,
        Stage::MassWindow,
        Stage::ProjectedMet,
        Stage::PairPt,
        Stage::PairDeltaPhi,
    ];

    /// Zero-based position in the chain.
    pub fn index(self) -> usize {
        match self {
            Stage::OppositeSignPair => 0,
            Stage::LeptonAcceptance => 1,
            Stage::MassWindow => 2,
            Stage::ProjectedMet => 3,
            Stage::PairPt => 4,
            Stage::PairDeltaPhi => 5,
        }
    }

    /// Human-readable requirement with the configured thresholds.
    pub fn describe(self, cfg: &CutFlowConfig) -> String {
        match self {
            Stage::OppositeSignPair => "exactly two identified objects, opposite sign".to_string(),
            Stage::LeptonAcceptance => format!(
                "|eta| < {} and leading pt > {}, subleading pt > {}",
                cfg.eta_max, cfg.lead_pt_min, cfg.sublead_pt_min
            ),
            Stage::MassWindow => format!("{} < mll < {}", cfg.mll_min, cfg.mll_max),
            Stage::ProjectedMet => format!("projected MET < {}", cfg.projected_met_max),
            Stage::PairPt => format!("pt_ll < {}", cfg.ptll_max),
            Stage::PairDeltaPhi => format!("|dphi_ll| > {}", cfg.dphill_min),
        }
    }
}

/// Thresholds of the selection chain.
///
/// Defaults reproduce the reference Drell-Yan selection. `projected_met_max`
/// differs between deployments (20 or 25); 20 is the default here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CutFlowConfig {
    /// Leading object pt must exceed this.
    pub lead_pt_min: f64,
    /// Subleading object pt must exceed this.
    pub sublead_pt_min: f64,
    /// Both objects need |eta| below this.
    pub eta_max: f64,
    /// Lower edge of the (open) mass window.
    pub mll_min: f64,
    /// Upper edge of the (open) mass window.
    pub mll_max: f64,
    /// Projected MET must be below this.
    pub projected_met_max: f64,
    /// Pair pt must be below this.
    pub ptll_max: f64,
    /// Pair |dphi| must exceed this.
    pub dphill_min: f64,
    /// Rest mass assigned to each object when building four-vectors.
    pub lepton_mass: f64,
}

impl Default for CutFlowConfig {
    fn default() -> Self {
        Self {
            lead_pt_min: 25.0,
            sublead_pt_min: 20.0,
            eta_max: 2.5,
            mll_min: 60.0,
            mll_max: 120.0,
            projected_met_max: 20.0,
            ptll_max: 40.0,
            dphill_min: 2.5,
            lepton_mass: ELECTRON_MASS,
        }
    }
}

impl CutFlowConfig {
    /// Reject non-finite thresholds, an empty mass window or a negative mass.
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("lead_pt_min", self.lead_pt_min),
            ("sublead_pt_min", self.sublead_pt_min),
            ("eta_max", self.eta_max),
            ("mll_min", self.mll_min),
            ("mll_max", self.mll_max),
            ("projected_met_max", self.projected_met_max),
            ("ptll_max", self.ptll_max),
            ("dphill_min", self.dphill_min),
            ("lepton_mass", self.lepton_mass),
        ];
        if let Some((name, v)) = named.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::Validation(format!("cut '{name}' must be finite (got {v})")));
        }
        if self.mll_min >= self.mll_max {
            return Err(Error::Validation(format!(
                "mass window is empty: mll_min={} >= mll_max={}",
                self.mll_min, self.mll_max
            )));
        }
        if self.lepton_mass < 0.0 {
            return Err(Error::Validation(format!(
                "lepton_mass must be >= 0 (got {})",
                self.lepton_mass
            )));
        }
        Ok(())
    }
}

/// Terminal state of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// Failed the given stage (and passed all before it).
    Rejected(Stage),
    /// Passed every stage.
    Passed,
}

impl EventOutcome {
    /// Number of stages passed, `0..=N_STAGES`.
    pub fn stages_passed(self) -> usize {
        match self {
            EventOutcome::Rejected(stage) => stage.index(),
            EventOutcome::Passed => N_STAGES,
        }
    }
}

/// Per-event classification plus whatever was computed on the way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventClassification {
    /// Terminal state.
    pub outcome: EventOutcome,
    /// Selected pair, present from stage 1 on.
    pub pair: Option<SelectedPair>,
    /// Pair kinematics, present once stage 2 passed.
    pub kinematics: Option<PairKinematics>,
    /// MET projection, present once stage 3 passed.
    pub projection: Option<MetProjection>,
}

impl EventClassification {
    fn rejected(stage: Stage) -> Self {
        Self {
            outcome: EventOutcome::Rejected(stage),
            pair: None,
            kinematics: None,
            projection: None,
        }
    }
}

/// Survivor counters of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CutFlowCounters {
    /// Events read.
    pub total: u64,
    /// Events surviving each stage, in stage order.
    pub stages: [u64; N_STAGES],
}

impl CutFlowCounters {
    /// Count one event.
    pub fn record(&mut self, outcome: EventOutcome) {
        self.total += 1;
        for c in &mut self.stages[..outcome.stages_passed()] {
            *c += 1;
        }
    }

    /// Sum of two partial counts.
    pub fn merge(mut self, other: CutFlowCounters) -> CutFlowCounters {
        self.total += other.total;
        for (a, b) in self.stages.iter_mut().zip(other.stages) {
            *a += b;
        }
        self
    }

    /// Survivors of `stage`.
    pub fn count(&self, stage: Stage) -> u64 {
        self.stages[stage.index()]
    }

    /// Events passing every stage.
    pub fn passed(&self) -> u64 {
        self.stages[N_STAGES - 1]
    }

    /// `total >= stage 1 >= ... >= stage 6`.
    pub fn is_monotonic(&self) -> bool {
        self.stages.first().is_none_or(|&c| c <= self.total)
            && self.stages.windows(2).all(|w| w[0] >= w[1])
    }
}

/// Evaluates the selection chain.
#[derive(Debug, Clone)]
pub struct CutFlowEngine {
    config: CutFlowConfig,
}

impl CutFlowEngine {
    /// Create an engine with the given thresholds.
    pub fn new(config: CutFlowConfig) -> Self {
        Self { config }
    }

    /// Thresholds in use.
    pub fn config(&self) -> &CutFlowConfig {
        &self.config
    }

    /// Run the chain on one event, stopping at the first failed stage.
    ///
    /// A non-finite quantity fails the stage that reads it.
    pub fn classify(&self, event: &Event) -> EventClassification {
        let cfg = &self.config;

        let Some(pair) = select_pair(event).pair() else {
            return EventClassification::rejected(Stage::OppositeSignPair);
        };
        let mut out = EventClassification::rejected(Stage::LeptonAcceptance);
        out.pair = Some(pair);

        let lead = pair.leading(event);
        let sub = pair.subleading(event);
        let accepted = lead.pt > cfg.lead_pt_min
            && sub.pt > cfg.sublead_pt_min
            && lead.eta.abs() < cfg.eta_max
            && sub.eta.abs() < cfg.eta_max;
        if !accepted {
            return out;
        }

        let (p1, p2) = pair.p4s(event, cfg.lepton_mass);
        let kin = PairKinematics::compute(p1, p2);
        out.kinematics = Some(kin);
        if !(kin.mll.is_finite() && kin.mll > cfg.mll_min && kin.mll < cfg.mll_max) {
            out.outcome = EventOutcome::Rejected(Stage::MassWindow);
            return out;
        }

        let proj = MetProjection::for_pair(event, pair);
        out.projection = Some(proj);
        if !(proj.projected_met.is_finite() && proj.projected_met < cfg.projected_met_max) {
            out.outcome = EventOutcome::Rejected(Stage::ProjectedMet);
            return out;
        }

        if !(kin.ptll.is_finite() && kin.ptll < cfg.ptll_max) {
            out.outcome = EventOutcome::Rejected(Stage::PairPt);
            return out;
        }

        if !(kin.dphill.is_finite() && kin.dphill > cfg.dphill_min) {
            out.outcome = EventOutcome::Rejected(Stage::PairDeltaPhi);
            return out;
        }

        out.outcome = EventOutcome::Passed;
        out
    }

    /// Sequential pass over `events`.
    pub fn run<'a, I>(&self, events: I) -> CutFlowReport
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let mut counters = CutFlowCounters::default();
        for event in events {
            counters.record(self.classify(event).outcome);
        }
        self.report(counters)
    }

    /// Parallel pass over `events`; per-worker counters are summed, so the
    /// result equals [`CutFlowEngine::run`].
    pub fn run_par(&self, events: &[Event]) -> CutFlowReport {
        let counters = events
            .par_iter()
            .fold(CutFlowCounters::default, |mut c, event| {
                c.record(self.classify(event).outcome);
                c
            })
            .reduce(CutFlowCounters::default, CutFlowCounters::merge);
        self.report(counters)
    }

    fn report(&self, counters: CutFlowCounters) -> CutFlowReport {
        tracing::debug!(total = counters.total, passed = counters.passed(), "cut flow complete");
        CutFlowReport { label: None, config: self.config.clone(), counters }
    }
}

/// Survivors and efficiency of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    /// Stage.
    pub stage: Stage,
    /// Requirement with thresholds.
    pub description: String,
    /// Surviving events.
    pub count: u64,
    /// `count / total`, 0 for an empty input.
    pub efficiency: f64,
    /// `count / previous count`, 0 when the previous count is 0.
    pub relative_efficiency: f64,
}

/// Final cut-flow result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutFlowReport {
    /// Input label (file or sample name) shown in the header.
    pub label: Option<String>,
    /// Thresholds used.
    pub config: CutFlowConfig,
    /// Counters.
    pub counters: CutFlowCounters,
}

impl CutFlowReport {
    /// Attach an input label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Per-stage counts with absolute and relative efficiencies.
    pub fn stages(&self) -> Vec<StageSummary> {
        let ratio = |num: u64, den: u64| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let mut prev = self.counters.total;
        Stage::ALL
            .iter()
            .map(|&stage| {
                let count = self.counters.count(stage);
                let s = StageSummary {
                    stage,
                    description: stage.describe(&self.config),
                    count,
                    efficiency: ratio(count, self.counters.total),
                    relative_efficiency: ratio(count, prev),
                };
                prev = count;
                s
            })
            .collect()
    }
}

impl fmt::Display for CutFlowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => writeln!(f, "Cut flow results for {label}:")?,
            None => writeln!(f, "Cut flow results:")?,
        }
        writeln!(f)?;
        writeln!(f, "Total events: {}", self.counters.total)?;
        for s in self.stages() {
            writeln!(f, "Events after {}: {}", s.description, s.count)?;
        }
        writeln!(f)?;
        write!(f, "Final events passing all cuts: {}", self.counters.passed())
    }
}
