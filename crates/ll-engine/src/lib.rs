//! # ll-engine
//!
//! Event selection for dilepton samples: kinematic helpers, object
//! selection, the missing-energy projection, the staged cut flow and the
//! per-sample histogram aggregator.
//!
//! ## Example
//!
//! ```
//! use ll_core::{Event, Met, Object};
//! use ll_engine::{CutFlowConfig, CutFlowEngine};
//!
//! let e = |pt, phi, code| Object { pt, eta: 0.0, phi, type_code: code, id_pass: true };
//! let events = vec![Event::new(vec![e(45.0, 0.0, 11), e(44.0, 3.0, -11)], Met { pt: 5.0, phi: 1.5 })];
//!
//! let engine = CutFlowEngine::new(CutFlowConfig::default());
//! let report = engine.run(events.iter());
//! assert_eq!(report.counters.total, 1);
//! println!("{report}");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod cutflow;
pub mod histogram;
pub mod kinematics;
pub mod projection;
pub mod selection;

pub use aggregate::{
    HistogramBinning, NormalizedHistogram, SampleHistograms, SampleSummary, Variable,
    aggregate_sample, aggregate_sample_par,
};
pub use cutflow::{
    CutFlowConfig, CutFlowCounters, CutFlowEngine, CutFlowReport, EventClassification,
    EventOutcome, N_STAGES, Stage, StageSummary,
};
pub use histogram::Hist1D;
pub use kinematics::{
    ELECTRON_MASS, FourVector, PairKinematics, PtEtaPhiM, angular_separation, delta_phi,
    two_body_mass, two_body_pt,
};
pub use projection::{MetProjection, ProjectionReference};
pub use selection::{PairSelection, SelectedPair, leading_two, select_pair};
