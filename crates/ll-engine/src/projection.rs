//! Projected missing transverse energy.
//!
//! For the object closest in azimuth to the MET direction, only the MET
//! component perpendicular to that object is kept when the two are within
//! 90 degrees; otherwise the full magnitude passes through.

use std::f64::consts::FRAC_PI_2;

use ll_core::Event;
use serde::{Deserialize, Serialize};

use crate::kinematics::delta_phi;
use crate::selection::{SelectedPair, leading_two};

/// Which objects the derived-column writer projects against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionReference {
    /// Two highest-pt objects of the event, identified or not.
    ///
    /// A row holding a single object is projected against that object like
    /// any other; its MET is not copied through unchanged. Only rows with no
    /// object at all give `projected_MET = 0`.
    #[default]
    LeadingObjects,
    /// Two highest-pt identification-passing objects.
    IdentifiedObjects,
}

/// Derived per-event MET quantities.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetProjection {
    /// `delta_phi(met_phi, phi_leading)`, 0 without a leading object.
    pub delta_phi_1: f64,
    /// `delta_phi(met_phi, phi_subleading)`, 0 without a subleading object.
    pub delta_phi_2: f64,
    /// The signed value above with the smaller magnitude.
    pub delta_phi_min: f64,
    /// MET projected perpendicular to the closest object.
    pub projected_met: f64,
}

impl MetProjection {
    /// Compute from MET and the azimuths of up to two reference objects.
    pub fn compute(
        met_pt: f64,
        met_phi: f64,
        leading_phi: Option<f64>,
        subleading_phi: Option<f64>,
    ) -> Self {
        let d1 = leading_phi.map(|phi| delta_phi(met_phi, phi));
        let d2 = subleading_phi.map(|phi| delta_phi(met_phi, phi));

        let delta_phi_min = match (d1, d2) {
            // Ties keep the subleading value.
            (Some(a), Some(b)) => {
                if a.abs() < b.abs() {
                    a
                } else {
                    b
                }
            }
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => 0.0,
        };

        Self {
            delta_phi_1: d1.unwrap_or(0.0),
            delta_phi_2: d2.unwrap_or(0.0),
            delta_phi_min,
            projected_met: project(met_pt, delta_phi_min),
        }
    }

    /// Projection against a selected pair.
    pub fn for_pair(event: &Event, pair: SelectedPair) -> Self {
        let met = event.met();
        let lead = pair.leading(event).phi;
        let sub = pair.subleading(event).phi;
        Self::compute(met.pt, met.phi, Some(lead), Some(sub))
    }

    /// Projection against the reference objects of any event.
    pub fn for_event(event: &Event, reference: ProjectionReference) -> Self {
        let identified_only = reference == ProjectionReference::IdentifiedObjects;
        let (lead, sub) = leading_two(event, identified_only);
        let phi = |idx: Option<usize>| idx.map(|j| event.objects()[j].phi);
        let met = event.met();
        Self::compute(met.pt, met.phi, phi(lead), phi(sub))
    }

    /// All four values are finite.
    pub fn is_finite(&self) -> bool {
        self.delta_phi_1.is_finite()
            && self.delta_phi_2.is_finite()
            && self.delta_phi_min.is_finite()
            && self.projected_met.is_finite()
    }
}

fn project(met_pt: f64, delta_phi_min: f64) -> f64 {
    let abs_dphi = delta_phi_min.abs();
    if abs_dphi < FRAC_PI_2 { met_pt * abs_dphi.sin() } else { met_pt }
}
