//! Object selection: identified-object pairing and pt ordering.

use ll_core::{Event, Object};
use serde::{Deserialize, Serialize};

use crate::kinematics::PtEtaPhiM;

/// Leading/subleading object indices of a selected pair.
///
/// `pt[leading] >= pt[subleading]`; on equal pt the lower index leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedPair {
    /// Index of the higher-pt object.
    pub leading: usize,
    /// Index of the lower-pt object.
    pub subleading: usize,
}

impl SelectedPair {
    /// Order two distinct indices by pt (descending). `first` must be the lower index.
    pub fn order(event: &Event, first: usize, second: usize) -> Option<Self> {
        let a = event.object(first)?;
        let b = event.object(second)?;
        if a.pt >= b.pt || b.pt.is_nan() {
            Some(Self { leading: first, subleading: second })
        } else {
            Some(Self { leading: second, subleading: first })
        }
    }

    /// Leading object.
    pub fn leading<'a>(&self, event: &'a Event) -> &'a Object {
        &event.objects()[self.leading]
    }

    /// Subleading object.
    pub fn subleading<'a>(&self, event: &'a Event) -> &'a Object {
        &event.objects()[self.subleading]
    }

    /// Both objects as four-vector inputs with the given rest mass.
    pub fn p4s(&self, event: &Event, mass: f64) -> (PtEtaPhiM, PtEtaPhiM) {
        let l = self.leading(event);
        let s = self.subleading(event);
        (PtEtaPhiM::new(l.pt, l.eta, l.phi, mass), PtEtaPhiM::new(s.pt, s.eta, s.phi, mass))
    }
}

/// Outcome of the pair selection for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairSelection {
    /// Number of identified objects differs from two.
    WrongMultiplicity(usize),
    /// Two identified objects whose type codes do not have opposite sign.
    SameSign,
    /// Two identified, opposite-sign objects.
    Selected(SelectedPair),
}

impl PairSelection {
    /// The selected pair, if any.
    pub fn pair(self) -> Option<SelectedPair> {
        match self {
            PairSelection::Selected(p) => Some(p),
            _ => None,
        }
    }
}

/// Indices of identification-passing objects, ascending.
pub fn identified_indices(event: &Event) -> Vec<usize> {
    event.objects().iter().enumerate().filter(|(_, o)| o.id_pass).map(|(j, _)| j).collect()
}

/// Whether two type codes carry opposite charge (product < 0).
pub fn opposite_sign(a: i32, b: i32) -> bool {
    i64::from(a) * i64::from(b) < 0
}

/// Exactly two identified objects with opposite-sign codes, ordered by pt.
pub fn select_pair(event: &Event) -> PairSelection {
    let tight = identified_indices(event);
    let &[i1, i2] = tight.as_slice() else {
        return PairSelection::WrongMultiplicity(tight.len());
    };

    let objects = event.objects();
    if !opposite_sign(objects[i1].type_code, objects[i2].type_code) {
        return PairSelection::SameSign;
    }

    match SelectedPair::order(event, i1, i2) {
        Some(pair) => PairSelection::Selected(pair),
        None => PairSelection::WrongMultiplicity(tight.len()),
    }
}

/// Two highest-pt objects, optionally among identified objects only.
///
/// Works for any multiplicity: `(None, None)` for an empty event,
/// `(Some, None)` for a single candidate. Equal pt keeps the earlier index
/// ahead.
pub fn leading_two(event: &Event, identified_only: bool) -> (Option<usize>, Option<usize>) {
    let objects = event.objects();
    let mut lead: Option<usize> = None;
    let mut sub: Option<usize> = None;

    for (j, o) in objects.iter().enumerate() {
        if identified_only && !o.id_pass {
            continue;
        }
        match lead {
            Some(l) if o.pt <= objects[l].pt || o.pt.is_nan() => match sub {
                Some(s) if o.pt <= objects[s].pt || o.pt.is_nan() => {}
                _ => sub = Some(j),
            },
            _ => {
                sub = lead;
                lead = Some(j);
            }
        }
    }

    (lead, sub)
}
