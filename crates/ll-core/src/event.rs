//! Per-event record: a bounded list of reconstructed objects plus missing
//! transverse energy.

use serde::{Deserialize, Serialize};

/// Default per-event object capacity (slots per fixed-size array).
pub const DEFAULT_OBJECT_CAPACITY: usize = 10;

/// One reconstructed object (lepton candidate).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Object {
    /// Transverse momentum.
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Azimuthal angle.
    pub phi: f64,
    /// Signed particle-type code (PDG id); the sign carries the charge.
    pub type_code: i32,
    /// Identification working point passed.
    pub id_pass: bool,
}

/// Missing transverse energy.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Met {
    /// Magnitude.
    pub pt: f64,
    /// Azimuthal angle.
    pub phi: f64,
}

/// Borrowed per-object arrays of one row, as decoded from the column store.
///
/// Every slice holds the stored values of that row; lengths may differ from
/// the declared object count.
#[derive(Debug, Clone, Copy)]
pub struct ObjectSlices<'a> {
    /// Transverse momenta.
    pub pt: &'a [f64],
    /// Pseudorapidities.
    pub eta: &'a [f64],
    /// Azimuthal angles.
    pub phi: &'a [f64],
    /// Type codes (integral values).
    pub type_code: &'a [f64],
    /// Identification flags (non-zero = pass, NaN = fail).
    pub id_pass: &'a [f64],
}

impl ObjectSlices<'_> {
    fn min_len(&self) -> usize {
        [self.pt.len(), self.eta.len(), self.phi.len(), self.type_code.len(), self.id_pass.len()]
            .into_iter()
            .min()
            .unwrap_or(0)
    }
}

/// A single event.
///
/// Objects are stored in their original index order; the valid length never
/// exceeds the capacity the event was built with.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    objects: Vec<Object>,
    declared: usize,
    met: Met,
}

impl Event {
    /// Build an event from already-validated objects.
    pub fn new(objects: Vec<Object>, met: Met) -> Self {
        let declared = objects.len();
        Self { objects, declared, met }
    }

    /// Build an event from one row of stored arrays.
    ///
    /// The valid length is `min(declared, capacity, stored length)`. Anything
    /// beyond it is dropped with a warning instead of being read.
    pub fn from_slices(
        row: usize,
        declared: usize,
        slices: ObjectSlices<'_>,
        met: Met,
        capacity: usize,
    ) -> Self {
        let stored = slices.min_len();
        let n = declared.min(capacity).min(stored);
        if n < declared {
            tracing::warn!(row, declared, capacity, stored, kept = n, "truncating object arrays");
        }

        let objects = (0..n)
            .map(|j| Object {
                pt: slices.pt[j],
                eta: slices.eta[j],
                phi: slices.phi[j],
                type_code: slices.type_code[j] as i32,
                id_pass: slices.id_pass[j] != 0.0 && !slices.id_pass[j].is_nan(),
            })
            .collect();

        Self { objects, declared, met }
    }

    /// Objects in index order.
    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    /// Number of valid objects.
    pub fn n_objects(&self) -> usize {
        self.objects.len()
    }

    /// Object at `index`, if within the valid length.
    pub fn object(&self, index: usize) -> Option<&Object> {
        self.objects.get(index)
    }

    /// Object count as declared by the source row.
    pub fn declared_objects(&self) -> usize {
        self.declared
    }

    /// Whether the declared count had to be cut back.
    pub fn is_truncated(&self) -> bool {
        self.declared > self.objects.len()
    }

    /// Missing transverse energy.
    pub fn met(&self) -> Met {
        self.met
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slices<'a>(pt: &'a [f64], flags: &'a [f64]) -> ObjectSlices<'a> {
        ObjectSlices { pt, eta: pt, phi: pt, type_code: pt, id_pass: flags }
    }

    #[test]
    fn from_slices_keeps_declared_prefix() {
        let pt = [30.0, 22.0, 5.0];
        let flags = [1.0, 0.0, 1.0];
        let ev = Event::from_slices(0, 2, slices(&pt, &flags), Met::default(), 10);
        assert_eq!(ev.n_objects(), 2);
        assert!(!ev.is_truncated());
        assert!(ev.objects()[0].id_pass);
        assert!(!ev.objects()[1].id_pass);
    }

    #[test]
    fn from_slices_truncates_to_capacity() {
        let pt = [1.0, 2.0, 3.0, 4.0];
        let flags = [1.0; 4];
        let ev = Event::from_slices(7, 4, slices(&pt, &flags), Met::default(), 3);
        assert_eq!(ev.n_objects(), 3);
        assert_eq!(ev.declared_objects(), 4);
        assert!(ev.is_truncated());
    }

    #[test]
    fn from_slices_never_reads_past_stored_values() {
        let pt = [1.0, 2.0];
        let flags = [1.0];
        let ev = Event::from_slices(0, 5, slices(&pt, &flags), Met::default(), 10);
        assert_eq!(ev.n_objects(), 1);
        assert!(ev.object(1).is_none());
    }
}
