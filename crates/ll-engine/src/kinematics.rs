//! Angle arithmetic and two-body kinematics.
//!
//! Objects are given as (pt, eta, phi, m) and combined as Cartesian
//! four-vectors: `px = pt cos(phi)`, `py = pt sin(phi)`, `pz = pt sinh(eta)`,
//! `E = sqrt(p^2 + m^2)`.

use std::f64::consts::{PI, TAU};
use std::ops::Add;

use serde::{Deserialize, Serialize};

/// Electron rest mass in GeV.
pub const ELECTRON_MASS: f64 = 0.000511;

/// Beyond this magnitude a difference is reduced with a remainder before the
/// wrap loop runs.
const REDUCE_ABOVE: f64 = 64.0 * PI;

/// Signed azimuthal difference `phi_a - phi_b` wrapped into `(-pi, pi]`.
///
/// Values already inside the range are returned unchanged. Non-finite input
/// gives NaN.
pub fn delta_phi(phi_a: f64, phi_b: f64) -> f64 {
    let mut d = phi_a - phi_b;
    if !d.is_finite() {
        return f64::NAN;
    }
    if d.abs() > REDUCE_ABOVE {
        d %= TAU;
    }
    while d > PI {
        d -= TAU;
    }
    while d <= -PI {
        d += TAU;
    }
    d
}

/// Absolute azimuthal separation, in `[0, pi]`.
pub fn angular_separation(phi_a: f64, phi_b: f64) -> f64 {
    delta_phi(phi_a, phi_b).abs()
}

/// Collider coordinates of one object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PtEtaPhiM {
    /// Transverse momentum.
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Azimuthal angle.
    pub phi: f64,
    /// Rest mass.
    pub m: f64,
}

impl PtEtaPhiM {
    /// Create from components.
    pub fn new(pt: f64, eta: f64, phi: f64, m: f64) -> Self {
        Self { pt, eta, phi, m }
    }

    /// Cartesian four-vector.
    pub fn to_four_vector(self) -> FourVector {
        let pt = self.pt.abs();
        let px = pt * self.phi.cos();
        let py = pt * self.phi.sin();
        let pz = pt * self.eta.sinh();
        let p2 = px * px + py * py + pz * pz;
        let m2 = self.m * self.m;
        let e = if self.m >= 0.0 { (p2 + m2).sqrt() } else { (p2 - m2).max(0.0).sqrt() };
        FourVector { px, py, pz, e }
    }
}

/// Minkowski four-vector `(px, py, pz, E)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FourVector {
    /// x momentum.
    pub px: f64,
    /// y momentum.
    pub py: f64,
    /// z momentum.
    pub pz: f64,
    /// Energy.
    pub e: f64,
}

impl FourVector {
    /// `E^2 - |p|^2`.
    pub fn mass2(&self) -> f64 {
        self.e * self.e - (self.px * self.px + self.py * self.py + self.pz * self.pz)
    }

    /// Invariant mass; space-like vectors return `-sqrt(-m^2)`.
    pub fn mass(&self) -> f64 {
        let mm = self.mass2();
        if mm < 0.0 { -(-mm).sqrt() } else { mm.sqrt() }
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }
}

impl Add for FourVector {
    type Output = FourVector;

    fn add(self, rhs: FourVector) -> FourVector {
        FourVector {
            px: self.px + rhs.px,
            py: self.py + rhs.py,
            pz: self.pz + rhs.pz,
            e: self.e + rhs.e,
        }
    }
}

/// Invariant mass of the two-object system.
pub fn two_body_mass(a: PtEtaPhiM, b: PtEtaPhiM) -> f64 {
    (a.to_four_vector() + b.to_four_vector()).mass()
}

/// Transverse momentum of the two-object system.
pub fn two_body_pt(a: PtEtaPhiM, b: PtEtaPhiM) -> f64 {
    (a.to_four_vector() + b.to_four_vector()).pt()
}

/// Pair quantities used by the selection stages and the histograms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairKinematics {
    /// Invariant mass.
    pub mll: f64,
    /// Pair transverse momentum.
    pub ptll: f64,
    /// Absolute azimuthal separation.
    pub dphill: f64,
}

impl PairKinematics {
    /// Combine the two objects once.
    pub fn compute(a: PtEtaPhiM, b: PtEtaPhiM) -> Self {
        let sum = a.to_four_vector() + b.to_four_vector();
        Self { mll: sum.mass(), ptll: sum.pt(), dphill: angular_separation(a.phi, b.phi) }
    }
}
