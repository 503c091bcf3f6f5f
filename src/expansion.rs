//! Complex-plane series expansions (C4): multipole (ME, exterior far-field)
//! and local (LE, interior near-field) expansions of order `p`, plus the
//! shift/conversion algebra that moves them between box centers. Built on
//! `num_complex::Complex64` rather than a hand-rolled pair or a general
//! tensor library.

use std::ops::AddAssign;

use num_complex::Complex64;

use crate::{tables::{BinomialTable, PowTable}, vector::Vec2};

pub(crate) fn to_complex(v: Vec2) -> Complex64 {
    Complex64::new(v.x, v.y)
}

/// Reads the gradient of a complex analytic potential as a real force
/// vector: `(re, im) -> (-re, +im)`.
fn to_force_vec(z: Complex64) -> Vec2 {
    Vec2::new(-z.re, z.im)
}

#[derive(Clone, Debug)]
pub struct MultipoleExpansion {
    pub order: usize,
    pub center: Complex64,
    coeffs: Vec<Complex64>,
}

impl MultipoleExpansion {
    /// Builds an ME directly from point sources `(charge, position)`.
    pub fn from_sources(center: Vec2, order: usize, sources: &[(f64, Vec2)]) -> Self {
        let z0 = to_complex(center);
        let mut coeffs = vec![Complex64::new(0., 0.); order + 1];
        for &(q, pos) in sources {
            let z_rel = to_complex(pos) - z0;
            coeffs[0] += q;
            let mut z_pow = z_rel;
            for k in 1..=order {
                coeffs[k] -= q * z_pow;
                z_pow *= z_rel;
            }
        }
        for k in 1..=order {
            coeffs[k] /= k as f64;
        }
        Self {
            order,
            center: z0,
            coeffs,
        }
    }

    /// Re-expresses this ME about `new_center` (expected closer to the
    /// parent than `self.center`), returning the shifted coefficients.
    pub fn shift(&self, new_center: Complex64) -> Vec<Complex64> {
        let t = new_center - self.center;
        BinomialTable::ensure_order(self.order);
        let table = BinomialTable;
        let t_pow = PowTable::new(t, self.order);
        let a0 = self.coeffs[0];
        let mut shifted = vec![Complex64::new(0., 0.); self.order + 1];
        shifted[0] = a0;
        for l in 1..=self.order {
            let mut b_l = -(a0 / l as f64) * t_pow.get(l);
            for k in 1..=l {
                b_l += self.coeffs[k] * t_pow.get(l - k) * table.get(l - 1, k - 1);
            }
            shifted[l] = b_l;
        }
        shifted
    }

    /// Builds an ME at `center` by shifting and summing a set of children
    /// MEs (upward pass, C5).
    pub fn from_children(center: Vec2, children: &[&MultipoleExpansion]) -> Self {
        let order = children[0].order;
        let z0 = to_complex(center);
        let mut coeffs = vec![Complex64::new(0., 0.); order + 1];
        for child in children {
            let shifted = child.shift(z0);
            for (c, s) in coeffs.iter_mut().zip(shifted) {
                *c += s;
            }
        }
        Self {
            order,
            center: z0,
            coeffs,
        }
    }

    pub fn coeff(&self, n: usize) -> Complex64 {
        self.coeffs[n]
    }

    pub fn evaluate_potential(&self, z: Vec2) -> f64 {
        let w = to_complex(z) - self.center;
        let a0 = self.coeffs[0].re;
        let mut result = a0 * w.ln();
        let mut w_inv_pow = Complex64::new(1., 0.) / w;
        for k in 1..=self.order {
            result += self.coeffs[k] * w_inv_pow;
            w_inv_pow /= w;
        }
        result.re
    }

    pub fn evaluate_force(&self, z: Vec2) -> Vec2 {
        let w = to_complex(z) - self.center;
        let a0 = self.coeffs[0].re;
        let mut result = a0 / w;
        let mut w_inv_pow = Complex64::new(1., 0.) / (w * w);
        for k in 1..=self.order {
            result -= (k as f64) * self.coeffs[k] * w_inv_pow;
            w_inv_pow /= w;
        }
        to_force_vec(result)
    }
}

#[derive(Clone, Debug)]
pub struct LocalExpansion {
    pub order: usize,
    pub center: Complex64,
    coeffs: Vec<Complex64>,
}

impl LocalExpansion {
    pub fn zero(center: Vec2, order: usize) -> Self {
        Self {
            order,
            center: to_complex(center),
            coeffs: vec![Complex64::new(0., 0.); order + 1],
        }
    }

    /// M2L: converts a single multipole expansion into a local expansion
    /// about `center` (M2L: converts a multipole expansion into a local one).
    pub fn from_multipole(center: Vec2, incoming: &MultipoleExpansion) -> Self {
        let order = incoming.order;
        let z0 = to_complex(center);
        let delta = incoming.center - z0;
        BinomialTable::ensure_order(2 * order);
        let table = BinomialTable;
        let delta_inv_pow = PowTable::new(Complex64::new(1., 0.) / delta, order);

        let mut coeffs = vec![Complex64::new(0., 0.); order + 1];
        let mut c0 = incoming.coeff(0) * (-delta).ln();
        for k in 1..=order {
            let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
            c0 += sign * incoming.coeff(k) * delta_inv_pow.get(k);
        }
        coeffs[0] = c0;

        for l in 1..=order {
            let mut c_l = -incoming.coeff(0) / l as f64;
            for k in 1..order {
                let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
                c_l += sign * incoming.coeff(k) * delta_inv_pow.get(k) * table.get(l + k - 1, k - 1);
            }
            c_l *= delta_inv_pow.get(l);
            coeffs[l] = c_l;
        }

        Self {
            order,
            center: z0,
            coeffs,
        }
    }

    /// Sums the M2L conversion of every interaction-list partner about this
    /// center.
    pub fn from_multipole_list(center: Vec2, incoming: &[&MultipoleExpansion]) -> Option<Self> {
        let mut iter = incoming.iter();
        let first = iter.next()?;
        let mut acc = Self::from_multipole(center, first);
        for me in iter {
            acc += Self::from_multipole(center, me);
        }
        Some(acc)
    }

    /// L2L: re-expresses a parent's LE about a child's (closer) center via
    /// the Horner sweep.
    pub fn shift_from_parent(parent: &LocalExpansion, child_center: Vec2) -> Self {
        let order = parent.order;
        let s = parent.center - to_complex(child_center);
        let mut shifted = parent.coeffs.clone();
        for j in 0..order {
            for k in order - j - 1..order {
                let bump = s * shifted[k + 1];
                shifted[k] -= bump;
            }
        }
        Self {
            order,
            center: to_complex(child_center),
            coeffs: shifted,
        }
    }

    pub fn evaluate_potential(&self, z: Vec2) -> f64 {
        let w = to_complex(z) - self.center;
        let mut result = Complex64::new(0., 0.);
        let mut w_pow = Complex64::new(1., 0.);
        for k in 0..=self.order {
            result += self.coeffs[k] * w_pow;
            w_pow *= w;
        }
        result.re
    }

    pub fn evaluate_force(&self, z: Vec2) -> Vec2 {
        let w = to_complex(z) - self.center;
        let mut result = Complex64::new(0., 0.);
        let mut w_pow = Complex64::new(1., 0.);
        for k in 1..=self.order {
            result += (k as f64) * self.coeffs[k] * w_pow;
            w_pow *= w;
        }
        to_force_vec(result)
    }
}

impl AddAssign<LocalExpansion> for LocalExpansion {
    fn add_assign(&mut self, rhs: LocalExpansion) {
        debug_assert_eq!(self.order, rhs.order);
        debug_assert_eq!(self.center, rhs.center);
        for (c, r) in self.coeffs.iter_mut().zip(rhs.coeffs) {
            *c += r;
        }
    }
}
