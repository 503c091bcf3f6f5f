//! The softened Newtonian point-mass kernel shared by the Barnes-Hut (C3),
//! FMM near-field (C5) and direct (C7) force evaluators.

use crate::{vector::Vec2, Body};

/// Distances below this floor are clamped, to avoid blow-up at exact overlap.
pub const DIST_FLOOR: f64 = 1e-5;

/// Acceleration increment on `target` from a source with mass `src_mass` at
/// `src_posit`. Returns `None` when the result is non-finite (dropped
/// silently rather than propagated).
pub fn softened_accel(
    src_mass: f64,
    src_posit: Vec2,
    target: &Body,
    g: f64,
    eps_soft: f64,
) -> Option<Vec2> {
    let r = src_posit - target.posit;
    let mut dist = r.norm();
    if dist < DIST_FLOOR {
        dist = DIST_FLOOR;
    }
    let dist_soft = (dist * dist + eps_soft * eps_soft).sqrt();
    let force_mag = g * src_mass * target.mass / (dist_soft * dist_soft);
    let accel = r * (force_mag / dist) / target.mass;
    if accel.x.is_finite() && accel.y.is_finite() {
        Some(accel)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vec2;

    #[test]
    fn coincident_sources_are_floored_not_infinite() {
        let target = Body::new(1., Vec2::new(0., 0.), Vec2::new_zero());
        let accel = softened_accel(1., Vec2::new(0., 0.), &target, 1.0, 0.0).unwrap();
        assert!(accel.x.is_finite() && accel.y.is_finite());
    }
}
