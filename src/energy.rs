//! Energy diagnostics (C9): total system energy and per-body energy
//! bookkeeping, computed directly (not through either force engine).
//! Grounded on `NbodySolver::computeEnergy`.

use rayon::prelude::*;

use crate::{kernel::DIST_FLOOR, Body};

/// Total kinetic + potential energy of the system.
pub fn total_energy(bodies: &[Body], g: f64) -> f64 {
    let kinetic: f64 = bodies
        .iter()
        .map(|b| 0.5 * b.mass * b.vel.norm_squared())
        .sum();

    let mut potential = 0.0;
    for q in 0..bodies.len() {
        for p in (q + 1)..bodies.len() {
            let dist = (bodies[q].posit - bodies[p].posit).norm().max(DIST_FLOOR);
            potential += -g * bodies[p].mass * bodies[q].mass / dist;
        }
    }

    kinetic + potential
}

/// Writes each body's `energy` field with its kinetic energy plus half the
/// sum of its pairwise potential energy with every other body (so the
/// per-body values sum to `total_energy`).
pub fn update_per_body_energy(bodies: &mut [Body], g: f64) {
    let snapshot: Vec<Body> = bodies.to_vec();
    bodies.par_iter_mut().enumerate().for_each(|(i, b)| {
        let kinetic = 0.5 * b.mass * b.vel.norm_squared();
        let mut potential_half = 0.0;
        for (j, other) in snapshot.iter().enumerate() {
            if i == j {
                continue;
            }
            let dist = (b.posit - other.posit).norm().max(DIST_FLOOR);
            potential_half += -g * b.mass * other.mass / dist;
        }
        b.energy = Some(kinetic + 0.5 * potential_half);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vec2;

    #[test]
    fn two_stationary_bodies_have_only_potential_energy() {
        let bodies = vec![
            Body::new(1., Vec2::new(-1., 0.), Vec2::new_zero()),
            Body::new(1., Vec2::new(1., 0.), Vec2::new_zero()),
        ];
        let e = total_energy(&bodies, 1.0);
        assert!((e - (-0.5)).abs() < 1e-12);
    }

    #[test]
    fn per_body_energy_sums_to_total() {
        let mut bodies = vec![
            Body::new(1., Vec2::new(-1., 0.), Vec2::new(0., 0.3)),
            Body::new(2., Vec2::new(1., 0.), Vec2::new(0., -0.15)),
            Body::new(1.5, Vec2::new(0., 2.), Vec2::new(0.1, 0.)),
        ];
        let total = total_energy(&bodies, 1.0);
        update_per_body_energy(&mut bodies, 1.0);
        let summed: f64 = bodies.iter().map(|b| b.energy.unwrap()).sum();
        assert!((summed - total).abs() < 1e-9);
    }
}
