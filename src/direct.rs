//! Direct O(N^2) reference kernel (C7): every body against every other,
//! exact to floating-point, used as the ground-truth oracle for the
//! approximate engines and for small systems where the tree overhead isn't
//! worth it. Grounded on `BH_test_openmp.cpp`'s direct-kernel baseline.

use rayon::prelude::*;

use crate::{kernel, Body};

/// Computes and writes `accel` on every body in `bodies` from every other
/// body, in parallel over the outer (target) loop, canonical ordering
/// otherwise unobserved since gravity is evaluated pairwise independently.
pub fn update_forces(bodies: &mut [Body], g: f64, eps_soft: f64) {
    let snapshot: Vec<Body> = bodies.to_vec();
    bodies.par_iter_mut().enumerate().for_each(|(i, target)| {
        target.accel = crate::vector::Vec2::new_zero();
        for (j, src) in snapshot.iter().enumerate() {
            if i == j || src.mass <= 0. {
                continue;
            }
            if let Some(a) = kernel::softened_accel(src.mass, src.posit, target, g, eps_soft) {
                target.accel += a;
            }
        }
    });
}

/// The gravitational potential `-G * sum(m_i / r)` at an arbitrary point
/// (not assumed to be one of `bodies`), summed in ascending body-index
/// order for reproducibility.
pub fn potential_at(point: crate::vector::Vec2, bodies: &[Body], g: f64) -> f64 {
    let mut total = 0.0;
    for b in bodies {
        if b.mass <= 0. {
            continue;
        }
        let r = (b.posit - point).norm().max(kernel::DIST_FLOOR);
        total += -g * b.mass / r;
    }
    total
}

/// The potential at every body's own position, skipping its self-term.
/// Parallel over the outer loop, canonical `i < j`-style ascending
/// summation order within each body's inner loop.
pub fn direct_potentials(bodies: &[Body], g: f64) -> Vec<f64> {
    bodies
        .par_iter()
        .enumerate()
        .map(|(i, target)| {
            let mut total = 0.0;
            for (j, src) in bodies.iter().enumerate() {
                if i == j || src.mass <= 0. {
                    continue;
                }
                let r = (src.posit - target.posit).norm().max(kernel::DIST_FLOOR);
                total += -g * src.mass / r;
            }
            total
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vec2;

    #[test]
    fn two_body_force_is_newtons_third_law_symmetric() {
        let mut bodies = vec![
            Body::new(2., Vec2::new(-1., 0.), Vec2::new_zero()),
            Body::new(3., Vec2::new(1., 0.), Vec2::new_zero()),
        ];
        update_forces(&mut bodies, 1.0, 0.0);
        // a1*m1 should equal -a2*m2 (equal and opposite force).
        let f1 = bodies[0].accel * bodies[0].mass;
        let f2 = bodies[1].accel * bodies[1].mass;
        assert!((f1.x + f2.x).abs() < 1e-12);
        assert!((f1.y + f2.y).abs() < 1e-12);
        assert!(bodies[0].accel.x > 0.); // pulled toward the other body
        assert!(bodies[1].accel.x < 0.);
    }

    #[test]
    fn isolated_body_feels_no_force() {
        let mut bodies = vec![Body::new(5., Vec2::new(0., 0.), Vec2::new_zero())];
        update_forces(&mut bodies, 1.0, 0.0);
        assert_eq!(bodies[0].accel, Vec2::new_zero());
    }

    #[test]
    fn massless_source_contributes_nothing() {
        let mut bodies = vec![
            Body::new(1., Vec2::new(0., 0.), Vec2::new_zero()),
            Body::new(0., Vec2::new(1., 0.), Vec2::new_zero()),
        ];
        update_forces(&mut bodies, 1.0, 0.0);
        assert_eq!(bodies[0].accel, Vec2::new_zero());
    }

    #[test]
    fn per_body_potentials_match_a_manual_point_query() {
        let bodies = vec![
            Body::new(2., Vec2::new(-1., 0.), Vec2::new_zero()),
            Body::new(3., Vec2::new(1., 0.), Vec2::new_zero()),
        ];
        let per_body = direct_potentials(&bodies, 1.0);
        let manual = potential_at(bodies[0].posit, &[bodies[1]], 1.0);
        assert!((per_body[0] - manual).abs() < 1e-12);
    }

    #[test]
    fn bh_force_converges_to_direct_as_theta_shrinks() {
        use crate::{barnes_hut::BHTree, quad::Quad};
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        let n = 100;
        let mut bodies: Vec<Body> = (0..n)
            .map(|_| {
                let x = rng.random_range(-5.0..5.0);
                let y = rng.random_range(-5.0..5.0);
                Body::new(1.0, Vec2::new(x, y), Vec2::new_zero())
            })
            .collect();

        let mut direct_bodies = bodies.clone();
        update_forces(&mut direct_bodies, 1.0, 0.0);

        let universe = Quad::new(Vec2::new(-10., -10.), 20.);
        let mut tree = BHTree::with_limits(universe, 0, 24, 1);
        for (i, b) in bodies.iter().enumerate() {
            tree.insert(i, *b);
        }
        for (i, b) in bodies.iter_mut().enumerate() {
            tree.update_force(i, b, 0.1, 1.0, 0.0);
        }

        let mut rel_errors: Vec<f64> = Vec::with_capacity(n);
        for i in 0..n {
            let exact = direct_bodies[i].accel;
            let approx = bodies[i].accel;
            let err = (approx - exact).norm() / exact.norm().max(1e-12);
            rel_errors.push(err);
        }
        rel_errors.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let median = rel_errors[rel_errors.len() / 2];
        let max = *rel_errors.last().unwrap();
        assert!(median <= 0.02, "median relative error too high: {median}");
        assert!(max <= 0.1, "max relative error too high: {max}");
    }
}
