//! Elastic collision handling (C6): swept-sphere time-to-contact detection
//! followed by a 1D along-normal restitution exchange. At most one collision
//! is resolved per pair per step. Grounded on `CollisionHandler.hpp`.

use crate::Body;

/// Two bodies closer than this are considered to be in contact.
const COLLISION_DISTANCE: f64 = 1e-6;

/// Below this remaining fraction of the step, the post-collision drift is
/// skipped rather than applying a near-zero position update.
const EPSILON: f64 = 1e-8;

/// 1.0 = perfectly elastic.
const RESTITUTION: f64 = 1.0;

/// Time within `[0, time_step)` at which `body1` and `body2` first come
/// within `COLLISION_DISTANCE` of each other, assuming both drift at their
/// current velocity. `None` if they're separating, or never meet within the
/// step.
fn time_to_contact(body1: &Body, body2: &Body, time_step: f64) -> Option<f64> {
    let r = body1.posit - body2.posit;
    let v = body1.vel - body2.vel;

    if r.dot(v) >= 0. {
        return None;
    }

    let a = v.dot(v);
    let b = 2. * r.dot(v);
    let c = r.dot(r) - COLLISION_DISTANCE * COLLISION_DISTANCE;

    let discriminant = b * b - 4. * a * c;
    if discriminant < 0. {
        return None;
    }

    let t = (-b - discriminant.sqrt()) / (2. * a);
    if t > 0. && t < time_step {
        Some(t)
    } else {
        None
    }
}

/// Post-collision velocity for `body1`, given its partner `body2`, via a 1D
/// elastic exchange along the collision normal with the tangential
/// component preserved.
fn collision_velocity(body1: &Body, body2: &Body) -> crate::vector::Vec2 {
    let m1 = body1.mass;
    let m2 = body2.mass;
    let v1 = body1.vel;
    let v2 = body2.vel;
    let r = (body1.posit - body2.posit) / (body1.posit - body2.posit).norm();

    let v1n = v1.dot(r);
    let v2n = v2.dot(r);

    let v1n_new = (m1 * v1n + m2 * v2n + m2 * RESTITUTION * (v2n - v1n)) / (m1 + m2);

    let v1t = v1 - r * v1n;
    v1t + r * v1n_new
}

/// Resolves a single collision between `body1` and `body2` over `time_step`,
/// if their swept trajectories bring them into contact. Returns `true` if a
/// collision was resolved (positions and velocities updated in place),
/// `false` if the pair does not collide this step.
pub fn handle_collision(body1: &mut Body, body2: &mut Body, time_step: f64) -> bool {
    let Some(ct) = time_to_contact(body1, body2, time_step) else {
        return false;
    };

    body1.posit += body1.vel * ct;
    body2.posit += body2.vel * ct;

    let v1_new = collision_velocity(body1, body2);
    let v2_new = collision_velocity(body2, body1);
    body1.vel = v1_new;
    body2.vel = v2_new;

    let remaining = time_step - ct;
    if remaining > EPSILON {
        body1.posit += v1_new * remaining;
        body2.posit += v2_new * remaining;
    }

    true
}

/// Resolves all pairwise collisions among `bodies` over `time_step`, in
/// ascending `i < j` order. Collision resolution is sequential: bodies that
/// already collided this step carry their updated state into later pairs
/// within the same pass.
pub fn resolve_collisions(bodies: &mut [Body], time_step: f64) {
    let n = bodies.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let (left, right) = bodies.split_at_mut(j);
            handle_collision(&mut left[i], &mut right[0], time_step);
        }
    }
}
