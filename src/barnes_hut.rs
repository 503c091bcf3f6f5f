//! Barnes-Hut quadtree (C3): a recursive spatial decomposition with a
//! monopole aggregate per node and an opening-angle criterion for force
//! evaluation. O(N log N) per step; simpler to build than FMM (C5), at the
//! cost of looser accuracy control.
//!
//! Bodies carry no identity of their own (C1 defines only mass/position/
//! velocity/acceleration), so nodes index leaf entries by the caller's body
//! index to implement the "skip self" rule in force evaluation.

use crate::{kernel, quad::Quad, vector::Vec2, Body};

pub const DEFAULT_MAX_DEPTH: usize = 6;
pub const DEFAULT_MAX_LEAVES: usize = 4;

enum NodeState {
    /// Zero or more (body index, body) pairs directly owned by this node.
    Leaf(Vec<(usize, Body)>),
    /// Exclusive ownership of the four sub-quadrant children, in NW, NE, SW,
    /// SE order.
    Internal(Box<[BHTree; 4]>),
}

/// A node in the Barnes-Hut tree. The root's `quad` contains every body
/// inserted into the tree.
pub struct BHTree {
    quad: Quad,
    /// Aggregate mass and mass-weighted center-of-mass (and velocity) of
    /// everything stored beneath this node.
    cluster: Body,
    state: NodeState,
    depth: usize,
    max_depth: usize,
    max_leaves: usize,
}

impl BHTree {
    pub fn new(quad: Quad) -> Self {
        Self::with_limits(quad, 0, DEFAULT_MAX_DEPTH, DEFAULT_MAX_LEAVES)
    }

    pub fn with_limits(quad: Quad, depth: usize, max_depth: usize, max_leaves: usize) -> Self {
        Self {
            quad,
            cluster: Body::new(0., Vec2::new_zero(), Vec2::new_zero()),
            state: NodeState::Leaf(Vec::new()),
            depth,
            max_depth,
            max_leaves,
        }
    }

    /// Two-body combine rule: mass-weighted center of mass and velocity.
    fn combine(a: &Body, b: &Body) -> Body {
        let total_mass = a.mass + b.mass;
        if total_mass == 0. {
            return Body::new(0., Vec2::new_zero(), Vec2::new_zero());
        }
        let posit = (a.posit * a.mass + b.posit * b.mass) / total_mass;
        let vel = (a.vel * a.mass + b.vel * b.mass) / total_mass;
        Body::new(total_mass, posit, vel)
    }

    fn recompute_cluster_from_leaves(entries: &[(usize, Body)]) -> Body {
        let mut acc = Body::new(0., Vec2::new_zero(), Vec2::new_zero());
        for (_, b) in entries {
            acc = Self::combine(&acc, b);
        }
        acc
    }

    pub fn insert(&mut self, index: usize, body: Body) {
        match &mut self.state {
            NodeState::Leaf(entries) => {
                entries.push((index, body));
                if entries.len() <= self.max_leaves || self.depth >= self.max_depth {
                    self.cluster = Self::recompute_cluster_from_leaves(entries);
                    return;
                }

                // Subdivide: move every stored entry into its child.
                let quads = self.quad.children();
                let mut children = Box::new([
                    Self::with_limits(quads[0], self.depth + 1, self.max_depth, self.max_leaves),
                    Self::with_limits(quads[1], self.depth + 1, self.max_depth, self.max_leaves),
                    Self::with_limits(quads[2], self.depth + 1, self.max_depth, self.max_leaves),
                    Self::with_limits(quads[3], self.depth + 1, self.max_depth, self.max_leaves),
                ]);
                let stored = std::mem::take(entries);
                for (idx, b) in stored {
                    let child_idx = self.quad.child_index_for(b.posit);
                    children[child_idx].insert(idx, b);
                }
                let clusters: Vec<(usize, Body)> =
                    children.iter().map(|c| (0, c.cluster)).collect();
                self.cluster = Self::recompute_cluster_from_leaves(&clusters);
                self.state = NodeState::Internal(children);
            }
            NodeState::Internal(children) => {
                self.cluster = Self::combine(&self.cluster, &body);
                let child_idx = self.quad.child_index_for(body.posit);
                children[child_idx].insert(index, body);
            }
        }
    }

    /// Accumulates the acceleration on `target` (identified by `target_index`
    /// in the original body array) into `target.accel`.
    pub fn update_force(&self, target_index: usize, target: &mut Body, theta: f64, g: f64, eps_soft: f64) {
        match &self.state {
            NodeState::Leaf(entries) => {
                for (idx, src) in entries {
                    if *idx == target_index || src.mass <= 0. {
                        continue;
                    }
                    if let Some(a) = kernel::softened_accel(src.mass, src.posit, target, g, eps_soft) {
                        target.accel += a;
                    }
                }
            }
            NodeState::Internal(children) => {
                let r = self.cluster.posit - target.posit;
                let dist = r.norm();
                if dist > 0. && self.quad.side_length / dist < theta {
                    if let Some(a) =
                        kernel::softened_accel(self.cluster.mass, self.cluster.posit, target, g, eps_soft)
                    {
                        target.accel += a;
                    }
                } else {
                    for child in children.iter() {
                        child.update_force(target_index, target, theta, g, eps_soft);
                    }
                }
            }
        }
    }

    pub fn root_cluster(&self) -> &Body {
        &self.cluster
    }

    #[cfg(test)]
    fn is_internal(&self) -> bool {
        matches!(self.state, NodeState::Internal(_))
    }
}
