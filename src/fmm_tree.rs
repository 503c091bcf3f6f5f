//! Balanced Fast Multipole Method quadtree (C5). A complete tree of uniform
//! height is built up front (no adaptive refinement), then swept upward
//! (building multipole expansions from the leaves up) and downward
//! (converting well-separated interactions into local expansions and
//! shifting them down to the leaves). Grounded on
//! `balanced_fmm_tree.hpp`/`abstract_fmm_tree.hpp`.

use rayon::prelude::*;

use crate::{
    error::GeometryError,
    expansion::{LocalExpansion, MultipoleExpansion},
    kernel,
    quad::Quad,
    vector::Vec2,
    Body,
};

/// Padding applied to the tight bounding box of the input bodies, so that no
/// body lands exactly on a cell boundary.
const BOUNDING_PAD: f64 = 1e-5;

/// Adjacency tolerance, as a fraction of the box side length, used when
/// classifying a same-depth pair as near (touching) vs. well-separated.
const ADJACENCY_TOL: f64 = 1.01;

/// Below this multiple of the box length, an interaction-list candidate is
/// considered a geometry fault rather than well separated.
const MIN_INTERACTION_SEPARATION: f64 = 1.99;

struct FmmNode {
    quad: Quad,
    me: MultipoleExpansion,
    le: LocalExpansion,
    /// Indices, within this node's own depth level, of same-depth neighbors
    /// sharing an edge or corner (including itself).
    near: Vec<usize>,
    /// Indices, within this node's own depth level, of same-depth nodes that
    /// are well separated from their shared parent's near neighbors.
    interaction: Vec<usize>,
    /// `(body index, mass, position)` contained in this node. `Some` only at
    /// the leaf level (depth == tree height).
    sources: Option<Vec<(usize, f64, Vec2)>>,
}

impl FmmNode {
    fn blank(quad: Quad, order: usize) -> Self {
        let center = quad.center();
        Self {
            quad,
            me: MultipoleExpansion::from_sources(center, order, &[]),
            le: LocalExpansion::zero(center, order),
            near: Vec::new(),
            interaction: Vec::new(),
            sources: None,
        }
    }
}

/// A complete, uniform-height FMM tree built over a fixed set of bodies.
pub struct FmmTree {
    height: usize,
    order: usize,
    universe: Quad,
    /// `levels[d]` holds the `4^d` nodes at depth `d`, in the linearized
    /// quadrant-path order produced by recursive NW/NE/SW/SE subdivision.
    levels: Vec<Vec<FmmNode>>,
}

/// Derives the bounding square covering every body, padded so no body sits
/// exactly on an edge.
fn bounding_square(bodies: &[(usize, Body)]) -> Quad {
    let mut min = Vec2::new(f64::INFINITY, f64::INFINITY);
    let mut max = Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (_, b) in bodies {
        min.x = min.x.min(b.posit.x);
        min.y = min.y.min(b.posit.y);
        max.x = max.x.max(b.posit.x);
        max.y = max.y.max(b.posit.y);
    }
    if !min.x.is_finite() {
        // No bodies: fall back to a unit square at the origin.
        min = Vec2::new_zero();
        max = Vec2::new(1., 1.);
    }
    let extent_x = (max.x - min.x).max(0.);
    let extent_y = (max.y - min.y).max(0.);
    let side = extent_x.max(extent_y).max(1.);
    let pad = side * BOUNDING_PAD;
    let side = side + 2. * pad;
    let cx = (min.x + max.x) / 2.;
    let cy = (min.y + max.y) / 2.;
    Quad::new(Vec2::new(cx - side / 2., cy - side / 2.), side)
}

/// Tree height `H = ceil(log4(N / items_per_cell))`, floored at 0.
fn derive_height(n: usize, items_per_cell: usize) -> usize {
    if n <= items_per_cell || items_per_cell == 0 {
        return 0;
    }
    let ratio = n as f64 / items_per_cell as f64;
    (ratio.log2() / 2.0).ceil().max(0.) as usize
}

/// Expansion order `p = ceil(log2(A / eps))`, where `A` is the total
/// absolute charge (sum of `|mass|` over all bodies) and `eps` the target
/// accuracy.
fn derive_order(total_abs_charge: f64, eps: f64) -> usize {
    if eps <= 0. || total_abs_charge <= 0. {
        return 1;
    }
    ((total_abs_charge / eps).log2().ceil().max(1.)) as usize
}

fn adjacent(a: Vec2, b: Vec2, box_length: f64) -> bool {
    (a.x - b.x).abs() <= box_length * ADJACENCY_TOL && (a.y - b.y).abs() <= box_length * ADJACENCY_TOL
}

impl FmmTree {
    /// Builds a complete FMM tree over `bodies`, each tagged with its index
    /// in the caller's original body array (so the self-skip guard in
    /// `update_force` lines up even when out-of-universe bodies were
    /// excluded before calling this). `items_per_cell` drives the tree
    /// height, `eps` the expansion order.
    pub fn build(
        bodies: &[(usize, Body)],
        items_per_cell: usize,
        eps: f64,
    ) -> Result<Self, GeometryError> {
        let universe = bounding_square(bodies);
        let height = derive_height(bodies.len(), items_per_cell.max(1));
        let total_abs_charge: f64 = bodies.iter().map(|(_, b)| b.mass.abs()).sum();
        let order = derive_order(total_abs_charge, eps);

        let mut levels: Vec<Vec<FmmNode>> = Vec::with_capacity(height + 1);
        levels.push(vec![FmmNode::blank(universe, order)]);
        for _d in 0..height {
            let parent_level = levels.last().unwrap();
            let mut next = Vec::with_capacity(parent_level.len() * 4);
            for parent in parent_level {
                for child_quad in parent.quad.children() {
                    next.push(FmmNode::blank(child_quad, order));
                }
            }
            levels.push(next);
        }

        let mut tree = Self {
            height,
            order,
            universe,
            levels,
        };

        tree.distribute_bodies(bodies);
        tree.build_neighborhoods()?;
        tree.upward_pass();
        tree.downward_pass();
        Ok(tree)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Walks the quadrant path from the root to the leaf containing `point`,
    /// returning its flat index within `levels[height]`.
    fn leaf_path_index(&self, point: Vec2) -> usize {
        let mut quad = self.universe;
        let mut index = 0usize;
        for _ in 0..self.height {
            let digit = quad.child_index_for(point);
            index = index * 4 + digit;
            quad = quad.children()[digit];
        }
        index
    }

    fn distribute_bodies(&mut self, bodies: &[(usize, Body)]) {
        let leaf_level = &mut self.levels[self.height];
        for node in leaf_level.iter_mut() {
            node.sources = Some(Vec::new());
        }
        for &(i, b) in bodies {
            let leaf_idx = {
                let mut quad = self.universe;
                let mut index = 0usize;
                for _ in 0..self.height {
                    let digit = quad.child_index_for(b.posit);
                    index = index * 4 + digit;
                    quad = quad.children()[digit];
                }
                index
            };
            leaf_level[leaf_idx]
                .sources
                .as_mut()
                .unwrap()
                .push((i, b.mass, b.posit));
        }
    }

    /// Computes near-neighbor and interaction lists for every level, via the
    /// standard parent-near-neighbor expansion.
    fn build_neighborhoods(&mut self) -> Result<(), GeometryError> {
        // Depth 0: the root is its own (only) near neighbor.
        self.levels[0][0].near = vec![0];

        for d in 1..=self.height {
            let box_length = self.levels[d][0].quad.side_length;
            let parent_near: Vec<Vec<usize>> =
                self.levels[d - 1].iter().map(|p| p.near.clone()).collect();
            let centers: Vec<Vec2> = self.levels[d].iter().map(|n| n.quad.center()).collect();

            let mut near_lists = vec![Vec::new(); self.levels[d].len()];
            let mut interaction_lists = vec![Vec::new(); self.levels[d].len()];
            for (idx, center) in centers.iter().enumerate() {
                let parent_idx = idx / 4;
                let mut near = Vec::new();
                let mut interaction = Vec::new();
                for &p_near in &parent_near[parent_idx] {
                    for sibling in 0..4 {
                        let candidate = p_near * 4 + sibling;
                        let cand_center = centers[candidate];
                        if adjacent(*center, cand_center, box_length) {
                            near.push(candidate);
                        } else {
                            let distance = (*center - cand_center).norm();
                            if distance < MIN_INTERACTION_SEPARATION * box_length {
                                return Err(GeometryError::InteractionListTooClose {
                                    distance,
                                    box_length,
                                    depth: d,
                                });
                            }
                            interaction.push(candidate);
                        }
                    }
                }
                near_lists[idx] = near;
                interaction_lists[idx] = interaction;
            }

            for (node, (near, interaction)) in self.levels[d]
                .iter_mut()
                .zip(near_lists.into_iter().zip(interaction_lists))
            {
                node.near = near;
                node.interaction = interaction;
            }
        }
        Ok(())
    }

    /// Builds leaf MEs from their contained sources, then sums children MEs
    /// upward through depth 2 (depths 0 and 1 never receive an ME: their
    /// interaction lists are always empty, so nothing downstream reads it).
    fn upward_pass(&mut self) {
        let order = self.order;
        {
            let leaf_level = &mut self.levels[self.height];
            leaf_level.par_iter_mut().for_each(|node| {
                let center = node.quad.center();
                let sources: Vec<(f64, Vec2)> = node
                    .sources
                    .as_ref()
                    .unwrap()
                    .iter()
                    .map(|&(_, m, p)| (m, p))
                    .collect();
                node.me = MultipoleExpansion::from_sources(center, order, &sources);
            });
        }

        if self.height < 2 {
            return;
        }
        for d in (2..=self.height.saturating_sub(1)).rev() {
            let (upper, lower) = self.levels.split_at_mut(d + 1);
            let parent_level = &mut upper[d];
            let child_level = &lower[0];
            parent_level.par_iter_mut().enumerate().for_each(|(idx, parent)| {
                let children: Vec<&MultipoleExpansion> = (0..4)
                    .map(|c| &child_level[idx * 4 + c].me)
                    .collect();
                parent.me = MultipoleExpansion::from_children(parent.quad.center(), &children);
            });
        }
    }

    /// Converts each node's interaction-list MEs into a local expansion and
    /// shifts its parent's LE down, for depths 2..=height (depths 0 and 1
    /// keep their zero-initialized LE, since their interaction lists are
    /// always empty).
    fn downward_pass(&mut self) {
        if self.height < 2 {
            return;
        }
        for d in 2..=self.height {
            // Snapshot this level's MEs (fixed since the upward pass) so the
            // interaction-list lookups below don't alias the LE writes.
            let mes: Vec<MultipoleExpansion> = self.levels[d].iter().map(|n| n.me.clone()).collect();

            let (upper, lower) = self.levels.split_at_mut(d);
            let parent_level = &upper[d - 1];
            let this_level = &mut lower[0];
            this_level.par_iter_mut().enumerate().for_each(|(idx, node)| {
                let parent_idx = idx / 4;
                let mut le = LocalExpansion::shift_from_parent(
                    &parent_level[parent_idx].le,
                    node.quad.center(),
                );
                if !node.interaction.is_empty() {
                    let incoming: Vec<&MultipoleExpansion> =
                        node.interaction.iter().map(|&j| &mes[j]).collect();
                    if let Some(m2l) = LocalExpansion::from_multipole_list(node.quad.center(), &incoming) {
                        le += m2l;
                    }
                }
                node.le = le;
            });
        }
    }

    fn near_neighbor_sources(&self, leaf_idx: usize) -> Vec<(usize, f64, Vec2)> {
        let leaf_level = &self.levels[self.height];
        let mut out = Vec::new();
        for &n in &leaf_level[leaf_idx].near {
            out.extend(leaf_level[n].sources.as_ref().unwrap().iter().copied());
        }
        out
    }

    /// Acceleration on `target` (the body at `target_index`), combining the
    /// far-field local expansion at its leaf with a direct near-neighbor sum.
    /// The far-field LE is pure unscaled series algebra, so `g` is applied
    /// here at the engine boundary, same as the near-field's softened
    /// kernel.
    pub fn update_force(&self, target_index: usize, target: &mut Body, g: f64, eps_soft: f64) {
        let leaf_idx = self.leaf_path_index(target.posit);
        let leaf = &self.levels[self.height][leaf_idx];
        target.accel += leaf.le.evaluate_force(target.posit) * g;
        for (idx, mass, posit) in self.near_neighbor_sources(leaf_idx) {
            if idx == target_index || mass <= 0. {
                continue;
            }
            if let Some(a) = kernel::softened_accel(mass, posit, target, g, eps_soft) {
                target.accel += a;
            }
        }
    }

    /// Potential at an arbitrary point (not assumed to be one of the bodies),
    /// used for oracle comparisons against the direct kernel. Near-neighbor
    /// contributions use the same `q * ln(r)` form as the multipole/local
    /// expansion potential, not the inverse-square convention used by the
    /// near-field acceleration kernel, so the FMM's own near/far split
    /// agrees on one potential law.
    pub fn evaluate_potential(&self, point: Vec2, g: f64) -> f64 {
        let leaf_idx = self.leaf_path_index(point);
        let leaf = &self.levels[self.height][leaf_idx];
        let mut total = leaf.le.evaluate_potential(point) * g;
        for (_, mass, posit) in self.near_neighbor_sources(leaf_idx) {
            let r = (posit - point).norm().max(kernel::DIST_FLOOR);
            total += g * mass * r.ln();
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn grid_bodies(n_per_side: usize) -> Vec<Body> {
        let mut bodies = Vec::with_capacity(n_per_side * n_per_side);
        for i in 0..n_per_side {
            for j in 0..n_per_side {
                let x = -5. + 10. * (i as f64) / (n_per_side as f64 - 1.);
                let y = -5. + 10. * (j as f64) / (n_per_side as f64 - 1.);
                bodies.push(Body::new(1.0, Vec2::new(x, y), Vec2::new_zero()));
            }
        }
        bodies
    }

    #[test]
    fn interaction_list_partners_are_well_separated() {
        let bodies = grid_bodies(20);
        let tree = FmmTree::build(
            &bodies.iter().cloned().enumerate().collect::<Vec<_>>(),
            16,
            1e-2,
        )
        .unwrap();
        for level in tree.levels.iter().skip(2) {
            let box_length = level[0].quad.side_length;
            for node in level {
                for &partner in &node.interaction {
                    let d = (node.quad.center() - level[partner].quad.center()).norm();
                    assert!(
                        d >= 2. * box_length - 1e-9,
                        "interaction partner at {d}, expected >= {}",
                        2. * box_length
                    );
                }
            }
        }
    }

    #[test]
    fn near_neighbors_include_self_and_are_adjacent() {
        let bodies = grid_bodies(20);
        let tagged: Vec<_> = bodies.iter().cloned().enumerate().collect();
        let tree = FmmTree::build(&tagged, 16, 1e-2).unwrap();
        for level in tree.levels.iter().skip(1) {
            let box_length = level[0].quad.side_length;
            for (idx, node) in level.iter().enumerate() {
                assert!(node.near.contains(&idx));
                for &n in &node.near {
                    assert!(adjacent(node.quad.center(), level[n].quad.center(), box_length));
                }
            }
        }
    }

    #[test]
    fn rebuild_from_same_bodies_is_bit_identical() {
        let bodies = grid_bodies(12);
        let tagged: Vec<_> = bodies.iter().cloned().enumerate().collect();
        let t1 = FmmTree::build(&tagged, 8, 1e-2).unwrap();
        let t2 = FmmTree::build(&tagged, 8, 1e-2).unwrap();
        assert_eq!(t1.height, t2.height);
        assert_eq!(t1.order, t2.order);
        for (l1, l2) in t1.levels.iter().zip(&t2.levels) {
            for (n1, n2) in l1.iter().zip(l2) {
                for k in 0..=t1.order {
                    assert_eq!(n1.me.coeff(k), n2.me.coeff(k));
                }
            }
        }
    }

    #[test]
    fn fmm_potential_converges_toward_log_kernel_direct_sum() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 300;
        let bodies: Vec<Body> = (0..n)
            .map(|_| {
                let x = rng.random_range(-5.0..5.0);
                let y = rng.random_range(-5.0..5.0);
                Body::new(1.0, Vec2::new(x, y), Vec2::new_zero())
            })
            .collect();
        let tagged: Vec<_> = bodies.iter().cloned().enumerate().collect();
        let eps = 1e-4;
        let tree = FmmTree::build(&tagged, 32, eps).unwrap();

        let eval_point = Vec2::new(0.37, -1.21);
        let direct: f64 = bodies
            .iter()
            .map(|b| {
                let r = (b.posit - eval_point).norm().max(kernel::DIST_FLOOR);
                b.mass * r.ln()
            })
            .sum();
        let approx = tree.evaluate_potential(eval_point, 1.0);
        assert_relative_eq!(approx, direct, max_relative = 0.05);
    }

    #[test]
    fn height_and_order_scale_with_body_count_and_accuracy() {
        assert_eq!(derive_height(100, 128), 0);
        assert_eq!(derive_height(2048, 128), 2);
        assert_eq!(derive_order(0.0, 1e-2), 1);
        assert!(derive_order(100.0, 1e-2).ge(&derive_order(10.0, 1e-2)));
    }

    #[test]
    fn geometry_error_reports_the_offending_distance() {
        // The balanced tree's own construction never produces this fault (it
        // always keeps interaction partners >= ~2 box-lengths apart by
        // construction), so this exercises the error type's reporting
        // directly rather than trying to force the guard through `build`.
        let err = GeometryError::InteractionListTooClose {
            distance: 1.5,
            box_length: 1.0,
            depth: 3,
        };
        let message = err.to_string();
        assert!(message.contains("1.5"));
        assert!(message.contains("depth 3"));
    }
}
