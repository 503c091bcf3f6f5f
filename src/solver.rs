//! N-body solver (C8): orchestrates one velocity-Verlet (kick-drift-kick)
//! step over a tagged force engine, with optional collision resolution and
//! energy tracking. Grounded on `NbodySolver::step` for the state machine;
//! the force engine is a tagged variant rather than a trait-object
//! hierarchy.

use rayon::prelude::*;

use crate::{
    barnes_hut::BHTree, collision, energy, error::GeometryError, fmm_tree::FmmTree, quad::Quad, Body,
};

/// Which force approximation drives a step, and its tuning parameters.
#[derive(Debug, Clone, Copy)]
pub enum ForceEngine {
    BarnesHut {
        theta: f64,
        max_depth: usize,
        max_leaves: usize,
    },
    Fmm {
        items_per_cell: usize,
        eps: f64,
        eps_s: f64,
    },
}

/// All parameters for a solver instance. Immutable across steps; no global
/// mutable configuration.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    pub universe: Quad,
    pub time_step: f64,
    pub engine: ForceEngine,
    pub g: f64,
    pub collisions_enabled: bool,
    pub energy_tracking: bool,
}

impl SolverConfig {
    pub fn new(universe: Quad, time_step: f64, engine: ForceEngine) -> Self {
        Self {
            universe,
            time_step,
            engine,
            g: 1.0,
            collisions_enabled: false,
            energy_tracking: false,
        }
    }
}

pub struct Solver {
    pub config: SolverConfig,
    pub bodies: Vec<Body>,
}

impl Solver {
    pub fn new(config: SolverConfig, bodies: Vec<Body>) -> Self {
        Self { config, bodies }
    }

    /// Zeroes every body's acceleration, then queries the configured force
    /// engine to accumulate a fresh one. Bodies outside `universe` are
    /// skipped during tree insertion (their acceleration stays zero this
    /// step) but are never removed from `self.bodies`.
    fn refresh_accelerations(&mut self) -> Result<(), GeometryError> {
        for b in self.bodies.iter_mut() {
            b.accel = crate::vector::Vec2::new_zero();
        }

        match self.config.engine {
            ForceEngine::BarnesHut {
                theta,
                max_depth,
                max_leaves,
            } => {
                let mut tree = BHTree::with_limits(self.config.universe, 0, max_depth, max_leaves);
                for (i, b) in self.bodies.iter().enumerate() {
                    if self.config.universe.contains(b.posit) {
                        tree.insert(i, *b);
                    }
                }
                let g = self.config.g;
                let snapshot: Vec<Body> = self.bodies.clone();
                self.bodies.par_iter_mut().enumerate().for_each(|(i, b)| {
                    if snapshot[i].mass <= 0. {
                        return;
                    }
                    tree.update_force(i, b, theta, g, 0.0);
                });
            }
            ForceEngine::Fmm {
                items_per_cell,
                eps,
                eps_s,
            } => {
                let in_universe: Vec<(usize, Body)> = self
                    .bodies
                    .iter()
                    .enumerate()
                    .filter(|(_, b)| self.config.universe.contains(b.posit))
                    .map(|(i, b)| (i, *b))
                    .collect();
                let tree = FmmTree::build(&in_universe, items_per_cell, eps)?;
                let g = self.config.g;
                let universe = self.config.universe;
                self.bodies.par_iter_mut().enumerate().for_each(|(i, b)| {
                    if universe.contains(b.posit) {
                        tree.update_force(i, b, g, eps_s);
                    }
                });
            }
        }
        Ok(())
    }

    /// Advances the simulation by one `time_step`, following the
    /// kick-drift-kick state machine.
    pub fn step(&mut self) -> Result<(), GeometryError> {
        let dt = self.config.time_step;

        self.refresh_accelerations()?;
        for b in self.bodies.iter_mut() {
            b.vel += b.accel * (dt / 2.);
        }
        for b in self.bodies.iter_mut() {
            b.posit += b.vel * dt;
        }

        self.refresh_accelerations()?;
        for b in self.bodies.iter_mut() {
            b.vel += b.accel * (dt / 2.);
        }

        if self.config.collisions_enabled {
            collision::resolve_collisions(&mut self.bodies, dt);
        }

        if self.config.energy_tracking {
            energy::update_per_body_energy(&mut self.bodies, self.config.g);
        }

        Ok(())
    }
}
