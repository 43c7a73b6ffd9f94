use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::geometry::{clamp_windows, window_moves};
use super::{Neighborhood, Worker, check_energy_cycle, relocate};
use crate::error::{BoxingError, Result};
use crate::model::PackingModel;
use crate::types::Bin;

/// Penalty per unit of excess overlap fraction, in units of `box_size⁵`.
///
/// The smallest non-zero overlap fraction is `1 / box_size²` and moving an
/// item by one box changes the energy by at most `box_size³`, so any
/// penalized overlap outweighs every energy gain.
pub const OVERLAP_PENALTY: f64 = 10.0;

/// Geometric moves that tolerate overlaps early on. The tolerated overlap
/// shrinks linearly to zero at `desired_iter`.
pub struct OverlapNeighborhood {
    model: PackingModel,
    window: u32,
    box_window: usize,
    desired_iter: u64,
    energy_cycle: usize,
    penalty: f64,
}

impl OverlapNeighborhood {
    pub fn new(
        model: PackingModel,
        window: u32,
        box_window: usize,
        desired_iter: u64,
        energy_cycle: usize,
    ) -> Result<Self> {
        model.ensure_items_fit()?;
        check_energy_cycle(energy_cycle)?;
        if desired_iter == 0 {
            return Err(BoxingError::InvalidConfiguration(
                "desired iteration count must be at least 1".to_string(),
            ));
        }
        let (window, box_window) = clamp_windows(&model, window, box_window);
        let penalty = OVERLAP_PENALTY * (model.box_size() as f64).powi(5);
        Ok(Self {
            model,
            window,
            box_window,
            desired_iter,
            energy_cycle,
            penalty,
        })
    }

    pub fn model(&self) -> &PackingModel {
        &self.model
    }

    /// Fraction of overlap tolerated at `iteration`.
    pub fn allowed_overlap(&self, iteration: u64) -> f64 {
        if iteration >= self.desired_iter {
            0.0
        } else {
            (self.desired_iter - iteration) as f64 / self.desired_iter as f64
        }
    }

    /// Sum over overlapping pairs of the overlap fraction beyond `allowed`,
    /// the fraction being relative to the larger item of the pair.
    pub fn excess_overlap(&self, bins: &[Bin], allowed: f64) -> f64 {
        let mut excess = 0.0;
        for bin in bins {
            let ps = &bin.placements;
            for (i, a) in ps.iter().enumerate() {
                for b in &ps[i + 1..] {
                    let overlap = PackingModel::overlap_area(a, b);
                    if overlap == 0 {
                        continue;
                    }
                    let fraction = overlap as f64 / a.area().max(b.area()) as f64;
                    if fraction > allowed {
                        excess += fraction - allowed;
                    }
                }
            }
        }
        excess
    }
}

impl Neighborhood for OverlapNeighborhood {
    type Solution = Vec<Bin>;

    fn initial(&self, seed: u64) -> Vec<Bin> {
        let model = &self.model;
        let side = model.box_size();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut bin = Bin::new();
        for (id, rect) in model.items().iter().enumerate() {
            let x = rng.gen_range(0..=side - rect.w);
            let y = rng.gen_range(0..=side - rect.h);
            bin.placements.push(model.placement(id, x, y, false));
        }
        if bin.is_empty() { Vec::new() } else { vec![bin] }
    }

    fn neighbors(&self, solution: &Vec<Bin>, worker: Worker, _rng: &mut StdRng) -> Vec<Vec<Bin>> {
        let model = &self.model;
        let mut neighborhood = Vec::new();
        for box_i in worker.range(solution.len()) {
            for (rect_i, placement) in solution[box_i].placements.iter().enumerate() {
                let moves = window_moves(model, placement, self.window);
                // The window may reach one past the last box, which opens a new one.
                let first = box_i.saturating_sub(self.box_window);
                let last = box_i.saturating_add(self.box_window).min(solution.len());
                for box_j in first..=last {
                    for candidate in &moves {
                        if box_j == box_i && candidate == placement {
                            continue;
                        }
                        if model.can_place(candidate) {
                            neighborhood.push(relocate(solution, box_i, rect_i, box_j, *candidate));
                        }
                    }
                }
            }
        }
        neighborhood
    }

    fn heuristic(&self, solution: &Vec<Bin>, iteration: u64) -> f64 {
        let allowed = self.allowed_overlap(iteration);
        self.model.energy(solution, self.energy_cycle)
            + self.penalty * self.excess_overlap(solution, allowed)
    }

    fn good(&self, solution: &Vec<Bin>) -> bool {
        !self.model.has_overlaps(solution)
    }

    fn get_boxes(&self, solution: &Vec<Bin>) -> Vec<Bin> {
        solution.clone()
    }

    fn is_settled(&self, iteration: u64) -> bool {
        iteration >= self.desired_iter
    }
}
