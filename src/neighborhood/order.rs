use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{Neighborhood, Worker, check_energy_cycle};
use crate::error::Result;
use crate::model::{OpenBin, PackingModel};
use crate::types::{Bin, ItemId};

/// Boxes at or below this occupation have their items scattered.
pub const SPARSE_OCCUPATION: f64 = 0.4;

/// Searches over first-fit insertion orders instead of coordinates.
pub struct OrderNeighborhood {
    model: PackingModel,
    window: usize,
    energy_cycle: usize,
}

impl OrderNeighborhood {
    pub fn new(model: PackingModel, window: usize, energy_cycle: usize) -> Result<Self> {
        model.ensure_items_fit()?;
        check_energy_cycle(energy_cycle)?;
        Ok(Self {
            model,
            window,
            energy_cycle,
        })
    }

    pub fn model(&self) -> &PackingModel {
        &self.model
    }

    fn pack(&self, order: &[ItemId]) -> Vec<OpenBin> {
        self.model.pack_in_order(order)
    }
}

impl Neighborhood for OrderNeighborhood {
    type Solution = Vec<ItemId>;

    fn initial(&self, seed: u64) -> Vec<ItemId> {
        let mut order: Vec<ItemId> = (0..self.model.items().len()).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        order
    }

    fn neighbors(&self, solution: &Vec<ItemId>, worker: Worker, rng: &mut StdRng) -> Vec<Vec<ItemId>> {
        let len = solution.len();
        let positions = worker.range(len);
        let mut neighborhood = Vec::new();

        for i in positions.clone() {
            for j in i + 1..=i.saturating_add(self.window).min(len.saturating_sub(1)) {
                let mut swapped = solution.clone();
                swapped.swap(i, j);
                neighborhood.push(swapped);
            }
        }

        // Items of sparsely filled boxes are moved to a random position.
        let mut bins = Vec::new();
        let home: Vec<usize> = solution
            .iter()
            .map(|&id| self.model.place_first_fit(id, &mut bins))
            .collect();
        let sparse: Vec<bool> = bins
            .iter()
            .map(|open| self.model.occupation(&open.bin) <= SPARSE_OCCUPATION)
            .collect();

        for i in positions {
            if !sparse[home[i]] {
                continue;
            }
            let target = rng.gen_range(0..len);
            if target == i {
                continue;
            }
            let mut moved = solution.clone();
            let id = moved.remove(i);
            moved.insert(target, id);
            neighborhood.push(moved);
        }
        neighborhood
    }

    fn heuristic(&self, solution: &Vec<ItemId>, _iteration: u64) -> f64 {
        self.model.energy(&self.get_boxes(solution), self.energy_cycle)
    }

    fn good(&self, _solution: &Vec<ItemId>) -> bool {
        true
    }

    fn get_boxes(&self, solution: &Vec<ItemId>) -> Vec<Bin> {
        self.pack(solution).into_iter().map(|open| open.bin).collect()
    }
}
