//! Local search strategies over packing solutions.

mod geometry;
mod order;
mod overlap;

pub use geometry::{BitmapWindow, GeometryNeighborhood};
pub use order::OrderNeighborhood;
pub use overlap::{OVERLAP_PENALTY, OverlapNeighborhood};

use std::ops::Range;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{BoxingError, Result};
use crate::types::{Bin, Placement};

/// Which neighborhood the local search explores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NeighborhoodKind {
    #[default]
    Geometry,
    Order,
    GeometryOverlap,
}

impl std::fmt::Display for NeighborhoodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NeighborhoodKind::Geometry => "geometry",
            NeighborhoodKind::Order => "order",
            NeighborhoodKind::GeometryOverlap => "geometry-overlap",
        };
        f.write_str(name)
    }
}

/// One worker's share of a neighbor generation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Worker {
    pub id: usize,
    pub count: usize,
}

impl Worker {
    pub fn single() -> Self {
        Self { id: 0, count: 1 }
    }

    /// The contiguous slice of `0..len` owned by this worker. Slices of all
    /// workers partition `0..len` in id order.
    pub fn range(&self, len: usize) -> Range<usize> {
        len * self.id / self.count..len * (self.id + 1) / self.count
    }
}

/// A problem the local search can walk. The heuristic is minimized.
pub trait Neighborhood: Sync {
    type Solution: Clone + Send + Sync;

    fn initial(&self, seed: u64) -> Self::Solution;

    /// Candidates reachable by one move, restricted to `worker`'s slice.
    fn neighbors(
        &self,
        solution: &Self::Solution,
        worker: Worker,
        rng: &mut StdRng,
    ) -> Vec<Self::Solution>;

    fn heuristic(&self, solution: &Self::Solution, iteration: u64) -> f64;

    /// Feasibility gate for termination.
    fn good(&self, solution: &Self::Solution) -> bool;

    fn get_boxes(&self, solution: &Self::Solution) -> Vec<Bin>;

    /// Whether `heuristic` stays the same for every iteration after this one.
    fn is_settled(&self, _iteration: u64) -> bool {
        true
    }
}

pub(crate) fn check_energy_cycle(energy_cycle: usize) -> Result<()> {
    if energy_cycle == 0 {
        return Err(BoxingError::InvalidConfiguration(
            "energy cycle must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Copy of `bins` with placement `index` of box `from` moved to box `to`
/// as `placement`. `to == bins.len()` opens a new box. Emptied boxes are
/// dropped.
pub(crate) fn relocate(
    bins: &[Bin],
    from: usize,
    index: usize,
    to: usize,
    placement: Placement,
) -> Vec<Bin> {
    let mut moved = bins.to_vec();
    if from == to {
        moved[from].placements[index] = placement;
        return moved;
    }
    moved[from].placements.remove(index);
    if to == moved.len() {
        moved.push(Bin::new());
    }
    moved[to].placements.push(placement);
    moved.retain(|b| !b.is_empty());
    moved
}
