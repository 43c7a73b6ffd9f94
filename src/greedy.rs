use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{OpenBin, PackingModel};
use crate::search::{SearchStatus, SolveOutcome};
use crate::types::{Bin, ItemId, Rect};

/// Item ordering key for the greedy packer. Larger weights are packed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    MaxSize,
    MinSize,
    #[default]
    Area,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Metric::MaxSize => "max_size",
            Metric::MinSize => "min_size",
            Metric::Area => "area",
        };
        f.write_str(name)
    }
}

pub struct GreedyPacker {
    model: PackingModel,
    metric: Metric,
}

impl GreedyPacker {
    pub fn new(model: PackingModel, metric: Metric) -> Self {
        Self { model, metric }
    }

    pub fn model(&self) -> &PackingModel {
        &self.model
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn weight(&self, rect: &Rect) -> f64 {
        match self.metric {
            Metric::MaxSize => rect.w.max(rect.h) as f64,
            Metric::MinSize => rect.w.min(rect.h) as f64,
            Metric::Area => rect.area() as f64,
        }
    }

    /// Item ids by descending weight; equal weights keep their model order.
    pub fn order(&self) -> Vec<ItemId> {
        let mut weighted: Vec<(ItemId, f64)> = self
            .model
            .items()
            .iter()
            .enumerate()
            .map(|(id, rect)| (id, self.weight(rect)))
            .collect();
        weighted.sort_by(|a, b| b.1.total_cmp(&a.1));
        weighted.into_iter().map(|(id, _)| id).collect()
    }

    /// Adds one item to the partial solution, returning the receiving box.
    pub fn join(&self, id: ItemId, bins: &mut Vec<OpenBin>) -> Result<usize> {
        self.model.insert_into_any_box(id, bins)
    }
}

fn snapshot(bins: &[OpenBin]) -> Vec<Bin> {
    bins.iter().map(|o| o.bin.clone()).collect()
}

/// Packs every item by descending weight into the first box with room.
pub fn run_greedy(packer: &GreedyPacker, record_log: bool) -> Result<SolveOutcome<Vec<Bin>>> {
    let start = Instant::now();
    let mut bins: Vec<OpenBin> = Vec::new();
    let mut log = Vec::new();
    if record_log {
        log.push(Vec::new());
    }

    let order = packer.order();
    for &id in &order {
        let box_index = packer.join(id, &mut bins)?;
        tracing::trace!(item = id, box_index, "greedy insertion");
        if record_log {
            log.push(snapshot(&bins));
        }
    }

    let elapsed = start.elapsed();
    let solution = snapshot(&bins);
    tracing::info!(
        metric = %packer.metric(),
        boxes = solution.len(),
        items = order.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "greedy packing finished"
    );

    Ok(SolveOutcome {
        solution,
        log,
        elapsed,
        iterations: order.len() as u64,
        status: SearchStatus::Completed,
    })
}
