//! Run configuration shared by the CLI and the HTTP service.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BoxingError, Result};
use crate::greedy::{GreedyPacker, Metric, run_greedy};
use crate::model::PackingModel;
use crate::neighborhood::{
    GeometryNeighborhood, Neighborhood, NeighborhoodKind, OrderNeighborhood, OverlapNeighborhood,
};
use crate::search::{SearchConfig, SearchStatus, SolveOutcome, default_threads, run_local_search};
use crate::types::Bin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    #[default]
    Greedy,
    LocalSearch,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Greedy => f.write_str("greedy"),
            Method::LocalSearch => f.write_str("local-search"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveConfig {
    pub method: Method,
    pub metric: Metric,
    pub neighborhood: NeighborhoodKind,

    pub box_size: u32,
    pub item_count: usize,
    pub item_size_min: u32,
    pub item_size_max: u32,
    pub seed: u64,

    /// Cells an item may move per step.
    pub window: u32,
    /// Boxes an item may move per step.
    pub box_window: usize,
    pub desired_iter: u64,
    pub energy_cycle: usize,

    pub iter_max: Option<u64>,
    /// Seconds.
    pub time_max: Option<f64>,
    pub threads: Option<usize>,
    pub record_log: bool,
    /// Keep searching past the limits until the solution is feasible.
    pub return_good: bool,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            method: Method::Greedy,
            metric: Metric::Area,
            neighborhood: NeighborhoodKind::Geometry,
            box_size: 10,
            item_count: 100,
            item_size_min: 1,
            item_size_max: 5,
            seed: 0,
            window: 1,
            box_window: 1,
            desired_iter: 100,
            energy_cycle: 1,
            iter_max: None,
            time_max: None,
            threads: None,
            record_log: false,
            return_good: true,
        }
    }
}

fn invalid(message: impl Into<String>) -> BoxingError {
    BoxingError::InvalidConfiguration(message.into())
}

impl SolveConfig {
    pub fn validate(&self) -> Result<()> {
        if self.box_size == 0 {
            return Err(invalid("box size must be non-zero"));
        }
        if self.item_size_min == 0 {
            return Err(invalid("minimum item size must be non-zero"));
        }
        if self.item_size_min > self.item_size_max {
            return Err(invalid(format!(
                "minimum item size {} exceeds maximum {}",
                self.item_size_min, self.item_size_max
            )));
        }
        if self.energy_cycle == 0 {
            return Err(invalid("energy cycle must be at least 1"));
        }
        if self.desired_iter == 0 {
            return Err(invalid("desired iteration count must be at least 1"));
        }
        if self.threads == Some(0) {
            return Err(invalid("thread count must be at least 1"));
        }
        self.time_limit()?;
        Ok(())
    }

    /// The time limit as a `Duration`, rejecting negative, NaN and
    /// unrepresentable values.
    pub fn time_limit(&self) -> Result<Option<Duration>> {
        self.time_max
            .map(|t| {
                Duration::try_from_secs_f64(t)
                    .map_err(|_| invalid(format!("invalid time limit {}", t)))
            })
            .transpose()
    }

    pub fn search_config(&self) -> Result<SearchConfig> {
        Ok(SearchConfig {
            iter_max: self.iter_max,
            time_max: self.time_limit()?,
            threads: self.threads.unwrap_or_else(default_threads),
            seed: self.seed,
            record_log: self.record_log,
            return_good: self.return_good,
        })
    }

    pub fn model(&self) -> Result<PackingModel> {
        PackingModel::generate(
            self.box_size,
            self.item_count,
            self.item_size_min,
            self.item_size_max,
            self.seed,
        )
    }
}

/// Summary of a run, ready for printing or serialization.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub method: Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<NeighborhoodKind>,
    pub box_size: u32,
    pub item_count: usize,
    pub boxes: Vec<Bin>,
    pub elapsed_secs: f64,
    pub iterations: u64,
    pub occupation_percent: f64,
    pub status: SearchStatus,
    pub feasible: bool,
    /// Boxes of every accepted state, when logging was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<Vec<Bin>>>,
}

impl Report {
    pub fn box_count(&self) -> usize {
        self.boxes.len()
    }

    /// Share of one box's area covered by its items, in percent.
    pub fn box_occupation_percent(&self, bin: &Bin) -> f64 {
        let used: u64 = bin.placements.iter().map(|p| p.area()).sum();
        let side = self.box_size as f64;
        used as f64 / (side * side) * 100.0
    }
}

/// Validates the configuration, runs the selected solver and checks the
/// result.
pub fn solve(config: &SolveConfig) -> Result<Report> {
    config.validate()?;
    let model = config.model()?;
    model.ensure_items_fit()?;

    match config.method {
        Method::Greedy => {
            let packer = GreedyPacker::new(model, config.metric);
            let outcome = run_greedy(&packer, config.record_log)?;
            let feasible = check_feasible(packer.model(), &outcome.solution, true)?;
            Ok(build_report(config, None, packer.model(), outcome, |s| s.clone(), feasible))
        }
        Method::LocalSearch => {
            let search = config.search_config()?;
            match config.neighborhood {
                NeighborhoodKind::Geometry => {
                    let strategy = GeometryNeighborhood::new(
                        model,
                        config.window,
                        config.box_window,
                        config.energy_cycle,
                    )?;
                    local_search_report(config, &strategy, strategy.model(), &search)
                }
                NeighborhoodKind::Order => {
                    let strategy =
                        OrderNeighborhood::new(model, config.window as usize, config.energy_cycle)?;
                    local_search_report(config, &strategy, strategy.model(), &search)
                }
                NeighborhoodKind::GeometryOverlap => {
                    let strategy = OverlapNeighborhood::new(
                        model,
                        config.window,
                        config.box_window,
                        config.desired_iter,
                        config.energy_cycle,
                    )?;
                    local_search_report(config, &strategy, strategy.model(), &search)
                }
            }
        }
    }
}

fn local_search_report<N: Neighborhood>(
    config: &SolveConfig,
    strategy: &N,
    model: &PackingModel,
    search: &SearchConfig,
) -> Result<Report> {
    let outcome = run_local_search(strategy, search);
    let boxes = strategy.get_boxes(&outcome.solution);
    let claimed = strategy.good(&outcome.solution);
    let feasible = check_feasible(model, &boxes, claimed)?;
    Ok(build_report(
        config,
        Some(config.neighborhood),
        model,
        outcome,
        |s| strategy.get_boxes(s),
        feasible,
    ))
}

/// Overlap check on the final boxes. A solution the strategy reports as
/// feasible must pass it.
fn check_feasible(model: &PackingModel, boxes: &[Bin], claimed: bool) -> Result<bool> {
    let placed: usize = boxes.iter().map(|b| b.len()).sum();
    if placed != model.items().len() {
        return Err(BoxingError::InvariantBroken(format!(
            "{} of {} items placed",
            placed,
            model.items().len()
        )));
    }
    let overlapping = model.has_overlaps(boxes);
    if claimed && overlapping {
        return Err(BoxingError::InvariantBroken(
            "solution reported as feasible has overlapping items".to_string(),
        ));
    }
    Ok(!overlapping)
}

fn build_report<S>(
    config: &SolveConfig,
    neighborhood: Option<NeighborhoodKind>,
    model: &PackingModel,
    outcome: SolveOutcome<S>,
    to_boxes: impl Fn(&S) -> Vec<Bin>,
    feasible: bool,
) -> Report {
    let boxes = to_boxes(&outcome.solution);
    let history = config
        .record_log
        .then(|| outcome.log.iter().map(&to_boxes).collect());
    Report {
        method: config.method,
        neighborhood,
        box_size: model.box_size(),
        item_count: model.items().len(),
        occupation_percent: model.occupation_percent(&boxes),
        boxes,
        elapsed_secs: outcome.elapsed.as_secs_f64(),
        iterations: outcome.iterations,
        status: outcome.status,
        feasible,
        history,
    }
}
