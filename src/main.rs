use boxing::config::{Method, SolveConfig, solve};
use boxing::greedy::Metric;
use boxing::neighborhood::NeighborhoodKind;
use boxing::render;
use clap::Parser;
use tracing::Level;

#[derive(Parser)]
#[command(name = "boxing", about = "Packs random rectangles into as few square boxes as possible")]
struct Cli {
    /// Solver: greedy or local-search
    #[arg(long, default_value = "greedy", value_parser = parse_method)]
    method: Method,

    /// Greedy ordering: max_size, min_size, or area
    #[arg(long, default_value = "area", value_parser = parse_metric)]
    metric: Metric,

    /// Local search neighborhood: geometry, order, or geometry-overlap
    #[arg(long, default_value = "geometry", value_parser = parse_neighborhood)]
    neighborhood: NeighborhoodKind,

    /// Side length of every box
    #[arg(long, default_value_t = 10)]
    box_size: u32,

    /// Number of random items to generate
    #[arg(long, default_value_t = 100)]
    item_count: usize,

    #[arg(long, default_value_t = 1)]
    item_size_min: u32,

    #[arg(long, default_value_t = 5)]
    item_size_max: u32,

    /// Seed for item generation and the search
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Cells an item may move per step (swap distance for order)
    #[arg(long, default_value_t = 1)]
    window: u32,

    /// Boxes an item may move per step
    #[arg(long, default_value_t = 1)]
    box_window: usize,

    /// Iteration at which overlaps stop being tolerated
    #[arg(long, default_value_t = 100)]
    desired_iter: u64,

    /// Number of distinct energy orientations cycled through by box index
    #[arg(long, default_value_t = 1)]
    energy_cycle: usize,

    #[arg(long)]
    iter_max: Option<u64>,

    /// Time limit in seconds
    #[arg(long)]
    time_max: Option<f64>,

    /// Worker threads (default: available parallelism)
    #[arg(long)]
    threads: Option<usize>,

    /// Stop at the limits even when overlaps remain (pass false)
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    return_good: bool,

    /// Output detail: 0 summary, 1 boxes, 2 placements, 3 history
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=3))]
    detail: u8,

    /// Show ASCII layout of each box
    #[arg(long)]
    layout: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Log search progress to stderr
    #[arg(long)]
    verbose: bool,
}

fn parse_method(s: &str) -> Result<Method, String> {
    match s {
        "greedy" => Ok(Method::Greedy),
        "local-search" => Ok(Method::LocalSearch),
        _ => Err(format!(
            "invalid method '{}', expected: greedy or local-search",
            s
        )),
    }
}

fn parse_metric(s: &str) -> Result<Metric, String> {
    match s {
        "max_size" => Ok(Metric::MaxSize),
        "min_size" => Ok(Metric::MinSize),
        "area" => Ok(Metric::Area),
        _ => Err(format!(
            "invalid metric '{}', expected: max_size, min_size, or area",
            s
        )),
    }
}

fn parse_neighborhood(s: &str) -> Result<NeighborhoodKind, String> {
    match s {
        "geometry" => Ok(NeighborhoodKind::Geometry),
        "order" => Ok(NeighborhoodKind::Order),
        "geometry-overlap" => Ok(NeighborhoodKind::GeometryOverlap),
        _ => Err(format!(
            "invalid neighborhood '{}', expected: geometry, order, or geometry-overlap",
            s
        )),
    }
}

impl Cli {
    fn config(&self) -> SolveConfig {
        SolveConfig {
            method: self.method,
            metric: self.metric,
            neighborhood: self.neighborhood,
            box_size: self.box_size,
            item_count: self.item_count,
            item_size_min: self.item_size_min,
            item_size_max: self.item_size_max,
            seed: self.seed,
            window: self.window,
            box_window: self.box_window,
            desired_iter: self.desired_iter,
            energy_cycle: self.energy_cycle,
            iter_max: self.iter_max,
            time_max: self.time_max,
            threads: self.threads,
            record_log: self.detail >= 3,
            return_good: self.return_good,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_max_level(Level::DEBUG)
            .init();
    }

    let report = solve(&cli.config()).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if cli.detail >= 1 || cli.layout {
        for (i, bin) in report.boxes.iter().enumerate() {
            println!(
                "Box {}: {} item{}, {:.1}% occupied",
                i + 1,
                bin.len(),
                if bin.len() == 1 { "" } else { "s" },
                report.box_occupation_percent(bin),
            );
            if cli.detail >= 2 {
                for p in &bin.placements {
                    let rot = if p.transposed { " [transposed]" } else { "" };
                    println!("  #{} {} @ ({}, {}){}", p.item, p.rect, p.x, p.y, rot);
                }
            }
            if cli.layout {
                print!("{}", render::render_box(report.box_size, bin));
            }
        }
        println!();
    }

    if let Some(history) = &report.history {
        println!("History:");
        for (step, boxes) in history.iter().enumerate() {
            println!("  {}: {} boxes", step, boxes.len());
        }
        println!();
    }

    let label = match report.neighborhood {
        Some(kind) => format!("{} ({})", report.method, kind),
        None => format!("{} ({})", report.method, cli.metric),
    };
    println!(
        "Summary: {}, {} box{} used, {:.1}% occupied, {} after {} iteration{} in {:.3}s{}",
        label,
        report.box_count(),
        if report.box_count() == 1 { "" } else { "es" },
        report.occupation_percent,
        report.status,
        report.iterations,
        if report.iterations == 1 { "" } else { "s" },
        report.elapsed_secs,
        if report.feasible { "" } else { ", overlaps remain" },
    );
}
