//! tof-search CLI Module
//!
//! Command-line interface for running cached searches and inspecting their
//! artifacts.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::cache::{ArtifactStore, FileStore};
use crate::config::RunConfig;
use crate::optimizer::{format_params, SearchResult};
use crate::pipeline::{Pipeline, RunReport};
use crate::training::RandomForestRegressor;
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn bad(s: &str) -> ColoredString    { s.truecolor(235, 100, 100) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "tof-search")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cached randomized hyperparameter search for turnover-frequency regression")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the search for every variant tag (the default)
    Run(RunArgs),

    /// Show the ranked candidates of a stored search
    Inspect {
        /// Search result artifact (rf_reg_<tag>.json)
        artifact: PathBuf,

        /// Number of candidates to list
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,
    },

    /// Show shape and columns of a data file
    Info {
        /// Input data file (CSV or Parquet)
        data: PathBuf,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// JSON run configuration; flags override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Variant tags to run
    #[arg(short, long, value_delimiter = ',')]
    pub tags: Option<Vec<String>>,

    /// Directory holding ml_data_<tag>_steady.csv
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Root directory for <tag>_steady result folders
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// Number of sampled configurations
    #[arg(long)]
    pub n_iter: Option<usize>,

    /// Worker threads; 0 uses every core
    #[arg(long)]
    pub n_jobs: Option<usize>,

    /// Seed for the split, the sampler and the forest
    #[arg(long)]
    pub seed: Option<u64>,

    /// Rerun searches even when results are stored
    #[arg(long, conflicts_with = "reuse")]
    pub remake: bool,

    /// Reuse stored results when present
    #[arg(long)]
    pub reuse: bool,

    /// Continue with the next tag when one fails
    #[arg(long)]
    pub keep_going: bool,
}

impl RunArgs {
    /// Resolve the run configuration: file first, then flags
    pub fn to_config(&self) -> crate::Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)?,
            None => RunConfig::default(),
        };
        if let Some(tags) = &self.tags {
            config.tags = tags.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(dir) = &self.save_dir {
            config.save_dir = dir.clone();
        }
        if let Some(n_iter) = self.n_iter {
            config.search.n_iter = n_iter;
        }
        if let Some(n_jobs) = self.n_jobs {
            config.search.n_jobs = n_jobs;
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if self.remake {
            config.cache = config.cache.with_remake(true);
        } else if self.reuse {
            config.cache = config.cache.with_remake(false);
        }
        if self.keep_going {
            config.keep_going = true;
        }
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(args: &RunArgs) -> anyhow::Result<RunReport> {
    let config = args.to_config()?;

    println!();
    line_box_top();
    line_box(&format!("{}", "tof-search".white().bold()));
    line_box_sep();
    line_box(&kv("Tags     ", &config.tags.join(", ")));
    line_box(&kv("Data     ", &config.data_dir.display().to_string()));
    line_box(&kv("Results  ", &config.save_dir.display().to_string()));
    line_box(&kv("Search   ", &format!(
        "{} iters × {} folds, {}",
        config.search.n_iter, config.cv_folds, config.search.scoring
    )));
    line_box(&kv("Seed     ", &config.seed().to_string()));
    line_box(&kv("Cache    ", if config.cache.remake { "remake" } else { "reuse" }));
    line_box_bottom();

    let start = Instant::now();
    let loader = DataLoader::new(config.data_dir.clone());
    let report = Pipeline::new(loader, config).run_all()?;

    section("Results");
    for summary in &report.completed {
        let origin = if summary.cache_hit { "cached" } else { "searched" };
        println!(
            "  {} {}  {} {:.5}  {}",
            ok("✓"),
            summary.tag.white().bold(),
            muted(&summary.scoring.to_string()),
            summary.best_score,
            dim(&format!("{} · {} candidates · {}", origin, summary.n_candidates, summary.location)),
        );
        println!("    {}", dim(&format_params(&summary.best_params)));
        if let Some(m) = &summary.test_metrics {
            println!(
                "    {} mae {:.5}  rmse {:.5}  r2 {:.4}",
                muted("held-out"),
                m.mae,
                m.rmse,
                m.r2
            );
        }
    }
    for failure in &report.failed {
        println!("  {} {}  {}", bad("✗"), failure.tag.white().bold(), bad(&failure.error));
    }
    println!();
    println!("  {}", dim(&format!("finished in {:.1?}", start.elapsed())));
    println!();

    Ok(report)
}

pub fn cmd_inspect(artifact: &Path, top: usize) -> anyhow::Result<()> {
    section("Search Result");

    let dir = artifact
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let key = artifact
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("not a file path: {}", artifact.display()))?;

    step_run("Loading artifact");
    let start = Instant::now();
    let store = FileStore::new(dir);
    let result: SearchResult<RandomForestRegressor> = store.load(key)?;
    step_done(&format!("{:?}", start.elapsed()));
    println!();

    println!("  {:<12} {}", muted("File"), store.location(key));
    println!("  {:<12} {}", muted("Scoring"), result.scoring);
    println!("  {:<12} {} ({} failed)", muted("Candidates"), result.n_candidates(), result.n_failed());
    println!("  {:<12} {}", muted("Folds"), result.n_splits);
    println!("  {:<12} {} × {}", muted("Train set"), result.n_samples, result.n_features);
    println!("  {:<12} {:.5}", muted("Best score"), result.best_score);
    println!("  {:<12} {}", muted("Refit"), match result.refit_time {
        Some(t) => format!("{:.2}s", t),
        None => "none".to_string(),
    });
    println!();

    println!(
        "  {:>5} {:>6} {:>12} {:>10}  {}",
        muted("Rank"),
        muted("Index"),
        muted("Mean"),
        muted("Std"),
        muted("Parameters")
    );
    println!("  {}", dim(&"─".repeat(56)));

    for (idx, candidate) in result.top_n(top) {
        let fmt_opt = |v: Option<f64>| v.map_or_else(|| "failed".to_string(), |s| format!("{:.5}", s));
        println!(
            "  {:>5} {:>6} {:>12} {:>10}  {}",
            candidate.rank_test_score,
            idx,
            fmt_opt(candidate.mean_test_score),
            fmt_opt(candidate.std_test_score),
            dim(&format_params(&candidate.params))
        );
    }

    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let dir = data_path.parent().unwrap_or_else(|| Path::new("."));
    let df = DataLoader::new(dir).load_path(data_path)?;

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!("  {:<12} {:.2} MB", muted("Memory"), df.estimated_size() as f64 / 1024.0 / 1024.0);
    println!();

    println!("  {:<28} {:<12} {:>6}", muted("Column"), muted("Type"), muted("Nulls"));
    println!("  {}", dim(&"─".repeat(50)));

    for col in df.get_columns() {
        println!(
            "  {:<28} {:<12} {:>6}",
            col.name().as_str(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            col.null_count(),
        );
    }

    println!();
    Ok(())
}
