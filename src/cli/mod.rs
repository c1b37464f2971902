//! Kickwatch CLI Module
//!
//! Command-line interface for serving predictions, replaying reference data
//! and running drift evaluations.

use clap::{Parser, Subcommand};
use colored::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::drift::{DriftConfig, DriftEvaluator, DriftReport, FeatureWindow};
use crate::features::{Feature, FeatureVector, RawFeatures};
use crate::inference::{InferenceConfig, InferenceEngine};
use crate::service::{spawn_log_writer, LogWriterConfig, PredictionService};
use crate::storage::{open_store, SqliteStore};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn alert(s: &str) -> ColoredString  { s.truecolor(240, 110, 100) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let total_pad = W.saturating_sub(strip_ansi(content).chars().count());
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

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

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
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

const DEFAULT_REFERENCE: &str = "data/kicks_ready_for_model.csv";

/// Rows with a distance above this are kept by `replay --distance-drift`
const DISTANCE_DRIFT_CUTOFF: f64 = 40.0;

#[derive(Parser)]
#[command(name = "kickwatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Kick success prediction service with drift monitoring")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the prediction API server
    Serve {
        /// Host to bind to (defaults to API_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (defaults to API_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Compare recent logged predictions against the reference dataset
    Drift {
        /// Reference CSV with one column per model feature
        #[arg(short, long, default_value = DEFAULT_REFERENCE)]
        reference: PathBuf,

        /// Number of most recent predictions to evaluate (defaults to DRIFT_BATCH_SIZE)
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Directory for the report (defaults to DRIFT_REPORTS_DIR)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Share of drifted features above which the dataset counts as drifted
        #[arg(long)]
        drift_share: Option<f64>,
    },

    /// Score a random sample of the reference dataset and log it like live traffic
    Replay {
        /// Reference CSV with one column per model feature
        #[arg(short, long, default_value = DEFAULT_REFERENCE)]
        reference: PathBuf,

        /// Number of rows to replay
        #[arg(short, long, default_value = "1000")]
        batch_size: usize,

        /// Only replay long kicks, to provoke distance drift
        #[arg(long)]
        distance_drift: bool,

        /// Pause between rows, in milliseconds
        #[arg(long, default_value = "0")]
        pause_ms: u64,

        /// Seed for row sampling
        #[arg(long)]
        seed: Option<u64>,

        /// Score without logging
        #[arg(long)]
        dry_run: bool,
    },

    /// Create the prediction database schema
    InitDb {
        /// SQLite file (defaults to DATABASE_PATH)
        #[arg(short, long)]
        database: Option<PathBuf>,
    },
}

fn database_path() -> String {
    std::env::var("DATABASE_PATH").unwrap_or_else(|_| "data/predictions.db".to_string())
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    let mut config = ServerConfig::default();
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    let base = format!("http://{}:{}{}", config.host, config.port, config.api_prefix);

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Kickwatch".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Predict ", &format!("{}/predict", base)));
    line_box(&kv("Health  ", &format!("{}/health", base)));
    line_box(&kv("Database", &config.database_path));
    line_box(&kv("Model   ", &config.inference.model_path.display().to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    run_server(config).await
}

// ─── Drift ─────────────────────────────────────────────────────────────────────

fn print_report(report: &DriftReport) {
    println!(
        "  {:<28} {:<22} {:>9} {:>9}  {}",
        muted("Feature"),
        muted("Statistic"),
        muted("Score"),
        muted("Limit"),
        muted("Drift")
    );
    println!("  {}", dim(&"─".repeat(76)));
    for f in report.features.iter().chain(report.prediction.iter()) {
        let flag = if f.drifted { alert("yes") } else { ok("no") };
        println!(
            "  {:<28} {:<22} {:>9.4} {:>9.4}  {}",
            f.feature,
            format!("{:?}", f.statistic),
            f.score,
            f.threshold,
            flag
        );
    }
    println!();
    println!(
        "  {:<16} {}/{} ({:.0}%, limit {:.0}%)",
        muted("Drifted"),
        report.n_drifted,
        report.features.len(),
        report.drifted_share * 100.0,
        report.drift_share_threshold * 100.0
    );
    let verdict = if report.dataset_drift {
        alert("DRIFT DETECTED")
    } else {
        ok("no dataset drift")
    };
    println!("  {:<16} {}", muted("Dataset"), verdict);
}

pub fn cmd_drift(
    reference: &Path,
    batch_size: Option<usize>,
    output_dir: Option<PathBuf>,
    drift_share: Option<f64>,
) -> anyhow::Result<()> {
    section("Drift Evaluation");

    let mut config = DriftConfig::default();
    if let Some(n) = batch_size {
        config = config.with_batch_size(n);
    }
    if let Some(dir) = output_dir {
        config = config.with_reports_dir(dir);
    }
    if let Some(share) = drift_share {
        config = config.with_drift_share(share);
    }

    step_run("Loading reference data");
    let start = Instant::now();
    let reference_window = FeatureWindow::from_csv(reference)?;
    step_done(&format!("{} rows in {:.2?}", reference_window.len(), start.elapsed()));

    let store = open_store(&database_path())?;
    let evaluator = DriftEvaluator::new(config);

    step_run(&format!("Evaluating last {} predictions", evaluator.config().batch_size));
    let (report, path) = evaluator.run(store.as_ref(), &reference_window)?;
    step_done(&format!("{} live rows", report.live_size));
    println!();

    print_report(&report);
    println!();
    step_ok(&format!("Report written to {}", path.display()));
    println!();
    Ok(())
}

// ─── Replay ────────────────────────────────────────────────────────────────────

/// Pick up to `n` reference rows, optionally only long kicks
fn sample_rows(
    window: &FeatureWindow,
    n: usize,
    distance_drift: bool,
    rng: &mut StdRng,
) -> Vec<Vec<f64>> {
    let mut rows: Vec<Vec<f64>> = (0..window.len())
        .filter_map(|i| window.row(i))
        .filter(|row| !distance_drift || row[Feature::Distance.index()] > DISTANCE_DRIFT_CUTOFF)
        .collect();
    rows.shuffle(rng);
    rows.truncate(n);
    rows
}

/// Running totals of a replay
#[derive(Debug, Default, Clone, PartialEq)]
struct ReplayTally {
    scored: usize,
    rejected: usize,
    predicted_made: usize,
    probability_sum: f64,
}

impl ReplayTally {
    fn add(&mut self, probability: f64, made: bool) {
        self.scored += 1;
        self.probability_sum += probability;
        if made {
            self.predicted_made += 1;
        }
    }

    fn mean_probability(&self) -> Option<f64> {
        (self.scored > 0).then(|| self.probability_sum / self.scored as f64)
    }
}

pub async fn cmd_replay(
    reference: &Path,
    batch_size: usize,
    distance_drift: bool,
    pause_ms: u64,
    seed: Option<u64>,
    dry_run: bool,
) -> anyhow::Result<()> {
    section("Replay");

    step_run("Loading reference data");
    let window = FeatureWindow::from_csv(reference)?;
    step_done(&format!("{} rows", window.len()));

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let rows = sample_rows(&window, batch_size, distance_drift, &mut rng);
    if distance_drift {
        step_ok(&format!(
            "Kept {} rows with distance > {}",
            rows.len(),
            DISTANCE_DRIFT_CUTOFF
        ));
    }

    let engine = Arc::new(InferenceEngine::load(InferenceConfig::default())?);
    let store = open_store(&database_path())?;
    let writer = spawn_log_writer(LogWriterConfig::default(), store);
    let service = PredictionService::new(engine, writer.handle());

    step_run(&format!("Scoring {} rows", rows.len()));
    let start = Instant::now();
    let mut tally = ReplayTally::default();

    for row in &rows {
        let outcome = FeatureVector::from_values(row).and_then(|vector| {
            if dry_run {
                service.score_only(&vector).map(|s| s.probability)
            } else {
                service.predict(RawFeatures::from(vector)).map(|r| r.prediction)
            }
        });
        match outcome {
            Ok(p) => tally.add(p, service.engine().label(p)),
            Err(e) => {
                tally.rejected += 1;
                tracing::debug!(error = %e, "replay row rejected");
            }
        }
        if pause_ms > 0 {
            tokio::time::sleep(Duration::from_millis(pause_ms)).await;
        }
    }
    step_done(&format!("{:.2?}", start.elapsed()));

    let handle = writer.handle();
    handle.flush().await?;
    writer.shutdown().await;
    let stats = handle.stats();

    println!();
    println!("  {:<16} {}", muted("Scored"), tally.scored);
    println!("  {:<16} {}", muted("Rejected"), tally.rejected);
    println!("  {:<16} {}", muted("Predicted made"), tally.predicted_made);
    if let Some(mean) = tally.mean_probability() {
        println!("  {:<16} {:.3}", muted("Mean prob."), mean);
    }
    if !dry_run {
        println!("  {:<16} {}", muted("Logged"), stats.written);
        if stats.failed + stats.dropped > 0 {
            println!(
                "  {:<16} {}",
                muted("Lost"),
                alert(&(stats.failed + stats.dropped).to_string())
            );
        }
    }
    println!();
    Ok(())
}

// ─── Init DB ───────────────────────────────────────────────────────────────────

pub fn cmd_init_db(database: Option<PathBuf>) -> anyhow::Result<()> {
    let path = database.unwrap_or_else(|| PathBuf::from(database_path()));
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = SqliteStore::open(&path)?;
    store.migrate()?;
    step_ok(&format!("Database ready at {}", path.display()));
    Ok(())
}
