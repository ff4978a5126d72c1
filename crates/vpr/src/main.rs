use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vpr_core::config::RankConfig;
use vpr_core::model::FindingRecord;
use vpr_core::report::render_text;
use vpr_core::runner::run_batch;
use vpr_core::stats::{Concentration, RpiStatistics};
use vpr_scoring::RpiCalculator;
use vpr_signals::feeds::{FeedClient, FeedSignals};
use vpr_signals::{SignalProvider, SignalSet};

mod ingest;
mod output;

#[derive(Parser)]
#[command(name = "vpr", about = "Deterministic vulnerability prioritization (5Q / RPI)")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Rank vulnerability findings and export the result")]
    Rank {
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long, default_value_t = 20)]
        top: usize,
        #[arg(long)]
        no_funnel: bool,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        funnel_threshold: Option<usize>,
        #[arg(long)]
        funnel_eps: Option<f64>,
        #[arg(long)]
        offline: bool,
        #[arg(long)]
        signals: Option<PathBuf>,
        #[arg(long)]
        threads: Option<usize>,
        #[arg(long)]
        concentration: bool,
    },
    #[command(about = "Print a detailed text report for the top findings")]
    Report {
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 20)]
        top: usize,
        #[arg(long)]
        offline: bool,
        #[arg(long)]
        signals: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Args::parse().command {
        Command::Rank {
            inputs,
            config,
            json,
            out,
            csv,
            top,
            no_funnel,
            top_k,
            funnel_threshold,
            funnel_eps,
            offline,
            signals,
            threads,
            concentration,
        } => {
            let mut rank_config = load_config(config.as_deref())?;
            if no_funnel {
                rank_config.funnel.enabled = false;
            }
            if let Some(top_k) = top_k {
                rank_config.funnel.top_k = top_k;
            }
            if let Some(threshold) = funnel_threshold {
                rank_config.funnel.threshold = threshold;
            }
            if let Some(eps) = funnel_eps {
                rank_config.funnel.equal_epsilon = eps;
            }
            if let Some(threads) = threads {
                rank_config.threads = threads;
            }
            rank_config.validate()?;

            let records = ingest::load_records(&inputs)?;
            if records.is_empty() {
                bail!("no findings to process");
            }
            let provider = build_signals(offline, signals.as_deref(), &records)?;
            let calculator = RpiCalculator::new(rank_config.weights, provider);
            let outcome = run_batch(records, &calculator, &rank_config)?;
            info!(
                processed = outcome.summary.processed,
                unique = outcome.summary.unique,
                errors = outcome.summary.errors,
                "batch complete",
            );

            let stats = RpiStatistics::from_ranked(&outcome.ranked, &rank_config.thresholds);
            if let Some(csv_path) = csv {
                fs::write(&csv_path, output::to_csv(&outcome.ranked))
                    .with_context(|| format!("writing {}", csv_path.display()))?;
                info!(path = %csv_path.display(), rows = outcome.ranked.len(), "CSV exported");
            }
            if json {
                let doc = output::to_json(
                    &outcome.ranked,
                    &outcome.summary,
                    &stats,
                    &Concentration::from_ranked(&outcome.ranked),
                );
                let rendered = serde_json::to_string_pretty(&doc)?;
                match out {
                    Some(path) => fs::write(&path, rendered)
                        .with_context(|| format!("writing {}", path.display()))?,
                    None => println!("{rendered}"),
                }
            } else {
                print!("{}", render_text(&outcome.ranked, &stats, top));
                if concentration {
                    print!("{}", render_concentration(&Concentration::from_ranked(&outcome.ranked)));
                }
            }
            Ok(())
        }
        Command::Report { inputs, config, top, offline, signals } => {
            let rank_config = load_config(config.as_deref())?;
            let records = ingest::load_records(&inputs)?;
            if records.is_empty() {
                bail!("no findings to process");
            }
            let provider = build_signals(offline, signals.as_deref(), &records)?;
            let calculator = RpiCalculator::new(rank_config.weights, provider);
            let outcome = run_batch(records, &calculator, &rank_config)?;
            let stats = RpiStatistics::from_ranked(&outcome.ranked, &rank_config.thresholds);
            print!("{}", render_text(&outcome.ranked, &stats, top));
            Ok(())
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<RankConfig> {
    match path {
        Some(path) => RankConfig::load(path),
        None => Ok(RankConfig::default()),
    }
}

/// Choose the signal source: a file snapshot, full offline absence, or the
/// live feeds prefetched for the batch's CVE set.
fn build_signals(
    offline: bool,
    snapshot: Option<&std::path::Path>,
    records: &[FindingRecord],
) -> Result<Box<dyn SignalProvider>> {
    if let Some(path) = snapshot {
        let set = SignalSet::load(path)?;
        info!(path = %path.display(), "signal snapshot loaded");
        return Ok(Box::new(set));
    }
    if offline {
        info!("offline mode: all external signals treated as absent");
        return Ok(Box::new(SignalSet::default()));
    }
    let cve_ids: BTreeSet<String> =
        records.iter().filter_map(|r| r.cve_id.clone()).collect();
    info!(cves = cve_ids.len(), "prefetching external signals");
    let client = FeedClient::new(std::env::var("VPR_NVD_API_KEY").ok())?;
    Ok(Box::new(FeedSignals::prefetch(client, &cve_ids)))
}

fn render_concentration(concentration: &Concentration) -> String {
    use std::fmt::Write as _;
    let mut out = String::new();
    let _ = writeln!(out, "\nCONCENTRATION");
    let _ = writeln!(out, "{}", "-".repeat(40));
    let _ = writeln!(out, "Top-20% RPI share: {:.1}%", concentration.top20_share * 100.0);
    let _ = writeln!(
        out,
        "80% of total RPI within the first {} findings ({:.1}% of backlog)",
        concentration.k80,
        concentration.k80_fraction * 100.0,
    );
    let _ = writeln!(out, "Gini: {:.3}", concentration.gini);
    let deciles = concentration
        .decile_shares
        .iter()
        .map(|s| format!("{:.0}%", s * 100.0))
        .collect::<Vec<_>>()
        .join(" ");
    let _ = writeln!(out, "Decile shares: {deciles}");
    out
}
