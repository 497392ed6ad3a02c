//! Casework Simulator CLI
//!
//! Run seeded casework scenarios, review them against the eligibility oracle
//! and report QA metrics.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

use casework_sim::{
    compute_run_summary, seed_from_clock, RunConfig, RunExport, RunResult, ScenarioId, ScenarioRunner,
};

/// Casework deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "casework-sim")]
#[command(about = "Run deterministic casework simulations against the eligibility oracle", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Cases generated per run
    #[arg(short, long, default_value = "100")]
    count: usize,

    /// Scenario to run (missing_docs, appeal_reversal, all)
    #[arg(short = 'S', long, default_value = "missing_docs")]
    scenario: String,

    /// Number of consecutive seeds to run (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Worker threads per run
    #[arg(short, long, default_value = "1")]
    workers: usize,

    /// Policy pack directory (defaults to the built-in pack)
    #[arg(long)]
    policy_pack: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export full run results to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse::<ScenarioId>().map_err(|e: String| {
            anyhow!("{} (available: missing_docs, appeal_reversal, all)", e)
        })?]
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        let elapsed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .context("System clock is before the Unix epoch")?;
        seed_from_clock(elapsed)
    } else {
        args.seed
    };

    let config = RunConfig {
        seed: base_seed,
        count: args.count,
        scenario: scenarios[0],
        workers: args.workers,
        policy_pack: args.policy_pack.clone(),
    };
    let pack = Arc::new(config.load_pack().with_context(|| match &config.policy_pack {
        Some(dir) => format!("Failed to load policy pack from {}", dir.display()),
        None => "Failed to parse the built-in policy pack".to_string(),
    })?);

    if !args.json {
        info!("Casework Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("Policy pack: {} ({} rule ids)", pack.id(), pack.rule_index().len());
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let mut results: Vec<RunResult> = Vec::new();

    // Run simulations
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(Arc::clone(&pack), seed)
            .with_count(config.count)
            .with_workers(config.workers);

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                let summary = compute_run_summary(&result);
                if result.passed() {
                    info!(
                        "✓ {} (seed={}) {} cases, {} SLA breaches, oracle eligibility match {:.1}%",
                        scenario.name(),
                        seed,
                        summary.total_cases,
                        summary.sla_compliance.breached,
                        summary.oracle_metrics.eligibility_match_rate * 100.0
                    );
                } else {
                    error!(
                        "✗ {} (seed={}) {} case errors",
                        scenario.name(),
                        seed,
                        result.errors.len()
                    );
                }
                debug!("  by outcome: {:?}", summary.by_outcome);
                debug!("  mismatches: {:?}", summary.oracle_metrics.mismatches_by_severity);
            }

            results.push(result);
        }
    }

    let failed_runs = results.iter().filter(|r| !r.passed()).count();

    if let Some(export_path) = &args.export {
        let mut export = RunExport::new();
        for result in &results {
            export.add_run(result.clone());
        }
        export
            .write_to_file(export_path)
            .with_context(|| format!("Failed to write export to {}", export_path.display()))?;
        if !args.json {
            info!("Exported {} runs to {}", results.len(), export_path.display());
        }
    }

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": results.len(),
            "passed": results.len() - failed_runs,
            "failed": failed_runs,
            "runs": results.iter().map(|r| {
                serde_json::json!({
                    "run_id": r.run_id,
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed(),
                    "summary": compute_run_summary(r),
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_runs == 0 {
            info!("✅ All {} runs completed without case errors", results.len());
        } else {
            error!("❌ {}/{} runs had case errors", failed_runs, results.len());
            for result in results.iter().filter(|r| !r.passed()) {
                for err in &result.errors {
                    error!("  - {} seed={}: {}", result.scenario.name(), result.seed, err);
                }
            }
        }
    }

    // Exit with proper code for CI
    if failed_runs > 0 {
        std::process::exit(1);
    }
    Ok(())
}
