#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the enrol-signal forensic pipeline.
//!
//! `analyze` loads the three count tables, scores every location-date,
//! rolls the scores up by period and writes the scored table, the rollup,
//! review recommendations, volume surges and a JSON summary to an output
//! directory.
//!
//! Uses `indicatif-log-bridge` (via [`enrol_signal_cli_utils::init_logger`])
//! so that log lines and the stage progress bar never fight for the
//! terminal.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use enrol_signal_cli_utils::IndicatifProgress;
use enrol_signal_forensic::{ForensicInputs, ForensicPipeline};
use enrol_signal_forensic_models::{ForensicConfig, RollupInterval};
use enrol_signal_insights::{
    AreaLevel, AreaRanking, DEFAULT_TOP_N, SignalSummary, SurgeConfig, SurgeMetric, detect_surges,
    recommend, summarize, top_areas,
};
use enrol_signal_records_models::Granularity;
use enrol_signal_tables::write::create;
use serde::Serialize;

/// Forensic signal analysis over administrative enrolment and update counts.
#[derive(Parser)]
#[command(name = "enrol_signal")]
#[command(about = "Score location-periods for deviation worth administrative review")]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write every report.
    Analyze(AnalyzeArgs),

    /// Print the default policy as TOML.
    DefaultConfig,

    /// Check a policy file without running the pipeline.
    ValidateConfig {
        /// Policy file to check.
        path: PathBuf,
    },
}

#[derive(clap::Args)]
struct AnalyzeArgs {
    /// Enrolment table (CSV).
    #[arg(long)]
    enrolment: PathBuf,

    /// Biometric update table (CSV).
    #[arg(long)]
    biometric: PathBuf,

    /// Demographic update table (CSV).
    #[arg(long)]
    demographic: PathBuf,

    /// Directory the reports are written to. Created if missing.
    #[arg(long, default_value = "data/forensic")]
    out_dir: PathBuf,

    /// Policy file (TOML). Defaults apply to any key it omits.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rollup bucket length in calendar months, overriding the policy.
    #[arg(long)]
    rollup_months: Option<u32>,

    /// Force an aggregation grain (`pincode` or `district`).
    #[arg(long, value_parser = parse_granularity)]
    granularity: Option<Granularity>,

    /// Areas to list per level in the summary.
    #[arg(long, default_value_t = DEFAULT_TOP_N)]
    top: usize,

    /// Count to look for surges in (`enrolment`, `biometric` or
    /// `demographic`).
    #[arg(long, value_parser = parse_surge_metric, default_value = "biometric")]
    surge_metric: SurgeMetric,
}

/// Contents of `summary.json`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisSummary {
    granularity: Granularity,
    rollup: RollupInterval,
    records: SignalSummary,
    periods: SignalSummary,
    recommendation_count: usize,
    surge_count: usize,
    top_states: Vec<AreaRanking>,
    top_districts: Vec<AreaRanking>,
    top_postal_codes: Vec<AreaRanking>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => analyze(&args),
        Commands::DefaultConfig => {
            print!("{}", enrol_signal_tables::default_config_toml()?);
            Ok(())
        }
        Commands::ValidateConfig { path } => {
            let _multi = enrol_signal_cli_utils::init_logger();
            let config = enrol_signal_tables::load_config(&path)?;
            config.validate()?;
            println!("{} is valid", path.display());
            Ok(())
        }
    }
}

fn parse_granularity(value: &str) -> Result<Granularity, String> {
    value
        .parse()
        .map_err(|_| format!("expected `pincode` or `district`, got {value:?}"))
}

fn parse_surge_metric(value: &str) -> Result<SurgeMetric, String> {
    value
        .parse()
        .map_err(|_| format!("expected `enrolment`, `biometric` or `demographic`, got {value:?}"))
}

fn load_policy(args: &AnalyzeArgs) -> Result<ForensicConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => enrol_signal_tables::load_config(path)?,
        None => ForensicConfig::default(),
    };
    if let Some(months) = args.rollup_months {
        config.rollup = RollupInterval::Months(months);
    }
    if let Some(granularity) = args.granularity {
        config.granularity = Some(granularity);
    }
    Ok(config)
}

fn analyze(args: &AnalyzeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let multi = enrol_signal_cli_utils::init_logger();
    let config = load_policy(args)?;

    let enrolment = enrol_signal_tables::load_enrolment(&args.enrolment)?;
    let biometric = enrol_signal_tables::load_biometric(&args.biometric)?;
    let demographic = enrol_signal_tables::load_demographic(&args.demographic)?;

    let tiers = config.tiers.clone();
    let interval = config.rollup;
    let pipeline = ForensicPipeline::new(config)?
        .with_progress(IndicatifProgress::stages_bar(&multi, "Forensic pipeline"));

    let (report, rollup) = pipeline.run_with_rollup(&ForensicInputs {
        enrolment: &enrolment,
        biometric: &biometric,
        demographic: &demographic,
    })?;
    let recommendations = recommend(&rollup, &tiers);
    let surges = detect_surges(
        report.records.iter().map(|scored| &scored.record),
        &SurgeConfig {
            metric: args.surge_metric,
            ..SurgeConfig::default()
        },
    );

    let summary = AnalysisSummary {
        granularity: report.granularity,
        rollup: interval,
        records: summarize(&report.records, &tiers),
        periods: summarize(&rollup, &tiers),
        recommendation_count: recommendations.len(),
        surge_count: surges.len(),
        top_states: top_areas(&report.records, AreaLevel::State, args.top),
        top_districts: top_areas(&report.records, AreaLevel::District, args.top),
        top_postal_codes: top_areas(&report.records, AreaLevel::PostalCode, args.top),
    };

    let out = &args.out_dir;
    std::fs::create_dir_all(out)?;
    enrol_signal_tables::write_scored_csv(
        create(&out.join("forensic_scores.csv"))?,
        &report.records,
    )?;
    enrol_signal_tables::write_rollup_csv(
        create(&out.join("forensic_rollup.csv"))?,
        &rollup,
        &tiers,
    )?;
    enrol_signal_tables::write_json(&out.join("recommendations.json"), &recommendations)?;
    enrol_signal_tables::write_json(&out.join("surges.json"), &surges)?;
    enrol_signal_tables::write_json(&out.join("summary.json"), &summary)?;
    log::info!("Wrote five reports to {}", out.display());

    print_summary(out, &summary);

    Ok(())
}

fn print_summary(out: &Path, summary: &AnalysisSummary) {
    let r = &summary.records;
    println!();
    println!("=== Forensic Signal Summary ({} grain) ===", summary.granularity);
    println!(
        "  {} records across {} locations",
        r.row_count, r.location_count
    );
    println!(
        "  Risk: average {:.1}, max {:.1}",
        r.average_risk, r.max_risk
    );
    println!(
        "  Tiers: {} low, {} elevated, {} high, {} critical",
        r.tiers.low, r.tiers.elevated, r.tiers.high, r.tiers.critical
    );
    println!(
        "  {} period rows, {} review recommendations, {} surges",
        summary.periods.row_count, summary.recommendation_count, summary.surge_count
    );

    if !summary.top_districts.is_empty() {
        println!();
        println!("  Highest mean risk by district:");
        for area in &summary.top_districts {
            println!("    {:>5.1}  {}", area.mean_risk, area.area);
        }
    }

    println!();
    println!("Reports written to {}", out.display());
}
