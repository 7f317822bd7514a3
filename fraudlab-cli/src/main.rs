//! FraudLab CLI — dataset checks and the training pipeline.
//!
//! Commands:
//! - `verify` — check the raw CSV schema and report rows and class distribution
//! - `profile` — write `data_profile.json` and print the summary
//! - `train` — run the full pipeline and persist every artifact
//! - `config` — print the default configuration as TOML

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use fraudlab_core::domain::COMPONENT_COUNT;
use fraudlab_core::profile::DataProfile;
use fraudlab_runner::{
    load_transactions, logging, run_from_files, ArtifactManager, PipelineConfig, RunSummary,
};

#[derive(Parser)]
#[command(
    name = "fraudlab",
    about = "FraudLab CLI — imbalance-aware credit card fraud classification"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that reads the dataset.
#[derive(clap::Args)]
struct DataArgs {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Raw transaction CSV. Overrides `paths.raw_data`.
    #[arg(long)]
    data: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the raw CSV schema and report row count and class distribution.
    Verify {
        #[command(flatten)]
        data: DataArgs,
    },
    /// Profile the raw dataset and write reports/data_profile.json.
    Profile {
        #[command(flatten)]
        data: DataArgs,
    },
    /// Run the training pipeline and persist all artifacts.
    Train {
        #[command(flatten)]
        data: DataArgs,

        /// Master seed. Overrides the config value.
        #[arg(long)]
        seed: Option<u64>,

        /// Train model families one after another instead of in parallel.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Print the default configuration as TOML.
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Verify { data } => run_verify(&load_config(&data)?),
        Commands::Profile { data } => run_profile(&load_config(&data)?),
        Commands::Train {
            data,
            seed,
            sequential,
        } => {
            let mut config = load_config(&data)?;
            if let Some(seed) = seed {
                config.seed = seed;
            }
            if sequential {
                config.training.parallel = false;
            }
            run_train(&config)
        }
        Commands::Config => {
            print!("{}", PipelineConfig::default().to_toml()?);
            Ok(())
        }
    }
}

fn load_config(args: &DataArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(data) = &args.data {
        config.paths.raw_data = data.clone();
    }
    Ok(config)
}

fn run_verify(config: &PipelineConfig) -> Result<()> {
    let loaded = load_transactions(&config.paths.raw_data)?;
    let counts = fraudlab_core::domain::ClassCounts::from_labels(
        loaded.records.iter().map(|r| &r.label),
    );

    println!("File: {}", config.paths.raw_data.display());
    println!("Rows: {}", loaded.records.len());
    println!("Columns: {}", COMPONENT_COUNT + 3);
    println!("Dataset hash: {}", loaded.dataset_hash);
    println!();
    println!("{:<12} {:>10} {:>10}", "Class", "Rows", "Share");
    println!("{}", "-".repeat(34));
    for (name, count) in [("legitimate", counts.legitimate), ("fraud", counts.fraud)] {
        let share = if counts.total() == 0 {
            0.0
        } else {
            100.0 * count as f64 / counts.total() as f64
        };
        println!("{:<12} {:>10} {:>9.3}%", name, count, share);
    }
    Ok(())
}

fn run_profile(config: &PipelineConfig) -> Result<()> {
    let loaded = load_transactions(&config.paths.raw_data)?;
    let profile = DataProfile::build(&loaded.records)?;
    let path = ArtifactManager::new(&config.paths)?.write_profile(&profile)?;

    print_profile(&profile);
    println!();
    println!("Profile saved to: {}", path.display());
    Ok(())
}

fn print_profile(profile: &DataProfile) {
    let fmt_mean = |m: Option<f64>| m.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"));
    println!("Rows:             {}", profile.rows);
    println!("Duplicate rows:   {}", profile.duplicate_rows);
    println!("Legitimate:       {}", profile.class_counts.legitimate);
    println!("Fraud:            {}", profile.class_counts.fraud);
    match profile.fraud_ratio {
        Some(ratio) => println!("Fraud ratio:      {ratio:.6}"),
        None => println!("Fraud ratio:      n/a (no legitimate rows)"),
    }
    println!("Fraud percentage: {:.3}%", profile.fraud_percentage);
    println!("Mean amount (legitimate): {}", fmt_mean(profile.mean_amount_legitimate));
    println!("Mean amount (fraud):      {}", fmt_mean(profile.mean_amount_fraud));
    println!(
        "Amount Q1/Q3:     {:.2} / {:.2} (outliers above {:.2}: {})",
        profile.amount_q1, profile.amount_q3, profile.amount_upper_bound, profile.amount_outliers
    );
}

fn run_train(config: &PipelineConfig) -> Result<()> {
    let summary = run_from_files(config)?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let outcome = &summary.outcome;
    let balance = &outcome.balance;

    println!("Run: {}", outcome.run_id);
    println!(
        "Split: {} train / {} test",
        outcome.split.train.len(),
        outcome.split.test.len()
    );
    println!(
        "Balanced training set: {} legitimate / {} fraud ({} synthetic)",
        balance.output.legitimate, balance.output.fraud, balance.synthesized
    );
    for failure in &outcome.training.failures {
        println!("Excluded {}: {}", failure.kind, failure.reason);
    }
    println!();
    println!(
        "{:<22} {:>8} {:>10} {:>8} {:>8} {:>10}",
        "Model", "AUC", "Precision", "Recall", "F1", "CV AUC"
    );
    println!("{}", "-".repeat(72));
    for result in &outcome.evaluations {
        let cv = outcome
            .training
            .get(result.kind)
            .and_then(|e| e.cv.as_ref())
            .map_or_else(
                || "skipped".to_string(),
                |cv| format!("{:.4}±{:.4}", cv.mean_auc, cv.std_auc),
            );
        println!(
            "{:<22} {:>8.4} {:>10.4} {:>8.4} {:>8.4} {:>10}",
            result.kind.name(),
            result.auc,
            result.precision,
            result.recall,
            result.f1,
            cv
        );
    }
    println!();
    println!(
        "Selected: {} (AUC {:.4})",
        outcome.metadata.model_name, outcome.metadata.auc
    );
    println!("Model saved to: {}", summary.artifacts.selected_model.display());
}
