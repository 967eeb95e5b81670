// src/main.rs
//! Channel risk scoring CLI
use anyhow::{Context, Result};
use channel_risk::dataset;
use channel_risk::fraud_detection::{rank_most_anomalous, PatternRuleEngine, ScoringConfig, ScoringPipeline};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "channel-risk")]
#[command(about = "Fraud and medical-scam risk scoring for channel posts")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one text with the pattern rule engine
    Analyze {
        /// Message text
        #[arg(long)]
        text: String,
        /// Originating channel
        #[arg(long)]
        channel: Option<String>,
    },
    /// Train on a message dataset and report the most anomalous posts and channels
    Report(ReportArgs),
}

#[derive(ClapArgs)]
struct ReportArgs {
    /// JSON file or directory of JSON files holding message arrays
    #[arg(long)]
    data: PathBuf,
    /// Scoring configuration file (JSON); defaults plus CHANNEL_RISK_* env otherwise
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of most anomalous messages to list
    #[arg(long, default_value = "10")]
    top: usize,
    /// Write the trained model to this path
    #[arg(long)]
    save_model: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging()?;

    match args.command {
        Commands::Analyze { text, channel } => {
            let analysis = PatternRuleEngine::new().analyze_message(&text, channel.as_deref());
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        Commands::Report(report_args) => run_report(report_args)?,
    }

    Ok(())
}

fn run_report(args: ReportArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => ScoringConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ScoringConfig::from_env().context("invalid CHANNEL_RISK_* environment")?,
    };

    let messages = dataset::load(&args.data)
        .with_context(|| format!("failed to load messages from {}", args.data.display()))?;

    let pipeline = ScoringPipeline::with_config(&config);
    info!("Training anomaly detection model on {} messages...", messages.len());
    let model = pipeline.fit(&messages).context("training failed")?;

    if let Some(path) = &args.save_model {
        model
            .save_to_file(path)
            .with_context(|| format!("failed to save model to {}", path.display()))?;
        info!("💾 model saved to {}", path.display());
    }

    let results = pipeline.analyze_batch(&messages)?;
    let mut top_anomalies = rank_most_anomalous(&results);
    top_anomalies.truncate(args.top);

    let channels = pipeline.analyze_channel_behavior(&dataset::group_messages(&messages))?;

    let report = serde_json::json!({
        "trained_on": model.training_samples(),
        "top_anomalies": top_anomalies,
        "channels": channels,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
