use std::path::PathBuf;

use deposit_predict::artifact::Artifact;
use deposit_predict::context::PredictionContext;
use deposit_predict::input;
use deposit_predict::record::ClientProfile;
use deposit_predict::report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "deposit-predict",
    about = "Predict whether a client will subscribe to a term deposit",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    /// Path to the fitted model artifact (JSON)
    #[arg(
        long,
        global = true,
        env = "DEPOSIT_PREDICT_MODEL",
        default_value = "model/bank_rf.json"
    )]
    model: PathBuf,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Predict a single client from form fields
    Predict {
        #[command(flatten)]
        profile: ClientProfile,
        /// Read the client from a JSON object file instead of the form flags
        #[arg(long, conflicts_with = "ClientProfile")]
        record: Option<PathBuf>,
    },
    /// Predict every row of a delimited client table
    Batch {
        /// Input table path, or `-` for stdin
        #[arg(long)]
        input: PathBuf,
        /// Where to write the labeled table; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
        /// Field delimiter for input and output
        #[arg(long, default_value = ",", value_parser = parse_delimiter)]
        delimiter: u8,
        /// Number of result rows to preview on stderr
        #[arg(long, default_value_t = 10)]
        preview: usize,
    },
    /// Show the loaded model and its feature vocabulary
    Describe,
}

fn parse_delimiter(raw: &str) -> Result<u8, String> {
    match raw.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(format!("delimiter must be a single ASCII character, got {raw:?}")),
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let ctx = PredictionContext::load(&args.model).with_context(|| {
        format!(
            "cannot serve predictions without model artifact {}",
            args.model.display()
        )
    })?;

    match args.command {
        Commands::Predict { profile, record } => {
            let prediction = match record {
                Some(path) => {
                    let record = input::load_record(&path)?;
                    ctx.predict_record(&record)
                        .with_context(|| format!("prediction for {} rejected", path.display()))?
                }
                None => {
                    info!(?profile, "predicting single client");
                    ctx.predict_client(&profile)
                        .context("prediction request rejected")?
                }
            };
            println!("{}", prediction.message());
        }
        Commands::Batch {
            input,
            output,
            delimiter,
            preview,
        } => {
            let table = input::load_batch(&input, delimiter)?;
            if table.is_empty() {
                warn!(input = %input.display(), "batch has no rows");
            }
            let labeled = ctx
                .predict_batch(&table)
                .with_context(|| format!("batch {} rejected", input.display()))?;

            match &output {
                Some(path) => labeled
                    .export(path, delimiter)
                    .with_context(|| format!("failed to export predictions to {}", path.display()))?,
                None => labeled
                    .write_csv(std::io::stdout().lock(), delimiter)
                    .context("failed to write predictions to stdout")?,
            }

            if preview > 0 {
                report::print_preview(&labeled, preview).context("failed to print preview")?;
            }
            info!(
                rows = labeled.rows().len(),
                subscribers = labeled.subscribers(),
                output = ?output,
                "batch flow completed"
            );
        }
        Commands::Describe => {
            let forest = ctx.artifact();
            println!("model:    {} {}", forest.model_id(), forest.model_version());
            println!("trees:    {}", forest.n_trees());
            println!("classes:  {:?}", forest.classes());
            println!("features: {}", forest.feature_names_in().len());
            for name in forest.feature_names_in().names() {
                println!("  {name}");
            }
        }
    }

    Ok(())
}
