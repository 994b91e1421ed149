//! Diabetes Predict CLI Tool
//!
//! Score patient measurements against the model artifact without the web
//! dashboard.
//!
//! Usage:
//!   diabetes-predict predict --gender Male --age 45 --urea 5.2 --cr 0.8 ...
//!   diabetes-predict batch <upload.csv> [--export <results.csv>]
//!   diabetes-predict report [--csv <results.csv>] [--xlsx <results.xlsx>] [--charts]

use clap::{Parser, Subcommand, ValueEnum};
use diabetes_core::model::shared;
use diabetes_core::report::report_from_source;
use diabetes_core::table::UPLOAD_DELIMITER;
use diabetes_core::{
    predict_csv, score_records, DashboardConfig, DiabetesLabel, GenderPolicy, ManualInput,
    RecordNormalizer, Verdict,
};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "diabetes-predict")]
#[command(version = "0.1.0")]
#[command(about = "Diabetes risk prediction from clinical measurements", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model artifact, overrides the configured path
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Output format; csv is only accepted by `batch`
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Encode unrecognized gender text as Female instead of rejecting it
    #[arg(long)]
    permissive_gender: bool,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Single-line JSON
    Compact,
    /// ';'-separated table
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a single patient
    Predict {
        /// Male or Female
        #[arg(long)]
        gender: String,
        /// Age in years (1-120)
        #[arg(long)]
        age: f64,
        #[arg(long)]
        urea: f64,
        /// Creatinine
        #[arg(long)]
        cr: f64,
        #[arg(long)]
        hba1c: f64,
        /// Total cholesterol
        #[arg(long)]
        chol: f64,
        /// Triglycerides
        #[arg(long)]
        tg: f64,
        #[arg(long)]
        hdl: f64,
        #[arg(long)]
        ldl: f64,
        #[arg(long)]
        vldl: f64,
        #[arg(long)]
        bmi: f64,
    },

    /// Score a ';'-separated CSV file
    Batch {
        /// Input file with a header row
        file: PathBuf,

        /// Also write the report source table (features, y_pred, probability)
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Summarize previously exported results
    Report {
        /// Results CSV, overrides the configured path
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Results spreadsheet fallback, overrides the configured path
        #[arg(long)]
        xlsx: Option<PathBuf>,

        /// Include per-feature histograms
        #[arg(long)]
        charts: bool,
    },
}

/// Output of the single-record command
#[derive(serde::Serialize)]
struct SingleResult {
    label: DiabetesLabel,
    message: &'static str,
    risk_probability: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    check_format(cli.format, &cli.command)?;

    let mut config = DashboardConfig::load(cli.config.as_deref())?;
    if let Some(model) = &cli.model {
        config.model_path = model.clone();
    }
    if cli.permissive_gender {
        config.gender_policy = GenderPolicy::Permissive;
    }
    let normalizer = RecordNormalizer::new(config.gender_policy);

    let output_str = match cli.command {
        Commands::Predict {
            gender,
            age,
            urea,
            cr,
            hba1c,
            chol,
            tg,
            hdl,
            ldl,
            vldl,
            bmi,
        } => {
            let input = ManualInput {
                gender,
                age,
                urea,
                creatinine: cr,
                hba1c,
                cholesterol: chol,
                triglyceride: tg,
                hdl,
                ldl,
                vldl,
                bmi,
            };
            let model = shared(&config.model_path)?;
            let record = normalizer.normalize_manual(&input)?;
            let scored = score_records(model.as_ref(), &[record])?;
            let first = scored.first().ok_or("model returned no prediction")?;
            let verdict = Verdict { label: first.label };
            let result = SingleResult {
                label: verdict.label,
                message: verdict.message(),
                risk_probability: first.risk_probability,
            };
            render(cli.format, &result)?
        }
        Commands::Batch { file, export } => {
            let model = shared(&config.model_path)?;
            let bytes = fs::read(&file)?;
            let outcome = predict_csv(model.as_ref(), &normalizer, &bytes)?;
            if let Some(path) = export {
                outcome.results_table().write_csv(&path)?;
                info!(path = %path.display(), "exported results");
            }
            if cli.format == OutputFormat::Csv {
                outcome.table.to_delimited(UPLOAD_DELIMITER)?
            } else {
                render(cli.format, &outcome.table)?
            }
        }
        Commands::Report { csv, xlsx, charts } => {
            let mut source = config.report_source();
            if let Some(csv) = csv {
                source.csv = csv;
            }
            if let Some(xlsx) = xlsx {
                source.xlsx = xlsx;
            }
            let report = report_from_source(&source, &normalizer, charts)?;
            render(cli.format, &report)?
        }
    };

    if let Some(output_path) = cli.output {
        fs::write(&output_path, &output_str)?;
        eprintln!("Output written to: {}", output_path.display());
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

/// Only the batch table has a CSV rendering
fn check_format(format: OutputFormat, command: &Commands) -> Result<(), String> {
    if format == OutputFormat::Csv && !matches!(command, Commands::Batch { .. }) {
        return Err("csv output is only available for the batch command".to_string());
    }
    Ok(())
}

fn render<T: serde::Serialize>(format: OutputFormat, value: &T) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Compact => serde_json::to_string(value),
        OutputFormat::Json | OutputFormat::Csv => serde_json::to_string_pretty(value),
    }
}
