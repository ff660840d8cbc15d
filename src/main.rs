use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

use owner_cleaner::app::clean_use_case::{CleanReport, CleanUseCase};
use owner_cleaner::config::Config;
use owner_cleaner::observability::{init_logging, metrics};
use owner_cleaner::pipeline::processing::email::is_valid_email;
use owner_cleaner::pipeline::processing::headers::HeaderStatus;

#[derive(Parser)]
#[command(name = "owner_cleaner")]
#[command(about = "Cleans car-owner CSV exports into a clean table and a garbage file")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole cleaning pipeline and write both outputs
    Run {
        /// Config file (defaults to cleaner.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Input CSV file
        #[arg(long)]
        input: Option<PathBuf>,
        /// Destination for the clean table
        #[arg(long)]
        clean: Option<PathBuf>,
        /// Destination for the garbage file
        #[arg(long)]
        garbage: Option<PathBuf>,
        /// Skip the translation service; only overrides apply
        #[arg(long)]
        no_translate: bool,
        /// Also write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print the original -> translated header mapping without writing outputs
    TranslateHeaders {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        no_translate: bool,
    },
    /// Check email addresses with the pipeline's validator
    CheckEmail {
        #[arg(required = true)]
        emails: Vec<String>,
    },
}

fn load_config(path: Option<&Path>, input: Option<PathBuf>, no_translate: bool) -> anyhow::Result<Config> {
    let mut config = Config::load(path).context("loading configuration")?;
    if let Some(input) = input {
        config.paths.input = input;
    }
    if no_translate {
        config.translation.enabled = false;
    }
    Ok(config)
}

fn print_report(report: &CleanReport) {
    println!("\n📊 Cleaning results:");
    println!("   Run id: {}", report.run_id);
    println!("   Input rows: {}", report.input_rows);
    println!("   Clean rows: {}", report.clean_rows);
    println!("   Invalid emails: {}", report.invalid_email_rows);
    println!("   Duplicates: {}", report.duplicate_rows);
    println!("   Dropped columns: {}", report.dropped_columns.join(", "));
    if !report.absent_columns.is_empty() {
        println!("   Absent columns: {}", report.absent_columns.join(", "));
    }
    for output in &report.outputs {
        println!("   {} ({} rows): {}", output.target, output.rows, output.path.display());
    }

    if report.translation_failures > 0 {
        println!("\n⚠️  {} headers kept untranslated:", report.translation_failures);
        for header in report.headers.iter().filter(|h| h.status == HeaderStatus::Fallback) {
            println!("   - {}", header.original);
        }
    }
}

/// Print each address with its verdict; true when all are valid
fn check_emails(emails: &[String]) -> bool {
    let mut all_valid = true;
    for email in emails {
        if is_valid_email(email) {
            println!("✅ {}", email);
        } else {
            all_valid = false;
            println!("❌ {}", email);
        }
    }
    all_valid
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();
    let _log_guard = init_logging(Path::new("logs"));
    metrics::describe_metrics();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            input,
            clean,
            garbage,
            no_translate,
            report,
        } => {
            println!("🧹 Running cleaning pipeline...");
            let mut config = load_config(config.as_deref(), input, no_translate)?;
            if let Some(clean) = clean {
                config.paths.clean = clean;
            }
            if let Some(garbage) = garbage {
                config.paths.garbage = garbage;
            }
            let use_case = CleanUseCase::from_config(config)?;
            match use_case.run().await {
                Ok(result) => {
                    print_report(&result);
                    if let Some(path) = report {
                        result
                            .persist_to_json(&path)
                            .with_context(|| format!("writing report to {}", path.display()))?;
                        info!("Report written to {}", path.display());
                        println!("   Report: {}", path.display());
                    }
                    println!("✅ Cleaning run completed successfully");
                }
                Err(e) => {
                    error!("Cleaning run failed: {}", e);
                    println!("❌ Cleaning run failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::TranslateHeaders {
            config,
            input,
            no_translate,
        } => {
            println!("🌐 Translating headers...");
            let config = load_config(config.as_deref(), input, no_translate)?;
            let use_case = CleanUseCase::from_config(config)?;
            let (_, headers) = use_case.load_and_translate().await?;
            for header in &headers {
                println!("   {} -> {} ({})", header.original, header.translated, header.status.as_str());
            }
        }
        Commands::CheckEmail { emails } => {
            if !check_emails(&emails) {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
