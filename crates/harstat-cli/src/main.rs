//! harstat CLI entrypoint
//! Parses command-line arguments and runs the extraction pipeline.

// Internal imports (std, crate)
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

// External imports (alphabetized)
use anyhow::Context;
use clap::Parser;
use harstat_core::report::{self, DEFAULT_FILE_NAME};
use harstat_core::{Capture, Config, CredentialStrategy, ExtractionMode, Outcome, Pipeline};
use tokio::fs;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "harstat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Extract a daily metrics report from a HAR capture
    Extract {
        /// Path to the HAR file
        har: PathBuf,
        /// Site or branch name stamped on every row (prompted if omitted)
        #[arg(long)]
        label: Option<String>,
        /// Spreadsheet to write (default: report.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Configuration file (default: ~/.harstat/config.yaml if present)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Extraction strategy
        #[arg(long, value_enum)]
        mode: Option<ExtractionMode>,
        /// Completion model name
        #[arg(long)]
        model: Option<String>,
        /// Maximum characters per completion request
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Concurrent completion requests
        #[arg(long)]
        workers: Option<usize>,
        /// How API keys are assigned to requests
        #[arg(long, value_enum)]
        credential_strategy: Option<CredentialStrategy>,
        /// Print the table as JSON instead of a text grid
        #[arg(long)]
        json: bool,
    },
    /// Write a configuration file with default values
    InitConfig {
        /// Destination (default: ~/.harstat/config.yaml)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Extract {
            har,
            label,
            output,
            config,
            mode,
            model,
            chunk_size,
            workers,
            credential_strategy,
            json,
        } => {
            let mut config = load_config(config.as_deref()).await?;
            if let Some(mode) = mode {
                config.mode = mode;
            }
            if let Some(model) = model {
                config.model = model;
            }
            if let Some(chunk_size) = chunk_size {
                config.chunk_size = chunk_size;
            }
            if workers.is_some() {
                config.workers = workers;
            }
            if let Some(strategy) = credential_strategy {
                config.credential_strategy = strategy;
            }

            // Keys and settings are checked before the capture is touched
            let pipeline = Pipeline::from_config(config)
                .await
                .context("Invalid configuration")?;

            let capture = Capture::from_file(&har)
                .await
                .with_context(|| format!("Failed to load capture {}", har.display()))?;
            tracing::info!("Loaded {} entries from {}", capture.len(), har.display());

            let label = match label {
                Some(label) => label,
                None => prompt_label()?,
            };

            match pipeline.run_capture(&capture, &label).await {
                Outcome::Table(table) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&table)?);
                    } else {
                        print!("{}", table.render_text());
                    }

                    let output = output.unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_NAME));
                    let bytes = report::to_xlsx(&table).context("Failed to build spreadsheet")?;
                    fs::write(&output, bytes)
                        .await
                        .with_context(|| format!("Failed to write {}", output.display()))?;
                    println!("✅ Wrote {} rows to {}", table.len(), output.display());
                }
                Outcome::NoEntries => {
                    println!(
                        "No analytics responses found in {}. Record the capture while the performance dashboard loads.",
                        har.display()
                    );
                }
                Outcome::NoRecords { entries } => {
                    println!(
                        "Found {} analytics responses but no daily records could be extracted.",
                        entries
                    );
                }
            }
        }
        Commands::InitConfig { path, force } => {
            let path = match path {
                Some(path) => path,
                None => Config::default_path()
                    .context("Could not determine the home directory; pass --path")?,
            };
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            Config::default().save(&path).await?;
            println!("Wrote default configuration to {}", path.display());
        }
    }
    Ok(())
}

/// Explicit config file, else the default location if it exists, else defaults.
async fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = path {
        return Config::from_file(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()));
    }
    match Config::default_path() {
        Some(path) if path.exists() => {
            tracing::debug!("Using config {}", path.display());
            Config::from_file(&path)
                .await
                .with_context(|| format!("Failed to load config {}", path.display()))
        }
        _ => Ok(Config::default()),
    }
}

/// Ask for the label on an interactive terminal; empty otherwise.
fn prompt_label() -> anyhow::Result<String> {
    if !std::io::stdin().is_terminal() {
        return Ok(String::new());
    }
    let label: String = dialoguer::Input::<String>::new()
        .with_prompt("Label (site or branch name)")
        .allow_empty(true)
        .interact_text()
        .context("Failed to read label")?;
    Ok(label.trim().to_string())
}
