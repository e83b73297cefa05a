//! CLI entry point for the course achievement rater.
//!
//! Provides subcommands for analyzing grade-sheet workbooks, printing the
//! default weighting configuration, and checking a configuration file.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use achievement_rater::analyzers::analyzer::analyze_workbook;
use achievement_rater::config::{Apportion, ComponentWeights, StudentOrder, WeightConfig};
use achievement_rater::error::AnalysisError;
use achievement_rater::output::{self, ReportEnvelope, ReportPaths};
use achievement_rater::source::{discover_inputs, load_workbook, stem};
use anyhow::{Result, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::Instrument;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "achievement_rater")]
#[command(about = "A tool to compute course objective achievement from grade sheets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze grade-sheet workbooks (.csv or .json files, or directories of them)
    Analyze {
        /// Input files or directories
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Directory to write reports to
        #[arg(short, long, default_value = "reports")]
        output_dir: PathBuf,

        /// JSON weighting configuration; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,

        /// Maximum number of workbooks analyzed at once
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// Gzip compress the JSON report
        #[arg(long, default_value_t = false)]
        gzip: bool,

        /// Replace existing reports instead of writing `_1`, `_2`, ... copies
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
    /// Print the default weighting configuration as JSON
    Defaults,
    /// Validate a weighting configuration file
    CheckConfig {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Args)]
struct Overrides {
    /// Objective weights, e.g. `0.5,0.3,0.2`
    #[arg(long, value_delimiter = ',')]
    objective_weights: Option<Vec<f64>>,

    /// Usual and final exam weights, e.g. `0.3,0.7`
    #[arg(long, value_delimiter = ',')]
    component_weights: Option<Vec<f64>>,

    /// Expectation threshold in [0, 1]
    #[arg(long)]
    expectation: Option<f64>,

    /// Full mark of the total score
    #[arg(long)]
    full_mark: Option<f64>,

    /// How a single total score is split across objectives
    #[arg(long, value_enum)]
    apportion: Option<Apportion>,

    /// Student table order
    #[arg(long, value_enum)]
    order: Option<StudentOrder>,
}

impl Overrides {
    fn apply(self, mut config: WeightConfig) -> Result<WeightConfig> {
        if let Some(weights) = self.objective_weights {
            let Ok(weights) = <[f64; 3]>::try_from(weights.as_slice()) else {
                bail!("--objective-weights takes three values, got {}", weights.len());
            };
            config.objective_weights = weights;
        }
        if let Some(weights) = self.component_weights {
            let [usual, final_exam] = weights[..] else {
                bail!("--component-weights takes two values, got {}", weights.len());
            };
            config.component_weights = ComponentWeights { usual, final_exam };
        }
        if let Some(threshold) = self.expectation {
            config.expectation_threshold = threshold;
        }
        if let Some(full_mark) = self.full_mark {
            config.full_mark = full_mark;
        }
        if let Some(apportion) = self.apportion {
            config.apportion = apportion;
        }
        if let Some(order) = self.order {
            config.order = order;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/achievement_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("achievement_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            inputs,
            output_dir,
            config,
            overrides,
            concurrency,
            gzip,
            overwrite,
        } => {
            let base = match config {
                Some(path) => WeightConfig::load(&path)?,
                None => WeightConfig::default(),
            };
            let config = overrides.apply(base)?.validated()?;
            analyze_all(&inputs, &output_dir, config, concurrency, gzip, overwrite).await?;
        }
        Commands::Defaults => {
            println!("{}", serde_json::to_string_pretty(&WeightConfig::default())?);
        }
        Commands::CheckConfig { config } => {
            let loaded = WeightConfig::load(&config)?;
            match loaded.validated() {
                Ok(_) => info!(config = %config.display(), "Configuration is valid"),
                Err(e) => {
                    error!(config = %config.display(), error = %e, "Configuration is invalid");
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}

/// Analyzes every input concurrently and writes one report set per workbook.
#[tracing::instrument(skip(inputs, config, output_dir), fields(output_dir = %output_dir.display()))]
async fn analyze_all(
    inputs: &[PathBuf],
    output_dir: &Path,
    config: WeightConfig,
    concurrency: usize,
    gzip: bool,
    overwrite: bool,
) -> Result<()> {
    let paths = discover_inputs(inputs)?;
    if paths.is_empty() {
        bail!("no .csv or .json inputs found");
    }
    info!(inputs = paths.len(), "Starting analysis");

    std::fs::create_dir_all(output_dir)?;

    let config = Arc::new(config);
    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
    let mut tasks = vec![];

    for path in paths {
        let sem = semaphore.clone();
        let config = config.clone();
        let output_dir = output_dir.to_path_buf();

        let span = tracing::info_span!("workbook", path = %path.display());

        let task = tokio::spawn(
            async move {
                let _permit = sem.acquire().await?;
                let current = tracing::Span::current();
                let input = path.clone();
                tokio::task::spawn_blocking(move || {
                    let _entered = current.enter();
                    process_input(&input, &config, &output_dir, gzip, overwrite)
                })
                .await?
                .inspect_err(|e| error!(error = %e, "Workbook failed"))?;
                Ok::<_, anyhow::Error>(path)
            }
            .instrument(span),
        );
        tasks.push(task);
    }

    let total = tasks.len();
    let mut failed = 0;
    for task in tasks {
        match task.await {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => failed += 1,
            Err(e) => {
                error!(error = %e, "Workbook task panicked");
                failed += 1;
            }
        }
    }

    info!(total, failed, output_dir = %output_dir.display(), "Finished processing all inputs");
    if failed > 0 {
        bail!("{failed} of {total} inputs failed");
    }
    Ok(())
}

/// Loads, analyzes and writes out one workbook.
fn process_input(
    path: &Path,
    config: &WeightConfig,
    output_dir: &Path,
    gzip: bool,
    overwrite: bool,
) -> Result<()> {
    let workbook = load_workbook(path)?;

    let analysis = match analyze_workbook(&workbook, config) {
        Ok(analysis) => analysis,
        Err(e) => {
            let AnalysisError::NoStudents { errors, .. } = &e;
            for err in errors {
                warn!(error = %err, "Sheet error");
            }
            return Err(e.into());
        }
    };

    output::print_pretty(&analysis.report);
    output::log_summary(&analysis.report);

    let paths = ReportPaths::new(output_dir, &stem(path), gzip, overwrite);
    let envelope = ReportEnvelope {
        generated_at: Utc::now(),
        source: path.display().to_string(),
        warnings: analysis.sheet_errors.iter().map(ToString::to_string).collect(),
        report: &analysis.report,
    };
    output::write_report_json(&paths.report, &envelope, gzip)?;
    output::write_student_csv(&paths.students, &analysis.report)?;
    output::write_distribution_csv(&paths.distribution, &analysis.report)?;

    info!(
        report = %paths.report.display(),
        students = analysis.report.calculation.student_table.len(),
        warnings = envelope.warnings.len(),
        "Report written"
    );
    Ok(())
}
