//! docreview: scan documents for writing-quality issues and manage the
//! adaptive learning store from the command line.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use docreview::config::{self, ConfigError, ReviewConfig};
use docreview::learning::store::pattern_counts;
use docreview::learning::{Decision, LearningDomain, LearningError, LearningStore};
use docreview::pipeline::aggregate::QualityReport;
use docreview::pipeline::checkers::{CheckerRegistry, ConfidenceProvider};
use docreview::pipeline::extraction::{DocumentFormat, ExtractionChain};
use docreview::pipeline::processor::build_processor;
use docreview::scan::{
    ControllerError, FsResultStore, JobStatus, ResultStore, ResultStoreError, ScanController,
    ScanOutcome, ScanRequest, SubmitError,
};

#[derive(Parser)]
#[command(name = "docreview")]
#[command(version, about = "Document review engine")]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long, env = "DOCREVIEW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan one document and print its quality report
    Scan {
        path: PathBuf,

        /// Format hint (extension or MIME type); defaults to the file name
        #[arg(long)]
        format: Option<String>,

        /// Checker id to run; repeat to run several. Default: all
        #[arg(long = "checker")]
        checkers: Vec<String>,

        /// Job timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,

        /// Ignore the learning store
        #[arg(long)]
        no_learning: bool,

        /// Keep the stored outcome in the results directory
        #[arg(long)]
        keep_result: bool,
    },

    /// Manage the adaptive learning store
    Learn {
        #[command(subcommand)]
        command: LearnCommand,
    },

    /// List the registered checkers
    Checkers,

    /// List the extraction backends tried for each format
    Backends,
}

#[derive(Subcommand)]
enum LearnCommand {
    /// Record an accept/reject decision
    Record {
        #[arg(long)]
        domain: LearningDomain,
        /// Rule id or candidate category
        #[arg(long)]
        category: String,
        #[arg(long)]
        candidate: String,
        #[arg(long)]
        decision: Decision,
        /// Context tokens stored with the decision
        #[arg(long = "context")]
        context: Vec<String>,
    },

    /// Export patterns and decisions to a JSON bundle
    Export {
        path: PathBuf,
        /// Domain to export; repeat for several. Default: all
        #[arg(long = "domain")]
        domains: Vec<LearningDomain>,
    },

    /// Merge a JSON bundle into the local store
    Import { path: PathBuf },

    /// Show the learned patterns of a domain, or pattern counts per domain
    Show {
        #[arg(long)]
        domain: Option<LearningDomain>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Learning(#[from] LearningError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Controller(#[from] ControllerError),

    #[error(transparent)]
    ResultStore(#[from] ResultStoreError),

    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("scan {status}: {message}")]
    ScanFailed { status: JobStatus, message: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    docreview::init_tracing();
    let cli = Cli::parse();
    tracing::debug!(version = config::APP_VERSION, "docreview starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(config::config_path);
    let config = ReviewConfig::load_or_default(&config_path)?;

    match cli.command {
        Command::Scan {
            path,
            format,
            checkers,
            timeout_secs,
            json,
            no_learning,
            keep_result,
        } => {
            let mut request = ScanRequest::from_path(&path).map_err(|source| CliError::Read {
                path: path.clone(),
                source,
            })?;
            if let Some(format) = format {
                request = request.with_format_hint(format);
            }
            if !checkers.is_empty() {
                request = request.with_checkers(checkers);
            }
            if let Some(secs) = timeout_secs {
                request = request.with_timeout(Duration::from_secs(secs));
            }

            let learning = if no_learning {
                None
            } else {
                let store = LearningStore::open(&config::learning_db_path(), config.learning.clone())?;
                Some(Arc::new(store) as Arc<dyn ConfidenceProvider>)
            };
            let report = scan(&config, request, learning, keep_result).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&path, &report);
            }
        }

        Command::Learn { command } => {
            let store = LearningStore::open(&config::learning_db_path(), config.learning.clone())?;
            learn(&store, command)?;
        }

        Command::Backends => {
            let chain = ExtractionChain::standard(config.extraction.clone());
            for format in DocumentFormat::ALL {
                println!("{:<11} {}", format.as_str(), chain.route(format).join(" -> "));
            }
        }

        Command::Checkers => {
            for checker in CheckerRegistry::builtin().checkers() {
                println!(
                    "{:<22} {:<11} {}",
                    checker.id(),
                    checker.group().as_str(),
                    checker.description()
                );
            }
        }
    }
    Ok(())
}

async fn scan(
    config: &ReviewConfig,
    request: ScanRequest,
    learning: Option<Arc<dyn ConfidenceProvider>>,
    keep_result: bool,
) -> Result<QualityReport, CliError> {
    let timeout = request
        .timeout
        .unwrap_or_else(|| config.controller.default_timeout());
    let executor = Arc::new(build_processor(config, learning));
    let store = Arc::new(FsResultStore::new(config::results_dir())?);
    let controller = ScanController::new(
        config.controller.clone(),
        executor,
        Arc::clone(&store) as Arc<dyn ResultStore>,
    )?;

    let job_id = controller.submit(request)?;
    // The controller enforces the timeout; this only bounds the CLI wait.
    let limit = timeout
        .saturating_add(config.controller.grace_period())
        .saturating_add(Duration::from_secs(5));
    let snapshot = controller.wait(job_id, limit).await?;
    let outcome = controller.result(job_id)?;
    controller.shutdown().await;
    if !keep_result {
        store.remove(job_id)?;
    }

    match outcome {
        ScanOutcome::Report(report) => Ok(report),
        ScanOutcome::Failure(failure) => Err(CliError::ScanFailed {
            status: snapshot.status,
            message: failure.message,
        }),
    }
}

fn learn(store: &LearningStore, command: LearnCommand) -> Result<(), CliError> {
    match command {
        LearnCommand::Record {
            domain,
            category,
            candidate,
            decision,
            context,
        } => {
            let recorded = store.record(domain, &category, &candidate, decision, &context)?;
            println!("recorded {} {} for {}", recorded.id, decision, recorded.pattern_key);
        }
        LearnCommand::Export { path, domains } => {
            let bundle = store.export_to_path(&path, &domains)?;
            println!(
                "exported {} patterns, {} decisions to {}",
                bundle.patterns.len(),
                bundle.decisions.len(),
                path.display()
            );
        }
        LearnCommand::Import { path } => {
            let summary = store.import_from_path(&path)?;
            println!(
                "imported {} decisions ({} already known), {} new patterns",
                summary.decisions_imported, summary.decisions_skipped, summary.patterns_created
            );
        }
        LearnCommand::Show { domain: None } => {
            for (domain, count) in pattern_counts(store)? {
                println!("{:<24} {count}", domain.as_str());
            }
        }
        LearnCommand::Show { domain: Some(domain) } => {
            for pattern in store.patterns(domain)? {
                println!(
                    "{:<40} +{:<4} -{:<4} {}",
                    pattern.key,
                    pattern.accept_count,
                    pattern.reject_count,
                    pattern.last_updated.to_rfc3339()
                );
            }
        }
    }
    Ok(())
}

fn print_report(path: &Path, report: &QualityReport) {
    println!("{}: score {:.1}, grade {}", path.display(), report.score, report.grade);
    let m = &report.metrics;
    println!(
        "{} words, {} issues from {} findings ({} suppressed), {} checkers ({} failed)",
        m.word_count,
        report.issues.len(),
        m.total_findings,
        m.suppressed_findings,
        m.checkers_run,
        m.checkers_failed
    );
    for warning in &report.extraction.warnings {
        println!("warning: {warning:?}");
    }
    for issue in &report.issues {
        let location = issue
            .first_location()
            .map(|l| format!("¶{} @{}", l.paragraph, l.offset))
            .unwrap_or_default();
        println!(
            "  [{:<8}] {:<12} {:<14} {} (x{})",
            issue.severity.as_str(),
            issue.rule_id,
            location,
            issue.message,
            issue.occurrences
        );
    }
}
