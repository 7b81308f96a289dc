//! Elspais CLI: requirement traceability checks.
//!
//! Usage:
//!   elspais validate [PATHS...] [--json] [--git-summary file.json]
//!   elspais coverage [PATHS...] [--json]
//!   elspais hash update [PATHS...]

use clap::{Args, Parser, Subcommand};
use elspais::{GitChangeSummary, NodeKind, Pipeline, SourceSet, TraceConfig, TraceError, TraceResult};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::{DirEntry, WalkDir};

/// Config file looked up in the working directory when `--config` is absent
const DEFAULT_CONFIG: &str = ".elspais.yaml";

/// Extensions scanned for requirements and references
const SOURCE_EXTENSIONS: &[&str] = &[
    "md", "rs", "py", "js", "ts", "tsx", "go", "java", "kt", "c", "h", "cc", "cpp", "hpp", "cs",
    "rb", "sh", "sql", "swift", "dart", "lua",
];

const SKIPPED_DIRS: &[&str] = &["target", "node_modules", "vendor", "build", "dist"];

#[derive(Parser)]
#[command(
    name = "elspais",
    version,
    about = "Requirement traceability: coverage, hash drift and structure checks"
)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log pipeline progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Inputs {
    /// Files or directories to scan
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every rule and exit non-zero on errors
    Validate {
        #[command(flatten)]
        inputs: Inputs,
        /// Emit the full report as JSON
        #[arg(long)]
        json: bool,
        /// JSON file with modified/untracked/branch_changed path lists
        #[arg(long)]
        git_summary: Option<PathBuf>,
    },
    /// Print per-requirement coverage
    Coverage {
        #[command(flatten)]
        inputs: Inputs,
        /// Emit coverage as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage stored content hashes
    Hash {
        #[command(subcommand)]
        action: HashAction,
    },
}

#[derive(Subcommand)]
enum HashAction {
    /// Rewrite missing or stale hashes on closing markers
    Update {
        #[command(flatten)]
        inputs: Inputs,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "elspais=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> TraceResult<TraceConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None if Path::new(DEFAULT_CONFIG).is_file() => PathBuf::from(DEFAULT_CONFIG),
        None => return Ok(TraceConfig::default()),
    };
    let text = std::fs::read_to_string(&path)?;
    Ok(serde_yaml::from_str(&text)?)
}

fn is_skipped(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    entry.depth() > 0
        && entry.file_type().is_dir()
        && (name.starts_with('.') || SKIPPED_DIRS.iter().any(|d| *d == name))
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e))
}

fn relative(path: &Path) -> PathBuf {
    path.strip_prefix("./").unwrap_or(path).to_path_buf()
}

/// Enumerate input files once each, in a stable order
fn discover(inputs: &Inputs) -> Vec<PathBuf> {
    let mut files = BTreeSet::new();
    for root in &inputs.paths {
        if root.is_file() {
            files.insert(relative(root));
            continue;
        }
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped(e));
        for entry in walker.filter_map(Result::ok) {
            if entry.file_type().is_file() && has_source_extension(entry.path()) {
                files.insert(relative(entry.path()));
            }
        }
    }
    files.into_iter().collect()
}

fn cmd_validate(
    pipeline: &Pipeline,
    inputs: &Inputs,
    json: bool,
    git_summary: Option<&Path>,
) -> TraceResult<i32> {
    let git = git_summary.map(GitChangeSummary::from_json_file).transpose()?;
    let sources = SourceSet::load(&discover(inputs));
    let run = pipeline.run(&sources, git.as_ref());

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        for violation in &run.report.violations {
            println!("{}", violation);
        }
        println!(
            "{} files, {} requirements: {} errors, {} warnings, {} suppressed",
            sources.len(),
            run.graph.nodes_of_kind(NodeKind::Requirement).count(),
            run.report.count(elspais::Severity::Error),
            run.report.count(elspais::Severity::Warning),
            run.report.suppressed.len()
        );
    }
    Ok(if run.passed() { 0 } else { 1 })
}

fn cmd_coverage(pipeline: &Pipeline, inputs: &Inputs, json: bool) -> TraceResult<i32> {
    let sources = SourceSet::load(&discover(inputs));
    let run = pipeline.run(&sources, None);

    if json {
        println!("{}", serde_json::to_string_pretty(&run.coverage)?);
        return Ok(0);
    }
    if run.coverage.requirements.is_empty() {
        println!("No requirements found.");
        return Ok(0);
    }
    println!("{:<20}  {:>8}  {:<24}", "REQUIREMENT", "COVERAGE", "COVERED");
    println!("{}", "-".repeat(56));
    for entry in &run.coverage.requirements {
        println!(
            "{:<20}  {:>7.0}%  {}/{} {}",
            entry.id.as_str(),
            entry.coverage * 100.0,
            entry.covered.len(),
            entry.assertions.len(),
            entry.covered.join(",")
        );
    }
    Ok(0)
}

fn cmd_hash_update(pipeline: &Pipeline, inputs: &Inputs) -> TraceResult<i32> {
    let sources = SourceSet::load(&discover(inputs));
    let report = pipeline.update_hashes(Path::new(""), &sources);

    for update in &report.updated {
        println!(
            "{}: {} -> {}",
            update.id,
            update.stored.as_deref().unwrap_or("(none)"),
            update.computed
        );
    }
    for failure in &report.failures {
        eprintln!("Error: {}", failure);
    }
    println!("{} files updated", report.files_written.len());
    Ok(if report.is_clean() { 0 } else { 1 })
}

fn run(cli: Cli) -> Result<i32, TraceError> {
    let config = load_config(cli.config.as_deref())?;
    let pipeline = Pipeline::new(&config)?;
    match cli.command {
        Commands::Validate {
            inputs,
            json,
            git_summary,
        } => cmd_validate(&pipeline, &inputs, json, git_summary.as_deref()),
        Commands::Coverage { inputs, json } => cmd_coverage(&pipeline, &inputs, json),
        Commands::Hash {
            action: HashAction::Update { inputs },
        } => cmd_hash_update(&pipeline, &inputs),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            2
        }
    };
    std::process::exit(code);
}
