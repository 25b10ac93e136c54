use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use exifdate_core::{DateParserRegistry, ExifDateStore, RunOptions, DEFAULT_CONFIG};

#[derive(Parser)]
#[command(name = "exifdate", version, about = "Set missing EXIF capture dates from file and folder names")]
struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG overrides this.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory tree and date the photos that have no capture date
    Run(RunArgs),

    /// Validate a rule file and list its rules in evaluation order
    CheckConfig {
        /// YAML rule file
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Show the date the rules infer for each path, without reading or writing metadata
    Match {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// YAML rule file
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Directory to scan recursively
    directory: PathBuf,

    /// Write the dates (default is a dry run that only reports)
    #[arg(
        long = "wet_run",
        visible_alias = "wet-run",
        value_name = "BOOL",
        default_value_t = false,
        num_args = 0..=1,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    wet_run: bool,

    /// YAML rule file
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Keep each rewritten photo's modification time
    #[arg(
        long = "preserve_mtime",
        visible_alias = "preserve-mtime",
        value_name = "BOOL",
        default_value_t = false,
        num_args = 0..=1,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    preserve_mtime: bool,

    /// Also write the run summary as JSON to this path
    #[arg(long = "summary_json", visible_alias = "summary-json")]
    summary_json: Option<PathBuf>,

    /// Show a progress bar
    #[arg(long)]
    progress: bool,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("exifdate_core={level},exifdate={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_registry(config: &Path) -> anyhow::Result<DateParserRegistry> {
    exifdate_core::load_rules(config)
        .with_context(|| format!("Invalid configuration {}", config.display()))
}

fn run(args: RunArgs) -> anyhow::Result<()> {
    let t_total = std::time::Instant::now();
    let registry = load_registry(&args.config)?;

    let options = RunOptions {
        root: args.directory,
        wet_run: args.wet_run,
        preserve_mtime: args.preserve_mtime,
    };

    let pb = if args.progress {
        let pb = ProgressBar::new(0);
        pb.set_style(ProgressStyle::default_bar().template("[{bar:40}] {pos}/{len} {wide_msg}")?);
        Some(pb)
    } else {
        None
    };

    let report = exifdate_core::process(&options, &registry, &ExifDateStore, &|_stage, current, total, message| {
        if let Some(pb) = &pb {
            pb.set_length(total);
            pb.set_position(current + 1);
            pb.set_message(message.to_string());
        }
    })?;

    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    for conflict in &report.conflicts {
        eprintln!(
            "Conflict: {} has {} but its name says {}",
            conflict.path.display(),
            conflict.existing,
            conflict.candidate
        );
    }
    for failure in &report.failures {
        eprintln!("Failed: {}: {}", failure.path.display(), failure.reason);
    }

    let (changed_label, changed) = if report.wet_run {
        ("updated", report.applied)
    } else {
        ("would update", report.planned)
    };
    eprintln!(
        "Done! {} photos: {} {}, {} already correct, {} without date, {} conflicts, {} failed ({:.2}s)",
        report.files_seen,
        changed,
        changed_label,
        report.already_correct,
        report.no_candidate,
        report.refused,
        report.failed,
        t_total.elapsed().as_secs_f64()
    );
    if !report.traversal_errors.is_empty() {
        eprintln!("{} directories could not be read", report.traversal_errors.len());
    }
    if report.has_failures() {
        eprintln!("Some photos were left unchanged because of errors; rerun with -v for details");
    }
    if !report.orphaned_temp_files.is_empty() {
        eprintln!(
            "{} temporary files from an interrupted run can be deleted",
            report.orphaned_temp_files.len()
        );
    }

    if let Some(path) = &args.summary_json {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write summary {}", path.display()))?;
    }

    // Folder list goes to stdout for downstream re-indexing.
    if report.changed_folders.is_empty() {
        tracing::info!("No directories were updated.");
    }
    for folder in report.changed_folders() {
        println!("{}", folder.display());
    }

    Ok(())
}

fn check_config(config: PathBuf) -> anyhow::Result<()> {
    let registry = load_registry(&config)?;
    for (i, rule) in registry.rules().iter().enumerate() {
        println!("#{} {}", i + 1, rule);
    }
    eprintln!("{}: {} rules OK", config.display(), registry.len());
    Ok(())
}

fn match_paths(paths: Vec<PathBuf>, config: PathBuf) -> anyhow::Result<()> {
    let registry = load_registry(&config)?;
    for path in &paths {
        match registry.match_path(path) {
            Some(m) => println!("{}\t{}\t{}", path.display(), m.date, m.rule.label()),
            None => println!("{}\t-", path.display()),
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Run(args) => run(args),
        Command::CheckConfig { config } => check_config(config),
        Command::Match { paths, config } => match_paths(paths, config),
    }
}
