pub mod config;
pub mod date;
pub mod error;
pub mod metadata;
pub mod policy;
pub mod report;
pub mod rules;
pub mod scan;
pub mod writer;

#[cfg(test)]
mod test_support;

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub use config::{load_rules, parse_rules, DEFAULT_CONFIG};
pub use date::PhotoDate;
pub use error::{ConfigError, MetadataError, RuleError, RunError, WriteError};
pub use metadata::{DateStore, ExifDateStore};
pub use policy::{decide, Decision};
pub use report::{FileOutcome, RunReport, SkipReason};
pub use rules::{DateParserRegistry, ParseRule, RuleMatch};
pub use writer::{AtomicWriter, StagedWrite};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub root: PathBuf,
    /// Write dates. When false every decision is only reported.
    pub wet_run: bool,
    pub preserve_mtime: bool,
}

/// Type alias for progress callback: `(stage, current, total, message)`.
/// The lifetime lets callers pass closures that borrow local state.
pub type ProgressCallback<'a> = dyn Fn(&str, u64, u64, &str) + Send + Sync + 'a;

/// Throttled progress reporter: emits at most every 200ms, and always on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback<'a>,
    last_emit: Cell<Option<Instant>>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback<'a>) -> Self {
        Self {
            inner,
            last_emit: Cell::new(None),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = current + 1 >= total;
        if !is_done {
            if let Some(last) = self.last_emit.get() {
                if last.elapsed() < Duration::from_millis(200) {
                    return;
                }
            }
            self.last_emit.set(Some(Instant::now()));
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Walk `options.root` and bring every photo through parse → decide → (write).
///
/// Only a missing or non-directory root is fatal. Everything that goes wrong
/// for a single photo or subdirectory ends up in the returned report.
pub fn process(
    options: &RunOptions,
    registry: &DateParserRegistry,
    store: &dyn DateStore,
    progress_callback: &ProgressCallback<'_>,
) -> Result<RunReport, RunError> {
    let tp = ThrottledProgress::new(progress_callback);
    let root = options.root.as_path();

    if !root.exists() {
        return Err(RunError::RootNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(RunError::NotADirectory(root.to_path_buf()));
    }

    let mode = if options.wet_run { "wet run" } else { "dry run" };
    tracing::info!(
        root = %root.display(),
        mode,
        rules = registry.len(),
        "starting"
    );

    // Stage 1: discover photos
    let scan = scan::scan_images(root);
    let mut report = RunReport::new(options.wet_run);
    report.traversal_errors = scan.errors;
    report.orphaned_temp_files = scan.orphans;

    // Dry runs never get a writer, so nothing below can modify a file.
    let writer = options
        .wet_run
        .then(|| AtomicWriter::new(store).preserve_mtime(options.preserve_mtime));

    // Stage 2: one photo at a time
    let total = scan.files.len() as u64;
    let mut current_dir: Option<&Path> = None;
    for (i, path) in scan.files.iter().enumerate() {
        let dir = path.parent();
        if dir != current_dir {
            if let Some(d) = dir {
                tracing::info!("Processing directory: {}", d.display());
            }
            current_dir = dir;
        }

        let outcome = process_file(path, registry, store, writer.as_ref());
        report.record(path, &outcome);
        tp.report("process", i as u64, total, &path.display().to_string());
    }

    tracing::info!(
        files = report.files_seen,
        applied = report.applied,
        planned = report.planned,
        already_correct = report.already_correct,
        no_candidate = report.no_candidate,
        refused = report.refused,
        failed = report.failed,
        "done"
    );
    Ok(report)
}

/// Run one photo to its terminal state. Pass `writer: None` for a dry run.
pub fn process_file(
    path: &Path,
    registry: &DateParserRegistry,
    store: &dyn DateStore,
    writer: Option<&AtomicWriter>,
) -> FileOutcome {
    // Rules first: no I/O until a candidate exists.
    let Some(RuleMatch { rule, date: candidate }) = registry.match_path(path) else {
        tracing::debug!(path = %path.display(), "no rule matched");
        return FileOutcome::Skipped(SkipReason::NoCandidate);
    };
    tracing::debug!(path = %path.display(), rule = rule.label(), date = %candidate, "candidate");

    let existing = match store.read_date(path) {
        Ok(existing) => existing,
        Err(err) => {
            tracing::warn!(path = %path.display(), "cannot read metadata: {err}");
            return FileOutcome::Failed(err.to_string());
        }
    };

    match decide(existing, Some(candidate)) {
        Decision::SkipNoCandidate => FileOutcome::Skipped(SkipReason::NoCandidate),
        Decision::SkipAlreadyCorrect => {
            tracing::debug!(path = %path.display(), "date already set");
            FileOutcome::Skipped(SkipReason::AlreadyCorrect)
        }
        Decision::RefuseConflict {
            existing,
            candidate,
        } => {
            tracing::warn!(
                path = %path.display(),
                %existing,
                %candidate,
                "existing date differs from the inferred one, leaving file untouched"
            );
            FileOutcome::Refused {
                existing,
                candidate,
            }
        }
        Decision::Apply(_) if !store.supports_write(path) => {
            let err = MetadataError::Unsupported {
                path: path.to_path_buf(),
            };
            tracing::warn!(path = %path.display(), "{err}");
            FileOutcome::Failed(err.to_string())
        }
        Decision::Apply(date) => match writer {
            None => {
                tracing::info!("Would update EXIF date for {} to {}", path.display(), date);
                FileOutcome::Planned(date)
            }
            Some(writer) => match writer.write(path, &date) {
                Ok(()) => {
                    tracing::info!("Updated EXIF date for {} to {}", path.display(), date);
                    FileOutcome::Applied(date)
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), "write failed, original kept: {err}");
                    FileOutcome::Failed(err.to_string())
                }
            },
        },
    }
}
