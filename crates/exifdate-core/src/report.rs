use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::date::PhotoDate;
use crate::scan::TraversalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoCandidate,
    AlreadyCorrect,
}

/// Terminal state of one photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Date written (wet run).
    Applied(PhotoDate),
    /// Date would be written (dry run).
    Planned(PhotoDate),
    Skipped(SkipReason),
    Refused { existing: PhotoDate, candidate: PhotoDate },
    Failed(String),
}

impl FileOutcome {
    /// Counts towards the folder list printed at the end of a run.
    pub fn is_actionable(&self) -> bool {
        matches!(self, FileOutcome::Applied(_) | FileOutcome::Planned(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Conflict {
    pub path: PathBuf,
    pub existing: PhotoDate,
    pub candidate: PhotoDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome counts and the folders that received (or would receive) a date.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub wet_run: bool,
    pub files_seen: u64,
    pub applied: u64,
    pub planned: u64,
    pub already_correct: u64,
    pub no_candidate: u64,
    pub refused: u64,
    pub failed: u64,
    pub changed_folders: BTreeSet<PathBuf>,
    pub conflicts: Vec<Conflict>,
    pub failures: Vec<Failure>,
    pub traversal_errors: Vec<TraversalError>,
    pub orphaned_temp_files: Vec<PathBuf>,
}

impl RunReport {
    pub fn new(wet_run: bool) -> Self {
        Self {
            wet_run,
            ..Self::default()
        }
    }

    pub fn record(&mut self, path: &Path, outcome: &FileOutcome) {
        self.files_seen += 1;
        match outcome {
            FileOutcome::Applied(_) => self.applied += 1,
            FileOutcome::Planned(_) => self.planned += 1,
            FileOutcome::Skipped(SkipReason::AlreadyCorrect) => self.already_correct += 1,
            FileOutcome::Skipped(SkipReason::NoCandidate) => self.no_candidate += 1,
            FileOutcome::Refused {
                existing,
                candidate,
            } => {
                self.refused += 1;
                self.conflicts.push(Conflict {
                    path: path.to_path_buf(),
                    existing: *existing,
                    candidate: *candidate,
                });
            }
            FileOutcome::Failed(reason) => {
                self.failed += 1;
                self.failures.push(Failure {
                    path: path.to_path_buf(),
                    reason: reason.clone(),
                });
            }
        }

        if outcome.is_actionable() {
            if let Some(folder) = path.parent() {
                self.changed_folders.insert(folder.to_path_buf());
            }
        }
    }

    /// Sorted list of folders with at least one actionable change.
    pub fn changed_folders(&self) -> impl Iterator<Item = &Path> {
        self.changed_folders.iter().map(PathBuf::as_path)
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || !self.traversal_errors.is_empty()
    }

    pub fn write_json(&self, path: &Path) -> io::Result<()> {
        let file = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date(s: &str) -> PhotoDate {
        PhotoDate::parse_iso(s).unwrap()
    }

    #[test]
    fn test_record_counts_and_folders() {
        let mut report = RunReport::new(true);
        report.record(Path::new("/p/a/1.jpg"), &FileOutcome::Applied(date("2021-06-01")));
        report.record(Path::new("/p/a/2.jpg"), &FileOutcome::Applied(date("2021-06-01")));
        report.record(Path::new("/p/b/3.jpg"), &FileOutcome::Skipped(SkipReason::NoCandidate));
        report.record(
            Path::new("/p/c/4.jpg"),
            &FileOutcome::Refused {
                existing: date("2020-01-01"),
                candidate: date("2021-06-01"),
            },
        );
        report.record(Path::new("/p/d/5.jpg"), &FileOutcome::Failed("disk full".into()));

        assert_eq!(report.files_seen, 5);
        assert_eq!(report.applied, 2);
        assert_eq!(report.no_candidate, 1);
        assert_eq!(report.refused, 1);
        assert_eq!(report.failed, 1);
        let folders: Vec<&Path> = report.changed_folders().collect();
        assert_eq!(folders, [Path::new("/p/a")]);
        assert_eq!(report.conflicts[0].path, Path::new("/p/c/4.jpg"));
        assert!(report.has_failures());
    }

    #[test]
    fn test_planned_marks_folder() {
        let mut report = RunReport::new(false);
        report.record(Path::new("/p/x/1.jpg"), &FileOutcome::Planned(date("2021-06-01")));
        assert_eq!(report.planned, 1);
        assert_eq!(report.changed_folders.len(), 1);
        assert!(!report.has_failures());
    }

    #[test]
    fn test_write_json() {
        let dir = tempdir().unwrap();
        let mut report = RunReport::new(false);
        report.record(Path::new("/p/x/1.jpg"), &FileOutcome::Planned(date("2021-06-01")));
        let out = dir.path().join("summary.json");
        report.write_json(&out).unwrap();

        let value: serde_json::Value =
            serde_json::from_reader(File::open(&out).unwrap()).unwrap();
        assert_eq!(value["planned"], 1);
        assert_eq!(value["wet_run"], false);
        assert_eq!(value["changed_folders"][0], "/p/x");
    }
}
