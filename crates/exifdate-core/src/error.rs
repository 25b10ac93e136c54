use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A single rule definition that cannot be used.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),
    #[error("regex is missing the named group `{0}`")]
    MissingGroup(&'static str),
    #[error("folder name must not be empty")]
    EmptyFolderName,
    #[error("invalid date `{0}`, expected YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS")]
    InvalidDate(String),
}

/// Fatal: the rule file cannot be loaded. Raised before any photo is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config is not a YAML list of rules: {0}")]
    Syntax(#[from] serde_yaml::Error),
    #[error("config contains no rules")]
    Empty,
    #[error("rule #{index}: {source}")]
    InvalidEntry {
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("rule #{index}: {source}")]
    InvalidRule {
        index: usize,
        #[source]
        source: RuleError,
    },
}

/// Reading or writing the embedded date failed.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed metadata in {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: exif::Error,
    },
    #[error("unreadable DateTimeOriginal `{value}` in {}", path.display())]
    UnreadableDate { path: PathBuf, value: String },
    #[error("EXIF writing is not supported for {}", path.display())]
    Unsupported { path: PathBuf },
    #[error("failed to write EXIF to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Per-file write failure. The original file is left untouched whenever this is returned.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("{} is not a regular file", .0.display())]
    NotRegularFile(PathBuf),
    #[error("{} is read-only", .0.display())]
    ReadOnly(PathBuf),
    #[error("{} has no parent directory", .0.display())]
    NoParent(PathBuf),
    #[error("temporary file for {} would land on a different device", .0.display())]
    CrossDevice(PathBuf),
    #[error("failed to stage {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("failed to replace {}: {source}", path.display())]
    Rename {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Fatal: the run cannot start.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("directory {} does not exist", .0.display())]
    RootNotFound(PathBuf),
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
}
