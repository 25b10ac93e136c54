use std::fmt;
use std::path::{Component, Path};

use regex::{Captures, Regex};
use serde::Deserialize;

use crate::date::PhotoDate;
use crate::error::RuleError;

/// Named groups every filename pattern must define.
pub const REQUIRED_GROUPS: [&str; 3] = ["year", "month", "day"];

/// Extracts a date from the filename stem with a user-supplied pattern.
#[derive(Debug, Clone)]
pub struct FilenameRegexRule {
    name: String,
    pattern: String,
    regex: Regex,
}

impl FilenameRegexRule {
    /// Compile `pattern`, anchored at the start of the stem. The pattern does not
    /// have to consume the whole stem, so `IMG_(?P<year>\d{4})...` also matches
    /// `IMG_20191209_043621_HDR`.
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, RuleError> {
        let regex = Regex::new(&format!("^(?:{pattern})"))?;
        for group in REQUIRED_GROUPS {
            if !regex.capture_names().flatten().any(|n| n == group) {
                return Err(RuleError::MissingGroup(group));
            }
        }
        Ok(Self {
            name: name.into(),
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn try_match(&self, path: &Path) -> Option<PhotoDate> {
        let stem = path.file_stem()?.to_str()?;
        let caps = self.regex.captures(stem)?;
        date_from_captures(&caps)
    }
}

/// Missing or non-participating time groups count as zero.
/// Any unparseable or out-of-range field makes the whole match invalid.
fn date_from_captures(caps: &Captures) -> Option<PhotoDate> {
    let year: i32 = caps.name("year")?.as_str().parse().ok()?;
    let month: u32 = caps.name("month")?.as_str().parse().ok()?;
    let day: u32 = caps.name("day")?.as_str().parse().ok()?;

    let optional = |group: &str| -> Option<u32> {
        match caps.name(group) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    let time = (optional("hour")?, optional("minute")?, optional("second")?);

    PhotoDate::from_parts(year, month, day, Some(time))
}

/// How a folder rule compares its name against ancestor directories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderMatch {
    #[default]
    Exact,
    Contains,
}

impl FolderMatch {
    fn matches(self, dir_name: &str, wanted: &str) -> bool {
        match self {
            FolderMatch::Exact => dir_name == wanted,
            FolderMatch::Contains => dir_name.contains(wanted),
        }
    }
}

/// Assigns a fixed date to every photo below a directory with a given name.
#[derive(Debug, Clone)]
pub struct FolderRule {
    folder_name: String,
    mode: FolderMatch,
    date: PhotoDate,
}

impl FolderRule {
    pub fn new(folder_name: impl Into<String>, mode: FolderMatch, date: PhotoDate) -> Result<Self, RuleError> {
        let folder_name = folder_name.into();
        if folder_name.is_empty() {
            return Err(RuleError::EmptyFolderName);
        }
        Ok(Self {
            folder_name,
            mode,
            date,
        })
    }

    pub fn folder_name(&self) -> &str {
        &self.folder_name
    }

    pub fn date(&self) -> PhotoDate {
        self.date
    }

    fn try_match(&self, path: &Path) -> Option<PhotoDate> {
        let parent = path.parent()?;
        let hit = parent.components().any(|c| match c {
            Component::Normal(name) => name
                .to_str()
                .map_or(false, |n| self.mode.matches(n, &self.folder_name)),
            _ => false,
        });
        hit.then_some(self.date)
    }
}

#[derive(Debug, Clone)]
pub enum ParseRule {
    FilenameRegex(FilenameRegexRule),
    Folder(FolderRule),
}

impl ParseRule {
    /// Candidate date for `path`, or `None` if this rule does not apply.
    pub fn try_match(&self, path: &Path) -> Option<PhotoDate> {
        match self {
            ParseRule::FilenameRegex(rule) => rule.try_match(path),
            ParseRule::Folder(rule) => rule.try_match(path),
        }
    }

    /// Label used in logs and reports.
    pub fn label(&self) -> &str {
        match self {
            ParseRule::FilenameRegex(rule) => rule.name(),
            ParseRule::Folder(rule) => rule.folder_name(),
        }
    }
}

impl fmt::Display for ParseRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseRule::FilenameRegex(rule) => {
                write!(f, "filename_regex {:?}: {}", rule.name, rule.pattern)
            }
            ParseRule::Folder(rule) => {
                let mode = match rule.mode {
                    FolderMatch::Exact => "named",
                    FolderMatch::Contains => "containing",
                };
                write!(f, "folder {} {:?} -> {}", mode, rule.folder_name, rule.date)
            }
        }
    }
}

/// A successful rule application.
#[derive(Debug, Clone, Copy)]
pub struct RuleMatch<'a> {
    pub rule: &'a ParseRule,
    pub date: PhotoDate,
}

/// Ordered rule list; the first rule yielding a valid date wins.
#[derive(Debug, Clone, Default)]
pub struct DateParserRegistry {
    rules: Vec<ParseRule>,
}

impl DateParserRegistry {
    pub fn new(rules: Vec<ParseRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ParseRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn match_path(&self, path: &Path) -> Option<RuleMatch<'_>> {
        for rule in &self.rules {
            tracing::trace!(rule = rule.label(), path = %path.display(), "trying rule");
            if let Some(date) = rule.try_match(path) {
                return Some(RuleMatch { rule, date });
            }
        }
        None
    }
}
