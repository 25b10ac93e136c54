use std::fs;
use std::path::Path;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::date::PhotoDate;
use crate::error::{ConfigError, RuleError};
use crate::rules::{DateParserRegistry, FilenameRegexRule, FolderMatch, FolderRule, ParseRule};

/// Default rule file, relative to the working directory.
pub const DEFAULT_CONFIG: &str = "./config.yml";

/// One entry of the YAML rule list, discriminated by its `parser` key.
#[derive(Debug, Deserialize)]
#[serde(tag = "parser", rename_all = "snake_case")]
enum RuleEntry {
    FilenameRegex {
        name: String,
        regex: String,
    },
    Folder {
        #[serde(deserialize_with = "scalar_string")]
        folder_name: String,
        date: String,
        #[serde(default, rename = "match")]
        mode: FolderMatch,
    },
}

/// Accept unquoted scalars such as `folder_name: 2021`, which YAML reads as a number.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!("expected a folder name, found {other:?}"))),
    }
}

impl RuleEntry {
    fn into_rule(self) -> Result<ParseRule, RuleError> {
        match self {
            RuleEntry::FilenameRegex { name, regex } => {
                Ok(ParseRule::FilenameRegex(FilenameRegexRule::new(name, &regex)?))
            }
            RuleEntry::Folder {
                folder_name,
                date,
                mode,
            } => {
                let date = PhotoDate::parse_iso(&date).ok_or(RuleError::InvalidDate(date))?;
                Ok(ParseRule::Folder(FolderRule::new(folder_name, mode, date)?))
            }
        }
    }
}

/// Read and validate the rule file at `path`.
pub fn load_rules(path: &Path) -> Result<DateParserRegistry, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let registry = parse_rules(&text)?;
    tracing::debug!(path = %path.display(), rules = registry.len(), "loaded rules");
    Ok(registry)
}

/// Parse a YAML rule list. Rules keep their order; entries are numbered from 1 in errors.
pub fn parse_rules(text: &str) -> Result<DateParserRegistry, ConfigError> {
    if text.trim().is_empty() {
        return Err(ConfigError::Empty);
    }
    let entries: Vec<serde_yaml::Value> = serde_yaml::from_str(text)?;
    if entries.is_empty() {
        return Err(ConfigError::Empty);
    }

    let mut rules = Vec::with_capacity(entries.len());
    for (i, value) in entries.into_iter().enumerate() {
        let index = i + 1;
        let entry: RuleEntry = serde_yaml::from_value(value)
            .map_err(|source| ConfigError::InvalidEntry { index, source })?;
        let rule = entry
            .into_rule()
            .map_err(|source| ConfigError::InvalidRule { index, source })?;
        rules.push(rule);
    }

    Ok(DateParserRegistry::new(rules))
}
